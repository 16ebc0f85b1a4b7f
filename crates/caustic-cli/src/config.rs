//! TOML configuration deserialisation for ray-tracing jobs.

use caustic_core::galaxy::HyperGalaxy;
use caustic_core::profiles::reference::{SphericalGaussian, SphericalIsothermal};
use caustic_cosmology::LambdaCdmParams;
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub grid: GridConfig,
    /// Physical-unit conversions are skipped without a cosmology.
    pub cosmology: Option<CosmologyConfig>,
    #[serde(default)]
    pub tracing: TracingConfig,
    #[serde(rename = "galaxy")]
    pub galaxies: Vec<GalaxyConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Image-plane sampling.
#[derive(Debug, Deserialize)]
pub struct GridConfig {
    /// `[rows, cols]` of the image.
    pub shape: [usize; 2],
    /// Arc-seconds per pixel.
    pub pixel_scale: f64,
    #[serde(default = "default_sub_grid_size")]
    pub sub_grid_size: usize,
    #[serde(default = "default_psf_shape")]
    pub psf_shape: [usize; 2],
    /// Circular mask radius (arcsec). Every pixel is used when absent.
    pub mask_radius: Option<f64>,
}

fn default_sub_grid_size() -> usize {
    2
}
fn default_psf_shape() -> [usize; 2] {
    [3, 3]
}

/// Either a named preset or explicit flat ΛCDM parameters.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CosmologyConfig {
    Preset { preset: String },
    Custom(LambdaCdmParams),
}

#[derive(Debug, Default, Deserialize)]
pub struct TracingConfig {
    /// Also compute the last plane's deflections (default: false).
    #[serde(default)]
    pub terminal_deflections: bool,
}

/// A galaxy and its profiles.
#[derive(Debug, Deserialize)]
pub struct GalaxyConfig {
    pub redshift: Option<f64>,
    #[serde(default)]
    pub light: Vec<LightProfileConfig>,
    #[serde(default)]
    pub mass: Vec<MassProfileConfig>,
    pub hyper: Option<HyperGalaxy>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LightProfileConfig {
    SphericalGaussian(SphericalGaussian),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MassProfileConfig {
    SphericalIsothermal(SphericalIsothermal),
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save each plane's uniform-grid image (default: false).
    #[serde(default)]
    pub save_planes: bool,
    /// `[rows, cols]` of the plane images.
    #[serde(default = "default_plane_shape")]
    pub plane_shape: [usize; 2],
    /// Padding around each plane's grid extent (arcsec).
    #[serde(default = "default_plane_buffer")]
    pub plane_buffer: f64,
    /// Whether to save the image-plane deflection maps (default: false).
    #[serde(default)]
    pub save_deflections: bool,
    /// Whether to write `summary.json` (default: true).
    #[serde(default = "default_true")]
    pub save_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_planes: false,
            plane_shape: default_plane_shape(),
            plane_buffer: default_plane_buffer(),
            save_deflections: false,
            save_json: true,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_plane_shape() -> [usize; 2] {
    [50, 50]
}
fn default_plane_buffer() -> f64 {
    1e-8
}
fn default_true() -> bool {
    true
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> anyhow::Result<JobConfig> {
    let config: JobConfig = toml::from_str(content)?;
    if config.galaxies.is_empty() {
        anyhow::bail!("Job defines no [[galaxy]] entries");
    }
    Ok(config)
}
