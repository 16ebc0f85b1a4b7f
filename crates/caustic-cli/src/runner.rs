//! Job runner: ties together grids, galaxies, cosmology and the tracer.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ndarray::Array2;
use serde::Serialize;

use caustic_core::plane::PlaneCosmology;
use caustic_core::plane_image::PlaneImage;
use caustic_core::{Galaxy, GridStack, Mask, Tracer, TracerSettings};
use caustic_cosmology::{CosmologyProvider, FlatLambdaCdm};

use crate::config::{CosmologyConfig, GalaxyConfig, JobConfig, LightProfileConfig, MassProfileConfig};

/// Results from a ray-tracing run.
pub struct RunOutput {
    pub tracer: Tracer,
    pub image: Array2<f64>,
    pub plane_images: Vec<PlaneImage>,
    pub deflections: Option<(Array2<f64>, Array2<f64>)>,
}

/// Build the grid stack, galaxies and tracer described by `job`.
pub fn run_job(job: &JobConfig) -> Result<RunOutput> {
    let grid_stack = build_grid_stack(job)?;
    println!(
        "Grid: {}x{} pixels at {}\"/px, {} unmasked, sub-grid {}",
        job.grid.shape[0],
        job.grid.shape[1],
        job.grid.pixel_scale,
        grid_stack.regular().len(),
        job.grid.sub_grid_size
    );

    let galaxies = job
        .galaxies
        .iter()
        .enumerate()
        .map(|(i, config)| build_galaxy(config).with_context(|| format!("Galaxy {i}")))
        .collect::<Result<Vec<_>>>()?;

    let mut settings = TracerSettings::default().with_terminal_deflections(job.tracing.terminal_deflections);
    if let Some(config) = &job.cosmology {
        let cosmology = build_cosmology(config)?;
        println!("Cosmology: {}", cosmology.name());
        settings = settings.with_cosmology(cosmology);
    }

    let tracer = Tracer::with_settings(galaxies, grid_stack, &settings)?;
    for (i, plane) in tracer.planes().iter().enumerate() {
        let redshift = plane
            .redshift()
            .map_or_else(|| "none".to_string(), |z| format!("{z}"));
        println!(
            "  Plane {}: z = {}, {} galaxies{}{}",
            i,
            redshift,
            plane.galaxies().len(),
            if plane.has_light_profile() { ", light" } else { "" },
            if plane.has_mass_profile() { ", mass" } else { "" },
        );
    }

    let image = tracer.image_plane_image()?;
    println!("Total image flux: {:.6e}", image.sum());

    let plane_images = if job.output.save_planes {
        let [rows, cols] = job.output.plane_shape;
        tracer.plane_images((rows, cols), job.output.plane_buffer)?
    } else {
        Vec::new()
    };

    let deflections = if job.output.save_deflections {
        Some((tracer.deflections_y()?, tracer.deflections_x()?))
    } else {
        None
    };

    Ok(RunOutput {
        tracer,
        image,
        plane_images,
        deflections,
    })
}

fn build_grid_stack(job: &JobConfig) -> Result<GridStack> {
    let grid = &job.grid;
    let shape = (grid.shape[0], grid.shape[1]);
    let mask = match grid.mask_radius {
        Some(radius) => Mask::circular(shape, grid.pixel_scale, radius, [0.0, 0.0])?,
        None => Mask::unmasked(shape, grid.pixel_scale)?,
    };
    let stack = GridStack::from_mask(&mask, grid.sub_grid_size, (grid.psf_shape[0], grid.psf_shape[1]))?;
    Ok(stack)
}

fn build_galaxy(config: &GalaxyConfig) -> Result<Galaxy> {
    let mut builder = Galaxy::builder();
    if let Some(z) = config.redshift {
        builder = builder.redshift(z);
    }
    for light in &config.light {
        builder = match *light {
            LightProfileConfig::SphericalGaussian(profile) => builder.light(profile),
        };
    }
    for mass in &config.mass {
        builder = match *mass {
            MassProfileConfig::SphericalIsothermal(profile) => builder.mass(profile),
        };
    }
    if let Some(hyper) = config.hyper {
        builder = builder.hyper_galaxy(hyper);
    }
    Ok(builder.build()?)
}

fn build_cosmology(config: &CosmologyConfig) -> Result<Arc<dyn CosmologyProvider>> {
    match config {
        CosmologyConfig::Preset { preset } => {
            let cosmology = FlatLambdaCdm::preset(preset).with_context(|| {
                format!("Unknown cosmology preset '{preset}'. Valid presets: Planck15, WMAP9")
            })?;
            Ok(Arc::new(cosmology))
        }
        CosmologyConfig::Custom(params) => Ok(Arc::new(FlatLambdaCdm::new("FlatLambdaCDM", params.clone())?)),
    }
}

/// Write a 2D array as CSV with a metadata header.
pub fn write_array_csv(array: &Array2<f64>, path: &Path, title: &str, pixel_scales: (f64, f64)) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    writeln!(file, "# Caustic ray tracer: {title}")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# Shape: {}x{}", array.nrows(), array.ncols())?;
    writeln!(file, "# Pixel scales (y, x): {}, {} arcsec", pixel_scales.0, pixel_scales.1)?;
    writeln!(file, "#")?;

    for row in array.rows() {
        let line: Vec<String> = row.iter().map(|v| format!("{v:.6e}")).collect();
        writeln!(file, "{}", line.join(","))?;
    }

    println!("{} written to: {}", title, path.display());
    Ok(())
}

#[derive(Debug, Serialize)]
struct PlaneSummary {
    redshift: Option<f64>,
    galaxies: usize,
    image_flux: f64,
    cosmology: Option<PlaneCosmology>,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    version: &'static str,
    cosmology: Option<String>,
    total_planes: usize,
    plane_redshifts: Vec<Option<f64>>,
    image_flux: f64,
    image_max: f64,
    planes: Vec<PlaneSummary>,
}

/// Write plane redshifts, plane cosmology and image totals as JSON.
pub fn write_summary_json(output: &RunOutput, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tracer = &output.tracer;
    let planes = tracer
        .planes()
        .iter()
        .map(|plane| -> Result<PlaneSummary> {
            let cosmology = match (tracer.cosmology(), plane.redshift()) {
                (Some(_), Some(_)) => Some(plane.cosmology()?.clone()),
                _ => None,
            };
            Ok(PlaneSummary {
                redshift: plane.redshift(),
                galaxies: plane.galaxies().len(),
                image_flux: plane.image_plane_image_1d()?.sum(),
                cosmology,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let summary = RunSummary {
        version: env!("CARGO_PKG_VERSION"),
        cosmology: tracer.cosmology().map(|c| c.name().to_string()),
        total_planes: tracer.total_planes(),
        plane_redshifts: tracer.plane_redshifts(),
        image_flux: output.image.sum(),
        image_max: output.image.fold(f64::NEG_INFINITY, |m, &v| m.max(v)),
        planes,
    };

    let json = serde_json::to_string_pretty(&summary)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    std::fs::write(path, json)?;

    println!("Summary (JSON) written to: {}", path.display());
    Ok(())
}
