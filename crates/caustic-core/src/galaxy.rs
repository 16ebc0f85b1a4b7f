//! Galaxies: a redshift plus the light, mass and pixelization components
//! attached to it.
//!
//! Galaxies are assembled through [`GalaxyBuilder`] and are immutable once
//! built. Profiles are shared behind `Arc`, so cloning a galaxy (for example
//! when the same lens appears in many candidate models) is cheap.

use std::fmt;
use std::sync::Arc;

use ndarray::Array1;
use serde::Deserialize;

use crate::error::{LensingError, LensingResult};
use crate::grids::Grid;
use crate::pixelization::{Pixelization, Regularization};
use crate::profiles::{LightProfile, MassProfile};

/// Identity of a galaxy within a tracer: its index in the input list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GalaxyId(pub usize);

impl fmt::Display for GalaxyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "galaxy_{}", self.0)
    }
}

/// Noise-scaling hyper-parameters of a galaxy.
///
/// Pixels where this galaxy dominates the model can have their noise
/// increased, down-weighting regions the model cannot reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct HyperGalaxy {
    pub contribution_factor: f64,
    pub noise_factor: f64,
    pub noise_power: f64,
}

impl Default for HyperGalaxy {
    fn default() -> Self {
        Self {
            contribution_factor: 0.0,
            noise_factor: 0.0,
            noise_power: 1.0,
        }
    }
}

impl HyperGalaxy {
    /// Fractional contribution of this galaxy to every pixel.
    ///
    /// $c = \frac{I_\text{gal}}{I_\text{model} + f_c}$, normalised by its
    /// maximum, with entries below `minimum_value` set to zero.
    pub fn contributions(
        &self,
        model_image: &Array1<f64>,
        galaxy_image: &Array1<f64>,
        minimum_value: f64,
    ) -> LensingResult<Array1<f64>> {
        if model_image.len() != galaxy_image.len() {
            return Err(LensingError::Fit(format!(
                "hyper model image has {} pixels but galaxy image has {}",
                model_image.len(),
                galaxy_image.len()
            )));
        }
        let mut contributions = galaxy_image / &(model_image + self.contribution_factor);
        let max = contributions.fold(f64::NEG_INFINITY, |m, &c| m.max(c));
        if max.is_finite() && max > 0.0 {
            contributions /= max;
        }
        contributions.mapv_inplace(|c| if c < minimum_value { 0.0 } else { c });
        Ok(contributions)
    }

    /// $\sigma_\text{hyper} = f_n (\sigma \cdot c)^{p}$
    pub fn hyper_noise(&self, noise_map: &Array1<f64>, contributions: &Array1<f64>) -> Array1<f64> {
        (noise_map * contributions).mapv(|v| self.noise_factor * v.powf(self.noise_power))
    }
}

/// A galaxy at an optional redshift.
#[derive(Debug, Clone, Default)]
pub struct Galaxy {
    redshift: Option<f64>,
    light_profiles: Vec<Arc<dyn LightProfile>>,
    mass_profiles: Vec<Arc<dyn MassProfile>>,
    pixelization: Option<Arc<dyn Pixelization>>,
    regularization: Option<Arc<dyn Regularization>>,
    hyper_galaxy: Option<HyperGalaxy>,
}

impl Galaxy {
    pub fn builder() -> GalaxyBuilder {
        GalaxyBuilder::default()
    }

    pub fn redshift(&self) -> Option<f64> {
        self.redshift
    }

    pub fn light_profiles(&self) -> &[Arc<dyn LightProfile>] {
        &self.light_profiles
    }

    pub fn mass_profiles(&self) -> &[Arc<dyn MassProfile>] {
        &self.mass_profiles
    }

    pub fn pixelization(&self) -> Option<&Arc<dyn Pixelization>> {
        self.pixelization.as_ref()
    }

    pub fn regularization(&self) -> Option<&Arc<dyn Regularization>> {
        self.regularization.as_ref()
    }

    pub fn hyper_galaxy(&self) -> Option<&HyperGalaxy> {
        self.hyper_galaxy.as_ref()
    }

    pub fn has_redshift(&self) -> bool {
        self.redshift.is_some()
    }

    pub fn has_light_profile(&self) -> bool {
        !self.light_profiles.is_empty()
    }

    pub fn has_mass_profile(&self) -> bool {
        !self.mass_profiles.is_empty()
    }

    pub fn has_pixelization(&self) -> bool {
        self.pixelization.is_some()
    }

    pub fn has_regularization(&self) -> bool {
        self.regularization.is_some()
    }

    pub fn has_hyper_galaxy(&self) -> bool {
        self.hyper_galaxy.is_some()
    }

    /// Summed intensity of every light profile; zeros without light.
    pub fn intensities_from_grid(&self, grid: &Grid) -> Array1<f64> {
        let mut total = Array1::zeros(grid.len());
        for profile in &self.light_profiles {
            total += &profile.intensities_from_grid(grid);
        }
        total
    }

    pub fn surface_density_from_grid(&self, grid: &Grid) -> Array1<f64> {
        let mut total = Array1::zeros(grid.len());
        for profile in &self.mass_profiles {
            total += &profile.surface_density_from_grid(grid);
        }
        total
    }

    pub fn potential_from_grid(&self, grid: &Grid) -> Array1<f64> {
        let mut total = Array1::zeros(grid.len());
        for profile in &self.mass_profiles {
            total += &profile.potential_from_grid(grid);
        }
        total
    }

    /// Summed deflection of every mass profile; a zero field without mass.
    pub fn deflections_from_grid(&self, grid: &Grid) -> Grid {
        let mut total = Grid::zeros(grid.len());
        for profile in &self.mass_profiles {
            total.accumulate(&profile.deflections_from_grid(grid));
        }
        total
    }

    /// Luminosity within a circle, scaled by `conversion_factor`
    /// (1.0 keeps image units).
    pub fn luminosity_within_circle(&self, radius: f64, conversion_factor: f64) -> f64 {
        self.light_profiles
            .iter()
            .map(|p| p.luminosity_within_circle(radius))
            .sum::<f64>()
            * conversion_factor
    }

    pub fn luminosity_within_ellipse(&self, major_axis: f64, conversion_factor: f64) -> f64 {
        self.light_profiles
            .iter()
            .map(|p| p.luminosity_within_ellipse(major_axis))
            .sum::<f64>()
            * conversion_factor
    }

    /// Mass within a circle; pass the critical surface density (M☉ arcsec⁻²)
    /// as `conversion_factor` for solar masses.
    pub fn mass_within_circle(&self, radius: f64, conversion_factor: f64) -> f64 {
        self.mass_profiles
            .iter()
            .map(|p| p.mass_within_circle(radius))
            .sum::<f64>()
            * conversion_factor
    }

    pub fn mass_within_ellipse(&self, major_axis: f64, conversion_factor: f64) -> f64 {
        self.mass_profiles
            .iter()
            .map(|p| p.mass_within_ellipse(major_axis))
            .sum::<f64>()
            * conversion_factor
    }
}

/// Builder for [`Galaxy`].
#[derive(Debug, Default)]
pub struct GalaxyBuilder {
    galaxy: Galaxy,
}

impl GalaxyBuilder {
    pub fn redshift(mut self, redshift: f64) -> Self {
        self.galaxy.redshift = Some(redshift);
        self
    }

    pub fn light<P: LightProfile + 'static>(mut self, profile: P) -> Self {
        self.galaxy.light_profiles.push(Arc::new(profile));
        self
    }

    pub fn shared_light(mut self, profile: Arc<dyn LightProfile>) -> Self {
        self.galaxy.light_profiles.push(profile);
        self
    }

    pub fn mass<P: MassProfile + 'static>(mut self, profile: P) -> Self {
        self.galaxy.mass_profiles.push(Arc::new(profile));
        self
    }

    pub fn shared_mass(mut self, profile: Arc<dyn MassProfile>) -> Self {
        self.galaxy.mass_profiles.push(profile);
        self
    }

    pub fn pixelization<P: Pixelization + 'static>(mut self, pixelization: P) -> Self {
        self.galaxy.pixelization = Some(Arc::new(pixelization));
        self
    }

    pub fn regularization<R: Regularization + 'static>(mut self, regularization: R) -> Self {
        self.galaxy.regularization = Some(Arc::new(regularization));
        self
    }

    pub fn hyper_galaxy(mut self, hyper_galaxy: HyperGalaxy) -> Self {
        self.galaxy.hyper_galaxy = Some(hyper_galaxy);
        self
    }

    pub fn build(self) -> LensingResult<Galaxy> {
        let galaxy = self.galaxy;
        if let Some(z) = galaxy.redshift {
            if !z.is_finite() || z < 0.0 {
                return Err(LensingError::Galaxy(format!(
                    "redshift must be finite and non-negative, got {z}"
                )));
            }
        }
        match (galaxy.has_pixelization(), galaxy.has_regularization()) {
            (true, false) => Err(LensingError::Galaxy(
                "a galaxy with a pixelization must also have a regularization".into(),
            )),
            (false, true) => Err(LensingError::Galaxy(
                "a galaxy with a regularization must also have a pixelization".into(),
            )),
            _ => Ok(galaxy),
        }
    }
}
