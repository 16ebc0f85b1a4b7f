//! Fitting lens models to data.
//!
//! | Fit | Data | Figure of merit |
//! |-----|------|-----------------|
//! | [`LensingProfileFit`] | masked image + noise map | Gaussian log-likelihood of the blurred model image |
//! | [`PositionFit`] | multiple-image positions | source-plane separation of traced positions |
//!
//! The likelihood of an image fit is
//!
//! $\ln\mathcal{L} = -\tfrac{1}{2}\left(\chi^2 + \sum_i \ln 2\pi\sigma_i^2\right)$,
//! $\chi^2 = \sum_i \left(\frac{d_i - m_i}{\sigma_i}\right)^2$.

pub mod positions;
pub mod profile;

pub use positions::PositionFit;
pub use profile::LensingProfileFit;

use std::f64::consts::PI;

use ndarray::{Array1, Array2};

use crate::error::{LensingError, LensingResult};
use crate::grids::GridStack;

/// Model and per-galaxy images from a previous fit, used to scale the noise
/// of pixels dominated by a hyper galaxy.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperImages {
    pub model_image: Array1<f64>,
    /// One image per galaxy, in tracer galaxy order.
    pub galaxy_images: Vec<Array1<f64>>,
    /// Contribution threshold per galaxy, in tracer galaxy order.
    pub minimum_values: Vec<f64>,
}

/// A masked image and its noise map, paired with the grid stack of the mask.
#[derive(Debug, Clone)]
pub struct LensingImage {
    image_1d: Array1<f64>,
    noise_map_1d: Array1<f64>,
    grid_stack: GridStack,
    hyper: Option<HyperImages>,
}

impl LensingImage {
    /// Extract the unmasked pixels of full 2D image and noise arrays.
    pub fn new(image: &Array2<f64>, noise_map: &Array2<f64>, grid_stack: GridStack) -> LensingResult<Self> {
        let mapping = grid_stack.mapping();
        let image_1d = mapping.map_to_1d(image)?;
        let noise_map_1d = mapping.map_to_1d(noise_map)?;
        Self::from_1d(image_1d, noise_map_1d, grid_stack)
    }

    /// Use already-masked 1D arrays, ordered like the regular grid.
    pub fn from_1d(image_1d: Array1<f64>, noise_map_1d: Array1<f64>, grid_stack: GridStack) -> LensingResult<Self> {
        let pixels = grid_stack.regular().len();
        if image_1d.len() != pixels || noise_map_1d.len() != pixels {
            return Err(LensingError::Fit(format!(
                "image has {} and noise map {} pixels but the grid has {pixels}",
                image_1d.len(),
                noise_map_1d.len()
            )));
        }
        Ok(Self {
            image_1d,
            noise_map_1d,
            grid_stack,
            hyper: None,
        })
    }

    pub fn with_hyper(mut self, hyper: HyperImages) -> Self {
        self.hyper = Some(hyper);
        self
    }

    pub fn image_1d(&self) -> &Array1<f64> {
        &self.image_1d
    }

    pub fn noise_map_1d(&self) -> &Array1<f64> {
        &self.noise_map_1d
    }

    pub fn grid_stack(&self) -> &GridStack {
        &self.grid_stack
    }

    pub fn hyper(&self) -> Option<&HyperImages> {
        self.hyper.as_ref()
    }

    pub fn pixels(&self) -> usize {
        self.image_1d.len()
    }
}

/// Point-spread-function blurring of a 1D model image.
///
/// `blurring_1d` holds the light of the blurring grid, which lies outside the
/// mask but spreads into it.
pub trait Convolver: Send + Sync {
    fn convolve_image(&self, image_1d: &Array1<f64>, blurring_1d: &Array1<f64>) -> LensingResult<Array1<f64>>;
}

/// A delta-function PSF.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBlurring;

impl Convolver for NoBlurring {
    fn convolve_image(&self, image_1d: &Array1<f64>, _blurring_1d: &Array1<f64>) -> LensingResult<Array1<f64>> {
        Ok(image_1d.clone())
    }
}

/// Fit options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSettings {
    /// Upper bound on any pixel of a hyper-scaled noise map.
    pub hyper_noise_limit: f64,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self { hyper_noise_limit: 1.0e8 }
    }
}

pub fn residual_map(data: &Array1<f64>, model: &Array1<f64>) -> Array1<f64> {
    data - model
}

/// $(r_i / \sigma_i)^2$
pub fn chi_squared_map(residual_map: &Array1<f64>, noise_map: &Array1<f64>) -> Array1<f64> {
    (residual_map / noise_map).mapv(|v| v * v)
}

pub fn chi_squared_term(chi_squared_map: &Array1<f64>) -> f64 {
    chi_squared_map.sum()
}

/// $\sum_i \ln 2\pi\sigma_i^2$
pub fn noise_term(noise_map: &Array1<f64>) -> f64 {
    noise_map.iter().map(|&s| (2.0 * PI * s * s).ln()).sum()
}

pub fn likelihood(chi_squared_term: f64, noise_term: f64) -> f64 {
    -0.5 * (chi_squared_term + noise_term)
}
