//! Fit of a tracer's light profiles to a masked image.

use ndarray::{Array1, Array2};

use super::{
    chi_squared_map, chi_squared_term, likelihood, noise_term, residual_map, Convolver, FitSettings, LensingImage,
};
use crate::error::{LensingError, LensingResult};
use crate::grids::GridMapping;
use crate::tracer::Tracer;

/// Noise-scaled figures of merit, present when both the image carries
/// hyper images and the tracer has hyper galaxies.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledFit {
    pub noise_map_1d: Array1<f64>,
    pub chi_squared_map_1d: Array1<f64>,
    pub chi_squared: f64,
    pub noise_term: f64,
    pub likelihood: f64,
}

/// Residuals, χ² and likelihood of a blurred tracer image against data.
#[derive(Debug, Clone)]
pub struct LensingProfileFit {
    image_1d: Array1<f64>,
    noise_map_1d: Array1<f64>,
    model_image_1d: Array1<f64>,
    model_images_of_planes_1d: Vec<Array1<f64>>,
    residual_map_1d: Array1<f64>,
    chi_squared_map_1d: Array1<f64>,
    chi_squared: f64,
    noise_term: f64,
    likelihood: f64,
    scaled: Option<ScaledFit>,
    mapping: GridMapping,
}

impl LensingProfileFit {
    /// Fit `tracer`, blurring each plane's image with `convolver`.
    ///
    /// The tracer must have been built on `image`'s grid stack.
    pub fn new(
        image: &LensingImage,
        tracer: &Tracer,
        convolver: &dyn Convolver,
        settings: &FitSettings,
    ) -> LensingResult<Self> {
        if tracer.has_pixelization() {
            return Err(LensingError::Fit(
                "tracer has a pixelized galaxy; a profile fit cannot model it without an inversion".into(),
            ));
        }
        if tracer.image_plane().grid_stack().regular() != image.grid_stack().regular() {
            return Err(LensingError::Fit(
                "tracer was not built on the image's grid stack".into(),
            ));
        }

        let images = tracer.image_plane_images_1d_of_planes()?;
        let blurring = tracer.image_plane_blurring_images_1d_of_planes();
        let model_images_of_planes_1d = images
            .iter()
            .zip(&blurring)
            .map(|(image_1d, blurring_1d)| convolver.convolve_image(image_1d, blurring_1d))
            .collect::<LensingResult<Vec<_>>>()?;

        let mut model_image_1d = Array1::zeros(image.pixels());
        for plane_image in &model_images_of_planes_1d {
            model_image_1d += plane_image;
        }

        let residual_map_1d = residual_map(image.image_1d(), &model_image_1d);
        let chi_squared_map_1d = chi_squared_map(&residual_map_1d, image.noise_map_1d());
        let chi_squared = chi_squared_term(&chi_squared_map_1d);
        let noise = noise_term(image.noise_map_1d());
        let likelihood = likelihood(chi_squared, noise);
        if !likelihood.is_finite() {
            return Err(LensingError::Fit(format!(
                "likelihood is not finite (chi-squared {chi_squared}, noise term {noise})"
            )));
        }

        let scaled = match image.hyper() {
            Some(hyper) if tracer.has_hyper_galaxy() => {
                let hyper_noise = tracer.hyper_noise_map_1d(hyper, image.noise_map_1d())?;
                let limit = settings.hyper_noise_limit;
                let noise_map_1d = (image.noise_map_1d() + &hyper_noise).mapv_into(|v| v.min(limit));
                let chi_squared_map_1d = chi_squared_map(&residual_map_1d, &noise_map_1d);
                let chi_squared = chi_squared_term(&chi_squared_map_1d);
                let noise_term = noise_term(&noise_map_1d);
                let likelihood = super::likelihood(chi_squared, noise_term);
                if !likelihood.is_finite() {
                    return Err(LensingError::Fit(format!(
                        "scaled likelihood is not finite (chi-squared {chi_squared}, noise term {noise_term})"
                    )));
                }
                Some(ScaledFit {
                    noise_map_1d,
                    chi_squared_map_1d,
                    chi_squared,
                    noise_term,
                    likelihood,
                })
            }
            _ => None,
        };

        log::debug!(
            "Profile fit over {} pixels: chi-squared {chi_squared:.4}, likelihood {likelihood:.4}",
            image.pixels()
        );

        Ok(Self {
            image_1d: image.image_1d().clone(),
            noise_map_1d: image.noise_map_1d().clone(),
            model_image_1d,
            model_images_of_planes_1d,
            residual_map_1d,
            chi_squared_map_1d,
            chi_squared,
            noise_term: noise,
            likelihood,
            scaled,
            mapping: image.grid_stack().mapping().clone(),
        })
    }

    pub fn model_image_1d(&self) -> &Array1<f64> {
        &self.model_image_1d
    }

    pub fn residual_map_1d(&self) -> &Array1<f64> {
        &self.residual_map_1d
    }

    pub fn chi_squared_map_1d(&self) -> &Array1<f64> {
        &self.chi_squared_map_1d
    }

    pub fn chi_squared(&self) -> f64 {
        self.chi_squared
    }

    /// χ² per unmasked pixel.
    pub fn reduced_chi_squared(&self) -> f64 {
        self.chi_squared / self.image_1d.len() as f64
    }

    pub fn noise_term(&self) -> f64 {
        self.noise_term
    }

    pub fn likelihood(&self) -> f64 {
        self.likelihood
    }

    pub fn scaled(&self) -> Option<&ScaledFit> {
        self.scaled.as_ref()
    }

    /// The scaled likelihood when hyper noise applies, else the plain one.
    pub fn figure_of_merit(&self) -> f64 {
        self.scaled.as_ref().map_or(self.likelihood, |s| s.likelihood)
    }

    pub fn model_image(&self) -> LensingResult<Array2<f64>> {
        self.mapping.map_to_2d(&self.model_image_1d)
    }

    pub fn residual_map(&self) -> LensingResult<Array2<f64>> {
        self.mapping.map_to_2d(&self.residual_map_1d)
    }

    pub fn chi_squared_map(&self) -> LensingResult<Array2<f64>> {
        self.mapping.map_to_2d(&self.chi_squared_map_1d)
    }

    pub fn noise_map(&self) -> LensingResult<Array2<f64>> {
        self.mapping.map_to_2d(&self.noise_map_1d)
    }

    pub fn model_images_of_planes_1d(&self) -> &[Array1<f64>] {
        &self.model_images_of_planes_1d
    }

    pub fn model_images_of_planes(&self) -> LensingResult<Vec<Array2<f64>>> {
        self.model_images_of_planes_1d
            .iter()
            .map(|image| self.mapping.map_to_2d(image))
            .collect()
    }

    /// The data minus every other plane's model image, one per plane.
    pub fn subtracted_images_of_planes(&self) -> LensingResult<Vec<Array2<f64>>> {
        (0..self.model_images_of_planes_1d.len())
            .map(|i| {
                let mut subtracted = self.image_1d.clone();
                for (j, other) in self.model_images_of_planes_1d.iter().enumerate() {
                    if j != i {
                        subtracted -= other;
                    }
                }
                self.mapping.map_to_2d(&subtracted)
            })
            .collect()
    }
}
