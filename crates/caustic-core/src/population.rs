//! Likelihood evaluation of many candidate lens models.
//!
//! A non-linear search proposes a population of galaxy sets. Each candidate
//! gets its own [`Tracer`] and [`LensingProfileFit`], so candidates share
//! nothing mutable and can be dispatched to any [`ComputeBackend`].
//!
//! A candidate that fails to build or fit is a rejected sample, not an
//! error: it is logged and scored `f64::NEG_INFINITY`.

use caustic_compute::ComputeBackend;

use crate::error::LensingResult;
use crate::fit::{Convolver, FitSettings, LensingImage, LensingProfileFit};
use crate::galaxy::Galaxy;
use crate::tracer::{Tracer, TracerSettings};

/// Shared inputs of every candidate evaluation.
pub struct PopulationContext<'a> {
    pub image: &'a LensingImage,
    pub convolver: &'a dyn Convolver,
    pub tracer_settings: &'a TracerSettings,
    pub fit_settings: &'a FitSettings,
}

/// Figure of merit of one candidate.
pub fn evaluate_candidate(galaxies: &[Galaxy], context: &PopulationContext<'_>) -> LensingResult<f64> {
    let tracer = Tracer::with_settings(
        galaxies.to_vec(),
        context.image.grid_stack().clone(),
        context.tracer_settings,
    )?;
    let fit = LensingProfileFit::new(context.image, &tracer, context.convolver, context.fit_settings)?;
    Ok(fit.figure_of_merit())
}

/// Figures of merit of every candidate, in candidate order.
///
/// Only a backend failure is returned as an error.
pub fn evaluate_population(
    backend: &dyn ComputeBackend,
    candidates: &[Vec<Galaxy>],
    context: &PopulationContext<'_>,
) -> LensingResult<Vec<f64>> {
    let task = |i: usize| match evaluate_candidate(&candidates[i], context) {
        Ok(merit) => merit,
        Err(e) => {
            log::warn!("Candidate {i} rejected: {e}");
            f64::NEG_INFINITY
        }
    };
    let merits = backend.parallel_map(candidates.len(), &task)?;
    log::debug!(
        "Evaluated {} candidates on {} ({} rejected)",
        candidates.len(),
        backend.device_info().name,
        merits.iter().filter(|m| **m == f64::NEG_INFINITY).count()
    );
    Ok(merits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::NoBlurring;
    use crate::grids::{GridStack, Mask};
    use crate::profiles::reference::{SphericalGaussian, SphericalIsothermal};
    use approx::assert_relative_eq;
    use caustic_compute::{CpuBackend, SerialBackend};
    use ndarray::Array2;

    fn observed() -> (LensingImage, Vec<Galaxy>) {
        let stack = GridStack::from_mask(&Mask::circular((9, 9), 0.2, 0.8, [0.0, 0.0]).unwrap(), 2, (3, 3)).unwrap();
        let truth = vec![
            Galaxy::builder()
                .redshift(0.5)
                .mass(SphericalIsothermal::new([0.0, 0.0], 0.5))
                .build()
                .unwrap(),
            Galaxy::builder()
                .redshift(1.0)
                .light(SphericalGaussian::new([0.05, 0.0], 2.0, 0.2))
                .build()
                .unwrap(),
        ];
        let tracer = Tracer::from_galaxies(truth.clone(), stack.clone()).unwrap();
        let model = tracer.image_plane_image_1d().unwrap();
        let noise = Array2::from_elem((9, 9), 0.1);
        let image = LensingImage::new(&Array2::zeros((9, 9)), &noise, stack.clone()).unwrap();
        let image = LensingImage::from_1d(model, image.noise_map_1d().clone(), stack).unwrap();
        (image, truth)
    }

    fn candidates(truth: &[Galaxy]) -> Vec<Vec<Galaxy>> {
        let offset = vec![
            truth[0].clone(),
            Galaxy::builder()
                .redshift(1.0)
                .light(SphericalGaussian::new([0.3, 0.0], 2.0, 0.2))
                .build()
                .unwrap(),
        ];
        vec![truth.to_vec(), offset, vec![]]
    }

    #[test]
    fn test_true_model_scores_best_and_failures_are_rejected() {
        let (image, truth) = observed();
        let context = PopulationContext {
            image: &image,
            convolver: &NoBlurring,
            tracer_settings: &TracerSettings::default(),
            fit_settings: &FitSettings::default(),
        };
        let merits = evaluate_population(&SerialBackend, &candidates(&truth), &context).unwrap();

        assert_eq!(merits.len(), 3);
        assert!(merits[0] > merits[1]);
        assert_eq!(merits[2], f64::NEG_INFINITY);

        let noise_term: f64 = image.noise_map_1d().iter().map(|s| (2.0 * std::f64::consts::PI * s * s).ln()).sum();
        assert_relative_eq!(merits[0], -0.5 * noise_term, max_relative = 1e-12);
    }

    #[test]
    fn test_backends_agree() {
        let (image, truth) = observed();
        let context = PopulationContext {
            image: &image,
            convolver: &NoBlurring,
            tracer_settings: &TracerSettings::default(),
            fit_settings: &FitSettings::default(),
        };
        let population = candidates(&truth);
        let serial = evaluate_population(&SerialBackend, &population, &context).unwrap();
        let parallel = evaluate_population(&CpuBackend::with_threads(2).unwrap(), &population, &context).unwrap();
        assert_eq!(serial, parallel);
    }
}
