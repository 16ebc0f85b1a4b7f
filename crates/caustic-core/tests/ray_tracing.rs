//! Integration test: an isothermal lens imaging a Gaussian source.
//!
//! A source centred behind a singular isothermal sphere is lensed into an
//! Einstein ring of radius θ_E. These tests run the full pipeline from mask
//! to fit and check the geometry of the result.

use std::sync::Arc;

use approx::assert_relative_eq;
use caustic_core::fit::{FitSettings, LensingImage, LensingProfileFit, NoBlurring, PositionFit};
use caustic_core::profiles::reference::{SphericalGaussian, SphericalIsothermal};
use caustic_core::{Galaxy, Grid, GridStack, Mask, Tracer, TracerSettings};
use caustic_cosmology::FlatLambdaCdm;

const EINSTEIN_RADIUS: f64 = 1.0;

fn grid_stack() -> GridStack {
    let mask = Mask::circular((21, 21), 0.1, 1.05, [0.0, 0.0]).unwrap();
    GridStack::from_mask(&mask, 2, (3, 3)).unwrap()
}

fn lens() -> Galaxy {
    Galaxy::builder()
        .redshift(0.5)
        .mass(SphericalIsothermal::new([0.0, 0.0], EINSTEIN_RADIUS))
        .build()
        .unwrap()
}

fn source(centre: [f64; 2]) -> Galaxy {
    Galaxy::builder()
        .redshift(1.0)
        .light(SphericalGaussian::new(centre, 1.0, 0.1))
        .build()
        .unwrap()
}

#[test]
fn test_centred_source_forms_symmetric_ring() {
    let tracer = Tracer::from_galaxies(vec![source([0.0, 0.0]), lens()], grid_stack()).unwrap();
    assert_eq!(tracer.plane_redshifts(), vec![Some(0.5), Some(1.0)]);

    let image = tracer.image_plane_image().unwrap();
    assert_eq!(image.dim(), (21, 21));

    // Mirror symmetry about both axes.
    for ((row, col), &value) in image.indexed_iter() {
        assert_relative_eq!(value, image[[row, 20 - col]], epsilon = 1e-12, max_relative = 1e-10);
        assert_relative_eq!(value, image[[20 - row, col]], epsilon = 1e-12, max_relative = 1e-10);
    }

    // Brightest on the Einstein ring, faint at its centre.
    let on_ring = image[[10, 20]];
    assert!(on_ring > image[[10, 15]]);
    assert!(on_ring > 100.0 * image[[10, 10]]);
    assert_relative_eq!(on_ring, image[[0, 10]], max_relative = 1e-10);
}

#[test]
fn test_masked_pixels_stay_dark() {
    let tracer = Tracer::from_galaxies(vec![lens(), source([0.0, 0.0])], grid_stack()).unwrap();
    let image = tracer.image_plane_image().unwrap();
    // Corners lie outside the circular mask.
    assert_eq!(image[[0, 0]], 0.0);
    assert_eq!(image[[20, 20]], 0.0);
}

#[test]
fn test_true_model_fits_its_own_image() {
    let stack = grid_stack();
    let galaxies = vec![lens(), source([0.1, 0.0])];
    let tracer = Tracer::from_galaxies(galaxies, stack.clone()).unwrap();
    let data = tracer.image_plane_image_1d().unwrap();
    let noise = data.mapv(|_| 0.05);
    let image = LensingImage::from_1d(data, noise, stack.clone()).unwrap();

    let fit = LensingProfileFit::new(&image, &tracer, &NoBlurring, &FitSettings::default()).unwrap();
    assert_eq!(fit.chi_squared(), 0.0);
    assert_relative_eq!(fit.likelihood(), -0.5 * fit.noise_term());

    let shifted = Tracer::from_galaxies(vec![lens(), source([0.3, 0.0])], stack).unwrap();
    let worse = LensingProfileFit::new(&image, &shifted, &NoBlurring, &FitSettings::default()).unwrap();
    assert!(worse.likelihood() < fit.likelihood());
    assert!(worse.reduced_chi_squared() > 0.0);
}

#[test]
fn test_three_planes_compose_single_step_displacements() {
    let second_lens = Galaxy::builder()
        .redshift(0.8)
        .mass(SphericalIsothermal::new([0.2, -0.1], 0.3))
        .build()
        .unwrap();
    let tracer = Tracer::from_galaxies(vec![source([0.0, 0.0]), second_lens, lens()], grid_stack()).unwrap();
    assert_eq!(tracer.total_planes(), 3);

    let points = tracer.image_plane().grid_stack().sub().clone();
    let mut expected = points.clone();
    for plane in &tracer.planes()[..2] {
        expected = expected.deflected_by(&plane.deflections_of_grid(&expected)).unwrap();
    }
    assert_eq!(tracer.source_plane().grid_stack().sub(), &expected);
}

#[test]
fn test_ring_positions_converge_in_source_plane() {
    let tracer = Tracer::from_galaxies(vec![lens(), source([0.0, 0.0])], grid_stack()).unwrap();
    let ring = Grid::new(vec![[0.0, 1.0], [0.0, -1.0], [0.8, 0.6]]);
    let fit = PositionFit::from_tracer(&tracer, &[ring], 0.05).unwrap();
    assert!(fit.maximum_separation_within_threshold(1e-9));
    assert!(fit.likelihood().abs() < 1e-12);
}

#[test]
fn test_physical_scales_with_cosmology() {
    let settings = TracerSettings::default().with_cosmology(Arc::new(FlatLambdaCdm::planck15()));
    let tracer = Tracer::with_settings(vec![lens(), source([0.0, 0.0])], grid_stack(), &settings).unwrap();

    let lens_plane = tracer.image_plane().cosmology().unwrap();
    let sigma_crit = lens_plane.critical_density_arcsec.unwrap();
    assert_relative_eq!(sigma_crit, 118_702_091_952.922_15, max_relative = 1e-6);

    // Einstein mass of an SIS: π θ_E² Σ_crit.
    let mass = tracer.image_plane().masses_of_galaxies_within_circles(EINSTEIN_RADIUS, sigma_crit);
    assert_relative_eq!(mass[0], std::f64::consts::PI * sigma_crit, max_relative = 1e-6);
}
