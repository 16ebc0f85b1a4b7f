//! Property-based tests for plane ordering and ray propagation.

use caustic_core::profiles::reference::SphericalIsothermal;
use caustic_core::{Galaxy, GalaxyId, Grid, GridStack, Tracer};
use proptest::prelude::*;

fn stack(points: Vec<[f64; 2]>) -> GridStack {
    let grid = Grid::new(points);
    GridStack::from_grids(grid.clone(), grid, Grid::new(vec![[0.3, -0.7]]), 1).unwrap()
}

fn galaxy(redshift: f64, einstein_radius: f64) -> Galaxy {
    Galaxy::builder()
        .redshift(redshift)
        .mass(SphericalIsothermal::new([0.0, 0.0], einstein_radius))
        .build()
        .unwrap()
}

fn point() -> impl Strategy<Value = [f64; 2]> {
    (-2.0f64..2.0, -2.0f64..2.0).prop_map(|(y, x)| [y, x])
}

proptest! {
    /// Planes are strictly ascending in redshift, each plane is
    /// redshift-homogeneous and keeps its galaxies in input order.
    #[test]
    fn planes_ordered_and_homogeneous(redshifts in prop::collection::vec(prop::sample::select(vec![0.2, 0.5, 0.5, 1.0, 2.0]), 1..8)) {
        let galaxies = redshifts.iter().map(|&z| galaxy(z, 0.1)).collect();
        let tracer = Tracer::from_galaxies(galaxies, stack(vec![[0.5, 0.5]])).unwrap();

        let plane_redshifts: Vec<f64> = tracer.plane_redshifts().into_iter().flatten().collect();
        prop_assert_eq!(plane_redshifts.len(), tracer.total_planes());
        prop_assert!(plane_redshifts.windows(2).all(|w| w[0] < w[1]));

        let mut seen = 0;
        for plane in tracer.planes() {
            let z = plane.redshift();
            prop_assert!(plane.galaxies().iter().all(|g| g.redshift() == z));
            prop_assert!(plane.galaxy_ids().windows(2).all(|w| w[0] < w[1]));
            for &GalaxyId(i) in plane.galaxy_ids() {
                prop_assert_eq!(Some(redshifts[i]), z);
            }
            seen += plane.galaxies().len();
        }
        prop_assert_eq!(seen, redshifts.len());
    }

    /// Each plane's grids are the previous plane's grids minus the previous
    /// plane's deflections at those grids.
    #[test]
    fn propagation_is_single_step_composition(
        points in prop::collection::vec(point(), 1..6),
        radii in prop::collection::vec(0.05f64..1.5, 1..4),
    ) {
        let mut galaxies: Vec<Galaxy> = radii
            .iter()
            .enumerate()
            .map(|(i, &r)| galaxy(0.1 * (i + 1) as f64, r))
            .collect();
        galaxies.push(galaxy(5.0, 0.0));
        let tracer = Tracer::from_galaxies(galaxies, stack(points)).unwrap();
        prop_assert_eq!(tracer.total_planes(), radii.len() + 1);

        for pair in tracer.planes().windows(2) {
            let (this, next) = (&pair[0], &pair[1]);
            for grid in [
                (this.grid_stack().regular(), next.grid_stack().regular()),
                (this.grid_stack().sub(), next.grid_stack().sub()),
                (this.grid_stack().blurring(), next.grid_stack().blurring()),
            ] {
                let expected = grid.0.deflected_by(&this.deflections_of_grid(grid.0)).unwrap();
                prop_assert_eq!(grid.1, &expected);
            }
        }
    }

    /// Tracing arbitrary positions agrees with the propagated grid stack.
    #[test]
    fn traced_positions_match_source_plane(points in prop::collection::vec(point(), 1..6)) {
        let galaxies = vec![galaxy(0.5, 0.8), galaxy(1.0, 0.2), galaxy(2.0, 0.0)];
        let tracer = Tracer::from_galaxies(galaxies, stack(points.clone())).unwrap();
        let traced = tracer.traced_positions(&Grid::new(points)).unwrap();
        prop_assert_eq!(traced.last().unwrap(), tracer.source_plane().grid_stack().regular());
    }
}
