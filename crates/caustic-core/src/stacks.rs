//! Planes and tracers evaluated on several grid stacks at once.
//!
//! Fitting more than one image of the same lens (different bands, or
//! different masks of one exposure) needs the same galaxies ray-traced
//! through several independent grid stacks. A [`PlaneStack`] holds one
//! [`Plane`] per grid stack over shared galaxy profiles; a [`TracerStack`]
//! propagates every grid stack through the same redshift-ordered planes.
//!
//! Per-stack quantities (images, deflection stacks, traced grids) come back
//! as one entry per grid stack, in input order. Mass maps, pixelization and
//! cosmology are taken from the first, primary grid stack.

use std::sync::Arc;

use caustic_cosmology::CosmologyProvider;
use ndarray::{Array1, Array2};

use crate::error::{LensingError, LensingResult};
use crate::galaxy::{Galaxy, GalaxyId};
use crate::grids::{Grid, GridStack};
use crate::pixelization::{Mapper, Regularization};
use crate::plane::{Plane, PlaneContext, PlaneCosmology};
use crate::plane_image::PlaneImage;
use crate::tracer::{group_redshifts, lens_and_source_groups, partition_by_redshift, plane_context, TracerSettings};

/// Galaxies at one redshift evaluated on every grid stack.
#[derive(Debug)]
pub struct PlaneStack {
    planes: Vec<Plane>,
}

impl PlaneStack {
    pub fn new(galaxies: Vec<Galaxy>, grid_stacks: Vec<GridStack>, compute_deflections: bool) -> LensingResult<Self> {
        Self::from_identified(enumerate(galaxies), grid_stacks, compute_deflections, None)
    }

    pub fn with_context(
        galaxies: Vec<Galaxy>,
        grid_stacks: Vec<GridStack>,
        compute_deflections: bool,
        context: PlaneContext,
    ) -> LensingResult<Self> {
        Self::from_identified(enumerate(galaxies), grid_stacks, compute_deflections, Some(context))
    }

    pub(crate) fn from_identified(
        galaxies: Vec<(GalaxyId, Galaxy)>,
        grid_stacks: Vec<GridStack>,
        compute_deflections: bool,
        context: Option<PlaneContext>,
    ) -> LensingResult<Self> {
        if grid_stacks.is_empty() {
            return Err(LensingError::RayTracing(
                "a plane stack needs at least one grid stack".into(),
            ));
        }
        let planes = grid_stacks
            .into_iter()
            .map(|grid_stack| Plane::from_identified(galaxies.clone(), grid_stack, compute_deflections, context.clone()))
            .collect::<LensingResult<Vec<_>>>()?;
        Ok(Self { planes })
    }

    /// One plane per grid stack, in input order.
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// The plane on the first grid stack.
    pub fn primary(&self) -> &Plane {
        &self.planes[0]
    }

    pub fn total_grid_stacks(&self) -> usize {
        self.planes.len()
    }

    pub fn galaxies(&self) -> &[Galaxy] {
        self.primary().galaxies()
    }

    pub fn galaxy_ids(&self) -> &[GalaxyId] {
        self.primary().galaxy_ids()
    }

    pub fn redshift(&self) -> Option<f64> {
        self.primary().redshift()
    }

    pub fn grid_stacks(&self) -> Vec<&GridStack> {
        self.planes.iter().map(Plane::grid_stack).collect()
    }

    /// `None` when deflections were not requested.
    pub fn deflection_stacks(&self) -> Option<Vec<&GridStack>> {
        self.planes.iter().map(Plane::deflection_stack).collect()
    }

    pub fn has_light_profile(&self) -> bool {
        self.primary().has_light_profile()
    }

    pub fn has_mass_profile(&self) -> bool {
        self.primary().has_mass_profile()
    }

    pub fn has_pixelization(&self) -> bool {
        self.primary().has_pixelization()
    }

    pub fn has_hyper_galaxy(&self) -> bool {
        self.primary().has_hyper_galaxy()
    }

    /// True when any grid stack is padded.
    pub fn has_padded_grid_stack(&self) -> bool {
        self.planes.iter().any(Plane::has_padded_grid_stack)
    }

    // ── Light ───────────────────────────────────────────────────────────────

    pub fn image_plane_images_1d(&self) -> LensingResult<Vec<Array1<f64>>> {
        self.planes.iter().map(Plane::image_plane_image_1d).collect()
    }

    pub fn image_plane_images(&self) -> LensingResult<Vec<Array2<f64>>> {
        self.planes.iter().map(Plane::image_plane_image).collect()
    }

    /// Fails unless every grid stack is padded.
    pub fn image_plane_images_for_simulation(&self) -> LensingResult<Vec<Array2<f64>>> {
        self.planes.iter().map(Plane::image_plane_image_for_simulation).collect()
    }

    /// Indexed `[stack][galaxy]`.
    pub fn image_plane_images_1d_of_galaxies(&self) -> LensingResult<Vec<Vec<Array1<f64>>>> {
        self.planes.iter().map(Plane::image_plane_image_1d_of_galaxies).collect()
    }

    pub fn image_plane_blurring_images_1d(&self) -> Vec<Array1<f64>> {
        self.planes.iter().map(Plane::image_plane_blurring_image_1d).collect()
    }

    pub fn plane_images(&self, shape: (usize, usize), buffer: f64) -> LensingResult<Vec<PlaneImage>> {
        self.planes.iter().map(|p| p.plane_image(shape, buffer)).collect()
    }

    // ── Mass, on the primary grid stack ─────────────────────────────────────

    pub fn surface_density(&self) -> LensingResult<Array2<f64>> {
        self.primary().surface_density()
    }

    pub fn potential(&self) -> LensingResult<Array2<f64>> {
        self.primary().potential()
    }

    pub fn deflections_1d(&self) -> LensingResult<Grid> {
        self.primary().deflections_1d()
    }

    pub fn deflections_y(&self) -> LensingResult<Array2<f64>> {
        self.primary().deflections_y()
    }

    pub fn deflections_x(&self) -> LensingResult<Array2<f64>> {
        self.primary().deflections_x()
    }

    /// Every grid stack displaced by its own deflection stack.
    pub fn trace_to_next_plane(&self) -> LensingResult<Vec<GridStack>> {
        self.planes.iter().map(Plane::trace_to_next_plane).collect()
    }

    pub fn mapper(&self) -> LensingResult<Option<Mapper>> {
        self.primary().mapper()
    }

    pub fn regularization(&self) -> LensingResult<Option<Arc<dyn Regularization>>> {
        self.primary().regularization()
    }

    pub fn cosmology(&self) -> LensingResult<&PlaneCosmology> {
        self.primary().cosmology()
    }
}

fn enumerate(galaxies: Vec<Galaxy>) -> Vec<(GalaxyId, Galaxy)> {
    galaxies.into_iter().enumerate().map(|(i, g)| (GalaxyId(i), g)).collect()
}

/// Redshift-ordered plane stacks with every grid stack propagated through them.
#[derive(Debug)]
pub struct TracerStack {
    planes: Vec<PlaneStack>,
    cosmology: Option<Arc<dyn CosmologyProvider>>,
}

impl TracerStack {
    pub fn from_galaxies(galaxies: Vec<Galaxy>, grid_stacks: Vec<GridStack>) -> LensingResult<Self> {
        Self::with_settings(galaxies, grid_stacks, &TracerSettings::default())
    }

    /// One plane stack per distinct redshift, grouped and ordered as for
    /// [`Tracer`](crate::tracer::Tracer).
    pub fn with_settings(
        galaxies: Vec<Galaxy>,
        grid_stacks: Vec<GridStack>,
        settings: &TracerSettings,
    ) -> LensingResult<Self> {
        let groups = partition_by_redshift(galaxies, settings.cosmology.is_some())?;
        Self::build(groups, grid_stacks, settings)
    }

    pub fn image_and_source_planes(
        lens_galaxies: Vec<Galaxy>,
        source_galaxies: Vec<Galaxy>,
        grid_stacks: Vec<GridStack>,
        settings: &TracerSettings,
    ) -> LensingResult<Self> {
        Self::build(lens_and_source_groups(lens_galaxies, source_galaxies), grid_stacks, settings)
    }

    fn build(
        groups: Vec<Vec<(GalaxyId, Galaxy)>>,
        grid_stacks: Vec<GridStack>,
        settings: &TracerSettings,
    ) -> LensingResult<Self> {
        let redshifts = group_redshifts(&groups)?;
        let total = groups.len();

        let mut planes = Vec::with_capacity(total);
        let mut grids = Some(grid_stacks);
        for (i, members) in groups.into_iter().enumerate() {
            let Some(current) = grids.take() else { break };
            let is_last = i + 1 == total;
            let context = plane_context(settings, &redshifts, i);
            let compute_deflections = !is_last || settings.compute_terminal_deflections;
            let plane = PlaneStack::from_identified(members, current, compute_deflections, context)?;
            if !is_last {
                grids = Some(plane.trace_to_next_plane()?);
            }
            planes.push(plane);
        }

        log::debug!(
            "Tracer stack built with {} planes over {} grid stacks",
            planes.len(),
            planes.first().map_or(0, PlaneStack::total_grid_stacks)
        );

        Ok(Self {
            planes,
            cosmology: settings.cosmology.clone(),
        })
    }

    pub fn planes(&self) -> &[PlaneStack] {
        &self.planes
    }

    pub fn total_planes(&self) -> usize {
        self.planes.len()
    }

    pub fn total_grid_stacks(&self) -> usize {
        self.image_plane().total_grid_stacks()
    }

    pub fn plane_redshifts(&self) -> Vec<Option<f64>> {
        self.planes.iter().map(PlaneStack::redshift).collect()
    }

    pub fn image_plane(&self) -> &PlaneStack {
        &self.planes[0]
    }

    pub fn source_plane(&self) -> &PlaneStack {
        &self.planes[self.planes.len() - 1]
    }

    pub fn cosmology(&self) -> Option<&Arc<dyn CosmologyProvider>> {
        self.cosmology.as_ref()
    }

    pub fn has_light_profile(&self) -> bool {
        self.planes.iter().any(PlaneStack::has_light_profile)
    }

    pub fn has_mass_profile(&self) -> bool {
        self.planes.iter().any(PlaneStack::has_mass_profile)
    }

    pub fn has_pixelization(&self) -> bool {
        self.planes.iter().any(PlaneStack::has_pixelization)
    }

    pub fn has_padded_grid_stack(&self) -> bool {
        self.image_plane().has_padded_grid_stack()
    }

    /// The grid stacks seen by each plane, indexed `[plane][stack]`.
    pub fn traced_grid_stacks_of_planes(&self) -> Vec<Vec<&GridStack>> {
        self.planes.iter().map(PlaneStack::grid_stacks).collect()
    }

    // ── Images ──────────────────────────────────────────────────────────────

    /// Per grid stack, the sum of every plane's image.
    pub fn image_plane_images_1d(&self) -> LensingResult<Vec<Array1<f64>>> {
        let mut totals = self.image_plane().image_plane_images_1d()?;
        for plane in &self.planes[1..] {
            for (total, image) in totals.iter_mut().zip(plane.image_plane_images_1d()?) {
                *total += &image;
            }
        }
        Ok(totals)
    }

    pub fn image_plane_images(&self) -> LensingResult<Vec<Array2<f64>>> {
        self.image_plane_images_1d()?
            .iter()
            .zip(self.image_plane().grid_stacks())
            .map(|(image, stack)| stack.mapping().map_to_2d(image))
            .collect()
    }

    pub fn image_plane_images_for_simulation(&self) -> LensingResult<Vec<Array2<f64>>> {
        let mut totals = self.image_plane().image_plane_images_for_simulation()?;
        for plane in &self.planes[1..] {
            for (total, image) in totals.iter_mut().zip(plane.image_plane_images_for_simulation()?) {
                *total += &image;
            }
        }
        Ok(totals)
    }

    /// Per grid stack, the sum of every plane's blurring-grid light.
    pub fn image_plane_blurring_images_1d(&self) -> Vec<Array1<f64>> {
        let mut totals = self.image_plane().image_plane_blurring_images_1d();
        for plane in &self.planes[1..] {
            for (total, image) in totals.iter_mut().zip(plane.image_plane_blurring_images_1d()) {
                *total += &image;
            }
        }
        totals
    }

    // ── Mass, on the primary grid stack ─────────────────────────────────────

    pub fn first_mass_plane(&self) -> Option<&PlaneStack> {
        self.planes.iter().find(|p| p.has_mass_profile())
    }

    fn zeros_2d(&self) -> Array2<f64> {
        Array2::zeros(self.image_plane().primary().grid_stack().shape())
    }

    pub fn surface_density(&self) -> LensingResult<Array2<f64>> {
        self.first_mass_plane()
            .map_or_else(|| Ok(self.zeros_2d()), PlaneStack::surface_density)
    }

    pub fn potential(&self) -> LensingResult<Array2<f64>> {
        self.first_mass_plane().map_or_else(|| Ok(self.zeros_2d()), PlaneStack::potential)
    }

    pub fn deflections_y(&self) -> LensingResult<Array2<f64>> {
        self.first_mass_plane()
            .map_or_else(|| Ok(self.zeros_2d()), PlaneStack::deflections_y)
    }

    pub fn deflections_x(&self) -> LensingResult<Array2<f64>> {
        self.first_mass_plane()
            .map_or_else(|| Ok(self.zeros_2d()), PlaneStack::deflections_x)
    }

    pub fn mappers_of_planes(&self) -> LensingResult<Vec<Mapper>> {
        let mut mappers = Vec::new();
        for plane in &self.planes {
            mappers.extend(plane.mapper()?);
        }
        Ok(mappers)
    }

    pub fn regularizations_of_planes(&self) -> LensingResult<Vec<Arc<dyn Regularization>>> {
        let mut regularizations = Vec::new();
        for plane in &self.planes {
            regularizations.extend(plane.regularization()?);
        }
        Ok(regularizations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grids::{Mask, Point};
    use crate::pixelization::{Constant, Rectangular};
    use crate::profiles::reference::SphericalIsothermal;
    use crate::profiles::LightProfile;
    use crate::tracer::Tracer;
    use approx::assert_relative_eq;
    use caustic_cosmology::FlatLambdaCdm;
    use ndarray::array;

    #[derive(Debug)]
    struct ConstantLight(f64);

    impl LightProfile for ConstantLight {
        fn name(&self) -> &str {
            "ConstantLight"
        }

        fn intensity_at(&self, _point: Point) -> f64 {
            self.0
        }
    }

    /// Linear in y so images differ between stacks.
    #[derive(Debug)]
    struct GradientLight;

    impl LightProfile for GradientLight {
        fn name(&self) -> &str {
            "GradientLight"
        }

        fn intensity_at(&self, point: Point) -> f64 {
            1.0 + point[0]
        }
    }

    fn stack_a() -> GridStack {
        GridStack::from_grids(
            Grid::new(vec![[1.0, 1.0], [-1.0, 2.0]]),
            Grid::new(vec![[1.0, 1.0], [-1.0, 2.0]]),
            Grid::new(vec![[3.0, 0.0]]),
            1,
        )
        .unwrap()
    }

    fn stack_b() -> GridStack {
        GridStack::from_grids(
            Grid::new(vec![[0.5, -1.0], [2.0, 0.0], [-2.0, -0.5]]),
            Grid::new(vec![[0.5, -1.0], [2.0, 0.0], [-2.0, -0.5]]),
            Grid::new(vec![[0.0, 3.0], [1.0, 1.0]]),
            1,
        )
        .unwrap()
    }

    fn lens(z: f64) -> Galaxy {
        Galaxy::builder()
            .redshift(z)
            .mass(SphericalIsothermal::new([0.0, 0.0], 1.0))
            .build()
            .unwrap()
    }

    fn light_at(z: f64) -> Galaxy {
        Galaxy::builder().redshift(z).light(GradientLight).build().unwrap()
    }

    #[test]
    fn test_plane_stack_needs_a_grid_stack() {
        assert!(matches!(
            PlaneStack::new(vec![lens(0.5)], vec![], true),
            Err(LensingError::RayTracing(_))
        ));
        assert!(PlaneStack::new(vec![], vec![stack_a()], true).is_err());
    }

    #[test]
    fn test_grid_stacks_kept_in_order_without_deflections() {
        let plane = PlaneStack::new(vec![lens(0.5)], vec![stack_a(), stack_b()], false).unwrap();
        assert_eq!(plane.total_grid_stacks(), 2);
        assert_eq!(plane.grid_stacks()[0].regular(), stack_a().regular());
        assert_eq!(plane.grid_stacks()[1].blurring(), stack_b().blurring());
        assert!(plane.deflection_stacks().is_none());
        assert!(plane.trace_to_next_plane().is_err());
    }

    #[test]
    fn test_deflection_stacks_per_grid_stack() {
        let plane = PlaneStack::new(vec![lens(0.5)], vec![stack_a(), stack_b()], true).unwrap();
        let deflections = plane.deflection_stacks().unwrap();
        for (stack, deflection) in [stack_a(), stack_b()].iter().zip(&deflections) {
            let expected = lens(0.5).deflections_from_grid(stack.sub());
            assert_eq!(deflection.sub(), &expected);
            assert_eq!(deflection.blurring().len(), stack.blurring().len());
        }

        let doubled = PlaneStack::new(vec![lens(0.5), lens(0.5)], vec![stack_a(), stack_b()], true).unwrap();
        for (single, double) in deflections.iter().zip(doubled.deflection_stacks().unwrap()) {
            for (s, d) in single.regular().iter().zip(double.regular().iter()) {
                assert_relative_eq!(d[0], 2.0 * s[0], epsilon = 1e-12);
                assert_relative_eq!(d[1], 2.0 * s[1], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_total_grid_stacks() {
        for count in 1..=3 {
            let stacks = vec![stack_a(); count];
            let plane = PlaneStack::new(vec![lens(0.5)], stacks, false).unwrap();
            assert_eq!(plane.total_grid_stacks(), count);
        }
    }

    #[test]
    fn test_padded_flag_is_any_stack() {
        let mask = Mask::from_array(array![[true, false]], 3.0).unwrap();
        let padded = GridStack::padded_from_mask(&mask, 2, (3, 3)).unwrap();

        let plain = PlaneStack::new(vec![lens(0.5)], vec![stack_a(), stack_b()], false).unwrap();
        assert!(!plain.has_padded_grid_stack());
        let mixed = PlaneStack::new(vec![lens(0.5)], vec![stack_a(), padded], false).unwrap();
        assert!(mixed.has_padded_grid_stack());
    }

    #[test]
    fn test_images_per_grid_stack() {
        let galaxies = vec![light_at(0.5), light_at(0.5)];
        let plane = PlaneStack::new(galaxies, vec![stack_a(), stack_b()], false).unwrap();

        let images = plane.image_plane_images_1d().unwrap();
        assert_eq!(images, vec![array![4.0, 0.0], array![3.0, 6.0, -2.0]]);
        assert_eq!(plane.image_plane_images().unwrap(), vec![array![[4.0, 0.0]], array![[3.0, 6.0, -2.0]]]);

        let of_galaxies = plane.image_plane_images_1d_of_galaxies().unwrap();
        assert_eq!(of_galaxies.len(), 2);
        assert_eq!(of_galaxies[0], vec![array![2.0, 0.0], array![2.0, 0.0]]);
        assert_eq!(of_galaxies[1], vec![array![1.5, 3.0, -1.0], array![1.5, 3.0, -1.0]]);

        assert_eq!(plane.image_plane_blurring_images_1d(), vec![array![8.0], array![2.0, 4.0]]);
    }

    #[test]
    fn test_images_for_simulation_per_padded_stack() {
        let mask = Mask::from_array(array![[true, false]], 3.0).unwrap();
        let first = GridStack::padded_from_mask(&mask, 2, (3, 3)).unwrap();
        let second = GridStack::padded_from_mask(&mask, 1, (1, 3)).unwrap();
        let galaxy = Galaxy::builder().redshift(0.5).light(ConstantLight(2.0)).build().unwrap();

        let plane = PlaneStack::new(vec![galaxy], vec![first, second], false).unwrap();
        let images = plane.image_plane_images_for_simulation().unwrap();
        assert_eq!(images[0], Array2::from_elem((3, 4), 2.0));
        assert_eq!(images[1], Array2::from_elem((1, 4), 2.0));
        assert_eq!(plane.image_plane_images().unwrap(), vec![array![[2.0, 2.0]], array![[2.0, 2.0]]]);

        let unpadded = PlaneStack::new(vec![light_at(0.5)], vec![stack_a()], false).unwrap();
        assert!(unpadded.image_plane_images_for_simulation().is_err());
    }

    #[test]
    fn test_mass_maps_use_the_primary_stack() {
        let plane = PlaneStack::new(vec![lens(0.5)], vec![stack_a(), stack_b()], true).unwrap();
        let single = Plane::new(vec![lens(0.5)], stack_a(), true).unwrap();
        assert_eq!(plane.surface_density().unwrap(), single.surface_density().unwrap());
        assert_eq!(plane.potential().unwrap(), single.potential().unwrap());
        assert_eq!(plane.deflections_y().unwrap(), single.deflections_y().unwrap());
        assert_eq!(plane.deflections_x().unwrap(), single.deflections_x().unwrap());
    }

    #[test]
    fn test_pixelization_from_primary_stack() {
        let pixelized = || {
            Galaxy::builder()
                .redshift(1.0)
                .pixelization(Rectangular::new((3, 3)).unwrap())
                .regularization(Constant::new(1.0))
                .build()
                .unwrap()
        };

        let plane = PlaneStack::new(vec![pixelized()], vec![stack_a(), stack_b()], false).unwrap();
        assert!(plane.mapper().unwrap().is_some());
        assert!(plane.regularization().unwrap().is_some());

        let none = PlaneStack::new(vec![light_at(1.0)], vec![stack_a(), stack_b()], false).unwrap();
        assert!(none.mapper().unwrap().is_none());

        let ambiguous = PlaneStack::new(vec![pixelized(), pixelized()], vec![stack_a(), stack_b()], false).unwrap();
        assert!(matches!(ambiguous.mapper(), Err(LensingError::Pixelization(_))));
    }

    #[test]
    fn test_plane_images_per_grid_stack() {
        let plane = PlaneStack::new(vec![light_at(0.5)], vec![stack_a(), stack_b()], false).unwrap();
        let images = plane.plane_images((3, 3), 0.0).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].shape(), (3, 3));
        assert_eq!(images[1].shape(), (3, 3));
        assert_ne!(images[0], images[1]);
    }

    #[test]
    fn test_tracer_stack_traces_each_grid_stack() {
        let galaxies = vec![lens(0.5), light_at(1.0)];
        let tracer = TracerStack::from_galaxies(galaxies.clone(), vec![stack_a(), stack_b()]).unwrap();
        assert_eq!(tracer.total_planes(), 2);
        assert_eq!(tracer.total_grid_stacks(), 2);
        assert_eq!(tracer.plane_redshifts(), vec![Some(0.5), Some(1.0)]);
        assert!(tracer.source_plane().deflection_stacks().is_none());

        for (k, stack) in [stack_a(), stack_b()].into_iter().enumerate() {
            let single = Tracer::from_galaxies(galaxies.clone(), stack).unwrap();
            let traced = tracer.traced_grid_stacks_of_planes();
            assert_eq!(traced[1][k].regular(), single.source_plane().grid_stack().regular());
            assert_eq!(traced[1][k].blurring(), single.source_plane().grid_stack().blurring());
            assert_eq!(tracer.image_plane_images_1d().unwrap()[k], single.image_plane_image_1d().unwrap());
            assert_eq!(tracer.image_plane_images().unwrap()[k], single.image_plane_image().unwrap());
            assert_eq!(
                tracer.image_plane_blurring_images_1d()[k],
                single.image_plane_blurring_image_1d()
            );
        }
    }

    #[test]
    fn test_tracer_stack_images_sum_planes() {
        let g0 = Galaxy::builder().redshift(0.5).light(ConstantLight(1.0)).build().unwrap();
        let g1 = Galaxy::builder().redshift(1.0).light(ConstantLight(2.0)).build().unwrap();
        let tracer = TracerStack::from_galaxies(vec![g1, g0], vec![stack_a(), stack_b()]).unwrap();
        assert_eq!(
            tracer.image_plane_images_1d().unwrap(),
            vec![array![3.0, 3.0], array![3.0, 3.0, 3.0]]
        );
        assert_eq!(tracer.image_plane_blurring_images_1d(), vec![array![3.0], array![3.0, 3.0]]);
    }

    #[test]
    fn test_tracer_stack_mass_and_pixelization() {
        let source = Galaxy::builder()
            .redshift(1.0)
            .pixelization(Rectangular::new((3, 3)).unwrap())
            .regularization(Constant::new(1.0))
            .build()
            .unwrap();
        let tracer = TracerStack::image_and_source_planes(
            vec![lens(0.5)],
            vec![source],
            vec![stack_a(), stack_b()],
            &TracerSettings::default(),
        )
        .unwrap();
        let single = Tracer::from_galaxies(vec![lens(0.5)], stack_a()).unwrap();
        assert_eq!(tracer.surface_density().unwrap(), single.surface_density().unwrap());
        assert_eq!(tracer.deflections_x().unwrap(), single.deflections_x().unwrap());
        assert_eq!(tracer.mappers_of_planes().unwrap().len(), 1);
        assert_eq!(tracer.regularizations_of_planes().unwrap().len(), 1);

        let massless = TracerStack::from_galaxies(vec![light_at(0.5)], vec![stack_a(), stack_b()]).unwrap();
        assert_eq!(massless.potential().unwrap(), Array2::<f64>::zeros((1, 2)));
    }

    #[test]
    fn test_tracer_stack_padded_images() {
        let mask = Mask::from_array(array![[true, false]], 3.0).unwrap();
        let padded = GridStack::padded_from_mask(&mask, 1, (3, 3)).unwrap();
        let g0 = Galaxy::builder().redshift(0.5).light(ConstantLight(1.0)).build().unwrap();
        let g1 = Galaxy::builder().redshift(1.0).light(ConstantLight(0.5)).build().unwrap();

        let tracer = TracerStack::from_galaxies(vec![g0, g1], vec![padded.clone(), padded]).unwrap();
        assert!(tracer.has_padded_grid_stack());
        let images = tracer.image_plane_images_for_simulation().unwrap();
        assert_eq!(images, vec![Array2::from_elem((3, 4), 1.5); 2]);
    }

    #[test]
    fn test_tracer_stack_carries_cosmology() {
        let settings = TracerSettings::default().with_cosmology(Arc::new(FlatLambdaCdm::planck15()));
        let tracer =
            TracerStack::with_settings(vec![lens(0.5), light_at(1.0)], vec![stack_a(), stack_b()], &settings).unwrap();
        assert!(tracer.cosmology().is_some());
        let image_plane = tracer.image_plane();
        let single = Plane::with_context(
            vec![lens(0.5)],
            stack_a(),
            true,
            PlaneContext {
                cosmology: Arc::new(FlatLambdaCdm::planck15()),
                previous_redshift: None,
                next_redshift: Some(1.0),
            },
        )
        .unwrap();
        assert_relative_eq!(
            image_plane.cosmology().unwrap().arcsec_per_kpc,
            single.cosmology().unwrap().arcsec_per_kpc,
            max_relative = 1e-12
        );
    }
}
