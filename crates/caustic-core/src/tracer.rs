//! Multi-plane ray tracing.
//!
//! A [`Tracer`] partitions galaxies into planes by redshift, orders the
//! planes by ascending redshift and propagates the input grid stack through
//! them. Plane 0 sees the input grid verbatim; plane *i + 1* sees plane
//! *i*'s grid displaced by plane *i*'s own deflection field:
//!
//! $\vec\theta_{i+1} = \vec\theta_i - \vec\alpha_i(\vec\theta_i)$
//!
//! This is a single-step displacement per transition. The cosmological
//! distances each plane carries are used for physical-unit conversions only
//! and do not rescale the deflections.
//!
//! Galaxies without a redshift form one implicit plane placed first, ahead
//! of every redshift-bearing plane. Mixing the two is rejected when a
//! cosmology is supplied, since the implicit plane has no distance.

use std::collections::BTreeMap;
use std::sync::Arc;

use caustic_cosmology::CosmologyProvider;
use ndarray::{Array1, Array2};

use crate::error::{LensingError, LensingResult};
use crate::fit::HyperImages;
use crate::galaxy::{Galaxy, GalaxyId};
use crate::grids::{Grid, GridStack};
use crate::pixelization::{Mapper, Regularization};
use crate::plane::{Plane, PlaneContext};
use crate::plane_image::PlaneImage;

/// Options for tracer construction.
#[derive(Debug, Clone, Default)]
pub struct TracerSettings {
    /// Cosmology for physical-unit conversions. `None` disables them.
    pub cosmology: Option<Arc<dyn CosmologyProvider>>,
    /// Also compute the last plane's deflection stack (diagnostics only).
    pub compute_terminal_deflections: bool,
}

impl TracerSettings {
    pub fn with_cosmology(mut self, cosmology: Arc<dyn CosmologyProvider>) -> Self {
        self.cosmology = Some(cosmology);
        self
    }

    pub fn with_terminal_deflections(mut self, compute: bool) -> Self {
        self.compute_terminal_deflections = compute;
        self
    }
}

/// Redshift-ordered planes with a grid stack propagated through them.
#[derive(Debug)]
pub struct Tracer {
    planes: Vec<Plane>,
    cosmology: Option<Arc<dyn CosmologyProvider>>,
}

impl Tracer {
    /// Multi-plane tracer without cosmology.
    pub fn from_galaxies(galaxies: Vec<Galaxy>, grid_stack: GridStack) -> LensingResult<Self> {
        Self::with_settings(galaxies, grid_stack, &TracerSettings::default())
    }

    /// Multi-plane tracer: one plane per distinct redshift.
    ///
    /// Galaxies sharing a redshift are merged into one plane in their input
    /// order. Each galaxy's [`GalaxyId`] is its index in `galaxies`.
    pub fn with_settings(
        galaxies: Vec<Galaxy>,
        grid_stack: GridStack,
        settings: &TracerSettings,
    ) -> LensingResult<Self> {
        let groups = partition_by_redshift(galaxies, settings.cosmology.is_some())?;
        Self::build(groups, grid_stack, settings)
    }

    /// Two explicit planes, regardless of redshift: the lens galaxies
    /// deflect the grid seen by the source galaxies.
    pub fn image_and_source_planes(
        lens_galaxies: Vec<Galaxy>,
        source_galaxies: Vec<Galaxy>,
        grid_stack: GridStack,
        settings: &TracerSettings,
    ) -> LensingResult<Self> {
        Self::build(lens_and_source_groups(lens_galaxies, source_galaxies), grid_stack, settings)
    }

    /// A single plane; nothing is ray-traced.
    pub fn image_plane_only(
        galaxies: Vec<Galaxy>,
        grid_stack: GridStack,
        settings: &TracerSettings,
    ) -> LensingResult<Self> {
        let plane = galaxies.into_iter().enumerate().map(|(i, g)| (GalaxyId(i), g)).collect();
        Self::build(vec![plane], grid_stack, settings)
    }

    fn build(
        groups: Vec<Vec<(GalaxyId, Galaxy)>>,
        grid_stack: GridStack,
        settings: &TracerSettings,
    ) -> LensingResult<Self> {
        let redshifts = group_redshifts(&groups)?;
        let total = groups.len();

        let mut planes = Vec::with_capacity(total);
        let mut grid = Some(grid_stack);
        for (i, members) in groups.into_iter().enumerate() {
            let Some(current) = grid.take() else { break };
            let is_last = i + 1 == total;
            let context = plane_context(settings, &redshifts, i);
            let compute_deflections = !is_last || settings.compute_terminal_deflections;
            let plane = Plane::from_identified(members, current, compute_deflections, context)?;
            if !is_last {
                grid = Some(plane.trace_to_next_plane()?);
            }
            planes.push(plane);
        }

        log::debug!("Tracer built with {} planes at redshifts {:?}", planes.len(), redshifts);

        Ok(Self {
            planes,
            cosmology: settings.cosmology.clone(),
        })
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn total_planes(&self) -> usize {
        self.planes.len()
    }

    pub fn plane_redshifts(&self) -> Vec<Option<f64>> {
        self.planes.iter().map(Plane::redshift).collect()
    }

    /// The first plane, which sees the input grid stack.
    pub fn image_plane(&self) -> &Plane {
        &self.planes[0]
    }

    /// The last plane.
    pub fn source_plane(&self) -> &Plane {
        &self.planes[self.planes.len() - 1]
    }

    pub fn cosmology(&self) -> Option<&Arc<dyn CosmologyProvider>> {
        self.cosmology.as_ref()
    }

    /// Every galaxy, in plane order.
    pub fn galaxies(&self) -> impl Iterator<Item = (GalaxyId, &Galaxy)> {
        self.planes
            .iter()
            .flat_map(|p| p.galaxy_ids().iter().copied().zip(p.galaxies()))
    }

    pub fn has_light_profile(&self) -> bool {
        self.planes.iter().any(Plane::has_light_profile)
    }

    pub fn has_mass_profile(&self) -> bool {
        self.planes.iter().any(Plane::has_mass_profile)
    }

    pub fn has_pixelization(&self) -> bool {
        self.planes.iter().any(Plane::has_pixelization)
    }

    pub fn has_hyper_galaxy(&self) -> bool {
        self.planes.iter().any(Plane::has_hyper_galaxy)
    }

    pub fn has_padded_grid_stack(&self) -> bool {
        self.image_plane().has_padded_grid_stack()
    }

    // ── Images ──────────────────────────────────────────────────────────────

    /// Sum of every plane's sub-grid-averaged image.
    pub fn image_plane_image_1d(&self) -> LensingResult<Array1<f64>> {
        let mut total = Array1::zeros(self.image_plane().grid_stack().regular().len());
        for image in self.image_plane_images_1d_of_planes()? {
            total += &image;
        }
        Ok(total)
    }

    pub fn image_plane_image(&self) -> LensingResult<Array2<f64>> {
        self.image_plane().grid_stack().mapping().map_to_2d(&self.image_plane_image_1d()?)
    }

    /// The composite image on the whole padded array; requires a padded
    /// input grid stack.
    pub fn image_plane_image_for_simulation(&self) -> LensingResult<Array2<f64>> {
        let mut total = Array2::zeros(self.image_plane().grid_stack().mapping().shape());
        for plane in &self.planes {
            total += &plane.image_plane_image_for_simulation()?;
        }
        Ok(total)
    }

    pub fn image_plane_images_1d_of_planes(&self) -> LensingResult<Vec<Array1<f64>>> {
        self.planes.iter().map(Plane::image_plane_image_1d).collect()
    }

    pub fn image_plane_images_of_planes(&self) -> LensingResult<Vec<Array2<f64>>> {
        self.planes.iter().map(Plane::image_plane_image).collect()
    }

    pub fn image_plane_blurring_image_1d(&self) -> Array1<f64> {
        let mut total = Array1::zeros(self.image_plane().grid_stack().blurring().len());
        for image in self.image_plane_blurring_images_1d_of_planes() {
            total += &image;
        }
        total
    }

    pub fn image_plane_blurring_images_1d_of_planes(&self) -> Vec<Array1<f64>> {
        self.planes.iter().map(Plane::image_plane_blurring_image_1d).collect()
    }

    /// Each galaxy's image-plane image, keyed by its identity.
    pub fn image_plane_images_1d_of_galaxies(&self) -> LensingResult<BTreeMap<GalaxyId, Array1<f64>>> {
        let mut images = BTreeMap::new();
        for plane in &self.planes {
            let ids = plane.galaxy_ids().iter().copied();
            images.extend(ids.zip(plane.image_plane_image_1d_of_galaxies()?));
        }
        Ok(images)
    }

    // ── Mass ────────────────────────────────────────────────────────────────

    /// The first plane containing mass, if any.
    pub fn first_mass_plane(&self) -> Option<&Plane> {
        self.planes.iter().find(|p| p.has_mass_profile())
    }

    fn zeros_2d(&self) -> Array2<f64> {
        Array2::zeros(self.image_plane().grid_stack().shape())
    }

    /// Convergence of the first mass-bearing plane; zeros without mass.
    pub fn surface_density(&self) -> LensingResult<Array2<f64>> {
        self.first_mass_plane()
            .map_or_else(|| Ok(self.zeros_2d()), Plane::surface_density)
    }

    pub fn potential(&self) -> LensingResult<Array2<f64>> {
        self.first_mass_plane().map_or_else(|| Ok(self.zeros_2d()), Plane::potential)
    }

    pub fn deflections_y(&self) -> LensingResult<Array2<f64>> {
        self.first_mass_plane()
            .map_or_else(|| Ok(self.zeros_2d()), Plane::deflections_y)
    }

    pub fn deflections_x(&self) -> LensingResult<Array2<f64>> {
        self.first_mass_plane()
            .map_or_else(|| Ok(self.zeros_2d()), Plane::deflections_x)
    }

    /// Positions seen by every plane, tracing `positions` through each
    /// plane's galaxies. The last entry lies in the source plane.
    pub fn traced_positions(&self, positions: &Grid) -> LensingResult<Vec<Grid>> {
        let mut traced = Vec::with_capacity(self.planes.len());
        let mut current = positions.clone();
        for plane in &self.planes[..self.planes.len() - 1] {
            let next = current.deflected_by(&plane.deflections_of_grid(&current))?;
            traced.push(std::mem::replace(&mut current, next));
        }
        traced.push(current);
        Ok(traced)
    }

    // ── Pixelizations ───────────────────────────────────────────────────────

    /// One mapper per plane with a pixelized galaxy, in plane order.
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

    // ── Hyper noise ─────────────────────────────────────────────────────────

    /// Extra noise contributed by every hyper galaxy.
    ///
    /// `hyper.galaxy_images` and `hyper.minimum_values` are indexed in
    /// [`galaxies`](Self::galaxies) order. Galaxies without hyper parameters
    /// contribute nothing.
    pub fn hyper_noise_map_1d(&self, hyper: &HyperImages, noise_map: &Array1<f64>) -> LensingResult<Array1<f64>> {
        let galaxies: Vec<_> = self.galaxies().collect();
        if hyper.galaxy_images.len() != galaxies.len() || hyper.minimum_values.len() != galaxies.len() {
            return Err(LensingError::Fit(format!(
                "tracer has {} galaxies but {} hyper galaxy images and {} minimum values were supplied",
                galaxies.len(),
                hyper.galaxy_images.len(),
                hyper.minimum_values.len()
            )));
        }

        let mut total = Array1::zeros(noise_map.len());
        for (((_, galaxy), image), &minimum) in galaxies.iter().zip(&hyper.galaxy_images).zip(&hyper.minimum_values) {
            if let Some(hyper_galaxy) = galaxy.hyper_galaxy() {
                let contributions = hyper_galaxy.contributions(&hyper.model_image, image, minimum)?;
                if contributions.len() != noise_map.len() {
                    return Err(LensingError::Fit(format!(
                        "hyper images have {} pixels but the noise map has {}",
                        contributions.len(),
                        noise_map.len()
                    )));
                }
                total += &hyper_galaxy.hyper_noise(noise_map, &contributions);
            }
        }
        Ok(total)
    }

    /// Every plane's light on a uniform grid spanning that plane's grid.
    pub fn plane_images(&self, shape: (usize, usize), buffer: f64) -> LensingResult<Vec<PlaneImage>> {
        self.planes.iter().map(|p| p.plane_image(shape, buffer)).collect()
    }
}

/// Lens galaxies keep ids `0..n`; source ids follow on.
pub(crate) fn lens_and_source_groups(
    lens_galaxies: Vec<Galaxy>,
    source_galaxies: Vec<Galaxy>,
) -> Vec<Vec<(GalaxyId, Galaxy)>> {
    let lens_count = lens_galaxies.len();
    let lens = lens_galaxies
        .into_iter()
        .enumerate()
        .map(|(i, g)| (GalaxyId(i), g))
        .collect();
    let source = source_galaxies
        .into_iter()
        .enumerate()
        .map(|(i, g)| (GalaxyId(lens_count + i), g))
        .collect();
    vec![lens, source]
}

/// Redshift of each plane group; an empty list of groups is rejected.
pub(crate) fn group_redshifts(groups: &[Vec<(GalaxyId, Galaxy)>]) -> LensingResult<Vec<Option<f64>>> {
    if groups.is_empty() {
        return Err(LensingError::RayTracing(
            "no galaxies were supplied to the tracer".into(),
        ));
    }
    Ok(groups
        .iter()
        .map(|members| members.first().and_then(|(_, g)| g.redshift()))
        .collect())
}

/// Cosmology and neighbouring redshifts for plane `index`.
pub(crate) fn plane_context(settings: &TracerSettings, redshifts: &[Option<f64>], index: usize) -> Option<PlaneContext> {
    settings.cosmology.as_ref().map(|cosmology| PlaneContext {
        cosmology: Arc::clone(cosmology),
        previous_redshift: index.checked_sub(1).and_then(|p| redshifts[p]),
        next_redshift: redshifts.get(index + 1).copied().flatten(),
    })
}

/// Group galaxies by exact redshift, ascending, redshift-less group first.
pub(crate) fn partition_by_redshift(
    galaxies: Vec<Galaxy>,
    has_cosmology: bool,
) -> LensingResult<Vec<Vec<(GalaxyId, Galaxy)>>> {
    if galaxies.is_empty() {
        return Err(LensingError::RayTracing(
            "no galaxies were supplied to the tracer".into(),
        ));
    }

    let mut unplaced = Vec::new();
    let mut groups: Vec<(f64, Vec<(GalaxyId, Galaxy)>)> = Vec::new();
    for (i, galaxy) in galaxies.into_iter().enumerate() {
        let id = GalaxyId(i);
        match galaxy.redshift() {
            None => unplaced.push((id, galaxy)),
            Some(z) => match groups.iter_mut().find(|(gz, _)| *gz == z) {
                Some((_, members)) => members.push((id, galaxy)),
                None => groups.push((z, vec![(id, galaxy)])),
            },
        }
    }

    if has_cosmology && !unplaced.is_empty() && !groups.is_empty() {
        return Err(LensingError::RayTracing(format!(
            "a galaxy was not correctly allocated a plane: {} galaxies have no redshift \
             while others do, so their neighbouring-plane distances are undefined",
            unplaced.len()
        )));
    }

    groups.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut ordered = Vec::with_capacity(groups.len() + 1);
    if !unplaced.is_empty() {
        ordered.push(unplaced);
    }
    ordered.extend(groups.into_iter().map(|(_, members)| members));
    Ok(ordered)
}
