//! A lens plane: galaxies sharing one redshift, evaluated on one grid stack.
//!
//! The deflection stack is computed eagerly at construction when requested,
//! by summing every galaxy's mass-profile deflections over the regular, sub
//! and blurring grids independently. Every other quantity is evaluated on
//! demand. Light and mass quantities are evaluated on the sub grid and
//! averaged down to one value per regular pixel; blurring quantities use the
//! blurring grid directly.
//!
//! Cosmological scalars are only needed for physical-unit conversions and are
//! computed lazily, once, from the [`PlaneContext`] supplied by the tracer.

use std::sync::{Arc, OnceLock};

use caustic_cosmology::constants::critical_surface_density_kpc;
use caustic_cosmology::CosmologyProvider;
use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::error::{LensingError, LensingResult};
use crate::galaxy::{Galaxy, GalaxyId, HyperGalaxy};
use crate::grids::{Grid, GridStack};
use crate::pixelization::{Mapper, Regularization};
use crate::plane_image::{plane_image_from_galaxies, PlaneImage};

/// Cosmology and neighbouring-plane redshifts for physical-unit conversions.
#[derive(Debug, Clone)]
pub struct PlaneContext {
    pub cosmology: Arc<dyn CosmologyProvider>,
    pub previous_redshift: Option<f64>,
    pub next_redshift: Option<f64>,
}

/// Physical scales of a plane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaneCosmology {
    pub redshift: f64,
    pub arcsec_per_kpc: f64,
    pub kpc_per_arcsec: f64,
    pub angular_diameter_distance_to_earth_kpc: f64,
    pub angular_diameter_distance_to_previous_plane_kpc: Option<f64>,
    pub angular_diameter_distance_to_next_plane_kpc: Option<f64>,
    pub angular_diameter_distance_of_next_plane_to_earth_kpc: Option<f64>,
    /// Critical surface density (M☉ kpc⁻²); requires a next plane.
    pub critical_density_kpc: Option<f64>,
    /// Critical surface density (M☉ arcsec⁻²); requires a next plane.
    pub critical_density_arcsec: Option<f64>,
}

impl PlaneCosmology {
    pub fn compute(redshift: f64, context: &PlaneContext) -> LensingResult<Self> {
        let cosmo = &context.cosmology;
        let arcsec_per_kpc = cosmo.arcsec_per_kpc_proper(redshift)?;
        let kpc_per_arcsec = 1.0 / arcsec_per_kpc;
        let to_earth = cosmo.angular_diameter_distance_kpc(redshift)?;

        let to_previous = context
            .previous_redshift
            .map(|z_prev| cosmo.angular_diameter_distance_z1z2_kpc(z_prev, redshift))
            .transpose()?;

        let (to_next, next_to_earth) = match context.next_redshift {
            Some(z_next) => (
                Some(cosmo.angular_diameter_distance_z1z2_kpc(redshift, z_next)?),
                Some(cosmo.angular_diameter_distance_kpc(z_next)?),
            ),
            None => (None, None),
        };

        let critical_density_kpc = match (to_next, next_to_earth) {
            (Some(d_ls), Some(d_s)) => Some(critical_surface_density_kpc(d_s, d_ls, to_earth)),
            _ => None,
        };

        Ok(Self {
            redshift,
            arcsec_per_kpc,
            kpc_per_arcsec,
            angular_diameter_distance_to_earth_kpc: to_earth,
            angular_diameter_distance_to_previous_plane_kpc: to_previous,
            angular_diameter_distance_to_next_plane_kpc: to_next,
            angular_diameter_distance_of_next_plane_to_earth_kpc: next_to_earth,
            critical_density_kpc,
            critical_density_arcsec: critical_density_kpc.map(|c| c * kpc_per_arcsec * kpc_per_arcsec),
        })
    }
}

/// Galaxies at one redshift and the grids they are evaluated on.
#[derive(Debug)]
pub struct Plane {
    galaxies: Vec<Galaxy>,
    galaxy_ids: Vec<GalaxyId>,
    redshift: Option<f64>,
    grid_stack: GridStack,
    deflection_stack: Option<GridStack>,
    context: Option<PlaneContext>,
    cosmology: OnceLock<PlaneCosmology>,
}

impl Plane {
    /// Build a plane without cosmological context.
    ///
    /// # Arguments
    /// * `galaxies` - Non-empty, redshift-homogeneous galaxies.
    /// * `grid_stack` - Grids the plane is evaluated on.
    /// * `compute_deflections` - Compute the deflection stack now.
    pub fn new(galaxies: Vec<Galaxy>, grid_stack: GridStack, compute_deflections: bool) -> LensingResult<Self> {
        Self::from_identified(enumerate(galaxies), grid_stack, compute_deflections, None)
    }

    /// Build a plane that can derive physical scales from `context`.
    pub fn with_context(
        galaxies: Vec<Galaxy>,
        grid_stack: GridStack,
        compute_deflections: bool,
        context: PlaneContext,
    ) -> LensingResult<Self> {
        Self::from_identified(enumerate(galaxies), grid_stack, compute_deflections, Some(context))
    }

    pub(crate) fn from_identified(
        galaxies: Vec<(GalaxyId, Galaxy)>,
        grid_stack: GridStack,
        compute_deflections: bool,
        context: Option<PlaneContext>,
    ) -> LensingResult<Self> {
        let redshift = match galaxies.first() {
            Some((_, galaxy)) => galaxy.redshift(),
            None => {
                return Err(LensingError::RayTracing(
                    "a plane must contain at least one galaxy".into(),
                ))
            }
        };
        if let Some((id, galaxy)) = galaxies.iter().find(|(_, g)| g.redshift() != redshift) {
            return Err(LensingError::RayTracing(format!(
                "{id} has redshift {:?} but its plane is at {:?}; all galaxies in a plane must share one redshift",
                galaxy.redshift(),
                redshift
            )));
        }

        let (galaxy_ids, galaxies): (Vec<_>, Vec<_>) = galaxies.into_iter().unzip();
        let deflection_stack =
            compute_deflections.then(|| grid_stack.map_grids(|grid| sum_deflections(&galaxies, grid)));

        log::debug!(
            "Plane at z = {:?}: {} galaxies, {} regular / {} sub / {} blurring points, deflections {}",
            redshift,
            galaxies.len(),
            grid_stack.regular().len(),
            grid_stack.sub().len(),
            grid_stack.blurring().len(),
            if deflection_stack.is_some() { "computed" } else { "skipped" }
        );

        Ok(Self {
            galaxies,
            galaxy_ids,
            redshift,
            grid_stack,
            deflection_stack,
            context,
            cosmology: OnceLock::new(),
        })
    }

    pub fn galaxies(&self) -> &[Galaxy] {
        &self.galaxies
    }

    pub fn galaxy_ids(&self) -> &[GalaxyId] {
        &self.galaxy_ids
    }

    pub fn redshift(&self) -> Option<f64> {
        self.redshift
    }

    pub fn galaxy_redshifts(&self) -> Vec<Option<f64>> {
        self.galaxies.iter().map(Galaxy::redshift).collect()
    }

    pub fn grid_stack(&self) -> &GridStack {
        &self.grid_stack
    }

    pub fn has_padded_grid_stack(&self) -> bool {
        self.grid_stack.is_padded()
    }

    /// `None` when deflections were not requested (the terminal plane).
    pub fn deflection_stack(&self) -> Option<&GridStack> {
        self.deflection_stack.as_ref()
    }

    pub fn has_light_profile(&self) -> bool {
        self.galaxies.iter().any(Galaxy::has_light_profile)
    }

    pub fn has_mass_profile(&self) -> bool {
        self.galaxies.iter().any(Galaxy::has_mass_profile)
    }

    pub fn has_pixelization(&self) -> bool {
        self.galaxies.iter().any(Galaxy::has_pixelization)
    }

    pub fn has_regularization(&self) -> bool {
        self.galaxies.iter().any(Galaxy::has_regularization)
    }

    pub fn has_hyper_galaxy(&self) -> bool {
        self.galaxies.iter().any(Galaxy::has_hyper_galaxy)
    }

    /// One entry per galaxy, in plane order.
    pub fn hyper_galaxies(&self) -> Vec<Option<HyperGalaxy>> {
        self.galaxies.iter().map(|g| g.hyper_galaxy().copied()).collect()
    }

    // ── Light ───────────────────────────────────────────────────────────────

    /// Sub-grid-averaged light of every galaxy, one value per regular pixel.
    pub fn image_plane_image_1d(&self) -> LensingResult<Array1<f64>> {
        let sub = sum_arrays(&self.galaxies, self.grid_stack.sub(), Galaxy::intensities_from_grid);
        self.grid_stack.mapping().sub_to_regular_average(&sub)
    }

    /// [`image_plane_image_1d`](Self::image_plane_image_1d) on the 2D data array.
    pub fn image_plane_image(&self) -> LensingResult<Array2<f64>> {
        self.grid_stack.mapping().map_to_2d(&self.image_plane_image_1d()?)
    }

    /// The image on the whole padded array, PSF border included, as needed
    /// to simulate data before convolution.
    pub fn image_plane_image_for_simulation(&self) -> LensingResult<Array2<f64>> {
        if !self.has_padded_grid_stack() {
            return Err(LensingError::RayTracing(
                "an image for simulation requires a padded grid stack".into(),
            ));
        }
        self.grid_stack.mapping().map_to_2d_keep_padded(&self.image_plane_image_1d()?)
    }

    /// One sub-grid-averaged image per galaxy, in plane order.
    pub fn image_plane_image_1d_of_galaxies(&self) -> LensingResult<Vec<Array1<f64>>> {
        self.galaxies
            .iter()
            .map(|g| {
                let sub = g.intensities_from_grid(self.grid_stack.sub());
                self.grid_stack.mapping().sub_to_regular_average(&sub)
            })
            .collect()
    }

    /// Light on the blurring grid.
    pub fn image_plane_blurring_image_1d(&self) -> Array1<f64> {
        sum_arrays(&self.galaxies, self.grid_stack.blurring(), Galaxy::intensities_from_grid)
    }

    pub fn image_plane_blurring_images_1d_of_galaxies(&self) -> Vec<Array1<f64>> {
        self.galaxies
            .iter()
            .map(|g| g.intensities_from_grid(self.grid_stack.blurring()))
            .collect()
    }

    // ── Mass ────────────────────────────────────────────────────────────────

    /// Sub-grid-averaged convergence; zeros when no galaxy has mass.
    pub fn surface_density_1d(&self) -> LensingResult<Array1<f64>> {
        let sub = sum_arrays(&self.galaxies, self.grid_stack.sub(), Galaxy::surface_density_from_grid);
        self.grid_stack.mapping().sub_to_regular_average(&sub)
    }

    pub fn surface_density(&self) -> LensingResult<Array2<f64>> {
        self.grid_stack.mapping().map_to_2d(&self.surface_density_1d()?)
    }

    /// Sub-grid-averaged lensing potential; zeros when no galaxy has mass.
    pub fn potential_1d(&self) -> LensingResult<Array1<f64>> {
        let sub = sum_arrays(&self.galaxies, self.grid_stack.sub(), Galaxy::potential_from_grid);
        self.grid_stack.mapping().sub_to_regular_average(&sub)
    }

    pub fn potential(&self) -> LensingResult<Array2<f64>> {
        self.grid_stack.mapping().map_to_2d(&self.potential_1d()?)
    }

    /// Sub-grid-averaged deflections, reusing the deflection stack when present.
    pub fn deflections_1d(&self) -> LensingResult<Grid> {
        let mapping = self.grid_stack.mapping();
        match &self.deflection_stack {
            Some(stack) => mapping.sub_to_regular_average_grid(stack.sub()),
            None => mapping.sub_to_regular_average_grid(&sum_deflections(&self.galaxies, self.grid_stack.sub())),
        }
    }

    pub fn deflections_y(&self) -> LensingResult<Array2<f64>> {
        self.grid_stack.mapping().map_to_2d(&self.deflections_1d()?.ys())
    }

    pub fn deflections_x(&self) -> LensingResult<Array2<f64>> {
        self.grid_stack.mapping().map_to_2d(&self.deflections_1d()?.xs())
    }

    /// Deflections of this plane's galaxies at arbitrary points.
    pub fn deflections_of_grid(&self, grid: &Grid) -> Grid {
        sum_deflections(&self.galaxies, grid)
    }

    /// The grid stack seen by the next plane: `point − deflection`, for
    /// regular, sub and blurring points independently.
    pub fn trace_to_next_plane(&self) -> LensingResult<GridStack> {
        let deflections = self.deflection_stack.as_ref().ok_or_else(|| {
            LensingError::RayTracing(
                "cannot trace to the next plane: this plane's deflections were not computed".into(),
            )
        })?;
        self.grid_stack.traced(deflections)
    }

    // ── Pixelization ────────────────────────────────────────────────────────

    fn pixelized_galaxy(&self) -> LensingResult<Option<&Galaxy>> {
        let mut pixelized = self.galaxies.iter().filter(|g| g.has_pixelization());
        let first = pixelized.next();
        let extra = pixelized.count();
        if extra > 0 {
            return Err(LensingError::Pixelization(format!(
                "ambiguous pixelization source: {} galaxies in one plane have a pixelization",
                extra + 1
            )));
        }
        Ok(first)
    }

    /// Mapper of the plane's single pixelized galaxy, if any.
    pub fn mapper(&self) -> LensingResult<Option<Mapper>> {
        match self.pixelized_galaxy()?.and_then(Galaxy::pixelization) {
            Some(pixelization) => pixelization.mapper_from_grid_stack(&self.grid_stack).map(Some),
            None => Ok(None),
        }
    }

    /// Regularization of the plane's single pixelized galaxy, if any.
    pub fn regularization(&self) -> LensingResult<Option<Arc<dyn Regularization>>> {
        Ok(self.pixelized_galaxy()?.and_then(Galaxy::regularization).cloned())
    }

    // ── Cosmology ───────────────────────────────────────────────────────────

    /// Physical scales at this plane's redshift, computed on first access.
    pub fn cosmology(&self) -> LensingResult<&PlaneCosmology> {
        if let Some(cached) = self.cosmology.get() {
            return Ok(cached);
        }
        let context = self.context.as_ref().ok_or_else(|| {
            LensingError::RayTracing("plane was constructed without a cosmology".into())
        })?;
        let redshift = self.redshift.ok_or_else(|| {
            LensingError::RayTracing("plane has no redshift, so its physical scales are undefined".into())
        })?;
        let computed = PlaneCosmology::compute(redshift, context)?;
        Ok(self.cosmology.get_or_init(|| computed))
    }

    pub fn luminosities_of_galaxies_within_circles(&self, radius: f64, conversion_factor: f64) -> Vec<f64> {
        self.galaxies
            .iter()
            .map(|g| g.luminosity_within_circle(radius, conversion_factor))
            .collect()
    }

    pub fn luminosities_of_galaxies_within_ellipses(&self, major_axis: f64, conversion_factor: f64) -> Vec<f64> {
        self.galaxies
            .iter()
            .map(|g| g.luminosity_within_ellipse(major_axis, conversion_factor))
            .collect()
    }

    pub fn masses_of_galaxies_within_circles(&self, radius: f64, conversion_factor: f64) -> Vec<f64> {
        self.galaxies
            .iter()
            .map(|g| g.mass_within_circle(radius, conversion_factor))
            .collect()
    }

    pub fn masses_of_galaxies_within_ellipses(&self, major_axis: f64, conversion_factor: f64) -> Vec<f64> {
        self.galaxies
            .iter()
            .map(|g| g.mass_within_ellipse(major_axis, conversion_factor))
            .collect()
    }

    /// The plane's light on a uniform `shape` grid spanning its regular grid.
    pub fn plane_image(&self, shape: (usize, usize), buffer: f64) -> LensingResult<PlaneImage> {
        plane_image_from_galaxies(&self.galaxies, self.grid_stack.regular(), shape, buffer)
    }
}

fn enumerate(galaxies: Vec<Galaxy>) -> Vec<(GalaxyId, Galaxy)> {
    galaxies.into_iter().enumerate().map(|(i, g)| (GalaxyId(i), g)).collect()
}

fn sum_arrays(galaxies: &[Galaxy], grid: &Grid, f: impl Fn(&Galaxy, &Grid) -> Array1<f64>) -> Array1<f64> {
    let mut total = Array1::zeros(grid.len());
    for galaxy in galaxies {
        total += &f(galaxy, grid);
    }
    total
}

fn sum_deflections(galaxies: &[Galaxy], grid: &Grid) -> Grid {
    let mut total = Grid::zeros(grid.len());
    for galaxy in galaxies.iter().filter(|g| g.has_mass_profile()) {
        total.accumulate(&galaxy.deflections_from_grid(grid));
    }
    total
}
