//! Light and mass profile interfaces.
//!
//! The analytic formulas of individual profiles live outside the ray-tracing
//! engine: a galaxy only needs point-wise `intensity`, `surface_density`,
//! `potential` and `deflection` evaluators. The grid-level methods and the
//! enclosed luminosity / mass integrals have default implementations built
//! on those, which concrete profiles may override with closed forms.
//!
//! [`reference`] provides two simple analytic profiles used by the CLI and
//! the test-suite.

pub mod reference;

use std::fmt;

use caustic_cosmology::quadrature::simpson_2d;
use ndarray::Array1;

use crate::grids::{Grid, Point};

/// Intervals per dimension for the default enclosed-quantity quadrature.
pub const PROFILE_INTERVALS: usize = 256;

/// A surface-brightness profile.
pub trait LightProfile: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Surface brightness at a `(y, x)` coordinate.
    fn intensity_at(&self, point: Point) -> f64;

    fn intensities_from_grid(&self, grid: &Grid) -> Array1<f64> {
        grid.iter().map(|&p| self.intensity_at(p)).collect()
    }

    fn centre(&self) -> Point {
        [0.0, 0.0]
    }

    fn axis_ratio(&self) -> f64 {
        1.0
    }

    /// Position angle (degrees, counter-clockwise from the positive x-axis).
    fn phi(&self) -> f64 {
        0.0
    }

    /// Total luminosity within a circle of `radius` arcsec about the centre.
    fn luminosity_within_circle(&self, radius: f64) -> f64 {
        integrate_within_ellipse(|p| self.intensity_at(p), self.centre(), 1.0, 0.0, radius)
    }

    /// Total luminosity within the profile's own ellipse of semi-major axis `major_axis`.
    fn luminosity_within_ellipse(&self, major_axis: f64) -> f64 {
        integrate_within_ellipse(
            |p| self.intensity_at(p),
            self.centre(),
            self.axis_ratio(),
            self.phi(),
            major_axis,
        )
    }
}

/// A lensing mass distribution, in dimensionless (convergence) units.
pub trait MassProfile: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Convergence $\kappa$ at a `(y, x)` coordinate.
    fn surface_density_at(&self, point: Point) -> f64;

    /// Lensing potential $\psi$ at a `(y, x)` coordinate.
    fn potential_at(&self, point: Point) -> f64;

    /// Deflection angle $(\alpha_y, \alpha_x)$ at a `(y, x)` coordinate.
    fn deflection_at(&self, point: Point) -> Point;

    fn surface_density_from_grid(&self, grid: &Grid) -> Array1<f64> {
        grid.iter().map(|&p| self.surface_density_at(p)).collect()
    }

    fn potential_from_grid(&self, grid: &Grid) -> Array1<f64> {
        grid.iter().map(|&p| self.potential_at(p)).collect()
    }

    fn deflections_from_grid(&self, grid: &Grid) -> Grid {
        grid.iter().map(|&p| self.deflection_at(p)).collect()
    }

    fn centre(&self) -> Point {
        [0.0, 0.0]
    }

    fn axis_ratio(&self) -> f64 {
        1.0
    }

    fn phi(&self) -> f64 {
        0.0
    }

    /// Dimensionless mass within a circle of `radius` arcsec about the centre.
    ///
    /// Multiply by the critical surface density (M☉ arcsec⁻²) to obtain
    /// solar masses.
    fn mass_within_circle(&self, radius: f64) -> f64 {
        integrate_within_ellipse(|p| self.surface_density_at(p), self.centre(), 1.0, 0.0, radius)
    }

    /// Dimensionless mass within the profile's own ellipse of semi-major axis `major_axis`.
    fn mass_within_ellipse(&self, major_axis: f64) -> f64 {
        integrate_within_ellipse(
            |p| self.surface_density_at(p),
            self.centre(),
            self.axis_ratio(),
            self.phi(),
            major_axis,
        )
    }
}

/// Integrate `f` over an ellipse in elliptical polar coordinates.
///
/// The radial coordinate is sampled as $r = u^2$, so the integrand carries a
/// $2u^3$ weight that vanishes at the centre. Central cusps up to $1/r$
/// (isothermal convergence) therefore integrate without special handling.
pub(crate) fn integrate_within_ellipse<F: Fn(Point) -> f64>(
    f: F,
    centre: Point,
    axis_ratio: f64,
    phi_degrees: f64,
    major_axis: f64,
) -> f64 {
    let (sin_phi, cos_phi) = phi_degrees.to_radians().sin_cos();
    simpson_2d(
        |u, theta| {
            if u == 0.0 {
                return 0.0;
            }
            let r = u * u;
            let (sin_t, cos_t) = theta.sin_cos();
            let xp = r * cos_t;
            let yp = axis_ratio * r * sin_t;
            let point = [
                centre[0] + xp * sin_phi + yp * cos_phi,
                centre[1] + xp * cos_phi - yp * sin_phi,
            ];
            2.0 * axis_ratio * u * r * f(point)
        },
        (0.0, major_axis.max(0.0).sqrt()),
        (0.0, 2.0 * std::f64::consts::PI),
        PROFILE_INTERVALS,
    )
}
