//! Closed-form spherical profiles.

use serde::Deserialize;

use super::{LightProfile, MassProfile};
use crate::grids::Point;

fn offset(point: Point, centre: Point) -> (f64, f64, f64) {
    let dy = point[0] - centre[0];
    let dx = point[1] - centre[1];
    (dy, dx, (dy * dy + dx * dx).sqrt())
}

/// Singular isothermal sphere.
///
/// $\kappa = \theta_E / 2r, \quad \psi = \theta_E r, \quad \vec\alpha = \theta_E \hat r$
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SphericalIsothermal {
    #[serde(default)]
    pub centre: Point,
    /// Einstein radius (arcsec).
    pub einstein_radius: f64,
}

impl SphericalIsothermal {
    pub fn new(centre: Point, einstein_radius: f64) -> Self {
        Self {
            centre,
            einstein_radius,
        }
    }
}

impl MassProfile for SphericalIsothermal {
    fn name(&self) -> &str {
        "SphericalIsothermal"
    }

    fn surface_density_at(&self, point: Point) -> f64 {
        let (_, _, r) = offset(point, self.centre);
        self.einstein_radius / (2.0 * r)
    }

    fn potential_at(&self, point: Point) -> f64 {
        let (_, _, r) = offset(point, self.centre);
        self.einstein_radius * r
    }

    fn deflection_at(&self, point: Point) -> Point {
        let (dy, dx, r) = offset(point, self.centre);
        if r == 0.0 {
            return [0.0, 0.0];
        }
        [self.einstein_radius * dy / r, self.einstein_radius * dx / r]
    }

    fn centre(&self) -> Point {
        self.centre
    }

    /// $M(<R) = \pi \theta_E R$
    fn mass_within_circle(&self, radius: f64) -> f64 {
        std::f64::consts::PI * self.einstein_radius * radius
    }

    fn mass_within_ellipse(&self, major_axis: f64) -> f64 {
        self.mass_within_circle(major_axis)
    }
}

/// Circular Gaussian light profile $I(r) = I_0 \exp(-r^2 / 2\sigma^2)$.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SphericalGaussian {
    #[serde(default)]
    pub centre: Point,
    /// Central intensity $I_0$.
    pub intensity: f64,
    /// Width $\sigma$ (arcsec).
    pub sigma: f64,
}

impl SphericalGaussian {
    pub fn new(centre: Point, intensity: f64, sigma: f64) -> Self {
        Self {
            centre,
            intensity,
            sigma,
        }
    }
}

impl LightProfile for SphericalGaussian {
    fn name(&self) -> &str {
        "SphericalGaussian"
    }

    fn intensity_at(&self, point: Point) -> f64 {
        let (_, _, r) = offset(point, self.centre);
        self.intensity * (-(r * r) / (2.0 * self.sigma * self.sigma)).exp()
    }

    fn centre(&self) -> Point {
        self.centre
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_isothermal_deflection_has_einstein_radius_magnitude() {
        let sis = SphericalIsothermal::new([0.0, 0.0], 1.2);
        let alpha = sis.deflection_at([3.0, 4.0]);
        assert_relative_eq!(alpha[0], 1.2 * 0.6, max_relative = 1e-12);
        assert_relative_eq!(alpha[1], 1.2 * 0.8, max_relative = 1e-12);
        assert_eq!(sis.deflection_at([0.0, 0.0]), [0.0, 0.0]);
    }

    #[test]
    fn test_isothermal_convergence_and_potential() {
        let sis = SphericalIsothermal::new([1.0, 1.0], 2.0);
        assert_relative_eq!(sis.surface_density_at([1.0, 2.0]), 1.0);
        assert_relative_eq!(sis.potential_at([1.0, 2.0]), 2.0);
        assert!(sis.surface_density_at([1.0, 1.0]).is_infinite());
    }

    #[test]
    fn test_isothermal_quadrature_matches_closed_form() {
        // The trait default integrates the convergence numerically.
        #[derive(Debug)]
        struct Numeric(SphericalIsothermal);
        impl MassProfile for Numeric {
            fn name(&self) -> &str {
                "numeric"
            }
            fn surface_density_at(&self, p: Point) -> f64 {
                self.0.surface_density_at(p)
            }
            fn potential_at(&self, p: Point) -> f64 {
                self.0.potential_at(p)
            }
            fn deflection_at(&self, p: Point) -> Point {
                self.0.deflection_at(p)
            }
        }

        let sis = SphericalIsothermal::new([0.0, 0.0], 1.5);
        assert_relative_eq!(
            Numeric(sis).mass_within_circle(2.0),
            sis.mass_within_circle(2.0),
            max_relative = 1e-8
        );
    }

    #[test]
    fn test_gaussian_luminosity_within_circle() {
        let g = SphericalGaussian::new([0.2, -0.1], 2.0, 0.7);
        let radius: f64 = 1.3;
        let expected = 2.0
            * std::f64::consts::PI
            * 0.7_f64.powi(2)
            * 2.0
            * (1.0 - (-radius * radius / (2.0 * 0.49)).exp());
        assert_relative_eq!(g.luminosity_within_circle(radius), expected, max_relative = 1e-8);
        assert_relative_eq!(
            g.luminosity_within_ellipse(radius),
            g.luminosity_within_circle(radius),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_profiles_deserialize_with_default_centre() {
        let sis: SphericalIsothermal = serde_json::from_str(r#"{"einstein_radius": 1.6}"#).unwrap();
        assert_eq!(sis.centre, [0.0, 0.0]);
        assert_eq!(sis.einstein_radius, 1.6);
    }
}
