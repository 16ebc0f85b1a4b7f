//! Physical constants in lensing units (kpc, seconds, solar masses).

/// Speed of light (km/s).
pub const SPEED_OF_LIGHT_KM_PER_S: f64 = 299_792.458;

/// Speed of light (kpc/s).
pub const SPEED_OF_LIGHT_KPC_PER_S: f64 = 9.715_611_890_180_196e-12;

/// Newton's constant (kpc³ M☉⁻¹ s⁻²), CODATA 2014 G with the IAU 2015 solar mass.
pub const GRAVITATIONAL_CONSTANT_KPC3_PER_MSUN_S2: f64 = 4.517_103_049_894_965e-39;

/// Kiloparsecs per megaparsec.
pub const KPC_PER_MPC: f64 = 1000.0;

/// Arcseconds per radian.
pub const ARCSEC_PER_RADIAN: f64 = 180.0 / std::f64::consts::PI * 3600.0;

/// The prefactor $c^2 / (4 \pi G)$ of the critical surface density (M☉ kpc⁻¹).
pub fn critical_density_prefactor() -> f64 {
    SPEED_OF_LIGHT_KPC_PER_S * SPEED_OF_LIGHT_KPC_PER_S
        / (4.0 * std::f64::consts::PI * GRAVITATIONAL_CONSTANT_KPC3_PER_MSUN_S2)
}

/// Critical surface density for lensing (M☉ kpc⁻²).
///
/// $\Sigma_\text{crit} = \frac{c^2}{4\pi G} \frac{D_s}{D_{ls} D_l}$
///
/// # Arguments
/// * `d_source_kpc` - Angular-diameter distance observer → source plane.
/// * `d_lens_source_kpc` - Angular-diameter distance lens plane → source plane.
/// * `d_lens_kpc` - Angular-diameter distance observer → lens plane.
pub fn critical_surface_density_kpc(d_source_kpc: f64, d_lens_source_kpc: f64, d_lens_kpc: f64) -> f64 {
    critical_density_prefactor() * d_source_kpc / (d_lens_source_kpc * d_lens_kpc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_prefactor_value() {
        assert_relative_eq!(critical_density_prefactor(), 1.662_916_540_175_6e15, max_relative = 1e-9);
    }

    #[test]
    fn test_critical_density_scales_inversely_with_lens_distance() {
        let a = critical_surface_density_kpc(2.0e6, 1.0e6, 1.0e6);
        let b = critical_surface_density_kpc(2.0e6, 1.0e6, 2.0e6);
        assert_relative_eq!(a, 2.0 * b, max_relative = 1e-12);
    }
}
