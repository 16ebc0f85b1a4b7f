//! Cosmology provider trait.
//!
//! All distance calculators implement [`CosmologyProvider`], which maps
//! redshifts to comoving and angular-diameter distances. Every distance is
//! returned in kiloparsecs so that the lensing code can work in
//! kpc / arcsec / solar-mass units without further conversion.

use std::fmt;

use thiserror::Error;

use crate::constants::ARCSEC_PER_RADIAN;

/// Errors from cosmology providers.
#[derive(Debug, Error)]
pub enum CosmologyError {
    #[error("Redshift {redshift} is invalid (must be finite and non-negative)")]
    InvalidRedshift { redshift: f64 },

    #[error("Redshift {redshift} has zero angular-diameter distance; angular scale is undefined")]
    ZeroDistance { redshift: f64 },

    #[error("Redshifts out of order: z1 = {z1} is greater than z2 = {z2}")]
    RedshiftOrdering { z1: f64, z2: f64 },

    #[error("Invalid cosmological parameters: {0}")]
    InvalidParameters(String),
}

/// Provides redshift-dependent distances for a background cosmology.
///
/// Only [`comoving_distance_kpc`](CosmologyProvider::comoving_distance_kpc)
/// is required. The remaining methods assume a spatially flat universe, which
/// is what every provider in this crate models; curved cosmologies must
/// override them.
pub trait CosmologyProvider: Send + Sync + fmt::Debug {
    /// Human-readable name of this cosmology.
    fn name(&self) -> &str;

    /// Line-of-sight comoving distance from the observer to redshift `z` (kpc).
    fn comoving_distance_kpc(&self, z: f64) -> Result<f64, CosmologyError>;

    /// Angular-diameter distance from the observer to redshift `z` (kpc).
    ///
    /// $D_A(z) = D_C(z) / (1 + z)$
    fn angular_diameter_distance_kpc(&self, z: f64) -> Result<f64, CosmologyError> {
        Ok(self.comoving_distance_kpc(z)? / (1.0 + z))
    }

    /// Angular-diameter distance between two redshifts $z_1 \le z_2$ (kpc).
    ///
    /// $D_A(z_1, z_2) = \bigl(D_C(z_2) - D_C(z_1)\bigr) / (1 + z_2)$
    fn angular_diameter_distance_z1z2_kpc(&self, z1: f64, z2: f64) -> Result<f64, CosmologyError> {
        if z1 > z2 {
            return Err(CosmologyError::RedshiftOrdering { z1, z2 });
        }
        let dc1 = self.comoving_distance_kpc(z1)?;
        let dc2 = self.comoving_distance_kpc(z2)?;
        Ok((dc2 - dc1) / (1.0 + z2))
    }

    /// Proper angular scale at redshift `z` (arcsec per kpc).
    fn arcsec_per_kpc_proper(&self, z: f64) -> Result<f64, CosmologyError> {
        let d_a = self.angular_diameter_distance_kpc(z)?;
        if d_a <= 0.0 {
            return Err(CosmologyError::ZeroDistance { redshift: z });
        }
        Ok(ARCSEC_PER_RADIAN / d_a)
    }

    /// Proper physical scale at redshift `z` (kpc per arcsec).
    fn kpc_per_arcsec_proper(&self, z: f64) -> Result<f64, CosmologyError> {
        Ok(1.0 / self.arcsec_per_kpc_proper(z)?)
    }
}

/// Reject negative or non-finite redshifts.
pub(crate) fn check_redshift(z: f64) -> Result<(), CosmologyError> {
    if !z.is_finite() || z < 0.0 {
        return Err(CosmologyError::InvalidRedshift { redshift: z });
    }
    Ok(())
}
