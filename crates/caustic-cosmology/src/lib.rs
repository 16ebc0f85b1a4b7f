//! # Caustic Cosmology
//!
//! Redshift-to-distance conversions for the Caustic lensing engine. All
//! cosmologies implement the [`CosmologyProvider`](provider::CosmologyProvider)
//! trait, which yields comoving and angular-diameter distances in kpc.
//!
//! ## Available models
//!
//! | Model | Module | Presets |
//! |-------|--------|---------|
//! | Flat ΛCDM with radiation | [`lambda_cdm`] | Planck15, WMAP9 |
//!
//! ## Units
//!
//! Distances are kiloparsecs, angles arcseconds and masses solar masses.
//! [`constants::critical_surface_density_kpc`] combines three
//! angular-diameter distances into the lensing critical surface density.

pub mod constants;
pub mod lambda_cdm;
pub mod provider;
pub mod quadrature;

pub use lambda_cdm::{FlatLambdaCdm, LambdaCdmParams};
pub use provider::{CosmologyError, CosmologyProvider};
