//! Error taxonomy for the lensing engine.
//!
//! Every error is fatal to the model evaluation that raised it. Nothing in
//! this crate retries; the caller decides whether a failure becomes a
//! rejected sample or a hard abort (see [`crate::population`]).

use caustic_compute::ComputeError;
use caustic_cosmology::CosmologyError;
use thiserror::Error;

/// Errors raised while building or evaluating a lens model.
#[derive(Debug, Error)]
pub enum LensingError {
    /// Invalid tracer or plane configuration: empty galaxy lists,
    /// redshift-heterogeneous planes, unallocated neighbour redshifts.
    #[error("Ray tracing error: {0}")]
    RayTracing(String),

    /// More than one pixelized galaxy in a single plane.
    #[error("Pixelization error: {0}")]
    Pixelization(String),

    #[error("Invalid galaxy: {0}")]
    Galaxy(String),

    #[error("Invalid grid: {0}")]
    Grid(String),

    #[error("Fit error: {0}")]
    Fit(String),

    #[error("Cosmology error: {0}")]
    Cosmology(#[from] CosmologyError),

    #[error("Compute error: {0}")]
    Compute(#[from] ComputeError),
}

pub type LensingResult<T> = Result<T, LensingError>;
