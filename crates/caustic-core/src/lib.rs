//! # Caustic Core
//!
//! The ray-tracing backbone of the Caustic strong-lensing framework. Given
//! galaxies at one or more redshifts and a grid stack sampling the image
//! plane, this crate groups galaxies into planes, propagates the grids
//! through the planes' deflection fields and aggregates the resulting
//! images, convergence, potential and deflection maps.
//!
//! ## Architecture
//!
//! Galaxies own shared, immutable [`profiles::LightProfile`] and
//! [`profiles::MassProfile`] trait objects. A [`tracer::Tracer`] builds its
//! [`plane::Plane`]s in ascending redshift order; each plane after the first
//! sees the previous plane's grids displaced by that plane's deflections.
//! Everything is built once and read thereafter, so independent tracers can
//! be evaluated concurrently ([`population`]).
//!
//! ## Modules
//!
//! - [`error`]: Error taxonomy.
//! - [`grids`]: Masks, grids, grid stacks and 1D ↔ 2D mappings.
//! - [`profiles`]: Light and mass profile traits plus reference profiles.
//! - [`pixelization`]: Source-plane pixelization and regularization interfaces.
//! - [`galaxy`]: Galaxies, their builder and hyper-galaxy noise scaling.
//! - [`plane`]: Single-redshift planes and their cosmological scales.
//! - [`plane_image`]: Plane light on a uniform grid.
//! - [`tracer`]: Multi-plane ray tracing.
//! - [`stacks`]: Planes and tracers over several grid stacks.
//! - [`fit`]: Image and position fits.
//! - [`population`]: Evaluating many candidate models on a compute backend.

pub mod error;
pub mod fit;
pub mod galaxy;
pub mod grids;
pub mod pixelization;
pub mod plane;
pub mod plane_image;
pub mod population;
pub mod profiles;
pub mod stacks;
pub mod tracer;

pub use error::{LensingError, LensingResult};
pub use galaxy::{Galaxy, GalaxyId};
pub use grids::{Grid, GridStack, Mask};
pub use plane::Plane;
pub use stacks::{PlaneStack, TracerStack};
pub use tracer::{Tracer, TracerSettings};
