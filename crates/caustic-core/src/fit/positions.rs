//! Fit of multiple-image positions.
//!
//! Images of one source traced back to the source plane should coincide;
//! the figure of merit penalises the largest separation within each set.

use ndarray::Array1;

use crate::error::{LensingError, LensingResult};
use crate::grids::Grid;
use crate::tracer::Tracer;

#[derive(Debug, Clone)]
pub struct PositionFit {
    positions: Vec<Grid>,
    noise: f64,
    maximum_separations: Array1<f64>,
}

impl PositionFit {
    /// # Arguments
    /// * `positions` - Source-plane positions, one grid per multiply imaged source.
    /// * `noise` - Positional uncertainty (arcsec).
    pub fn new(positions: Vec<Grid>, noise: f64) -> LensingResult<Self> {
        if !(noise.is_finite() && noise > 0.0) {
            return Err(LensingError::Fit(format!(
                "position noise must be positive, got {noise}"
            )));
        }
        let maximum_separations = positions.iter().map(maximum_separation).collect();
        Ok(Self {
            positions,
            noise,
            maximum_separations,
        })
    }

    /// Trace image-plane position sets through `tracer` and fit them in the
    /// source plane.
    pub fn from_tracer(tracer: &Tracer, image_positions: &[Grid], noise: f64) -> LensingResult<Self> {
        let mut source_positions = Vec::with_capacity(image_positions.len());
        for positions in image_positions {
            let traced = tracer.traced_positions(positions)?;
            if let Some(last) = traced.into_iter().last() {
                source_positions.push(last);
            }
        }
        Self::new(source_positions, noise)
    }

    pub fn positions(&self) -> &[Grid] {
        &self.positions
    }

    pub fn noise(&self) -> f64 {
        self.noise
    }

    /// Largest pairwise distance within each position set.
    pub fn maximum_separations(&self) -> &Array1<f64> {
        &self.maximum_separations
    }

    /// $(d / \sigma)^2$ per position set.
    pub fn chi_squared_map(&self) -> Array1<f64> {
        self.maximum_separations.mapv(|d| (d / self.noise).powi(2))
    }

    pub fn likelihood(&self) -> f64 {
        -0.5 * self.chi_squared_map().sum()
    }

    /// Whether every set's separation is at most `threshold` arcsec.
    pub fn maximum_separation_within_threshold(&self, threshold: f64) -> bool {
        self.maximum_separations.iter().all(|&d| d <= threshold)
    }
}

fn maximum_separation(grid: &Grid) -> f64 {
    let points = grid.points();
    points
        .iter()
        .enumerate()
        .flat_map(|(i, a)| points[i + 1..].iter().map(move |b| (a[0] - b[0]).hypot(a[1] - b[1])))
        .fold(0.0, f64::max)
}
