//! Source-plane pixelization interfaces.
//!
//! A [`Pixelization`] discretises a plane into source pixels and pairs every
//! sub-grid point with the pixel it lands in, producing a [`Mapper`]. A
//! [`Regularization`] supplies the smoothness prior over those pixels. The
//! linear inversion that consumes both lives outside this crate.

use std::fmt;

use ndarray::Array2;

use crate::error::{LensingError, LensingResult};
use crate::grids::GridStack;

/// Discretises a traced grid stack into source pixels.
pub trait Pixelization: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Number of source pixels.
    fn pixels(&self) -> usize;

    fn mapper_from_grid_stack(&self, grid_stack: &GridStack) -> LensingResult<Mapper>;
}

/// Smoothness prior over the pixels of a [`Mapper`].
pub trait Regularization: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Square `pixels × pixels` regularization matrix.
    fn regularization_matrix(&self, mapper: &Mapper) -> Array2<f64>;
}

/// Pairing of sub-grid points with source pixels.
#[derive(Debug, Clone)]
pub struct Mapper {
    pixels: usize,
    sub_to_pixelization: Vec<usize>,
    pixel_neighbors: Vec<Vec<usize>>,
    grid_stack: GridStack,
}

impl Mapper {
    pub fn new(
        pixels: usize,
        sub_to_pixelization: Vec<usize>,
        pixel_neighbors: Vec<Vec<usize>>,
        grid_stack: GridStack,
    ) -> LensingResult<Self> {
        if sub_to_pixelization.len() != grid_stack.sub().len() {
            return Err(LensingError::Pixelization(format!(
                "{} sub-points were paired but the grid has {}",
                sub_to_pixelization.len(),
                grid_stack.sub().len()
            )));
        }
        if pixel_neighbors.len() != pixels {
            return Err(LensingError::Pixelization(format!(
                "neighbour table covers {} pixels, expected {pixels}",
                pixel_neighbors.len()
            )));
        }
        let out_of_range = sub_to_pixelization
            .iter()
            .chain(pixel_neighbors.iter().flatten())
            .any(|&p| p >= pixels);
        if out_of_range {
            return Err(LensingError::Pixelization(format!(
                "pixel index out of range for a {pixels}-pixel source grid"
            )));
        }
        Ok(Self {
            pixels,
            sub_to_pixelization,
            pixel_neighbors,
            grid_stack,
        })
    }

    pub fn pixels(&self) -> usize {
        self.pixels
    }

    pub fn sub_to_pixelization(&self) -> &[usize] {
        &self.sub_to_pixelization
    }

    pub fn pixel_neighbors(&self) -> &[Vec<usize>] {
        &self.pixel_neighbors
    }

    pub fn grid_stack(&self) -> &GridStack {
        &self.grid_stack
    }

    /// `regular_pixels × source_pixels` matrix; each sub-point contributes
    /// `1 / sub_grid_size²` to its regular pixel's row.
    pub fn mapping_matrix(&self) -> Array2<f64> {
        let mapping = self.grid_stack.mapping();
        let n = mapping.sub_grid_size();
        let weight = 1.0 / (n * n) as f64;
        let mut matrix = Array2::zeros((mapping.regular_pixels(), self.pixels));
        for (&regular, &pixel) in mapping.sub_to_regular().iter().zip(&self.sub_to_pixelization) {
            matrix[[regular, pixel]] += weight;
        }
        matrix
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rectangular pixelization
// ─────────────────────────────────────────────────────────────────────────────

/// Uniform rectangular source grid spanning the traced sub-grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangular {
    pub shape: (usize, usize),
}

impl Rectangular {
    /// Padding added to the traced extent so edge points fall inside.
    const BUFFER: f64 = 1e-8;

    pub fn new(shape: (usize, usize)) -> LensingResult<Self> {
        if shape.0 < 3 || shape.1 < 3 {
            return Err(LensingError::Pixelization(format!(
                "rectangular pixelization needs at least 3x3 pixels, got {}x{}",
                shape.0, shape.1
            )));
        }
        Ok(Self { shape })
    }

    fn neighbors(&self) -> Vec<Vec<usize>> {
        let (rows, cols) = self.shape;
        (0..rows * cols)
            .map(|index| {
                let (row, col) = (index / cols, index % cols);
                let mut n = Vec::with_capacity(4);
                if row > 0 {
                    n.push(index - cols);
                }
                if col > 0 {
                    n.push(index - 1);
                }
                if col + 1 < cols {
                    n.push(index + 1);
                }
                if row + 1 < rows {
                    n.push(index + cols);
                }
                n
            })
            .collect()
    }
}

impl Pixelization for Rectangular {
    fn name(&self) -> &str {
        "Rectangular"
    }

    fn pixels(&self) -> usize {
        self.shape.0 * self.shape.1
    }

    fn mapper_from_grid_stack(&self, grid_stack: &GridStack) -> LensingResult<Mapper> {
        let (rows, cols) = self.shape;
        let (y_min, y_max, x_min, x_max) = grid_stack
            .sub()
            .extent()
            .ok_or_else(|| LensingError::Pixelization("cannot pixelize an empty grid".into()))?;
        let (y_max, x_min) = (y_max + Self::BUFFER, x_min - Self::BUFFER);
        let scale_y = (y_max - (y_min - Self::BUFFER)) / rows as f64;
        let scale_x = ((x_max + Self::BUFFER) - x_min) / cols as f64;

        let sub_to_pixelization = grid_stack
            .sub()
            .iter()
            .map(|p| {
                let row = (((y_max - p[0]) / scale_y) as usize).min(rows - 1);
                let col = (((p[1] - x_min) / scale_x) as usize).min(cols - 1);
                row * cols + col
            })
            .collect();

        Mapper::new(self.pixels(), sub_to_pixelization, self.neighbors(), grid_stack.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Constant regularization
// ─────────────────────────────────────────────────────────────────────────────

/// Penalises differences between neighbouring pixels with a single weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant {
    pub coefficient: f64,
}

impl Constant {
    /// Added to the diagonal so the matrix stays positive-definite.
    const DIAGONAL_FLOOR: f64 = 1e-8;

    pub fn new(coefficient: f64) -> Self {
        Self { coefficient }
    }
}

impl Regularization for Constant {
    fn name(&self) -> &str {
        "Constant"
    }

    fn regularization_matrix(&self, mapper: &Mapper) -> Array2<f64> {
        let pixels = mapper.pixels();
        let weight = self.coefficient * self.coefficient;
        let mut matrix = Array2::zeros((pixels, pixels));
        for (i, neighbors) in mapper.pixel_neighbors().iter().enumerate() {
            matrix[[i, i]] += Self::DIAGONAL_FLOOR;
            for &j in neighbors {
                matrix[[i, i]] += weight;
                matrix[[j, j]] += weight;
                matrix[[i, j]] -= weight;
                matrix[[j, i]] -= weight;
            }
        }
        matrix
    }
}
