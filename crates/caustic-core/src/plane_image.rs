//! Images of a plane on a uniform grid.
//!
//! Source planes are sampled by a traced, irregular grid. For display and
//! diagnostics the plane's light is re-evaluated on a uniform rectangular
//! grid spanning the traced grid's extremes.

use ndarray::{Array1, Array2};

use crate::error::{LensingError, LensingResult};
use crate::galaxy::Galaxy;
use crate::grids::Grid;

/// A plane's light on a uniform grid. Row 0 holds the largest `y`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneImage {
    pub array: Array2<f64>,
    /// `(y, x)` pixel scales (arcsec).
    pub pixel_scales: (f64, f64),
}

impl PlaneImage {
    pub fn new(array: Array2<f64>, pixel_scales: (f64, f64)) -> Self {
        Self { array, pixel_scales }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.array.dim()
    }

    /// Four tick positions spanning the image width, centred on zero.
    pub fn xticks(&self) -> Array1<f64> {
        let half = self.array.ncols() as f64 * self.pixel_scales.1 / 2.0;
        Array1::linspace(-half, half, 4)
    }

    /// Four tick positions spanning the image height, centred on zero.
    pub fn yticks(&self) -> Array1<f64> {
        let half = self.array.nrows() as f64 * self.pixel_scales.0 / 2.0;
        Array1::linspace(-half, half, 4)
    }
}

/// Uniform grid of `shape` pixel centres covering `grid` padded by `buffer`.
///
/// Returns the grid (row-major, row 0 at the largest `y`) and its `(y, x)`
/// pixel scales.
pub fn uniform_grid_covering(grid: &Grid, shape: (usize, usize), buffer: f64) -> LensingResult<(Grid, (f64, f64))> {
    let (rows, cols) = shape;
    if rows == 0 || cols == 0 {
        return Err(LensingError::Grid(format!(
            "plane image shape must be non-empty, got {rows}x{cols}"
        )));
    }
    let (y_min, y_max, x_min, x_max) = grid
        .extent()
        .ok_or_else(|| LensingError::Grid("cannot image a plane with an empty grid".into()))?;
    let (y_min, y_max) = (y_min - buffer, y_max + buffer);
    let (x_min, x_max) = (x_min - buffer, x_max + buffer);

    let scale_y = (y_max - y_min) / rows as f64;
    let scale_x = (x_max - x_min) / cols as f64;
    let points = (0..rows)
        .flat_map(|i| {
            (0..cols).map(move |j| {
                [
                    y_max - (i as f64 + 0.5) * scale_y,
                    x_min + (j as f64 + 0.5) * scale_x,
                ]
            })
        })
        .collect();
    Ok((points, (scale_y, scale_x)))
}

/// Light of `galaxies` on a uniform grid covering `grid`.
pub fn plane_image_from_galaxies(
    galaxies: &[Galaxy],
    grid: &Grid,
    shape: (usize, usize),
    buffer: f64,
) -> LensingResult<PlaneImage> {
    let (uniform, pixel_scales) = uniform_grid_covering(grid, shape, buffer)?;
    let mut values = Array1::zeros(uniform.len());
    for galaxy in galaxies {
        values += &galaxy.intensities_from_grid(&uniform);
    }
    let array = values
        .into_shape_with_order(shape)
        .map_err(|e| LensingError::Grid(e.to_string()))?;
    Ok(PlaneImage::new(array, pixel_scales))
}
