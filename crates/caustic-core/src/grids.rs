//! Image-plane sampling: grids, masks and grid stacks.
//!
//! Coordinates are `(y, x)` pairs in arcseconds. A [`Mask`] places pixel
//! centres at
//!
//! $y = (r_c - \text{row}) \cdot s, \quad x = (\text{col} - c_c) \cdot s$
//!
//! where $s$ is the pixel scale and $(r_c, c_c) = ((N_r - 1)/2, (N_c - 1)/2)$,
//! so row 0 holds the largest `y`. A [`GridStack`] bundles the three grids
//! every plane is evaluated on:
//!
//! - `regular`: one point per unmasked pixel,
//! - `sub`: `n × n` sub-pixel points per unmasked pixel, stored contiguously
//!   per pixel (row-major inside the pixel),
//! - `blurring`: masked pixels whose light leaks into the mask under PSF
//!   convolution.
//!
//! A padded stack ([`GridStack::padded_from_mask`]) samples every pixel of
//! the data array enlarged by the PSF border, so model images can be
//! convolved without edge effects and trimmed back to the data shape.
//!
//! Grid stacks are values: ray tracing produces new stacks through
//! [`GridStack::traced`] and never mutates a shared one. The pixel-index
//! mapping is shared between a stack and everything traced from it.

use std::ops::Index;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use crate::error::{LensingError, LensingResult};

/// A `(y, x)` coordinate or deflection vector (arcsec).
pub type Point = [f64; 2];

/// An ordered sequence of 2D points.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    points: Vec<Point>,
}

impl Grid {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// A grid of `len` points at the origin (a zero deflection field).
    pub fn zeros(len: usize) -> Self {
        Self {
            points: vec![[0.0, 0.0]; len],
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    /// The `y` component of every point.
    pub fn ys(&self) -> Array1<f64> {
        self.points.iter().map(|p| p[0]).collect()
    }

    /// The `x` component of every point.
    pub fn xs(&self) -> Array1<f64> {
        self.points.iter().map(|p| p[1]).collect()
    }

    /// Point-wise `self - deflections`.
    pub fn deflected_by(&self, deflections: &Grid) -> LensingResult<Grid> {
        if self.len() != deflections.len() {
            return Err(LensingError::Grid(format!(
                "cannot deflect a grid of {} points by a field of {} vectors",
                self.len(),
                deflections.len()
            )));
        }
        Ok(self
            .points
            .iter()
            .zip(deflections.iter())
            .map(|(p, d)| [p[0] - d[0], p[1] - d[1]])
            .collect())
    }

    /// Point-wise accumulation of a same-length vector field.
    pub(crate) fn accumulate(&mut self, other: &Grid) {
        for (p, q) in self.points.iter_mut().zip(other.iter()) {
            p[0] += q[0];
            p[1] += q[1];
        }
    }

    /// Bounding box `(y_min, y_max, x_min, x_max)`, or `None` for an empty grid.
    pub fn extent(&self) -> Option<(f64, f64, f64, f64)> {
        let first = self.points.first()?;
        let init = (first[0], first[0], first[1], first[1]);
        Some(self.points.iter().fold(init, |(y0, y1, x0, x1), p| {
            (y0.min(p[0]), y1.max(p[0]), x0.min(p[1]), x1.max(p[1]))
        }))
    }
}

impl From<Vec<Point>> for Grid {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

impl FromIterator<Point> for Grid {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Index<usize> for Grid {
    type Output = Point;

    fn index(&self, index: usize) -> &Point {
        &self.points[index]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mask
// ─────────────────────────────────────────────────────────────────────────────

/// A 2D observation mask. `true` marks a pixel excluded from the fit.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    masked: Array2<bool>,
    pixel_scale: f64,
}

impl Mask {
    pub fn from_array(masked: Array2<bool>, pixel_scale: f64) -> LensingResult<Self> {
        if !(pixel_scale.is_finite() && pixel_scale > 0.0) {
            return Err(LensingError::Grid(format!(
                "pixel scale must be positive, got {pixel_scale}"
            )));
        }
        if masked.is_empty() {
            return Err(LensingError::Grid("mask has zero pixels".into()));
        }
        Ok(Self { masked, pixel_scale })
    }

    /// A mask with every pixel included.
    pub fn unmasked(shape: (usize, usize), pixel_scale: f64) -> LensingResult<Self> {
        Self::from_array(Array2::from_elem(shape, false), pixel_scale)
    }

    /// Include only pixels whose centre lies within `radius_arcsec` of `centre`.
    pub fn circular(
        shape: (usize, usize),
        pixel_scale: f64,
        radius_arcsec: f64,
        centre: Point,
    ) -> LensingResult<Self> {
        let mut mask = Self::unmasked(shape, pixel_scale)?;
        let (rc, cc) = mask.central_pixel();
        for ((row, col), value) in mask.masked.indexed_iter_mut() {
            let y = (rc - row as f64) * pixel_scale - centre[0];
            let x = (col as f64 - cc) * pixel_scale - centre[1];
            *value = (y * y + x * x).sqrt() > radius_arcsec;
        }
        Ok(mask)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.masked.dim()
    }

    pub fn pixel_scale(&self) -> f64 {
        self.pixel_scale
    }

    pub fn is_masked(&self, row: usize, col: usize) -> bool {
        self.masked[[row, col]]
    }

    pub fn pixels_in_mask(&self) -> usize {
        self.masked.iter().filter(|&&m| !m).count()
    }

    /// Fractional `(row, col)` of the array centre.
    pub fn central_pixel(&self) -> (f64, f64) {
        let (rows, cols) = self.shape();
        ((rows as f64 - 1.0) / 2.0, (cols as f64 - 1.0) / 2.0)
    }

    /// Arc-second centre of pixel `(row, col)`.
    pub fn pixel_centre(&self, row: usize, col: usize) -> Point {
        let (rc, cc) = self.central_pixel();
        [
            (rc - row as f64) * self.pixel_scale,
            (col as f64 - cc) * self.pixel_scale,
        ]
    }

    /// Unmasked pixels in row-major order.
    pub fn unmasked_pixels(&self) -> Vec<(usize, usize)> {
        self.masked
            .indexed_iter()
            .filter(|(_, &m)| !m)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Masked pixels within the PSF half-width of an unmasked pixel, row-major.
    ///
    /// # Arguments
    /// * `psf_shape` - PSF kernel shape `(rows, cols)`; both must be odd.
    pub fn blurring_pixels(&self, psf_shape: (usize, usize)) -> LensingResult<Vec<(usize, usize)>> {
        let (psf_rows, psf_cols) = psf_shape;
        if psf_rows % 2 == 0 || psf_cols % 2 == 0 {
            return Err(LensingError::Grid(format!(
                "PSF shape must be odd in both dimensions, got {psf_rows}x{psf_cols}"
            )));
        }
        let (half_rows, half_cols) = (psf_rows / 2, psf_cols / 2);
        let (rows, cols) = self.shape();

        let blurring = self
            .masked
            .indexed_iter()
            .filter(|(_, &m)| m)
            .filter(|((row, col), _)| {
                let r0 = row.saturating_sub(half_rows);
                let r1 = (row + half_rows).min(rows - 1);
                let c0 = col.saturating_sub(half_cols);
                let c1 = (col + half_cols).min(cols - 1);
                (r0..=r1).any(|r| (c0..=c1).any(|c| !self.masked[[r, c]]))
            })
            .map(|(idx, _)| idx)
            .collect();
        Ok(blurring)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pixel-index mapping
// ─────────────────────────────────────────────────────────────────────────────

/// Maps 1D masked arrays back to the 2D data array, and sub-grid values to
/// their regular pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct GridMapping {
    shape: (usize, usize),
    /// Data shape inside a padded `shape`; equal to `shape` when unpadded.
    image_shape: (usize, usize),
    regular_to_pixel: Vec<(usize, usize)>,
    sub_grid_size: usize,
    sub_to_regular: Vec<usize>,
}

impl GridMapping {
    /// Build a mapping, validating every index table.
    ///
    /// Each regular pixel must own exactly `sub_grid_size²` sub-points.
    pub fn new(
        shape: (usize, usize),
        regular_to_pixel: Vec<(usize, usize)>,
        sub_grid_size: usize,
        sub_to_regular: Vec<usize>,
    ) -> LensingResult<Self> {
        if sub_grid_size == 0 {
            return Err(LensingError::Grid("sub_grid_size must be at least 1".into()));
        }
        if let Some(&(r, c)) = regular_to_pixel
            .iter()
            .find(|(r, c)| *r >= shape.0 || *c >= shape.1)
        {
            return Err(LensingError::Grid(format!(
                "pixel ({r}, {c}) lies outside the {}x{} array",
                shape.0, shape.1
            )));
        }
        let mut occupied = Array2::from_elem(shape, false);
        for &(r, c) in &regular_to_pixel {
            if std::mem::replace(&mut occupied[[r, c]], true) {
                return Err(LensingError::Grid(format!(
                    "pixel ({r}, {c}) is mapped by more than one regular point"
                )));
            }
        }

        let per_pixel = sub_grid_size * sub_grid_size;
        let mut counts = vec![0usize; regular_to_pixel.len()];
        for &regular in &sub_to_regular {
            let count = counts.get_mut(regular).ok_or_else(|| {
                LensingError::Grid(format!(
                    "sub-point maps to regular pixel {regular}, but only {} exist",
                    regular_to_pixel.len()
                ))
            })?;
            *count += 1;
        }
        if let Some(pixel) = counts.iter().position(|&c| c != per_pixel) {
            return Err(LensingError::Grid(format!(
                "regular pixel {pixel} owns {} sub-points, expected {per_pixel}",
                counts[pixel]
            )));
        }

        Ok(Self {
            shape,
            image_shape: shape,
            regular_to_pixel,
            sub_grid_size,
            sub_to_regular,
        })
    }

    /// Mark `shape` as `image_shape` padded symmetrically on every side.
    pub fn with_image_shape(mut self, image_shape: (usize, usize)) -> LensingResult<Self> {
        let (rows, cols) = self.shape;
        if image_shape.0 > rows || image_shape.1 > cols || (rows - image_shape.0) % 2 != 0 || (cols - image_shape.1) % 2 != 0
        {
            return Err(LensingError::Grid(format!(
                "image shape {image_shape:?} cannot be centred inside the {rows}x{cols} array"
            )));
        }
        self.image_shape = image_shape;
        Ok(self)
    }

    /// Mapping whose sub-points are stored contiguously per regular pixel.
    pub fn contiguous(
        shape: (usize, usize),
        regular_to_pixel: Vec<(usize, usize)>,
        sub_grid_size: usize,
    ) -> LensingResult<Self> {
        let per_pixel = sub_grid_size * sub_grid_size;
        let sub_to_regular = (0..regular_to_pixel.len() * per_pixel)
            .map(|i| i / per_pixel.max(1))
            .collect();
        Self::new(shape, regular_to_pixel, sub_grid_size, sub_to_regular)
    }

    /// Shape of the array the regular grid samples, padding included.
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Shape of the data array, padding excluded.
    pub fn image_shape(&self) -> (usize, usize) {
        self.image_shape
    }

    pub fn is_padded(&self) -> bool {
        self.shape != self.image_shape
    }

    pub fn regular_to_pixel(&self) -> &[(usize, usize)] {
        &self.regular_to_pixel
    }

    pub fn sub_grid_size(&self) -> usize {
        self.sub_grid_size
    }

    pub fn sub_to_regular(&self) -> &[usize] {
        &self.sub_to_regular
    }

    pub fn regular_pixels(&self) -> usize {
        self.regular_to_pixel.len()
    }

    pub fn sub_pixels(&self) -> usize {
        self.sub_to_regular.len()
    }

    /// Scatter a 1D regular-grid array into the 2D data array (zeros outside
    /// the mask). Padded mappings are trimmed to [`image_shape`](Self::image_shape).
    pub fn map_to_2d(&self, values: &Array1<f64>) -> LensingResult<Array2<f64>> {
        let padded = self.map_to_2d_keep_padded(values)?;
        if !self.is_padded() {
            return Ok(padded);
        }
        let row0 = (self.shape.0 - self.image_shape.0) / 2;
        let col0 = (self.shape.1 - self.image_shape.1) / 2;
        Ok(padded
            .slice(ndarray::s![row0..row0 + self.image_shape.0, col0..col0 + self.image_shape.1])
            .to_owned())
    }

    /// Scatter a 1D regular-grid array into the full (padded) array.
    pub fn map_to_2d_keep_padded(&self, values: &Array1<f64>) -> LensingResult<Array2<f64>> {
        self.check_regular_len(values.len())?;
        let mut array = Array2::zeros(self.shape);
        for (&(row, col), &value) in self.regular_to_pixel.iter().zip(values.iter()) {
            array[[row, col]] = value;
        }
        Ok(array)
    }

    /// Gather the unmasked entries of a 2D data array into a 1D regular-grid array.
    pub fn map_to_1d(&self, array: &Array2<f64>) -> LensingResult<Array1<f64>> {
        if array.dim() != self.shape {
            return Err(LensingError::Grid(format!(
                "array shape {:?} does not match mask shape {:?}",
                array.dim(),
                self.shape
            )));
        }
        Ok(self
            .regular_to_pixel
            .iter()
            .map(|&(row, col)| array[[row, col]])
            .collect())
    }

    /// Mean of each regular pixel's sub-point values.
    pub fn sub_to_regular_average(&self, sub_values: &Array1<f64>) -> LensingResult<Array1<f64>> {
        self.check_sub_len(sub_values.len())?;
        let mut sums = Array1::zeros(self.regular_pixels());
        for (&regular, &value) in self.sub_to_regular.iter().zip(sub_values.iter()) {
            sums[regular] += value;
        }
        let per_pixel = (self.sub_grid_size * self.sub_grid_size) as f64;
        Ok(sums.mapv_into(|s| s / per_pixel))
    }

    /// Mean of each regular pixel's sub-point vectors.
    pub fn sub_to_regular_average_grid(&self, sub: &Grid) -> LensingResult<Grid> {
        self.check_sub_len(sub.len())?;
        let mut sums = Grid::zeros(self.regular_pixels());
        for (&regular, v) in self.sub_to_regular.iter().zip(sub.iter()) {
            sums.points[regular][0] += v[0];
            sums.points[regular][1] += v[1];
        }
        let per_pixel = (self.sub_grid_size * self.sub_grid_size) as f64;
        Ok(sums
            .iter()
            .map(|s| [s[0] / per_pixel, s[1] / per_pixel])
            .collect())
    }

    fn check_regular_len(&self, len: usize) -> LensingResult<()> {
        if len != self.regular_pixels() {
            return Err(LensingError::Grid(format!(
                "expected {} regular values, got {len}",
                self.regular_pixels()
            )));
        }
        Ok(())
    }

    fn check_sub_len(&self, len: usize) -> LensingResult<()> {
        if len != self.sub_pixels() {
            return Err(LensingError::Grid(format!(
                "expected {} sub values, got {len}",
                self.sub_pixels()
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Grid stack
// ─────────────────────────────────────────────────────────────────────────────

/// The regular, sub and blurring grids a plane is evaluated on.
#[derive(Debug, Clone, PartialEq)]
pub struct GridStack {
    regular: Grid,
    sub: Grid,
    blurring: Grid,
    mapping: Arc<GridMapping>,
}

impl GridStack {
    /// Assemble a stack, checking `len(sub) == len(regular) · sub_grid_size²`.
    pub fn new(regular: Grid, sub: Grid, blurring: Grid, mapping: Arc<GridMapping>) -> LensingResult<Self> {
        if regular.is_empty() {
            return Err(LensingError::Grid("regular grid has no points".into()));
        }
        if regular.len() != mapping.regular_pixels() {
            return Err(LensingError::Grid(format!(
                "regular grid has {} points but the mapping covers {} pixels",
                regular.len(),
                mapping.regular_pixels()
            )));
        }
        let n = mapping.sub_grid_size();
        if sub.len() != regular.len() * n * n || sub.len() != mapping.sub_pixels() {
            return Err(LensingError::Grid(format!(
                "sub grid has {} points, expected {} ({} pixels × {n}²)",
                sub.len(),
                regular.len() * n * n,
                regular.len()
            )));
        }
        Ok(Self {
            regular,
            sub,
            blurring,
            mapping,
        })
    }

    /// Stack over explicit points, laid out as a single row of pixels with
    /// contiguous sub-points.
    pub fn from_grids(regular: Grid, sub: Grid, blurring: Grid, sub_grid_size: usize) -> LensingResult<Self> {
        let pixels = (0..regular.len()).map(|i| (0, i)).collect();
        let mapping = GridMapping::contiguous((1, regular.len()), pixels, sub_grid_size)?;
        Self::new(regular, sub, blurring, Arc::new(mapping))
    }

    /// Sample every unmasked pixel of `mask`.
    ///
    /// # Arguments
    /// * `mask` - Observation mask defining the regular grid.
    /// * `sub_grid_size` - Sub-samples per pixel along each axis.
    /// * `psf_shape` - Odd PSF kernel shape defining the blurring region.
    pub fn from_mask(mask: &Mask, sub_grid_size: usize, psf_shape: (usize, usize)) -> LensingResult<Self> {
        Self::sample_mask(mask, sub_grid_size, mask.blurring_pixels(psf_shape)?)
    }

    /// Sample every pixel of `mask`'s array enlarged by the PSF border.
    ///
    /// The padded stack has no blurring grid: every pixel the PSF can reach
    /// is already in the regular grid. 2D images built from it are trimmed
    /// back to `mask`'s shape unless requested padded
    /// ([`GridMapping::map_to_2d_keep_padded`]).
    pub fn padded_from_mask(mask: &Mask, sub_grid_size: usize, psf_shape: (usize, usize)) -> LensingResult<Self> {
        let (psf_rows, psf_cols) = psf_shape;
        if psf_rows % 2 == 0 || psf_cols % 2 == 0 {
            return Err(LensingError::Grid(format!(
                "PSF shape must be odd in both dimensions, got {psf_rows}x{psf_cols}"
            )));
        }
        let (rows, cols) = mask.shape();
        let padded = Mask::unmasked((rows + psf_rows - 1, cols + psf_cols - 1), mask.pixel_scale())?;
        let stack = Self::sample_mask(&padded, sub_grid_size, Vec::new())?;
        let mapping = stack.mapping().clone().with_image_shape(mask.shape())?;
        Ok(Self {
            mapping: Arc::new(mapping),
            ..stack
        })
    }

    fn sample_mask(mask: &Mask, sub_grid_size: usize, blurring_pixels: Vec<(usize, usize)>) -> LensingResult<Self> {
        if sub_grid_size == 0 {
            return Err(LensingError::Grid("sub_grid_size must be at least 1".into()));
        }
        let pixels = mask.unmasked_pixels();
        if pixels.is_empty() {
            return Err(LensingError::Grid("mask has no unmasked pixels".into()));
        }

        let scale = mask.pixel_scale();
        let n = sub_grid_size;
        let step = scale / n as f64;

        let regular: Grid = pixels.iter().map(|&(r, c)| mask.pixel_centre(r, c)).collect();
        let sub: Grid = regular
            .iter()
            .flat_map(|&[yc, xc]| {
                (0..n).flat_map(move |i| {
                    (0..n).map(move |j| {
                        [
                            yc + scale / 2.0 - (i as f64 + 0.5) * step,
                            xc - scale / 2.0 + (j as f64 + 0.5) * step,
                        ]
                    })
                })
            })
            .collect();
        let blurring: Grid = blurring_pixels
            .into_iter()
            .map(|(r, c)| mask.pixel_centre(r, c))
            .collect();

        let mapping = GridMapping::contiguous(mask.shape(), pixels, sub_grid_size)?;
        Self::new(regular, sub, blurring, Arc::new(mapping))
    }

    pub fn regular(&self) -> &Grid {
        &self.regular
    }

    pub fn sub(&self) -> &Grid {
        &self.sub
    }

    pub fn blurring(&self) -> &Grid {
        &self.blurring
    }

    pub fn mapping(&self) -> &GridMapping {
        &self.mapping
    }

    pub fn sub_grid_size(&self) -> usize {
        self.mapping.sub_grid_size()
    }

    /// Shape of the 2D data array, padding excluded.
    pub fn shape(&self) -> (usize, usize) {
        self.mapping.image_shape()
    }

    pub fn is_padded(&self) -> bool {
        self.mapping.is_padded()
    }

    /// Apply `f` to each grid independently, sharing this stack's mapping.
    pub fn map_grids<F: Fn(&Grid) -> Grid>(&self, f: F) -> GridStack {
        GridStack {
            regular: f(&self.regular),
            sub: f(&self.sub),
            blurring: f(&self.blurring),
            mapping: Arc::clone(&self.mapping),
        }
    }

    /// `point − deflection` for every point of every grid.
    pub fn traced(&self, deflections: &GridStack) -> LensingResult<GridStack> {
        Ok(GridStack {
            regular: self.regular.deflected_by(&deflections.regular)?,
            sub: self.sub.deflected_by(&deflections.sub)?,
            blurring: self.blurring.deflected_by(&deflections.blurring)?,
            mapping: Arc::clone(&self.mapping),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_pixel_centres_follow_row_and_column_convention() {
        let mask = Mask::unmasked((3, 3), 2.0).unwrap();
        assert_eq!(mask.pixel_centre(0, 0), [2.0, -2.0]);
        assert_eq!(mask.pixel_centre(1, 1), [0.0, 0.0]);
        assert_eq!(mask.pixel_centre(2, 2), [-2.0, 2.0]);

        let even = Mask::unmasked((2, 4), 1.0).unwrap();
        assert_eq!(even.pixel_centre(0, 0), [0.5, -1.5]);
    }

    #[test]
    fn test_circular_mask() {
        let mask = Mask::circular((3, 3), 1.0, 0.5, [0.0, 0.0]).unwrap();
        assert_eq!(mask.pixels_in_mask(), 1);
        assert!(!mask.is_masked(1, 1));

        let cross = Mask::circular((3, 3), 1.0, 1.0, [0.0, 0.0]).unwrap();
        assert_eq!(cross.unmasked_pixels(), vec![(0, 1), (1, 0), (1, 1), (1, 2), (2, 1)]);
    }

    #[test]
    fn test_invalid_mask_inputs() {
        assert!(Mask::unmasked((3, 3), 0.0).is_err());
        assert!(Mask::unmasked((0, 3), 1.0).is_err());
    }

    #[test]
    fn test_blurring_pixels_surround_mask() {
        let mut masked = Array2::from_elem((5, 5), true);
        masked[[2, 2]] = false;
        let mask = Mask::from_array(masked, 1.0).unwrap();

        let blurring = mask.blurring_pixels((3, 3)).unwrap();
        assert_eq!(
            blurring,
            vec![(1, 1), (1, 2), (1, 3), (2, 1), (2, 3), (3, 1), (3, 2), (3, 3)]
        );
        assert!(mask.blurring_pixels((1, 1)).unwrap().is_empty());
        assert!(mask.blurring_pixels((2, 3)).is_err());
    }

    #[test]
    fn test_grid_stack_from_mask_sub_layout() {
        let mask = Mask::circular((3, 3), 1.0, 0.5, [0.0, 0.0]).unwrap();
        let stack = GridStack::from_mask(&mask, 2, (3, 3)).unwrap();

        assert_eq!(stack.regular().points(), &[[0.0, 0.0]]);
        assert_eq!(
            stack.sub().points(),
            &[[0.25, -0.25], [0.25, 0.25], [-0.25, -0.25], [-0.25, 0.25]]
        );
        assert_eq!(stack.blurring().len(), 8);
        assert_eq!(stack.blurring()[0], [1.0, -1.0]);
        assert_eq!(stack.mapping().sub_to_regular(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_grid_stack_length_invariant() {
        let regular = Grid::new(vec![[0.0, 0.0], [1.0, 1.0]]);
        let sub = Grid::new(vec![[0.0, 0.0]; 7]);
        let err = GridStack::from_grids(regular, sub, Grid::default(), 2);
        assert!(matches!(err, Err(LensingError::Grid(_))));
    }

    #[test]
    fn test_sub_averaging_and_2d_mapping() {
        let mask = Mask::circular((3, 3), 1.0, 1.0, [0.0, 0.0]).unwrap();
        let stack = GridStack::from_mask(&mask, 1, (1, 1)).unwrap();
        let mapping = stack.mapping();

        let values = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let image = mapping.map_to_2d(&values).unwrap();
        assert_eq!(
            image,
            array![[0.0, 1.0, 0.0], [2.0, 3.0, 4.0], [0.0, 5.0, 0.0]]
        );
        assert_eq!(mapping.map_to_1d(&image).unwrap(), values);
        assert!(mapping.map_to_2d(&array![1.0]).is_err());

        let sub_mapping = GridMapping::contiguous((1, 2), vec![(0, 0), (0, 1)], 2).unwrap();
        let averaged = sub_mapping
            .sub_to_regular_average(&array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])
            .unwrap();
        assert_relative_eq!(averaged[0], 2.5);
        assert_relative_eq!(averaged[1], 6.5);
    }

    #[test]
    fn test_mapping_rejects_uneven_sub_ownership() {
        let err = GridMapping::new((1, 2), vec![(0, 0), (0, 1)], 1, vec![0, 0]);
        assert!(err.is_err());
        let out_of_range = GridMapping::new((1, 1), vec![(0, 3)], 1, vec![0]);
        assert!(out_of_range.is_err());
    }

    #[test]
    fn test_mapping_rejects_duplicate_pixels() {
        let duplicate = GridMapping::new((1, 2), vec![(0, 0), (0, 0)], 1, vec![0, 1]);
        assert!(matches!(duplicate, Err(LensingError::Grid(msg)) if msg.contains("more than one")));
        assert!(GridMapping::new((1, 2), vec![(0, 1), (0, 0)], 1, vec![0, 1]).is_ok());
    }

    #[test]
    fn test_padded_grid_stack_covers_psf_border() {
        let mask = Mask::from_array(array![[true, false]], 3.0).unwrap();
        let stack = GridStack::padded_from_mask(&mask, 2, (3, 3)).unwrap();

        assert!(stack.is_padded());
        assert_eq!(stack.mapping().shape(), (3, 4));
        assert_eq!(stack.shape(), (1, 2));
        assert_eq!(stack.regular().len(), 12);
        assert_eq!(stack.sub().len(), 48);
        assert!(stack.blurring().is_empty());
        assert_eq!(stack.regular()[0], [3.0, -4.5]);
        assert_eq!(stack.regular()[11], [-3.0, 4.5]);

        let values: Array1<f64> = (0..12).map(f64::from).collect();
        let full = stack.mapping().map_to_2d_keep_padded(&values).unwrap();
        assert_eq!(full.dim(), (3, 4));
        assert_eq!(full[[2, 3]], 11.0);
        assert_eq!(stack.mapping().map_to_2d(&values).unwrap(), array![[5.0, 6.0]]);

        let unpadded = GridStack::from_mask(&mask, 2, (3, 3)).unwrap();
        assert!(!unpadded.is_padded());
        assert!(GridStack::padded_from_mask(&mask, 2, (2, 3)).is_err());
    }

    #[test]
    fn test_image_shape_must_centre_in_padded_array() {
        let mapping = GridMapping::contiguous((3, 4), vec![(0, 0)], 1).unwrap();
        assert!(mapping.clone().with_image_shape((1, 2)).unwrap().is_padded());
        assert!(mapping.clone().with_image_shape((2, 2)).is_err());
        assert!(mapping.with_image_shape((4, 4)).is_err());
    }

    #[test]
    fn test_traced_returns_new_stack() {
        let stack = GridStack::from_grids(
            Grid::new(vec![[1.0, 1.0]]),
            Grid::new(vec![[1.0, 1.0]]),
            Grid::new(vec![[2.0, 0.0]]),
            1,
        )
        .unwrap();
        let deflections = stack.map_grids(|g| g.iter().map(|p| [0.5 * p[0], 0.25 * p[1]]).collect());
        let traced = stack.traced(&deflections).unwrap();

        assert_eq!(traced.regular()[0], [0.5, 0.75]);
        assert_eq!(traced.blurring()[0], [1.0, 0.0]);
        assert_eq!(stack.regular()[0], [1.0, 1.0]);
    }

    #[test]
    fn test_grid_extent() {
        let grid = Grid::new(vec![[1.0, -2.0], [-3.0, 4.0], [0.0, 0.0]]);
        assert_eq!(grid.extent(), Some((-3.0, 1.0, -2.0, 4.0)));
        assert_eq!(Grid::default().extent(), None);
    }
}
