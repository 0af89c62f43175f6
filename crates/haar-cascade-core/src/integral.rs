//! Summed-area table over a pixel grid.

use crate::feature::{FeatureError, Rect};
use crate::grid::{PixelGrid, PixelGridView};

/// Summed-area table: `at(x, y)` is the sum of every source pixel with
/// column `<= x` and row `<= y`.
///
/// Values are `i64`, enough for `width * height * 255` on any grid that fits
/// in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegralGrid {
    width: usize,
    height: usize,
    data: Vec<i64>,
}

impl IntegralGrid {
    /// Build the table in a single pass: running row sum plus the value
    /// directly above.
    pub fn new(src: &PixelGridView<'_>) -> Self {
        let (width, height) = (src.width(), src.height());
        let mut data = vec![0i64; width * height];
        for y in 0..height {
            let mut row_sum = 0i64;
            for (x, &p) in src.row(y).iter().enumerate() {
                row_sum += i64::from(p);
                let above = if y > 0 { data[(y - 1) * width + x] } else { 0 };
                data[y * width + x] = row_sum + above;
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn as_slice(&self) -> &[i64] {
        &self.data
    }

    /// Table value at column `x`, row `y`. Panics when out of range.
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> i64 {
        self.data[y * self.width + x]
    }

    /// Sum of the source pixels covered by `rect` translated by `(ox, oy)`.
    ///
    /// The translated rectangle must lie entirely inside the grid; it is never
    /// clipped.
    pub fn rect_sum(&self, rect: &Rect, ox: usize, oy: usize) -> Result<i64, FeatureError> {
        if rect.width == 0 || rect.height == 0 {
            return Err(FeatureError::EmptyRect {
                width: rect.width,
                height: rect.height,
            });
        }
        let out_of_bounds = || FeatureError::OutOfBounds {
            rect: *rect,
            offset_x: ox,
            offset_y: oy,
            grid_width: self.width,
            grid_height: self.height,
        };

        let x1 = ox.checked_add(rect.x).ok_or_else(out_of_bounds)?;
        let y1 = oy.checked_add(rect.y).ok_or_else(out_of_bounds)?;
        let x2 = x1.checked_add(rect.width - 1).ok_or_else(out_of_bounds)?;
        let y2 = y1.checked_add(rect.height - 1).ok_or_else(out_of_bounds)?;
        if x2 >= self.width || y2 >= self.height {
            return Err(out_of_bounds());
        }

        let d = self.at(x2, y2);
        let a = if x1 > 0 && y1 > 0 {
            self.at(x1 - 1, y1 - 1)
        } else {
            0
        };
        let b = if y1 > 0 { self.at(x2, y1 - 1) } else { 0 };
        let c = if x1 > 0 { self.at(x1 - 1, y2) } else { 0 };
        Ok(d + a - b - c)
    }
}

impl From<&PixelGrid> for IntegralGrid {
    fn from(grid: &PixelGrid) -> Self {
        Self::new(&grid.view())
    }
}

impl From<PixelGridView<'_>> for IntegralGrid {
    fn from(view: PixelGridView<'_>) -> Self {
        Self::new(&view)
    }
}
