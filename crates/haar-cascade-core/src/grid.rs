/// Errors raised when wrapping a pixel buffer into a grid.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridError {
    #[error("grid dimensions must be non-zero (width={width}, height={height})")]
    ZeroDimension { width: usize, height: usize },
    #[error("pixel buffer length mismatch (expected {expected} bytes, got {got})")]
    BufferLength { expected: usize, got: usize },
}

fn check_dims(width: usize, height: usize, len: usize) -> Result<(), GridError> {
    if width == 0 || height == 0 {
        return Err(GridError::ZeroDimension { width, height });
    }
    let expected = width * height;
    if len != expected {
        return Err(GridError::BufferLength { expected, got: len });
    }
    Ok(())
}

/// Borrowed 8-bit luma grid, row-major.
#[derive(Clone, Copy, Debug)]
pub struct PixelGridView<'a> {
    width: usize,
    height: usize,
    data: &'a [u8],
}

impl<'a> PixelGridView<'a> {
    /// Wrap a row-major buffer of `width * height` intensities.
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Result<Self, GridError> {
        check_dims(width, height, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
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
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Intensity at column `x`, row `y`. Panics when out of range.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// One row of pixels.
    #[inline]
    pub fn row(&self, y: usize) -> &'a [u8] {
        &self.data[y * self.width..(y + 1) * self.width]
    }
}

/// Owned 8-bit luma grid, row-major. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelGrid {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl PixelGrid {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, GridError> {
        check_dims(width, height, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a grid by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(usize, usize) -> u8,
    ) -> Result<Self, GridError> {
        check_dims(width, height, width * height)?;
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Grid where every pixel has the same intensity.
    pub fn filled(width: usize, height: usize, value: u8) -> Result<Self, GridError> {
        Self::new(width, height, vec![value; width * height])
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
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn view(&self) -> PixelGridView<'_> {
        PixelGridView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}
