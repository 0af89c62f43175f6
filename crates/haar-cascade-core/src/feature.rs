//! Rectangles and two-rectangle Haar features.

use crate::integral::IntegralGrid;
use serde::{Deserialize, Serialize};

/// Errors raised while evaluating a feature on an integral grid.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureError {
    #[error(
        "rectangle {rect:?} at offset ({offset_x}, {offset_y}) exceeds {grid_width}x{grid_height} grid"
    )]
    OutOfBounds {
        rect: Rect,
        offset_x: usize,
        offset_y: usize,
        grid_width: usize,
        grid_height: usize,
    },
    #[error("rectangle must have non-zero size (width={width}, height={height})")]
    EmptyRect { width: usize, height: usize },
}

/// Axis-aligned rectangle in window-local coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Result<Self, FeatureError> {
        if width == 0 || height == 0 {
            return Err(FeatureError::EmptyRect { width, height });
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// One past the last covered column.
    #[inline]
    pub fn right(&self) -> usize {
        self.x + self.width
    }

    /// One past the last covered row.
    #[inline]
    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

/// Layout of the two rectangles of a feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Equal rectangles stacked vertically, white above black.
    HorizontalPair,
    /// Equal rectangles side by side, white left of black.
    VerticalPair,
    /// Any other arrangement (only reachable through hand-built features).
    Other,
}

/// Two-rectangle Haar feature: white-sum minus black-sum.
///
/// Stateless; the same feature is evaluated on many samples and offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HaarFeature {
    pub white: Rect,
    pub black: Rect,
}

impl HaarFeature {
    pub fn new(white: Rect, black: Rect) -> Self {
        Self { white, black }
    }

    /// Feature value with the window's top-left corner at `(ox, oy)`.
    #[inline]
    pub fn evaluate(&self, ii: &IntegralGrid, ox: usize, oy: usize) -> Result<i64, FeatureError> {
        Ok(ii.rect_sum(&self.white, ox, oy)? - ii.rect_sum(&self.black, ox, oy)?)
    }

    /// Width and height of the smallest window (anchored at the origin)
    /// that contains both rectangles.
    pub fn extent(&self) -> (usize, usize) {
        (
            self.white.right().max(self.black.right()),
            self.white.bottom().max(self.black.bottom()),
        )
    }

    pub fn kind(&self) -> FeatureKind {
        let (w, b) = (&self.white, &self.black);
        if w.width != b.width || w.height != b.height {
            return FeatureKind::Other;
        }
        if w.x == b.x && b.y == w.bottom() {
            FeatureKind::HorizontalPair
        } else if w.y == b.y && b.x == w.right() {
            FeatureKind::VerticalPair
        } else {
            FeatureKind::Other
        }
    }

    pub(crate) fn check_non_empty(&self) -> Result<(), FeatureError> {
        for r in [&self.white, &self.black] {
            if r.width == 0 || r.height == 0 {
                return Err(FeatureError::EmptyRect {
                    width: r.width,
                    height: r.height,
                });
            }
        }
        Ok(())
    }
}
