//! Core types for Viola-Jones style cascade classifiers.
//!
//! Inference data flows bottom-up:
//! pixel grid → [`IntegralGrid`] → [`HaarFeature`] values → [`Stage`] vote →
//! [`Cascade`] decision.
//!
//! This crate does not read images, rescale them or scan full frames. Callers
//! hand it fixed-size grids and ask for single-window decisions with
//! [`Cascade::classify`].
//!
//! ```
//! use haar_cascade_core::{
//!     Cascade, HaarFeature, IntegralGrid, PixelGrid, Polarity, Rect, StageBuilder, WeakRule,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bright_top = PixelGrid::from_fn(4, 4, |_, y| if y < 2 { 220 } else { 30 })?;
//! let ii = IntegralGrid::from(&bright_top);
//!
//! let mut stage = StageBuilder::new();
//! stage.push(WeakRule {
//!     feature: HaarFeature::new(Rect::new(0, 0, 4, 2)?, Rect::new(0, 2, 4, 2)?),
//!     threshold: 0,
//!     polarity: Polarity::Negative,
//!     alpha: 1.0,
//! });
//!
//! let mut cascade = Cascade::new();
//! cascade.push_stage(stage.build());
//! assert!(cascade.classify(&ii, 0, 0)?);
//! # Ok(())
//! # }
//! ```

mod cascade;
mod feature;
mod grid;
mod integral;
mod logger;
mod model;
mod stage;

pub use cascade::Cascade;
pub use feature::{FeatureError, FeatureKind, HaarFeature, Rect};
pub use grid::{GridError, PixelGrid, PixelGridView};
pub use integral::IntegralGrid;
pub use model::{ModelError, MODEL_MAGIC, MODEL_VERSION};
pub use stage::{Polarity, Stage, StageBuilder, WeakRule};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level, training_directives, LOG_ENV_VAR};
