//! Facade crate for the `haar-cascade-*` workspace.
//!
//! This crate provides:
//! - re-exports of the inference types (`haar_cascade::core`) and the
//!   trainer (`haar_cascade::train`);
//! - (feature `image`) helpers that turn `image::GrayImage`s and image
//!   directories into training windows.
//!
//! ## Quickstart
//!
//! ```no_run
//! use haar_cascade::samples::load_window_samples;
//! use haar_cascade::{Trainer, TrainerParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let params = TrainerParams::default();
//! let positives = load_window_samples("train/face", params.window_size)?;
//! let negatives = load_window_samples("train/background", params.window_size)?;
//!
//! let cascade = Trainer::new(params)?.train_cascade(&positives, &negatives)?;
//! cascade.write_text_file("cascade.txt")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `haar_cascade::core`: integral grids, features, stages, cascades, model
//!   files, logger.
//! - `haar_cascade::train`: feature bank, threshold search, stage boosting,
//!   cascade bootstrap, evaluation.
//! - `haar_cascade::samples` (feature `image`): image to window conversion.
//!
//! The `rayon` feature parallelises the per-round feature search; trained
//! cascades are identical with and without it.

pub use haar_cascade_core as core;
pub use haar_cascade_train as train;

pub use haar_cascade_core::{Cascade, IntegralGrid, PixelGrid, PixelGridView, Stage, WeakRule};
pub use haar_cascade_train::{
    evaluate_cascade, CascadeEvaluation, TrainError, Trainer, TrainerParams, TrainingReport,
};

#[cfg(feature = "image")]
pub mod samples;
