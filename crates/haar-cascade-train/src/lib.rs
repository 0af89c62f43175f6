//! Stage boosting and hard-negative bootstrapping for Haar cascades.
//!
//! Training windows are [`IntegralGrid`]s of at least
//! `window_size × window_size`; the label of a window is given by the slice it
//! is passed in. [`Trainer`] enumerates every two-rectangle feature of the
//! window once, then:
//!
//! - boosts each stage with discrete AdaBoost, one weak rule per round,
//!   picking the lowest weighted-error feature/threshold/polarity triple;
//! - appends stages while the false-positive rate on the original negatives
//!   is above target, training each new stage only on negatives that the
//!   cascade so far still accepts.
//!
//! Enable the `rayon` feature to search features in parallel. Results do not
//! depend on the feature.
//!
//! ```no_run
//! use haar_cascade_core::IntegralGrid;
//! use haar_cascade_train::{Trainer, TrainerParams};
//!
//! # fn load(_: &str) -> Vec<IntegralGrid> { Vec::new() }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let positives = load("faces");
//! let negatives = load("background");
//!
//! let trainer = Trainer::new(TrainerParams::default())?;
//! let cascade = trainer.train_cascade(&positives, &negatives)?;
//! cascade.write_text_file("cascade.txt")?;
//! # Ok(())
//! # }
//! ```

mod bank;
mod boost;
mod error;
mod evaluate;
mod observer;
mod params;
mod search;
mod trainer;

pub use bank::{build_feature_bank, feature_bank_size};
pub use boost::{initial_weights, update_weights};
pub use error::TrainError;
pub use evaluate::{evaluate_cascade, CascadeEvaluation};
pub use observer::{
    LogObserver, NoopObserver, ProgressFn, RoundProgress, StageReport, TrainingObserver,
};
pub use params::{TrainerIoError, TrainerParams};
pub use search::{
    alpha_from_error, search_threshold, split_error, Split, MIN_WEIGHTED_ERROR, TIE_EPSILON,
};
pub use trainer::{StopReason, Trainer, TrainingReport};

use boost::{boost_stage, BoostConfig, StageSamples};
use haar_cascade_core::{Cascade, HaarFeature, IntegralGrid, Stage};

/// Boost one stage over an explicit feature bank.
///
/// `params.max_features_per_round` still bounds the searched prefix of
/// `bank`; `max_stages` is ignored.
pub fn train_stage(
    positives: &[IntegralGrid],
    negatives: &[IntegralGrid],
    params: &TrainerParams,
    bank: &[HaarFeature],
) -> Result<Stage, TrainError> {
    params.validate()?;
    trainer::check_samples(positives, negatives, params.window_size)?;
    let bank = match params.max_features_per_round {
        Some(cap) => &bank[..cap.min(bank.len())],
        None => bank,
    };
    let pos: Vec<&IntegralGrid> = positives.iter().collect();
    let neg: Vec<&IntegralGrid> = negatives.iter().collect();
    let config = BoostConfig {
        bank,
        rounds: params.rounds_per_stage,
        stage: 0,
        total_stages: 1,
        cancel: None,
    };
    boost_stage(&config, &StageSamples::new(&pos, &neg), &mut LogObserver)
}

/// Bootstrap a cascade over the full feature bank of `params.window_size`.
pub fn train_cascade(
    positives: &[IntegralGrid],
    negatives: &[IntegralGrid],
    params: &TrainerParams,
) -> Result<Cascade, TrainError> {
    Trainer::new(params.clone())?.train_cascade(positives, negatives)
}
