use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use haar_cascade_core::{Cascade, HaarFeature, IntegralGrid, Stage};
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::bank::build_feature_bank;
use crate::boost::{boost_stage, BoostConfig, StageSamples};
use crate::observer::{LogObserver, StageReport, TrainingObserver};
use crate::{TrainError, TrainerParams};

/// Why the bootstrap loop stopped adding stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// False-positive rate at or below `target_false_positive_rate`.
    TargetReached,
    /// The last stage rejected every remaining negative.
    NegativesExhausted,
    /// `max_stages` stages were trained.
    StageLimit,
}

/// Cascade plus per-stage history of a bootstrap run.
#[derive(Clone, Debug, Serialize)]
pub struct TrainingReport {
    pub cascade: Cascade,
    pub stages: Vec<StageReport>,
    pub stop_reason: StopReason,
}

/// Cascade trainer over a fixed feature bank.
///
/// The bank is enumerated once from `params.window_size` and reused for every
/// stage. Every sample must be at least `window_size × window_size`; features
/// are evaluated at offset `(0, 0)`.
#[derive(Clone, Debug)]
pub struct Trainer {
    params: TrainerParams,
    bank: Vec<HaarFeature>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Trainer {
    pub fn new(params: TrainerParams) -> Result<Self, TrainError> {
        params.validate()?;
        let bank = build_feature_bank(params.window_size);
        log::debug!(
            "window {}: {} candidate features",
            params.window_size,
            bank.len()
        );
        Ok(Self {
            params,
            bank,
            cancel: None,
        })
    }

    /// Abort at the next round boundary once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    #[inline]
    pub fn params(&self) -> &TrainerParams {
        &self.params
    }

    #[inline]
    pub fn feature_bank(&self) -> &[HaarFeature] {
        &self.bank
    }

    /// Features searched in every round.
    fn search_bank(&self) -> &[HaarFeature] {
        match self.params.max_features_per_round {
            Some(cap) => &self.bank[..cap.min(self.bank.len())],
            None => &self.bank,
        }
    }

    fn boost_config(&self, stage: usize, total_stages: usize) -> BoostConfig<'_> {
        BoostConfig {
            bank: self.search_bank(),
            rounds: self.params.rounds_per_stage,
            stage,
            total_stages,
            cancel: self.cancel.as_deref(),
        }
    }

    /// Boost a single stage on the full sample sets.
    pub fn train_stage(
        &self,
        positives: &[IntegralGrid],
        negatives: &[IntegralGrid],
    ) -> Result<Stage, TrainError> {
        self.train_stage_with_observer(positives, negatives, &mut LogObserver)
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(positives = positives.len(), negatives = negatives.len()))
    )]
    pub fn train_stage_with_observer<O: TrainingObserver + ?Sized>(
        &self,
        positives: &[IntegralGrid],
        negatives: &[IntegralGrid],
        observer: &mut O,
    ) -> Result<Stage, TrainError> {
        check_samples(positives, negatives, self.params.window_size)?;
        let pos: Vec<&IntegralGrid> = positives.iter().collect();
        let neg: Vec<&IntegralGrid> = negatives.iter().collect();
        let samples = StageSamples::new(&pos, &neg);
        boost_stage(&self.boost_config(0, 1), &samples, observer)
    }

    /// Bootstrap a cascade, logging progress through the `log` facade.
    pub fn train_cascade(
        &self,
        positives: &[IntegralGrid],
        negatives: &[IntegralGrid],
    ) -> Result<Cascade, TrainError> {
        self.train_cascade_with_observer(positives, negatives, &mut LogObserver)
    }

    pub fn train_cascade_with_observer<O: TrainingObserver + ?Sized>(
        &self,
        positives: &[IntegralGrid],
        negatives: &[IntegralGrid],
        observer: &mut O,
    ) -> Result<Cascade, TrainError> {
        Ok(self
            .train_cascade_report(positives, negatives, observer)?
            .cascade)
    }

    /// Bootstrap a cascade with hard-negative mining.
    ///
    /// Each stage is trained on all positives and on the negatives that every
    /// earlier stage still accepts. Positives are never filtered. Stops when
    /// the accepted fraction of the original negatives reaches the target,
    /// when no negatives remain, or after `max_stages` stages.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(positives = positives.len(), negatives = negatives.len()))
    )]
    pub fn train_cascade_report<O: TrainingObserver + ?Sized>(
        &self,
        positives: &[IntegralGrid],
        negatives: &[IntegralGrid],
        observer: &mut O,
    ) -> Result<TrainingReport, TrainError> {
        check_samples(positives, negatives, self.params.window_size)?;

        let original_negatives = negatives.len();
        let pos: Vec<&IntegralGrid> = positives.iter().collect();
        let mut pool: Vec<&IntegralGrid> = negatives.iter().collect();
        let mut cascade = Cascade::new();
        let mut reports = Vec::new();
        let max_stages = self.params.max_stages;

        log::info!(
            "training cascade: {} positives, {} negatives, target fpr {}, target detection {} (not enforced)",
            positives.len(),
            original_negatives,
            self.params.target_false_positive_rate,
            self.params.target_detection_rate
        );

        let stop_reason = loop {
            let index = cascade.len();
            log::info!(
                "stage {}: {} positives, {} negatives",
                index,
                pos.len(),
                pool.len()
            );
            let samples = StageSamples::new(&pos, &pool);
            let stage = boost_stage(&self.boost_config(index, max_stages), &samples, observer)?;
            let weak_rules = stage.rules().len();
            cascade.push_stage(stage);

            let mut hard = Vec::with_capacity(pool.len());
            for ii in pool {
                if cascade.classify(ii, 0, 0)? {
                    hard.push(ii);
                }
            }
            pool = hard;

            let mut detected = 0usize;
            for ii in &pos {
                if cascade.classify(ii, 0, 0)? {
                    detected += 1;
                }
            }

            let report = StageReport {
                index,
                weak_rules,
                hard_negatives: pool.len(),
                false_positive_rate: pool.len() as f64 / original_negatives as f64,
                detection_rate: detected as f64 / pos.len() as f64,
            };
            observer.stage_finished(&report);
            let fpr = report.false_positive_rate;
            reports.push(report);

            if pool.is_empty() {
                break StopReason::NegativesExhausted;
            }
            if fpr <= self.params.target_false_positive_rate {
                break StopReason::TargetReached;
            }
            if cascade.len() >= max_stages {
                log::warn!(
                    "stopping at {} stages with fpr {:.4} above target {}",
                    max_stages,
                    fpr,
                    self.params.target_false_positive_rate
                );
                break StopReason::StageLimit;
            }
        };

        log::info!(
            "cascade done: {} stages, {} weak rules, {:?}",
            cascade.len(),
            cascade.weak_rule_count(),
            stop_reason
        );

        Ok(TrainingReport {
            cascade,
            stages: reports,
            stop_reason,
        })
    }
}

pub(crate) fn check_samples(
    positives: &[IntegralGrid],
    negatives: &[IntegralGrid],
    window: usize,
) -> Result<(), TrainError> {
    if positives.is_empty() {
        return Err(TrainError::EmptyPositives);
    }
    if negatives.is_empty() {
        return Err(TrainError::EmptyNegatives);
    }
    for (label, set) in [("positive", positives), ("negative", negatives)] {
        for (index, ii) in set.iter().enumerate() {
            if ii.width() < window || ii.height() < window {
                return Err(TrainError::SampleTooSmall {
                    label,
                    index,
                    width: ii.width(),
                    height: ii.height(),
                    window,
                });
            }
        }
    }
    Ok(())
}
