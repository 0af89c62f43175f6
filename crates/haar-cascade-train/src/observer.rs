//! Training progress hooks.
//!
//! Observers are called at fixed points of the training loop and only ever
//! see shared references, so they cannot change what gets trained.

use haar_cascade_core::WeakRule;
use serde::Serialize;

/// Position of a boosting round inside a training run. All indices are
/// zero-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RoundProgress {
    pub stage: usize,
    /// Upper bound on the number of stages (`max_stages`); the run can end
    /// earlier once the false-positive target is met.
    pub total_stages: usize,
    pub round: usize,
    pub total_rounds: usize,
}

/// Outcome of one bootstrap stage.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StageReport {
    pub index: usize,
    pub weak_rules: usize,
    /// Original negatives still accepted by the cascade after this stage.
    pub hard_negatives: usize,
    /// `hard_negatives / original negative count`.
    pub false_positive_rate: f64,
    /// Fraction of positives accepted by the cascade after this stage.
    pub detection_rate: f64,
}

pub trait TrainingObserver {
    fn round_started(&mut self, _progress: RoundProgress) {}

    fn round_finished(&mut self, _progress: RoundProgress, _rule: &WeakRule, _error: f64) {}

    fn stage_finished(&mut self, _report: &StageReport) {}
}

/// Ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl TrainingObserver for NoopObserver {}

/// Forwards events to the `log` facade: stages at info, rounds at debug.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl TrainingObserver for LogObserver {
    fn round_finished(&mut self, progress: RoundProgress, rule: &WeakRule, error: f64) {
        log::debug!(
            "stage {} round {}/{}: {:?} threshold={} polarity={:?} error={:.6} alpha={:.4}",
            progress.stage,
            progress.round + 1,
            progress.total_rounds,
            rule.feature.kind(),
            rule.threshold,
            rule.polarity,
            error,
            rule.alpha
        );
    }

    fn stage_finished(&mut self, report: &StageReport) {
        log::info!(
            "stage {}: {} rules, {} hard negatives, fpr={:.4}, detection={:.4}",
            report.index,
            report.weak_rules,
            report.hard_negatives,
            report.false_positive_rate,
            report.detection_rate
        );
    }
}

/// Calls a closure at the start of every round.
pub struct ProgressFn<F>(pub F);

impl<F: FnMut(RoundProgress)> TrainingObserver for ProgressFn<F> {
    fn round_started(&mut self, progress: RoundProgress) {
        (self.0)(progress)
    }
}

impl<T: TrainingObserver + ?Sized> TrainingObserver for &mut T {
    fn round_started(&mut self, progress: RoundProgress) {
        (**self).round_started(progress)
    }

    fn round_finished(&mut self, progress: RoundProgress, rule: &WeakRule, error: f64) {
        (**self).round_finished(progress, rule, error)
    }

    fn stage_finished(&mut self, report: &StageReport) {
        (**self).stage_finished(report)
    }
}
