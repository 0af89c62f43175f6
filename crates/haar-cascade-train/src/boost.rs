//! Discrete AdaBoost over a fixed feature bank.

use std::sync::atomic::{AtomicBool, Ordering};

use haar_cascade_core::{FeatureError, HaarFeature, IntegralGrid, Stage, StageBuilder, WeakRule};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::observer::{RoundProgress, TrainingObserver};
use crate::search::{alpha_from_error, SearchScratch, Split, MIN_WEIGHTED_ERROR};
use crate::TrainError;

/// Starting weights: `1/(2P)` per positive and `1/(2Q)` per negative, so each
/// class carries half the total mass.
pub fn initial_weights(positives: usize, negatives: usize) -> Vec<f64> {
    let wp = 0.5 / positives as f64;
    let wn = 0.5 / negatives as f64;
    let mut weights = Vec::with_capacity(positives + negatives);
    weights.resize(positives, wp);
    weights.resize(positives + negatives, wn);
    weights
}

/// Scale correctly classified samples by `exp(-alpha)`, misclassified ones by
/// `exp(alpha)`, then renormalise to sum 1.
pub fn update_weights(weights: &mut [f64], correct: &[bool], alpha: f64) {
    debug_assert_eq!(weights.len(), correct.len());
    let down = (-alpha).exp();
    let up = alpha.exp();
    let mut sum = 0.0;
    for (w, &ok) in weights.iter_mut().zip(correct) {
        *w *= if ok { down } else { up };
        sum += *w;
    }
    if sum > 0.0 {
        for w in weights.iter_mut() {
            *w /= sum;
        }
    }
}

/// Labelled training windows for one stage; positives come first.
pub(crate) struct StageSamples<'a> {
    pub(crate) grids: Vec<&'a IntegralGrid>,
    pub(crate) is_positive: Vec<bool>,
}

impl<'a> StageSamples<'a> {
    pub(crate) fn new(positives: &[&'a IntegralGrid], negatives: &[&'a IntegralGrid]) -> Self {
        let mut grids = Vec::with_capacity(positives.len() + negatives.len());
        grids.extend_from_slice(positives);
        grids.extend_from_slice(negatives);
        let mut is_positive = vec![true; positives.len()];
        is_positive.resize(grids.len(), false);
        Self { grids, is_positive }
    }

    pub(crate) fn positive_count(&self) -> usize {
        self.is_positive.iter().filter(|&&p| p).count()
    }

    fn len(&self) -> usize {
        self.grids.len()
    }
}

fn fill_values(
    values: &mut Vec<i64>,
    feature: &HaarFeature,
    grids: &[&IntegralGrid],
) -> Result<(), FeatureError> {
    values.clear();
    for ii in grids {
        values.push(feature.evaluate(ii, 0, 0)?);
    }
    Ok(())
}

/// Strict `<` on the per-feature errors. Each error is the sample-order sum of
/// the misclassified weights, so features that split the samples the same way
/// compare equal bit for bit and the earlier one in bank order is kept.
fn is_better(candidate: &Split, best: Option<&(usize, Split)>) -> bool {
    best.is_none_or(|(_, b)| candidate.error < b.error)
}

/// Lowest-error `(feature index, split)` over `bank`; ties keep the earliest
/// feature (see [`is_better`]).
#[cfg(not(feature = "rayon"))]
fn best_split(
    bank: &[HaarFeature],
    samples: &StageSamples<'_>,
    weights: &[f64],
) -> Result<Option<(usize, Split)>, FeatureError> {
    let mut scratch = SearchScratch::default();
    let mut best: Option<(usize, Split)> = None;
    for (index, feature) in bank.iter().enumerate() {
        fill_values(&mut scratch.values, feature, &samples.grids)?;
        if let Some(split) = scratch.search(&samples.is_positive, weights) {
            if is_better(&split, best.as_ref()) {
                best = Some((index, split));
            }
        }
    }
    Ok(best)
}

/// Lowest-error `(feature index, split)` over `bank`; ties keep the earliest
/// feature (see [`is_better`]).
#[cfg(feature = "rayon")]
fn best_split(
    bank: &[HaarFeature],
    samples: &StageSamples<'_>,
    weights: &[f64],
) -> Result<Option<(usize, Split)>, FeatureError> {
    let splits = bank
        .par_iter()
        .map_init(
            SearchScratch::default,
            |scratch, feature| -> Result<Option<Split>, FeatureError> {
                fill_values(&mut scratch.values, feature, &samples.grids)?;
                Ok(scratch.search(&samples.is_positive, weights))
            },
        )
        .collect::<Result<Vec<_>, FeatureError>>()?;

    // serial reduction keeps bank order as the tie-break
    let mut best: Option<(usize, Split)> = None;
    for (index, split) in splits.into_iter().enumerate() {
        if let Some(split) = split {
            if is_better(&split, best.as_ref()) {
                best = Some((index, split));
            }
        }
    }
    Ok(best)
}

/// Per-run settings threaded into [`boost_stage`].
pub(crate) struct BoostConfig<'a> {
    pub(crate) bank: &'a [HaarFeature],
    pub(crate) rounds: usize,
    pub(crate) stage: usize,
    pub(crate) total_stages: usize,
    pub(crate) cancel: Option<&'a AtomicBool>,
}

/// One AdaBoost round: pick the best rule under `weights`, then reweight them
/// in place. Returns the rule with its unclamped weighted error, or `None` when
/// `bank` is empty.
pub(crate) fn boost_round(
    bank: &[HaarFeature],
    samples: &StageSamples<'_>,
    weights: &mut [f64],
) -> Result<Option<(WeakRule, f64)>, FeatureError> {
    let Some((index, split)) = best_split(bank, samples, weights)? else {
        return Ok(None);
    };
    let rule = WeakRule {
        feature: bank[index],
        threshold: split.threshold,
        polarity: split.polarity,
        alpha: alpha_from_error(split.error),
    };

    let mut values = Vec::with_capacity(samples.len());
    fill_values(&mut values, &rule.feature, &samples.grids)?;
    let correct: Vec<bool> = values
        .iter()
        .zip(&samples.is_positive)
        .map(|(&v, &label)| rule.vote(v) == label)
        .collect();
    update_weights(weights, &correct, rule.alpha);
    Ok(Some((rule, split.error)))
}

/// Train one stage of `config.rounds` weak rules and seal it at half the
/// accumulated alpha.
pub(crate) fn boost_stage<O: TrainingObserver + ?Sized>(
    config: &BoostConfig<'_>,
    samples: &StageSamples<'_>,
    observer: &mut O,
) -> Result<Stage, TrainError> {
    let positives = samples.positive_count();
    let mut weights = initial_weights(positives, samples.len() - positives);
    let mut builder = StageBuilder::new();

    for round in 0..config.rounds {
        if config.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(TrainError::Cancelled);
        }
        let progress = RoundProgress {
            stage: config.stage,
            total_stages: config.total_stages,
            round,
            total_rounds: config.rounds,
        };
        observer.round_started(progress);

        let Some((rule, error)) = boost_round(config.bank, samples, &mut weights)? else {
            return Err(TrainError::InvalidParams(
                "feature bank is empty".to_string(),
            ));
        };
        if !(MIN_WEIGHTED_ERROR..=1.0 - MIN_WEIGHTED_ERROR).contains(&error) {
            log::debug!(
                "stage {} round {}: weighted error {:e} clamped",
                config.stage,
                round,
                error
            );
        }

        builder.push(rule);
        observer.round_finished(progress, &rule, error);
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use approx::assert_abs_diff_eq;
    use haar_cascade_core::{PixelGrid, Rect};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn initial_weights_split_mass_between_classes() {
        let w = initial_weights(3, 5);
        assert_eq!(w.len(), 8);
        assert_abs_diff_eq!(w[..3].iter().sum::<f64>(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(w[3..].iter().sum::<f64>(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn weights_stay_normalised_for_any_counts() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let p = rng.gen_range(1..20);
            let q = rng.gen_range(1..20);
            let mut weights = initial_weights(p, q);
            for _ in 0..5 {
                let correct: Vec<bool> = (0..p + q).map(|_| rng.gen()).collect();
                let alpha = rng.gen_range(-3.0..12.0);
                update_weights(&mut weights, &correct, alpha);
                assert_abs_diff_eq!(weights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn misclassified_samples_gain_weight() {
        let mut weights = initial_weights(2, 2);
        update_weights(&mut weights, &[true, false, true, true], 0.5);
        assert!(weights[1] > weights[0]);
        assert!(weights[1] > weights[2]);
    }

    fn grid(top: u8, bottom: u8) -> IntegralGrid {
        let img = PixelGrid::from_fn(4, 4, |_, y| if y < 2 { top } else { bottom }).expect("grid");
        IntegralGrid::from(&img)
    }

    #[test]
    fn separable_stage_accepts_positives_and_rejects_negatives() {
        let pos = [grid(220, 30), grid(200, 40)];
        let neg = [grid(30, 220), grid(128, 128)];
        let pos_refs: Vec<_> = pos.iter().collect();
        let neg_refs: Vec<_> = neg.iter().collect();
        let samples = StageSamples::new(&pos_refs, &neg_refs);
        let bank = [HaarFeature::new(
            Rect::new(0, 0, 4, 2).expect("rect"),
            Rect::new(0, 2, 4, 2).expect("rect"),
        )];
        let config = BoostConfig {
            bank: &bank,
            rounds: 2,
            stage: 0,
            total_stages: 1,
            cancel: None,
        };
        let stage = boost_stage(&config, &samples, &mut NoopObserver).expect("stage");
        assert_eq!(stage.rules().len(), 2);
        for ii in &pos {
            assert!(stage.classify(ii, 0, 0).expect("classify"));
        }
        for ii in &neg {
            assert!(!stage.classify(ii, 0, 0).expect("classify"));
        }
    }

    #[test]
    fn cancelled_before_first_round() {
        let pos = [grid(220, 30)];
        let neg = [grid(30, 220)];
        let samples = StageSamples::new(&[&pos[0]], &[&neg[0]]);
        let bank = [HaarFeature::new(
            Rect::new(0, 0, 4, 2).expect("rect"),
            Rect::new(0, 2, 4, 2).expect("rect"),
        )];
        let flag = AtomicBool::new(true);
        let config = BoostConfig {
            bank: &bank,
            rounds: 3,
            stage: 0,
            total_stages: 1,
            cancel: Some(&flag),
        };
        let err = boost_stage(&config, &samples, &mut NoopObserver).unwrap_err();
        assert!(matches!(err, TrainError::Cancelled));
    }

    /// Full-width rows `white_y..white_y + h` minus rows `black_y..black_y + h`.
    fn row_pair(white_y: usize, black_y: usize, h: usize) -> HaarFeature {
        HaarFeature::new(
            Rect::new(0, white_y, 4, h).expect("rect"),
            Rect::new(0, black_y, 4, h).expect("rect"),
        )
    }

    /// Three positives and five negatives, so the weights are not powers of two.
    fn uneven_samples() -> (Vec<IntegralGrid>, Vec<IntegralGrid>) {
        let pos = (0..3u8).map(|k| grid(150 + k, 90 - k)).collect();
        let neg = (0..3u8)
            .map(|k| grid(240 + k, 10 + k))
            .chain([grid(60, 140), grid(70, 145)])
            .collect();
        (pos, neg)
    }

    #[test]
    fn equivalent_features_resolve_to_the_earliest() {
        let (pos, neg) = uneven_samples();
        let pos_refs: Vec<_> = pos.iter().collect();
        let neg_refs: Vec<_> = neg.iter().collect();
        let samples = StageSamples::new(&pos_refs, &neg_refs);
        // the same top/bottom contrast, negated, doubled and halved
        let bank = [
            row_pair(2, 0, 2),
            row_pair(0, 2, 2),
            row_pair(0, 2, 2),
            row_pair(0, 2, 1),
        ];

        let mut weights = initial_weights(3, 5);
        for _ in 0..4 {
            let (rule, error) = boost_round(&bank, &samples, &mut weights)
                .expect("round")
                .expect("rule");
            assert_eq!(rule.feature, bank[0]);
            assert!(error >= 0.0);
        }
    }

    #[test]
    fn weights_sum_to_one_after_every_round() {
        let (pos, neg) = uneven_samples();
        let pos_refs: Vec<_> = pos.iter().collect();
        let neg_refs: Vec<_> = neg.iter().collect();
        let samples = StageSamples::new(&pos_refs, &neg_refs);
        let bank = [
            row_pair(0, 2, 2),
            row_pair(1, 2, 1),
            row_pair(0, 3, 1),
        ];

        let mut weights = initial_weights(3, 5);
        for _ in 0..6 {
            boost_round(&bank, &samples, &mut weights)
                .expect("round")
                .expect("rule");
            assert_abs_diff_eq!(weights.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
            assert!(weights.iter().all(|&w| w > 0.0));
        }
    }

    #[test]
    fn empty_bank_yields_no_round() {
        let (pos, neg) = uneven_samples();
        let samples = StageSamples::new(&[&pos[0]], &[&neg[0]]);
        let mut weights = initial_weights(1, 1);
        assert!(boost_round(&[], &samples, &mut weights)
            .expect("round")
            .is_none());
        assert_eq!(weights, vec![0.5, 0.5]);
    }
}
