use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use approx::assert_abs_diff_eq;
use haar_cascade_core::{
    Cascade, HaarFeature, IntegralGrid, PixelGrid, Polarity, Rect, StageBuilder, WeakRule,
};
use haar_cascade_train::{
    alpha_from_error, evaluate_cascade, initial_weights, search_threshold, train_cascade,
    train_stage, update_weights, NoopObserver, ProgressFn, RoundProgress, StageReport,
    StopReason, TrainError, Trainer, TrainerParams, TrainingObserver,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn integral(img: PixelGrid) -> IntegralGrid {
    IntegralGrid::from(&img)
}

/// Bright top half, dark bottom half, with per-sample texture.
fn bright_top(k: usize) -> IntegralGrid {
    integral(
        PixelGrid::from_fn(4, 4, |x, y| {
            if y < 2 {
                (200 + ((x + k) * 7) % 40) as u8
            } else {
                (20 + ((x * 3 + k) * 5) % 40) as u8
            }
        })
        .expect("grid"),
    )
}

fn noise(k: usize) -> IntegralGrid {
    integral(PixelGrid::from_fn(4, 4, |x, y| ((x * 37 + y * 91 + k * 53) % 256) as u8).expect("grid"))
}

fn rows(top: u8, bottom: u8) -> IntegralGrid {
    integral(PixelGrid::from_fn(4, 4, |_, y| if y < 2 { top } else { bottom }).expect("grid"))
}

fn gray() -> IntegralGrid {
    integral(PixelGrid::filled(4, 4, 128).expect("grid"))
}

fn toy_set() -> (Vec<IntegralGrid>, Vec<IntegralGrid>) {
    ((0..8).map(bright_top).collect(), (0..8).map(noise).collect())
}

/// Positives have moderate top/bottom contrast; negatives sit on both sides
/// of it, so a single threshold cannot reject them all.
fn two_sided_set() -> (Vec<IntegralGrid>, Vec<IntegralGrid>) {
    let positives = (0..8u8).map(|k| rows(150 + k, 90 - k)).collect();
    let negatives = (0..4u8)
        .map(|k| rows(240 + k, 10 + k))
        .chain((0..4u8).map(|k| rows(60 + 10 * k, 140 + 5 * k)))
        .collect();
    (positives, negatives)
}

fn canonical_feature() -> HaarFeature {
    HaarFeature::new(
        Rect::new(0, 0, 4, 2).expect("rect"),
        Rect::new(0, 2, 4, 2).expect("rect"),
    )
}

#[derive(Default)]
struct CountingObserver {
    started: Vec<RoundProgress>,
    finished: usize,
    stages: Vec<StageReport>,
}

impl TrainingObserver for CountingObserver {
    fn round_started(&mut self, progress: RoundProgress) {
        self.started.push(progress);
    }

    fn round_finished(&mut self, _progress: RoundProgress, rule: &WeakRule, error: f64) {
        assert!(rule.alpha.is_finite());
        assert!((0.0..=1.0 + 1e-9).contains(&error), "error {error}");
        self.finished += 1;
    }

    fn stage_finished(&mut self, report: &StageReport) {
        self.stages.push(report.clone());
    }
}

#[test]
fn canonical_rule_separates_toy_set() {
    let (positives, negatives) = toy_set();
    let feature = canonical_feature();
    let values: Vec<i64> = positives
        .iter()
        .chain(&negatives)
        .map(|ii| feature.evaluate(ii, 0, 0).expect("value"))
        .collect();
    let labels: Vec<bool> = (0..16).map(|i| i < 8).collect();
    let weights = initial_weights(8, 8);

    let split = search_threshold(&values, &labels, &weights).expect("split");
    assert_abs_diff_eq!(split.error, 0.0, epsilon = 1e-12);
    assert_eq!(split.polarity, Polarity::Negative);
    let alpha = alpha_from_error(split.error);
    assert!(alpha > 0.0);

    let mut builder = StageBuilder::new();
    builder.push(WeakRule {
        feature,
        threshold: split.threshold,
        polarity: split.polarity,
        alpha,
    });
    let mut cascade = Cascade::new();
    cascade.push_stage(builder.build());

    for ii in &positives {
        assert!(cascade.classify(ii, 0, 0).expect("classify"));
    }
    assert!(!cascade.classify(&gray(), 0, 0).expect("classify"));
}

#[test]
fn toy_bootstrap_terminates_quickly() {
    let (positives, negatives) = toy_set();
    let trainer = Trainer::new(TrainerParams {
        rounds_per_stage: 3,
        ..TrainerParams::for_window(4)
    })
    .expect("trainer");
    let report = trainer
        .train_cascade_report(&positives, &negatives, &mut NoopObserver)
        .expect("train");

    assert!(!report.cascade.is_empty());
    assert!(report.cascade.len() <= 5);
    assert_eq!(report.stages.len(), report.cascade.len());
    for pair in report.stages.windows(2) {
        assert!(pair[1].hard_negatives <= pair[0].hard_negatives);
    }
    let last = report.stages.last().expect("stage");
    assert!(last.false_positive_rate <= 0.01);
    assert_eq!(last.detection_rate, 1.0);

    for ii in &positives {
        assert!(report.cascade.classify(ii, 0, 0).expect("classify"));
    }
    for ii in negatives.iter().chain([&gray()]) {
        assert!(!report.cascade.classify(ii, 0, 0).expect("classify"));
    }
}

#[test]
fn hard_negatives_drive_later_stages() {
    let (positives, negatives) = two_sided_set();
    let trainer = Trainer::new(TrainerParams {
        rounds_per_stage: 1,
        ..TrainerParams::for_window(4)
    })
    .expect("trainer");
    let report = trainer
        .train_cascade_report(&positives, &negatives, &mut NoopObserver)
        .expect("train");

    let hard: Vec<usize> = report.stages.iter().map(|s| s.hard_negatives).collect();
    assert_eq!(hard, vec![4, 0]);
    assert_abs_diff_eq!(report.stages[0].false_positive_rate, 0.5);
    assert_eq!(report.stop_reason, StopReason::NegativesExhausted);
    assert!(report.stages.iter().all(|s| s.detection_rate == 1.0));

    let eval = evaluate_cascade(&report.cascade, &positives, &negatives).expect("eval");
    assert_eq!(eval.true_positives, 8);
    assert_eq!(eval.false_positives, 0);
    assert_eq!(eval.negative_rejections, vec![4, 4]);
}

#[test]
fn stage_limit_stops_bootstrap() {
    let (positives, negatives) = two_sided_set();
    let trainer = Trainer::new(TrainerParams {
        rounds_per_stage: 1,
        max_stages: 1,
        ..TrainerParams::for_window(4)
    })
    .expect("trainer");
    let report = trainer
        .train_cascade_report(&positives, &negatives, &mut NoopObserver)
        .expect("train");
    assert_eq!(report.cascade.len(), 1);
    assert_eq!(report.stop_reason, StopReason::StageLimit);
    assert_eq!(report.stages[0].hard_negatives, 4);
}

#[test]
fn loose_target_stops_after_first_stage() {
    let (positives, negatives) = two_sided_set();
    let trainer = Trainer::new(TrainerParams {
        rounds_per_stage: 1,
        target_false_positive_rate: 0.5,
        ..TrainerParams::for_window(4)
    })
    .expect("trainer");
    let report = trainer
        .train_cascade_report(&positives, &negatives, &mut NoopObserver)
        .expect("train");
    assert_eq!(report.cascade.len(), 1);
    assert_eq!(report.stop_reason, StopReason::TargetReached);
}

#[test]
fn observer_sees_every_round_and_stage() {
    let (positives, negatives) = two_sided_set();
    let trainer = Trainer::new(TrainerParams {
        rounds_per_stage: 1,
        ..TrainerParams::for_window(4)
    })
    .expect("trainer");
    let mut observer = CountingObserver::default();
    let cascade = trainer
        .train_cascade_with_observer(&positives, &negatives, &mut observer)
        .expect("train");

    assert_eq!(observer.started.len(), cascade.weak_rule_count());
    assert_eq!(observer.finished, cascade.weak_rule_count());
    assert_eq!(observer.stages.len(), cascade.len());
    let stages: Vec<usize> = observer.started.iter().map(|p| p.stage).collect();
    assert_eq!(stages, vec![0, 1]);
    assert!(observer
        .started
        .iter()
        .all(|p| p.total_stages == 32 && p.total_rounds == 1 && p.round == 0));

    // observers do not change the outcome
    let plain = trainer.train_cascade(&positives, &negatives).expect("train");
    assert_eq!(plain, cascade);
}

#[test]
fn progress_callback_counts_rounds() {
    let (positives, negatives) = toy_set();
    let params = TrainerParams {
        rounds_per_stage: 4,
        ..TrainerParams::for_window(4)
    };
    let trainer = Trainer::new(params).expect("trainer");
    let mut rounds = Vec::new();
    let stage = trainer
        .train_stage_with_observer(
            &positives,
            &negatives,
            &mut ProgressFn(|p: RoundProgress| rounds.push(p.round)),
        )
        .expect("stage");
    assert_eq!(stage.rules().len(), 4);
    assert_eq!(rounds, vec![0, 1, 2, 3]);
}

#[test]
fn cancel_flag_aborts_between_stages() {
    let (positives, negatives) = two_sided_set();
    let flag = Arc::new(AtomicBool::new(false));
    let trainer = Trainer::new(TrainerParams {
        rounds_per_stage: 1,
        ..TrainerParams::for_window(4)
    })
    .expect("trainer")
    .with_cancel_flag(Arc::clone(&flag));

    let mut cancel_after_first = ProgressFn(|_: RoundProgress| flag.store(true, Ordering::Relaxed));
    let err = trainer
        .train_cascade_with_observer(&positives, &negatives, &mut cancel_after_first)
        .unwrap_err();
    assert!(matches!(err, TrainError::Cancelled));
}

#[test]
fn empty_sets_are_rejected() {
    let (positives, negatives) = toy_set();
    let params = TrainerParams::for_window(4);
    assert!(matches!(
        train_cascade(&[], &negatives, &params),
        Err(TrainError::EmptyPositives)
    ));
    assert!(matches!(
        train_cascade(&positives, &[], &params),
        Err(TrainError::EmptyNegatives)
    ));
}

#[test]
fn explicit_bank_stage_uses_given_features() {
    let (positives, negatives) = toy_set();
    let params = TrainerParams {
        rounds_per_stage: 2,
        ..TrainerParams::for_window(4)
    };
    let bank = [canonical_feature()];
    let stage = train_stage(&positives, &negatives, &params, &bank).expect("stage");
    assert!(stage
        .rules()
        .iter()
        .all(|r| r.feature == canonical_feature()));
    assert_abs_diff_eq!(stage.threshold(), stage.total_alpha() / 2.0);
}

#[test]
fn equally_good_features_resolve_to_the_earliest_in_bank_order() {
    // 3 positives and 5 negatives keep the weights off powers of two
    let positives: Vec<_> = (0..3u8).map(|k| rows(150 + k, 90 - k)).collect();
    let negatives: Vec<_> = (0..3u8)
        .map(|k| rows(240 + k, 10 + k))
        .chain([rows(60, 140), rows(70, 145)])
        .collect();
    let row_pair = |white_y, black_y, h| {
        HaarFeature::new(
            Rect::new(0, white_y, 4, h).expect("rect"),
            Rect::new(0, black_y, 4, h).expect("rect"),
        )
    };
    // one contrast measured four ways; the first one sorts the samples in
    // reverse
    let bank = [
        row_pair(2, 0, 2),
        canonical_feature(),
        canonical_feature(),
        row_pair(0, 2, 1),
    ];
    let params = TrainerParams {
        rounds_per_stage: 4,
        ..TrainerParams::for_window(4)
    };

    let stage = train_stage(&positives, &negatives, &params, &bank).expect("stage");
    assert_eq!(stage.rules().len(), 4);
    for rule in stage.rules() {
        assert_eq!(rule.feature, bank[0]);
    }
}

#[test]
fn round_errors_are_never_negative() {
    let (positives, negatives) = toy_set();
    let trainer = Trainer::new(TrainerParams {
        rounds_per_stage: 5,
        ..TrainerParams::for_window(4)
    })
    .expect("trainer");
    let mut errors = Vec::new();
    let mut observer = ErrorLog(&mut errors);
    trainer
        .train_stage_with_observer(&positives, &negatives, &mut observer)
        .expect("stage");
    assert_eq!(errors.len(), 5);
    assert!(errors.iter().all(|&e| e >= 0.0), "{errors:?}");
    // the first rule separates the toy set exactly
    assert_eq!(errors[0], 0.0);
}

struct ErrorLog<'a>(&'a mut Vec<f64>);

impl TrainingObserver for ErrorLog<'_> {
    fn round_finished(&mut self, _progress: RoundProgress, _rule: &WeakRule, error: f64) {
        self.0.push(error);
    }
}

#[test]
fn trained_cascade_survives_text_and_json_round_trip() {
    let (positives, negatives) = toy_set();
    let params = TrainerParams {
        rounds_per_stage: 3,
        ..TrainerParams::for_window(4)
    };
    let cascade = train_cascade(&positives, &negatives, &params).expect("train");

    let dir = tempfile::tempdir().expect("tempdir");
    let text_path = dir.path().join("cascade.txt");
    let json_path = dir.path().join("cascade.json");
    cascade.write_text_file(&text_path).expect("write text");
    cascade.write_json(&json_path).expect("write json");

    for loaded in [
        Cascade::read_text_file(&text_path).expect("read text"),
        Cascade::load_json(&json_path).expect("read json"),
    ] {
        assert_eq!(loaded, cascade);
        assert_eq!(loaded.len(), cascade.len());
        assert_eq!(loaded.weak_rule_count(), cascade.weak_rule_count());
        for ii in positives.iter().chain(&negatives).chain([&gray()]) {
            assert_eq!(
                loaded.classify(ii, 0, 0).expect("classify"),
                cascade.classify(ii, 0, 0).expect("classify")
            );
        }
    }
}

#[test]
fn weights_stay_normalised_across_rounds() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let p = rng.gen_range(1..=30);
        let q = rng.gen_range(1..=30);
        let mut weights = initial_weights(p, q);
        assert_abs_diff_eq!(weights.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        for _ in 0..10 {
            let error = rng.gen_range(0.0..1.0);
            let correct: Vec<bool> = (0..p + q).map(|_| rng.gen_bool(0.7)).collect();
            update_weights(&mut weights, &correct, alpha_from_error(error));
            assert_abs_diff_eq!(weights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        }
    }
}

#[test]
fn params_round_trip_through_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("params.json");
    let params = TrainerParams {
        max_features_per_round: Some(40),
        ..TrainerParams::for_window(4)
    };
    params.write_json(&path).expect("write");
    let loaded = TrainerParams::load_json(&path).expect("load");
    assert_eq!(loaded, params);
    Trainer::new(loaded).expect("valid params");
}
