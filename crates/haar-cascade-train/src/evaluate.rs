use haar_cascade_core::{Cascade, FeatureError, IntegralGrid};
use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Accuracy of a cascade on labelled windows.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CascadeEvaluation {
    pub positives: usize,
    pub negatives: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    /// `true_positives / positives`, `0.0` without positives.
    pub detection_rate: f64,
    /// `false_positives / negatives`, `0.0` without negatives.
    pub false_positive_rate: f64,
    /// Negatives rejected by each stage, indexed by stage.
    pub negative_rejections: Vec<usize>,
}

fn rate(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Classify every window at offset `(0, 0)` and tally the results.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(positives = positives.len(), negatives = negatives.len()))
)]
pub fn evaluate_cascade(
    cascade: &Cascade,
    positives: &[IntegralGrid],
    negatives: &[IntegralGrid],
) -> Result<CascadeEvaluation, FeatureError> {
    let mut true_positives = 0;
    for ii in positives {
        if cascade.classify(ii, 0, 0)? {
            true_positives += 1;
        }
    }

    let mut false_positives = 0;
    let mut negative_rejections = vec![0; cascade.len()];
    for ii in negatives {
        match cascade.first_rejecting_stage(ii, 0, 0)? {
            Some(stage) => negative_rejections[stage] += 1,
            None => false_positives += 1,
        }
    }

    let eval = CascadeEvaluation {
        positives: positives.len(),
        negatives: negatives.len(),
        true_positives,
        false_positives,
        detection_rate: rate(true_positives, positives.len()),
        false_positive_rate: rate(false_positives, negatives.len()),
        negative_rejections,
    };
    log::info!(
        "detection {}/{} ({:.4}), false positives {}/{} ({:.4})",
        eval.true_positives,
        eval.positives,
        eval.detection_rate,
        eval.false_positives,
        eval.negatives,
        eval.false_positive_rate
    );
    Ok(eval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use haar_cascade_core::{HaarFeature, PixelGrid, Polarity, Rect, StageBuilder, WeakRule};

    fn grid(top: u8, bottom: u8) -> IntegralGrid {
        let img = PixelGrid::from_fn(4, 4, |_, y| if y < 2 { top } else { bottom }).expect("grid");
        IntegralGrid::from(&img)
    }

    fn top_bright_stage(threshold: i64) -> haar_cascade_core::Stage {
        let mut b = StageBuilder::new();
        b.push(WeakRule {
            feature: HaarFeature::new(
                Rect::new(0, 0, 4, 2).expect("rect"),
                Rect::new(0, 2, 4, 2).expect("rect"),
            ),
            threshold,
            polarity: Polarity::Negative,
            alpha: 1.0,
        });
        b.build()
    }

    #[test]
    fn counts_rejections_per_stage() {
        let mut cascade = Cascade::new();
        cascade.push_stage(top_bright_stage(0));
        cascade.push_stage(top_bright_stage(800));

        // values: 1520, 1280, 640, 0, -1520
        let pos = [grid(220, 30), grid(200, 40)];
        let neg = [grid(120, 40), grid(90, 90), grid(30, 220)];
        let eval = evaluate_cascade(&cascade, &pos, &neg).expect("eval");

        assert_eq!(eval.true_positives, 2);
        assert_eq!(eval.false_positives, 0);
        assert_eq!(eval.negative_rejections, vec![2, 1]);
        assert_eq!(eval.detection_rate, 1.0);
        assert_eq!(eval.false_positive_rate, 0.0);
    }

    #[test]
    fn empty_sets_report_zero_rates() {
        let eval = evaluate_cascade(&Cascade::new(), &[], &[]).expect("eval");
        assert_eq!(eval.detection_rate, 0.0);
        assert_eq!(eval.false_positive_rate, 0.0);
        assert!(eval.negative_rejections.is_empty());
    }
}
