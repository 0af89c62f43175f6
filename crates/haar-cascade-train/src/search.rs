//! Weighted-error threshold search for a single feature.

use haar_cascade_core::Polarity;

/// Floor (and `1 - floor` ceiling) applied to a round's weighted error before
/// computing `alpha`, so a perfect or perfectly wrong rule keeps a finite
/// weight.
pub const MIN_WEIGHTED_ERROR: f64 = 1e-10;

/// Running-sum errors closer than this to the current best are treated as a
/// tie and re-scored exactly.
pub const TIE_EPSILON: f64 = 1e-9;

/// Best threshold/polarity for one feature under the current weights.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Split {
    pub threshold: i64,
    pub polarity: Polarity,
    /// Weighted misclassification error, before clamping: the weights of the
    /// misclassified samples summed in sample order.
    pub error: f64,
}

/// `0.5 * ln((1 - err) / err)` with `err` clamped into
/// `[MIN_WEIGHTED_ERROR, 1 - MIN_WEIGHTED_ERROR]`.
///
/// Positive below 0.5, zero at 0.5, negative above.
pub fn alpha_from_error(error: f64) -> f64 {
    let err = error.clamp(MIN_WEIGHTED_ERROR, 1.0 - MIN_WEIGHTED_ERROR);
    0.5 * ((1.0 - err) / err).ln()
}

/// Reusable buffers for [`search_threshold`].
#[derive(Clone, Debug, Default)]
pub(crate) struct SearchScratch {
    pub(crate) values: Vec<i64>,
    order: Vec<usize>,
}

impl SearchScratch {
    pub(crate) fn search(
        &mut self,
        is_positive: &[bool],
        weights: &[f64],
    ) -> Option<Split> {
        search_sorted(&self.values, is_positive, weights, &mut self.order)
    }
}

/// Scan every observed value as a threshold, both polarities, and return the
/// split with the smallest weighted error.
///
/// Candidates are visited in ascending value order, polarity `+1` before `-1`
/// at each value; the first strictly smaller error wins. Candidates within
/// [`TIE_EPSILON`] of the current best are re-scored with [`split_error`]
/// before comparing, and the returned `error` is always the [`split_error`]
/// value, so two splits that misclassify the same samples report bit-identical
/// errors whatever the value order. Returns `None` for an empty sample set.
pub fn search_threshold(values: &[i64], is_positive: &[bool], weights: &[f64]) -> Option<Split> {
    let mut order = Vec::with_capacity(values.len());
    search_sorted(values, is_positive, weights, &mut order)
}

/// Weights of the samples misclassified by `(threshold, polarity)`, summed
/// in sample order.
pub fn split_error(
    values: &[i64],
    is_positive: &[bool],
    weights: &[f64],
    threshold: i64,
    polarity: Polarity,
) -> f64 {
    let votes_positive = |v: i64| match polarity {
        Polarity::Positive => v < threshold,
        Polarity::Negative => v > threshold,
    };
    values
        .iter()
        .zip(is_positive)
        .zip(weights)
        .filter(|((&v, &label), _)| votes_positive(v) != label)
        .map(|(_, &w)| w)
        .sum()
}

struct Best {
    threshold: i64,
    polarity: Polarity,
    /// prefix-sum error, used for the coarse comparison
    approx: f64,
    exact: Option<f64>,
}

fn search_sorted(
    values: &[i64],
    is_positive: &[bool],
    weights: &[f64],
    order: &mut Vec<usize>,
) -> Option<Split> {
    debug_assert_eq!(values.len(), is_positive.len());
    debug_assert_eq!(values.len(), weights.len());

    let n = values.len();
    order.clear();
    order.extend(0..n);
    order.sort_by_key(|&i| values[i]);

    let mut total_pos = 0.0;
    let mut total_neg = 0.0;
    for (&w, &pos) in weights.iter().zip(is_positive) {
        if pos {
            total_pos += w;
        } else {
            total_neg += w;
        }
    }
    let exact =
        |threshold, polarity| split_error(values, is_positive, weights, threshold, polarity);

    // weight of samples strictly below the current threshold
    let mut below_pos = 0.0;
    let mut below_neg = 0.0;
    let mut best: Option<Best> = None;

    let mut i = 0;
    while i < n {
        let threshold = values[order[i]];
        let mut at_pos = 0.0;
        let mut at_neg = 0.0;
        let mut j = i;
        while j < n && values[order[j]] == threshold {
            let k = order[j];
            if is_positive[k] {
                at_pos += weights[k];
            } else {
                at_neg += weights[k];
            }
            j += 1;
        }

        // +1: positive iff value < threshold
        let err_lt = (total_pos - below_pos) + below_neg;
        // -1: positive iff value > threshold
        let err_gt = (below_pos + at_pos) + (total_neg - below_neg - at_neg);

        for (approx, polarity) in [(err_lt, Polarity::Positive), (err_gt, Polarity::Negative)] {
            let candidate = match &mut best {
                None => Some(None),
                Some(b) if approx < b.approx - TIE_EPSILON => Some(None),
                Some(b) if approx <= b.approx + TIE_EPSILON => {
                    let (t, p) = (b.threshold, b.polarity);
                    let best_exact = *b.exact.get_or_insert_with(|| exact(t, p));
                    let e = exact(threshold, polarity);
                    (e < best_exact).then_some(Some(e))
                }
                Some(_) => None,
            };
            if let Some(known) = candidate {
                best = Some(Best {
                    threshold,
                    polarity,
                    approx,
                    exact: known,
                });
            }
        }

        below_pos += at_pos;
        below_neg += at_neg;
        i = j;
    }

    best.map(|b| Split {
        threshold: b.threshold,
        polarity: b.polarity,
        error: b.exact.unwrap_or_else(|| exact(b.threshold, b.polarity)),
    })
}
