//! Weak rules and boosted stages.

use crate::feature::{FeatureError, HaarFeature};
use crate::integral::IntegralGrid;
use serde::{Deserialize, Serialize};

/// Direction of the threshold comparison of a weak rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Votes positive when the feature value is below the threshold.
    Positive,
    /// Votes positive when the feature value is above the threshold.
    Negative,
}

impl Polarity {
    #[inline]
    pub fn sign(self) -> i64 {
        match self {
            Polarity::Positive => 1,
            Polarity::Negative => -1,
        }
    }

    pub fn from_sign(sign: i64) -> Option<Self> {
        match sign {
            1 => Some(Polarity::Positive),
            -1 => Some(Polarity::Negative),
            _ => None,
        }
    }
}

/// A thresholded feature vote weighted by `alpha`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeakRule {
    pub feature: HaarFeature,
    pub threshold: i64,
    pub polarity: Polarity,
    pub alpha: f64,
}

impl WeakRule {
    /// `polarity * value < polarity * threshold`.
    #[inline]
    pub fn vote(&self, value: i64) -> bool {
        match self.polarity {
            Polarity::Positive => value < self.threshold,
            Polarity::Negative => value > self.threshold,
        }
    }

    #[inline]
    pub fn classify(&self, ii: &IntegralGrid, x: usize, y: usize) -> Result<bool, FeatureError> {
        Ok(self.vote(self.feature.evaluate(ii, x, y)?))
    }
}

/// Boosted ensemble of weak rules with a single pass/fail threshold.
///
/// A `Stage` has no mutators. Build one with [`StageBuilder`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    rules: Vec<WeakRule>,
    threshold: f64,
}

impl Stage {
    pub fn new(rules: Vec<WeakRule>, threshold: f64) -> Self {
        Self { rules, threshold }
    }

    #[inline]
    pub fn rules(&self) -> &[WeakRule] {
        &self.rules
    }

    #[inline]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn total_alpha(&self) -> f64 {
        self.rules.iter().map(|r| r.alpha).sum()
    }

    /// Sum of `alpha` over the rules voting positive at `(x, y)`.
    pub fn score(&self, ii: &IntegralGrid, x: usize, y: usize) -> Result<f64, FeatureError> {
        let mut sum = 0.0;
        for rule in &self.rules {
            if rule.classify(ii, x, y)? {
                sum += rule.alpha;
            }
        }
        Ok(sum)
    }

    /// Accept iff the weighted vote is strictly greater than the threshold.
    pub fn classify(&self, ii: &IntegralGrid, x: usize, y: usize) -> Result<bool, FeatureError> {
        Ok(self.score(ii, x, y)? > self.threshold)
    }
}

/// Append-only builder for a [`Stage`].
#[derive(Clone, Debug, Default)]
pub struct StageBuilder {
    rules: Vec<WeakRule>,
    total_alpha: f64,
    threshold: Option<f64>,
}

impl StageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: WeakRule) {
        self.total_alpha += rule.alpha;
        self.rules.push(rule);
    }

    /// Sum of `alpha` over all appended rules.
    #[inline]
    pub fn total_alpha(&self) -> f64 {
        self.total_alpha
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[inline]
    pub fn rules(&self) -> &[WeakRule] {
        &self.rules
    }

    /// Override the decision threshold used by [`StageBuilder::build`].
    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = Some(threshold);
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.set_threshold(threshold);
        self
    }

    /// Seal the stage. Without an override the threshold is half the total
    /// alpha (weighted majority vote).
    pub fn build(self) -> Stage {
        let threshold = self.threshold.unwrap_or(0.5 * self.total_alpha);
        Stage {
            rules: self.rules,
            threshold,
        }
    }
}
