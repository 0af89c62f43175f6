//! Ordered chain of stages with early rejection.

use crate::feature::FeatureError;
use crate::integral::IntegralGrid;
use crate::stage::Stage;
use serde::{Deserialize, Serialize};

/// Append-only sequence of stages. A window is accepted only if every stage
/// accepts it, evaluated in order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cascade {
    stages: Vec<Stage>,
}

impl Cascade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage. Stages are never reordered or removed: later stages
    /// were trained only on the negatives that survive the earlier ones.
    pub fn push_stage(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    #[inline]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Total number of weak rules across all stages.
    pub fn weak_rule_count(&self) -> usize {
        self.stages.iter().map(|s| s.rules().len()).sum()
    }

    /// Single-window decision with the window's top-left corner at `(x, y)`.
    ///
    /// Returns at the first rejecting stage; later stages are not evaluated.
    /// An empty cascade accepts every window.
    pub fn classify(&self, ii: &IntegralGrid, x: usize, y: usize) -> Result<bool, FeatureError> {
        Ok(self.first_rejecting_stage(ii, x, y)?.is_none())
    }

    /// Index of the stage that rejects the window, or `None` if all accept.
    pub fn first_rejecting_stage(
        &self,
        ii: &IntegralGrid,
        x: usize,
        y: usize,
    ) -> Result<Option<usize>, FeatureError> {
        for (idx, stage) in self.stages.iter().enumerate() {
            if !stage.classify(ii, x, y)? {
                return Ok(Some(idx));
            }
        }
        Ok(None)
    }
}
