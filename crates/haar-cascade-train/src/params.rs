use crate::TrainError;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum TrainerIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Training configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerParams {
    /// Side length `N` of the square training window. Samples must be at
    /// least `N × N`; features are evaluated at offset `(0, 0)`.
    pub window_size: usize,
    /// Weak rules appended to every stage.
    pub rounds_per_stage: usize,
    /// Search only the first `k` features of the bank in each round.
    ///
    /// `None` searches the whole bank. A prefix cuts round time
    /// proportionally but can miss the best feature; because the bank is
    /// ordered by size, a short prefix favours narrow features.
    pub max_features_per_round: Option<usize>,
    /// Stop adding stages once the fraction of the original negatives still
    /// accepted by the cascade is at or below this value.
    pub target_false_positive_rate: f64,
    /// Desired fraction of positives accepted by the cascade.
    ///
    /// Accepted and reported, but not enforced: termination is driven by the
    /// false-positive rate alone.
    pub target_detection_rate: f64,
    /// Upper bound on the number of stages. Also the total-stage estimate
    /// handed to observers.
    pub max_stages: usize,
}

impl Default for TrainerParams {
    fn default() -> Self {
        Self {
            window_size: 24,
            rounds_per_stage: 10,
            max_features_per_round: None,
            target_false_positive_rate: 0.01,
            target_detection_rate: 0.99,
            max_stages: 32,
        }
    }
}

impl TrainerParams {
    /// Defaults for a given window size.
    pub fn for_window(window_size: usize) -> Self {
        Self {
            window_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), TrainError> {
        let invalid = |msg: String| Err(TrainError::InvalidParams(msg));
        if self.window_size < 2 {
            return invalid(format!(
                "window_size must be >= 2 to hold a rectangle pair, got {}",
                self.window_size
            ));
        }
        if self.rounds_per_stage == 0 {
            return invalid("rounds_per_stage must be >= 1".to_string());
        }
        if self.max_features_per_round == Some(0) {
            return invalid("max_features_per_round must be >= 1 when set".to_string());
        }
        if !(0.0..=1.0).contains(&self.target_false_positive_rate) {
            return invalid(format!(
                "target_false_positive_rate must be in [0, 1], got {}",
                self.target_false_positive_rate
            ));
        }
        if !(0.0..=1.0).contains(&self.target_detection_rate) {
            return invalid(format!(
                "target_detection_rate must be in [0, 1], got {}",
                self.target_detection_rate
            ));
        }
        if self.max_stages == 0 {
            return invalid("max_stages must be >= 1".to_string());
        }
        Ok(())
    }

    /// Load a JSON config from disk. Missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, TrainerIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), TrainerIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
