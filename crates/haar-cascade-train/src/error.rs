use haar_cascade_core::FeatureError;

/// Errors returned by stage and cascade training.
#[derive(thiserror::Error, Debug)]
pub enum TrainError {
    #[error("no positive samples")]
    EmptyPositives,
    #[error("no negative samples")]
    EmptyNegatives,
    #[error("{label} sample {index} is {width}x{height}, smaller than the {window}x{window} window")]
    SampleTooSmall {
        label: &'static str,
        index: usize,
        width: usize,
        height: usize,
        window: usize,
    },
    #[error("invalid trainer params: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error("training cancelled")]
    Cancelled,
}
