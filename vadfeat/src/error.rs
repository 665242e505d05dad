use thiserror::Error;

/// Errors returned by feature extraction.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("waveform must be rank {expected} (batch, samples), got rank {got}")]
    Shape { expected: usize, got: usize },

    #[error("unsupported LFR block size {0}: only 5 is supported")]
    UnsupportedLfr(usize),

    #[error("insufficient frames: need at least {required}, got {available}")]
    InsufficientFrames { required: usize, available: usize },

    #[error("insufficient samples: need more than {required}, got {available}")]
    InsufficientSamples { required: usize, available: usize },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("cmvn dimension mismatch: expected {expected}, got {got}")]
    CmvnDimension { expected: usize, got: usize },

    #[error("channel {row} has {got} samples, expected {expected}")]
    RaggedBatch { row: usize, expected: usize, got: usize },

    #[error("invalid cmvn statistics: {0}")]
    InvalidCmvn(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for feature extraction.
pub type Result<T> = std::result::Result<T, FeatureError>;
