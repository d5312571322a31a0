use thiserror::Error;

/// Configuration errors.
///
/// Raised while loading or validating the configuration tree and while
/// primitives declare their bounds. Never raised in the middle of a trial.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Unknown toy: {0}")]
    UnknownToy(String),

    #[error("Feature index {index} out of range for {len} features")]
    FeatureIndexOutOfRange { index: usize, len: usize },

    #[error("Degenerate bound at feature {index}: [{min}, {max}] (max must be > min)")]
    DegenerateBound { index: usize, min: f64, max: f64 },

    #[error("Inverted bound at feature {index}: [{min}, {max}]")]
    InvertedBound { index: usize, min: f64, max: f64 },

    #[error("Incompatible configuration: {0}")]
    Incompatible(String),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while turning a raw sensor payload into features.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    #[error("Missing sensor channel: {0}")]
    MissingChannel(String),

    #[error("Channel {channel} has the wrong shape: expected {expected}, got {got}")]
    ChannelShape {
        channel: String,
        expected: String,
        got: String,
    },

    #[error("Channel {0} has no samples")]
    EmptyChannel(String),

    #[error("Vocal tract mapping failed: {0}")]
    VocalTract(String),

    #[error("Sensory primitive {0} used before declare")]
    Undeclared(String),
}

/// Order/command validation errors.
///
/// Copy + static messages, checked on every trial.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ValidationError {
    #[error("Order dimension mismatch: expected {expected}, got {got}")]
    OrderDimMismatch { expected: usize, got: usize },

    #[error("Order contains NaN or Inf at dimension {dim}")]
    OrderNotFinite { dim: usize },

    #[error("Order value {value} out of bounds [{min}, {max}] at dimension {dim}")]
    OrderOutOfBounds {
        dim: usize,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Motor primitive used before declare")]
    Undeclared,

    #[error("Motor command has inconsistent joint counts: start={start}, end={end}, speeds={speeds}")]
    CommandShape {
        start: usize,
        end: usize,
        speeds: usize,
    },
}
