use boxsim_core::error::{ConfigError, SensorError, ValidationError};
use boxsim_noise::model::NoiseError;
use boxsim_protocol::SessionError;
use thiserror::Error;

/// Top-level error type for simulation trials.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("invalid order: {0}")]
    Validation(#[from] ValidationError),

    #[error("sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("noise error: {0}")]
    Noise(#[from] NoiseError),

    #[error("effect value {value} out of bounds [{min}, {max}] at feature {index}")]
    BoundsViolation {
        index: usize,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl SimError {
    /// Whether the simulator session was lost by this failure.
    pub const fn is_session(&self) -> bool {
        matches!(self, Self::Session(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxsim_protocol::ProtocolError;

    #[test]
    fn wraps_lower_layers() {
        let err: SimError = ValidationError::OrderNotFinite { dim: 2 }.into();
        assert!(err.to_string().contains("dimension 2"));

        let err: SimError = SessionError::Protocol(ProtocolError::Remote("boom".into())).into();
        assert!(err.is_session());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn bounds_violation_display() {
        let err = SimError::BoundsViolation {
            index: 1,
            value: 1.5,
            min: 0.0,
            max: 1.0,
        };
        assert_eq!(
            err.to_string(),
            "effect value 1.5 out of bounds [0, 1] at feature 1"
        );
    }
}
