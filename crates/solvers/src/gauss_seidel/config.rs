use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the Gauss-Seidel solver.
///
/// Fields are public so configs can be built with struct update syntax or
/// deserialized (every field falls back to its default). Call
/// [`validate`](Config::validate) before use; the solver does so itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Convergence threshold on the maximum relative residual.
    pub tolerance: f64,

    /// Maximum number of full passes over a group.
    pub max_iterations: usize,

    /// Under-relaxation factor `w` in `(0, 1]`, applied as
    /// `x_new = x_old + w * (x_computed - x_old)`.
    ///
    /// With [`Acceleration::Aitken`] this is the starting factor.
    pub relaxation_factor: f64,

    pub acceleration: Acceleration,

    /// Absolute change above which a growing residual counts as divergence.
    pub divergence_threshold: f64,

    /// Number of consecutive passes the change must grow before the
    /// divergence threshold is checked.
    pub divergence_patience: usize,

    /// Floor on the denominator of relative residuals.
    pub epsilon: f64,

    /// Starting value for coupling variables that have no value yet.
    pub initial_guess: f64,

    /// Wall-clock limit for a single discipline invocation.
    pub unit_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 50,
            relaxation_factor: 1.0,
            acceleration: Acceleration::None,
            divergence_threshold: 1e6,
            divergence_patience: 5,
            epsilon: 1e-12,
            initial_guess: 1.0,
            unit_timeout: None,
        }
    }
}

/// Optional acceleration of the relaxation factor between passes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Acceleration {
    /// Keep the relaxation factor fixed.
    #[default]
    None,

    /// Aitken's dynamic relaxation, clamped to `[min_factor, max_factor]`.
    Aitken { min_factor: f64, max_factor: f64 },
}

impl Acceleration {
    /// Aitken relaxation with bounds that suit most sizing loops.
    #[must_use]
    pub fn aitken() -> Self {
        Self::Aitken {
            min_factor: 0.1,
            max_factor: 1.5,
        }
    }
}

/// Errors that can occur when validating a Gauss-Seidel config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("tolerance must be finite and positive")]
    Tolerance,

    #[error("max_iterations must be at least 1")]
    MaxIterations,

    #[error("relaxation_factor must be in (0, 1]")]
    RelaxationFactor,

    #[error("aitken bounds must satisfy 0 < min_factor <= max_factor")]
    AitkenBounds,

    #[error("divergence_threshold must be finite and positive")]
    DivergenceThreshold,

    #[error("divergence_patience must be at least 1")]
    DivergencePatience,

    #[error("epsilon must be finite and positive")]
    Epsilon,

    #[error("initial_guess must be finite")]
    InitialGuess,

    #[error("unit_timeout must be non-zero")]
    UnitTimeout,
}

impl Config {
    /// Checks that every setting is usable.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] for the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_positive(self.tolerance) {
            return Err(ConfigError::Tolerance);
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::MaxIterations);
        }
        if !is_positive(self.relaxation_factor) || self.relaxation_factor > 1.0 {
            return Err(ConfigError::RelaxationFactor);
        }
        if let Acceleration::Aitken {
            min_factor,
            max_factor,
        } = self.acceleration
        {
            if !is_positive(min_factor) || !max_factor.is_finite() || min_factor > max_factor {
                return Err(ConfigError::AitkenBounds);
            }
        }
        if !is_positive(self.divergence_threshold) {
            return Err(ConfigError::DivergenceThreshold);
        }
        if self.divergence_patience == 0 {
            return Err(ConfigError::DivergencePatience);
        }
        if !is_positive(self.epsilon) {
            return Err(ConfigError::Epsilon);
        }
        if !self.initial_guess.is_finite() {
            return Err(ConfigError::InitialGuess);
        }
        if self.unit_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(ConfigError::UnitTimeout);
        }
        Ok(())
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_settings() {
        let cases = [
            (Config { tolerance: 0.0, ..Config::default() }, ConfigError::Tolerance),
            (Config { tolerance: f64::NAN, ..Config::default() }, ConfigError::Tolerance),
            (Config { max_iterations: 0, ..Config::default() }, ConfigError::MaxIterations),
            (Config { relaxation_factor: 0.0, ..Config::default() }, ConfigError::RelaxationFactor),
            (Config { relaxation_factor: 1.2, ..Config::default() }, ConfigError::RelaxationFactor),
            (
                Config {
                    acceleration: Acceleration::Aitken { min_factor: 0.8, max_factor: 0.5 },
                    ..Config::default()
                },
                ConfigError::AitkenBounds,
            ),
            (Config { divergence_threshold: -1.0, ..Config::default() }, ConfigError::DivergenceThreshold),
            (Config { divergence_patience: 0, ..Config::default() }, ConfigError::DivergencePatience),
            (Config { epsilon: 0.0, ..Config::default() }, ConfigError::Epsilon),
            (Config { initial_guess: f64::INFINITY, ..Config::default() }, ConfigError::InitialGuess),
            (Config { unit_timeout: Some(Duration::ZERO), ..Config::default() }, ConfigError::UnitTimeout),
        ];

        for (config, expected) in cases {
            assert_eq!(config.validate(), Err(expected), "{config:?}");
        }
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "relaxation_factor": 0.5, "acceleration": { "method": "aitken", "min_factor": 0.2, "max_factor": 1.0 } }"#,
        )
        .unwrap();

        assert_eq!(config.relaxation_factor, 0.5);
        assert_eq!(
            config.acceleration,
            Acceleration::Aitken { min_factor: 0.2, max_factor: 1.0 }
        );
        assert_eq!(config.max_iterations, Config::default().max_iterations);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<Config>(r#"{ "tolerence": 1e-3 }"#);
        assert!(result.is_err());
    }
}
