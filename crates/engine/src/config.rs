use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConvergenceConfig, RunResult};

/// Settings for a [`RunController`](crate::RunController).
///
/// Every field has a default, so partial TOML or JSON documents deserialize:
///
/// ```
/// use mda_engine::RunConfig;
///
/// let config: RunConfig = serde_json::from_str(r#"{
///     "parallel": true,
///     "convergence": { "tolerance": 1e-8, "relaxation_factor": 0.7 }
/// }"#).unwrap();
///
/// assert!(config.parallel);
/// assert_eq!(config.convergence.max_iterations, 50);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub convergence: ConvergenceConfig,

    /// Run independent groups of a topological level on worker threads.
    pub parallel: bool,

    /// Report non-converged runs as [`RunError::NotConverged`](crate::RunError::NotConverged).
    pub strict: bool,

    /// A previous result whose registry seeds the next run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warm_start: Option<RunResult>,
}

impl RunConfig {
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the convergence settings are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.convergence.validate()
    }
}
