use mda_core::RegistryError;
use thiserror::Error;

use crate::invoke::InvokeError;

use super::config::ConfigError;

/// Errors that can occur during Gauss-Seidel solving.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("registry error")]
    Registry(#[from] RegistryError),
}

impl Error {
    /// Name of the discipline responsible for the error, if any.
    #[must_use]
    pub fn discipline(&self) -> Option<&str> {
        match self {
            Self::Invoke(error) => Some(error.discipline()),
            _ => None,
        }
    }
}
