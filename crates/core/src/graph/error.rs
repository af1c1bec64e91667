use thiserror::Error;

use crate::registry::RegistryError;

/// Structural errors found while building a dependency graph.
///
/// These are fatal: no partially built graph is returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("variable '{variable}' is written by both '{first}' and '{second}'")]
    MultipleWriters {
        variable: String,
        first: String,
        second: String,
    },

    #[error("input '{variable}' of '{discipline}' has no producer, default, or design value")]
    UnboundInput {
        variable: String,
        discipline: String,
    },

    #[error("discipline '{name}' is registered more than once")]
    DuplicateDiscipline { name: String },

    #[error("invalid declaration in '{discipline}'")]
    Declaration {
        discipline: String,
        #[source]
        source: RegistryError,
    },
}
