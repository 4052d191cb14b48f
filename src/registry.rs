//! Shared registry errors for the dister and publisher extension points

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("A strategy is already registered under type name '{0}'")]
    DuplicateType(String),

    #[error("No strategy registered under type name '{0}'")]
    UnknownType(String),

    #[error("Strategy '{type_name}' rejected its configuration: {source}")]
    Strategy {
        type_name: String,
        #[source]
        source: anyhow::Error,
    },
}
