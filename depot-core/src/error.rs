use thiserror::Error;

/// Failures surfaced by the engine.
///
/// Backend and resolver failures are `anyhow::Error` values; the engine
/// wraps them into [`Error::Operation`] together with a description of the
/// operation that failed, and never swallows them.
#[derive(Debug, Error)]
pub enum Error {
    /// A required builder field is missing or invalid. Raised by
    /// `prepare()` / `build()`, never at execute time.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A backend or resolver call failed while executing an operation.
    #[error("{operation} failed")]
    Operation {
        /// Description of the operation that failed.
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// A transaction method was called out of sequence.
    #[error("invalid transaction state: {0}")]
    TransactionState(String),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn operation(operation: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Operation {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn transaction_state(message: impl Into<String>) -> Self {
        Self::TransactionState(message.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(..))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
