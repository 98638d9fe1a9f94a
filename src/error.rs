use thiserror::Error;

use crate::driver::DriverError;
use crate::translate::SqlErrorKind;

#[derive(Debug, Error)]
pub enum SqlRunnerError {
    /// A driver failure already classified by the exception translator,
    /// enriched with the statement text and parameter values.
    #[error("{kind:?} (state {state:?}, code {code}): {message}; sql: {sql}; params: {params:?}")]
    Sql {
        kind: SqlErrorKind,
        state: Option<String>,
        code: i32,
        message: String,
        sql: String,
        params: Vec<String>,
    },

    /// A raw driver failure that has not passed through translation yet.
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl SqlRunnerError {
    /// Kind of a translated driver failure, if this is one.
    #[must_use]
    pub fn sql_kind(&self) -> Option<SqlErrorKind> {
        match self {
            SqlRunnerError::Sql { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
