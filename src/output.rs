//! Output shaping: transforms a row sequence into the caller's result type.

use std::collections::HashMap;

use crate::error::SqlRunnerError;
use crate::params::QueryParameters;
use crate::rows::{LazyKind, RowSequence};
use crate::types::ParamValue;

/// Declared shaping kind, consulted by the engine before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Plain affected-row-count shaping; updates skip generated-key retrieval.
    RowCount,
    /// Eagerly buffered rows.
    Buffered,
    /// Deferred row materialization over an open cursor.
    Lazy(LazyKind),
}

impl OutputKind {
    #[must_use]
    pub fn is_lazy(self) -> bool {
        matches!(self, OutputKind::Lazy(_))
    }
}

/// Transform a row sequence into a result.
pub trait OutputHandler<T>: Send + Sync {
    fn kind(&self) -> OutputKind {
        OutputKind::Buffered
    }

    /// Shape the sequence into the final result.
    ///
    /// # Errors
    /// Shaping failures; the engine rethrows them without translation.
    fn handle(&self, rows: RowSequence) -> Result<T, SqlRunnerError>;
}

/// Affected-row count, from the summary row.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowCountHandler;

impl OutputHandler<i64> for RowCountHandler {
    fn kind(&self) -> OutputKind {
        OutputKind::RowCount
    }

    fn handle(&self, rows: RowSequence) -> Result<i64, SqlRunnerError> {
        Ok(rows.update_count().unwrap_or(0))
    }
}

/// All data rows, eagerly buffered.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowsHandler;

impl OutputHandler<Vec<QueryParameters>> for RowsHandler {
    fn handle(&self, rows: RowSequence) -> Result<Vec<QueryParameters>, SqlRunnerError> {
        rows.into_data_rows()
    }
}

/// First value of the first data row, if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarHandler;

impl OutputHandler<Option<ParamValue>> for ScalarHandler {
    fn handle(&self, rows: RowSequence) -> Result<Option<ParamValue>, SqlRunnerError> {
        let data = rows.into_data_rows()?;
        Ok(data
            .into_iter()
            .next()
            .and_then(|row| row.value_at(0).cloned()))
    }
}

/// Rows as name→value maps.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapHandler;

impl OutputHandler<Vec<HashMap<String, ParamValue>>> for MapHandler {
    fn handle(
        &self,
        rows: RowSequence,
    ) -> Result<Vec<HashMap<String, ParamValue>>, SqlRunnerError> {
        let data = rows.into_data_rows()?;
        Ok(data
            .into_iter()
            .map(|row| {
                row.names()
                    .map(|name| (name.to_string(), row.get(name).cloned().unwrap_or(ParamValue::Null)))
                    .collect()
            })
            .collect())
    }
}

/// Hands the lazy view straight to the caller; rows materialize on demand.
#[derive(Debug, Clone, Copy)]
pub struct LazyRowsHandler {
    kind: LazyKind,
}

impl LazyRowsHandler {
    #[must_use]
    pub fn new(kind: LazyKind) -> Self {
        Self { kind }
    }
}

impl OutputHandler<RowSequence> for LazyRowsHandler {
    fn kind(&self) -> OutputKind {
        OutputKind::Lazy(self.kind)
    }

    fn handle(&self, rows: RowSequence) -> Result<RowSequence, SqlRunnerError> {
        Ok(rows)
    }
}
