//! The uniform Row Sequence: a statement-summary row followed by data rows,
//! either fully materialized or served lazily from an open cursor.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::driver::{DriverError, PreparedStatement, RowCursor};
use crate::error::SqlRunnerError;
use crate::params::QueryParameters;
use crate::type_handler::TypeHandler;
use crate::types::ParamValue;

/// Key in the synthetic summary row carrying the statement's update count.
pub const UPDATE_COUNT_KEY: &str = "update_count";

/// Build the synthetic summary row (element 0 of every row sequence).
#[must_use]
pub fn summary_row(update_count: Option<i64>) -> QueryParameters {
    let mut summary = QueryParameters::new();
    let value = match update_count {
        Some(count) => ParamValue::Int(count),
        None => ParamValue::Null,
    };
    summary.set(UPDATE_COUNT_KEY, value);
    summary
}

/// The four lazy sub-modes, fixed at wrap time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LazyKind {
    ForwardReadOnly,
    ScrollReadOnly,
    ForwardUpdatable,
    ScrollUpdatable,
}

impl LazyKind {
    #[must_use]
    pub fn scrollable(self) -> bool {
        matches!(self, LazyKind::ScrollReadOnly | LazyKind::ScrollUpdatable)
    }

    #[must_use]
    pub fn updatable(self) -> bool {
        matches!(self, LazyKind::ForwardUpdatable | LazyKind::ScrollUpdatable)
    }
}

/// Uniform result representation consumed by output handlers.
pub enum RowSequence {
    /// Summary row first, then one `QueryParameters` per data row.
    Materialized(Vec<QueryParameters>),
    /// Cache-backed view over an open cursor.
    Lazy(LazyRows),
}

impl std::fmt::Debug for RowSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowSequence::Materialized(rows) => {
                f.debug_tuple("Materialized").field(rows).finish()
            }
            // The lazy variant holds a live cursor; print its shape only.
            RowSequence::Lazy(lazy) => f
                .debug_struct("Lazy")
                .field("kind", &lazy.kind())
                .finish_non_exhaustive(),
        }
    }
}

impl RowSequence {
    /// Materialized sequence from an update count and data rows.
    #[must_use]
    pub fn materialized(update_count: Option<i64>, data: Vec<QueryParameters>) -> Self {
        let mut rows = Vec::with_capacity(data.len() + 1);
        rows.push(summary_row(update_count));
        rows.extend(data);
        RowSequence::Materialized(rows)
    }

    #[must_use]
    pub fn is_lazy(&self) -> bool {
        matches!(self, RowSequence::Lazy(_))
    }

    /// The synthetic summary row (always present, even for zero-row results).
    #[must_use]
    pub fn summary(&self) -> &QueryParameters {
        match self {
            // Materialized sequences are built through constructors that
            // always install the summary at element 0.
            RowSequence::Materialized(rows) => &rows[0],
            RowSequence::Lazy(lazy) => lazy.summary(),
        }
    }

    /// Update count from the summary row, when the driver reported one.
    #[must_use]
    pub fn update_count(&self) -> Option<i64> {
        self.summary().get(UPDATE_COUNT_KEY)?.as_int().copied()
    }

    /// Data rows of a materialized sequence (summary excluded).
    ///
    /// # Errors
    /// `ConfigError` when the sequence is lazy; eager output handlers must
    /// only ever be paired with materialized sequences.
    pub fn data_rows(&self) -> Result<&[QueryParameters], SqlRunnerError> {
        match self {
            RowSequence::Materialized(rows) => Ok(&rows[1..]),
            RowSequence::Lazy(_) => Err(SqlRunnerError::ConfigError(
                "eager access to a lazy row sequence".to_string(),
            )),
        }
    }

    /// Consume into data rows (summary excluded).
    ///
    /// # Errors
    /// `ConfigError` when the sequence is lazy.
    pub fn into_data_rows(self) -> Result<Vec<QueryParameters>, SqlRunnerError> {
        match self {
            RowSequence::Materialized(mut rows) => {
                rows.remove(0);
                Ok(rows)
            }
            RowSequence::Lazy(_) => Err(SqlRunnerError::ConfigError(
                "eager access to a lazy row sequence".to_string(),
            )),
        }
    }

    /// Consume into the lazy view.
    ///
    /// # Errors
    /// `ConfigError` when the sequence is materialized.
    pub fn into_lazy(self) -> Result<LazyRows, SqlRunnerError> {
        match self {
            RowSequence::Lazy(lazy) => Ok(lazy),
            RowSequence::Materialized(_) => Err(SqlRunnerError::ConfigError(
                "lazy access to a materialized row sequence".to_string(),
            )),
        }
    }
}

/// Cursor-backed view with a bounded row cache.
///
/// Owns the statement that produced it; callers in manual transaction mode
/// read rows on demand and must [`LazyRows::close`] when done.
pub struct LazyRows {
    stmt: Option<Box<dyn PreparedStatement>>,
    cursor: Box<dyn RowCursor>,
    summary: QueryParameters,
    kind: LazyKind,
    type_handler: Arc<dyn TypeHandler>,
    cache: VecDeque<QueryParameters>,
    /// Absolute index of `cache.front()`.
    cache_start: usize,
    /// Total rows pulled from the cursor so far.
    fetched: usize,
    /// Absolute index the next `next()` call serves.
    pos: usize,
    max_cache: usize,
    exhausted: bool,
}

impl LazyRows {
    #[must_use]
    pub fn new(
        stmt: Option<Box<dyn PreparedStatement>>,
        cursor: Box<dyn RowCursor>,
        update_count: Option<i64>,
        kind: LazyKind,
        max_cache: usize,
        type_handler: Arc<dyn TypeHandler>,
    ) -> Self {
        Self {
            stmt,
            cursor,
            summary: summary_row(update_count),
            kind,
            type_handler,
            cache: VecDeque::new(),
            cache_start: 0,
            fetched: 0,
            pos: 0,
            max_cache: max_cache.max(1),
            exhausted: false,
        }
    }

    #[must_use]
    pub fn kind(&self) -> LazyKind {
        self.kind
    }

    #[must_use]
    pub fn summary(&self) -> &QueryParameters {
        &self.summary
    }

    /// Pull rows until `index` is cached or the cursor is exhausted.
    fn fetch_through(&mut self, index: usize) -> Result<(), SqlRunnerError> {
        while !self.exhausted && self.fetched <= index {
            match self.cursor.next_row()? {
                None => self.exhausted = true,
                Some(values) => {
                    let mut row = QueryParameters::new();
                    for (i, column) in self.cursor.columns().iter().enumerate() {
                        let value = values.get(i).cloned().unwrap_or(ParamValue::Null);
                        row.set(column.clone(), value);
                    }
                    self.type_handler.process_output_row(&mut row)?;
                    self.cache.push_back(row);
                    self.fetched += 1;
                    while self.cache.len() > self.max_cache {
                        self.cache.pop_front();
                        self.cache_start += 1;
                    }
                }
            }
        }
        Ok(())
    }

    fn cached(&self, index: usize) -> Result<Option<&QueryParameters>, SqlRunnerError> {
        if index >= self.fetched {
            return Ok(None);
        }
        if index < self.cache_start {
            return Err(SqlRunnerError::ExecutionError(format!(
                "row {index} was evicted from the lazy cache (max {} rows)",
                self.max_cache
            )));
        }
        Ok(self.cache.get(index - self.cache_start))
    }

    /// Read the next data row, fetching from the cursor on demand.
    ///
    /// # Errors
    /// Driver failures mid-fetch, or cache eviction of the current position.
    pub fn next(&mut self) -> Result<Option<&QueryParameters>, SqlRunnerError> {
        let index = self.pos;
        self.fetch_through(index)?;
        if index >= self.fetched {
            return Ok(None);
        }
        self.pos += 1;
        self.cached(index)
    }

    /// Random access to data row `index` (zero-based). Scrollable kinds only.
    ///
    /// # Errors
    /// `ConfigError` for forward-only kinds; `ExecutionError` when the row
    /// was already evicted from the bounded cache.
    pub fn row_at(&mut self, index: usize) -> Result<Option<&QueryParameters>, SqlRunnerError> {
        if !self.kind.scrollable() {
            return Err(SqlRunnerError::ConfigError(
                "random access on a forward-only lazy view".to_string(),
            ));
        }
        self.fetch_through(index)?;
        if index < self.fetched {
            self.pos = index + 1;
        }
        self.cached(index)
    }

    /// Step back one row. Scrollable kinds only.
    ///
    /// # Errors
    /// Same failure modes as [`Self::row_at`].
    pub fn prev(&mut self) -> Result<Option<&QueryParameters>, SqlRunnerError> {
        if !self.kind.scrollable() {
            return Err(SqlRunnerError::ConfigError(
                "backward access on a forward-only lazy view".to_string(),
            ));
        }
        if self.pos < 2 {
            self.pos = 0;
            return Ok(None);
        }
        self.row_at(self.pos - 2)
    }

    /// Replace the cached copy of data row `index`. Updatable kinds only.
    ///
    /// # Errors
    /// `ConfigError` for read-only kinds, `ExecutionError` for unknown or
    /// evicted rows.
    pub fn set_row(&mut self, index: usize, row: QueryParameters) -> Result<(), SqlRunnerError> {
        if !self.kind.updatable() {
            return Err(SqlRunnerError::ConfigError(
                "update on a read-only lazy view".to_string(),
            ));
        }
        self.fetch_through(index)?;
        if index >= self.fetched {
            return Err(SqlRunnerError::ExecutionError(format!(
                "row {index} does not exist"
            )));
        }
        if index < self.cache_start {
            return Err(SqlRunnerError::ExecutionError(format!(
                "row {index} was evicted from the lazy cache (max {} rows)",
                self.max_cache
            )));
        }
        self.cache[index - self.cache_start] = row;
        Ok(())
    }

    /// Close the owned statement and drop the cursor.
    ///
    /// # Errors
    /// Propagates the driver's close failure.
    pub fn close(mut self) -> Result<(), SqlRunnerError> {
        if let Some(mut stmt) = self.stmt.take() {
            stmt.close().map_err(SqlRunnerError::Driver)?;
        }
        Ok(())
    }
}

impl Drop for LazyRows {
    fn drop(&mut self) {
        if let Some(mut stmt) = self.stmt.take() {
            if let Err(e) = stmt.close() {
                tracing::warn!("failed to close statement behind lazy rows: {e}");
            }
        }
    }
}

/// Cursor over no rows, used when a statement produced none.
pub struct EmptyCursor;

impl RowCursor for EmptyCursor {
    fn columns(&self) -> &[String] {
        &[]
    }

    fn next_row(&mut self) -> Result<Option<Vec<ParamValue>>, DriverError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_handler::BaseTypeHandler;

    struct CountingCursor {
        columns: Vec<String>,
        remaining: i64,
    }

    impl RowCursor for CountingCursor {
        fn columns(&self) -> &[String] {
            &self.columns
        }

        fn next_row(&mut self) -> Result<Option<Vec<ParamValue>>, DriverError> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(vec![ParamValue::Int(self.remaining)]))
        }
    }

    fn lazy(kind: LazyKind, rows: i64, max_cache: usize) -> LazyRows {
        LazyRows::new(
            None,
            Box::new(CountingCursor {
                columns: vec!["n".to_string()],
                remaining: rows,
            }),
            None,
            kind,
            max_cache,
            Arc::new(BaseTypeHandler::default()),
        )
    }

    #[test]
    fn materialized_always_has_summary() {
        let seq = RowSequence::materialized(Some(3), vec![]);
        assert_eq!(seq.update_count(), Some(3));
        assert!(seq.data_rows().unwrap().is_empty());
    }

    #[test]
    fn debug_formatting_covers_both_variants() {
        let seq = RowSequence::materialized(Some(1), vec![]);
        assert!(format!("{seq:?}").starts_with("Materialized"));

        let seq = RowSequence::Lazy(lazy(LazyKind::ScrollReadOnly, 1, 10));
        assert!(format!("{seq:?}").contains("ScrollReadOnly"));
    }

    #[test]
    fn forward_view_reads_to_exhaustion() {
        let mut view = lazy(LazyKind::ForwardReadOnly, 3, 10);
        let mut seen = 0;
        while view.next().unwrap().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 3);
        assert!(view.next().unwrap().is_none());
        assert!(view.row_at(0).is_err());
    }

    #[test]
    fn scroll_view_reads_backward_within_cache() {
        let mut view = lazy(LazyKind::ScrollReadOnly, 5, 10);
        assert!(view.row_at(3).unwrap().is_some());
        assert!(view.prev().unwrap().is_some());
        assert!(view.row_at(0).unwrap().is_some());
    }

    #[test]
    fn bounded_cache_evicts_old_rows() {
        let mut view = lazy(LazyKind::ScrollReadOnly, 10, 2);
        assert!(view.row_at(5).unwrap().is_some());
        // rows 0..=3 fell out of the 2-row cache
        assert!(view.row_at(0).is_err());
    }

    #[test]
    fn updatable_view_replaces_cached_row() {
        let mut view = lazy(LazyKind::ScrollUpdatable, 3, 10);
        assert!(view.row_at(1).unwrap().is_some());
        let mut replacement = QueryParameters::new();
        replacement.set("n", ParamValue::Int(99));
        view.set_row(1, replacement).unwrap();
        assert_eq!(
            view.row_at(1).unwrap().unwrap().get("n"),
            Some(&ParamValue::Int(99))
        );

        let mut read_only = lazy(LazyKind::ScrollReadOnly, 3, 10);
        assert!(read_only.set_row(0, QueryParameters::new()).is_err());
    }
}
