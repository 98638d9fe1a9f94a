//! Statement shaping strategy: binds parameter sets onto statements, reads
//! OUT values back, and wraps execution results into the uniform row
//! sequence.

use std::sync::Arc;

use crate::driver::{ExecResult, PreparedStatement};
use crate::error::SqlRunnerError;
use crate::params::QueryParameters;
use crate::rows::{EmptyCursor, LazyKind, LazyRows, RowSequence};
use crate::type_handler::TypeHandler;
use crate::types::ParamValue;

/// Pluggable statement-shaping strategy.
#[allow(unused_variables)]
pub trait StatementHandler: Send + Sync {
    /// Bind the parameter set's values in position order, registering
    /// OUT/INOUT/RETURN positions where applicable.
    ///
    /// # Errors
    /// Driver failures during binding, or unresolved parameter positions.
    fn set_statement(
        &self,
        stmt: &mut dyn PreparedStatement,
        params: &QueryParameters,
    ) -> Result<(), SqlRunnerError>;

    /// Extract post-execution values as a positional array aligned to the
    /// parameter set's order; IN-only positions keep their bound value.
    ///
    /// # Errors
    /// Driver failures while reading OUT values.
    fn read_statement(
        &self,
        stmt: &mut dyn PreparedStatement,
        params: &QueryParameters,
    ) -> Result<Vec<ParamValue>, SqlRunnerError>;

    /// Materialize an execution result into summary + data rows.
    ///
    /// # Errors
    /// Driver failures while draining the cursor.
    fn wrap(&self, result: ExecResult) -> Result<Vec<QueryParameters>, SqlRunnerError>;

    /// Wrap an execution result as a lazy cursor view owning the statement.
    ///
    /// # Errors
    /// `ConfigError` unless the strategy supports lazy wrapping.
    fn wrap_lazy(
        &self,
        stmt: Box<dyn PreparedStatement>,
        result: ExecResult,
        kind: LazyKind,
        max_cache: usize,
        type_handler: Arc<dyn TypeHandler>,
    ) -> Result<RowSequence, SqlRunnerError> {
        Err(SqlRunnerError::ConfigError(
            "statement handler does not support lazy result wrapping".to_string(),
        ))
    }

    /// Strategy-specific work before the statement is closed.
    ///
    /// # Errors
    /// Strategy-specific failures; the engine logs and swallows them.
    fn before_close(&self, stmt: &mut dyn PreparedStatement) -> Result<(), SqlRunnerError> {
        Ok(())
    }

    /// Strategy-specific work after the statement is closed.
    ///
    /// # Errors
    /// Strategy-specific failures; the engine logs and swallows them.
    fn after_close(&self) -> Result<(), SqlRunnerError> {
        Ok(())
    }

    /// Whether this strategy can produce lazy row sequences.
    fn supports_lazy(&self) -> bool {
        false
    }
}

fn bind_positions(
    stmt: &mut dyn PreparedStatement,
    params: &QueryParameters,
) -> Result<(), SqlRunnerError> {
    for position in 0..params.position_count() {
        let Some(name) = params.key_at(position) else {
            return Err(SqlRunnerError::ParameterError(format!(
                "no parameter occupies position {position}"
            )));
        };
        let direction = params.get_direction(name).unwrap_or_default();
        let sql_type = params.get_type(name).unwrap_or_default();
        if direction.is_out() {
            stmt.register_out(position, sql_type)
                .map_err(SqlRunnerError::Driver)?;
        }
        if direction.is_in() {
            let value = params.get(name).cloned().unwrap_or(ParamValue::Null);
            stmt.bind(position, value).map_err(SqlRunnerError::Driver)?;
        }
    }
    Ok(())
}

fn read_positions(
    stmt: &mut dyn PreparedStatement,
    params: &QueryParameters,
) -> Result<Vec<ParamValue>, SqlRunnerError> {
    let mut values = Vec::with_capacity(params.position_count());
    for position in 0..params.position_count() {
        let name = params.key_at(position);
        let direction = name
            .and_then(|n| params.get_direction(n))
            .unwrap_or_default();
        if direction.is_out() {
            values.push(stmt.out_value(position).map_err(SqlRunnerError::Driver)?);
        } else {
            let current = name
                .and_then(|n| params.get(n))
                .cloned()
                .unwrap_or(ParamValue::Null);
            values.push(current);
        }
    }
    Ok(values)
}

fn materialize(result: ExecResult) -> Result<Vec<QueryParameters>, SqlRunnerError> {
    let mut rows = vec![crate::rows::summary_row(result.update_count)];
    if let Some(mut cursor) = result.rows {
        let columns: Vec<String> = cursor.columns().to_vec();
        while let Some(values) = cursor.next_row().map_err(SqlRunnerError::Driver)? {
            let mut row = QueryParameters::new();
            for (i, column) in columns.iter().enumerate() {
                row.set(
                    column.clone(),
                    values.get(i).cloned().unwrap_or(ParamValue::Null),
                );
            }
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Default shaping strategy: eager materialization only.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseStatementHandler;

impl StatementHandler for BaseStatementHandler {
    fn set_statement(
        &self,
        stmt: &mut dyn PreparedStatement,
        params: &QueryParameters,
    ) -> Result<(), SqlRunnerError> {
        bind_positions(stmt, params)
    }

    fn read_statement(
        &self,
        stmt: &mut dyn PreparedStatement,
        params: &QueryParameters,
    ) -> Result<Vec<ParamValue>, SqlRunnerError> {
        read_positions(stmt, params)
    }

    fn wrap(&self, result: ExecResult) -> Result<Vec<QueryParameters>, SqlRunnerError> {
        materialize(result)
    }
}

/// Shaping strategy that additionally supports cursor-backed lazy views.
#[derive(Debug, Clone, Copy, Default)]
pub struct LazyStatementHandler;

impl StatementHandler for LazyStatementHandler {
    fn set_statement(
        &self,
        stmt: &mut dyn PreparedStatement,
        params: &QueryParameters,
    ) -> Result<(), SqlRunnerError> {
        bind_positions(stmt, params)
    }

    fn read_statement(
        &self,
        stmt: &mut dyn PreparedStatement,
        params: &QueryParameters,
    ) -> Result<Vec<ParamValue>, SqlRunnerError> {
        read_positions(stmt, params)
    }

    fn wrap(&self, result: ExecResult) -> Result<Vec<QueryParameters>, SqlRunnerError> {
        materialize(result)
    }

    fn wrap_lazy(
        &self,
        stmt: Box<dyn PreparedStatement>,
        result: ExecResult,
        kind: LazyKind,
        max_cache: usize,
        type_handler: Arc<dyn TypeHandler>,
    ) -> Result<RowSequence, SqlRunnerError> {
        let cursor = result.rows.unwrap_or_else(|| Box::new(EmptyCursor));
        Ok(RowSequence::Lazy(LazyRows::new(
            Some(stmt),
            cursor,
            result.update_count,
            kind,
            max_cache,
            type_handler,
        )))
    }

    fn supports_lazy(&self) -> bool {
        true
    }
}
