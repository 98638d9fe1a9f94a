//! Batch, query and update operations.
//!
//! The work of each operation lives in a free function over the engine's
//! fields (transaction coordinator, override registry, strategies), so the
//! live connection borrow never overlaps the end-of-call bookkeeping in
//! [`QueryRunner::finish`].

use std::sync::Arc;

use tracing::debug;

use crate::driver::{
    Connection, ExecResult, GeneratedKeys, PreparedStatement, StatementOptions,
};
use crate::error::SqlRunnerError;
use crate::input::InputHandler;
use crate::output::{OutputHandler, OutputKind, RowCountHandler};
use crate::overrides::{OverrideKey, Overrider};
use crate::params::QueryParameters;
use crate::rows::{RowSequence, UPDATE_COUNT_KEY};
use crate::statement_handler::StatementHandler;
use crate::transaction::TransactionHandler;
use crate::type_handler::TypeHandler;

use super::statement::build_statement_options;
use super::QueryRunner;

impl QueryRunner {
    /// Execute `sql` once per parameter set as a single driver batch and
    /// return the per-unit affected-row counts, in submission order.
    ///
    /// An empty slice still prepares the statement and commits; it returns
    /// an empty vector.
    ///
    /// # Errors
    /// Unresolved parameter positions, or any driver failure; the whole
    /// batch is rolled back in auto mode.
    pub fn batch(
        &mut self,
        sql: &str,
        param_sets: &[QueryParameters],
    ) -> Result<Vec<i64>, SqlRunnerError> {
        debug!(units = param_sets.len(), "executing batch");
        let type_handler = Arc::clone(&self.type_handler);
        let statement_handler = Arc::clone(&self.statement_handler);
        let mut stmt_slot = None;
        let result = run_batch(
            &mut self.transaction,
            &mut self.overrides,
            &type_handler,
            &statement_handler,
            sql,
            param_sets,
            &mut stmt_slot,
        );
        let stmt = stmt_slot.take();
        self.finish(result, stmt, sql, param_sets.first())
    }

    /// Batch over input handlers. All inputs must carry identical, non-empty
    /// SQL text; anything else is a [`SqlRunnerError::ParameterError`].
    ///
    /// # Errors
    /// Inconsistent or empty SQL across inputs, or any [`Self::batch`]
    /// failure.
    pub fn batch_inputs(
        &mut self,
        inputs: &[&dyn InputHandler],
    ) -> Result<Vec<i64>, SqlRunnerError> {
        let Some(first) = inputs.first() else {
            return Err(SqlRunnerError::ParameterError(
                "batch requires at least one input handler".to_string(),
            ));
        };
        let sql = first.query_string();
        if sql.trim().is_empty() {
            let error =
                SqlRunnerError::ParameterError("batch input has empty SQL text".to_string());
            return Err(self.fail_early(error, sql, None));
        }
        if let Some(odd) = inputs.iter().find(|input| input.query_string() != sql) {
            let error = SqlRunnerError::ParameterError(format!(
                "batch inputs must share identical SQL text; found {:?} alongside {:?}",
                odd.query_string(),
                sql
            ));
            return Err(self.fail_early(error, sql, None));
        }
        let sets: Vec<QueryParameters> = inputs
            .iter()
            .map(|input| input.query_parameters().clone())
            .collect();
        self.batch(sql, &sets)
    }

    /// Run a parameterless statement (typically DDL or a script), discarding
    /// the affected-row count.
    ///
    /// # Errors
    /// Any driver failure.
    pub fn batch_sql(&mut self, sql: &str) -> Result<(), SqlRunnerError> {
        self.update(sql, &RowCountHandler, &QueryParameters::new())
            .map(|_| ())
    }

    /// Execute a row-producing statement and shape the result through the
    /// output handler.
    ///
    /// # Errors
    /// Lazy misconfiguration (checked before any statement exists),
    /// unresolved parameter positions, or any driver failure.
    pub fn query<T, H>(
        &mut self,
        sql: &str,
        output: &H,
        params: &QueryParameters,
    ) -> Result<T, SqlRunnerError>
    where
        H: OutputHandler<T> + ?Sized,
    {
        let kind = output.kind();
        if let Err(error) = self.check_lazy_support(kind) {
            return Err(self.fail_early(error, sql, Some(params)));
        }
        let options = match build_statement_options(&mut self.overrides, kind, false) {
            Ok(options) => options,
            Err(error) => return Err(self.fail_early(error, sql, Some(params))),
        };
        let max_cache = self.lazy_cache_bound(kind);
        let type_handler = Arc::clone(&self.type_handler);
        let statement_handler = Arc::clone(&self.statement_handler);
        let mut stmt_slot = None;
        let result = run_statement(
            &mut self.transaction,
            &mut self.overrides,
            &type_handler,
            &statement_handler,
            sql,
            params,
            &options,
            kind,
            max_cache,
            false,
            &mut stmt_slot,
        )
        .and_then(|rows| output.handle(rows));
        let stmt = stmt_slot.take();
        self.finish(result, stmt, sql, Some(params))
    }

    /// [`Self::query`] over an input handler.
    ///
    /// # Errors
    /// As [`Self::query`].
    pub fn query_input<T, H>(
        &mut self,
        input: &dyn InputHandler,
        output: &H,
    ) -> Result<T, SqlRunnerError>
    where
        H: OutputHandler<T> + ?Sized,
    {
        self.query(input.query_string(), output, input.query_parameters())
    }

    /// Execute a DML statement. Unless the output handler declares
    /// [`OutputKind::RowCount`], generated-key retrieval is requested and
    /// the shaped rows are the generated keys rather than a result set.
    ///
    /// # Errors
    /// Unresolved parameter positions, conflicting statement options, or any
    /// driver failure.
    pub fn update<T, H>(
        &mut self,
        sql: &str,
        output: &H,
        params: &QueryParameters,
    ) -> Result<T, SqlRunnerError>
    where
        H: OutputHandler<T> + ?Sized,
    {
        let kind = output.kind();
        if let Err(error) = self.check_lazy_support(kind) {
            return Err(self.fail_early(error, sql, Some(params)));
        }
        let wants_keys = kind != OutputKind::RowCount;
        let options = match build_statement_options(&mut self.overrides, kind, wants_keys) {
            Ok(options) => options,
            Err(error) => return Err(self.fail_early(error, sql, Some(params))),
        };
        let max_cache = self.lazy_cache_bound(kind);
        let type_handler = Arc::clone(&self.type_handler);
        let statement_handler = Arc::clone(&self.statement_handler);
        let mut stmt_slot = None;
        let result = run_statement(
            &mut self.transaction,
            &mut self.overrides,
            &type_handler,
            &statement_handler,
            sql,
            params,
            &options,
            kind,
            max_cache,
            true,
            &mut stmt_slot,
        )
        .and_then(|rows| output.handle(rows));
        let stmt = stmt_slot.take();
        self.finish(result, stmt, sql, Some(params))
    }

    /// [`Self::update`] over an input handler.
    ///
    /// # Errors
    /// As [`Self::update`].
    pub fn update_input<T, H>(
        &mut self,
        input: &dyn InputHandler,
        output: &H,
    ) -> Result<T, SqlRunnerError>
    where
        H: OutputHandler<T> + ?Sized,
    {
        self.update(input.query_string(), output, input.query_parameters())
    }

    /// Cache bound for a lazy view. The override is consulted only for lazy
    /// calls, so a one-shot entry is not eaten by an eager call.
    fn lazy_cache_bound(&mut self, kind: OutputKind) -> usize {
        if kind.is_lazy() {
            self.overrides
                .take_usize(OverrideKey::LazyCacheMaxSize, self.config.lazy_cache_max)
        } else {
            self.config.lazy_cache_max
        }
    }
}

fn run_batch(
    transaction: &mut TransactionHandler,
    overrides: &mut Overrider,
    type_handler: &Arc<dyn TypeHandler>,
    statement_handler: &Arc<dyn StatementHandler>,
    sql: &str,
    param_sets: &[QueryParameters],
    stmt_slot: &mut Option<Box<dyn PreparedStatement>>,
) -> Result<Vec<i64>, SqlRunnerError> {
    let conn = transaction.connection()?;
    let created = conn
        .prepare(sql, &StatementOptions::default())
        .map_err(SqlRunnerError::Driver)?;
    *stmt_slot = Some(created);
    let stmt = match stmt_slot.as_deref_mut() {
        Some(stmt) => stmt,
        None => {
            return Err(SqlRunnerError::ExecutionError(
                "statement slot emptied during batch".to_string(),
            ))
        }
    };
    let mut coerced_sets = Vec::with_capacity(param_sets.len());
    for set in param_sets {
        let mut coerced = set.clone();
        coerced.assert_order_resolved()?;
        type_handler.process_input(&mut *conn, overrides, &mut coerced)?;
        statement_handler.set_statement(stmt, &coerced)?;
        stmt.add_batch().map_err(SqlRunnerError::Driver)?;
        coerced_sets.push(coerced);
    }
    let counts = stmt.execute_batch().map_err(SqlRunnerError::Driver)?;
    for coerced in &coerced_sets {
        type_handler.after_execute(&mut *conn, coerced);
    }
    Ok(counts)
}

/// Single-statement execution shared by query and update.
#[allow(clippy::too_many_arguments)]
fn run_statement(
    transaction: &mut TransactionHandler,
    overrides: &mut Overrider,
    type_handler: &Arc<dyn TypeHandler>,
    statement_handler: &Arc<dyn StatementHandler>,
    sql: &str,
    params: &QueryParameters,
    options: &StatementOptions,
    kind: OutputKind,
    max_cache: usize,
    swap_generated_keys: bool,
    stmt_slot: &mut Option<Box<dyn PreparedStatement>>,
) -> Result<RowSequence, SqlRunnerError> {
    let conn = transaction.connection()?;
    // Parameterless statements run as plain statements unless generated-key
    // retrieval was negotiated, which requires the prepared path.
    let plain = params.is_empty() && options.generated_keys == GeneratedKeys::None;
    let created = if plain {
        conn.create(sql, options).map_err(SqlRunnerError::Driver)?
    } else {
        conn.prepare(sql, options).map_err(SqlRunnerError::Driver)?
    };
    // Parked immediately so a mid-call failure still reaches the close hooks.
    *stmt_slot = Some(created);
    let stmt = match stmt_slot.as_deref_mut() {
        Some(stmt) => stmt,
        None => {
            return Err(SqlRunnerError::ExecutionError(
                "statement slot emptied during execution".to_string(),
            ))
        }
    };
    let mut coerced = params.clone();
    if !params.is_empty() {
        coerced.assert_order_resolved()?;
        type_handler.process_input(&mut *conn, overrides, &mut coerced)?;
        statement_handler.set_statement(stmt, &coerced)?;
    }
    let mut result = stmt.execute().map_err(SqlRunnerError::Driver)?;
    if swap_generated_keys && options.generated_keys != GeneratedKeys::None {
        result = ExecResult {
            update_count: result.update_count,
            rows: stmt.generated_keys().map_err(SqlRunnerError::Driver)?,
        };
    }
    type_handler.after_execute(&mut *conn, &coerced);
    let stmt = match stmt_slot.take() {
        Some(stmt) => stmt,
        None => {
            return Err(SqlRunnerError::ExecutionError(
                "statement slot emptied during execution".to_string(),
            ))
        }
    };
    shape_rows(
        conn,
        overrides,
        type_handler,
        statement_handler,
        stmt,
        result,
        kind,
        max_cache,
        stmt_slot,
    )
}

/// Shape an execution result into the uniform row sequence. Lazy shaping
/// moves statement ownership into the view; eager shaping parks the
/// statement in `stmt_slot` for end-of-call cleanup.
#[allow(clippy::too_many_arguments)]
pub(crate) fn shape_rows(
    conn: &mut dyn Connection,
    overrides: &mut Overrider,
    type_handler: &Arc<dyn TypeHandler>,
    statement_handler: &Arc<dyn StatementHandler>,
    stmt: Box<dyn PreparedStatement>,
    result: ExecResult,
    kind: OutputKind,
    max_cache: usize,
    stmt_slot: &mut Option<Box<dyn PreparedStatement>>,
) -> Result<RowSequence, SqlRunnerError> {
    if let OutputKind::Lazy(lazy) = kind {
        return statement_handler.wrap_lazy(
            stmt,
            result,
            lazy,
            max_cache,
            Arc::clone(type_handler),
        );
    }
    let mut rows = statement_handler.wrap(result)?;
    for row in rows.iter_mut().skip(1) {
        type_handler.process_output(&mut *conn, overrides, row)?;
    }
    let update_count = rows
        .first()
        .and_then(|summary| summary.get(UPDATE_COUNT_KEY))
        .and_then(|value| value.as_int().copied());
    let data = if rows.len() > 1 {
        rows.split_off(1)
    } else {
        Vec::new()
    };
    *stmt_slot = Some(stmt);
    Ok(RowSequence::materialized(update_count, data))
}
