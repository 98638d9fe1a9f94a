//! Stored-procedure/function calls, positional and metadata-resolved named.

use std::sync::Arc;

use tracing::debug;

use crate::driver::PreparedStatement;
use crate::error::SqlRunnerError;
use crate::metadata::{build_call_string, resolve_named, CallInput};
use crate::output::{OutputHandler, OutputKind};
use crate::overrides::{OverrideKey, Overrider};
use crate::params::QueryParameters;
use crate::rows::RowSequence;
use crate::statement_handler::StatementHandler;
use crate::transaction::TransactionHandler;
use crate::type_handler::TypeHandler;
use crate::types::ParamValue;

use super::QueryRunner;

/// Outcome of a named call: the merged parameter set (inputs, OUT values and
/// the return slot) plus the shaped row output.
#[derive(Debug)]
pub struct CallResult<T> {
    pub params: QueryParameters,
    pub output: T,
}

impl QueryRunner {
    /// Execute a callable statement.
    ///
    /// Returns the merged parameter set alongside the shaped output. The
    /// merged set carries every supplied parameter, with OUT/INOUT/RETURN
    /// positions overwritten by post-execution values, plus an unpositioned
    /// return slot holding the raw data rows (`ParamValue::Rows`, or `Null`
    /// when the output was shaped lazily).
    ///
    /// # Errors
    /// Lazy misconfiguration, unresolved parameter positions, or any driver
    /// failure.
    pub fn call<T, H>(
        &mut self,
        sql: &str,
        params: &QueryParameters,
        output: &H,
    ) -> Result<(QueryParameters, T), SqlRunnerError>
    where
        H: OutputHandler<T> + ?Sized,
    {
        let kind = output.kind();
        if let Err(error) = self.check_lazy_support(kind) {
            return Err(self.fail_early(error, sql, Some(params)));
        }
        let max_cache = if kind.is_lazy() {
            self.overrides
                .take_usize(OverrideKey::LazyCacheMaxSize, self.config.lazy_cache_max)
        } else {
            self.config.lazy_cache_max
        };
        let type_handler = Arc::clone(&self.type_handler);
        let statement_handler = Arc::clone(&self.statement_handler);
        let mut stmt_slot = None;
        let result = run_call(
            &mut self.transaction,
            &mut self.overrides,
            &type_handler,
            &statement_handler,
            sql,
            params,
            kind,
            max_cache,
            &mut stmt_slot,
        )
        .and_then(|(merged, rows)| {
            let shaped = output.handle(rows)?;
            Ok((merged, shaped))
        });
        let stmt = stmt_slot.take();
        self.finish(result, stmt, sql, Some(params))
    }

    /// Execute a call described by a [`CallInput`], resolving named inputs
    /// against procedure metadata and synthesizing the call escape string.
    ///
    /// Named resolution honors the `ControlParamCount` override (default on):
    /// parameter counts must reconcile with metadata, allowing the implicit
    /// return to be omitted by the caller.
    ///
    /// # Errors
    /// Metadata lookup or resolution failures, plus any [`Self::call`]
    /// failure.
    pub fn call_named<T, H>(
        &mut self,
        input: &CallInput,
        output: &H,
    ) -> Result<CallResult<T>, SqlRunnerError>
    where
        H: OutputHandler<T> + ?Sized,
    {
        let (sql, resolved) = match self.resolve_call_input(input) {
            Ok(parts) => parts,
            Err(error) => {
                return Err(self.fail_early(error, &input.procedure, Some(&input.params)))
            }
        };
        debug!(procedure = %input.procedure, call = %sql, "resolved call");
        let (params, shaped) = self.call(&sql, &resolved, output)?;
        Ok(CallResult {
            params,
            output: shaped,
        })
    }

    fn resolve_call_input(
        &mut self,
        input: &CallInput,
    ) -> Result<(String, QueryParameters), SqlRunnerError> {
        let resolved = if input.named {
            let enforce = self
                .overrides
                .take_bool(OverrideKey::ControlParamCount, true);
            let metadata = Arc::clone(&self.metadata);
            let conn = self.transaction.connection()?;
            let descriptors = metadata.procedure_parameters(
                conn,
                input.catalog.as_deref(),
                input.schema.as_deref(),
                &input.procedure,
                input.use_cache,
            )?;
            resolve_named(descriptors, &input.params, enforce)?
        } else {
            input.params.clone()
        };
        let mut qualified = String::new();
        if let Some(catalog) = &input.catalog {
            qualified.push_str(catalog);
            qualified.push('.');
        }
        if let Some(schema) = &input.schema {
            qualified.push_str(schema);
            qualified.push('.');
        }
        qualified.push_str(&input.procedure);
        let sql = build_call_string(&qualified, resolved.position_count());
        Ok((sql, resolved))
    }
}

#[allow(clippy::too_many_arguments)]
fn run_call(
    transaction: &mut TransactionHandler,
    overrides: &mut Overrider,
    type_handler: &Arc<dyn TypeHandler>,
    statement_handler: &Arc<dyn StatementHandler>,
    sql: &str,
    params: &QueryParameters,
    kind: OutputKind,
    max_cache: usize,
    stmt_slot: &mut Option<Box<dyn PreparedStatement>>,
) -> Result<(QueryParameters, RowSequence), SqlRunnerError> {
    let has_params = !params.is_empty();
    let conn = transaction.connection()?;
    let created = conn.prepare_call(sql).map_err(SqlRunnerError::Driver)?;
    *stmt_slot = Some(created);
    let stmt = match stmt_slot.as_deref_mut() {
        Some(stmt) => stmt,
        None => {
            return Err(SqlRunnerError::ExecutionError(
                "statement slot emptied during call".to_string(),
            ))
        }
    };
    let mut merged = params.clone();
    if has_params {
        merged.assert_order_resolved()?;
        type_handler.process_input(&mut *conn, overrides, &mut merged)?;
        statement_handler.set_statement(stmt, &merged)?;
    }
    let result = stmt.execute().map_err(SqlRunnerError::Driver)?;
    if has_params {
        let post = statement_handler.read_statement(stmt, &merged)?;
        merged.update(&post, true)?;
        // Output coercion consumes its handles; the release pass below only
        // frees what is still unconsumed.
        type_handler.process_output(&mut *conn, overrides, &mut merged)?;
    }
    type_handler.after_execute(&mut *conn, &merged);
    let stmt = match stmt_slot.take() {
        Some(stmt) => stmt,
        None => {
            return Err(SqlRunnerError::ExecutionError(
                "statement slot emptied during call".to_string(),
            ))
        }
    };
    let rows = super::ops::shape_rows(
        &mut *conn,
        overrides,
        type_handler,
        statement_handler,
        stmt,
        result,
        kind,
        max_cache,
        stmt_slot,
    )?;
    // The raw result rides in the return slot; lazily-shaped results cannot
    // be duplicated there.
    let raw = match &rows {
        RowSequence::Materialized(_) => ParamValue::Rows(rows.data_rows()?.to_vec()),
        RowSequence::Lazy(_) => ParamValue::Null,
    };
    merged.set_return(raw);
    Ok((merged, rows))
}
