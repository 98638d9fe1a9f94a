//! The query execution engine: orchestrates parameter coercion, statement
//! shaping, transaction boundaries and output transforms across the four
//! operation shapes (batch, query, update, call).

mod call;
mod ops;
mod statement;

pub use call::CallResult;

use std::sync::Arc;

use crate::driver::{ConnectionSource, PreparedStatement};
use crate::error::SqlRunnerError;
use crate::metadata::{MetadataHandler, NoMetadataHandler};
use crate::output::OutputKind;
use crate::overrides::Overrider;
use crate::params::QueryParameters;
use crate::statement_handler::{BaseStatementHandler, StatementHandler};
use crate::transaction::TransactionHandler;
use crate::translate::{ExceptionTranslator, StateCodeTranslator};
use crate::type_handler::{BaseTypeHandler, TypeHandler};
use crate::types::TransactionIsolation;

/// Default cap on rows a lazy view keeps cached.
pub const DEFAULT_LAZY_CACHE_MAX: usize = 100;

/// Engine defaults, passed explicitly at construction.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Start in manual transaction mode (caller-driven commit/rollback).
    pub manual_mode: bool,
    /// Isolation level applied to every acquired connection.
    pub isolation: Option<TransactionIsolation>,
    /// Lazy cache bound used when no override is set.
    pub lazy_cache_max: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            manual_mode: false,
            isolation: None,
            lazy_cache_max: DEFAULT_LAZY_CACHE_MAX,
        }
    }
}

/// The core orchestrator.
///
/// Instances are single-threaded per call and own their strategies plus the
/// override registry; share work across threads by constructing one runner
/// per connection source handle (or use
/// [`crate::async_runner::AsyncQueryRunner`]).
pub struct QueryRunner {
    pub(crate) transaction: TransactionHandler,
    pub(crate) type_handler: Arc<dyn TypeHandler>,
    pub(crate) statement_handler: Arc<dyn StatementHandler>,
    pub(crate) metadata: Arc<dyn MetadataHandler>,
    pub(crate) translator: Arc<dyn ExceptionTranslator>,
    pub(crate) overrides: Overrider,
    pub(crate) config: RunnerConfig,
}

impl QueryRunner {
    /// Runner with default strategies over the given connection source.
    #[must_use]
    pub fn new(source: Box<dyn ConnectionSource>) -> Self {
        Self::with_config(source, RunnerConfig::default())
    }

    /// Runner with explicit configuration.
    #[must_use]
    pub fn with_config(source: Box<dyn ConnectionSource>, config: RunnerConfig) -> Self {
        let mut transaction = TransactionHandler::new(source);
        transaction.set_manual_mode(config.manual_mode);
        Self {
            transaction,
            type_handler: Arc::new(BaseTypeHandler),
            statement_handler: Arc::new(BaseStatementHandler),
            metadata: Arc::new(NoMetadataHandler),
            translator: Arc::new(StateCodeTranslator),
            overrides: Overrider::new(),
            config,
        }
    }

    /// Replace the type-coercion strategy.
    #[must_use]
    pub fn with_type_handler(mut self, handler: Arc<dyn TypeHandler>) -> Self {
        self.type_handler = handler;
        self
    }

    /// Replace the statement-shaping strategy.
    #[must_use]
    pub fn with_statement_handler(mut self, handler: Arc<dyn StatementHandler>) -> Self {
        self.statement_handler = handler;
        self
    }

    /// Replace the metadata lookup.
    #[must_use]
    pub fn with_metadata_handler(mut self, handler: Arc<dyn MetadataHandler>) -> Self {
        self.metadata = handler;
        self
    }

    /// Replace the exception translator.
    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn ExceptionTranslator>) -> Self {
        self.translator = translator;
        self
    }

    /// The override registry owned by this engine instance.
    pub fn overrides_mut(&mut self) -> &mut Overrider {
        &mut self.overrides
    }

    #[must_use]
    pub fn manual_mode(&self) -> bool {
        self.transaction.manual_mode()
    }

    /// Toggle manual transaction mode for subsequent calls.
    pub fn set_manual_mode(&mut self, manual: bool) {
        self.transaction.set_manual_mode(manual);
    }

    /// Commit the caller-managed transaction (manual mode).
    ///
    /// # Errors
    /// Driver failure during commit.
    pub fn commit(&mut self) -> Result<(), SqlRunnerError> {
        self.transaction.commit()
    }

    /// Roll the caller-managed transaction back (manual mode).
    ///
    /// # Errors
    /// Driver failure during rollback.
    pub fn rollback(&mut self) -> Result<(), SqlRunnerError> {
        self.transaction.rollback()
    }

    /// Create a savepoint on the live connection.
    ///
    /// # Errors
    /// No live connection, or a driver failure.
    pub fn savepoint(&mut self, name: &str) -> Result<(), SqlRunnerError> {
        self.transaction.savepoint(name)
    }

    /// Release a savepoint.
    ///
    /// # Errors
    /// No live connection, or a driver failure.
    pub fn release_savepoint(&mut self, name: &str) -> Result<(), SqlRunnerError> {
        self.transaction.release_savepoint(name)
    }

    /// Roll back to a savepoint.
    ///
    /// # Errors
    /// No live connection, or a driver failure.
    pub fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), SqlRunnerError> {
        self.transaction.rollback_to_savepoint(name)
    }

    /// Set the isolation level for current and future connections.
    ///
    /// # Errors
    /// Driver failure while applying the level.
    pub fn set_isolation(&mut self, level: TransactionIsolation) -> Result<(), SqlRunnerError> {
        self.config.isolation = Some(level);
        self.transaction.set_isolation(level)
    }

    /// Return the connection to the source regardless of mode.
    ///
    /// # Errors
    /// Driver failure while releasing.
    pub fn release_connection(&mut self) -> Result<(), SqlRunnerError> {
        self.transaction.force_release()
    }

    // ---- shared per-call plumbing ----

    /// Lazy output handling is a configuration matter, checked before any
    /// statement is created.
    pub(crate) fn check_lazy_support(&self, kind: OutputKind) -> Result<(), SqlRunnerError> {
        if !kind.is_lazy() {
            return Ok(());
        }
        if !self.statement_handler.supports_lazy() {
            return Err(SqlRunnerError::ConfigError(
                "lazy output handler requires a lazy-capable statement handler".to_string(),
            ));
        }
        if !self.transaction.manual_mode() {
            return Err(SqlRunnerError::ConfigError(
                "lazy output handling requires manual transaction mode".to_string(),
            ));
        }
        Ok(())
    }

    /// Commit-or-rollback, then unconditional cleanup, then rethrow with
    /// enrichment/translation. Every operation funnels through here.
    pub(crate) fn finish<T>(
        &mut self,
        result: Result<T, SqlRunnerError>,
        stmt: Option<Box<dyn PreparedStatement>>,
        sql: &str,
        params: Option<&QueryParameters>,
    ) -> Result<T, SqlRunnerError> {
        let outcome = match result {
            Ok(value) => {
                if self.transaction.manual_mode() {
                    Ok(value)
                } else {
                    self.transaction.commit().map(|()| value)
                }
            }
            Err(error) => {
                if !self.transaction.manual_mode() {
                    if let Err(rollback_error) = self.transaction.rollback() {
                        tracing::warn!("rollback after failure also failed: {rollback_error}");
                    }
                }
                Err(error)
            }
        };
        self.cleanup(stmt);
        self.overrides.clear_call_scope();
        outcome.map_err(|error| self.rethrow(error, sql, params))
    }

    /// Early-failure path for errors raised before a statement exists.
    pub(crate) fn fail_early(
        &mut self,
        error: SqlRunnerError,
        sql: &str,
        params: Option<&QueryParameters>,
    ) -> SqlRunnerError {
        if !self.transaction.manual_mode() {
            if let Err(rollback_error) = self.transaction.rollback() {
                tracing::warn!("rollback after failure also failed: {rollback_error}");
            }
        }
        self.cleanup(None);
        self.overrides.clear_call_scope();
        self.rethrow(error, sql, params)
    }

    /// Close hooks, statement close (unless a lazy view took ownership), and
    /// connection release. Failures here are logged, never raised.
    fn cleanup(&mut self, stmt: Option<Box<dyn PreparedStatement>>) {
        if let Some(mut stmt) = stmt {
            if let Err(error) = self.statement_handler.before_close(&mut *stmt) {
                tracing::warn!("statement handler before_close failed: {error}");
            }
            if let Err(error) = stmt.close() {
                tracing::warn!("statement close failed: {error}");
            }
        }
        if let Err(error) = self.statement_handler.after_close() {
            tracing::warn!("statement handler after_close failed: {error}");
        }
        if let Err(error) = self.transaction.close_connection() {
            tracing::warn!("connection release failed: {error}");
        }
    }

    /// Driver failures are translated into the engine taxonomy, enriched
    /// with the SQL text and parameters. Internal failures keep their kind.
    fn rethrow(
        &self,
        error: SqlRunnerError,
        sql: &str,
        params: Option<&QueryParameters>,
    ) -> SqlRunnerError {
        match error {
            SqlRunnerError::Driver(driver) => self.translator.translate(&driver, sql, params),
            other => other,
        }
    }
}
