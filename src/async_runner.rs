//! Async facade over the synchronous engine.
//!
//! Driver work is blocking, so every operation runs the engine on the
//! blocking pool via `spawn_blocking`. The engine lives behind an
//! `Arc<Mutex<_>>`; operations serialize on it, which matches the engine's
//! one-call-at-a-time contract.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::driver::ConnectionSource;
use crate::error::SqlRunnerError;
use crate::metadata::CallInput;
use crate::output::{OutputHandler, RowCountHandler, RowsHandler};
use crate::params::QueryParameters;
use crate::runner::{CallResult, QueryRunner, RunnerConfig};

/// Thread-safe async handle to a [`QueryRunner`].
#[derive(Clone)]
pub struct AsyncQueryRunner {
    inner: Arc<Mutex<QueryRunner>>,
}

fn lock_runner(inner: &Arc<Mutex<QueryRunner>>) -> MutexGuard<'_, QueryRunner> {
    match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl AsyncQueryRunner {
    #[must_use]
    pub fn new(source: Box<dyn ConnectionSource>) -> Self {
        Self::from_runner(QueryRunner::new(source))
    }

    #[must_use]
    pub fn with_config(source: Box<dyn ConnectionSource>, config: RunnerConfig) -> Self {
        Self::from_runner(QueryRunner::with_config(source, config))
    }

    /// Wrap an already-configured engine.
    #[must_use]
    pub fn from_runner(runner: QueryRunner) -> Self {
        Self {
            inner: Arc::new(Mutex::new(runner)),
        }
    }

    /// Run a closure against the engine on the blocking pool. The escape
    /// hatch for anything without a dedicated async wrapper (overrides,
    /// savepoints, strategy-specific state).
    ///
    /// # Errors
    /// The closure's failure, or a blocking-pool join failure.
    pub async fn with_runner<T, F>(&self, f: F) -> Result<T, SqlRunnerError>
    where
        T: Send + 'static,
        F: FnOnce(&mut QueryRunner) -> Result<T, SqlRunnerError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut runner = lock_runner(&inner);
            f(&mut runner)
        })
        .await
        .map_err(|e| SqlRunnerError::ExecutionError(format!("blocking join error: {e}")))?
    }

    /// Async [`QueryRunner::batch`].
    ///
    /// # Errors
    /// As the synchronous operation.
    pub async fn batch(
        &self,
        sql: impl Into<String>,
        param_sets: Vec<QueryParameters>,
    ) -> Result<Vec<i64>, SqlRunnerError> {
        let sql = sql.into();
        self.with_runner(move |runner| runner.batch(&sql, &param_sets))
            .await
    }

    /// Async [`QueryRunner::query`]. The output handler is shared, since it
    /// crosses onto the blocking pool.
    ///
    /// # Errors
    /// As the synchronous operation.
    pub async fn query<T, H>(
        &self,
        sql: impl Into<String>,
        output: Arc<H>,
        params: QueryParameters,
    ) -> Result<T, SqlRunnerError>
    where
        T: Send + 'static,
        H: OutputHandler<T> + Send + Sync + 'static,
    {
        let sql = sql.into();
        self.with_runner(move |runner| runner.query(&sql, &*output, &params))
            .await
    }

    /// Async [`QueryRunner::update`].
    ///
    /// # Errors
    /// As the synchronous operation.
    pub async fn update<T, H>(
        &self,
        sql: impl Into<String>,
        output: Arc<H>,
        params: QueryParameters,
    ) -> Result<T, SqlRunnerError>
    where
        T: Send + 'static,
        H: OutputHandler<T> + Send + Sync + 'static,
    {
        let sql = sql.into();
        self.with_runner(move |runner| runner.update(&sql, &*output, &params))
            .await
    }

    /// Async [`QueryRunner::call`].
    ///
    /// # Errors
    /// As the synchronous operation.
    pub async fn call<T, H>(
        &self,
        sql: impl Into<String>,
        params: QueryParameters,
        output: Arc<H>,
    ) -> Result<(QueryParameters, T), SqlRunnerError>
    where
        T: Send + 'static,
        H: OutputHandler<T> + Send + Sync + 'static,
    {
        let sql = sql.into();
        self.with_runner(move |runner| runner.call(&sql, &params, &*output))
            .await
    }

    /// Async [`QueryRunner::call_named`].
    ///
    /// # Errors
    /// As the synchronous operation.
    pub async fn call_named<T, H>(
        &self,
        input: CallInput,
        output: Arc<H>,
    ) -> Result<CallResult<T>, SqlRunnerError>
    where
        T: Send + 'static,
        H: OutputHandler<T> + Send + Sync + 'static,
    {
        self.with_runner(move |runner| runner.call_named(&input, &*output))
            .await
    }

    /// Commit the caller-managed transaction (manual mode).
    ///
    /// # Errors
    /// As the synchronous operation.
    pub async fn commit(&self) -> Result<(), SqlRunnerError> {
        self.with_runner(QueryRunner::commit).await
    }

    /// Roll the caller-managed transaction back (manual mode).
    ///
    /// # Errors
    /// As the synchronous operation.
    pub async fn rollback(&self) -> Result<(), SqlRunnerError> {
        self.with_runner(QueryRunner::rollback).await
    }
}

/// Coarse async surface for callers who only need SQL-text execution.
#[async_trait]
pub trait AsyncSqlExecutor {
    /// Run a parameterless statement or script.
    async fn execute_batch(&self, sql: &str) -> Result<(), SqlRunnerError>;

    /// Run a SELECT and buffer all data rows.
    async fn execute_select(
        &self,
        sql: &str,
        params: QueryParameters,
    ) -> Result<Vec<QueryParameters>, SqlRunnerError>;

    /// Run a DML statement and return the affected-row count.
    async fn execute_dml(
        &self,
        sql: &str,
        params: QueryParameters,
    ) -> Result<i64, SqlRunnerError>;
}

#[async_trait]
impl AsyncSqlExecutor for AsyncQueryRunner {
    async fn execute_batch(&self, sql: &str) -> Result<(), SqlRunnerError> {
        let sql = sql.to_owned();
        self.with_runner(move |runner| runner.batch_sql(&sql)).await
    }

    async fn execute_select(
        &self,
        sql: &str,
        params: QueryParameters,
    ) -> Result<Vec<QueryParameters>, SqlRunnerError> {
        self.query(sql, Arc::new(RowsHandler), params).await
    }

    async fn execute_dml(
        &self,
        sql: &str,
        params: QueryParameters,
    ) -> Result<i64, SqlRunnerError> {
        self.update(sql, Arc::new(RowCountHandler), params).await
    }
}
