//! Connectivity contracts the execution engine is written against.
//!
//! These traits model a generic relational driver: connections, prepared or
//! callable statements, forward row cursors, and opaque large-object/cursor
//! handles. Backends implement them (`crate::sqlite` for rusqlite); the
//! engine never touches a concrete driver type.

use thiserror::Error;

use crate::types::{ParamValue, SqlType, TransactionIsolation};

/// Per-unit batch count meaning "statement succeeded, affected row count unknown".
pub const SUCCESS_NO_INFO: i64 = -2;

/// A failure surfaced by the underlying driver.
///
/// `state` carries the SQLSTATE when the driver exposes one, `code` the
/// vendor-specific error code (0 when unknown). The exception translator
/// classifies errors from exactly these three fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("driver error (state {state:?}, code {code}): {message}")]
pub struct DriverError {
    pub state: Option<String>,
    pub code: i32,
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            state: None,
            code: 0,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }
}

/// Large-object kinds a driver may allocate handles for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LobKind {
    Blob,
    Clob,
    SqlXml,
}

/// Opaque token for a driver-side large object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LobHandle {
    pub id: u64,
    pub kind: LobKind,
}

/// Opaque token for a driver-side open cursor (e.g. a function returning one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorHandle {
    pub id: u64,
}

/// Opaque token for a driver-side array allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayHandle {
    pub id: u64,
}

/// Cursor capability negotiated at statement creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorMode {
    #[default]
    ForwardOnly,
    Scroll {
        change_sensitive: bool,
    },
}

/// Result-set concurrency negotiated at statement creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    #[default]
    ReadOnly,
    Updatable,
}

/// Generated-key retrieval requested at statement creation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GeneratedKeys {
    #[default]
    None,
    /// Return whatever keys the driver generates.
    Returned,
    /// Return the named generated columns.
    Columns(Vec<String>),
}

/// Options resolved by the engine's statement-creation state machine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatementOptions {
    pub generated_keys: GeneratedKeys,
    pub cursor: CursorMode,
    pub concurrency: Concurrency,
}

/// Outcome of executing a statement once.
pub struct ExecResult {
    /// Affected-row count for DML, `None` for row-producing statements.
    pub update_count: Option<i64>,
    /// Produced rows, if any.
    pub rows: Option<Box<dyn RowCursor>>,
}

/// Forward iteration over driver result rows.
pub trait RowCursor: Send {
    fn columns(&self) -> &[String];

    /// Fetch the next row, or `None` once exhausted.
    ///
    /// # Errors
    /// Returns a [`DriverError`] if the driver fails mid-fetch.
    fn next_row(&mut self) -> Result<Option<Vec<ParamValue>>, DriverError>;
}

/// A prepared, callable or plain statement. Parameter indices are zero-based.
pub trait PreparedStatement: Send {
    /// Bind an IN/INOUT value at the given position.
    ///
    /// # Errors
    /// Fails for plain statements and for values the driver cannot represent.
    fn bind(&mut self, index: usize, value: ParamValue) -> Result<(), DriverError>;

    /// Register an OUT/INOUT/RETURN position on a callable statement.
    ///
    /// # Errors
    /// Fails when the statement is not callable or the driver lacks support.
    fn register_out(&mut self, index: usize, sql_type: SqlType) -> Result<(), DriverError>;

    /// Snapshot the current binds as one batch unit.
    ///
    /// # Errors
    /// Fails when the statement cannot be batched.
    fn add_batch(&mut self) -> Result<(), DriverError>;

    /// Execute all accumulated batch units as a single batched operation.
    ///
    /// # Errors
    /// Fails when any unit fails; partial counts are discarded.
    fn execute_batch(&mut self) -> Result<Vec<i64>, DriverError>;

    /// Execute the statement once.
    ///
    /// # Errors
    /// Fails when preparation or execution fails.
    fn execute(&mut self) -> Result<ExecResult, DriverError>;

    /// Keys generated by the last execution, when requested at creation.
    ///
    /// # Errors
    /// Fails when the driver cannot produce them.
    fn generated_keys(&mut self) -> Result<Option<Box<dyn RowCursor>>, DriverError>;

    /// Read back an OUT/INOUT/RETURN value registered at `index`.
    ///
    /// # Errors
    /// Fails when the position was not registered or the call has not run.
    fn out_value(&mut self, index: usize) -> Result<ParamValue, DriverError>;

    /// Release statement resources. Idempotent.
    ///
    /// # Errors
    /// Fails when the driver reports a release failure.
    fn close(&mut self) -> Result<(), DriverError>;
}

/// A live driver connection.
#[allow(unused_variables)]
pub trait Connection: Send {
    /// Prepare a parameterizable statement.
    fn prepare(
        &mut self,
        sql: &str,
        options: &StatementOptions,
    ) -> Result<Box<dyn PreparedStatement>, DriverError>;

    /// Prepare a callable (stored-procedure/function) statement.
    fn prepare_call(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement>, DriverError>;

    /// Create a plain statement; binding parameters on it is an error.
    fn create(
        &mut self,
        sql: &str,
        options: &StatementOptions,
    ) -> Result<Box<dyn PreparedStatement>, DriverError>;

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), DriverError>;

    fn set_isolation(&mut self, level: TransactionIsolation) -> Result<(), DriverError>;

    fn commit(&mut self) -> Result<(), DriverError>;

    fn rollback(&mut self) -> Result<(), DriverError>;

    fn savepoint(&mut self, name: &str) -> Result<(), DriverError>;

    fn release_savepoint(&mut self, name: &str) -> Result<(), DriverError>;

    fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), DriverError>;

    /// Whether the driver supports session-scoped large-object allocation.
    fn lob_support(&self) -> bool {
        false
    }

    fn create_lob(&mut self, kind: LobKind, data: Vec<u8>) -> Result<LobHandle, DriverError> {
        Err(DriverError::new("driver does not support large objects"))
    }

    fn read_lob(&mut self, handle: LobHandle) -> Result<Vec<u8>, DriverError> {
        Err(DriverError::new("driver does not support large objects"))
    }

    fn free_lob(&mut self, handle: LobHandle) -> Result<(), DriverError> {
        Err(DriverError::new("driver does not support large objects"))
    }

    /// Whether the driver supports session-scoped array allocation.
    fn array_support(&self) -> bool {
        false
    }

    fn create_array(
        &mut self,
        element_type: SqlType,
        values: Vec<ParamValue>,
    ) -> Result<ArrayHandle, DriverError> {
        Err(DriverError::new("driver does not support array parameters"))
    }

    fn read_array(&mut self, handle: ArrayHandle) -> Result<Vec<ParamValue>, DriverError> {
        Err(DriverError::new("driver does not support array parameters"))
    }

    fn free_array(&mut self, handle: ArrayHandle) -> Result<(), DriverError> {
        Err(DriverError::new("driver does not support array parameters"))
    }

    /// Take ownership of a pending cursor produced as an OUT value.
    fn take_cursor(&mut self, handle: CursorHandle) -> Result<Box<dyn RowCursor>, DriverError> {
        Err(DriverError::new("driver does not support cursor parameters"))
    }

    /// Close the underlying connection.
    fn close(&mut self) -> Result<(), DriverError>;
}

/// Where the transaction coordinator obtains and returns connections.
///
/// Pool integrations live outside this crate; a source may hand out pooled
/// objects or open a fresh connection per request.
pub trait ConnectionSource: Send {
    /// Obtain a live connection.
    ///
    /// # Errors
    /// Fails when no connection can be produced.
    fn connection(&mut self) -> Result<Box<dyn Connection>, DriverError>;

    /// Return a connection once the coordinator is done with it.
    ///
    /// # Errors
    /// Fails when the driver reports a release failure.
    fn release(&mut self, mut conn: Box<dyn Connection>) -> Result<(), DriverError> {
        conn.close()
    }
}
