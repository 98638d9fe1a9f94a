//! Transaction coordinator: owns the live connection, the manual/auto-commit
//! flag, and the isolation setting.

use crate::driver::{Connection, ConnectionSource};
use crate::error::SqlRunnerError;
use crate::types::TransactionIsolation;

/// Owns at most one live connection at a time.
///
/// A connection is acquired lazily on first use within a call. In auto mode
/// it is released at the end of that call's cleanup phase; in manual mode it
/// persists across calls until the caller commits or rolls back.
pub struct TransactionHandler {
    source: Box<dyn ConnectionSource>,
    conn: Option<Box<dyn Connection>>,
    manual: bool,
    isolation: Option<TransactionIsolation>,
}

impl TransactionHandler {
    #[must_use]
    pub fn new(source: Box<dyn ConnectionSource>) -> Self {
        Self {
            source,
            conn: None,
            manual: false,
            isolation: None,
        }
    }

    #[must_use]
    pub fn manual_mode(&self) -> bool {
        self.manual
    }

    /// Switch between manual and auto-commit mode.
    ///
    /// The driver connection stays in non-auto-commit either way; the flag
    /// only decides who calls commit (the engine per call, or the caller per
    /// unit of work).
    pub fn set_manual_mode(&mut self, manual: bool) {
        self.manual = manual;
    }

    /// Set the isolation level applied when the next connection is acquired
    /// (and immediately on a live connection).
    ///
    /// # Errors
    /// Driver failure while applying the level to a live connection.
    pub fn set_isolation(
        &mut self,
        level: TransactionIsolation,
    ) -> Result<(), SqlRunnerError> {
        self.isolation = Some(level);
        if let Some(conn) = self.conn.as_mut() {
            conn.set_isolation(level).map_err(SqlRunnerError::Driver)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn has_connection(&self) -> bool {
        self.conn.is_some()
    }

    /// The live connection, acquiring one from the source if needed.
    ///
    /// # Errors
    /// Driver failure while acquiring or configuring the connection.
    pub fn connection(&mut self) -> Result<&mut (dyn Connection + 'static), SqlRunnerError> {
        if self.conn.is_none() {
            let mut conn = self.source.connection().map_err(SqlRunnerError::Driver)?;
            conn.set_auto_commit(false).map_err(SqlRunnerError::Driver)?;
            if let Some(level) = self.isolation {
                conn.set_isolation(level).map_err(SqlRunnerError::Driver)?;
            }
            self.conn = Some(conn);
        }
        match self.conn.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(SqlRunnerError::ExecutionError(
                "connection acquisition failed".to_string(),
            )),
        }
    }

    /// Commit the open transaction. No-op when no connection is live.
    /// In manual mode this ends the unit of work and releases the connection.
    ///
    /// # Errors
    /// Driver failure during commit.
    pub fn commit(&mut self) -> Result<(), SqlRunnerError> {
        if let Some(conn) = self.conn.as_mut() {
            conn.commit().map_err(SqlRunnerError::Driver)?;
            if self.manual {
                self.release()?;
            }
        }
        Ok(())
    }

    /// Roll the open transaction back. No-op when no connection is live.
    /// In manual mode this ends the unit of work and releases the connection.
    ///
    /// # Errors
    /// Driver failure during rollback.
    pub fn rollback(&mut self) -> Result<(), SqlRunnerError> {
        if let Some(conn) = self.conn.as_mut() {
            conn.rollback().map_err(SqlRunnerError::Driver)?;
            if self.manual {
                self.release()?;
            }
        }
        Ok(())
    }

    /// Create a named savepoint on the live connection.
    ///
    /// # Errors
    /// `ExecutionError` when no connection is live, or a driver failure.
    pub fn savepoint(&mut self, name: &str) -> Result<(), SqlRunnerError> {
        self.live()?.savepoint(name).map_err(SqlRunnerError::Driver)
    }

    /// Release a named savepoint.
    ///
    /// # Errors
    /// `ExecutionError` when no connection is live, or a driver failure.
    pub fn release_savepoint(&mut self, name: &str) -> Result<(), SqlRunnerError> {
        self.live()?
            .release_savepoint(name)
            .map_err(SqlRunnerError::Driver)
    }

    /// Roll back to a named savepoint.
    ///
    /// # Errors
    /// `ExecutionError` when no connection is live, or a driver failure.
    pub fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), SqlRunnerError> {
        self.live()?
            .rollback_to_savepoint(name)
            .map_err(SqlRunnerError::Driver)
    }

    fn live(&mut self) -> Result<&mut (dyn Connection + 'static), SqlRunnerError> {
        self.conn.as_deref_mut().ok_or_else(|| {
            SqlRunnerError::ExecutionError("no active connection".to_string())
        })
    }

    /// End-of-call connection release. Keeps the connection in manual mode;
    /// otherwise returns it to the source.
    ///
    /// # Errors
    /// Driver failure while releasing.
    pub fn close_connection(&mut self) -> Result<(), SqlRunnerError> {
        if self.manual {
            return Ok(());
        }
        self.release()
    }

    fn release(&mut self) -> Result<(), SqlRunnerError> {
        if let Some(conn) = self.conn.take() {
            self.source.release(conn).map_err(SqlRunnerError::Driver)?;
        }
        Ok(())
    }

    /// Unconditionally return the connection to the source, regardless of
    /// mode. Used on engine teardown.
    ///
    /// # Errors
    /// Driver failure while releasing.
    pub fn force_release(&mut self) -> Result<(), SqlRunnerError> {
        self.release()
    }
}
