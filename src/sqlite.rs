//! `SQLite` backend over rusqlite.
//!
//! SQLite has no stored procedures, OUT parameters, scrollable cursors or
//! session LOB handles; those surface as driver errors. Everything else
//! (batches, queries, DML with generated keys, savepoints) maps directly.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::types::Value;

use crate::driver::{
    Concurrency, Connection, ConnectionSource, CursorMode, DriverError, ExecResult,
    GeneratedKeys, PreparedStatement, RowCursor, StatementOptions,
};
use crate::types::{ParamValue, SqlType, TransactionIsolation};

/// Opens one rusqlite connection per request against a fixed path.
///
/// Pooling is the caller's concern; wrap this source (or replace it) to hand
/// out pooled connections instead.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    path: String,
}

impl SqliteSource {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl ConnectionSource for SqliteSource {
    fn connection(&mut self) -> Result<Box<dyn Connection>, DriverError> {
        let conn = rusqlite::Connection::open(&self.path).map_err(|e| from_rusqlite(&e))?;
        Ok(Box::new(SqliteConnection {
            inner: Arc::new(Mutex::new(conn)),
            in_tx: false,
        }))
    }
}

fn from_rusqlite(error: &rusqlite::Error) -> DriverError {
    let code = match error {
        rusqlite::Error::SqliteFailure(failure, _) => failure.extended_code,
        _ => 0,
    };
    DriverError::new(error.to_string()).with_code(code)
}

fn lock_conn(inner: &Arc<Mutex<rusqlite::Connection>>) -> MutexGuard<'_, rusqlite::Connection> {
    match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn to_sqlite(value: &ParamValue) -> Result<Value, DriverError> {
    match value {
        ParamValue::Int(i) => Ok(Value::Integer(*i)),
        ParamValue::Float(f) => Ok(Value::Real(*f)),
        ParamValue::Text(s) => Ok(Value::Text(s.clone())),
        ParamValue::Bool(b) => Ok(Value::Integer(i64::from(*b))),
        ParamValue::Timestamp(dt) => Ok(Value::Text(dt.format("%F %T%.f").to_string())),
        ParamValue::Null => Ok(Value::Null),
        ParamValue::Json(j) => Ok(Value::Text(j.to_string())),
        ParamValue::Blob(bytes) => Ok(Value::Blob(bytes.clone())),
        other => Err(DriverError::new(format!(
            "value {other:?} has no SQLite representation"
        ))),
    }
}

fn from_sqlite(value: Value) -> ParamValue {
    match value {
        Value::Null => ParamValue::Null,
        Value::Integer(i) => ParamValue::Int(i),
        Value::Real(f) => ParamValue::Float(f),
        Value::Text(s) => ParamValue::Text(s),
        Value::Blob(b) => ParamValue::Blob(b),
    }
}

fn check_savepoint_name(name: &str) -> Result<(), DriverError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(DriverError::new(format!("invalid savepoint name {name:?}")))
    }
}

fn check_options(options: &StatementOptions) -> Result<(), DriverError> {
    if matches!(options.cursor, CursorMode::Scroll { .. }) {
        return Err(DriverError::new(
            "SQLite does not support scrollable cursors",
        ));
    }
    if options.concurrency == Concurrency::Updatable {
        return Err(DriverError::new(
            "SQLite does not support updatable result sets",
        ));
    }
    if matches!(options.generated_keys, GeneratedKeys::Columns(_)) {
        return Err(DriverError::new(
            "SQLite only reports the last inserted rowid, not named key columns",
        ));
    }
    Ok(())
}

struct SqliteConnection {
    inner: Arc<Mutex<rusqlite::Connection>>,
    in_tx: bool,
}

impl SqliteConnection {
    fn run(&mut self, sql: &str) -> Result<(), DriverError> {
        lock_conn(&self.inner)
            .execute_batch(sql)
            .map_err(|e| from_rusqlite(&e))
    }
}

impl Connection for SqliteConnection {
    fn prepare(
        &mut self,
        sql: &str,
        options: &StatementOptions,
    ) -> Result<Box<dyn PreparedStatement>, DriverError> {
        check_options(options)?;
        Ok(Box::new(SqliteStatement {
            conn: Arc::clone(&self.inner),
            sql: sql.to_owned(),
            plain: false,
            wants_keys: options.generated_keys == GeneratedKeys::Returned,
            binds: Vec::new(),
            batch: Vec::new(),
            last_insert: None,
        }))
    }

    fn prepare_call(&mut self, _sql: &str) -> Result<Box<dyn PreparedStatement>, DriverError> {
        Err(DriverError::new(
            "SQLite does not support stored procedures",
        ))
    }

    fn create(
        &mut self,
        sql: &str,
        options: &StatementOptions,
    ) -> Result<Box<dyn PreparedStatement>, DriverError> {
        check_options(options)?;
        Ok(Box::new(SqliteStatement {
            conn: Arc::clone(&self.inner),
            sql: sql.to_owned(),
            plain: true,
            wants_keys: options.generated_keys == GeneratedKeys::Returned,
            binds: Vec::new(),
            batch: Vec::new(),
            last_insert: None,
        }))
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<(), DriverError> {
        if auto_commit {
            if self.in_tx {
                self.run("COMMIT")?;
                self.in_tx = false;
            }
        } else if !self.in_tx {
            self.run("BEGIN DEFERRED")?;
            self.in_tx = true;
        }
        Ok(())
    }

    fn set_isolation(&mut self, level: TransactionIsolation) -> Result<(), DriverError> {
        // SQLite is serializable; read-uncommitted is the only other mode.
        let flag = match level {
            TransactionIsolation::ReadUncommitted => "ON",
            _ => "OFF",
        };
        self.run(&format!("PRAGMA read_uncommitted = {flag}"))
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        if self.in_tx {
            self.run("COMMIT")?;
            self.run("BEGIN DEFERRED")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        if self.in_tx {
            self.run("ROLLBACK")?;
            self.run("BEGIN DEFERRED")?;
        }
        Ok(())
    }

    fn savepoint(&mut self, name: &str) -> Result<(), DriverError> {
        check_savepoint_name(name)?;
        self.run(&format!("SAVEPOINT {name}"))
    }

    fn release_savepoint(&mut self, name: &str) -> Result<(), DriverError> {
        check_savepoint_name(name)?;
        self.run(&format!("RELEASE SAVEPOINT {name}"))
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), DriverError> {
        check_savepoint_name(name)?;
        self.run(&format!("ROLLBACK TO SAVEPOINT {name}"))
    }

    fn close(&mut self) -> Result<(), DriverError> {
        // An open transaction rolls back when the handle drops.
        self.in_tx = false;
        Ok(())
    }
}

struct SqliteStatement {
    conn: Arc<Mutex<rusqlite::Connection>>,
    sql: String,
    plain: bool,
    wants_keys: bool,
    binds: Vec<Value>,
    batch: Vec<Vec<Value>>,
    last_insert: Option<i64>,
}

impl SqliteStatement {
    fn bind_slot(&mut self, index: usize) -> &mut Value {
        if self.binds.len() <= index {
            self.binds.resize(index + 1, Value::Null);
        }
        &mut self.binds[index]
    }
}

impl PreparedStatement for SqliteStatement {
    fn bind(&mut self, index: usize, value: ParamValue) -> Result<(), DriverError> {
        if self.plain {
            return Err(DriverError::new(
                "plain statements do not accept parameters",
            ));
        }
        *self.bind_slot(index) = to_sqlite(&value)?;
        Ok(())
    }

    fn register_out(&mut self, _index: usize, _sql_type: SqlType) -> Result<(), DriverError> {
        Err(DriverError::new("SQLite does not support OUT parameters"))
    }

    fn add_batch(&mut self) -> Result<(), DriverError> {
        self.batch.push(std::mem::take(&mut self.binds));
        Ok(())
    }

    fn execute_batch(&mut self) -> Result<Vec<i64>, DriverError> {
        let units = std::mem::take(&mut self.batch);
        let guard = lock_conn(&self.conn);
        let mut stmt = guard.prepare(&self.sql).map_err(|e| from_rusqlite(&e))?;
        let mut counts = Vec::with_capacity(units.len());
        for unit in units {
            let count = stmt
                .execute(rusqlite::params_from_iter(unit.iter()))
                .map_err(|e| from_rusqlite(&e))?;
            counts.push(count as i64);
        }
        Ok(counts)
    }

    fn execute(&mut self) -> Result<ExecResult, DriverError> {
        let binds = std::mem::take(&mut self.binds);
        let guard = lock_conn(&self.conn);

        let mut stmt = guard.prepare(&self.sql).map_err(|e| from_rusqlite(&e))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| (*c).to_owned()).collect();
        let column_count = columns.len();

        if column_count > 0 {
            let mut rows = stmt
                .query(rusqlite::params_from_iter(binds.iter()))
                .map_err(|e| from_rusqlite(&e))?;
            let mut data = Vec::new();
            while let Some(row) = rows.next().map_err(|e| from_rusqlite(&e))? {
                let mut record = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    let value: Value = row.get(i).map_err(|e| from_rusqlite(&e))?;
                    record.push(from_sqlite(value));
                }
                data.push(record);
            }
            return Ok(ExecResult {
                update_count: None,
                rows: Some(Box::new(SqliteRows {
                    columns,
                    data: data.into_iter(),
                })),
            });
        }

        // Column-less plain statements may be multi-statement scripts;
        // rusqlite's prepare stops at the first one, so run them as a batch.
        if self.plain {
            drop(stmt);
            guard
                .execute_batch(&self.sql)
                .map_err(|e| from_rusqlite(&e))?;
            if self.wants_keys {
                self.last_insert = Some(guard.last_insert_rowid());
            }
            return Ok(ExecResult {
                update_count: Some(guard.changes() as i64),
                rows: None,
            });
        }

        let count = stmt
            .execute(rusqlite::params_from_iter(binds.iter()))
            .map_err(|e| from_rusqlite(&e))?;
        if self.wants_keys {
            self.last_insert = Some(guard.last_insert_rowid());
        }
        Ok(ExecResult {
            update_count: Some(count as i64),
            rows: None,
        })
    }

    fn generated_keys(&mut self) -> Result<Option<Box<dyn RowCursor>>, DriverError> {
        let Some(rowid) = self.last_insert else {
            return Ok(None);
        };
        Ok(Some(Box::new(SqliteRows {
            columns: vec!["last_insert_rowid".to_owned()],
            data: vec![vec![ParamValue::Int(rowid)]].into_iter(),
        })))
    }

    fn out_value(&mut self, _index: usize) -> Result<ParamValue, DriverError> {
        Err(DriverError::new("SQLite does not support OUT parameters"))
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.binds.clear();
        self.batch.clear();
        Ok(())
    }
}

struct SqliteRows {
    columns: Vec<String>,
    data: std::vec::IntoIter<Vec<ParamValue>>,
}

impl RowCursor for SqliteRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<ParamValue>>, DriverError> {
        Ok(self.data.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn timestamps_render_in_sqlite_text_format() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(8, 30, 15, 250)
            .unwrap();
        let value = to_sqlite(&ParamValue::Timestamp(dt)).unwrap();
        assert_eq!(value, Value::Text("2024-03-01 08:30:15.250".to_string()));
    }

    #[test]
    fn handles_and_arrays_are_rejected() {
        assert!(to_sqlite(&ParamValue::Array(vec![ParamValue::Int(1)])).is_err());
    }

    #[test]
    fn savepoint_names_are_validated() {
        assert!(check_savepoint_name("sp_1").is_ok());
        assert!(check_savepoint_name("sp 1; DROP TABLE x").is_err());
        assert!(check_savepoint_name("").is_err());
    }
}
