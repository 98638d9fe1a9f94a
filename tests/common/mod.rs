//! In-memory mock driver used by the lifecycle, call and lazy-view tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sql_runner::driver::{
    ArrayHandle, Connection, ConnectionSource, CursorHandle, DriverError, ExecResult, LobHandle,
    LobKind, PreparedStatement, RowCursor, StatementOptions, SUCCESS_NO_INFO,
};
use sql_runner::types::{ParamValue, SqlType, TransactionIsolation};

/// Observable side effects, shared across everything the source hands out.
#[derive(Debug, Default)]
pub struct Counters {
    pub connections: usize,
    pub releases: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub statement_closes: usize,
    pub last_call_sql: Option<String>,
    pub freed_lobs: usize,
    pub freed_arrays: usize,
}

/// Scripted behavior for statements produced by the mock.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub fail_execute: Option<DriverError>,
    pub fail_commit: Option<DriverError>,
    /// Result rows served by `execute` (columns, then data rows).
    pub rows: Option<(Vec<String>, Vec<Vec<ParamValue>>)>,
    pub update_count: Option<i64>,
    pub out_values: HashMap<usize, ParamValue>,
    pub generated_rowid: Option<i64>,
    pub lob_support: bool,
    pub array_support: bool,
    /// Report batch units as "succeeded, count unknown".
    pub batch_counts_unknown: bool,
}

pub struct MockSource {
    pub counters: Arc<Mutex<Counters>>,
    pub script: Script,
}

impl MockSource {
    pub fn new(script: Script) -> (Self, Arc<Mutex<Counters>>) {
        let counters = Arc::new(Mutex::new(Counters::default()));
        (
            Self {
                counters: Arc::clone(&counters),
                script,
            },
            counters,
        )
    }
}

impl ConnectionSource for MockSource {
    fn connection(&mut self) -> Result<Box<dyn Connection>, DriverError> {
        self.counters.lock().unwrap().connections += 1;
        Ok(Box::new(MockConnection {
            counters: Arc::clone(&self.counters),
            script: self.script.clone(),
            lobs: HashMap::new(),
            next_lob: 1,
            arrays: HashMap::new(),
            next_array: 1,
        }))
    }

    fn release(&mut self, mut conn: Box<dyn Connection>) -> Result<(), DriverError> {
        self.counters.lock().unwrap().releases += 1;
        conn.close()
    }
}

pub struct MockConnection {
    counters: Arc<Mutex<Counters>>,
    script: Script,
    lobs: HashMap<u64, Vec<u8>>,
    next_lob: u64,
    arrays: HashMap<u64, Vec<ParamValue>>,
    next_array: u64,
}

impl MockConnection {
    fn statement(&self) -> Box<dyn PreparedStatement> {
        Box::new(MockStatement {
            counters: Arc::clone(&self.counters),
            script: self.script.clone(),
            binds: HashMap::new(),
            registered: Vec::new(),
            batched: 0,
            executed: false,
        })
    }
}

impl Connection for MockConnection {
    fn prepare(
        &mut self,
        _sql: &str,
        _options: &StatementOptions,
    ) -> Result<Box<dyn PreparedStatement>, DriverError> {
        Ok(self.statement())
    }

    fn prepare_call(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement>, DriverError> {
        self.counters.lock().unwrap().last_call_sql = Some(sql.to_owned());
        Ok(self.statement())
    }

    fn create(
        &mut self,
        _sql: &str,
        _options: &StatementOptions,
    ) -> Result<Box<dyn PreparedStatement>, DriverError> {
        Ok(self.statement())
    }

    fn set_auto_commit(&mut self, _auto_commit: bool) -> Result<(), DriverError> {
        Ok(())
    }

    fn set_isolation(&mut self, _level: TransactionIsolation) -> Result<(), DriverError> {
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        if let Some(error) = self.script.fail_commit.clone() {
            return Err(error);
        }
        self.counters.lock().unwrap().commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.counters.lock().unwrap().rollbacks += 1;
        Ok(())
    }

    fn savepoint(&mut self, _name: &str) -> Result<(), DriverError> {
        Ok(())
    }

    fn release_savepoint(&mut self, _name: &str) -> Result<(), DriverError> {
        Ok(())
    }

    fn rollback_to_savepoint(&mut self, _name: &str) -> Result<(), DriverError> {
        Ok(())
    }

    fn lob_support(&self) -> bool {
        self.script.lob_support
    }

    fn create_lob(&mut self, kind: LobKind, data: Vec<u8>) -> Result<LobHandle, DriverError> {
        if !self.script.lob_support {
            return Err(DriverError::new("no lob support"));
        }
        let id = self.next_lob;
        self.next_lob += 1;
        self.lobs.insert(id, data);
        Ok(LobHandle { id, kind })
    }

    fn read_lob(&mut self, handle: LobHandle) -> Result<Vec<u8>, DriverError> {
        self.lobs
            .get(&handle.id)
            .cloned()
            .ok_or_else(|| DriverError::new("unknown lob"))
    }

    fn free_lob(&mut self, handle: LobHandle) -> Result<(), DriverError> {
        self.counters.lock().unwrap().freed_lobs += 1;
        self.lobs.remove(&handle.id);
        Ok(())
    }

    fn array_support(&self) -> bool {
        self.script.array_support
    }

    fn create_array(
        &mut self,
        _element_type: SqlType,
        values: Vec<ParamValue>,
    ) -> Result<ArrayHandle, DriverError> {
        if !self.script.array_support {
            return Err(DriverError::new("no array support"));
        }
        let id = self.next_array;
        self.next_array += 1;
        self.arrays.insert(id, values);
        Ok(ArrayHandle { id })
    }

    fn read_array(&mut self, handle: ArrayHandle) -> Result<Vec<ParamValue>, DriverError> {
        self.arrays
            .get(&handle.id)
            .cloned()
            .ok_or_else(|| DriverError::new("unknown array"))
    }

    fn free_array(&mut self, handle: ArrayHandle) -> Result<(), DriverError> {
        self.counters.lock().unwrap().freed_arrays += 1;
        self.arrays.remove(&handle.id);
        Ok(())
    }

    fn take_cursor(&mut self, _handle: CursorHandle) -> Result<Box<dyn RowCursor>, DriverError> {
        Err(DriverError::new("no cursor support"))
    }

    fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

pub struct MockStatement {
    counters: Arc<Mutex<Counters>>,
    script: Script,
    pub binds: HashMap<usize, ParamValue>,
    pub registered: Vec<usize>,
    batched: usize,
    executed: bool,
}

impl PreparedStatement for MockStatement {
    fn bind(&mut self, index: usize, value: ParamValue) -> Result<(), DriverError> {
        self.binds.insert(index, value);
        Ok(())
    }

    fn register_out(&mut self, index: usize, _sql_type: SqlType) -> Result<(), DriverError> {
        self.registered.push(index);
        Ok(())
    }

    fn add_batch(&mut self) -> Result<(), DriverError> {
        self.batched += 1;
        self.binds.clear();
        Ok(())
    }

    fn execute_batch(&mut self) -> Result<Vec<i64>, DriverError> {
        if let Some(error) = self.script.fail_execute.clone() {
            return Err(error);
        }
        if self.script.batch_counts_unknown {
            return Ok(vec![SUCCESS_NO_INFO; self.batched]);
        }
        Ok(vec![1; self.batched])
    }

    fn execute(&mut self) -> Result<ExecResult, DriverError> {
        if let Some(error) = self.script.fail_execute.clone() {
            return Err(error);
        }
        self.executed = true;
        let rows = self.script.rows.clone().map(|(columns, data)| {
            Box::new(MockCursor {
                columns,
                data: data.into_iter(),
            }) as Box<dyn RowCursor>
        });
        Ok(ExecResult {
            update_count: self.script.update_count,
            rows,
        })
    }

    fn generated_keys(&mut self) -> Result<Option<Box<dyn RowCursor>>, DriverError> {
        Ok(self.script.generated_rowid.map(|rowid| {
            Box::new(MockCursor {
                columns: vec!["id".to_owned()],
                data: vec![vec![ParamValue::Int(rowid)]].into_iter(),
            }) as Box<dyn RowCursor>
        }))
    }

    fn out_value(&mut self, index: usize) -> Result<ParamValue, DriverError> {
        if !self.executed {
            return Err(DriverError::new("statement has not run"));
        }
        self.script
            .out_values
            .get(&index)
            .cloned()
            .ok_or_else(|| DriverError::new(format!("no OUT value at {index}")))
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.counters.lock().unwrap().statement_closes += 1;
        Ok(())
    }
}

pub struct MockCursor {
    columns: Vec<String>,
    data: std::vec::IntoIter<Vec<ParamValue>>,
}

impl RowCursor for MockCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<ParamValue>>, DriverError> {
        Ok(self.data.next())
    }
}
