//! Parameterized SQL execution engine.
//!
//! This crate drives batch/query/update/call operations against any backend
//! implementing the [`driver`] connectivity contracts. Callers describe
//! parameters with [`params::QueryParameters`], shape results with
//! [`output::OutputHandler`] implementations, and control commit boundaries
//! through the runner's manual/auto transaction mode.
//!
//! ```rust,no_run
//! use sql_runner::prelude::*;
//! use sql_runner::sqlite::SqliteSource;
//!
//! fn demo() -> Result<(), SqlRunnerError> {
//!     let mut runner = QueryRunner::new(Box::new(SqliteSource::new("app.db")));
//!     runner.batch_sql("CREATE TABLE students (id INTEGER PRIMARY KEY, name TEXT)")?;
//!
//!     let mut p = QueryParameters::new();
//!     p.set("name", ParamValue::Text("alice".into()));
//!     let inserted = runner.update(
//!         "INSERT INTO students (name) VALUES (?)",
//!         &RowCountHandler,
//!         &p,
//!     )?;
//!     assert_eq!(inserted, 1);
//!     Ok(())
//! }
//! ```

pub mod async_runner;
pub mod driver;
pub mod error;
pub mod input;
pub mod metadata;
pub mod output;
pub mod overrides;
pub mod params;
pub mod prelude;
pub mod rows;
pub mod runner;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod statement_handler;
pub mod transaction;
pub mod translate;
pub mod type_handler;
pub mod types;

pub use error::SqlRunnerError;
pub use params::QueryParameters;
pub use runner::{QueryRunner, RunnerConfig};
pub use types::{Direction, ParamValue, SqlType};
