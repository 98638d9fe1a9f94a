//! Common imports, re-exported in one place.

pub use crate::async_runner::{AsyncQueryRunner, AsyncSqlExecutor};
pub use crate::driver::{
    Connection, ConnectionSource, DriverError, ExecResult, PreparedStatement, RowCursor,
    StatementOptions,
};
pub use crate::error::SqlRunnerError;
pub use crate::input::{InputHandler, QueryInput};
pub use crate::metadata::{CallInput, CachedMetadataHandler, MetadataHandler, ParamDescriptor};
pub use crate::output::{
    LazyRowsHandler, MapHandler, OutputHandler, OutputKind, RowCountHandler, RowsHandler,
    ScalarHandler,
};
pub use crate::overrides::{OverrideKey, OverrideValue, Overrider};
pub use crate::params::QueryParameters;
pub use crate::rows::{LazyKind, LazyRows, RowSequence};
pub use crate::runner::{CallResult, QueryRunner, RunnerConfig};
pub use crate::statement_handler::{
    BaseStatementHandler, LazyStatementHandler, StatementHandler,
};
pub use crate::translate::{ExceptionTranslator, SqlErrorKind, StateCodeTranslator};
pub use crate::type_handler::{BaseTypeHandler, TypeHandler};
pub use crate::types::{Direction, ParamValue, SqlType, TransactionIsolation};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteSource;
