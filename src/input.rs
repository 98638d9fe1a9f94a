//! Input-producing handlers: anything that yields SQL text plus a parameter
//! set, letting callers hand marshalled beans/maps to the engine.

use crate::params::QueryParameters;

/// Produces one statement's SQL text and parameter set.
pub trait InputHandler: Send + Sync {
    fn query_string(&self) -> &str;

    fn query_parameters(&self) -> &QueryParameters;
}

/// The trivial input handler: a query and its parameters bundled together.
#[derive(Debug, Clone)]
pub struct QueryInput {
    sql: String,
    params: QueryParameters,
}

impl QueryInput {
    pub fn new(sql: impl Into<String>, params: QueryParameters) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn without_params(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: QueryParameters::new(),
        }
    }
}

impl InputHandler for QueryInput {
    fn query_string(&self) -> &str {
        &self.sql
    }

    fn query_parameters(&self) -> &QueryParameters {
        &self.params
    }
}
