//! Stored-procedure metadata lookup and named-call resolution.
//!
//! The lookup itself is an external collaborator (dialect-specific). This
//! module carries the contract, an optional caching wrapper, and the logic
//! that turns a caller's named input into a positional call parameter set.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::driver::Connection;
use crate::error::SqlRunnerError;
use crate::params::QueryParameters;
use crate::types::{Direction, ParamValue, SqlType};

/// One stored-procedure parameter as described by database metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: String,
    pub sql_type: SqlType,
    pub direction: Direction,
}

/// Synchronous stored-procedure parameter lookup.
pub trait MetadataHandler: Send + Sync {
    /// Ordered parameter descriptors for the named procedure.
    ///
    /// # Errors
    /// Lookup failures, or `Unimplemented` when the backend has no
    /// procedure metadata.
    fn procedure_parameters(
        &self,
        conn: &mut dyn Connection,
        catalog: Option<&str>,
        schema: Option<&str>,
        procedure: &str,
        use_cache: bool,
    ) -> Result<Vec<ParamDescriptor>, SqlRunnerError>;
}

/// Placeholder lookup for backends without stored procedures.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadataHandler;

impl MetadataHandler for NoMetadataHandler {
    fn procedure_parameters(
        &self,
        _conn: &mut dyn Connection,
        _catalog: Option<&str>,
        _schema: Option<&str>,
        procedure: &str,
        _use_cache: bool,
    ) -> Result<Vec<ParamDescriptor>, SqlRunnerError> {
        Err(SqlRunnerError::Unimplemented(format!(
            "no metadata lookup available for procedure {procedure}"
        )))
    }
}

/// Caching wrapper around any metadata lookup, keyed by the qualified
/// procedure name. Consulted only when the caller passes `use_cache`.
pub struct CachedMetadataHandler<H> {
    inner: H,
    cache: Mutex<HashMap<String, Vec<ParamDescriptor>>>,
}

impl<H> CachedMetadataHandler<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl<H: MetadataHandler> MetadataHandler for CachedMetadataHandler<H> {
    fn procedure_parameters(
        &self,
        conn: &mut dyn Connection,
        catalog: Option<&str>,
        schema: Option<&str>,
        procedure: &str,
        use_cache: bool,
    ) -> Result<Vec<ParamDescriptor>, SqlRunnerError> {
        let key = format!(
            "{}.{}.{procedure}",
            catalog.unwrap_or_default(),
            schema.unwrap_or_default()
        );
        if use_cache {
            let cache = match self.cache.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(descriptors) = cache.get(&key) {
                return Ok(descriptors.clone());
            }
        }
        let descriptors =
            self.inner
                .procedure_parameters(conn, catalog, schema, procedure, use_cache)?;
        if use_cache {
            let mut cache = match self.cache.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            cache.insert(key, descriptors.clone());
        }
        Ok(descriptors)
    }
}

/// Caller-facing description of a stored-procedure invocation.
#[derive(Debug, Clone)]
pub struct CallInput {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub procedure: String,
    /// Named inputs resolved against metadata, or an already-positional set.
    pub params: QueryParameters,
    /// Whether `params` is named (requires metadata resolution).
    pub named: bool,
    /// Whether the metadata lookup may serve from its cache.
    pub use_cache: bool,
}

impl CallInput {
    /// Named invocation: parameter order/types/directions come from metadata.
    #[must_use]
    pub fn named(procedure: impl Into<String>, params: QueryParameters) -> Self {
        Self {
            catalog: None,
            schema: None,
            procedure: procedure.into(),
            params,
            named: true,
            use_cache: true,
        }
    }

    /// Positional invocation: the caller supplies a fully ordered set.
    #[must_use]
    pub fn positional(procedure: impl Into<String>, params: QueryParameters) -> Self {
        Self {
            catalog: None,
            schema: None,
            procedure: procedure.into(),
            params,
            named: false,
            use_cache: false,
        }
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// Build the call escape string for a procedure with `param_count` markers,
/// e.g. `{call my_proc(?, ?)}`.
#[must_use]
pub fn build_call_string(procedure: &str, param_count: usize) -> String {
    let markers = vec!["?"; param_count].join(", ");
    format!("{{call {procedure}({markers})}}")
}

/// Resolve a named input against metadata descriptors into a positional set.
///
/// Count reconciliation: when the metadata reports exactly one more
/// parameter than the caller supplied and that extra descriptor is
/// RETURN-directioned, it is dropped — callers conventionally omit the
/// implicit return. This deliberately assumes the omitted parameter is the
/// return, never some other trailing OUT parameter. Any other mismatch is a
/// configuration error (skipped when `enforce_count` is off).
pub fn resolve_named(
    mut descriptors: Vec<ParamDescriptor>,
    supplied: &QueryParameters,
    enforce_count: bool,
) -> Result<QueryParameters, SqlRunnerError> {
    if enforce_count && descriptors.len() != supplied.len() {
        if descriptors.len() == supplied.len() + 1 {
            let return_slot = descriptors
                .iter()
                .position(|d| d.direction == Direction::Return);
            match return_slot {
                Some(slot) => {
                    descriptors.remove(slot);
                }
                None => {
                    return Err(SqlRunnerError::ConfigError(format!(
                        "procedure expects {} parameters but {} were supplied",
                        descriptors.len(),
                        supplied.len()
                    )));
                }
            }
        } else {
            return Err(SqlRunnerError::ConfigError(format!(
                "procedure expects {} parameters but {} were supplied",
                descriptors.len(),
                supplied.len()
            )));
        }
    }

    let mut resolved = QueryParameters::new();
    for (position, descriptor) in descriptors.iter().enumerate() {
        // OUT-only parameters may legitimately be unsupplied.
        let value = supplied
            .get(&descriptor.name)
            .cloned()
            .unwrap_or(ParamValue::Null);
        resolved.set_at(
            descriptor.name.clone(),
            value,
            descriptor.sql_type,
            descriptor.direction,
            position,
        );
    }
    Ok(resolved)
}
