//! Type coercion strategy: converts values to and from driver-native
//! large-object/array/cursor representations around statement execution.

use crate::driver::{Connection, LobKind};
use crate::error::SqlRunnerError;
use crate::overrides::{OverrideKey, Overrider};
use crate::params::QueryParameters;
use crate::types::{ParamValue, SqlType};

/// Pluggable type-coercion strategy.
///
/// `process_input` runs before binding, `process_output` after execution;
/// both mutate values in place and never change the set's structure.
pub trait TypeHandler: Send + Sync {
    /// Convert inbound native values into driver handles where the entry's
    /// SQL type calls for it; everything else passes through unchanged.
    ///
    /// # Errors
    /// Driver failures during handle allocation.
    fn process_input(
        &self,
        conn: &mut dyn Connection,
        overrides: &mut Overrider,
        params: &mut QueryParameters,
    ) -> Result<(), SqlRunnerError>;

    /// Drain driver handles back into plain values and release them.
    ///
    /// # Errors
    /// Driver failures while reading handles back.
    fn process_output(
        &self,
        conn: &mut dyn Connection,
        overrides: &mut Overrider,
        params: &mut QueryParameters,
    ) -> Result<(), SqlRunnerError>;

    /// Connection-free per-row coercion applied during on-demand lazy
    /// materialization. The base strategy has nothing to do here; vendor
    /// strategies override it for row-level value rewriting.
    ///
    /// # Errors
    /// Strategy-specific coercion failures.
    fn process_output_row(&self, params: &mut QueryParameters) -> Result<(), SqlRunnerError> {
        let _ = params;
        Ok(())
    }

    /// Release driver handles created by `process_input` that were never
    /// consumed. Failures are logged, never raised.
    fn after_execute(&self, conn: &mut dyn Connection, params: &QueryParameters);
}

/// Default coercion strategy for drivers following the generic LOB contract.
///
/// Drivers without LOB support (or callers setting the
/// `DriverLacksLobSupport` override) get plain-value normalization instead
/// of handle allocation, the way LOB-less backends represent BLOB/CLOB as
/// byte arrays and strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseTypeHandler;

fn lob_kind(sql_type: SqlType) -> Option<LobKind> {
    match sql_type {
        SqlType::Blob => Some(LobKind::Blob),
        SqlType::Clob => Some(LobKind::Clob),
        SqlType::SqlXml => Some(LobKind::SqlXml),
        _ => None,
    }
}

fn element_type(values: &[ParamValue]) -> SqlType {
    match values.first() {
        Some(ParamValue::Int(_)) => SqlType::BigInt,
        Some(ParamValue::Float(_)) => SqlType::Double,
        Some(ParamValue::Text(_) | ParamValue::Json(_)) => SqlType::VarChar,
        Some(ParamValue::Bool(_)) => SqlType::Boolean,
        Some(ParamValue::Timestamp(_)) => SqlType::Timestamp,
        Some(ParamValue::Blob(_)) => SqlType::Blob,
        _ => SqlType::Other,
    }
}

fn value_bytes(value: &ParamValue) -> Option<Vec<u8>> {
    match value {
        ParamValue::Blob(bytes) => Some(bytes.clone()),
        ParamValue::Text(s) => Some(s.clone().into_bytes()),
        ParamValue::Json(j) => Some(j.to_string().into_bytes()),
        _ => None,
    }
}

impl TypeHandler for BaseTypeHandler {
    fn process_input(
        &self,
        conn: &mut dyn Connection,
        overrides: &mut Overrider,
        params: &mut QueryParameters,
    ) -> Result<(), SqlRunnerError> {
        let lobs_disabled = overrides.take_bool(OverrideKey::DriverLacksLobSupport, false)
            || !conn.lob_support();
        let names: Vec<String> = params.names().map(str::to_string).collect();
        for name in names {
            let Some(sql_type) = params.get_type(&name) else {
                continue;
            };
            let direction = params.get_direction(&name).unwrap_or_default();
            if !direction.is_in() {
                continue;
            }
            if sql_type == SqlType::Array {
                if !conn.array_support() {
                    continue;
                }
                let Some(ParamValue::Array(values)) = params.get(&name).cloned() else {
                    continue;
                };
                let element = element_type(&values);
                let handle = conn
                    .create_array(element, values)
                    .map_err(SqlRunnerError::Driver)?;
                params.update_value(&name, ParamValue::ArrayRef(handle))?;
                continue;
            }
            let Some(kind) = lob_kind(sql_type) else {
                continue;
            };
            let Some(value) = params.get(&name).cloned() else {
                continue;
            };
            let Some(bytes) = value_bytes(&value) else {
                continue;
            };
            if lobs_disabled {
                // Normalize to the plain representation the type calls for.
                let plain = match kind {
                    LobKind::Blob => ParamValue::Blob(bytes),
                    LobKind::Clob | LobKind::SqlXml => {
                        ParamValue::Text(String::from_utf8_lossy(&bytes).into_owned())
                    }
                };
                params.update_value(&name, plain)?;
            } else {
                let handle = conn
                    .create_lob(kind, bytes)
                    .map_err(SqlRunnerError::Driver)?;
                params.update_value(&name, ParamValue::Lob(handle))?;
            }
        }
        Ok(())
    }

    fn process_output(
        &self,
        conn: &mut dyn Connection,
        _overrides: &mut Overrider,
        params: &mut QueryParameters,
    ) -> Result<(), SqlRunnerError> {
        let names: Vec<String> = params.names().map(str::to_string).collect();
        for name in names {
            let Some(value) = params.get(&name).cloned() else {
                continue;
            };
            match value {
                ParamValue::ArrayRef(handle) => {
                    let values = conn.read_array(handle).map_err(SqlRunnerError::Driver)?;
                    if let Err(e) = conn.free_array(handle) {
                        tracing::warn!("failed to free array after read: {e}");
                    }
                    params.update_value(&name, ParamValue::Array(values))?;
                }
                ParamValue::Lob(handle) => {
                    let bytes = conn.read_lob(handle).map_err(SqlRunnerError::Driver)?;
                    let plain = match handle.kind {
                        LobKind::Blob => ParamValue::Blob(bytes),
                        LobKind::Clob | LobKind::SqlXml => {
                            ParamValue::Text(String::from_utf8_lossy(&bytes).into_owned())
                        }
                    };
                    if let Err(e) = conn.free_lob(handle) {
                        tracing::warn!("failed to free large object after read: {e}");
                    }
                    params.update_value(&name, plain)?;
                }
                ParamValue::Cursor(handle) => {
                    let mut cursor =
                        conn.take_cursor(handle).map_err(SqlRunnerError::Driver)?;
                    let mut rows = Vec::new();
                    let columns: Vec<String> = cursor.columns().to_vec();
                    while let Some(values) = cursor.next_row().map_err(SqlRunnerError::Driver)? {
                        let mut row = QueryParameters::new();
                        for (i, column) in columns.iter().enumerate() {
                            row.set(
                                column.clone(),
                                values.get(i).cloned().unwrap_or(ParamValue::Null),
                            );
                        }
                        rows.push(row);
                    }
                    params.update_value(&name, ParamValue::Rows(rows))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn after_execute(&self, conn: &mut dyn Connection, params: &QueryParameters) {
        for name in params.names() {
            match params.get(name) {
                Some(ParamValue::Lob(handle)) => {
                    if let Err(e) = conn.free_lob(*handle) {
                        tracing::warn!("failed to release unconsumed large object: {e}");
                    }
                }
                Some(ParamValue::ArrayRef(handle)) => {
                    if let Err(e) = conn.free_array(*handle) {
                        tracing::warn!("failed to release unconsumed array: {e}");
                    }
                }
                _ => {}
            }
        }
    }
}
