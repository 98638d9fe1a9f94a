use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::driver::{ArrayHandle, CursorHandle, LobHandle};

/// Values that can be bound as parameters or read back from statement results.
///
/// The same enum is used across backends so handlers and output shaping never
/// branch on driver types:
/// ```rust
/// use sql_runner::prelude::*;
///
/// let params = vec![
///     ParamValue::Int(1),
///     ParamValue::Text("alice".into()),
///     ParamValue::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    Json(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
    /// A list of values bound as a driver array
    Array(Vec<ParamValue>),
    /// Opaque driver array handle produced by input coercion
    ArrayRef(ArrayHandle),
    /// Opaque driver large-object handle produced by input coercion
    Lob(LobHandle),
    /// Opaque driver cursor handle, drained by output coercion
    Cursor(CursorHandle),
    /// Materialized nested row sequence (a drained cursor)
    Rows(Vec<crate::params::QueryParameters>),
}

impl ParamValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let ParamValue::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let ParamValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let ParamValue::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let ParamValue::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // Try "YYYY-MM-DD HH:MM:SS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            // Try "YYYY-MM-DD HH:MM:SS.SSS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S.%3f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let ParamValue::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let ParamValue::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

/// SQL type code assigned to a parameter entry.
///
/// `Other` is the default when a caller does not care about typing; the type
/// coercion strategy only acts on the large-object, array and cursor codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SqlType {
    #[default]
    Other,
    Char,
    VarChar,
    Integer,
    BigInt,
    Numeric,
    Double,
    Boolean,
    Date,
    Time,
    Timestamp,
    Blob,
    Clob,
    SqlXml,
    Array,
    /// A cursor/result-set typed OUT parameter
    ResultSet,
}

/// IN / OUT / INOUT / RETURN classification of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    In,
    Out,
    InOut,
    Return,
}

impl Direction {
    /// True for directions whose value is read back after execution.
    #[must_use]
    pub fn is_out(self) -> bool {
        matches!(self, Direction::Out | Direction::InOut | Direction::Return)
    }

    /// True for directions whose value is bound before execution.
    #[must_use]
    pub fn is_in(self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }
}

/// Transaction isolation levels passed through to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionIsolation {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}
