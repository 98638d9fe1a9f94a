//! Driver-failure classification into the engine's SQL error taxonomy.
//!
//! Classification is an ordered list of pure functions over the driver's
//! (state, code, message) triple: SQLSTATE prefix table first, then the
//! vendor code table, then a generic fallback.

use crate::driver::DriverError;
use crate::error::SqlRunnerError;
use crate::params::QueryParameters;

/// Engine-side classification of a driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlErrorKind {
    BadGrammar,
    IntegrityConstraint,
    DuplicateKey,
    DataAccessResource,
    TransientResource,
    CannotAcquireLock,
    PermissionDenied,
    Timeout,
    Uncategorized,
}

/// Classifies driver failures and enriches them with diagnostics.
pub trait ExceptionTranslator: Send + Sync {
    /// Convert a raw driver failure into the engine's taxonomy, carrying the
    /// original SQL text and the parameter values for diagnostics.
    fn translate(
        &self,
        error: &DriverError,
        sql: &str,
        params: Option<&QueryParameters>,
    ) -> SqlRunnerError;
}

type Classifier = fn(&DriverError) -> Option<SqlErrorKind>;

// Checked in order; first match wins.
const CLASSIFIERS: &[Classifier] = &[classify_by_state, classify_by_vendor_code];

fn classify_by_state(error: &DriverError) -> Option<SqlErrorKind> {
    let state = error.state.as_deref()?;
    // Exact states take precedence over their class prefix.
    match state {
        "23505" => return Some(SqlErrorKind::DuplicateKey),
        "40001" | "40P01" => return Some(SqlErrorKind::CannotAcquireLock),
        "57014" => return Some(SqlErrorKind::Timeout),
        _ => {}
    }
    match state.get(..2)? {
        "07" | "21" | "2A" | "37" | "42" | "65" => Some(SqlErrorKind::BadGrammar),
        "23" | "27" | "44" => Some(SqlErrorKind::IntegrityConstraint),
        "08" | "53" | "54" | "57" | "58" => Some(SqlErrorKind::DataAccessResource),
        "40" => Some(SqlErrorKind::TransientResource),
        "28" => Some(SqlErrorKind::PermissionDenied),
        _ => None,
    }
}

fn classify_by_vendor_code(error: &DriverError) -> Option<SqlErrorKind> {
    // SQLite result codes; extended codes carry the primary in the low byte.
    let code = if error.code > 0xff {
        error.code & 0xff
    } else {
        error.code
    };
    match code {
        1 => Some(SqlErrorKind::BadGrammar),
        5 | 6 => Some(SqlErrorKind::CannotAcquireLock),
        8 | 23 => Some(SqlErrorKind::PermissionDenied),
        14 => Some(SqlErrorKind::DataAccessResource),
        19 => Some(SqlErrorKind::IntegrityConstraint),
        _ => None,
    }
}

/// Run the ordered classifier list; `Uncategorized` when nothing matches.
#[must_use]
pub fn classify(error: &DriverError) -> SqlErrorKind {
    CLASSIFIERS
        .iter()
        .find_map(|classifier| classifier(error))
        .unwrap_or(SqlErrorKind::Uncategorized)
}

/// Default translator: SQLSTATE prefix, then vendor code, then fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateCodeTranslator;

impl ExceptionTranslator for StateCodeTranslator {
    fn translate(
        &self,
        error: &DriverError,
        sql: &str,
        params: Option<&QueryParameters>,
    ) -> SqlRunnerError {
        SqlRunnerError::Sql {
            kind: classify(error),
            state: error.state.clone(),
            code: error.code,
            message: error.message.clone(),
            sql: sql.to_string(),
            params: params.map(render_params).unwrap_or_default(),
        }
    }
}

fn render_params(params: &QueryParameters) -> Vec<String> {
    let mut rendered: Vec<String> = params
        .names()
        .map(|name| format!("{name}={:?}", params.get(name)))
        .collect();
    rendered.sort();
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_prefix_beats_vendor_code() {
        let err = DriverError::new("syntax error").with_state("42601").with_code(19);
        assert_eq!(classify(&err), SqlErrorKind::BadGrammar);
    }

    #[test]
    fn exact_state_beats_prefix() {
        let err = DriverError::new("dup").with_state("23505");
        assert_eq!(classify(&err), SqlErrorKind::DuplicateKey);
        let err = DriverError::new("fk").with_state("23503");
        assert_eq!(classify(&err), SqlErrorKind::IntegrityConstraint);
    }

    #[test]
    fn vendor_code_used_when_state_missing() {
        let err = DriverError::new("constraint failed").with_code(19);
        assert_eq!(classify(&err), SqlErrorKind::IntegrityConstraint);
        // extended codes classify by their primary code
        let err = DriverError::new("UNIQUE constraint failed").with_code(1555);
        assert_eq!(classify(&err), SqlErrorKind::IntegrityConstraint);
        let err = DriverError::new("database is locked").with_code(5);
        assert_eq!(classify(&err), SqlErrorKind::CannotAcquireLock);
    }

    #[test]
    fn unknown_errors_fall_back_to_uncategorized() {
        let err = DriverError::new("weird");
        assert_eq!(classify(&err), SqlErrorKind::Uncategorized);
    }

    #[test]
    fn translation_enriches_with_sql_and_params() {
        use crate::types::ParamValue;

        let mut p = QueryParameters::new();
        p.set("id", ParamValue::Int(2));
        let err = DriverError::new("boom").with_state("42000");
        let translated = StateCodeTranslator.translate(&err, "SELECT 1", Some(&p));
        match translated {
            SqlRunnerError::Sql { kind, sql, params, .. } => {
                assert_eq!(kind, SqlErrorKind::BadGrammar);
                assert_eq!(sql, "SELECT 1");
                assert_eq!(params.len(), 1);
            }
            other => panic!("expected translated error, got {other:?}"),
        }
    }
}
