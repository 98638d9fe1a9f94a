//! The Parameter Set: an ordered, named, typed, directioned bag of values.

use std::collections::HashMap;

use crate::error::SqlRunnerError;
use crate::types::{Direction, ParamValue, SqlType};

/// Reserved key transporting a call's aggregate return/output payload.
///
/// Excluded from normal iteration by convention; see
/// [`QueryParameters::remove_return`].
pub const RETURN_KEY: &str = "return_value";

/// Ordered/named/typed/directioned bag of call values.
///
/// Key lookup is case-insensitive unless switched at construction. Every
/// positioned entry occupies a slot in a dense zero-based order list; a key
/// may occupy several slots (repeated placeholder use).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryParameters {
    values: HashMap<String, ParamValue>,
    types: HashMap<String, SqlType>,
    directions: HashMap<String, Direction>,
    order: Vec<Option<String>>,
    case_sensitive: bool,
}

impl QueryParameters {
    /// New empty, case-insensitive parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// New empty set with explicit key case-sensitivity.
    #[must_use]
    pub fn with_case_sensitivity(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            ..Self::default()
        }
    }

    /// Build a positional set from an array of values.
    ///
    /// Entries are named `param0`, `param1`, ... and positioned in order.
    #[must_use]
    pub fn from_values(values: &[ParamValue]) -> Self {
        let mut params = Self::new();
        for (i, value) in values.iter().enumerate() {
            params.set(format!("param{i}"), value.clone());
        }
        params
    }

    /// Build a set from name/value pairs, positioned in iteration order.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: Into<String>,
    {
        let mut params = Self::new();
        for (name, value) in pairs {
            params.set(name, value);
        }
        params
    }

    fn key(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    /// Upsert a value with default type (`Other`) and direction (`In`).
    ///
    /// A new key is appended at the current end of the order list.
    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) {
        self.set_full(name, value, SqlType::Other, Direction::In);
    }

    /// Upsert a value with an explicit SQL type.
    pub fn set_typed(&mut self, name: impl Into<String>, value: ParamValue, sql_type: SqlType) {
        self.set_full(name, value, sql_type, Direction::In);
    }

    /// Upsert value, type and direction; appends a new key to the order list.
    pub fn set_full(
        &mut self,
        name: impl Into<String>,
        value: ParamValue,
        sql_type: SqlType,
        direction: Direction,
    ) {
        let key = self.key(&name.into());
        if !self.values.contains_key(&key) {
            self.order.push(Some(key.clone()));
        }
        self.values.insert(key.clone(), value);
        self.types.insert(key.clone(), sql_type);
        self.directions.insert(key, direction);
    }

    /// Upsert value, type and direction at an explicit position.
    pub fn set_at(
        &mut self,
        name: impl Into<String>,
        value: ParamValue,
        sql_type: SqlType,
        direction: Direction,
        position: usize,
    ) {
        let key = self.key(&name.into());
        self.values.insert(key.clone(), value);
        self.types.insert(key.clone(), sql_type);
        self.directions.insert(key.clone(), direction);
        self.write_position(&key, position);
    }

    fn write_position(&mut self, key: &str, position: usize) {
        while self.order.len() <= position {
            self.order.push(None);
        }
        self.order[position] = Some(key.to_string());
    }

    /// Replace the value of an existing key.
    ///
    /// # Errors
    /// `ParameterError` when the key does not exist.
    pub fn update_value(
        &mut self,
        name: &str,
        value: ParamValue,
    ) -> Result<(), SqlRunnerError> {
        let key = self.key(name);
        if !self.values.contains_key(&key) {
            return Err(SqlRunnerError::ParameterError(format!(
                "unknown parameter: {name}"
            )));
        }
        self.values.insert(key, value);
        Ok(())
    }

    /// Replace the SQL type of an existing key.
    ///
    /// # Errors
    /// `ParameterError` when the key does not exist.
    pub fn update_type(&mut self, name: &str, sql_type: SqlType) -> Result<(), SqlRunnerError> {
        let key = self.key(name);
        if !self.values.contains_key(&key) {
            return Err(SqlRunnerError::ParameterError(format!(
                "unknown parameter: {name}"
            )));
        }
        self.types.insert(key, sql_type);
        Ok(())
    }

    /// Replace the direction of an existing key.
    ///
    /// # Errors
    /// `ParameterError` when the key does not exist.
    pub fn update_direction(
        &mut self,
        name: &str,
        direction: Direction,
    ) -> Result<(), SqlRunnerError> {
        let key = self.key(name);
        if !self.values.contains_key(&key) {
            return Err(SqlRunnerError::ParameterError(format!(
                "unknown parameter: {name}"
            )));
        }
        self.directions.insert(key, direction);
        Ok(())
    }

    /// Move an existing key to `position`, padding the order list with empty
    /// slots up to that index if needed (sparse-safe).
    ///
    /// # Errors
    /// `ParameterError` when the key does not exist.
    pub fn update_position(&mut self, name: &str, position: usize) -> Result<(), SqlRunnerError> {
        let key = self.key(name);
        if !self.values.contains_key(&key) {
            return Err(SqlRunnerError::ParameterError(format!(
                "unknown parameter: {name}"
            )));
        }
        self.write_position(&key, position);
        Ok(())
    }

    /// Delete a key from values/types/directions and from *every* order slot
    /// it occupies; the order list shrinks by the number of removed slots.
    pub fn remove(&mut self, name: &str) {
        let key = self.key(name);
        self.values.remove(&key);
        self.types.remove(&key);
        self.directions.remove(&key);
        self.order.retain(|slot| slot.as_deref() != Some(key.as_str()));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(&self.key(name))
    }

    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<SqlType> {
        self.types.get(&self.key(name)).copied()
    }

    #[must_use]
    pub fn get_direction(&self, name: &str) -> Option<Direction> {
        self.directions.get(&self.key(name)).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&self.key(name))
    }

    /// Number of distinct value-bearing keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of occupied + padded order slots.
    #[must_use]
    pub fn position_count(&self) -> usize {
        self.order.len()
    }

    /// Key occupying order slot `position`, if any.
    #[must_use]
    pub fn key_at(&self, position: usize) -> Option<&str> {
        self.order.get(position).and_then(|s| s.as_deref())
    }

    /// First order slot the key occupies.
    #[must_use]
    pub fn first_position(&self, name: &str) -> Option<usize> {
        let key = self.key(name);
        self.order
            .iter()
            .position(|slot| slot.as_deref() == Some(key.as_str()))
    }

    /// Iterate stored key names (normalized form, insertion order not
    /// guaranteed).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Assert that every key has exactly one resolvable position: the order
    /// list must be dense and its length must equal the value-key count.
    ///
    /// # Errors
    /// `ParameterError` describing the first inconsistency found.
    pub fn assert_order_resolved(&self) -> Result<(), SqlRunnerError> {
        if self.order.len() != self.values.len() {
            return Err(SqlRunnerError::ParameterError(format!(
                "parameter order is unresolved: {} positions for {} keys",
                self.order.len(),
                self.values.len()
            )));
        }
        for (i, slot) in self.order.iter().enumerate() {
            match slot {
                None => {
                    return Err(SqlRunnerError::ParameterError(format!(
                        "parameter order has an empty slot at position {i}"
                    )));
                }
                Some(key) if !self.values.contains_key(key) => {
                    return Err(SqlRunnerError::ParameterError(format!(
                        "position {i} references unknown parameter {key}"
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Values in position order, after [`Self::assert_order_resolved`] passes.
    ///
    /// # Errors
    /// `ParameterError` when positions are unresolved.
    pub fn values_array(&self) -> Result<Vec<ParamValue>, SqlRunnerError> {
        self.assert_order_resolved()?;
        Ok(self
            .order
            .iter()
            .filter_map(|slot| slot.as_ref())
            .filter_map(|key| self.values.get(key).cloned())
            .collect())
    }

    /// Value currently bound to order slot `position`.
    #[must_use]
    pub fn value_at(&self, position: usize) -> Option<&ParamValue> {
        self.key_at(position).and_then(|key| self.values.get(key))
    }

    /// Positional bulk update aligned to the order list.
    ///
    /// When `out_only` is set, only OUT/INOUT/RETURN-directioned keys are
    /// overwritten; values at IN-only positions are read and discarded.
    ///
    /// # Errors
    /// `ParameterError` when `new_values` does not match the position count
    /// or a slot is unoccupied.
    pub fn update(&mut self, new_values: &[ParamValue], out_only: bool) -> Result<(), SqlRunnerError> {
        if new_values.len() != self.order.len() {
            return Err(SqlRunnerError::ParameterError(format!(
                "bulk update length mismatch: {} values for {} positions",
                new_values.len(),
                self.order.len()
            )));
        }
        for (position, value) in new_values.iter().enumerate() {
            let Some(key) = self.order[position].clone() else {
                return Err(SqlRunnerError::ParameterError(format!(
                    "bulk update hit an empty slot at position {position}"
                )));
            };
            let direction = self.directions.get(&key).copied().unwrap_or_default();
            if !out_only || direction.is_out() {
                self.values.insert(key, value.clone());
            }
        }
        Ok(())
    }

    /// Store the call's aggregate return payload in the reserved slot.
    pub fn set_return(&mut self, value: ParamValue) {
        let key = self.key(RETURN_KEY);
        self.values.insert(key.clone(), value);
        self.types.entry(key.clone()).or_insert(SqlType::Other);
        self.directions.entry(key).or_insert(Direction::Return);
        // Deliberately not positioned: the return slot never binds.
    }

    /// The call's aggregate return payload, if present.
    #[must_use]
    pub fn get_return(&self) -> Option<&ParamValue> {
        self.values.get(&self.key(RETURN_KEY))
    }

    /// Drop the reserved return slot from the set.
    pub fn remove_return(&mut self) {
        self.remove(RETURN_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_values_array_round_trip() {
        let mut p = QueryParameters::new();
        p.set("a", ParamValue::Int(1));
        p.set("b", ParamValue::Text("x".into()));
        p.set("c", ParamValue::Bool(true));

        let values = p.values_array().unwrap();
        assert_eq!(values[0], ParamValue::Int(1));
        assert_eq!(values[1], ParamValue::Text("x".into()));
        assert_eq!(values[2], ParamValue::Bool(true));
    }

    #[test]
    fn keys_are_case_insensitive_by_default() {
        let mut p = QueryParameters::new();
        p.set("Name", ParamValue::Text("alice".into()));
        assert_eq!(p.get("NAME"), Some(&ParamValue::Text("alice".into())));
        assert_eq!(p.len(), 1);

        let mut strict = QueryParameters::with_case_sensitivity(true);
        strict.set("Name", ParamValue::Int(1));
        assert!(strict.get("name").is_none());
    }

    #[test]
    fn repeated_key_occupies_multiple_slots() {
        let mut p = QueryParameters::new();
        p.set("id", ParamValue::Int(7));
        p.update_position("id", 2).unwrap();
        // id now holds positions 0 and 2, slot 1 is padding
        assert_eq!(p.key_at(0), Some("id"));
        assert_eq!(p.key_at(1), None);
        assert_eq!(p.key_at(2), Some("id"));
        assert!(p.values_array().is_err());

        p.remove("id");
        // removal drops every slot the key held; only the padding survives
        assert_eq!(p.position_count(), 1);
        assert!(p.get("id").is_none());
    }

    #[test]
    fn bulk_update_out_only_skips_in_params() {
        let mut p = QueryParameters::new();
        p.set_full("a", ParamValue::Int(1), SqlType::Integer, Direction::In);
        p.set_full("b", ParamValue::Null, SqlType::Integer, Direction::Out);
        p.update(&[ParamValue::Int(10), ParamValue::Int(20)], true)
            .unwrap();
        assert_eq!(p.get("a"), Some(&ParamValue::Int(1)));
        assert_eq!(p.get("b"), Some(&ParamValue::Int(20)));

        let err = p.update(&[ParamValue::Null], false).unwrap_err();
        assert!(matches!(err, SqlRunnerError::ParameterError(_)));
    }

    #[test]
    fn return_slot_is_unpositioned() {
        let mut p = QueryParameters::new();
        p.set("a", ParamValue::Int(1));
        p.set_return(ParamValue::Text("payload".into()));
        assert_eq!(p.get_return(), Some(&ParamValue::Text("payload".into())));
        // the return slot must not disturb positional binding
        assert_eq!(p.position_count(), 1);
        p.remove_return();
        assert!(p.get_return().is_none());
        assert!(p.values_array().is_ok());
    }
}
