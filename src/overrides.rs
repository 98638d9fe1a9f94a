//! Two-tier configuration overlay consulted by the engine and its strategies.
//!
//! Sticky overrides persist until removed; one-shot overrides are consumed
//! and deleted on first read. One-shot entries are checked first.

use std::collections::HashMap;

/// Well-known override keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverrideKey {
    /// Column names to request generated keys for (`TextList`).
    GeneratedColumnNames,
    /// Enforce metadata parameter-count reconciliation on named calls (`Bool`).
    ControlParamCount,
    /// Maximum row count a lazy view may cache (`Int`).
    LazyCacheMaxSize,
    /// Change sensitivity for scrollable lazy cursors (`Bool`).
    LazyScrollChangeSensitive,
    /// Force generated-key retrieval on the next statement (`Bool`).
    GeneratedKeysRequested,
    /// Treat the driver as lacking LOB support even if it reports it (`Bool`).
    DriverLacksLobSupport,
}

/// Typed override values.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideValue {
    Bool(bool),
    Int(i64),
    Text(String),
    TextList(Vec<String>),
}

/// Per-engine-instance override registry.
#[derive(Debug, Clone, Default)]
pub struct Overrider {
    sticky: HashMap<OverrideKey, OverrideValue>,
    once: HashMap<OverrideKey, OverrideValue>,
}

impl Overrider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a sticky override; it persists until [`Self::remove`].
    pub fn set(&mut self, key: OverrideKey, value: OverrideValue) {
        self.sticky.insert(key, value);
    }

    /// Set a one-shot override, consumed and deleted on the next read.
    pub fn set_once(&mut self, key: OverrideKey, value: OverrideValue) {
        self.once.insert(key, value);
    }

    /// Read an override. One-shot entries are checked first and deleted;
    /// sticky entries are returned by clone and kept.
    pub fn take(&mut self, key: OverrideKey) -> Option<OverrideValue> {
        if let Some(value) = self.once.remove(&key) {
            return Some(value);
        }
        self.sticky.get(&key).cloned()
    }

    /// Whether the key is set in either tier, without consuming it.
    #[must_use]
    pub fn has(&self, key: OverrideKey) -> bool {
        self.once.contains_key(&key) || self.sticky.contains_key(&key)
    }

    /// Remove the key from both tiers.
    pub fn remove(&mut self, key: OverrideKey) {
        self.once.remove(&key);
        self.sticky.remove(&key);
    }

    /// Drop any remaining call-scoped (one-shot) entries.
    pub fn clear_call_scope(&mut self) {
        self.once.clear();
    }

    /// Boolean convenience read; `default` when unset or mistyped.
    pub fn take_bool(&mut self, key: OverrideKey, default: bool) -> bool {
        match self.take(key) {
            Some(OverrideValue::Bool(b)) => b,
            _ => default,
        }
    }

    /// usize convenience read; `default` when unset, mistyped or negative.
    pub fn take_usize(&mut self, key: OverrideKey, default: usize) -> usize {
        match self.take(key) {
            Some(OverrideValue::Int(i)) => usize::try_from(i).unwrap_or(default),
            _ => default,
        }
    }

    /// String-list convenience read.
    pub fn take_text_list(&mut self, key: OverrideKey) -> Option<Vec<String>> {
        match self.take(key) {
            Some(OverrideValue::TextList(list)) => Some(list),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_is_consumed_on_first_read() {
        let mut o = Overrider::new();
        o.set_once(OverrideKey::GeneratedKeysRequested, OverrideValue::Bool(true));
        assert_eq!(
            o.take(OverrideKey::GeneratedKeysRequested),
            Some(OverrideValue::Bool(true))
        );
        assert_eq!(o.take(OverrideKey::GeneratedKeysRequested), None);
    }

    #[test]
    fn sticky_survives_reads_until_removed() {
        let mut o = Overrider::new();
        o.set(OverrideKey::LazyCacheMaxSize, OverrideValue::Int(42));
        assert_eq!(o.take_usize(OverrideKey::LazyCacheMaxSize, 100), 42);
        assert_eq!(o.take_usize(OverrideKey::LazyCacheMaxSize, 100), 42);
        o.remove(OverrideKey::LazyCacheMaxSize);
        assert_eq!(o.take_usize(OverrideKey::LazyCacheMaxSize, 100), 100);
    }

    #[test]
    fn one_shot_shadows_sticky_for_one_read() {
        let mut o = Overrider::new();
        o.set(OverrideKey::LazyScrollChangeSensitive, OverrideValue::Bool(false));
        o.set_once(OverrideKey::LazyScrollChangeSensitive, OverrideValue::Bool(true));
        assert!(o.take_bool(OverrideKey::LazyScrollChangeSensitive, false));
        assert!(!o.take_bool(OverrideKey::LazyScrollChangeSensitive, true));
    }
}
