//! Statement-creation state machine.
//!
//! Keyed on: generated keys requested (by the operation or an override) ×
//! explicit generated-column-name override × scroll/update needs declared by
//! the output transform. Generated-key retrieval wins outright and is
//! incompatible with scrollable/updatable cursors.

use crate::driver::{Concurrency, CursorMode, GeneratedKeys, StatementOptions};
use crate::error::SqlRunnerError;
use crate::output::OutputKind;
use crate::overrides::{OverrideKey, Overrider};

pub(crate) fn build_statement_options(
    overrides: &mut Overrider,
    kind: OutputKind,
    generated_requested: bool,
) -> Result<StatementOptions, SqlRunnerError> {
    let generated =
        generated_requested || overrides.take_bool(OverrideKey::GeneratedKeysRequested, false);
    let columns = overrides.take_text_list(OverrideKey::GeneratedColumnNames);

    let (scrollable, updatable) = match kind {
        OutputKind::Lazy(lazy) => (lazy.scrollable(), lazy.updatable()),
        _ => (false, false),
    };

    if (generated || columns.is_some()) && (scrollable || updatable) {
        return Err(SqlRunnerError::ConfigError(
            "generated-key retrieval cannot be combined with scrollable or updatable results"
                .to_string(),
        ));
    }

    let generated_keys = match columns {
        Some(names) => GeneratedKeys::Columns(names),
        None if generated => GeneratedKeys::Returned,
        None => GeneratedKeys::None,
    };

    let cursor = if scrollable {
        CursorMode::Scroll {
            change_sensitive: overrides.take_bool(OverrideKey::LazyScrollChangeSensitive, false),
        }
    } else {
        CursorMode::ForwardOnly
    };

    let concurrency = if updatable {
        Concurrency::Updatable
    } else {
        Concurrency::ReadOnly
    };

    Ok(StatementOptions {
        generated_keys,
        cursor,
        concurrency,
    })
}
