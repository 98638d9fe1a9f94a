//! Callable statements: OUT merging, the return slot, and named resolution
//! against procedure metadata.

mod common;

use std::sync::Arc;

use common::{MockSource, Script};
use sql_runner::driver::Connection;
use sql_runner::prelude::*;

#[test]
fn out_values_merge_back_into_the_parameter_set() {
    let (source, counters) = MockSource::new(Script {
        out_values: [(1, ParamValue::Int(42))].into_iter().collect(),
        ..Script::default()
    });
    let mut runner = QueryRunner::new(Box::new(source));

    let mut p = QueryParameters::new();
    p.set("id", ParamValue::Int(7));
    p.set_full("total", ParamValue::Null, SqlType::Integer, Direction::Out);

    let (merged, rows) = runner
        .call("{call tally(?, ?)}", &p, &RowsHandler)
        .unwrap();
    assert!(rows.is_empty());
    // IN position untouched, OUT position overwritten.
    assert_eq!(merged.get("id"), Some(&ParamValue::Int(7)));
    assert_eq!(merged.get("total"), Some(&ParamValue::Int(42)));
    // The raw rows ride in the unpositioned return slot.
    assert_eq!(merged.get_return(), Some(&ParamValue::Rows(Vec::new())));
    assert_eq!(merged.first_position("return_value"), None);

    let c = counters.lock().unwrap();
    assert_eq!(c.commits, 1);
    assert_eq!(c.statement_closes, 1);
}

#[test]
fn blob_typed_call_input_survives_output_coercion() {
    let (source, counters) = MockSource::new(Script {
        lob_support: true,
        ..Script::default()
    });
    let mut runner = QueryRunner::new(Box::new(source));

    let mut p = QueryParameters::new();
    p.set_typed("doc", ParamValue::Blob(vec![9, 8, 7]), SqlType::Blob);

    let (merged, _rows) = runner
        .call("{call store(?)}", &p, &RowsHandler)
        .unwrap();
    // The handle is read back to plain bytes, then released exactly once.
    assert_eq!(merged.get("doc"), Some(&ParamValue::Blob(vec![9, 8, 7])));
    assert_eq!(counters.lock().unwrap().freed_lobs, 1);
}

#[test]
fn array_typed_call_input_round_trips() {
    let (source, counters) = MockSource::new(Script {
        array_support: true,
        ..Script::default()
    });
    let mut runner = QueryRunner::new(Box::new(source));

    let values = vec![ParamValue::Int(5), ParamValue::Int(6)];
    let mut p = QueryParameters::new();
    p.set_typed("ids", ParamValue::Array(values.clone()), SqlType::Array);

    let (merged, _rows) = runner
        .call("{call prune(?)}", &p, &RowsHandler)
        .unwrap();
    assert_eq!(merged.get("ids"), Some(&ParamValue::Array(values)));
    assert_eq!(counters.lock().unwrap().freed_arrays, 1);
}

#[test]
fn call_can_produce_rows() {
    let (source, _counters) = MockSource::new(Script {
        rows: Some((
            vec!["name".into()],
            vec![vec![ParamValue::Text("alice".into())]],
        )),
        ..Script::default()
    });
    let mut runner = QueryRunner::new(Box::new(source));
    let (merged, rows) = runner
        .call("{call everyone()}", &QueryParameters::new(), &RowsHandler)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&ParamValue::Text("alice".into())));
    match merged.get_return() {
        Some(ParamValue::Rows(raw)) => assert_eq!(raw.len(), 1),
        other => panic!("expected raw rows in return slot, got {other:?}"),
    }
}

/// Metadata with a leading RETURN parameter, the shape a function exposes.
struct FuncMetadata;

impl MetadataHandler for FuncMetadata {
    fn procedure_parameters(
        &self,
        _conn: &mut dyn Connection,
        _catalog: Option<&str>,
        _schema: Option<&str>,
        procedure: &str,
        _use_cache: bool,
    ) -> Result<Vec<ParamDescriptor>, SqlRunnerError> {
        assert_eq!(procedure, "test_func");
        Ok(vec![
            ParamDescriptor {
                name: "ret".into(),
                sql_type: SqlType::Integer,
                direction: Direction::Return,
            },
            ParamDescriptor {
                name: "id".into(),
                sql_type: SqlType::Integer,
                direction: Direction::In,
            },
            ParamDescriptor {
                name: "total".into(),
                sql_type: SqlType::Integer,
                direction: Direction::Out,
            },
        ])
    }
}

#[test]
fn named_call_resolves_order_and_drops_the_implicit_return() {
    let (source, counters) = MockSource::new(Script {
        out_values: [(1, ParamValue::Int(9))].into_iter().collect(),
        ..Script::default()
    });
    let mut runner =
        QueryRunner::new(Box::new(source)).with_metadata_handler(Arc::new(FuncMetadata));

    // Supplied in the wrong order, without the implicit return.
    let mut p = QueryParameters::new();
    p.set("total", ParamValue::Null);
    p.set("id", ParamValue::Int(3));
    let result = runner
        .call_named(&CallInput::named("test_func", p), &RowsHandler)
        .unwrap();

    assert_eq!(result.params.get("id"), Some(&ParamValue::Int(3)));
    assert_eq!(result.params.get("total"), Some(&ParamValue::Int(9)));
    assert!(result.output.is_empty());

    // Two markers: the return descriptor was dropped before synthesis.
    let c = counters.lock().unwrap();
    assert_eq!(
        c.last_call_sql.as_deref(),
        Some("{call test_func(?, ?)}")
    );
}

#[test]
fn named_call_count_mismatch_is_a_config_error() {
    let (source, counters) = MockSource::new(Script::default());
    let mut runner =
        QueryRunner::new(Box::new(source)).with_metadata_handler(Arc::new(FuncMetadata));

    let mut p = QueryParameters::new();
    p.set("id", ParamValue::Int(3));
    let err = runner
        .call_named(&CallInput::named("test_func", p), &RowsHandler)
        .unwrap_err();
    assert!(matches!(err, SqlRunnerError::ConfigError(_)));
    // Resolution failed after acquiring the connection for metadata; the
    // failure path still releases it.
    let c = counters.lock().unwrap();
    assert_eq!(c.connections, 1);
    assert_eq!(c.releases, 1);
}

#[test]
fn control_param_count_override_relaxes_enforcement() {
    let (source, _counters) = MockSource::new(Script {
        out_values: [(0, ParamValue::Int(1)), (2, ParamValue::Int(0))]
            .into_iter()
            .collect(),
        ..Script::default()
    });
    let mut runner =
        QueryRunner::new(Box::new(source)).with_metadata_handler(Arc::new(FuncMetadata));
    runner
        .overrides_mut()
        .set_once(OverrideKey::ControlParamCount, OverrideValue::Bool(false));

    // Only one of three metadata parameters supplied; with enforcement off,
    // the rest bind as NULL.
    let mut p = QueryParameters::new();
    p.set("id", ParamValue::Int(3));
    let result = runner
        .call_named(&CallInput::named("test_func", p), &RowsHandler)
        .unwrap();
    assert_eq!(result.params.len(), 4); // ret, id, total + return slot
}

struct CountingMetadata {
    lookups: Arc<std::sync::atomic::AtomicUsize>,
}

impl MetadataHandler for CountingMetadata {
    fn procedure_parameters(
        &self,
        conn: &mut dyn Connection,
        catalog: Option<&str>,
        schema: Option<&str>,
        procedure: &str,
        use_cache: bool,
    ) -> Result<Vec<ParamDescriptor>, SqlRunnerError> {
        self.lookups
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        FuncMetadata.procedure_parameters(conn, catalog, schema, procedure, use_cache)
    }
}

#[test]
fn metadata_cache_serves_repeat_lookups() {
    let lookups = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let cached = CachedMetadataHandler::new(CountingMetadata {
        lookups: Arc::clone(&lookups),
    });
    let (source, _counters) = MockSource::new(Script {
        out_values: [(1, ParamValue::Int(5))].into_iter().collect(),
        ..Script::default()
    });
    let mut runner = QueryRunner::new(Box::new(source)).with_metadata_handler(Arc::new(cached));

    for _ in 0..3 {
        let mut p = QueryParameters::new();
        p.set("total", ParamValue::Null);
        p.set("id", ParamValue::Int(1));
        runner
            .call_named(&CallInput::named("test_func", p), &RowsHandler)
            .unwrap();
    }
    assert_eq!(lookups.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn positional_call_input_skips_metadata() {
    let (source, counters) = MockSource::new(Script::default());
    // No metadata handler installed; positional input must not consult one.
    let mut runner = QueryRunner::new(Box::new(source));
    let mut p = QueryParameters::new();
    p.set("a", ParamValue::Int(1));
    let result = runner
        .call_named(&CallInput::positional("plain_proc", p), &RowsHandler)
        .unwrap();
    assert_eq!(result.params.get("a"), Some(&ParamValue::Int(1)));
    let c = counters.lock().unwrap();
    assert_eq!(
        c.last_call_sql.as_deref(),
        Some("{call plain_proc(?)}")
    );
}

#[test]
fn qualified_names_reach_the_call_string() {
    let (source, counters) = MockSource::new(Script::default());
    let mut runner = QueryRunner::new(Box::new(source));
    let input = CallInput::positional("p", QueryParameters::new())
        .with_catalog("cat")
        .with_schema("s");
    runner.call_named(&input, &RowsHandler).unwrap();
    assert_eq!(
        counters.lock().unwrap().last_call_sql.as_deref(),
        Some("{call cat.s.p()}")
    );
}
