//! Cursor-backed lazy row sequences through the full engine path.

mod common;

use std::sync::Arc;

use common::{MockSource, Script};
use sql_runner::prelude::*;

fn wide_script(rows: i64) -> Script {
    Script {
        rows: Some((
            vec!["n".into()],
            (0..rows).map(|i| vec![ParamValue::Int(i)]).collect(),
        )),
        ..Script::default()
    }
}

fn lazy_runner(script: Script) -> (QueryRunner, std::sync::Arc<std::sync::Mutex<common::Counters>>) {
    let (source, counters) = MockSource::new(script);
    let config = RunnerConfig {
        manual_mode: true,
        ..RunnerConfig::default()
    };
    let runner = QueryRunner::with_config(Box::new(source), config)
        .with_statement_handler(Arc::new(LazyStatementHandler));
    (runner, counters)
}

#[test]
fn forward_view_streams_all_rows() {
    let (mut runner, counters) = lazy_runner(wide_script(5));
    let seq = runner
        .query(
            "SELECT n FROM t",
            &LazyRowsHandler::new(LazyKind::ForwardReadOnly),
            &QueryParameters::new(),
        )
        .unwrap();
    assert!(seq.is_lazy());
    let mut lazy = seq.into_lazy().unwrap();
    let mut seen = Vec::new();
    while let Some(row) = lazy.next().unwrap() {
        seen.push(row.get("n").cloned().unwrap());
    }
    assert_eq!(seen.len(), 5);
    assert_eq!(seen[4], ParamValue::Int(4));
    // Exhausted; further advances stay None.
    assert!(lazy.next().unwrap().is_none());
    lazy.close().unwrap();
    runner.commit().unwrap();
    assert_eq!(counters.lock().unwrap().releases, 1);
}

#[test]
fn scroll_view_revisits_cached_rows() {
    let (mut runner, _counters) = lazy_runner(wide_script(4));
    let seq = runner
        .query(
            "SELECT n FROM t",
            &LazyRowsHandler::new(LazyKind::ScrollReadOnly),
            &QueryParameters::new(),
        )
        .unwrap();
    let mut lazy = seq.into_lazy().unwrap();
    assert_eq!(
        lazy.row_at(2).unwrap().and_then(|r| r.get("n").cloned()),
        Some(ParamValue::Int(2))
    );
    assert_eq!(
        lazy.prev().unwrap().and_then(|r| r.get("n").cloned()),
        Some(ParamValue::Int(1))
    );
    lazy.close().unwrap();
    runner.rollback().unwrap();
}

#[test]
fn cache_bound_override_limits_backward_reach() {
    let (mut runner, _counters) = lazy_runner(wide_script(10));
    runner
        .overrides_mut()
        .set_once(OverrideKey::LazyCacheMaxSize, OverrideValue::Int(2));
    let seq = runner
        .query(
            "SELECT n FROM t",
            &LazyRowsHandler::new(LazyKind::ScrollReadOnly),
            &QueryParameters::new(),
        )
        .unwrap();
    let mut lazy = seq.into_lazy().unwrap();
    assert!(lazy.row_at(5).unwrap().is_some());
    // Row 0 was evicted from the 2-row cache.
    assert!(lazy.row_at(0).is_err());
    lazy.close().unwrap();
    runner.rollback().unwrap();
}

#[test]
fn forward_view_rejects_scrolling() {
    let (mut runner, _counters) = lazy_runner(wide_script(3));
    let seq = runner
        .query(
            "SELECT n FROM t",
            &LazyRowsHandler::new(LazyKind::ForwardReadOnly),
            &QueryParameters::new(),
        )
        .unwrap();
    let mut lazy = seq.into_lazy().unwrap();
    lazy.next().unwrap();
    assert!(lazy.row_at(0).is_err());
    lazy.close().unwrap();
    runner.rollback().unwrap();
}

#[test]
fn updatable_view_replaces_cached_row() {
    let (mut runner, _counters) = lazy_runner(wide_script(3));
    let seq = runner
        .query(
            "SELECT n FROM t",
            &LazyRowsHandler::new(LazyKind::ScrollUpdatable),
            &QueryParameters::new(),
        )
        .unwrap();
    let mut lazy = seq.into_lazy().unwrap();
    lazy.row_at(1).unwrap();
    let mut replacement = QueryParameters::new();
    replacement.set("n", ParamValue::Int(100));
    lazy.set_row(1, replacement).unwrap();
    assert_eq!(
        lazy.row_at(1).unwrap().and_then(|r| r.get("n").cloned()),
        Some(ParamValue::Int(100))
    );
    lazy.close().unwrap();
    runner.rollback().unwrap();
}

#[test]
fn summary_row_update_count_is_absent_for_queries() {
    let (mut runner, _counters) = lazy_runner(wide_script(1));
    let seq = runner
        .query(
            "SELECT n FROM t",
            &LazyRowsHandler::new(LazyKind::ForwardReadOnly),
            &QueryParameters::new(),
        )
        .unwrap();
    assert_eq!(seq.update_count(), None);
    seq.into_lazy().unwrap().close().unwrap();
    runner.rollback().unwrap();
}
