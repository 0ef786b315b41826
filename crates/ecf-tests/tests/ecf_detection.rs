//! The ECF checker watching the scenario on the devchain.

use std::sync::Arc;

use parking_lot::Mutex;

use ecf_checker::{Checker, CheckerConfig, JsonLinesSink, ReportSink};
use ecf_core::artifacts::DaoVariant;
use ecf_devchain::chain::SharedTracer;
use ecf_scenario::{ScenarioConfig, run};
use ecf_tests::helpers::*;

#[tokio::test]
async fn vulnerable_withdraw_is_not_ecf() {
    let (chain, checker, sink) = checked_devchain();
    let report = run(&chain, DaoVariant::Vulnerable, &ScenarioConfig::default()).await.unwrap();

    let checker = checker.lock();
    assert!(checker.flagged(&report.dao));
    assert!(!checker.flagged(&report.mallory));

    let reports = sink.reports();
    assert!(!reports.is_empty());
    assert!(reports.iter().all(|r| r.contract == report.dao));
    assert!(reports.iter().all(|r| r.origin == report.operator));
    assert!(reports.iter().all(|r| r.depth >= 2));
}

#[tokio::test]
async fn patched_withdraw_is_ecf() {
    let (chain, checker, sink) = checked_devchain();
    let report = run(&chain, DaoVariant::Patched, &ScenarioConfig::default()).await.unwrap();

    let checker = checker.lock();
    assert!(sink.is_empty());
    assert!(!checker.flagged(&report.dao));
    // The trigger reenters the DAO, so it was checked and judged ECF.
    assert!(checker.verdicts().iter().any(|v| v.contract == report.dao && v.verdict.is_ecf()));
    assert!(checker.verdicts().iter().all(|v| v.verdict.is_ecf()));
}

#[tokio::test]
async fn disabled_checker_stays_silent() {
    let sink = ecf_checker::MemorySink::new();
    let config = CheckerConfig { enabled: false, ..CheckerConfig::default() };
    let checker = Arc::new(Mutex::new(Checker::new(config, Box::new(sink.clone()))));
    let tracer: SharedTracer = checker.clone();
    let chain = devchain().with_tracer(tracer);

    run(&chain, DaoVariant::Vulnerable, &ScenarioConfig::default()).await.unwrap();
    assert!(sink.is_empty());
    assert!(checker.lock().verdicts().is_empty());
}

#[tokio::test]
async fn transaction_ids_continue_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports").join("non_ecf.jsonl");

    for _ in 0..2 {
        let sink = JsonLinesSink::open(&path).unwrap();
        let checker = Arc::new(Mutex::new(Checker::new(CheckerConfig::default(), Box::new(sink))));
        let tracer: SharedTracer = checker.clone();
        let chain = devchain().with_tracer(tracer);
        run(&chain, DaoVariant::Vulnerable, &ScenarioConfig::default()).await.unwrap();
    }

    let stored = JsonLinesSink::open(&path).unwrap().read_all().unwrap();
    assert!(stored.len() >= 2);
    let ids: Vec<u64> = stored.iter().map(|r| r.transaction_id).collect();
    let first_run_max = ids[0];
    assert!(ids.iter().any(|id| *id > first_run_max), "second run reused ids: {ids:?}");
    assert_eq!(JsonLinesSink::open(&path).unwrap().last_transaction_id().unwrap(), ids.iter().max().copied());
}
