//! Segment construction from execution hooks and per-transaction checking.

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use ecf_core::traits::ExecutionTracer;
use ecf_core::types::{Address, CallKind, StorageSlot, TxContext, Wei, Word};

use crate::config::CheckerConfig;
use crate::report::{MemorySink, NonEcfReport, ReportSink};
use crate::segment::{Segment, participants, project};
use crate::trace::{Verdict, check_trace};

/// A call that has started and not yet returned.
#[derive(Debug, Clone, Copy)]
struct RunningCall {
    contract: Address,
    depth: usize,
    /// How many times a callee has returned into this call.
    returns: usize,
}

/// Outcome of checking one contract of a finished transaction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContractVerdict {
    pub transaction_id: u64,
    pub contract: Address,
    pub verdict: Verdict,
}

/// Builds the segment trace of each transaction from [`ExecutionTracer`]
/// hooks and checks it for ECF when the transaction's outermost call ends.
pub struct Checker {
    config: CheckerConfig,
    sink: Box<dyn ReportSink>,
    segments: Vec<Segment>,
    running: Vec<RunningCall>,
    /// One entry per active code run: whether it was entered by a real call.
    entries: Vec<bool>,
    pending_real_call: bool,
    transaction_id: u64,
    context: Option<TxContext>,
    started_at: Option<Instant>,
    runs_seen: u64,
    verdicts: Vec<ContractVerdict>,
}

impl Checker {
    pub fn new(config: CheckerConfig, sink: Box<dyn ReportSink>) -> Self {
        let transaction_id = match sink.last_transaction_id() {
            Ok(Some(id)) => {
                debug!("continuing from transaction id {id}");
                id
            }
            Ok(None) => 0,
            Err(e) => {
                warn!("failed to read last transaction id: {e}");
                0
            }
        };

        if config.enabled {
            info!("ECF check is in place");
        } else {
            info!("ECF checker is disabled");
        }

        Self {
            config,
            sink,
            segments: Vec::new(),
            running: Vec::new(),
            entries: Vec::new(),
            pending_real_call: false,
            transaction_id,
            context: None,
            started_at: None,
            runs_seen: 0,
            verdicts: Vec::new(),
        }
    }

    /// Enabled checker reporting into a shared in-memory sink.
    pub fn in_memory() -> (Self, MemorySink) {
        let sink = MemorySink::new();
        (Self::new(CheckerConfig::default(), Box::new(sink.clone())), sink)
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Id of the current (or last) transaction.
    pub fn transaction_id(&self) -> u64 {
        self.transaction_id
    }

    /// Segments recorded so far for the current transaction.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Verdicts of every checked transaction, oldest first.
    pub fn verdicts(&self) -> &[ContractVerdict] {
        &self.verdicts
    }

    /// Whether any checked transaction touching `contract` was not ECF.
    pub fn flagged(&self, contract: &Address) -> bool {
        self.verdicts
            .iter()
            .any(|v| v.contract == *contract && !v.verdict.is_ecf())
    }

    fn push_opening_segment(&mut self, contract: Address) {
        let depth = match self.running.last() {
            None => {
                self.segments.clear();
                1
            }
            Some(caller) => caller.depth + 1,
        };
        let segment = Segment::new(contract, depth, self.segments.len(), 0);
        debug!(%segment, entries = self.entries.len(), "adding opening segment");
        self.segments.push(segment);
        self.running.push(RunningCall { contract, depth, returns: 0 });
    }

    fn push_continuation_segment(&mut self) {
        let Some(top) = self.running.last_mut() else {
            return;
        };
        top.returns += 1;
        let segment = Segment::new(top.contract, top.depth, self.segments.len(), top.returns);
        debug!(%segment, "adding continuation segment");
        self.segments.push(segment);
    }

    fn finish_transaction(&mut self) {
        let segments = std::mem::take(&mut self.segments);
        // A single segment cannot contain a callback.
        if segments.len() <= 1 {
            return;
        }

        let check_started = Instant::now();
        let context = self.context.unwrap_or_default();
        debug!(
            block = context.block_number,
            segments = segments.len(),
            "transaction ended, checking every participating contract"
        );

        for contract in participants(&segments) {
            let projection = project(&segments, &contract);
            debug!(%contract, len = projection.len(), "checking projection");
            let verdict = match check_trace(&projection) {
                Ok(v) => v,
                Err(e) => {
                    error!(%contract, "trace analysis failed: {e}");
                    continue;
                }
            };

            if let Verdict::NotEcf(violation) = &verdict {
                warn!(
                    "Transaction is not ECF! Contract {}, depth {}, index in transaction starting at {}",
                    violation.contract, violation.depth, violation.start_index
                );
                let report = NonEcfReport {
                    transaction_id: self.transaction_id,
                    origin: context.origin,
                    block: context.block_number,
                    time: context.timestamp,
                    contract: violation.contract,
                    depth: violation.depth,
                    start_index: violation.start_index,
                    length: violation.length,
                    detected_at: Utc::now(),
                };
                if let Err(e) = self.sink.record(&report) {
                    error!("failed to record non-ECF report: {e}");
                }
            }

            self.verdicts.push(ContractVerdict {
                transaction_id: self.transaction_id,
                contract,
                verdict,
            });
        }

        let total = self.started_at.map(|t| t.elapsed()).unwrap_or_default();
        debug!(
            "reentrancy check (block #{}) took {:?} / {:?} total",
            context.block_number,
            check_started.elapsed(),
            total
        );
    }
}

impl ExecutionTracer for Checker {
    fn on_enter(&mut self, ctx: &TxContext, contract: Address) {
        if !self.config.enabled {
            return;
        }

        self.runs_seen += 1;
        if self.runs_seen % 10_000 == 0 {
            info!("checked {} code runs so far", self.runs_seen);
        }

        let quiescent = self.entries.is_empty();
        if quiescent {
            self.transaction_id += 1;
            self.context = Some(*ctx);
            self.started_at = Some(Instant::now());
        }

        let real = quiescent || self.pending_real_call;
        if real {
            self.push_opening_segment(contract);
        }
        self.entries.push(real);
        self.pending_real_call = false;
    }

    fn on_exit(&mut self, _ctx: &TxContext, _contract: Address) {
        if !self.config.enabled {
            return;
        }

        let Some(real) = self.entries.pop() else {
            warn!("code run ended without a matching start");
            return;
        };

        if real {
            if self.running.len() > 1 {
                self.running.pop();
                self.push_continuation_segment();
            } else if self.running.pop().is_some() {
                self.finish_transaction();
            }
        }

        if self.entries.is_empty() {
            self.context = None;
            self.started_at = None;
            self.pending_real_call = false;
        }
    }

    fn on_sload(&mut self, contract: Address, slot: &StorageSlot, _value: &Word) {
        if !self.config.enabled {
            return;
        }
        if let Some(segment) = self.segments.last_mut() {
            if segment.write_set.contains(slot) {
                debug!(%contract, "read location already in write set");
            }
            segment.read_set.insert(*slot);
        }
    }

    fn on_sstore(&mut self, _contract: Address, slot: &StorageSlot, _value: &Word) {
        if !self.config.enabled {
            return;
        }
        if let Some(segment) = self.segments.last_mut() {
            segment.write_set.insert(*slot);
        }
    }

    fn on_call(&mut self, _caller: Address, _callee: Address, _value: Wei, kind: CallKind) {
        if !self.config.enabled {
            return;
        }
        self.pending_real_call = kind.switches_context();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Address = Address([0xaa; 20]);
    const B: Address = Address([0xbb; 20]);
    const C: Address = Address([0xcc; 20]);

    fn ctx() -> TxContext {
        TxContext { origin: Address([1; 20]), block_number: 12, timestamp: 1_500_000_000 }
    }

    fn slot(i: u64) -> Word {
        Word::from_u64(i)
    }

    fn call(c: &mut Checker, from: Address, to: Address) {
        c.on_call(from, to, 0, CallKind::Call);
        c.on_enter(&ctx(), to);
    }

    #[test]
    fn single_run_is_one_segment_and_not_checked() {
        let (mut c, sink) = Checker::in_memory();
        c.on_enter(&ctx(), A);
        c.on_sload(A, &slot(1), &Word::ZERO);
        assert_eq!(c.segments().len(), 1);
        assert!(c.segments()[0].read_set.contains(&slot(1)));
        c.on_exit(&ctx(), A);
        assert!(c.verdicts().is_empty());
        assert!(sink.is_empty());
        assert_eq!(c.transaction_id(), 1);
    }

    #[test]
    fn segments_for_call_and_return() {
        // A1 B1 A2
        let (mut c, _) = Checker::in_memory();
        c.on_enter(&ctx(), A);
        call(&mut c, A, B);
        let segs = c.segments().to_vec();
        assert_eq!(segs.len(), 2);
        assert_eq!((segs[1].contract, segs[1].depth, segs[1].index_in_call), (B, 2, 0));
        c.on_exit(&ctx(), B);
        let last = c.segments().last().unwrap().clone();
        assert_eq!((last.contract, last.depth, last.index_in_call), (A, 1, 1));
        c.on_exit(&ctx(), A);
        assert_eq!(c.verdicts().len(), 2);
        assert!(c.verdicts().iter().all(|v| v.verdict.is_ecf()));
    }

    #[test]
    fn delegated_run_stays_in_caller_segment() {
        let (mut c, _) = Checker::in_memory();
        c.on_enter(&ctx(), A);
        c.on_call(A, C, 0, CallKind::DelegateCall);
        c.on_enter(&ctx(), C);
        c.on_sstore(C, &slot(4), &Word::ZERO);
        assert_eq!(c.segments().len(), 1);
        c.on_exit(&ctx(), C);
        assert_eq!(c.segments().len(), 1);
        assert!(c.segments()[0].write_set.contains(&slot(4)));
        c.on_exit(&ctx(), A);
    }

    #[test]
    fn reentrant_update_after_call_is_reported() {
        // A1 B1 A'1 B2 A2: A reads the balance, B re-enters A which updates
        // it, and A updates it again after B returns.
        let (mut c, sink) = Checker::in_memory();
        c.on_enter(&ctx(), A);
        c.on_sload(A, &slot(1), &Word::ZERO);
        call(&mut c, A, B);
        call(&mut c, B, A);
        c.on_sload(A, &slot(1), &Word::ZERO);
        c.on_sstore(A, &slot(1), &Word::ZERO);
        c.on_exit(&ctx(), A);
        c.on_exit(&ctx(), B);
        c.on_sstore(A, &slot(1), &Word::ZERO);
        c.on_exit(&ctx(), A);

        assert!(c.flagged(&A));
        assert!(!c.flagged(&B));
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].contract, A);
        assert_eq!(reports[0].block, 12);
        assert_eq!(reports[0].origin, Address([1; 20]));
        assert_eq!(reports[0].start_index, 0);
    }

    #[test]
    fn reentrant_update_before_call_is_ecf() {
        let (mut c, sink) = Checker::in_memory();
        c.on_enter(&ctx(), A);
        c.on_sload(A, &slot(1), &Word::ZERO);
        c.on_sstore(A, &slot(1), &Word::ZERO);
        call(&mut c, A, B);
        call(&mut c, B, A);
        c.on_sload(A, &slot(1), &Word::ZERO);
        c.on_exit(&ctx(), A);
        c.on_exit(&ctx(), B);
        c.on_exit(&ctx(), A);

        assert!(!c.flagged(&A));
        assert!(sink.is_empty());
    }

    #[test]
    fn check_runs_only_when_outermost_call_ends() {
        // A1 B1 A2 C1 A3: returning from B must not end the transaction.
        let (mut c, _) = Checker::in_memory();
        c.on_enter(&ctx(), A);
        call(&mut c, A, B);
        c.on_exit(&ctx(), B);
        assert!(c.verdicts().is_empty());
        call(&mut c, A, C);
        assert_eq!(c.segments().len(), 4);
        assert_eq!(c.segments()[3].depth, 2);
        c.on_exit(&ctx(), C);
        c.on_exit(&ctx(), A);
        assert_eq!(c.verdicts().len(), 3);
        assert_eq!(c.transaction_id(), 1);
    }

    #[test]
    fn transaction_ids_increase_per_transaction() {
        let (mut c, _) = Checker::in_memory();
        for _ in 0..3 {
            c.on_enter(&ctx(), A);
            c.on_exit(&ctx(), A);
        }
        assert_eq!(c.transaction_id(), 3);
    }

    #[test]
    fn ids_continue_from_sink_history() {
        let mut sink = MemorySink::new();
        sink.record(&NonEcfReport {
            transaction_id: 41,
            origin: Address::ZERO,
            block: 0,
            time: 0,
            contract: A,
            depth: 1,
            start_index: 0,
            length: 3,
            detected_at: Utc::now(),
        })
        .unwrap();
        let mut c = Checker::new(CheckerConfig::default(), Box::new(sink));
        c.on_enter(&ctx(), A);
        assert_eq!(c.transaction_id(), 42);
    }

    #[test]
    fn disabled_checker_records_nothing() {
        let cfg = CheckerConfig { enabled: false, ..CheckerConfig::default() };
        let mut c = Checker::new(cfg, Box::new(MemorySink::new()));
        c.on_enter(&ctx(), A);
        c.on_sstore(A, &slot(1), &Word::ZERO);
        c.on_exit(&ctx(), A);
        assert!(c.segments().is_empty());
        assert_eq!(c.transaction_id(), 0);
    }

    #[test]
    fn unmatched_exit_is_ignored() {
        let (mut c, _) = Checker::in_memory();
        c.on_exit(&ctx(), A);
        assert!(c.verdicts().is_empty());
    }
}
