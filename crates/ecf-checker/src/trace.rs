//! Trace analysis: decide whether a contract's projected trace is
//! effectively callback free.
//!
//! A trace is checked by repeatedly taking an innermost recursive call and
//! trying to reorder it so the reentrant (inner) segments run entirely
//! before or after the outer call's segments. Reordering is allowed only
//! when the moved segments commute with the segments they pass, i.e. their
//! read and write sets do not conflict. If some innermost recursive call
//! cannot be reordered, the trace is not ECF.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use ecf_core::types::{Address, StorageSlot};

use crate::error::TraceError;
use crate::segment::Segment;

/// Location of a recursive call that cannot be reordered away.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub contract: Address,
    pub depth: usize,
    /// Index in the transaction of the call's opening segment.
    pub start_index: usize,
    /// Number of segments in the offending subtrace.
    pub length: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Ecf,
    NotEcf(Violation),
}

impl Verdict {
    pub fn is_ecf(&self) -> bool {
        matches!(self, Self::Ecf)
    }
}

fn check_opening(trace: &[Segment], idx: usize) -> Result<(), TraceError> {
    match trace.get(idx) {
        None => Err(TraceError::OutOfBounds { index: idx, len: trace.len() }),
        Some(s) if !s.is_opening() => Err(TraceError::NotOpening(idx)),
        Some(_) => Ok(()),
    }
}

// Caller guarantees `trace[idx]` is an opening segment.
fn closing_of(trace: &[Segment], idx: usize) -> usize {
    let depth = trace[idx].depth;
    let mut candidate = 0;
    for (i, s) in trace[idx..].iter().enumerate().skip(1) {
        if s.depth == depth {
            if s.is_opening() {
                return idx + candidate;
            }
            candidate = i;
        } else if s.depth < depth {
            return idx + candidate;
        }
    }
    idx + candidate
}

/// Index of the last segment of the call opened at `idx`.
///
/// The call ends before the next opening segment at the same depth or the
/// first segment at a lower depth. A call that was never returned into is
/// its own closing segment.
pub fn matching_closing_segment(trace: &[Segment], idx: usize) -> Result<usize, TraceError> {
    check_opening(trace, idx)?;
    Ok(closing_of(trace, idx))
}

/// Same-depth segments of the call opened at `idx`, in order.
pub fn segments_of_call(trace: &[Segment], idx: usize) -> Result<Vec<&Segment>, TraceError> {
    check_opening(trace, idx)?;
    let opening = &trace[idx];
    let mut call = vec![opening];
    for s in &trace[idx + 1..] {
        if s.depth == opening.depth {
            if s.is_opening() {
                break;
            }
            call.push(s);
        } else if s.depth < opening.depth {
            break;
        }
    }
    Ok(call)
}

/// Index of the first opening segment after the first one.
pub fn next_opening_segment(trace: &[Segment]) -> Option<usize> {
    trace.iter().skip(1).position(Segment::is_opening).map(|p| p + 1)
}

fn call_is_recursive(trace: &[Segment], idx: usize) -> bool {
    let depth = trace[idx].depth;
    let close = closing_of(trace, idx);
    trace[idx..=close].iter().any(|s| s.is_opening() && s.depth > depth)
}

fn openings(trace: &[Segment]) -> impl Iterator<Item = usize> + '_ {
    trace.iter().enumerate().filter(|(_, s)| s.is_opening()).map(|(i, _)| i)
}

/// Whether some call in the trace contains a deeper call into the same
/// contract.
pub fn has_recursion(trace: &[Segment]) -> bool {
    openings(trace).any(|i| call_is_recursive(trace, i))
}

/// Opening index of an innermost recursive call: one that is recursive but
/// contains no recursive call itself. `None` when the trace has no recursion.
pub fn minimal_recursive_subtrace(trace: &[Segment]) -> Option<usize> {
    openings(trace).find(|&i| {
        if !call_is_recursive(trace, i) {
            return false;
        }
        let close = closing_of(trace, i);
        !(i + 1..=close).any(|j| trace[j].is_opening() && call_is_recursive(trace, j))
    })
}

/// Drop calls that contain no reentrancy and write nothing; they commute
/// with everything that follows.
pub fn remove_omittables(trace: &[Segment]) -> Vec<Segment> {
    let mut skip = vec![false; trace.len()];
    for i in openings(trace) {
        let close = closing_of(trace, i);
        let sub = &trace[i..=close];
        if has_recursion(sub) {
            continue;
        }
        let flat = sub.iter().all(|s| s.depth == sub[0].depth);
        if flat && sub.iter().all(|s| s.write_set.is_empty()) {
            skip[i..=close].iter_mut().for_each(|x| *x = true);
        }
    }
    let kept: Vec<Segment> = trace
        .iter()
        .zip(&skip)
        .filter(|(_, skipped)| !**skipped)
        .map(|(s, _)| s.clone())
        .collect();
    trace!(before = trace.len(), after = kept.len(), "removed omittable calls");
    kept
}

/// Whether `segment` may move left past segments with the given combined
/// read and write sets: `R(s) ∩ W = ∅ ∧ W(s) ∩ R = ∅`.
pub fn check_left_move(
    segment: &Segment,
    prev_reads: &BTreeSet<StorageSlot>,
    prev_writes: &BTreeSet<StorageSlot>,
) -> bool {
    segment.read_set.is_disjoint(prev_writes) && segment.write_set.is_disjoint(prev_reads)
}

/// Find a cutpoint splitting the inner segments of a recursive call into
/// those that can move before the outer call and those that can move after
/// it. Cutpoints are tried from the end of the trace towards its start.
pub fn find_cutpoint(trace: &[Segment], base_depth: usize) -> Option<usize> {
    'cut: for cutpoint in (1..=trace.len()).rev() {
        // Inner segments after the cutpoint move right, i.e. outer ones move left past them.
        let mut reads = BTreeSet::new();
        let mut writes = BTreeSet::new();
        for s in &trace[cutpoint..] {
            if s.depth > base_depth {
                reads.extend(s.read_set.iter().copied());
                writes.extend(s.write_set.iter().copied());
            } else if !check_left_move(s, &reads, &writes) {
                trace!(cutpoint, "outer segment cannot pass inner suffix");
                continue 'cut;
            }
        }

        // Inner segments before the cutpoint move left past the outer ones.
        let mut reads = BTreeSet::new();
        let mut writes = BTreeSet::new();
        for s in &trace[..cutpoint] {
            if s.depth == base_depth {
                reads.extend(s.read_set.iter().copied());
                writes.extend(s.write_set.iter().copied());
            } else if !check_left_move(s, &reads, &writes) {
                trace!(cutpoint, "inner segment cannot pass outer prefix");
                continue 'cut;
            }
        }

        debug!(cutpoint, "found cutpoint");
        return Some(cutpoint);
    }
    None
}

/// Reorder a recursive call into inner segments before the cutpoint, then
/// the outer call's segments, then the remaining inner segments.
/// `Ok(None)` when no cutpoint exists.
pub fn attempt_to_remove_recursion(trace: &[Segment]) -> Result<Option<Vec<Segment>>, TraceError> {
    let outer: Vec<Segment> = segments_of_call(trace, 0)?.into_iter().cloned().collect();
    let base = trace[0].depth;
    let Some(cutpoint) = find_cutpoint(trace, base) else {
        return Ok(None);
    };

    let mut before = Vec::new();
    let mut after = Vec::new();
    for (i, s) in trace.iter().enumerate() {
        if s.depth > base {
            if i < cutpoint {
                before.push(s.clone());
            } else {
                after.push(s.clone());
            }
        } else if s.depth < base {
            return Err(TraceError::BelowOuterCall { depth: s.depth, base });
        }
    }

    before.extend(outer);
    before.extend(after);
    Ok(Some(before))
}

/// Decide whether a single contract's projected trace is ECF.
pub fn check_trace(trace: &[Segment]) -> Result<Verdict, TraceError> {
    let mut trace = trace.to_vec();
    let limit = trace.len() + 1;

    for _ in 0..limit {
        if !has_recursion(&trace) {
            return Ok(Verdict::Ecf);
        }

        trace = remove_omittables(&trace);
        if !has_recursion(&trace) {
            debug!("trace is ECF after removing omittables");
            return Ok(Verdict::Ecf);
        }

        let open = minimal_recursive_subtrace(&trace).ok_or(TraceError::NoRecursion)?;
        let close = closing_of(&trace, open);
        let sub = &trace[open..=close];
        trace!(open, close, len = trace.len(), "minimal recursive subtrace");

        match attempt_to_remove_recursion(sub)? {
            None => {
                let first = &sub[0];
                return Ok(Verdict::NotEcf(Violation {
                    contract: first.contract,
                    depth: first.depth,
                    start_index: first.index_in_transaction,
                    length: sub.len(),
                }));
            }
            Some(reordered) => {
                trace = [&trace[..open], &reordered[..], &trace[close + 1..]].concat();
            }
        }
    }

    Err(TraceError::NoProgress(limit))
}
