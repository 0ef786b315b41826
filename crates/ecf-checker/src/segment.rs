//! Execution segments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use ecf_core::types::{Address, StorageSlot};

/// An uninterrupted run of one contract's code within a transaction.
///
/// A call into a contract produces an opening segment (`index_in_call == 0`)
/// and one more segment each time control returns to it from a callee.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub contract: Address,
    /// Call depth; the transaction's entry call is at depth 1.
    pub depth: usize,
    /// Position among all segments of the transaction.
    pub index_in_transaction: usize,
    /// 0 for the opening segment, k after the k-th return into the call.
    pub index_in_call: usize,
    /// Storage slots read.
    pub read_set: BTreeSet<StorageSlot>,
    /// Storage slots written.
    pub write_set: BTreeSet<StorageSlot>,
}

impl Segment {
    pub fn new(contract: Address, depth: usize, index_in_transaction: usize, index_in_call: usize) -> Self {
        Self {
            contract,
            depth,
            index_in_transaction,
            index_in_call,
            read_set: BTreeSet::new(),
            write_set: BTreeSet::new(),
        }
    }

    pub fn is_opening(&self) -> bool {
        self.index_in_call == 0
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{} d{} #{} c{} r{} w{}}}",
            self.contract,
            self.depth,
            self.index_in_transaction,
            self.index_in_call,
            self.read_set.len(),
            self.write_set.len()
        )
    }
}

/// The segments of `segments` that belong to `contract`, in order.
pub fn project(segments: &[Segment], contract: &Address) -> Vec<Segment> {
    segments.iter().filter(|s| s.contract == *contract).cloned().collect()
}

/// Distinct contracts of a trace in order of first appearance.
pub fn participants(segments: &[Segment]) -> Vec<Address> {
    let mut seen = BTreeSet::new();
    segments
        .iter()
        .filter(|s| seen.insert(s.contract))
        .map(|s| s.contract)
        .collect()
}
