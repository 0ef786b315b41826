//! # ecf-checker — Effectively-callback-free transaction checking.
//!
//! Splits each transaction into [`segment::Segment`]s (uninterrupted runs of
//! one contract's code) while it executes, then decides per contract whether
//! the interleaving could be reordered into one without reentrant callbacks:
//! - [`checker::Checker`] — builds segments from execution hooks
//! - [`trace`] — projection, recursion search and reordering
//! - [`report`] — sinks for non-ECF findings
//! - [`config::CheckerConfig`] — environment switches

pub mod checker;
pub mod config;
pub mod error;
pub mod report;
pub mod segment;
pub mod trace;

pub use checker::{Checker, ContractVerdict};
pub use config::CheckerConfig;
pub use error::{CheckerError, TraceError};
pub use report::{JsonLinesSink, MemorySink, NonEcfReport, ReportSink};
pub use segment::Segment;
pub use trace::{Verdict, Violation};
