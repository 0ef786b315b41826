//! Checker error types.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    #[error("index {index} out of bounds for trace of {len} segments")] OutOfBounds { index: usize, len: usize },
    #[error("segment {0} is not an opening segment")] NotOpening(usize),
    #[error("minimal recursive subtrace has no recursion")] NoRecursion,
    #[error("segment at depth {depth} below outer call depth {base}")] BelowOuterCall { depth: usize, base: usize },
    #[error("recursion not reduced after {0} reorderings")] NoProgress(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckerError {
    #[error("report io: {0}")] Io(String),
    #[error("report serialization: {0}")] Serialization(String),
}
