//! Defines the error types for the graph model.

use super::ids::{RunId, SystemId};
use crate::values::{PointCode, ValueError};
use thiserror::Error;

/// A fatal invariant violation in the graph model.
///
/// These abort the current build/mutation command; they are never retried.
/// Computations that are merely unavailable (closure of an open run, path in
/// a disconnected graph) return `Option` instead of erroring.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error(
        "run '{run}' station {index}: chain broken, expected observation to start \
         at '{expected}' but it starts at '{actual}'"
    )]
    ChainViolation {
        run: String,
        index: usize,
        expected: PointCode,
        actual: PointCode,
    },

    #[error("run {0:?} does not belong to this network")]
    ForeignRun(RunId),

    #[error("system {0:?} does not belong to this network")]
    ForeignSystem(SystemId),

    #[error("cannot set benchmark '{0}' from an unknown height")]
    UnknownBenchmarkHeight(PointCode),

    #[error(transparent)]
    Value(#[from] ValueError),
}
