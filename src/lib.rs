//! Core engine for levelling-network computation and adjustment.
//!
//! A levelling network is a set of *runs* (ordered chains of back/fore-sight
//! stations) tying survey points together, some of which carry known
//! benchmark elevations. This crate owns the graph model of that network and
//! the three computations built on it: closure evaluation against a
//! tolerance, distribution of misclosure back into station corrections with
//! exact-sum rounding, and partitioning of runs into connected height
//! systems via shared points.
//!
//! Raw instrument-file parsing, visualization and storage media live in the
//! surrounding application; this crate only consumes flat measurement
//! records at its [`import`] boundary and exposes [`repo`] and [`display`]
//! interfaces for them.

pub mod adjust;
pub mod analysis;
pub mod display;
pub mod graph;
pub mod import;
pub mod repo;
pub mod values;

// Re-export key types for convenient access
pub use adjust::{adjust_run, AdjustOptions, ClosureMode, Orientation, RunAdjustment, Station};
pub use analysis::systems::{partition, SharedPointLink, SystemPartition};
pub use graph::{Network, NetworkError, ObservationId, PointId, PointKind, RunId, SystemId};
pub use values::{Closure, Distance, Height, PointCode, Reading, ValueError};
