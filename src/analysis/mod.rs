//! Analyses over many runs at once, derived purely from graph state.

pub mod systems;

pub use systems::{apply_partition, partition, shared_point_links};
pub use systems::{NewSystem, SharedPointLink, SystemPartition};
