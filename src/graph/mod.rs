//! The levelling-network graph model: points, observations, runs, systems.

pub mod error;
pub mod ids;
pub mod network;
pub mod storage;
pub mod traversal;

// Re-export key types for convenient access
pub use error::NetworkError;
pub use ids::{ObservationId, PointId, RunId, SystemId};
pub use network::Network;
pub use storage::{Observation, Point, PointKind, Run, System};
pub use traversal::PathStep;
