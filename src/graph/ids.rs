//! ids.rs
//! Stable arena indices for every entity the network owns.
//!
//! Entities refer to each other by these indices instead of pointers, which
//! sidesteps cyclic ownership between points, observations and runs.

use serde::{Deserialize, Serialize};

macro_rules! arena_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
            Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            #[inline(always)]
            pub fn index(&self) -> usize { self.0 as usize }
            pub fn new(idx: usize) -> Self { Self(idx as u32) }
        }
    };
}

arena_id!(
    /// Index of a [`super::Point`] in the network's point arena.
    PointId
);
arena_id!(
    /// Index of an [`super::Observation`] in the observation arena.
    ObservationId
);
arena_id!(
    /// Index of a [`super::Run`] in the run arena.
    RunId
);
arena_id!(
    /// Index of a [`super::System`] in the system arena.
    SystemId
);
