//! storage.rs
//! Owning arenas for all graph entities.
//!
//! Every entity lives in a slot vector indexed by its id; a removed entity
//! leaves a `None` tombstone so ids stay stable. The code lookup map is
//! ephemeral and rebuilt after deserialization.

use super::ids::{ObservationId, PointId, RunId, SystemId};
use crate::values::{Closure, Distance, Height, PointCode, Reading};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Classification of a survey point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointKind {
    /// A point with a known, authoritative elevation.
    Benchmark,
    /// A temporary change point the instrument moves over.
    TurningPoint,
    /// A side-shot target outside the run chain.
    Intermediate,
}

/// A graph node: one physical survey point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub code: PointCode,
    pub height: Height,
    pub kind: PointKind,
    /// Observations leaving this point (it was the back-sight).
    pub outgoing: SmallVec<[ObservationId; 4]>,
    /// Observations arriving at this point (it was the fore-sight).
    pub incoming: SmallVec<[ObservationId; 4]>,
}

impl Point {
    pub fn new(code: PointCode) -> Self {
        Self {
            code,
            height: Height::Unknown,
            kind: PointKind::TurningPoint,
            outgoing: SmallVec::new(),
            incoming: SmallVec::new(),
        }
    }

    pub fn degree(&self) -> usize {
        self.outgoing.len() + self.incoming.len()
    }

    pub fn is_benchmark(&self) -> bool {
        self.kind == PointKind::Benchmark
    }
}

// Identity is the code alone; edge lists and height are mutable state.
impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}
impl Eq for Point {}
impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

/// A directed graph edge: one levelling station.
///
/// All measured fields are set once at construction; only `correction` is
/// written later, by the adjustment engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub from: PointId,
    pub to: PointId,
    pub run: RunId,
    pub station_index: u32,
    pub back_reading: Reading,
    pub fore_reading: Reading,
    pub back_distance: Distance,
    pub fore_distance: Distance,
    pub correction: f64,
}

impl Observation {
    /// Measured height difference: back reading minus fore reading.
    pub fn delta_h(&self) -> f64 {
        self.back_reading.0 - self.fore_reading.0
    }

    pub fn station_length(&self) -> Distance {
        self.back_distance + self.fore_distance
    }

    /// Back minus fore sight distance; large values indicate unbalanced setups.
    pub fn arm_difference(&self) -> f64 {
        self.back_distance.meters() - self.fore_distance.meters()
    }

    pub fn adjusted_delta_h(&self) -> f64 {
        self.delta_h() + self.correction
    }

    /// Mean of back and fore sight distances, the weight used when
    /// distributing corrections.
    pub fn mean_sight_distance(&self) -> f64 {
        (self.back_distance.meters() + self.fore_distance.meters()) / 2.0
    }
}

/// An ordered chain of observations between two (possibly identical) points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub name: String,
    /// Line number in the source document this run was imported from.
    pub original_number: Option<u32>,
    pub is_active: bool,
    pub system: Option<SystemId>,
    pub observations: Vec<ObservationId>,
    /// Last evaluated misclosure; `None` until evaluated or when open.
    pub closure: Option<Closure>,
}

impl Run {
    pub fn new(name: String, original_number: Option<u32>) -> Self {
        Self {
            name,
            original_number,
            is_active: true,
            system: None,
            observations: Vec::new(),
            closure: None,
        }
    }
}

/// A named group of runs sharing one consistent height datum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct System {
    /// Stable external identifier (e.g. `system-default`, `system-auto-1`).
    pub sid: String,
    /// Human-readable display name.
    pub name: String,
    /// Display ordering among systems.
    pub order: u32,
    pub runs: Vec<RunId>,
}

/// The slot arenas behind [`super::Network`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkStore {
    pub points: Vec<Option<Point>>,
    pub observations: Vec<Option<Observation>>,
    pub runs: Vec<Option<Run>>,
    pub systems: Vec<Option<System>>,

    // Ephemeral lookup, rebuilt on load.
    #[serde(skip)]
    pub code_index: HashMap<PointCode, PointId>,
}

impl NetworkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the `code_index` map after deserialization.
    pub fn rebuild_code_index(&mut self) {
        self.code_index = self
            .points
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                slot.as_ref().map(|p| (p.code.clone(), PointId::new(i)))
            })
            .collect();
    }

    // --- Points ---

    pub fn point(&self, id: PointId) -> Option<&Point> {
        self.points.get(id.index()).and_then(|s| s.as_ref())
    }

    pub fn point_mut(&mut self, id: PointId) -> Option<&mut Point> {
        self.points.get_mut(id.index()).and_then(|s| s.as_mut())
    }

    pub fn point_by_code(&self, code: &PointCode) -> Option<PointId> {
        self.code_index.get(code).copied()
    }

    pub fn insert_point(&mut self, point: Point) -> PointId {
        let id = PointId::new(self.points.len());
        self.code_index.insert(point.code.clone(), id);
        self.points.push(Some(point));
        id
    }

    /// Removes a point slot and its lookup entry. Callers must have already
    /// detached every observation referencing it.
    pub fn remove_point(&mut self, id: PointId) {
        if let Some(point) = self.points[id.index()].take() {
            self.code_index.remove(&point.code);
        }
    }

    pub fn iter_points(&self) -> impl Iterator<Item = (PointId, &Point)> {
        self.points
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|p| (PointId::new(i), p)))
    }

    // --- Observations ---

    pub fn observation(&self, id: ObservationId) -> Option<&Observation> {
        self.observations.get(id.index()).and_then(|s| s.as_ref())
    }

    pub fn observation_mut(&mut self, id: ObservationId) -> Option<&mut Observation> {
        self.observations.get_mut(id.index()).and_then(|s| s.as_mut())
    }

    /// Inserts an observation and links it into both endpoint edge lists and
    /// the owning run's chain.
    pub fn insert_observation(&mut self, obs: Observation) -> ObservationId {
        let id = ObservationId::new(self.observations.len());
        let (from, to, run) = (obs.from, obs.to, obs.run);
        self.observations.push(Some(obs));

        if let Some(p) = self.point_mut(from) {
            p.outgoing.push(id);
        }
        if let Some(p) = self.point_mut(to) {
            p.incoming.push(id);
        }
        if let Some(r) = self.run_mut(run) {
            r.observations.push(id);
        }
        id
    }

    /// Unlinks an observation from both endpoints and drops its slot.
    /// Does not touch the owning run's list; run removal handles that.
    pub fn detach_observation(&mut self, id: ObservationId) {
        if let Some(obs) = self.observations[id.index()].take() {
            if let Some(p) = self.point_mut(obs.from) {
                p.outgoing.retain(|o| *o != id);
            }
            if let Some(p) = self.point_mut(obs.to) {
                p.incoming.retain(|o| *o != id);
            }
        }
    }

    pub fn iter_observations(&self) -> impl Iterator<Item = (ObservationId, &Observation)> {
        self.observations
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|o| (ObservationId::new(i), o)))
    }

    // --- Runs ---

    pub fn run(&self, id: RunId) -> Option<&Run> {
        self.runs.get(id.index()).and_then(|s| s.as_ref())
    }

    pub fn run_mut(&mut self, id: RunId) -> Option<&mut Run> {
        self.runs.get_mut(id.index()).and_then(|s| s.as_mut())
    }

    pub fn insert_run(&mut self, run: Run) -> RunId {
        let id = RunId::new(self.runs.len());
        self.runs.push(Some(run));
        id
    }

    pub fn iter_runs(&self) -> impl Iterator<Item = (RunId, &Run)> {
        self.runs
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|r| (RunId::new(i), r)))
    }

    // --- Systems ---

    pub fn system(&self, id: SystemId) -> Option<&System> {
        self.systems.get(id.index()).and_then(|s| s.as_ref())
    }

    pub fn system_mut(&mut self, id: SystemId) -> Option<&mut System> {
        self.systems.get_mut(id.index()).and_then(|s| s.as_mut())
    }

    pub fn insert_system(&mut self, system: System) -> SystemId {
        let id = SystemId::new(self.systems.len());
        self.systems.push(Some(system));
        id
    }

    pub fn iter_systems(&self) -> impl Iterator<Item = (SystemId, &System)> {
        self.systems
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (SystemId::new(i), s)))
    }
}
