//! network.rs
//! The aggregate root wrapping [`NetworkStore`] with the levelling-domain
//! mutation and query contract. Graph traversals live in
//! [`super::traversal`].

use super::error::NetworkError;
use super::ids::{ObservationId, PointId, RunId, SystemId};
use super::storage::{NetworkStore, Observation, Point, PointKind, Run, System};
use crate::values::{Closure, Distance, Height, PointCode, Reading};
use serde::{Deserialize, Serialize};

/// Single owner of all points, observations, runs and systems.
///
/// Mutations take `&mut self`; the surrounding application serializes writes
/// (one mutation per command). Read queries may run concurrently with each
/// other.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Network {
    pub(crate) store: NetworkStore,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores the ephemeral lookup state after deserialization.
    pub fn rebuild_caches(&mut self) {
        self.store.rebuild_code_index();
    }

    // --- Point operations ---

    /// Returns the existing point for `code`, or creates a new turning
    /// point. Never fails: the code is already validated by construction.
    pub fn get_or_create_point(&mut self, code: &PointCode) -> PointId {
        if let Some(id) = self.store.point_by_code(code) {
            return id;
        }
        self.store.insert_point(Point::new(code.clone()))
    }

    /// Sets a known elevation on `code` and promotes it to a benchmark.
    pub fn set_benchmark_height(
        &mut self,
        code: &PointCode,
        height: Height,
    ) -> Result<PointId, NetworkError> {
        if !height.is_known() {
            return Err(NetworkError::UnknownBenchmarkHeight(code.clone()));
        }
        let id = self.get_or_create_point(code);
        let point = self.store.point_mut(id).unwrap();
        point.height = height;
        point.kind = PointKind::Benchmark;
        Ok(id)
    }

    /// Reclassifies a point as turning or intermediate. Benchmarks keep
    /// their kind; demotion only happens through an explicit height change.
    pub fn set_point_kind(&mut self, code: &PointCode, kind: PointKind) -> PointId {
        let id = self.get_or_create_point(code);
        let point = self.store.point_mut(id).unwrap();
        if !point.is_benchmark() && kind != PointKind::Benchmark {
            point.kind = kind;
        }
        id
    }

    pub fn point(&self, id: PointId) -> Option<&Point> {
        self.store.point(id)
    }

    pub fn point_by_code(&self, code: &PointCode) -> Option<PointId> {
        self.store.point_by_code(code)
    }

    pub fn points(&self) -> impl Iterator<Item = (PointId, &Point)> {
        self.store.iter_points()
    }

    pub fn point_count(&self) -> usize {
        self.store.iter_points().count()
    }

    // --- Run and system operations ---

    pub fn add_run(&mut self, name: &str, original_number: Option<u32>) -> RunId {
        self.store.insert_run(Run::new(name.to_string(), original_number))
    }

    pub fn run(&self, id: RunId) -> Option<&Run> {
        self.store.run(id)
    }

    pub fn runs(&self) -> impl Iterator<Item = (RunId, &Run)> {
        self.store.iter_runs()
    }

    pub fn run_count(&self) -> usize {
        self.store.iter_runs().count()
    }

    pub fn set_run_active(&mut self, id: RunId, active: bool) -> Result<(), NetworkError> {
        self.store
            .run_mut(id)
            .map(|r| r.is_active = active)
            .ok_or(NetworkError::ForeignRun(id))
    }

    pub fn add_system(&mut self, sid: &str, name: &str, order: u32) -> SystemId {
        self.store.insert_system(System {
            sid: sid.to_string(),
            name: name.to_string(),
            order,
            runs: Vec::new(),
        })
    }

    pub fn system(&self, id: SystemId) -> Option<&System> {
        self.store.system(id)
    }

    pub fn systems(&self) -> impl Iterator<Item = (SystemId, &System)> {
        self.store.iter_systems()
    }

    pub fn system_by_sid(&self, sid: &str) -> Option<SystemId> {
        self.store.iter_systems().find(|(_, s)| s.sid == sid).map(|(id, _)| id)
    }

    /// Moves a run into `system`, detaching it from its previous system so a
    /// run always belongs to exactly one system at a time.
    pub fn assign_run_to_system(
        &mut self,
        run: RunId,
        system: SystemId,
    ) -> Result<(), NetworkError> {
        if self.store.run(run).is_none() {
            return Err(NetworkError::ForeignRun(run));
        }
        if self.store.system(system).is_none() {
            return Err(NetworkError::ForeignSystem(system));
        }

        let previous = self.store.run(run).unwrap().system;
        if previous == Some(system) {
            return Ok(());
        }
        if let Some(prev) = previous.and_then(|p| self.store.system_mut(p)) {
            prev.runs.retain(|&r| r != run);
        }
        self.store.system_mut(system).unwrap().runs.push(run);
        self.store.run_mut(run).unwrap().system = Some(system);
        Ok(())
    }

    /// Deletes a system; its runs become unassigned.
    pub fn remove_system(&mut self, id: SystemId) -> Result<(), NetworkError> {
        let system = self
            .store
            .systems
            .get_mut(id.index())
            .and_then(|slot| slot.take())
            .ok_or(NetworkError::ForeignSystem(id))?;
        for run in system.runs {
            if let Some(r) = self.store.run_mut(run) {
                r.system = None;
            }
        }
        Ok(())
    }

    // --- Observations ---

    /// Appends one station to `run`, creating its endpoints lazily.
    ///
    /// Fails if `run` is not owned by this network, or if `from` breaks the
    /// run's chain (every observation must start where the previous one
    /// ended).
    #[allow(clippy::too_many_arguments)]
    pub fn add_observation(
        &mut self,
        run: RunId,
        from: &PointCode,
        to: &PointCode,
        back_reading: Reading,
        fore_reading: Reading,
        back_distance: Distance,
        fore_distance: Distance,
    ) -> Result<ObservationId, NetworkError> {
        let run_ref = self.store.run(run).ok_or(NetworkError::ForeignRun(run))?;
        let station_index = run_ref.observations.len();

        if let Some(&last) = run_ref.observations.last() {
            let last_to = self.store.observation(last).map(|o| o.to).unwrap();
            let expected = self.store.point(last_to).unwrap().code.clone();
            if expected != *from {
                return Err(NetworkError::ChainViolation {
                    run: run_ref.name.clone(),
                    index: station_index,
                    expected,
                    actual: from.clone(),
                });
            }
        }

        let from_id = self.get_or_create_point(from);
        let to_id = self.get_or_create_point(to);
        let id = self.store.insert_observation(Observation {
            from: from_id,
            to: to_id,
            run,
            station_index: station_index as u32,
            back_reading,
            fore_reading,
            back_distance,
            fore_distance,
            correction: 0.0,
        });
        Ok(id)
    }

    pub fn observation(&self, id: ObservationId) -> Option<&Observation> {
        self.store.observation(id)
    }

    pub fn observation_mut(&mut self, id: ObservationId) -> Option<&mut Observation> {
        self.store.observation_mut(id)
    }

    pub fn observations(&self) -> impl Iterator<Item = (ObservationId, &Observation)> {
        self.store.iter_observations()
    }

    /// Detaches all of a run's observations from their points, then prunes
    /// any non-benchmark point left with no edges.
    pub fn remove_run(&mut self, id: RunId) -> Result<(), NetworkError> {
        let run = self
            .store
            .runs
            .get_mut(id.index())
            .and_then(|slot| slot.take())
            .ok_or(NetworkError::ForeignRun(id))?;

        let mut touched = Vec::new();
        for obs_id in &run.observations {
            if let Some(obs) = self.store.observation(*obs_id) {
                touched.push(obs.from);
                touched.push(obs.to);
            }
            self.store.detach_observation(*obs_id);
        }

        touched.sort_unstable();
        touched.dedup();
        for point_id in touched {
            if let Some(point) = self.store.point(point_id) {
                if point.degree() == 0 && !point.is_benchmark() {
                    self.store.remove_point(point_id);
                }
            }
        }

        if let Some(system) = run.system.and_then(|s| self.store.system_mut(s)) {
            system.runs.retain(|&r| r != id);
        }
        Ok(())
    }

    // --- Derived run properties ---

    /// The run's first `from` point, if it has any observations.
    pub fn run_start_point(&self, run: RunId) -> Option<PointId> {
        let run = self.store.run(run)?;
        let first = *run.observations.first()?;
        Some(self.store.observation(first)?.from)
    }

    /// The run's last `to` point, if it has any observations.
    pub fn run_end_point(&self, run: RunId) -> Option<PointId> {
        let run = self.store.run(run)?;
        let last = *run.observations.last()?;
        Some(self.store.observation(last)?.to)
    }

    /// Total levelled length of the run (sum of station lengths).
    pub fn run_length(&self, run: RunId) -> Distance {
        self.store
            .run(run)
            .map(|r| {
                r.observations
                    .iter()
                    .filter_map(|&o| self.store.observation(o))
                    .fold(Distance::ZERO, |acc, o| acc + o.station_length())
            })
            .unwrap_or(Distance::ZERO)
    }

    /// Evaluates the run's misclosure against `tolerance_mm` and caches it
    /// on the run.
    ///
    /// Returns `Ok(None)` when either endpoint height is unknown: an open
    /// run simply has no closure, which is not an error.
    pub fn calculate_closure(
        &mut self,
        run: RunId,
        tolerance_mm: f64,
    ) -> Result<Option<Closure>, NetworkError> {
        if self.store.run(run).is_none() {
            return Err(NetworkError::ForeignRun(run));
        }
        let start = self.run_start_point(run).and_then(|p| self.store.point(p));
        let end = self.run_end_point(run).and_then(|p| self.store.point(p));

        let closure = match (start, end) {
            (Some(s), Some(e)) => match e.height.diff(&s.height) {
                Ok(theoretical) => {
                    let measured: f64 = self
                        .store
                        .run(run)
                        .unwrap()
                        .observations
                        .iter()
                        .filter_map(|&o| self.store.observation(o))
                        .map(|o| o.delta_h())
                        .sum();
                    Some(Closure::new((measured - theoretical) * 1000.0, tolerance_mm))
                }
                // One endpoint is unknown: the closure is unavailable.
                Err(_) => None,
            },
            _ => None,
        };

        self.store.run_mut(run).unwrap().closure = closure;
        Ok(closure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> PointCode {
        PointCode::new(s).unwrap()
    }

    fn dist(m: f64) -> Distance {
        Distance::new(m).unwrap()
    }

    /// Builds a run A -> B -> C with the given delta-h per station (fore
    /// reading 0, back reading delta) and 10 m sights on both arms.
    fn chain_network(deltas: &[f64]) -> (Network, RunId) {
        let mut net = Network::new();
        let run = net.add_run("L1", Some(1));
        let names = ["A", "B", "C", "D", "E", "F"];
        for (i, &d) in deltas.iter().enumerate() {
            net.add_observation(
                run,
                &code(names[i]),
                &code(names[i + 1]),
                Reading(d),
                Reading(0.0),
                dist(10.0),
                dist(10.0),
            )
            .unwrap();
        }
        (net, run)
    }

    #[test]
    fn points_are_created_lazily_and_deduplicated() {
        let (net, _) = chain_network(&[0.1, 0.2]);
        assert_eq!(net.point_count(), 3);
        let b = net.point_by_code(&code("b")).unwrap();
        assert_eq!(net.point(b).unwrap().kind, PointKind::TurningPoint);
        assert_eq!(net.point(b).unwrap().degree(), 2);
    }

    #[test]
    fn chain_violation_fails_the_build() {
        let mut net = Network::new();
        let run = net.add_run("L1", None);
        net.add_observation(
            run,
            &code("A"),
            &code("B"),
            Reading(1.0),
            Reading(0.5),
            dist(10.0),
            dist(10.0),
        )
        .unwrap();

        let err = net
            .add_observation(
                run,
                &code("C"),
                &code("D"),
                Reading(1.0),
                Reading(0.5),
                dist(10.0),
                dist(10.0),
            )
            .unwrap_err();
        match err {
            NetworkError::ChainViolation { index, expected, actual, .. } => {
                assert_eq!(index, 1);
                assert_eq!(expected, code("B"));
                assert_eq!(actual, code("C"));
            }
            other => panic!("expected chain violation, got {other:?}"),
        }
    }

    #[test]
    fn foreign_run_is_rejected() {
        let mut net = Network::new();
        let err = net
            .add_observation(
                RunId::new(7),
                &code("A"),
                &code("B"),
                Reading(0.0),
                Reading(0.0),
                Distance::ZERO,
                Distance::ZERO,
            )
            .unwrap_err();
        assert_eq!(err, NetworkError::ForeignRun(RunId::new(7)));
    }

    #[test]
    fn benchmark_requires_known_height() {
        let mut net = Network::new();
        let err = net.set_benchmark_height(&code("BM1"), Height::Unknown).unwrap_err();
        assert_eq!(err, NetworkError::UnknownBenchmarkHeight(code("BM1")));

        let id = net.set_benchmark_height(&code("BM1"), Height::Known(120.5)).unwrap();
        let point = net.point(id).unwrap();
        assert!(point.is_benchmark());
        assert_eq!(point.height, Height::Known(120.5));
    }

    #[test]
    fn set_point_kind_never_demotes_a_benchmark() {
        let mut net = Network::new();
        net.set_benchmark_height(&code("BM1"), Height::Known(10.0)).unwrap();
        let id = net.set_point_kind(&code("BM1"), PointKind::Intermediate);
        assert!(net.point(id).unwrap().is_benchmark());

        let tp = net.set_point_kind(&code("S1"), PointKind::Intermediate);
        assert_eq!(net.point(tp).unwrap().kind, PointKind::Intermediate);
    }

    #[test]
    fn closure_round_trip_is_zero_for_consistent_measurements() {
        let (mut net, run) = chain_network(&[0.75, -0.25]);
        net.set_benchmark_height(&code("A"), Height::Known(100.0)).unwrap();
        net.set_benchmark_height(&code("C"), Height::Known(100.5)).unwrap();

        let closure = net.calculate_closure(run, 5.0).unwrap().unwrap();
        assert!(closure.value_mm.abs() < 1e-9);
        assert!(closure.within_tolerance());
        assert_eq!(net.run(run).unwrap().closure, Some(closure));
    }

    #[test]
    fn open_run_has_no_closure() {
        let (mut net, run) = chain_network(&[0.75, -0.25]);
        net.set_benchmark_height(&code("A"), Height::Known(100.0)).unwrap();
        assert_eq!(net.calculate_closure(run, 5.0).unwrap(), None);
        assert_eq!(net.run(run).unwrap().closure, None);
    }

    #[test]
    fn observation_derived_quantities() {
        let mut net = Network::new();
        let run = net.add_run("L1", None);
        let id = net
            .add_observation(
                run,
                &code("A"),
                &code("B"),
                Reading(1.452),
                Reading(0.988),
                dist(32.0),
                dist(28.0),
            )
            .unwrap();
        let obs = net.observation(id).unwrap();
        assert!((obs.delta_h() - 0.464).abs() < 1e-12);
        assert_eq!(obs.station_length().meters(), 60.0);
        assert_eq!(obs.arm_difference(), 4.0);
        assert_eq!(obs.mean_sight_distance(), 30.0);

        net.observation_mut(id).unwrap().correction = -0.004;
        assert!((net.observation(id).unwrap().adjusted_delta_h() - 0.460).abs() < 1e-12);
    }

    #[test]
    fn remove_run_prunes_orphans_but_keeps_benchmarks() {
        let (mut net, run) = chain_network(&[0.1, 0.2]);
        net.set_benchmark_height(&code("A"), Height::Known(50.0)).unwrap();

        net.remove_run(run).unwrap();
        // B and C were turning points with no remaining edges.
        assert_eq!(net.point_by_code(&code("B")), None);
        assert_eq!(net.point_by_code(&code("C")), None);
        // The benchmark survives at degree 0.
        let a = net.point_by_code(&code("A")).unwrap();
        assert_eq!(net.point(a).unwrap().degree(), 0);
        assert_eq!(net.observations().count(), 0);
    }

    #[test]
    fn remove_run_keeps_points_still_used_by_other_runs() {
        let (mut net, run1) = chain_network(&[0.1, 0.2]);
        let run2 = net.add_run("L2", None);
        net.add_observation(
            run2,
            &code("C"),
            &code("D"),
            Reading(0.3),
            Reading(0.1),
            dist(10.0),
            dist(10.0),
        )
        .unwrap();

        net.remove_run(run1).unwrap();
        // C is still an endpoint of run 2.
        assert!(net.point_by_code(&code("C")).is_some());
        assert!(net.point_by_code(&code("B")).is_none());
        // Only the run-2 edge survives in C's lists.
        let c = net.point_by_code(&code("C")).unwrap();
        assert_eq!(net.point(c).unwrap().degree(), 1);
    }

    #[test]
    fn closure_sign_follows_end_minus_start() {
        // Measured sum is 0.504 m against a true rise of 0.500 m, so the
        // run overshoots by +4.0 mm.
        let (mut net, run) = chain_network(&[0.754, -0.25]);
        net.set_benchmark_height(&code("A"), Height::Known(100.0)).unwrap();
        net.set_benchmark_height(&code("C"), Height::Known(100.5)).unwrap();

        let closure = net.calculate_closure(run, 5.0).unwrap().unwrap();
        assert!((closure.value_mm - 4.0).abs() < 1e-9);
    }

    #[test]
    fn a_run_belongs_to_exactly_one_system() {
        let (mut net, run) = chain_network(&[0.1]);
        let s1 = net.add_system("system-default", "Default", 0);
        let s2 = net.add_system("system-auto-1", "System 2", 1);

        net.assign_run_to_system(run, s1).unwrap();
        net.assign_run_to_system(run, s2).unwrap();

        assert!(net.system(s1).unwrap().runs.is_empty());
        assert_eq!(net.system(s2).unwrap().runs, vec![run]);
        assert_eq!(net.run(run).unwrap().system, Some(s2));
    }

    #[test]
    fn foreign_system_assignment_is_rejected() {
        let (mut net, run) = chain_network(&[0.1]);
        let err = net.assign_run_to_system(run, SystemId::new(9)).unwrap_err();
        assert_eq!(err, NetworkError::ForeignSystem(SystemId::new(9)));
    }

    #[test]
    fn runs_can_be_deactivated() {
        let (mut net, run) = chain_network(&[0.1]);
        assert!(net.run(run).unwrap().is_active);
        net.set_run_active(run, false).unwrap();
        assert!(!net.run(run).unwrap().is_active);
        assert!(net.set_run_active(RunId::new(5), false).is_err());
    }

    #[test]
    fn removing_a_system_unassigns_its_runs() {
        let (mut net, run) = chain_network(&[0.1]);
        let s1 = net.add_system("system-default", "Default", 0);
        net.assign_run_to_system(run, s1).unwrap();
        net.remove_system(s1).unwrap();
        assert_eq!(net.run(run).unwrap().system, None);
        assert_eq!(net.system_by_sid("system-default"), None);
    }

    #[test]
    fn serde_round_trip_rebuilds_the_code_index() {
        let (net, _) = chain_network(&[0.1, 0.2]);
        let json = serde_json::to_string(&net).unwrap();
        let mut restored: Network = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.point_by_code(&code("B")), None);
        restored.rebuild_caches();
        assert!(restored.point_by_code(&code("B")).is_some());
    }
}
