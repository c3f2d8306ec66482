//! Correction distribution: closure-mode classification, sectioning between
//! anchors and exact-sum allocation of corrections.

pub mod engine;
pub mod rounding;

pub use engine::{distribute, ClosureMode, Orientation, RunAdjustment, Station};
pub use rounding::snap_corrections;

use crate::graph::{Network, NetworkError, RunId};
use crate::values::Closure;
use tracing::info;

/// Options for a [`adjust_run`] pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustOptions {
    /// Absolute tolerance applied to every reported section closure, in mm.
    pub tolerance_mm: f64,
    pub orientation: Orientation,
    /// Request per-section adjustment even when a single closure would do.
    pub local_adjustment: bool,
}

impl AdjustOptions {
    pub fn with_tolerance(tolerance_mm: f64) -> Self {
        Self {
            tolerance_mm,
            orientation: Orientation::Forward,
            local_adjustment: false,
        }
    }
}

impl RunAdjustment {
    /// The section closures evaluated against a tolerance, in millimeters.
    pub fn closures_mm(&self, tolerance_mm: f64) -> Vec<Closure> {
        self.section_closures
            .iter()
            .map(|&m| Closure::new(m * 1000.0, tolerance_mm))
            .collect()
    }
}

/// Distributes corrections over one run of the network.
///
/// Anchors are the run's benchmark points with known heights; every final
/// correction is written back into its observation.
pub fn adjust_run(
    network: &mut Network,
    run: RunId,
    options: AdjustOptions,
) -> Result<RunAdjustment, NetworkError> {
    let run_ref = network.run(run).ok_or(NetworkError::ForeignRun(run))?;
    let run_name = run_ref.name.clone();

    let observation_ids = run_ref.observations.clone();
    let stations: Vec<Station> = observation_ids
        .iter()
        .filter_map(|&id| network.observation(id))
        .map(|obs| Station {
            index: obs.station_index as usize,
            back_code: network.point(obs.from).map(|p| p.code.clone()),
            fore_code: network.point(obs.to).map(|p| p.code.clone()),
            delta_h: Some(obs.delta_h()),
            back_distance: Some(obs.back_distance.meters()),
            fore_distance: Some(obs.fore_distance.meters()),
        })
        .collect();

    let is_anchor = |code: &crate::values::PointCode| {
        network
            .point_by_code(code)
            .and_then(|id| network.point(id))
            .map(|p| p.is_benchmark() && p.height.is_known())
            .unwrap_or(false)
    };

    let mut corrections: Vec<(usize, f64)> = Vec::new();
    let result = distribute(
        &stations,
        &is_anchor,
        options.orientation,
        options.local_adjustment,
        |index, value| corrections.push((index, value)),
    );

    for (index, value) in corrections {
        if let Some(&obs_id) = observation_ids.get(index) {
            if let Some(obs) = network.observation_mut(obs_id) {
                obs.correction = value;
            }
        }
    }

    info!(
        run = %run_name,
        mode = ?result.mode,
        sections = result.section_closures.len(),
        corrected = result.corrections.len(),
        "run adjusted"
    );
    Ok(result)
}
