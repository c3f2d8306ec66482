//! engine.rs
//! Classifies a run's closure mode and distributes corrections to its
//! stations, section by section, so every section's closure is cancelled
//! exactly.
//!
//! The engine is pure over flat [`Station`] records: anchor knowledge comes
//! in through a caller predicate and corrections leave through a caller
//! setter, so it never touches the graph model directly.

use super::rounding::snap_corrections;
use crate::values::PointCode;
use std::collections::HashSet;

/// One station of a run, flattened for adjustment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Station {
    pub index: usize,
    pub back_code: Option<PointCode>,
    pub fore_code: Option<PointCode>,
    /// Measured height difference; stations without one are skipped from
    /// allocation but still counted in distance totals.
    pub delta_h: Option<f64>,
    pub back_distance: Option<f64>,
    pub fore_distance: Option<f64>,
}

impl Station {
    /// Mean of back and fore sight distance; a missing arm contributes 0.
    fn mean_distance(&self) -> f64 {
        (self.back_distance.unwrap_or(0.0) + self.fore_distance.unwrap_or(0.0)) / 2.0
    }
}

/// Encodes the measurement direction convention as a sign on every delta-h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Forward,
    Reverse,
}

impl Orientation {
    pub fn sign(&self) -> f64 {
        match self {
            Orientation::Forward => 1.0,
            Orientation::Reverse => -1.0,
        }
    }
}

/// How a run's misclosure can be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureMode {
    /// Fewer than two anchors and no loop: nothing to distribute against.
    Open,
    /// One section spanning the whole run.
    Simple,
    /// Independent sections between successive anchors.
    Local,
}

/// The outcome of one distribution pass. Corrections are reported per
/// station index in addition to being applied through the caller's setter.
#[derive(Debug, Clone, PartialEq)]
pub struct RunAdjustment {
    pub mode: ClosureMode,
    /// Oriented closure per section, in meters.
    pub section_closures: Vec<f64>,
    /// Final snapped correction per station index.
    pub corrections: Vec<(usize, f64)>,
    /// Whole-run corrections computed alongside a Local split, so callers
    /// can show single-run and per-section values side by side.
    pub whole_run_corrections: Option<Vec<(usize, f64)>>,
}

impl RunAdjustment {
    fn empty(mode: ClosureMode) -> Self {
        Self {
            mode,
            section_closures: Vec::new(),
            corrections: Vec::new(),
            whole_run_corrections: None,
        }
    }
}

/// Classifies the run and distributes corrections, applying each station's
/// final value through `apply(station_index, correction)`.
pub fn distribute<F>(
    stations: &[Station],
    is_anchor: &dyn Fn(&PointCode) -> bool,
    orientation: Orientation,
    local_adjustment: bool,
    mut apply: F,
) -> RunAdjustment
where
    F: FnMut(usize, f64),
{
    if stations.is_empty() {
        return RunAdjustment::empty(ClosureMode::Open);
    }
    let sign = orientation.sign();

    // Endpoint codes, falling back to the other side of the station when
    // one is blank.
    let start_code = stations[0].back_code.clone().or_else(|| stations[0].fore_code.clone());
    let last = stations.last().unwrap();
    let end_code = last.fore_code.clone().or_else(|| last.back_code.clone());

    let closes_by_loop = matches!((&start_code, &end_code), (Some(s), Some(e)) if s == e);
    let anchored = |code: &Option<PointCode>| code.as_ref().is_some_and(|c| is_anchor(c));
    let is_closed = closes_by_loop || (anchored(&start_code) && anchored(&end_code));

    // Anchor occupancy: a back-code anchor sits at its station's index, a
    // fore-code anchor at the following index, clamped to the list length.
    let mut anchor_positions: Vec<(usize, PointCode)> = Vec::new();
    let mut distinct: HashSet<PointCode> = HashSet::new();
    for (i, station) in stations.iter().enumerate() {
        if let Some(code) = station.back_code.as_ref().filter(|c| is_anchor(c)) {
            anchor_positions.push((i, code.clone()));
            distinct.insert(code.clone());
        }
        if let Some(code) = station.fore_code.as_ref().filter(|c| is_anchor(c)) {
            anchor_positions.push(((i + 1).min(stations.len()), code.clone()));
            distinct.insert(code.clone());
        }
    }
    anchor_positions.dedup_by(|a, b| a.0 == b.0);

    let mode = if !is_closed && distinct.len() < 2 {
        ClosureMode::Open
    } else if (!is_closed && distinct.len() >= 2)
        || (is_closed && (distinct.len() > 1 || local_adjustment))
    {
        ClosureMode::Local
    } else {
        ClosureMode::Simple
    };

    match mode {
        ClosureMode::Open => {
            // No anchors to hold the run: report the raw oriented sum and
            // leave the stations untouched.
            let closure = oriented_sum(stations, sign);
            RunAdjustment {
                mode,
                section_closures: vec![closure],
                corrections: Vec::new(),
                whole_run_corrections: None,
            }
        }
        ClosureMode::Simple => {
            let (closure, corrections) = allocate_section(stations, sign);
            for &(index, value) in &corrections {
                apply(index, value);
            }
            RunAdjustment {
                mode,
                section_closures: vec![closure],
                corrections,
                whole_run_corrections: None,
            }
        }
        ClosureMode::Local => {
            // Baseline whole-run pass, kept for display alongside the
            // per-section values.
            let (_, whole_run) = allocate_section(stations, sign);

            if anchor_positions.len() < 2 {
                // Not enough distinct cut points: degrade to one section.
                let (closure, corrections) = allocate_section(stations, sign);
                for &(index, value) in &corrections {
                    apply(index, value);
                }
                return RunAdjustment {
                    mode,
                    section_closures: vec![closure],
                    corrections,
                    whole_run_corrections: Some(whole_run),
                };
            }

            let mut section_closures = Vec::new();
            let mut corrections = Vec::new();
            let mut bounds: Vec<(usize, usize)> = anchor_positions
                .windows(2)
                .map(|w| (w[0].0, w[1].0))
                .collect();

            // A loop anchored short of the end wraps its tail around as one
            // more section.
            let last_position = anchor_positions.last().unwrap().0;
            let loops_on_anchor =
                anchor_positions.first().unwrap().1 == anchor_positions.last().unwrap().1;
            if closes_by_loop && loops_on_anchor && last_position < stations.len() {
                bounds.push((last_position, stations.len()));
            }

            for (lo, hi) in bounds {
                if lo >= hi {
                    continue;
                }
                let (closure, section) = allocate_section(&stations[lo..hi], sign);
                section_closures.push(closure);
                for &(index, value) in &section {
                    apply(index, value);
                }
                corrections.extend(section);
            }

            RunAdjustment {
                mode,
                section_closures,
                corrections,
                whole_run_corrections: Some(whole_run),
            }
        }
    }
}

fn oriented_sum(stations: &[Station], sign: f64) -> f64 {
    stations.iter().filter_map(|s| s.delta_h).map(|d| d * sign).sum()
}

/// Allocates corrections over one section.
///
/// Proportional to each station's mean sight distance when the section has
/// any length, otherwise split equally among the stations carrying a
/// delta-h. The raw values are snapped to the 0.1 mm grid with an exact sum.
fn allocate_section(stations: &[Station], sign: f64) -> (f64, Vec<(usize, f64)>) {
    let closure = oriented_sum(stations, sign);
    let total_distance: f64 = stations.iter().map(Station::mean_distance).sum();

    let participants: Vec<&Station> =
        stations.iter().filter(|s| s.delta_h.is_some()).collect();
    if participants.is_empty() {
        return (closure, Vec::new());
    }

    let raw: Vec<f64> = if total_distance <= 0.0 {
        vec![-closure / participants.len() as f64; participants.len()]
    } else {
        let factor = -closure / total_distance;
        participants.iter().map(|s| factor * s.mean_distance()).collect()
    };

    let snapped = snap_corrections(&raw);
    let corrections = participants
        .iter()
        .zip(snapped)
        .map(|(station, value)| (station.index, value))
        .collect();
    (closure, corrections)
}
