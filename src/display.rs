//! display.rs
//! Flat summary records for presentation and export.
//!
//! Everything here is derived from the network's public read accessors;
//! windows, canvases and CSV writers in the host application consume these
//! records without ever reaching into the graph.

use crate::graph::{Network, PointKind, RunId};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSummary {
    pub point_count: usize,
    pub benchmark_count: usize,
    pub observation_count: usize,
    pub run_count: usize,
    pub system_count: usize,
    pub total_length_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub name: String,
    pub original_number: Option<u32>,
    pub is_active: bool,
    pub system: Option<String>,
    pub station_count: usize,
    pub length_m: f64,
    pub start_point: Option<String>,
    pub end_point: Option<String>,
    /// Formatted misclosure, e.g. `+4.0 mm (tol 5.0 mm, OK)`.
    pub closure: Option<String>,
    pub within_tolerance: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationRow {
    pub station_index: u32,
    pub from: String,
    pub to: String,
    pub delta_h: f64,
    pub station_length_m: f64,
    pub arm_difference_m: f64,
    pub correction: f64,
    pub adjusted_delta_h: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointSummary {
    pub code: String,
    pub kind: &'static str,
    pub height: Option<f64>,
    pub degree: usize,
    /// True when stations of at least two runs reference this point.
    pub is_shared: bool,
}

fn kind_label(kind: PointKind) -> &'static str {
    match kind {
        PointKind::Benchmark => "benchmark",
        PointKind::TurningPoint => "turning point",
        PointKind::Intermediate => "intermediate",
    }
}

pub fn summarize_network(network: &Network) -> NetworkSummary {
    NetworkSummary {
        point_count: network.point_count(),
        benchmark_count: network.points().filter(|(_, p)| p.is_benchmark()).count(),
        observation_count: network.observations().count(),
        run_count: network.run_count(),
        system_count: network.systems().count(),
        total_length_m: network
            .runs()
            .map(|(id, _)| network.run_length(id).meters())
            .sum(),
    }
}

pub fn summarize_run(network: &Network, id: RunId) -> Option<RunSummary> {
    let run = network.run(id)?;
    let point_code = |p| {
        network
            .point(p)
            .map(|point| point.code.as_str().to_string())
    };
    Some(RunSummary {
        name: run.name.clone(),
        original_number: run.original_number,
        is_active: run.is_active,
        system: run
            .system
            .and_then(|s| network.system(s))
            .map(|s| s.name.clone()),
        station_count: run.observations.len(),
        length_m: network.run_length(id).meters(),
        start_point: network.run_start_point(id).and_then(|p| point_code(p)),
        end_point: network.run_end_point(id).and_then(|p| point_code(p)),
        closure: run.closure.map(|c| c.to_string()),
        within_tolerance: run.closure.map(|c| c.within_tolerance()),
    })
}

pub fn observation_rows(network: &Network, id: RunId) -> Vec<ObservationRow> {
    let Some(run) = network.run(id) else {
        return Vec::new();
    };
    run.observations
        .iter()
        .filter_map(|&obs_id| network.observation(obs_id))
        .map(|obs| ObservationRow {
            station_index: obs.station_index,
            from: network
                .point(obs.from)
                .map(|p| p.code.as_str().to_string())
                .unwrap_or_default(),
            to: network
                .point(obs.to)
                .map(|p| p.code.as_str().to_string())
                .unwrap_or_default(),
            delta_h: obs.delta_h(),
            station_length_m: obs.station_length().meters(),
            arm_difference_m: obs.arm_difference(),
            correction: obs.correction,
            adjusted_delta_h: obs.adjusted_delta_h(),
        })
        .collect()
}

/// Point table ordered by code.
pub fn summarize_points(network: &Network) -> Vec<PointSummary> {
    let mut points: Vec<PointSummary> = network
        .points()
        .map(|(_, point)| {
            let runs: HashSet<_> = point
                .outgoing
                .iter()
                .chain(point.incoming.iter())
                .filter_map(|&o| network.observation(o))
                .map(|o| o.run)
                .collect();
            PointSummary {
                code: point.code.as_str().to_string(),
                kind: kind_label(point.kind),
                height: point.height.value(),
                degree: point.degree(),
                is_shared: runs.len() >= 2,
            }
        })
        .collect();
    points.sort_by(|a, b| a.code.cmp(&b.code));
    points
}
