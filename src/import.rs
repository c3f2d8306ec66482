//! import.rs
//! The input-builder boundary: flat measurement records, as produced by the
//! surrounding application's raw-file parsers, grouped into stations and
//! fed to the graph model.
//!
//! Parsing vendor text dumps is not this crate's job; by the time records
//! arrive here they are already plain data. Recoverable problems (unmatched
//! sights, unusable codes) are collected into one combined report so a user
//! can fix several at once; chain violations remain fatal.

use crate::graph::{Network, NetworkError, RunId};
use crate::values::{Distance, PointCode, Reading};
use tracing::info;

/// Observation order convention of a levelling line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StationMode {
    /// Back-sight first, fore-sight second.
    #[default]
    Bf,
    /// Fore-sight first, back-sight second.
    Fb,
}

/// One sight taken to a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sight {
    pub reading: Reading,
    pub distance: Option<Distance>,
}

/// One flat record from the import layer: the sights taken **to** `point`.
///
/// A turning point typically carries both a fore-sight (arriving) and a
/// back-sight (leaving); line endpoints carry only one of the two.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeasurementRecord {
    /// Sequence number from the source document, if present.
    pub number: Option<u32>,
    pub mode: StationMode,
    /// Raw target point code; normalized here.
    pub point: String,
    pub back: Option<Sight>,
    pub fore: Option<Sight>,
    pub line_start: bool,
    pub line_end: bool,
    /// Line number in the original file, for error messages.
    pub source_line: u32,
}

/// What an import pass produced: the network, the runs built into it and
/// every recoverable problem encountered along the way.
#[derive(Debug)]
pub struct ImportOutcome {
    pub network: Network,
    pub runs: Vec<RunId>,
    pub errors: Vec<String>,
}

impl ImportOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Builds a network from measurement records.
///
/// A back-sight opens a pending station; the next fore-sight closes it as
/// one observation. Every `line_start` begins a new run. Incomplete pairs
/// are reported, not fatal: the network keeps everything built before them.
pub fn build_network(records: &[MeasurementRecord]) -> Result<ImportOutcome, NetworkError> {
    let mut network = Network::new();
    let mut runs: Vec<RunId> = Vec::new();
    let mut errors: Vec<String> = Vec::new();

    let mut current_run: Option<RunId> = None;
    // (from-point, its back-sight, record number of the opening record)
    let mut pending: Option<(PointCode, Sight, Option<u32>)> = None;

    let flush_pending = |pending: &mut Option<(PointCode, Sight, Option<u32>)>,
                         errors: &mut Vec<String>,
                         at_line: u32| {
        if let Some((code, ..)) = pending.take() {
            errors.push(format!(
                "line {at_line}: back-sight to '{code}' was never matched by a fore-sight"
            ));
        }
    };

    for record in records {
        if record.line_start {
            flush_pending(&mut pending, &mut errors, record.source_line);
            current_run = None;
        }

        let code = match PointCode::new(&record.point) {
            Ok(code) => code,
            Err(err) => {
                errors.push(format!("line {}: {err}", record.source_line));
                continue;
            }
        };

        // Arriving sight first: it closes the pending station. The run is
        // created only once a completed station is about to land in it, so
        // rejected records never leave an empty run behind.
        if let Some(fore) = record.fore {
            match pending.take() {
                Some((from, back, number)) => {
                    let run = match current_run {
                        Some(id) => id,
                        None => {
                            let id =
                                network.add_run(&format!("Line {}", runs.len() + 1), number);
                            runs.push(id);
                            current_run = Some(id);
                            id
                        }
                    };
                    network.add_observation(
                        run,
                        &from,
                        &code,
                        back.reading,
                        fore.reading,
                        back.distance.unwrap_or(Distance::ZERO),
                        fore.distance.unwrap_or(Distance::ZERO),
                    )?;
                }
                None => errors.push(format!(
                    "line {}: fore-sight to '{code}' has no matching back-sight",
                    record.source_line
                )),
            }
        }

        // Leaving sight second: it opens the next station.
        if let Some(back) = record.back {
            flush_pending(&mut pending, &mut errors, record.source_line);
            pending = Some((code, back, record.number));
        }

        if record.line_end {
            flush_pending(&mut pending, &mut errors, record.source_line);
            current_run = None;
        }
    }

    let last_line = records.last().map(|r| r.source_line).unwrap_or(0);
    flush_pending(&mut pending, &mut errors, last_line);

    info!(
        runs = runs.len(),
        observations = network.observations().count(),
        errors = errors.len(),
        "measurement records imported"
    );
    Ok(ImportOutcome { network, runs, errors })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sight(reading: f64, distance: f64) -> Option<Sight> {
        Some(Sight {
            reading: Reading(reading),
            distance: Some(Distance::new(distance).unwrap()),
        })
    }

    fn record(point: &str, back: Option<Sight>, fore: Option<Sight>, line: u32) -> MeasurementRecord {
        MeasurementRecord {
            point: point.to_string(),
            back,
            fore,
            source_line: line,
            ..Default::default()
        }
    }

    fn code(s: &str) -> PointCode {
        PointCode::new(s).unwrap()
    }

    #[test]
    fn complete_line_builds_a_chained_run() {
        let records = [
            MeasurementRecord { line_start: true, ..record("A", sight(1.452, 30.0), None, 1) },
            record("B", sight(1.300, 25.0), sight(0.988, 28.0), 2),
            MeasurementRecord { line_end: true, ..record("C", None, sight(1.821, 26.0), 3) },
        ];
        let outcome = build_network(&records).unwrap();

        assert!(outcome.is_clean(), "{:?}", outcome.errors);
        assert_eq!(outcome.runs.len(), 1);
        let run = outcome.network.run(outcome.runs[0]).unwrap();
        assert_eq!(run.observations.len(), 2);

        let first = outcome.network.observation(run.observations[0]).unwrap();
        assert!((first.delta_h() - (1.452 - 0.988)).abs() < 1e-12);
        assert_eq!(outcome.network.point(first.from).unwrap().code, code("A"));
        assert_eq!(outcome.network.point(first.to).unwrap().code, code("B"));

        let start = outcome.network.run_start_point(outcome.runs[0]).unwrap();
        let end = outcome.network.run_end_point(outcome.runs[0]).unwrap();
        assert_eq!(outcome.network.point(start).unwrap().code, code("A"));
        assert_eq!(outcome.network.point(end).unwrap().code, code("C"));
    }

    #[test]
    fn each_line_start_opens_a_new_run() {
        let records = [
            MeasurementRecord { line_start: true, ..record("A", sight(1.0, 10.0), None, 1) },
            MeasurementRecord { line_end: true, ..record("B", None, sight(0.5, 10.0), 2) },
            MeasurementRecord { line_start: true, ..record("B", sight(1.2, 10.0), None, 3) },
            MeasurementRecord { line_end: true, ..record("C", None, sight(0.7, 10.0), 4) },
        ];
        let outcome = build_network(&records).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.runs.len(), 2);
        assert_eq!(outcome.network.run(outcome.runs[0]).unwrap().name, "Line 1");
        assert_eq!(outcome.network.run(outcome.runs[1]).unwrap().name, "Line 2");
    }

    #[test]
    fn trailing_back_sight_is_reported_not_fatal() {
        let records = [
            MeasurementRecord { line_start: true, ..record("A", sight(1.0, 10.0), None, 1) },
            record("B", sight(1.2, 10.0), sight(0.5, 10.0), 2),
            // Back-sight at C never gets its fore-sight.
            record("C", sight(1.1, 10.0), sight(0.6, 10.0), 3),
        ];
        let outcome = build_network(&records).unwrap();

        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("line 3"));
        assert!(outcome.errors[0].contains("'C'"));
        // Everything built before the fault survives.
        let run = outcome.network.run(outcome.runs[0]).unwrap();
        assert_eq!(run.observations.len(), 2);
    }

    #[test]
    fn multiple_problems_are_collected_in_one_report() {
        let records = [
            // Fore-sight with nothing pending.
            MeasurementRecord { line_start: true, ..record("A", None, sight(0.5, 10.0), 1) },
            // Unusable point code.
            record("  ", sight(1.0, 10.0), None, 2),
            // Back-sight replaced before being matched.
            record("D", sight(1.1, 10.0), None, 3),
            record("E", sight(1.2, 10.0), None, 4),
        ];
        let outcome = build_network(&records).unwrap();
        // Orphan fore at A, blank code, D's unmatched back, E's trailing back.
        assert_eq!(outcome.errors.len(), 4);
    }

    #[test]
    fn lines_without_completed_stations_create_no_runs() {
        let records = [
            // Only an orphan fore-sight: this line never completes a station.
            MeasurementRecord {
                line_start: true,
                line_end: true,
                ..record("A", None, sight(0.5, 10.0), 1)
            },
            // A line of nothing but unusable codes.
            MeasurementRecord { line_start: true, line_end: true, ..record("  ", sight(1.0, 10.0), None, 2) },
            MeasurementRecord { line_start: true, ..record("B", sight(1.0, 10.0), None, 3) },
            MeasurementRecord { line_end: true, ..record("C", None, sight(0.4, 10.0), 4) },
        ];
        let outcome = build_network(&records).unwrap();

        assert_eq!(outcome.errors.len(), 2);
        // Only the completed line exists, and numbering starts at 1.
        assert_eq!(outcome.runs.len(), 1);
        let run = outcome.network.run(outcome.runs[0]).unwrap();
        assert_eq!(run.name, "Line 1");
        assert_eq!(run.observations.len(), 1);
    }

    #[test]
    fn chain_violations_stay_fatal() {
        // Two stations that do not chain: A->B then C->D within one run.
        let records = [
            MeasurementRecord { line_start: true, ..record("A", sight(1.0, 10.0), None, 1) },
            record("B", None, sight(0.5, 10.0), 2),
            record("C", sight(1.3, 10.0), None, 3),
            record("D", None, sight(0.9, 10.0), 4),
        ];
        let err = build_network(&records).unwrap_err();
        assert!(matches!(err, NetworkError::ChainViolation { .. }));
    }

    #[test]
    fn empty_input_builds_an_empty_network() {
        let outcome = build_network(&[]).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.network.point_count(), 0);
        assert!(outcome.runs.is_empty());
    }
}
