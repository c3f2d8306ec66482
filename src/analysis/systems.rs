//! systems.rs
//! Partitions runs into height systems via enabled shared points.
//!
//! [`partition`] is a pure function of its inputs and can be re-run after
//! every edit to shared-point enablement; applying its output to a
//! [`Network`] is a separate, explicit step.

use crate::graph::{Network, NetworkError, RunId};
use crate::values::PointCode;
use petgraph::graphmap::UnGraphMap;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

/// A point referenced by stations of two or more runs. The `enabled` flag is
/// user-controlled: a disabled link does not tie its runs together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedPointLink {
    pub code: PointCode,
    pub enabled: bool,
    pub runs: Vec<RunId>,
}

/// A system the caller must create to realize a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSystem {
    pub sid: String,
    pub name: String,
    pub order: u32,
}

/// The result of one partition pass: where every run belongs, which
/// auto-generated systems are missing and which are stale.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemPartition {
    /// Run to system-sid mapping.
    pub assignments: HashMap<RunId, String>,
    pub to_create: Vec<NewSystem>,
    pub to_delete: Vec<String>,
}

fn auto_sid(index: usize) -> String {
    format!("system-auto-{index}")
}

/// Groups `runs` into connected components over the enabled shared points
/// and maps each component to a system id.
///
/// With at most one component every run belongs to `default_sid` and all
/// previously known auto ids are stale. Otherwise the largest component
/// keeps `default_sid` and each smaller one gets the deterministic id
/// `system-auto-{i}` (1-based, components ordered by descending size).
pub fn partition(
    runs: &[RunId],
    links: &[SharedPointLink],
    existing_auto_ids: &HashSet<String>,
    default_sid: &str,
) -> SystemPartition {
    let known: HashSet<RunId> = runs.iter().copied().collect();

    let mut graph: UnGraphMap<RunId, ()> = UnGraphMap::new();
    for &run in runs {
        graph.add_node(run);
    }
    for link in links.iter().filter(|l| l.enabled) {
        let members: Vec<RunId> = link
            .runs
            .iter()
            .copied()
            .filter(|r| known.contains(r))
            .collect();
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                if a != b {
                    graph.add_edge(a, b, ());
                }
            }
        }
    }

    // BFS components, discovered in the caller's run order.
    let mut components: Vec<Vec<RunId>> = Vec::new();
    let mut visited: HashSet<RunId> = HashSet::new();
    for &start in runs {
        if visited.contains(&start) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(run) = queue.pop_front() {
            if visited.insert(run) {
                component.push(run);
                queue.extend(graph.neighbors(run));
            }
        }
        components.push(component);
    }

    let mut assignments = HashMap::new();
    let mut to_create = Vec::new();
    let mut reused: BTreeSet<String> = BTreeSet::new();

    if components.len() <= 1 {
        for &run in runs {
            assignments.insert(run, default_sid.to_string());
        }
    } else {
        // Largest component keeps the default system; stable sort preserves
        // discovery order among equal sizes.
        components.sort_by_key(|c| std::cmp::Reverse(c.len()));
        for (rank, component) in components.iter().enumerate() {
            let sid = if rank == 0 {
                default_sid.to_string()
            } else {
                let sid = auto_sid(rank);
                if !existing_auto_ids.contains(&sid) {
                    to_create.push(NewSystem {
                        sid: sid.clone(),
                        name: format!("System {}", rank + 1),
                        order: rank as u32,
                    });
                }
                reused.insert(sid.clone());
                sid
            };
            for &run in component {
                assignments.insert(run, sid.clone());
            }
        }
    }

    let to_delete: Vec<String> = existing_auto_ids
        .iter()
        .filter(|sid| !reused.contains(*sid))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    debug!(
        runs = runs.len(),
        components = components.len(),
        create = to_create.len(),
        delete = to_delete.len(),
        "system partition computed"
    );
    SystemPartition { assignments, to_create, to_delete }
}

/// Derives the shared-point link list from the network: one enabled link per
/// point whose observations span at least two runs, ordered by code.
pub fn shared_point_links(network: &Network) -> Vec<SharedPointLink> {
    let mut links: Vec<SharedPointLink> = network
        .points()
        .filter_map(|(_, point)| {
            let mut runs: BTreeSet<RunId> = BTreeSet::new();
            for &obs in point.outgoing.iter().chain(point.incoming.iter()) {
                if let Some(o) = network.observation(obs) {
                    runs.insert(o.run);
                }
            }
            (runs.len() >= 2).then(|| SharedPointLink {
                code: point.code.clone(),
                enabled: true,
                runs: runs.into_iter().collect(),
            })
        })
        .collect();
    links.sort_by(|a, b| a.code.cmp(&b.code));
    links
}

/// Applies a partition to the network: deletes stale auto systems, creates
/// missing ones and reassigns every mapped run.
pub fn apply_partition(
    network: &mut Network,
    result: &SystemPartition,
) -> Result<(), NetworkError> {
    for sid in &result.to_delete {
        if let Some(id) = network.system_by_sid(sid) {
            network.remove_system(id)?;
        }
    }
    for new in &result.to_create {
        if network.system_by_sid(&new.sid).is_none() {
            network.add_system(&new.sid, &new.name, new.order);
        }
    }

    // Deterministic application order.
    let mut ordered: Vec<(&RunId, &String)> = result.assignments.iter().collect();
    ordered.sort_by_key(|(run, _)| **run);
    for (&run, sid) in ordered {
        let system = match network.system_by_sid(sid) {
            Some(id) => id,
            None => network.add_system(sid, sid, 0),
        };
        network.assign_run_to_system(run, system)?;
    }
    Ok(())
}
