//! traversal.rs
//! Read-only graph queries over [`Network`]: connectivity, path finding,
//! cycle detection and benchmark-seeded ordering.
//!
//! All traversals treat the graph as undirected (a station can be walked
//! against its measurement direction) and are iterative, so recursion depth
//! never limits network size.

use super::ids::{ObservationId, PointId};
use super::network::Network;
use std::collections::{HashMap, HashSet, VecDeque};

/// One edge of a discovered path. `forward` is true when the observation is
/// traversed from its back-sight to its fore-sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub observation: ObservationId,
    pub forward: bool,
}

impl Network {
    /// All points reachable over one edge in either direction, in the order
    /// outgoing then incoming. Parallel edges yield repeated neighbors.
    fn neighbor_points(&self, id: PointId) -> Vec<PointId> {
        let Some(point) = self.point(id) else {
            return Vec::new();
        };
        let mut neighbors = Vec::with_capacity(point.degree());
        for &obs in &point.outgoing {
            if let Some(o) = self.observation(obs) {
                neighbors.push(o.to);
            }
        }
        for &obs in &point.incoming {
            if let Some(o) = self.observation(obs) {
                neighbors.push(o.from);
            }
        }
        neighbors
    }

    /// True iff every point is reachable from every other. Vacuously true
    /// for an empty network.
    pub fn is_connected(&self) -> bool {
        let Some((start, _)) = self.points().next() else {
            return true;
        };
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            if visited.insert(node) {
                queue.extend(self.neighbor_points(node));
            }
        }
        visited.len() == self.point_count()
    }

    /// Partitions all points into connected components via repeated BFS.
    pub fn find_connected_components(&self) -> Vec<Vec<PointId>> {
        let mut components = Vec::new();
        let mut visited = HashSet::new();
        for (start, _) in self.points() {
            if visited.contains(&start) {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::from([start]);
            while let Some(node) = queue.pop_front() {
                if visited.insert(node) {
                    component.push(node);
                    queue.extend(self.neighbor_points(node));
                }
            }
            components.push(component);
        }
        components
    }

    /// First edge-path between two points discovered in BFS level order, or
    /// `None` if unreachable. `from == to` yields an empty path.
    pub fn find_path(&self, from: PointId, to: PointId) -> Option<Vec<PathStep>> {
        if self.point(from).is_none() || self.point(to).is_none() {
            return None;
        }
        if from == to {
            return Some(Vec::new());
        }

        // predecessor: point -> (previous point, edge, traversal direction)
        let mut prev: HashMap<PointId, (PointId, ObservationId, bool)> = HashMap::new();
        let mut visited = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);

        'bfs: while let Some(node) = queue.pop_front() {
            let point = self.point(node).unwrap();
            let steps = point
                .outgoing
                .iter()
                .filter_map(|&e| self.observation(e).map(|o| (o.to, e, true)))
                .chain(
                    point
                        .incoming
                        .iter()
                        .filter_map(|&e| self.observation(e).map(|o| (o.from, e, false))),
                )
                .collect::<Vec<_>>();

            for (next, edge, forward) in steps {
                if visited.insert(next) {
                    prev.insert(next, (node, edge, forward));
                    if next == to {
                        break 'bfs;
                    }
                    queue.push_back(next);
                }
            }
        }

        prev.contains_key(&to).then(|| {
            let mut path = Vec::new();
            let mut cursor = to;
            while cursor != from {
                let (before, edge, forward) = prev[&cursor];
                path.push(PathStep { observation: edge, forward });
                cursor = before;
            }
            path.reverse();
            path
        })
    }

    /// Detects cycles with an iterative DFS over the undirected graph.
    ///
    /// Each back-edge to a point currently on the DFS stack (other than the
    /// immediate parent) emits the stack slice from that point to the top as
    /// one cycle. Cycles reachable through a different traversal order are
    /// not deduplicated; callers needing a canonical cycle basis must
    /// post-process.
    pub fn find_cycles(&self) -> Vec<Vec<PointId>> {
        let mut cycles = Vec::new();
        let mut visited: HashSet<PointId> = HashSet::new();

        for (start, _) in self.points() {
            if visited.contains(&start) {
                continue;
            }
            // frame: (node, parent, neighbors, next neighbor index)
            let mut frames: Vec<(PointId, Option<PointId>, Vec<PointId>, usize)> =
                vec![(start, None, self.neighbor_points(start), 0)];
            let mut path = vec![start];
            let mut on_path: HashMap<PointId, usize> = HashMap::from([(start, 0)]);
            visited.insert(start);

            while !frames.is_empty() {
                let top = frames.len() - 1;
                let (node, parent) = (frames[top].0, frames[top].1);

                if frames[top].3 < frames[top].2.len() {
                    let neighbor = frames[top].2[frames[top].3];
                    frames[top].3 += 1;

                    if let Some(&pos) = on_path.get(&neighbor) {
                        // Back-edge, unless it just walks the tree edge back
                        // to the immediate parent.
                        if parent != Some(neighbor) {
                            cycles.push(path[pos..].to_vec());
                        }
                    } else if visited.insert(neighbor) {
                        on_path.insert(neighbor, path.len());
                        path.push(neighbor);
                        let neighbors = self.neighbor_points(neighbor);
                        frames.push((neighbor, Some(node), neighbors, 0));
                    }
                } else {
                    on_path.remove(&node);
                    path.pop();
                    frames.pop();
                }
            }
        }
        cycles
    }

    /// BFS ordering of all points reachable from the benchmarks.
    ///
    /// The frontier is seeded with every benchmark (arena order among them)
    /// and expanded level by level; the result is the order in which heights
    /// may be propagated outward from known points.
    pub fn topological_sort_from_benchmarks(&self) -> Vec<PointId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<PointId> = self
            .points()
            .filter(|(_, p)| p.is_benchmark())
            .map(|(id, _)| id)
            .collect();
        visited.extend(queue.iter().copied());

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for neighbor in self.neighbor_points(node) {
                if visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        order
    }
}
