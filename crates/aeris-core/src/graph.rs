//! Pollution-weighted road graph: nearest-node snap, Dijkstra shortest
//! path and Yen's k-shortest simple paths.
//!
//! The graph is a directed multigraph; pathfinding operates on the derived
//! simple digraph that keeps the minimum-weight parallel edge per node
//! pair (ties broken by lowest edge id).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct RoadNode {
    pub osm_id: i64,
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone)]
pub struct RoadEdge {
    pub from: usize,
    pub to: usize,
    pub length_m: f64,
    pub speed_kph: f64,
    pub time_h: f64,
    pub mean_upes: f64,
    pub modifier: f64,
    pub weight: f64,
    /// (lon, lat) polyline from `from` to `to`, endpoints included.
    pub geometry: Vec<(f64, f64)>,
}

/// Aggregated metrics for one computed route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSummary {
    pub nodes: Vec<i64>,
    pub geometry: Vec<(f64, f64)>,
    pub exposure: f64,
    pub distance_km: f64,
    pub time_min: f64,
    pub cost: f64,
}

#[derive(Debug, Default)]
pub struct RoadGraph {
    nodes: Vec<RoadNode>,
    edges: Vec<RoadEdge>,
    node_lookup: HashMap<i64, usize>,
    /// Simple-digraph adjacency: per node, (neighbor, representative edge id).
    reduced: Vec<Vec<(usize, usize)>>,
}

struct QueueEntry {
    cost: f64,
    node: usize,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.node == other.node
    }
}
impl Eq for QueueEntry {}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap on cost.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl RoadGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, idx: usize) -> &RoadNode {
        &self.nodes[idx]
    }

    pub fn edge(&self, idx: usize) -> &RoadEdge {
        &self.edges[idx]
    }

    /// Insert a node, deduplicating by OSM id. Returns the node index.
    pub fn add_node(&mut self, osm_id: i64, lon: f64, lat: f64) -> usize {
        if let Some(&idx) = self.node_lookup.get(&osm_id) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(RoadNode { osm_id, lon, lat });
        self.node_lookup.insert(osm_id, idx);
        self.reduced.push(Vec::new());
        idx
    }

    pub fn add_edge(&mut self, edge: RoadEdge) -> usize {
        let id = self.edges.len();
        let (from, to, weight) = (edge.from, edge.to, edge.weight);
        self.edges.push(edge);

        // Maintain the simple-digraph reduction: keep the min-weight
        // parallel edge, ties resolved to the lowest edge id.
        match self.reduced[from].iter_mut().find(|(n, _)| *n == to) {
            Some(slot) => {
                if weight < self.edges[slot.1].weight {
                    slot.1 = id;
                }
            }
            None => self.reduced[from].push((to, id)),
        }
        id
    }

    /// Snap a point to the nearest graph node by Euclidean distance in
    /// (lon, lat) degrees.
    pub fn nearest_node(&self, lon: f64, lat: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, node) in self.nodes.iter().enumerate() {
            let d2 = (node.lon - lon).powi(2) + (node.lat - lat).powi(2);
            match best {
                Some((_, best_d2)) if best_d2 <= d2 => {}
                _ => best = Some((idx, d2)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Representative edge id between two adjacent nodes in the reduced
    /// graph, if any.
    pub fn edge_between(&self, from: usize, to: usize) -> Option<usize> {
        self.reduced[from]
            .iter()
            .find(|(n, _)| *n == to)
            .map(|(_, id)| *id)
    }

    fn dijkstra(
        &self,
        src: usize,
        dst: usize,
        banned_nodes: &HashSet<usize>,
        banned_pairs: &HashSet<(usize, usize)>,
    ) -> Option<(f64, Vec<usize>)> {
        if banned_nodes.contains(&src) || banned_nodes.contains(&dst) {
            return None;
        }
        let n = self.nodes.len();
        let mut dist = vec![f64::INFINITY; n];
        let mut prev = vec![usize::MAX; n];
        let mut heap = BinaryHeap::new();
        dist[src] = 0.0;
        heap.push(QueueEntry { cost: 0.0, node: src });

        while let Some(QueueEntry { cost, node }) = heap.pop() {
            if node == dst {
                break;
            }
            if cost > dist[node] {
                continue;
            }
            for &(next, edge_id) in &self.reduced[node] {
                if banned_nodes.contains(&next) || banned_pairs.contains(&(node, next)) {
                    continue;
                }
                let candidate = cost + self.edges[edge_id].weight;
                if candidate < dist[next] {
                    dist[next] = candidate;
                    prev[next] = node;
                    heap.push(QueueEntry { cost: candidate, node: next });
                }
            }
        }

        if !dist[dst].is_finite() {
            return None;
        }
        let mut path = vec![dst];
        let mut cursor = dst;
        while cursor != src {
            cursor = prev[cursor];
            if cursor == usize::MAX {
                return None;
            }
            path.push(cursor);
        }
        path.reverse();
        Some((dist[dst], path))
    }

    /// Shortest path between two node indices; `None` when unreachable.
    /// Identical endpoints yield a single-node path.
    pub fn shortest_path(&self, src: usize, dst: usize) -> Option<Vec<usize>> {
        if src == dst {
            return Some(vec![src]);
        }
        self.dijkstra(src, dst, &HashSet::new(), &HashSet::new())
            .map(|(_, path)| path)
    }

    /// Up to `k` loopless paths ordered by total weight (Yen's algorithm).
    pub fn k_shortest_paths(&self, src: usize, dst: usize, k: usize) -> Vec<Vec<usize>> {
        if k == 0 {
            return Vec::new();
        }
        if src == dst {
            return vec![vec![src]];
        }
        let first = match self.dijkstra(src, dst, &HashSet::new(), &HashSet::new()) {
            Some(found) => found,
            None => return Vec::new(),
        };
        let mut accepted: Vec<(f64, Vec<usize>)> = vec![first];
        let mut candidates: Vec<(f64, Vec<usize>)> = Vec::new();

        while accepted.len() < k {
            let previous = accepted.last().cloned();
            let Some((_, prev_path)) = previous else { break };

            for i in 0..prev_path.len() - 1 {
                let spur_node = prev_path[i];
                let root = &prev_path[..=i];

                let mut banned_pairs = HashSet::new();
                for (_, path) in &accepted {
                    if path.len() > i && path[..=i] == *root {
                        banned_pairs.insert((path[i], path[i + 1]));
                    }
                }
                let banned_nodes: HashSet<usize> = root[..i].iter().copied().collect();

                if let Some((spur_cost, spur_path)) =
                    self.dijkstra(spur_node, dst, &banned_nodes, &banned_pairs)
                {
                    let mut total: Vec<usize> = root[..i].to_vec();
                    total.extend(spur_path);
                    let root_cost: f64 = root
                        .windows(2)
                        .filter_map(|pair| self.edge_between(pair[0], pair[1]))
                        .map(|id| self.edges[id].weight)
                        .sum();
                    let cost = root_cost + spur_cost;
                    let known = accepted.iter().any(|(_, p)| *p == total)
                        || candidates.iter().any(|(_, p)| *p == total);
                    if !known {
                        candidates.push((cost, total));
                    }
                }
            }

            let best = candidates
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal))
                .map(|(idx, _)| idx);
            match best {
                Some(idx) => accepted.push(candidates.swap_remove(idx)),
                None => break,
            }
        }

        accepted.into_iter().map(|(_, path)| path).collect()
    }

    /// Aggregate geometry and metrics for a node path: exposure is
    /// mean-UPES weighted by edge length, cost is the summed edge weight.
    pub fn route_summary(&self, path: &[usize]) -> RouteSummary {
        let nodes: Vec<i64> = path.iter().map(|&idx| self.nodes[idx].osm_id).collect();
        let mut geometry: Vec<(f64, f64)> = Vec::new();
        let mut exposure = 0.0;
        let mut distance_km = 0.0;
        let mut time_h = 0.0;
        let mut cost = 0.0;

        if path.len() == 1 {
            let node = &self.nodes[path[0]];
            geometry.push((node.lon, node.lat));
        }

        for pair in path.windows(2) {
            let Some(edge_id) = self.edge_between(pair[0], pair[1]) else {
                continue;
            };
            let edge = &self.edges[edge_id];
            for &coord in &edge.geometry {
                if geometry.last() != Some(&coord) {
                    geometry.push(coord);
                }
            }
            let length_km = edge.length_m / 1000.0;
            exposure += edge.mean_upes * length_km;
            distance_km += length_km;
            time_h += edge.time_h;
            cost += edge.weight;
        }

        RouteSummary {
            nodes,
            geometry,
            exposure,
            distance_km,
            time_min: time_h * 60.0,
            cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(from: usize, to: usize, weight: f64, graph: &RoadGraph) -> RoadEdge {
        let a = graph.node(from);
        let b = graph.node(to);
        RoadEdge {
            from,
            to,
            length_m: 1000.0,
            speed_kph: 30.0,
            time_h: 1.0 / 30.0,
            mean_upes: 0.5,
            modifier: 1.0,
            weight,
            geometry: vec![(a.lon, a.lat), (b.lon, b.lat)],
        }
    }

    fn diamond() -> (RoadGraph, usize, usize, usize, usize) {
        let mut g = RoadGraph::new();
        let a = g.add_node(1, 0.0, 0.0);
        let b = g.add_node(2, 0.01, 0.0);
        let c = g.add_node(3, 0.0, 0.01);
        let d = g.add_node(4, 0.01, 0.01);
        let e1 = edge(a, b, 1.0, &g);
        g.add_edge(e1);
        let e2 = edge(b, d, 1.0, &g);
        g.add_edge(e2);
        let e3 = edge(a, c, 2.0, &g);
        g.add_edge(e3);
        let e4 = edge(c, d, 2.0, &g);
        g.add_edge(e4);
        (g, a, b, c, d)
    }

    #[test]
    fn test_shortest_path_prefers_low_weight() {
        let (g, a, b, _c, d) = diamond();
        let path = g.shortest_path(a, d).unwrap();
        assert_eq!(path, vec![a, b, d]);
    }

    #[test]
    fn test_parallel_edges_keep_minimum() {
        let mut g = RoadGraph::new();
        let a = g.add_node(1, 0.0, 0.0);
        let b = g.add_node(2, 0.01, 0.0);
        let heavy = edge(a, b, 5.0, &g);
        let heavy_id = g.add_edge(heavy);
        let light = edge(a, b, 1.0, &g);
        let light_id = g.add_edge(light);
        assert_ne!(heavy_id, light_id);
        assert_eq!(g.edge_between(a, b), Some(light_id));
    }

    #[test]
    fn test_k_shortest_orders_by_cost() {
        let (g, a, _b, _c, d) = diamond();
        let paths = g.k_shortest_paths(a, d, 3);
        assert_eq!(paths.len(), 2);
        let first = g.route_summary(&paths[0]);
        let second = g.route_summary(&paths[1]);
        assert!(first.cost < second.cost);
    }

    #[test]
    fn test_same_origin_destination_is_zero_route() {
        let (g, a, ..) = diamond();
        let paths = g.k_shortest_paths(a, a, 3);
        assert_eq!(paths, vec![vec![a]]);
        let summary = g.route_summary(&paths[0]);
        assert_eq!(summary.distance_km, 0.0);
        assert_eq!(summary.time_min, 0.0);
        assert_eq!(summary.exposure, 0.0);
        assert_eq!(summary.geometry.len(), 1);
    }

    #[test]
    fn test_no_path_returns_empty() {
        let mut g = RoadGraph::new();
        let a = g.add_node(1, 0.0, 0.0);
        let b = g.add_node(2, 1.0, 1.0);
        assert!(g.shortest_path(a, b).is_none());
        assert!(g.k_shortest_paths(a, b, 2).is_empty());
    }

    #[test]
    fn test_nearest_node_snap() {
        let (g, a, ..) = diamond();
        assert_eq!(g.nearest_node(-0.001, 0.0005), Some(a));
        assert_eq!(RoadGraph::new().nearest_node(0.0, 0.0), None);
    }

    #[test]
    fn test_route_summary_dedupes_junctions() {
        let (g, a, b, _c, d) = diamond();
        let path = g.shortest_path(a, d).unwrap();
        let summary = g.route_summary(&path);
        // Three distinct vertices, the shared junction point appears once.
        assert_eq!(summary.geometry.len(), 3);
        assert_eq!(summary.nodes, vec![1, g.node(b).osm_id, 4]);
        assert!((summary.distance_km - 2.0).abs() < 1e-9);
        assert!((summary.exposure - 1.0).abs() < 1e-9);
    }
}
