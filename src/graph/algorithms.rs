//! Circular dependency detection
//!
//! Three-color (white/gray/black) depth-first search over an arena of nodes.
//! Node IDs are interned into insertion-ordered indices and edges are stored
//! as adjacency lists of indices, so the graph never owns references to
//! itself and cycles in the input cannot become ownership cycles.
//!
//! # Determinism
//!
//! Roots are visited in insertion order (first appearance in the edge list)
//! and successors in edge order. Running detection twice over the same edge
//! list produces identical output.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::graph::DependencyEdge;

/// Ordered cycle of node IDs; first and last entries are identical
///
/// A self-loop has length 2: `[A, A]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircularChain {
    pub nodes: Vec<String>,
}

impl CircularChain {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes.iter().any(|n| n == node)
    }

    pub fn is_self_loop(&self) -> bool {
        self.nodes.len() == 2 && self.nodes[0] == self.nodes[1]
    }

    /// Distinct members (the chain without its closing repeat)
    pub fn members(&self) -> &[String] {
        match self.nodes.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Insertion-ordered node arena with adjacency lists
#[derive(Default)]
struct DependencyArena<'e> {
    ids: Vec<&'e str>,
    index: AHashMap<&'e str, usize>,
    adjacency: Vec<Vec<usize>>,
}

impl<'e> DependencyArena<'e> {
    fn intern(&mut self, id: &'e str) -> usize {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.ids.len();
        self.ids.push(id);
        self.index.insert(id, idx);
        self.adjacency.push(Vec::new());
        idx
    }

    fn connect(&mut self, from: usize, to: usize) {
        let successors = &mut self.adjacency[from];
        // Parallel edges would report the same back edge twice
        if !successors.contains(&to) {
            successors.push(to);
        }
    }

    fn add_edge(&mut self, from: &'e str, to: &'e str) {
        match (from.is_empty(), to.is_empty()) {
            (false, false) => {
                let from = self.intern(from);
                let to = self.intern(to);
                self.connect(from, to);
            }
            // Malformed edge: keep the valid endpoint as an isolated node
            (false, true) => {
                self.intern(from);
            }
            (true, false) => {
                self.intern(to);
            }
            (true, true) => {}
        }
    }

    fn find_cycles(&self) -> Vec<CircularChain> {
        let n = self.ids.len();
        let mut color = vec![Color::White; n];
        // Position of each gray node on the current DFS path
        let mut path_pos: Vec<Option<usize>> = vec![None; n];
        let mut path: Vec<usize> = Vec::new();
        // (node, next successor index)
        let mut stack: Vec<(usize, usize)> = Vec::new();
        let mut cycles = Vec::new();

        for root in 0..n {
            if color[root] != Color::White {
                continue;
            }
            color[root] = Color::Gray;
            path_pos[root] = Some(path.len());
            path.push(root);
            stack.push((root, 0));

            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                if let Some(&succ) = self.adjacency[node].get(next) {
                    frame.1 += 1;
                    match color[succ] {
                        Color::White => {
                            color[succ] = Color::Gray;
                            path_pos[succ] = Some(path.len());
                            path.push(succ);
                            stack.push((succ, 0));
                        }
                        Color::Gray => {
                            if let Some(start) = path_pos[succ] {
                                let mut nodes: Vec<String> =
                                    path[start..].iter().map(|&i| self.ids[i].to_string()).collect();
                                nodes.push(self.ids[succ].to_string());
                                cycles.push(CircularChain { nodes });
                            }
                        }
                        Color::Black => {}
                    }
                } else {
                    color[node] = Color::Black;
                    path_pos[node] = None;
                    path.pop();
                    stack.pop();
                }
            }
        }

        cycles
    }
}

/// Detect circular dependencies in an edge set
///
/// On encountering a gray node, records the chain from that node through the
/// current DFS path back to itself. Disjoint cycles are all reported, and a
/// node may appear in more than one chain.
///
/// # Examples
/// - A→B, B→C, C→A → `[[A, B, C, A]]`
/// - A→B, B→A → `[[A, B, A]]`
/// - A→A → `[[A, A]]`
/// - acyclic → `[]`
pub fn detect_circular_dependencies(edges: &[DependencyEdge]) -> Vec<CircularChain> {
    let mut arena = DependencyArena::default();
    for edge in edges {
        arena.add_edge(&edge.from_id, &edge.to_id);
    }
    arena.find_cycles()
}

/// Detect cycles over a declared node set
///
/// Nodes are registered first, in the given order. Edges touching an ID that
/// is not in `nodes` are dropped; their known endpoint stays as an isolated
/// node.
pub fn detect_circular_dependencies_among(nodes: &[String], edges: &[DependencyEdge]) -> Vec<CircularChain> {
    let mut arena = DependencyArena::default();
    for node in nodes {
        if !node.is_empty() {
            arena.intern(node);
        }
    }
    for edge in edges {
        let from = arena.index.get(edge.from_id.as_str()).copied();
        let to = arena.index.get(edge.to_id.as_str()).copied();
        if let (Some(from), Some(to)) = (from, to) {
            arena.connect(from, to);
        }
    }
    arena.find_cycles()
}

/// Cycles that pass through `node`
pub fn find_cycles_containing(edges: &[DependencyEdge], node: &str) -> Vec<CircularChain> {
    detect_circular_dependencies(edges)
        .into_iter()
        .filter(|chain| chain.contains(node))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeLevel;

    fn edges(pairs: &[(&str, &str)]) -> Vec<DependencyEdge> {
        pairs
            .iter()
            .map(|(from, to)| DependencyEdge::new(*from, *to, EdgeLevel::File))
            .collect()
    }

    fn chains(cycles: &[CircularChain]) -> Vec<Vec<&str>> {
        cycles
            .iter()
            .map(|c| c.nodes.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn test_three_node_cycle() {
        let cycles = detect_circular_dependencies(&edges(&[("A", "B"), ("B", "C"), ("C", "A")]));
        assert_eq!(chains(&cycles), vec![vec!["A", "B", "C", "A"]]);
    }

    #[test]
    fn test_two_node_cycle() {
        let cycles = detect_circular_dependencies(&edges(&[("A", "B"), ("B", "A")]));
        assert_eq!(chains(&cycles), vec![vec!["A", "B", "A"]]);
    }

    #[test]
    fn test_self_loop() {
        let cycles = detect_circular_dependencies(&edges(&[("A", "A")]));
        assert_eq!(chains(&cycles), vec![vec!["A", "A"]]);
        assert!(cycles[0].is_self_loop());
        assert_eq!(cycles[0].members(), &["A".to_string()]);
    }

    #[test]
    fn test_acyclic_graph() {
        let cycles = detect_circular_dependencies(&edges(&[("A", "B"), ("B", "C"), ("A", "C")]));
        assert!(cycles.is_empty());
    }

    #[test]
    fn test_empty_edge_set() {
        assert!(detect_circular_dependencies(&[]).is_empty());
    }

    #[test]
    fn test_disjoint_cycles_all_reported() {
        let cycles = detect_circular_dependencies(&edges(&[
            ("A", "B"),
            ("B", "A"),
            ("X", "Y"),
            ("Y", "Z"),
            ("Z", "X"),
        ]));
        assert_eq!(
            chains(&cycles),
            vec![vec!["A", "B", "A"], vec!["X", "Y", "Z", "X"]]
        );
    }

    #[test]
    fn test_node_in_multiple_cycles() {
        let cycles = detect_circular_dependencies(&edges(&[
            ("A", "B"),
            ("B", "A"),
            ("B", "C"),
            ("C", "B"),
        ]));
        assert_eq!(chains(&cycles), vec![vec!["A", "B", "A"], vec!["B", "C", "B"]]);
        assert_eq!(find_cycles_containing(&edges(&[("A", "B"), ("B", "A"), ("B", "C"), ("C", "B")]), "C").len(), 1);
    }

    #[test]
    fn test_parallel_edges_report_once() {
        let cycles = detect_circular_dependencies(&edges(&[("A", "B"), ("B", "A"), ("B", "A")]));
        assert_eq!(cycles.len(), 1);
    }

    #[test]
    fn test_deterministic_output() {
        let input = edges(&[("m", "n"), ("n", "o"), ("o", "m"), ("o", "p"), ("p", "n")]);
        let first = detect_circular_dependencies(&input);
        let second = detect_circular_dependencies(&input);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_malformed_edges_are_isolated_nodes() {
        let cycles = detect_circular_dependencies(&edges(&[("A", ""), ("", "B"), ("", ""), ("B", "A")]));
        assert!(cycles.is_empty());
    }

    #[test]
    fn test_unknown_nodes_among_declared_set() {
        let nodes = vec!["A".to_string(), "B".to_string()];
        let cycles = detect_circular_dependencies_among(
            &nodes,
            &edges(&[("A", "B"), ("B", "ghost"), ("ghost", "A"), ("B", "A")]),
        );
        assert_eq!(chains(&cycles), vec![vec!["A", "B", "A"]]);
    }

    #[test]
    fn test_cycle_reached_from_acyclic_prefix() {
        let cycles = detect_circular_dependencies(&edges(&[("root", "A"), ("A", "B"), ("B", "A")]));
        assert_eq!(chains(&cycles), vec![vec!["A", "B", "A"]]);
    }
}
