//! Dependency graph and execution ordering.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use super::types::{CellId, Document};
use crate::error::{Error, Result};

/// A topological order over a document's cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExecutionOrder(Vec<CellId>);

impl ExecutionOrder {
    pub fn new(ids: Vec<CellId>) -> Self {
        Self(ids)
    }

    /// Cell ids in execution order.
    pub fn ids(&self) -> &[CellId] {
        &self.0
    }

    /// Index of a cell within the order.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.0.iter().position(|c| c.as_str() == id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CellId> {
        self.0.iter()
    }
}

impl std::fmt::Display for ExecutionOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.0.iter().map(CellId::as_str).collect();
        f.write_str(&ids.join(" → "))
    }
}

impl<'a> IntoIterator for &'a ExecutionOrder {
    type Item = &'a CellId;
    type IntoIter = std::slice::Iter<'a, CellId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The dependency graph over a document's cells.
///
/// Edges run from a dependency to its dependent. Node weights index `ids`
/// and `positions`; positions break ties during ordering.
pub struct DependencyGraph {
    /// The directed graph: edges go from dependency to dependent
    graph: DiGraph<usize, ()>,
    /// Cell ID to node index mapping
    node_indices: FxHashMap<CellId, NodeIndex>,
    /// Cell IDs in document order
    ids: Vec<CellId>,
    /// Document position of each cell, parallel to `ids`
    positions: Vec<usize>,
}

impl DependencyGraph {
    /// Build the graph for a document.
    ///
    /// Every declared dependency must name a cell of the document; the first
    /// one that does not fails construction.
    pub fn build(document: &Document) -> Result<Self> {
        let mut graph = DiGraph::with_capacity(document.len(), 0);
        let mut node_indices = FxHashMap::default();
        let mut ids = Vec::with_capacity(document.len());
        let mut positions = Vec::with_capacity(document.len());

        for (slot, cell) in document.iter().enumerate() {
            let idx = graph.add_node(slot);
            node_indices.insert(cell.id.clone(), idx);
            ids.push(cell.id.clone());
            positions.push(cell.position);
        }

        for cell in document.iter() {
            let dependent = node_indices[&cell.id];
            for dep in &cell.dependencies {
                let Some(&dependency) = node_indices.get(dep) else {
                    return Err(Error::UnknownDependency {
                        cell: cell.id.to_string(),
                        dependency: dep.to_string(),
                    });
                };
                graph.update_edge(dependency, dependent, ());
            }
        }

        tracing::debug!(
            "Built dependency graph: {} cells, {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        Ok(Self {
            graph,
            node_indices,
            ids,
            positions,
        })
    }

    /// Resolve the execution order with Kahn's algorithm.
    ///
    /// Among cells that are ready at the same time, the one appearing first in
    /// the document runs first, so the order is deterministic and follows
    /// reading order wherever dependencies allow.
    pub fn execution_order(&self) -> Result<ExecutionOrder> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .count()
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<((usize, usize), NodeIndex)>> = self
            .graph
            .node_indices()
            .filter(|idx| in_degree[idx.index()] == 0)
            .map(|idx| Reverse((self.position(idx), idx)))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((_, idx))) = ready.pop() {
            order.push(self.ids[self.graph[idx]].clone());
            for next in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let degree = &mut in_degree[next.index()];
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse((self.position(next), next)));
                }
            }
        }

        if order.len() < self.graph.node_count() {
            let remaining: FxHashSet<NodeIndex> = self
                .graph
                .node_indices()
                .filter(|idx| in_degree[idx.index()] > 0)
                .collect();
            let cycle = self.shortest_cycle(&remaining);
            return Err(Error::CyclicDependency {
                cycle: cycle
                    .into_iter()
                    .map(|idx| self.ids[self.graph[idx]].to_string())
                    .collect(),
            });
        }

        Ok(ExecutionOrder(order))
    }

    /// Find the shortest cycle among the nodes Kahn's algorithm could not emit.
    ///
    /// Ties go to the cycle through the earliest cell in the document. The
    /// cycle is returned starting from that cell, in dependency order.
    fn shortest_cycle(&self, remaining: &FxHashSet<NodeIndex>) -> Vec<NodeIndex> {
        let mut starts: Vec<NodeIndex> = remaining.iter().copied().collect();
        starts.sort_by_key(|&idx| self.position(idx));

        let mut best: Option<Vec<NodeIndex>> = None;
        for start in starts {
            if let Some(cycle) = self.cycle_through(start, remaining)
                && best.as_ref().is_none_or(|b| cycle.len() < b.len())
            {
                best = Some(cycle);
            }
        }

        // Unemitted nodes always contain a cycle; fall back to listing them.
        best.unwrap_or_else(|| {
            let mut nodes: Vec<NodeIndex> = remaining.iter().copied().collect();
            nodes.sort_by_key(|&idx| self.position(idx));
            nodes
        })
    }

    /// Breadth-first search for the shortest path from `start` back to itself.
    fn cycle_through(&self, start: NodeIndex, allowed: &FxHashSet<NodeIndex>) -> Option<Vec<NodeIndex>> {
        let mut parent: FxHashMap<NodeIndex, NodeIndex> = FxHashMap::default();
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            let mut successors: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(node, Direction::Outgoing)
                .filter(|next| allowed.contains(next))
                .collect();
            successors.sort_by_key(|&idx| self.position(idx));

            for next in successors {
                if next == start {
                    let mut cycle = vec![node];
                    let mut cursor = node;
                    while cursor != start {
                        cursor = parent[&cursor];
                        cycle.push(cursor);
                    }
                    cycle.reverse();
                    return Some(cycle);
                }
                if !parent.contains_key(&next) {
                    parent.insert(next, node);
                    queue.push_back(next);
                }
            }
        }

        None
    }

    /// Get direct dependencies of a cell.
    pub fn dependencies(&self, id: &str) -> Vec<CellId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Get direct dependents of a cell (cells that depend on this one).
    pub fn dependents(&self, id: &str) -> Vec<CellId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<CellId> {
        let Some(&idx) = self.node_indices.get(id) else {
            return Vec::new();
        };
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_directed(idx, direction).collect();
        neighbors.sort_by_key(|&n| self.position(n));
        neighbors.into_iter().map(|n| self.ids[self.graph[n]].clone()).collect()
    }

    /// Tie-break key: document position, then insertion order.
    fn position(&self, idx: NodeIndex) -> (usize, usize) {
        let slot = self.graph[idx];
        (self.positions[slot], slot)
    }

    /// Get the number of cells.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Cell;

    fn make_doc(cells: &[(&str, &[&str])]) -> Document {
        let cells = cells
            .iter()
            .map(|(id, deps)| {
                let mut cell = Cell::new(*id, "calc", format!("{} = 1", id));
                cell.dependencies = deps.iter().map(|d| CellId::new(*d)).collect();
                cell
            })
            .collect();
        Document::from_cells(cells).unwrap()
    }

    fn order_of(doc: &Document) -> Vec<String> {
        DependencyGraph::build(doc)
            .unwrap()
            .execution_order()
            .unwrap()
            .iter()
            .map(|id| id.to_string())
            .collect()
    }

    fn assert_topological(doc: &Document, order: &[String]) {
        for cell in doc.iter() {
            let pos = order.iter().position(|id| id == cell.id.as_str()).unwrap();
            for dep in &cell.dependencies {
                let dep_pos = order.iter().position(|id| id == dep.as_str()).unwrap();
                assert!(dep_pos < pos, "{} must run before {}", dep, cell.id);
            }
        }
    }

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::build(&Document::default()).unwrap();
        assert!(graph.is_empty());
        assert!(graph.execution_order().unwrap().is_empty());
    }

    #[test]
    fn test_linear_dependencies() {
        let doc = make_doc(&[("setup", &[]), ("compute", &["setup"]), ("display", &["compute"])]);
        assert_eq!(order_of(&doc), vec!["setup", "compute", "display"]);
    }

    #[test]
    fn test_dependencies_reorder_narrative() {
        let doc = make_doc(&[("report", &["data"]), ("data", &[])]);
        assert_eq!(order_of(&doc), vec!["data", "report"]);
    }

    #[test]
    fn test_independent_cells_follow_reading_order() {
        let doc = make_doc(&[("c", &[]), ("a", &[]), ("b", &[])]);
        assert_eq!(order_of(&doc), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_diamond_tie_break_by_position() {
        let doc = make_doc(&[
            ("root", &[]),
            ("right", &["root"]),
            ("left", &["root"]),
            ("join", &["left", "right"]),
        ]);
        let order = order_of(&doc);
        assert_eq!(order, vec!["root", "right", "left", "join"]);
        assert_topological(&doc, &order);
    }

    #[test]
    fn test_ready_cell_earlier_in_document_wins() {
        // `late` becomes ready only after `b`, but `c` sits later in the document.
        let doc = make_doc(&[("b", &[]), ("late", &["b"]), ("c", &[])]);
        assert_eq!(order_of(&doc), vec!["b", "late", "c"]);
    }

    #[test]
    fn test_order_is_deterministic() {
        let doc = make_doc(&[
            ("e", &["c", "d"]),
            ("a", &[]),
            ("b", &[]),
            ("c", &["a"]),
            ("d", &["b"]),
        ]);
        let first = order_of(&doc);
        for _ in 0..10 {
            assert_eq!(order_of(&doc), first);
        }
        assert_topological(&doc, &first);
    }

    #[test]
    fn test_unknown_dependency() {
        let doc = make_doc(&[("a", &["ghost"])]);
        let err = DependencyGraph::build(&doc).err().unwrap();
        match err {
            Error::UnknownDependency { cell, dependency } => {
                assert_eq!(cell, "a");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_two_cell_cycle() {
        let doc = make_doc(&[("a", &["b"]), ("b", &["a"])]);
        let err = DependencyGraph::build(&doc)
            .unwrap()
            .execution_order()
            .unwrap_err();
        match err {
            Error::CyclicDependency { cycle } => assert_eq!(cycle, vec!["a", "b"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reports_minimal_cycle() {
        // a → b → c → d → a is a 4-cycle, c → d → c is the minimal one.
        let doc = make_doc(&[
            ("a", &["d"]),
            ("b", &["a"]),
            ("c", &["b", "d"]),
            ("d", &["c"]),
            ("tail", &["d"]),
        ]);
        let err = DependencyGraph::build(&doc)
            .unwrap()
            .execution_order()
            .unwrap_err();
        match err {
            Error::CyclicDependency { cycle } => assert_eq!(cycle, vec!["c", "d"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let doc = make_doc(&[("ok", &[]), ("loop", &["loop"])]);
        let err = DependencyGraph::build(&doc)
            .unwrap()
            .execution_order()
            .unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { ref cycle } if cycle == &["loop"]));
    }

    #[test]
    fn test_neighbors() {
        let doc = make_doc(&[("a", &[]), ("b", &[]), ("c", &["b", "a"])]);
        let graph = DependencyGraph::build(&doc).unwrap();
        assert_eq!(graph.dependencies("c"), vec![CellId::new("a"), CellId::new("b")]);
        assert_eq!(graph.dependents("a"), vec![CellId::new("c")]);
        assert!(graph.dependents("c").is_empty());
        assert!(graph.dependencies("missing").is_empty());
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_edited_positions_only_affect_ties() {
        let mut doc = make_doc(&[("a", &[]), ("b", &[]), ("c", &["a"])]);
        doc.get_mut("a").unwrap().position = 5;
        doc.get_mut("b").unwrap().position = 0;

        let graph = DependencyGraph::build(&doc).unwrap();
        assert_eq!(order_of(&doc), vec!["b", "a", "c"]);
        assert_eq!(graph.dependents("a"), vec![CellId::new("c")]);
    }

    #[test]
    fn test_order_display() {
        let doc = make_doc(&[("setup", &[]), ("compute", &["setup"])]);
        let order = DependencyGraph::build(&doc).unwrap().execution_order().unwrap();
        assert_eq!(order.to_string(), "setup → compute");
        assert_eq!(order.position_of("compute"), Some(1));
        assert_eq!(order.position_of("nope"), None);
    }
}
