//! Directed dependency graph over workbook cells, with topological layering.
//!
//! The graph is derived from cell records after a dependency rebuild; it is
//! never the system of record. Nodes are interned `Sheet!A1` keys, edges run
//! from a precedent (read-from) cell to its dependent (reads-it) cell, and
//! [`DependencyGraph::layers`] partitions the nodes into generations whose
//! ordering downstream batch processing relies on.

use cellgraph_primitives::CellAddress;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Interned graph identity for one cell: `Sheet!A1`, anchors stripped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    /// Build a key from a sheet name and a cell address.
    ///
    /// The address's own sheet qualifier and `$` anchors do not participate;
    /// identity is the given sheet plus the normalized `A1` reference.
    pub fn new(sheet: &str, address: &CellAddress) -> Self {
        NodeKey(format!("{}!{}", sheet, address.reference()))
    }

    /// Build a key from a sheet name and an already-normalized reference.
    pub fn from_reference(sheet: &str, reference: &str) -> Self {
        NodeKey(format!("{sheet}!{reference}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sheet half of the key.
    pub fn sheet(&self) -> &str {
        self.0.rsplit_once('!').map_or("", |(sheet, _)| sheet)
    }

    /// Normalized `A1` reference half of the key.
    pub fn reference(&self) -> &str {
        self.0.rsplit_once('!').map_or(self.0.as_str(), |(_, r)| r)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered generations of graph nodes; every edge crosses strictly forward.
pub type Layers = Vec<BTreeSet<NodeKey>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The remaining graph could not be layered; carries every node that was
    /// still unassigned when progress stopped.
    #[error("cyclic dependency among {} cells", .unresolved.len())]
    CyclicDependency { unresolved: Vec<NodeKey> },

    /// A precedent edge without its mirror dependent edge, or vice versa.
    #[error("inconsistent edge between {cell} and {other}")]
    InconsistentEdge { cell: NodeKey, other: NodeKey },
}

#[derive(Debug, Clone, Default)]
struct GraphNode {
    precedents: BTreeSet<NodeKey>,
    dependents: BTreeSet<NodeKey>,
}

/// Bidirectional dependency graph keyed by [`NodeKey`].
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<NodeKey, GraphNode>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(precedent, dependent)` edge pairs.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (NodeKey, NodeKey)>,
    {
        let mut graph = Self::new();
        for (precedent, dependent) in edges {
            graph.add_edge(precedent, dependent);
        }
        graph
    }

    /// Record a precedent→dependent edge, creating both endpoints and both
    /// edge directions.
    pub fn add_edge(&mut self, precedent: NodeKey, dependent: NodeKey) {
        self.nodes
            .entry(dependent.clone())
            .or_default()
            .precedents
            .insert(precedent.clone());
        self.nodes
            .entry(precedent)
            .or_default()
            .dependents
            .insert(dependent);
    }

    /// Record a precedent entry on `cell` only, without the mirror edge.
    /// Used when re-deriving a graph from per-cell edge sets; pair with
    /// [`Self::validate_consistency`].
    pub fn record_precedent(&mut self, cell: &NodeKey, precedent: NodeKey) {
        self.nodes
            .entry(cell.clone())
            .or_default()
            .precedents
            .insert(precedent);
    }

    /// Record a dependent entry on `cell` only, without the mirror edge.
    pub fn record_dependent(&mut self, cell: &NodeKey, dependent: NodeKey) {
        self.nodes
            .entry(cell.clone())
            .or_default()
            .dependents
            .insert(dependent);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn node_keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.nodes.keys()
    }

    pub fn precedents_of(&self, key: &NodeKey) -> Option<&BTreeSet<NodeKey>> {
        self.nodes.get(key).map(|node| &node.precedents)
    }

    pub fn dependents_of(&self, key: &NodeKey) -> Option<&BTreeSet<NodeKey>> {
        self.nodes.get(key).map(|node| &node.dependents)
    }

    pub fn edge_count(&self) -> usize {
        self.nodes
            .values()
            .map(|node| node.precedents.len())
            .sum()
    }

    /// Check the bidirectional edge invariant: every precedent entry on a
    /// node is mirrored by a dependent entry on the other endpoint, and
    /// vice versa.
    pub fn validate_consistency(&self) -> Result<(), GraphError> {
        for (key, node) in &self.nodes {
            for precedent in &node.precedents {
                let mirrored = self
                    .nodes
                    .get(precedent)
                    .is_some_and(|other| other.dependents.contains(key));
                if !mirrored {
                    return Err(GraphError::InconsistentEdge {
                        cell: key.clone(),
                        other: precedent.clone(),
                    });
                }
            }
            for dependent in &node.dependents {
                let mirrored = self
                    .nodes
                    .get(dependent)
                    .is_some_and(|other| other.precedents.contains(key));
                if !mirrored {
                    return Err(GraphError::InconsistentEdge {
                        cell: key.clone(),
                        other: dependent.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Partition the graph into topological generations.
    ///
    /// Layer 0 holds every node with no precedents; each later layer holds
    /// the nodes whose precedents all sit in strictly earlier layers. Layer
    /// membership is a set — no intra-layer order is promised. A non-empty
    /// remainder in which every node still has unassigned precedents is a
    /// cycle: the error names the whole unassigned node set and no partial
    /// layering is returned.
    pub fn layers(&self) -> Result<Layers, GraphError> {
        let mut remaining: BTreeMap<&NodeKey, usize> = self
            .nodes
            .iter()
            .map(|(key, node)| (key, node.precedents.len()))
            .collect();

        let mut layers: Layers = Vec::new();
        let mut frontier: BTreeSet<&NodeKey> = remaining
            .iter()
            .filter(|(_, indegree)| **indegree == 0)
            .map(|(key, _)| *key)
            .collect();

        while !frontier.is_empty() {
            let mut next: BTreeSet<&NodeKey> = BTreeSet::new();
            for key in &frontier {
                remaining.remove(*key);
            }
            for key in &frontier {
                for dependent in &self.nodes[*key].dependents {
                    if let Some(indegree) = remaining.get_mut(dependent) {
                        *indegree -= 1;
                        if *indegree == 0 {
                            next.insert(dependent);
                        }
                    }
                }
            }
            layers.push(frontier.iter().map(|key| (*key).clone()).collect());
            frontier = next;
        }

        if !remaining.is_empty() {
            let unresolved: Vec<NodeKey> = remaining.keys().map(|key| (*key).clone()).collect();
            return Err(GraphError::CyclicDependency { unresolved });
        }
        Ok(layers)
    }
}
