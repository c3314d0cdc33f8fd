//! A module for working with drop graphs.

use std::{
    cmp,
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
};

use nalgebra::DMatrix;

use crate::{
    edge::Edge,
    error::{Error, Result},
    metrics::Periphery,
    undirected::UndirectedGraph,
};

/// The position of a node in the graph's sorted node order.
pub(crate) type GraphIndex = usize;

pub(crate) const MIN_NUM_THREADS: usize = 1;
pub(crate) const MAX_NUM_THREADS: usize = 128;

/// The key of a node.
///
/// Monsters and items live in separate namespaces, a monster and an item sharing a name are two
/// different nodes. The name itself is only a display label.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKey {
    Monster(String),
    Item(String),
}

impl NodeKey {
    pub fn monster(name: impl Into<String>) -> Self {
        Self::Monster(name.into())
    }

    pub fn item(name: impl Into<String>) -> Self {
        Self::Item(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Monster(name) | Self::Item(name) => name,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Monster(_) => NodeKind::Monster,
            Self::Item(_) => NodeKind::Item,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Monster,
    Item,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monster => f.write_str("monster"),
            Self::Item => f.write_str("item"),
        }
    }
}

/// The attributes of a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeData {
    Monster {
        /// The comma-joined names of the maps the monster spawns on, `"unknown"` if none.
        map_label: String,
    },
    Item,
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Monster { .. } => NodeKind::Monster,
            Self::Item => NodeKind::Item,
        }
    }

    pub fn map_label(&self) -> Option<&str> {
        match self {
            Self::Monster { map_label } => Some(map_label),
            Self::Item => None,
        }
    }

    fn default_for(key: &NodeKey) -> Self {
        match key {
            NodeKey::Monster(_) => Self::Monster {
                map_label: "unknown".to_owned(),
            },
            NodeKey::Item(_) => Self::Item,
        }
    }
}

/// A directed graph of monsters and the items they drop.
///
/// There's at most one edge per ordered pair of nodes. Nodes are kept sorted by key, which fixes
/// the order of every computation and makes results reproducible.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Graph {
    nodes: BTreeMap<NodeKey, NodeData>,
    edges: BTreeSet<Edge>,
}

impl Graph {
    /// Creates an empty graph.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropnet::graph::Graph;
    ///
    /// let graph = Graph::new();
    /// assert!(graph.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a monster node, overwriting the map label if the monster is already present.
    pub fn insert_monster(&mut self, name: &str, map_label: impl Into<String>) -> NodeKey {
        let key = NodeKey::monster(name);
        self.nodes.insert(
            key.clone(),
            NodeData::Monster {
                map_label: map_label.into(),
            },
        );

        key
    }

    /// Inserts an item node, a no-op if the item is already present.
    pub fn insert_item(&mut self, name: &str) -> NodeKey {
        let key = NodeKey::item(name);
        self.nodes.entry(key.clone()).or_insert(NodeData::Item);

        key
    }

    /// Inserts an edge into the graph, adding its endpoints if they're missing. Returns whether
    /// the edge is new.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropnet::edge::Edge;
    /// use dropnet::graph::Graph;
    ///
    /// let mut graph = Graph::new();
    ///
    /// assert!(graph.insert(Edge::drop("Poring", "Jellopy")));
    /// assert!(!graph.insert(Edge::drop("Poring", "Jellopy")));
    /// assert_eq!(graph.edge_count(), 1);
    /// assert_eq!(graph.node_count(), 2);
    /// ```
    pub fn insert(&mut self, edge: Edge) -> bool {
        for key in [edge.source(), edge.target()] {
            if !self.nodes.contains_key(key) {
                self.nodes.insert(key.clone(), NodeData::default_for(key));
            }
        }

        self.edges.insert(edge)
    }

    /// Inserts a `monster -> item` drop edge.
    pub fn insert_drop(&mut self, monster: &str, item: &str) -> bool {
        self.insert(Edge::drop(monster, item))
    }

    /// Checks if the graph contains an edge.
    pub fn contains(&self, edge: &Edge) -> bool {
        self.edges.contains(edge)
    }

    pub fn contains_node(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn node(&self, key: &NodeKey) -> Option<&NodeData> {
        self.nodes.get(key)
    }

    /// Iterates over the nodes in key order.
    pub fn nodes(&self) -> impl Iterator<Item = (&NodeKey, &NodeData)> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Returns the node count of the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of nodes of the given kind.
    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.keys().filter(|key| key.kind() == kind).count()
    }

    /// Returns the edge count of the graph.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Computes the density of the graph, the ratio of directed edges with respect to the maximum
    /// possible directed edges. Graphs with fewer than two nodes have a density of 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropnet::graph::Graph;
    ///
    /// let mut graph = Graph::new();
    /// assert_eq!(graph.density(), 0.0);
    ///
    /// graph.insert_drop("Poring", "Jellopy");
    /// assert_eq!(graph.density(), 0.5);
    /// ```
    pub fn density(&self) -> f64 {
        let n = self.node_count();
        if n < 2 {
            return 0.0;
        }

        // Calculate the total number of possible directed edges given a node count.
        let possible = (n * (n - 1)) as f64;
        self.edge_count() as f64 / possible
    }

    /// Constructs the adjacency matrix for this graph, `a[(i, j)]` is 1 for an edge from node `i`
    /// to node `j` in key order.
    ///
    /// # Examples
    ///
    /// ```
    /// use nalgebra::dmatrix;
    /// use dropnet::graph::Graph;
    ///
    /// let mut graph = Graph::new();
    /// graph.insert_drop("Poring", "Jellopy");
    ///
    /// // Monsters sort before items.
    /// assert_eq!(
    ///     graph.adjacency_matrix(),
    ///     dmatrix![0.0, 1.0;
    ///              0.0, 0.0]
    /// );
    /// ```
    pub fn adjacency_matrix(&self) -> DMatrix<f64> {
        let n = self.node_count();
        let mut matrix = DMatrix::<f64>::zeros(n, n);

        for (i, j) in self.edge_indices() {
            matrix[(i, j)] = 1.0;
        }

        matrix
    }

    /// Returns the total (in + out) degree of every node, in key order.
    pub fn degree_distribution(&self) -> Vec<usize> {
        self.degrees()
            .into_iter()
            .map(|(indegree, outdegree)| indegree + outdegree)
            .collect()
    }

    /// Returns a mapping of nodes to their total degree.
    pub fn degrees_by_node(&self) -> BTreeMap<NodeKey, usize> {
        self.nodes
            .keys()
            .cloned()
            .zip(self.degree_distribution())
            .collect()
    }

    /// Computes the degree assortativity: the Pearson correlation between the out-degree of each
    /// edge's source and the in-degree of its target.
    ///
    /// The coefficient is undefined without edges or when either side has a single degree value,
    /// 0 is returned in those cases. An empty graph also reports 0, use
    /// [`StructuralMetrics::compute`](crate::metrics::StructuralMetrics::compute) to have it
    /// rejected with [`Error::EmptyGraph`].
    pub fn degree_assortativity(&self) -> f64 {
        if self.edges.is_empty() {
            return 0.0;
        }

        let degrees = self.degrees();
        let pairs: Vec<(f64, f64)> = self
            .edge_indices()
            .map(|(i, j)| (degrees[i].1 as f64, degrees[j].0 as f64))
            .collect();

        pearson(&pairs).unwrap_or(0.0)
    }

    /// Computes the average clustering coefficient of the undirected projection, 0 for an empty
    /// graph.
    pub fn average_clustering(&self) -> f64 {
        self.undirected().average_clustering()
    }

    /// Returns the number of strongly connected components.
    ///
    /// Like the other component counts this is 0 for an empty graph rather than an error; the
    /// empty check lives in [`StructuralMetrics::compute`](crate::metrics::StructuralMetrics::compute).
    pub fn strongly_connected_component_count(&self) -> usize {
        strongly_connected_components(&self.out_indices()).len()
    }

    /// Returns the number of weakly connected components, 0 for an empty graph.
    pub fn weakly_connected_component_count(&self) -> usize {
        self.undirected().connected_components().len()
    }

    /// Returns the strongly connected components, each as a list of keys.
    pub fn strongly_connected_components(&self) -> Vec<Vec<NodeKey>> {
        let keys = self.keys();

        strongly_connected_components(&self.out_indices())
            .into_iter()
            .map(|component| component.into_iter().map(|i| keys[i].clone()).collect())
            .collect()
    }

    /// Computes the diameter and periphery of the undirected projection.
    ///
    /// A disconnected projection is first restricted to its largest component (the first one in
    /// key order on ties), the result records which size was used.
    pub fn diameter_and_periphery(&self) -> Result<Periphery> {
        if self.is_empty() {
            return Err(Error::EmptyGraph);
        }

        let projection = self.undirected();
        let component = projection.largest_component();
        let connected = component.len() == self.node_count();
        let subgraph = if connected {
            projection
        } else {
            projection.induced_subgraph(&component)
        };

        // The subgraph is connected and non-empty by construction.
        let eccentricities = subgraph.eccentricities().unwrap_or_default();
        let diameter = eccentricities.iter().copied().max().unwrap_or_default();

        let keys = self.keys();
        let periphery = eccentricities
            .iter()
            .enumerate()
            .filter(|(_, e)| **e == diameter)
            .map(|(i, _)| keys[component[i]].clone())
            .collect();

        Ok(Periphery {
            diameter,
            periphery,
            component_size: component.len(),
            connected,
        })
    }

    /// Projects the graph to an undirected simple graph over the node indices.
    pub fn undirected(&self) -> UndirectedGraph {
        UndirectedGraph::from_edges(self.node_count(), self.edge_indices().collect::<Vec<_>>())
    }

    //
    // Crate
    //

    /// The node keys in index order.
    pub(crate) fn keys(&self) -> Vec<&NodeKey> {
        self.nodes.keys().collect()
    }

    /// Outgoing neighbour lists in index order.
    pub(crate) fn out_indices(&self) -> Vec<Vec<GraphIndex>> {
        let mut indices = vec![Vec::new(); self.node_count()];
        for (i, j) in self.edge_indices() {
            indices[i].push(j);
        }

        indices
    }

    /// Incoming neighbour lists in index order.
    pub(crate) fn in_indices(&self) -> Vec<Vec<GraphIndex>> {
        let mut indices = vec![Vec::new(); self.node_count()];
        for (i, j) in self.edge_indices() {
            indices[j].push(i);
        }

        indices
    }

    /// `(in, out)` degrees in index order.
    pub(crate) fn degrees(&self) -> Vec<(usize, usize)> {
        let mut degrees = vec![(0, 0); self.node_count()];
        for (i, j) in self.edge_indices() {
            degrees[i].1 += 1;
            degrees[j].0 += 1;
        }

        degrees
    }

    //
    // Private
    //

    /// Constructs an index of nodes to their position in key order.
    fn generate_index(&self) -> HashMap<&NodeKey, GraphIndex> {
        self.nodes
            .keys()
            .enumerate()
            .map(|(i, key)| (key, i))
            .collect()
    }

    /// The edges as `(source, target)` index pairs.
    fn edge_indices(&self) -> impl Iterator<Item = (GraphIndex, GraphIndex)> + '_ {
        let index = self.generate_index();

        // Edge endpoints are always inserted as nodes, so both lookups succeed.
        self.edges
            .iter()
            .filter_map(move |edge| Some((*index.get(edge.source())?, *index.get(edge.target())?)))
    }
}

//
// Helpers
//

/// Pearson correlation of the pairs, `None` if either variable has no variance.
fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    Some(cov / (var_x * var_y).sqrt())
}

/// Tarjan's algorithm, with an explicit call stack so deep graphs can't overflow the thread's
/// stack.
fn strongly_connected_components(indices: &[Vec<GraphIndex>]) -> Vec<Vec<GraphIndex>> {
    const UNVISITED: usize = usize::MAX;

    let n = indices.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut next = 0;
    let mut components = Vec::new();

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }

        // Frames are `(node, position of the next neighbour to visit)`.
        let mut calls = vec![(root, 0)];
        index[root] = next;
        lowlink[root] = next;
        next += 1;
        stack.push(root);
        on_stack[root] = true;

        while let Some(&(v, position)) = calls.last() {
            if let Some(&w) = indices[v].get(position) {
                if let Some(frame) = calls.last_mut() {
                    frame.1 += 1;
                }

                if index[w] == UNVISITED {
                    index[w] = next;
                    lowlink[w] = next;
                    next += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    calls.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = cmp::min(lowlink[v], index[w]);
                }

                continue;
            }

            calls.pop();
            if let Some(&(parent, _)) = calls.last() {
                lowlink[parent] = cmp::min(lowlink[parent], lowlink[v]);
            }

            if lowlink[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }

                component.sort_unstable();
                components.push(component);
            }
        }
    }

    components
}
