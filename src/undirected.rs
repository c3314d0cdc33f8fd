//! A module for the undirected projection of a graph.
//!
//! The projection drops edge direction and collapses parallel edges. It's what the clustering,
//! distance and community computations run on, and it's also the shape of the random reference
//! models.

use std::collections::VecDeque;

use itertools::Itertools;

/// An undirected simple graph over the nodes `0..n`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UndirectedGraph {
    /// Sorted neighbour lists, without self-loops.
    neighbours: Vec<Vec<usize>>,
}

impl UndirectedGraph {
    /// Creates a graph of `n` isolated nodes.
    pub fn new(n: usize) -> Self {
        Self {
            neighbours: vec![Vec::new(); n],
        }
    }

    /// Creates a graph of `n` nodes from a list of edges, self-loops and duplicates are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropnet::undirected::UndirectedGraph;
    ///
    /// let graph = UndirectedGraph::from_edges(3, [(0, 1), (1, 0), (1, 2), (2, 2)]);
    ///
    /// assert_eq!(graph.edge_count(), 2);
    /// assert_eq!(graph.neighbours(1), &[0, 2]);
    /// ```
    pub fn from_edges(n: usize, edges: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut graph = Self::new(n);
        for (a, b) in edges {
            graph.insert(a, b);
        }

        graph
    }

    /// Inserts an edge and returns whether it's new. Self-loops are never inserted.
    pub fn insert(&mut self, a: usize, b: usize) -> bool {
        if a == b {
            return false;
        }

        match self.neighbours[a].binary_search(&b) {
            Ok(_) => false,
            Err(i) => {
                self.neighbours[a].insert(i, b);
                // The lists are kept symmetric, so `a` can't already be listed for `b`.
                if let Err(j) = self.neighbours[b].binary_search(&a) {
                    self.neighbours[b].insert(j, a);
                }
                true
            }
        }
    }

    /// Removes an edge and returns whether it was present.
    pub fn remove(&mut self, a: usize, b: usize) -> bool {
        match self.neighbours[a].binary_search(&b) {
            Ok(i) => {
                self.neighbours[a].remove(i);
                if let Ok(j) = self.neighbours[b].binary_search(&a) {
                    self.neighbours[b].remove(j);
                }
                true
            }
            Err(_) => false,
        }
    }

    pub fn contains(&self, a: usize, b: usize) -> bool {
        self.neighbours[a].binary_search(&b).is_ok()
    }

    pub fn node_count(&self) -> usize {
        self.neighbours.len()
    }

    pub fn edge_count(&self) -> usize {
        self.neighbours.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn neighbours(&self, node: usize) -> &[usize] {
        &self.neighbours[node]
    }

    pub fn degree(&self, node: usize) -> usize {
        self.neighbours[node].len()
    }

    /// Iterates over every edge once, as `(a, b)` with `a < b`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.neighbours
            .iter()
            .enumerate()
            .flat_map(|(a, ns)| ns.iter().filter(move |&&b| a < b).map(move |&b| (a, b)))
    }

    /// Computes the density, `2|E| / (|V| (|V| - 1))`, which is 0 for fewer than two nodes.
    pub fn density(&self) -> f64 {
        let n = self.node_count() as f64;
        if self.node_count() < 2 {
            return 0.0;
        }

        2.0 * self.edge_count() as f64 / (n * (n - 1.0))
    }

    /// Computes the local clustering coefficient of a node: the fraction of its neighbour pairs
    /// that are themselves connected. Nodes with fewer than two neighbours score 0.
    pub fn clustering(&self, node: usize) -> f64 {
        let k = self.degree(node);
        if k < 2 {
            return 0.0;
        }

        let links = self.neighbours[node]
            .iter()
            .tuple_combinations::<(&usize, &usize)>()
            .filter(|(a, b)| self.contains(**a, **b))
            .count();

        2.0 * links as f64 / (k * (k - 1)) as f64
    }

    /// Averages the clustering coefficient over all nodes, 0 for the empty graph.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropnet::undirected::UndirectedGraph;
    ///
    /// // A triangle with a pendant vertex.
    /// let graph = UndirectedGraph::from_edges(4, [(0, 1), (1, 2), (2, 0), (2, 3)]);
    ///
    /// assert_eq!(graph.average_clustering(), (1.0 + 1.0 + 1.0 / 3.0) / 4.0);
    /// ```
    pub fn average_clustering(&self) -> f64 {
        if self.node_count() == 0 {
            return 0.0;
        }

        let total: f64 = (0..self.node_count()).map(|v| self.clustering(v)).sum();
        total / self.node_count() as f64
    }

    /// Partitions the nodes into connected components.
    ///
    /// Components are listed in order of their lowest node and each one is sorted.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let n = self.node_count();
        let mut visited = vec![false; n];
        let mut components = Vec::new();

        for start in 0..n {
            if visited[start] {
                continue;
            }

            visited[start] = true;
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);

            while let Some(v) = queue.pop_front() {
                for &w in &self.neighbours[v] {
                    if !visited[w] {
                        visited[w] = true;
                        component.push(w);
                        queue.push_back(w);
                    }
                }
            }

            component.sort_unstable();
            components.push(component);
        }

        components
    }

    /// Returns the nodes of the component with the most nodes, the first one found on ties.
    pub fn largest_component(&self) -> Vec<usize> {
        self.connected_components()
            .into_iter()
            .fold(Vec::new(), |largest, component| {
                if component.len() > largest.len() {
                    component
                } else {
                    largest
                }
            })
    }

    /// Returns whether the graph has exactly one component. The empty graph isn't connected.
    pub fn is_connected(&self) -> bool {
        self.connected_components().len() == 1
    }

    /// Builds the subgraph induced by `nodes`, node `nodes[i]` becoming node `i`.
    pub fn induced_subgraph(&self, nodes: &[usize]) -> Self {
        let mut position = vec![None; self.node_count()];
        for (i, &v) in nodes.iter().enumerate() {
            position[v] = Some(i);
        }

        let edges = nodes.iter().enumerate().flat_map(|(i, &v)| {
            let position = &position;
            self.neighbours[v]
                .iter()
                .filter_map(move |&w| position[w].map(|j| (i, j)))
        });

        Self::from_edges(nodes.len(), edges.collect::<Vec<_>>())
    }

    /// Breadth-first hop counts from `source`, `None` for unreachable nodes.
    pub fn distances_from(&self, source: usize) -> Vec<Option<usize>> {
        let mut distances = vec![None; self.node_count()];
        let mut queue = VecDeque::new();

        distances[source] = Some(0);
        queue.push_back(source);

        while let Some(current) = queue.pop_front() {
            // Only nodes with a distance are ever queued.
            let d = distances[current].unwrap_or_default();
            for &w in &self.neighbours[current] {
                if distances[w].is_none() {
                    distances[w] = Some(d + 1);
                    queue.push_back(w);
                }
            }
        }

        distances
    }

    /// The greatest distance from each node to any other, `None` unless the graph is connected.
    pub fn eccentricities(&self) -> Option<Vec<usize>> {
        (0..self.node_count())
            .map(|v| {
                self.distances_from(v)
                    .into_iter()
                    .try_fold(0, |max, d| d.map(|d| max.max(d)))
            })
            .collect::<Option<Vec<usize>>>()
            .filter(|_| self.node_count() > 0)
    }

    /// The greatest eccentricity, `None` unless the graph is connected.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropnet::undirected::UndirectedGraph;
    ///
    /// let path = UndirectedGraph::from_edges(4, [(0, 1), (1, 2), (2, 3)]);
    /// assert_eq!(path.diameter(), Some(3));
    ///
    /// let split = UndirectedGraph::from_edges(4, [(0, 1), (2, 3)]);
    /// assert_eq!(split.diameter(), None);
    /// ```
    pub fn diameter(&self) -> Option<usize> {
        self.eccentricities()?.into_iter().max()
    }

    /// The mean hop count over all ordered pairs of distinct nodes, `None` unless the graph is
    /// connected. A single node has an average path length of 0.
    pub fn average_path_length(&self) -> Option<f64> {
        let n = self.node_count();
        if !self.is_connected() {
            return None;
        }
        if n == 1 {
            return Some(0.0);
        }

        let mut total = 0usize;
        for v in 0..n {
            for d in self.distances_from(v) {
                total += d?;
            }
        }

        Some(total as f64 / (n * (n - 1)) as f64)
    }
}
