//! A module for detecting communities with the Louvain method.
//!
//! Nodes are greedily moved into the neighbouring community that most increases modularity until
//! no move helps, then each community is collapsed into a single node and the process repeats on
//! the coarser graph. Visiting order is shuffled with a seeded RNG, so a given seed always yields
//! the same partition.

use std::collections::BTreeMap;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tracing::debug;

use crate::{
    error::{Error, Result},
    graph::{Graph, NodeKey},
    undirected::UndirectedGraph,
};

/// The seed used unless configured otherwise.
pub const DEFAULT_SEED: u64 = 42;

/// Levels that improve modularity by less than this end the search.
const MIN_MODULARITY_GAIN: f64 = 1.0e-7;

/// Moves must beat staying put by more than this, which keeps rounding noise from bouncing a node
/// between equivalent communities forever.
const MOVE_EPSILON: f64 = 1.0e-12;

/// A partition of a graph's nodes into communities.
#[derive(Clone, Debug, PartialEq)]
pub struct Communities {
    partition: BTreeMap<NodeKey, usize>,
    count: usize,
    modularity: f64,
}

impl Communities {
    /// The community of every node. IDs are compact (`0..len()`) and numbered in order of first
    /// appearance in key order; only their equality is meaningful.
    pub fn partition(&self) -> &BTreeMap<NodeKey, usize> {
        &self.partition
    }

    pub fn community_of(&self, key: &NodeKey) -> Option<usize> {
        self.partition.get(key).copied()
    }

    pub fn modularity(&self) -> f64 {
        self.modularity
    }

    /// Returns the number of communities.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The size of each community, indexed by ID.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.count];
        for &community in self.partition.values() {
            sizes[community] += 1;
        }

        sizes
    }

    /// The members of a community, in key order.
    pub fn members(&self, community: usize) -> Vec<&NodeKey> {
        self.partition
            .iter()
            .filter(|(_, c)| **c == community)
            .map(|(key, _)| key)
            .collect()
    }
}

/// Partitions the undirected projection of the graph into communities.
///
/// # Examples
///
/// ```
/// use dropnet::community::{detect_communities, DEFAULT_SEED};
/// use dropnet::graph::{Graph, NodeKey};
///
/// let mut graph = Graph::new();
/// graph.insert_drop("Poring", "Jellopy");
/// graph.insert_drop("Wolf", "Wolf Claw");
///
/// let communities = detect_communities(&graph, DEFAULT_SEED).unwrap();
///
/// assert_eq!(communities.len(), 2);
/// assert_eq!(
///     communities.community_of(&NodeKey::monster("Wolf")),
///     communities.community_of(&NodeKey::item("Wolf Claw")),
/// );
/// assert_eq!(communities.modularity(), 0.5);
/// ```
pub fn detect_communities(graph: &Graph, seed: u64) -> Result<Communities> {
    if graph.is_empty() {
        return Err(Error::EmptyGraph);
    }

    let projection = graph.undirected();
    let labels = louvain(&projection, seed);
    let modularity = modularity(&projection, &labels);
    let count = labels.iter().max().map_or(0, |max| max + 1);

    debug!(communities = count, modularity, "detected communities");

    let partition = graph
        .nodes()
        .map(|(key, _)| key.clone())
        .zip(labels)
        .collect();

    Ok(Communities {
        partition,
        count,
        modularity,
    })
}

/// Computes the modularity of a labelling of the graph's nodes.
///
/// A graph without edges has a modularity of 0.
pub fn modularity(graph: &UndirectedGraph, labels: &[usize]) -> f64 {
    let m = graph.edge_count() as f64;
    if graph.edge_count() == 0 {
        return 0.0;
    }

    let count = labels.iter().max().map_or(0, |max| max + 1);
    let mut internal = vec![0.0; count];
    let mut degrees = vec![0.0; count];

    for v in 0..graph.node_count() {
        degrees[labels[v]] += graph.degree(v) as f64;
    }
    for (a, b) in graph.edges() {
        if labels[a] == labels[b] {
            internal[labels[a]] += 1.0;
        }
    }

    internal
        .iter()
        .zip(&degrees)
        .map(|(l, d)| l / m - (d / (2.0 * m)).powi(2))
        .sum()
}

/// Runs the Louvain method, returning a compact community label for each node.
pub fn louvain(graph: &UndirectedGraph, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);

    // Maps each input node to its node in the current level.
    let mut labels: Vec<usize> = (0..graph.node_count()).collect();
    let mut level = Level::from(graph);
    let mut current = modularity(graph, &labels);

    loop {
        let (communities, moved) = level.move_nodes(&mut rng);
        if !moved {
            break;
        }

        let (communities, count) = renumber(&communities);
        let next: Vec<usize> = labels.iter().map(|&l| communities[l]).collect();
        let next_modularity = modularity(graph, &next);

        if next_modularity - current < MIN_MODULARITY_GAIN {
            break;
        }

        debug!(communities = count, modularity = next_modularity, "louvain level");

        labels = next;
        current = next_modularity;
        level = level.aggregate(&communities, count);
    }

    renumber(&labels).0
}

/// Relabels communities as `0..count` in order of first appearance.
fn renumber(labels: &[usize]) -> (Vec<usize>, usize) {
    let mut ids = BTreeMap::new();
    let renumbered = labels
        .iter()
        .map(|label| {
            let next = ids.len();
            *ids.entry(*label).or_insert(next)
        })
        .collect();

    (renumbered, ids.len())
}

/// A weighted graph of communities from the previous level.
struct Level {
    /// Weighted neighbour lists, without self-loops.
    adjacency: Vec<Vec<(usize, f64)>>,
    /// The weight of the edges inside each node.
    self_loops: Vec<f64>,
}

impl From<&UndirectedGraph> for Level {
    fn from(graph: &UndirectedGraph) -> Self {
        Self {
            adjacency: (0..graph.node_count())
                .map(|v| graph.neighbours(v).iter().map(|&w| (w, 1.0)).collect())
                .collect(),
            self_loops: vec![0.0; graph.node_count()],
        }
    }
}

impl Level {
    fn degree(&self, node: usize) -> f64 {
        self.adjacency[node].iter().map(|(_, w)| w).sum::<f64>() + 2.0 * self.self_loops[node]
    }

    /// Moves nodes between communities until no move increases modularity. Returns the
    /// community of each node and whether any node moved.
    fn move_nodes(&self, rng: &mut StdRng) -> (Vec<usize>, bool) {
        let n = self.adjacency.len();
        let degrees: Vec<f64> = (0..n).map(|v| self.degree(v)).collect();
        let two_m: f64 = degrees.iter().sum();

        let mut community: Vec<usize> = (0..n).collect();
        if two_m == 0.0 {
            return (community, false);
        }

        let mut totals = degrees.clone();
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);

        let mut improved = false;
        loop {
            let mut moved = false;

            for &node in &order {
                let current = community[node];
                let k = degrees[node];

                // Edge weight from the node into each neighbouring community.
                let mut links: BTreeMap<usize, f64> = BTreeMap::new();
                for &(neighbour, weight) in &self.adjacency[node] {
                    *links.entry(community[neighbour]).or_default() += weight;
                }

                totals[current] -= k;

                let mut best = current;
                let mut best_gain =
                    links.get(&current).copied().unwrap_or_default() - totals[current] * k / two_m;
                for (&candidate, &weight) in &links {
                    let gain = weight - totals[candidate] * k / two_m;
                    if gain > best_gain + MOVE_EPSILON {
                        best = candidate;
                        best_gain = gain;
                    }
                }

                totals[best] += k;
                community[node] = best;

                if best != current {
                    moved = true;
                    improved = true;
                }
            }

            if !moved {
                break;
            }
        }

        (community, improved)
    }

    /// Collapses each community into a single node.
    fn aggregate(&self, communities: &[usize], count: usize) -> Self {
        let mut weights: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); count];
        let mut self_loops = vec![0.0; count];

        for (node, neighbours) in self.adjacency.iter().enumerate() {
            let c = communities[node];
            self_loops[c] += self.self_loops[node];

            for &(neighbour, weight) in neighbours {
                let d = communities[neighbour];
                if c == d {
                    // Each internal edge is seen from both of its ends.
                    self_loops[c] += weight / 2.0;
                } else {
                    *weights[c].entry(d).or_default() += weight;
                }
            }
        }

        Self {
            adjacency: weights
                .into_iter()
                .map(|neighbours| neighbours.into_iter().collect())
                .collect(),
            self_loops,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;

    /// Two triangles joined by the edge 2 - 3.
    fn barbell() -> UndirectedGraph {
        UndirectedGraph::from_edges(6, [(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3), (2, 3)])
    }

    #[test]
    fn modularity_of_known_partitions() {
        let graph = barbell();

        assert!((modularity(&graph, &[0, 0, 0, 1, 1, 1]) - 5.0 / 14.0).abs() < 1e-12);
        assert!(modularity(&graph, &[0, 0, 0, 0, 0, 0]).abs() < 1e-12);
        assert_eq!(modularity(&UndirectedGraph::new(3), &[0, 1, 2]), 0.0);
    }

    #[test]
    fn louvain_splits_the_barbell() {
        for seed in [DEFAULT_SEED, 1, 7, 1234] {
            let labels = louvain(&barbell(), seed);

            assert_eq!(labels, vec![0, 0, 0, 1, 1, 1], "seed {seed}");
        }
    }

    #[test]
    fn louvain_without_edges() {
        assert_eq!(louvain(&UndirectedGraph::new(3), DEFAULT_SEED), vec![0, 1, 2]);
        assert!(louvain(&UndirectedGraph::new(0), DEFAULT_SEED).is_empty());
    }

    #[test]
    fn renumber() {
        assert_eq!(super::renumber(&[5, 5, 2, 9, 2]), (vec![0, 0, 1, 2, 1], 3));
    }

    #[test]
    fn aggregate_preserves_weight() {
        let level = Level::from(&barbell());
        let coarse = level.aggregate(&[0, 0, 0, 1, 1, 1], 2);

        assert_eq!(coarse.self_loops, vec![3.0, 3.0]);
        assert_eq!(coarse.adjacency, vec![vec![(1, 1.0)], vec![(0, 1.0)]]);
        assert_eq!(coarse.degree(0) + coarse.degree(1), 14.0);
    }

    #[test]
    fn detect_communities() {
        let mut graph = Graph::new();
        graph.insert_drop("Poring", "Jellopy");
        graph.insert_drop("Poring", "Sticky Mucus");
        graph.insert_drop("Drops", "Jellopy");
        graph.insert_drop("Wolf", "Wolf Claw");
        graph.insert_drop("Wolf", "Animal Skin");
        graph.insert_drop("Desert Wolf", "Animal Skin");
        graph.insert(Edge::drop("Desert Wolf", "Wolf Claw"));

        let communities = super::detect_communities(&graph, DEFAULT_SEED).unwrap();

        assert_eq!(communities.sizes().iter().sum::<usize>(), graph.node_count());
        assert!((-1.0..=1.0).contains(&communities.modularity()));
        assert!(communities.modularity() > 0.0);
        assert_eq!(
            communities.community_of(&NodeKey::monster("Wolf")),
            communities.community_of(&NodeKey::monster("Desert Wolf"))
        );
        assert_ne!(
            communities.community_of(&NodeKey::monster("Wolf")),
            communities.community_of(&NodeKey::monster("Poring"))
        );
        assert_eq!(communities.members(0).len(), communities.sizes()[0]);

        // Same seed, same partition.
        assert_eq!(
            super::detect_communities(&graph, DEFAULT_SEED).unwrap(),
            communities
        );
    }

    #[test]
    fn detect_communities_empty() {
        assert!(matches!(
            super::detect_communities(&Graph::new(), DEFAULT_SEED),
            Err(Error::EmptyGraph)
        ));
    }
}
