//! A module for comparing a graph against random reference models.
//!
//! Each model is generated with the node and edge counts of the real graph, then every graph is
//! summarised the same way on its undirected form. The comparison is a single descriptive
//! sample; nothing here tests significance.

use std::{collections::BTreeMap, fmt};

use itertools::Itertools;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use crate::{
    config::AnalysisConfig,
    error::{Error, Result},
    graph::Graph,
    undirected::UndirectedGraph,
};

/// The graphs a comparison reports on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Model {
    /// The graph being analysed.
    Real,
    /// Erdős-Rényi `G(n, p)`.
    ErdosRenyi,
    /// Watts-Strogatz small world.
    SmallWorld,
    /// Barabási-Albert preferential attachment.
    ScaleFree,
}

impl Model {
    pub const ALL: [Self; 4] = [Self::Real, Self::ErdosRenyi, Self::SmallWorld, Self::ScaleFree];
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Real => "Real",
            Self::ErdosRenyi => "ErdosRenyi",
            Self::SmallWorld => "SmallWorld",
            Self::ScaleFree => "ScaleFree",
        };

        f.write_str(name)
    }
}

/// The statistics reported for each model.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricsSummary {
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    pub average_clustering: f64,
    /// `None` when the graph is disconnected.
    pub average_path_length: Option<f64>,
    /// `None` when the graph is disconnected.
    pub diameter: Option<usize>,
}

impl MetricsSummary {
    pub fn summarize(graph: &UndirectedGraph) -> Self {
        Self {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            density: graph.density(),
            average_clustering: graph.average_clustering(),
            average_path_length: graph.average_path_length(),
            diameter: graph.diameter(),
        }
    }
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes: {}, edges: {}, density: {:.4}, clustering: {:.4}, ",
            self.node_count, self.edge_count, self.density, self.average_clustering
        )?;

        match self.average_path_length {
            Some(length) => write!(f, "average path length: {length:.4}, ")?,
            None => f.write_str("average path length: N/A, ")?,
        }
        match self.diameter {
            Some(diameter) => write!(f, "diameter: {diameter}"),
            None => f.write_str("diameter: N/A"),
        }
    }
}

/// Summarises the graph and three random models matched on its node and edge counts.
///
/// With `n` nodes and `m` directed edges the models are `G(n, m / (n (n - 1)))`, a Watts-Strogatz
/// graph of degree `max(2, round(2m / n))` and a Barabási-Albert graph attaching
/// `max(1, round(m / n))` edges per node. All of them draw from one RNG seeded with
/// `config.seed`.
pub fn compare_against_models(
    graph: &Graph,
    config: &AnalysisConfig,
) -> Result<BTreeMap<Model, MetricsSummary>> {
    if graph.is_empty() {
        return Err(Error::EmptyGraph);
    }

    let n = graph.node_count();
    let m = graph.edge_count() as f64;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let p = if n < 2 {
        0.0
    } else {
        m / (n * (n - 1)) as f64
    };
    let k = ((2.0 * m / n as f64).round() as usize).max(2);
    let attach = ((m / n as f64).round() as usize).max(1);

    debug!(n, p, k, attach, "generating reference models");

    let mut summaries = BTreeMap::new();
    summaries.insert(Model::Real, MetricsSummary::summarize(&graph.undirected()));
    summaries.insert(
        Model::ErdosRenyi,
        MetricsSummary::summarize(&erdos_renyi(n, p, &mut rng)),
    );
    summaries.insert(
        Model::SmallWorld,
        MetricsSummary::summarize(&watts_strogatz(n, k, config.rewiring_probability, &mut rng)),
    );
    summaries.insert(
        Model::ScaleFree,
        MetricsSummary::summarize(&barabasi_albert(n, attach, &mut rng)),
    );

    Ok(summaries)
}

/// Generates `G(n, p)`: every pair of nodes is joined independently with probability `p`.
pub fn erdos_renyi<R: Rng>(n: usize, p: f64, rng: &mut R) -> UndirectedGraph {
    let p = clamp_probability(p);

    UndirectedGraph::from_edges(
        n,
        (0..n)
            .tuple_combinations::<(usize, usize)>()
            .filter(|_| rng.gen_bool(p))
            .collect::<Vec<_>>(),
    )
}

/// Generates a Watts-Strogatz small world.
///
/// Nodes sit on a ring joined to their `k / 2` nearest neighbours on each side, then each lattice
/// edge `(u, v)` is replaced by `(u, w)` with probability `p`, `w` drawn uniformly among the
/// nodes `u` isn't already joined to. A `k` of at least `n` yields the complete graph.
///
/// # Examples
///
/// ```
/// use rand::{rngs::StdRng, SeedableRng};
///
/// use dropnet::models::watts_strogatz;
///
/// let mut rng = StdRng::seed_from_u64(42);
/// let ring = watts_strogatz(10, 4, 0.0, &mut rng);
///
/// assert_eq!(ring.edge_count(), 20);
/// assert_eq!(ring.neighbours(0), &[1, 2, 8, 9]);
/// ```
pub fn watts_strogatz<R: Rng>(n: usize, k: usize, p: f64, rng: &mut R) -> UndirectedGraph {
    if k >= n {
        return UndirectedGraph::from_edges(
            n,
            (0..n)
                .tuple_combinations::<(usize, usize)>()
                .collect::<Vec<_>>(),
        );
    }

    let half = k / 2;
    let mut graph = UndirectedGraph::from_edges(
        n,
        (1..=half)
            .flat_map(|j| (0..n).map(move |u| (u, (u + j) % n)))
            .collect::<Vec<_>>(),
    );

    let p = clamp_probability(p);
    for j in 1..=half {
        for u in 0..n {
            if !rng.gen_bool(p) || graph.degree(u) + 1 >= n {
                continue;
            }

            let w = loop {
                let w = rng.gen_range(0..n);
                if w != u && !graph.contains(u, w) {
                    break w;
                }
            };

            graph.remove(u, (u + j) % n);
            graph.insert(u, w);
        }
    }

    graph
}

/// Generates a Barabási-Albert scale-free graph.
///
/// Growth starts from a star on `m + 1` nodes. Each further node joins `m` distinct existing
/// nodes, each drawn with probability proportional to its degree. `m` is clamped to `1..n`.
pub fn barabasi_albert<R: Rng>(n: usize, m: usize, rng: &mut R) -> UndirectedGraph {
    if n < 2 {
        return UndirectedGraph::new(n);
    }

    let m = m.clamp(1, n - 1);
    let mut graph = UndirectedGraph::from_edges(n, (1..=m).map(|leaf| (0, leaf)));

    // Every node appears once per incident edge, so a uniform draw is degree-weighted.
    let mut repeated: Vec<usize> = (0..=m)
        .flat_map(|v| std::iter::repeat(v).take(graph.degree(v)))
        .collect();

    for source in m + 1..n {
        let mut targets = Vec::with_capacity(m);
        while targets.len() < m {
            let target = repeated[rng.gen_range(0..repeated.len())];
            if !targets.contains(&target) {
                targets.push(target);
            }
        }

        for &target in &targets {
            graph.insert(source, target);
        }
        repeated.extend(targets);
        repeated.extend(std::iter::repeat(source).take(m));
    }

    graph
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn erdos_renyi_extremes() {
        assert_eq!(erdos_renyi(10, 0.0, &mut rng()).edge_count(), 0);
        assert_eq!(erdos_renyi(10, 1.0, &mut rng()).edge_count(), 45);
        assert_eq!(erdos_renyi(10, 3.0, &mut rng()).edge_count(), 45);
        assert_eq!(erdos_renyi(0, 0.5, &mut rng()).node_count(), 0);
    }

    #[test]
    fn erdos_renyi_is_seeded() {
        assert_eq!(erdos_renyi(30, 0.2, &mut rng()), erdos_renyi(30, 0.2, &mut rng()));
    }

    #[test]
    fn watts_strogatz_keeps_edge_count() {
        let graph = watts_strogatz(20, 4, 0.5, &mut rng());

        assert_eq!(graph.node_count(), 20);
        assert_eq!(graph.edge_count(), 40);
    }

    #[test]
    fn watts_strogatz_complete() {
        let graph = watts_strogatz(5, 5, 0.1, &mut rng());

        assert_eq!(graph.edge_count(), 10);
        assert_eq!(graph.diameter(), Some(1));
    }

    #[test]
    fn watts_strogatz_lattice_clustering() {
        // Each node of a k = 4 ring lattice has 3 of its 6 neighbour pairs joined.
        let graph = watts_strogatz(12, 4, 0.0, &mut rng());

        assert!((graph.average_clustering() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn barabasi_albert_edge_count() {
        // The star contributes m edges, every later node another m.
        let graph = barabasi_albert(50, 2, &mut rng());

        assert_eq!(graph.node_count(), 50);
        assert_eq!(graph.edge_count(), 2 + 47 * 2);
        assert!(graph.is_connected());
    }

    #[test]
    fn barabasi_albert_small() {
        assert_eq!(barabasi_albert(1, 3, &mut rng()).edge_count(), 0);
        // m is clamped to n - 1, leaving just the star.
        assert_eq!(barabasi_albert(4, 10, &mut rng()).edge_count(), 3);
    }

    #[test]
    fn summary_display() {
        let summary = MetricsSummary::summarize(&UndirectedGraph::from_edges(4, [(0, 1), (2, 3)]));

        assert_eq!(summary.average_path_length, None);
        assert_eq!(
            summary.to_string(),
            "nodes: 4, edges: 2, density: 0.3333, clustering: 0.0000, \
             average path length: N/A, diameter: N/A"
        );
    }

    #[test]
    fn compare() {
        let mut graph = Graph::new();
        for (monster, item) in [
            ("Poring", "Jellopy"),
            ("Poring", "Apple"),
            ("Drops", "Jellopy"),
            ("Drops", "Orange"),
            ("Lunatic", "Clover"),
            ("Lunatic", "Apple"),
            ("Fabre", "Fluff"),
            ("Fabre", "Clover"),
        ] {
            graph.insert_drop(monster, item);
        }

        let config = AnalysisConfig::default();
        let summaries = compare_against_models(&graph, &config).unwrap();

        assert_eq!(summaries.keys().copied().collect::<Vec<_>>(), Model::ALL);
        assert!(summaries.values().all(|s| s.node_count == 9));

        let real = &summaries[&Model::Real];
        assert_eq!(real.edge_count, 8);
        assert_eq!(real.average_clustering, 0.0);
        assert_eq!(real.diameter, Some(8));

        // k = round(16 / 9) = 2 is a ring before rewiring.
        assert_eq!(summaries[&Model::SmallWorld].edge_count, 9);
        // One attachment per node grows a tree.
        assert_eq!(summaries[&Model::ScaleFree].edge_count, 8);

        assert_eq!(compare_against_models(&graph, &config).unwrap(), summaries);
    }

    #[test]
    fn compare_empty() {
        assert!(matches!(
            compare_against_models(&Graph::new(), &AnalysisConfig::default()),
            Err(Error::EmptyGraph)
        ));
    }
}
