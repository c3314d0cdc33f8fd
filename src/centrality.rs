//! A module for ranking nodes by centrality.

use std::{collections::BTreeMap, fmt, str::FromStr};

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::{
    betweenness::compute_betweenness,
    closeness::compute_closeness,
    config::AnalysisConfig,
    error::{Error, Result},
    graph::{Graph, NodeKey},
};

/// The supported centrality measures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CentralityKind {
    Degree,
    Closeness,
    Betweenness,
    Eigenvector,
}

impl CentralityKind {
    pub const ALL: [Self; 4] = [
        Self::Degree,
        Self::Closeness,
        Self::Betweenness,
        Self::Eigenvector,
    ];
}

impl fmt::Display for CentralityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Degree => "degree",
            Self::Closeness => "closeness",
            Self::Betweenness => "betweenness",
            Self::Eigenvector => "eigenvector",
        };

        f.write_str(name)
    }
}

impl FromStr for CentralityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown centrality {s:?}"))
    }
}

/// Sorts scores in descending order and keeps the first `top_k`.
///
/// The sort is stable, tied nodes keep their key order.
///
/// # Examples
///
/// ```
/// use dropnet::centrality::rank;
/// use dropnet::graph::NodeKey;
///
/// let scores = [
///     (NodeKey::item("Jellopy"), 0.5),
///     (NodeKey::item("Sticky Mucus"), 0.5),
///     (NodeKey::monster("Poring"), 1.0),
/// ];
///
/// assert_eq!(
///     rank(scores, 2),
///     vec![(NodeKey::monster("Poring"), 1.0), (NodeKey::item("Jellopy"), 0.5)]
/// );
/// ```
pub fn rank(scores: impl IntoIterator<Item = (NodeKey, f64)>, top_k: usize) -> Vec<(NodeKey, f64)> {
    let mut ranked: Vec<(NodeKey, f64)> = scores.into_iter().collect();
    ranked.sort_by(|(_, a), (_, b)| b.total_cmp(a));
    ranked.truncate(top_k);

    ranked
}

impl Graph {
    /// Returns the `top_k` most central nodes by the given measure, using the default analysis
    /// settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropnet::centrality::CentralityKind;
    /// use dropnet::graph::{Graph, NodeKey};
    ///
    /// let mut graph = Graph::new();
    /// graph.insert_drop("Poring", "Jellopy");
    /// graph.insert_drop("Poring", "Sticky Mucus");
    ///
    /// let top = graph.centrality(CentralityKind::Degree, 1).unwrap();
    /// assert_eq!(top, vec![(NodeKey::monster("Poring"), 1.0)]);
    /// ```
    pub fn centrality(&self, kind: CentralityKind, top_k: usize) -> Result<Vec<(NodeKey, f64)>> {
        self.centrality_with(kind, top_k, &AnalysisConfig::default())
    }

    /// Returns the `top_k` most central nodes by the given measure.
    ///
    /// Fails with [`Error::EmptyGraph`] on a graph without nodes and, for eigenvector centrality,
    /// with [`Error::ConvergenceFailure`] when the power iteration doesn't settle.
    pub fn centrality_with(
        &self,
        kind: CentralityKind,
        top_k: usize,
        config: &AnalysisConfig,
    ) -> Result<Vec<(NodeKey, f64)>> {
        if self.is_empty() {
            return Err(Error::EmptyGraph);
        }

        let scores = match kind {
            CentralityKind::Degree => self.degree_centrality(),
            CentralityKind::Closeness => self.closeness_centrality(config.threads),
            CentralityKind::Betweenness => self.betweenness_centrality(config.threads),
            CentralityKind::Eigenvector => self.eigenvector_centrality(
                config.eigenvector_max_iterations,
                config.eigenvector_tolerance,
            )?,
        };

        Ok(rank(scores, top_k))
    }

    /// Returns a mapping of nodes to their total degree divided by `n - 1`.
    ///
    /// Every node of a graph with at most one node scores 1.
    pub fn degree_centrality(&self) -> BTreeMap<NodeKey, f64> {
        let n = self.node_count();
        let scale = if n > 1 { 1.0 / (n - 1) as f64 } else { 1.0 };

        self.degrees_by_node()
            .into_iter()
            .map(|(key, degree)| {
                let score = if n > 1 { degree as f64 * scale } else { 1.0 };
                (key, score)
            })
            .collect()
    }

    /// Returns a mapping of nodes to their closeness, measured over incoming paths.
    pub fn closeness_centrality(&self, num_threads: usize) -> BTreeMap<NodeKey, f64> {
        let closeness = compute_closeness(self.in_indices(), num_threads);
        self.zip_keys(closeness)
    }

    /// Returns a mapping of nodes to their normalized betweenness over directed shortest paths.
    pub fn betweenness_centrality(&self, num_threads: usize) -> BTreeMap<NodeKey, f64> {
        let betweenness = compute_betweenness(self.out_indices(), num_threads, true);
        self.zip_keys(betweenness)
    }

    /// Returns a mapping of nodes to their eigenvector centrality.
    ///
    /// A node scores by the scores of the nodes pointing to it. This runs a power iteration on
    /// `Aᵀ + I`, normalising by the euclidean norm, until the summed absolute change drops below
    /// `n * tolerance`. Graphs without enough cyclic structure (drop graphs are acyclic) may not
    /// settle, which is reported as [`Error::ConvergenceFailure`].
    pub fn eigenvector_centrality(
        &self,
        max_iterations: usize,
        tolerance: f64,
    ) -> Result<BTreeMap<NodeKey, f64>> {
        let n = self.node_count();
        if n == 0 {
            return Err(Error::EmptyGraph);
        }

        let matrix = self.adjacency_matrix().transpose() + DMatrix::<f64>::identity(n, n);
        let mut x = DVector::<f64>::from_element(n, 1.0 / n as f64);

        for iteration in 1..=max_iterations {
            let previous = x;
            x = &matrix * &previous;

            // The identity shift keeps the norm positive for a positive start vector.
            let norm = x.norm();
            if norm > 0.0 {
                x.unscale_mut(norm);
            }

            let change: f64 = (&x - &previous).abs().sum();
            if change < n as f64 * tolerance {
                debug!(iteration, "eigenvector centrality converged");
                return Ok(self.zip_keys(x.iter().copied()));
            }
        }

        Err(Error::ConvergenceFailure {
            iterations: max_iterations,
        })
    }

    fn zip_keys(&self, scores: impl IntoIterator<Item = f64>) -> BTreeMap<NodeKey, f64> {
        self.keys().into_iter().cloned().zip(scores).collect()
    }
}
