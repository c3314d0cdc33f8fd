//! A module for summarising the structure of a graph.

use std::collections::BTreeSet;

use crate::{
    config::AnalysisConfig,
    error::{Error, Result},
    graph::{Graph, NodeKey},
};

/// The diameter and periphery of a graph's undirected projection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Periphery {
    pub diameter: usize,
    /// The nodes whose eccentricity equals the diameter.
    pub periphery: BTreeSet<NodeKey>,
    /// The number of nodes the computation ran on.
    pub component_size: usize,
    /// Whether that was the whole graph, rather than its largest component.
    pub connected: bool,
}

/// One bin of a histogram, covering `[lower, upper)` (the last bin is closed).
#[derive(Clone, Debug, PartialEq)]
pub struct Bucket {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Bins values into `buckets` equal-width bins spanning their minimum to their maximum.
///
/// When every value is the same the bins span `value - 0.5` to `value + 0.5`.
///
/// # Examples
///
/// ```
/// use dropnet::metrics::histogram;
///
/// let buckets = histogram(&[1, 1, 2, 3, 5], 4);
/// let counts: Vec<usize> = buckets.iter().map(|b| b.count).collect();
///
/// assert_eq!(counts, vec![2, 1, 1, 1]);
/// assert_eq!(buckets[0].lower, 1.0);
/// assert_eq!(buckets[3].upper, 5.0);
/// ```
pub fn histogram(values: &[usize], buckets: usize) -> Vec<Bucket> {
    let (Some(&min), Some(&max)) = (values.iter().min(), values.iter().max()) else {
        return Vec::new();
    };
    if buckets == 0 {
        return Vec::new();
    }

    let (lower, upper) = if min == max {
        (min as f64 - 0.5, max as f64 + 0.5)
    } else {
        (min as f64, max as f64)
    };
    let width = (upper - lower) / buckets as f64;

    let mut bins: Vec<Bucket> = (0..buckets)
        .map(|i| Bucket {
            lower: lower + width * i as f64,
            upper: if i + 1 == buckets {
                upper
            } else {
                lower + width * (i + 1) as f64
            },
            count: 0,
        })
        .collect();

    for &value in values {
        let position = ((value as f64 - lower) / width) as usize;
        bins[position.min(buckets - 1)].count += 1;
    }

    bins
}

impl Graph {
    /// Bins the degree distribution into `buckets` equal-width bins, see [`histogram`].
    pub fn degree_histogram(&self, buckets: usize) -> Vec<Bucket> {
        histogram(&self.degree_distribution(), buckets)
    }
}

/// The structural statistics of a graph, computed in one go.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuralMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    pub degree_assortativity: f64,
    pub average_clustering: f64,
    pub strongly_connected_components: usize,
    pub weakly_connected_components: usize,
    pub degree_distribution: Vec<usize>,
    pub degree_histogram: Vec<Bucket>,
}

impl StructuralMetrics {
    /// Computes the metrics, failing with [`Error::EmptyGraph`] for a graph without nodes.
    pub fn compute(graph: &Graph, config: &AnalysisConfig) -> Result<Self> {
        if graph.is_empty() {
            return Err(Error::EmptyGraph);
        }

        let degree_distribution = graph.degree_distribution();
        let degree_histogram = histogram(&degree_distribution, config.histogram_buckets);

        Ok(Self {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            density: graph.density(),
            degree_assortativity: graph.degree_assortativity(),
            average_clustering: graph.average_clustering(),
            strongly_connected_components: graph.strongly_connected_component_count(),
            weakly_connected_components: graph.weakly_connected_component_count(),
            degree_distribution,
            degree_histogram,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_edges() {
        assert!(histogram(&[], 15).is_empty());
        assert!(histogram(&[1, 2], 0).is_empty());

        let single = histogram(&[3, 3, 3], 3);
        assert_eq!(single.len(), 3);
        assert_eq!(single.iter().map(|b| b.count).sum::<usize>(), 3);
        assert_eq!(single[1].count, 3);
    }

    #[test]
    fn histogram_last_bucket_is_closed() {
        let buckets = histogram(&[0, 10], 15);

        assert_eq!(buckets.len(), 15);
        assert_eq!(buckets[0].count, 1);
        assert_eq!(buckets[14].count, 1);
        assert_eq!(buckets[14].upper, 10.0);
    }

    #[test]
    fn degree_histogram() {
        let mut graph = Graph::new();
        graph.insert_drop("Poring", "Jellopy");
        graph.insert_drop("Poring", "Sticky Mucus");

        let counts: Vec<usize> = graph.degree_histogram(2).iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 1]);
    }

    #[test]
    fn compute() {
        let mut graph = Graph::new();
        graph.insert_drop("Poring", "Jellopy");
        graph.insert_drop("Poring", "Sticky Mucus");
        graph.insert_drop("Wolf", "Wolf Claw");

        let metrics = StructuralMetrics::compute(&graph, &AnalysisConfig::default()).unwrap();

        assert_eq!(metrics.node_count, 5);
        assert_eq!(metrics.edge_count, 3);
        assert_eq!(metrics.density, 0.15);
        assert_eq!(metrics.degree_assortativity, 0.0);
        assert_eq!(metrics.average_clustering, 0.0);
        assert_eq!(metrics.strongly_connected_components, 5);
        assert_eq!(metrics.weakly_connected_components, 2);
        assert_eq!(metrics.degree_distribution, vec![2, 1, 1, 1, 1]);
        assert_eq!(metrics.degree_histogram.len(), 15);
        assert_eq!(
            metrics
                .degree_histogram
                .iter()
                .map(|b| b.count)
                .sum::<usize>(),
            5
        );
    }

    #[test]
    fn compute_empty() {
        assert!(matches!(
            StructuralMetrics::compute(&Graph::new(), &AnalysisConfig::default()),
            Err(Error::EmptyGraph)
        ));
    }
}
