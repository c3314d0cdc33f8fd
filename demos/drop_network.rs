use std::env;

use dropnet::{
    builder::{build, FilterCriteria, IdRange},
    cache::JsonFileStore,
    centrality::CentralityKind,
    community::detect_communities,
    config::Config,
    fetch::Fetcher,
    metrics::StructuralMetrics,
    models::compare_against_models,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TOP_K: usize = 5;

// Usage: drop_network [config.toml] [start id] [end id]
fn main() -> dropnet::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dropnet=info,drop_network=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let config = match args.first() {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    let start = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(1002);
    let end = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(start + 30);

    let store = JsonFileStore::open(config.cache.path.clone())?;
    let fetcher = Fetcher::from_config(&config.api, store)?;
    let criteria = FilterCriteria::new(IdRange::new(start, end)?).levels(1, 99)?;

    info!(start, end, cached = fetcher.cached(), "crawling monsters");
    let result = build(&fetcher, &criteria, |progress| {
        info!(
            processed = progress.processed,
            total = progress.total,
            "{:.0}%",
            progress.fraction() * 100.0
        )
    });
    let graph = &result.graph;

    if !result.not_found.is_empty() {
        warn!(ids = ?result.not_found, "some monsters weren't found");
    }
    for (map, monsters) in &result.map_counts {
        info!(map = %map, monsters, "spawns");
    }

    let metrics = match StructuralMetrics::compute(graph, &config.analysis) {
        Ok(metrics) => metrics,
        Err(e) => {
            warn!(error = %e, "nothing to analyse");
            return Ok(());
        }
    };
    info!(
        nodes = metrics.node_count,
        edges = metrics.edge_count,
        density = format_args!("{:.4}", metrics.density),
        assortativity = format_args!("{:.4}", metrics.degree_assortativity),
        clustering = format_args!("{:.4}", metrics.average_clustering),
        strong = metrics.strongly_connected_components,
        weak = metrics.weakly_connected_components,
        "structure"
    );
    for bucket in &metrics.degree_histogram {
        info!(
            "degree {:>6.2} .. {:>6.2}: {}",
            bucket.lower, bucket.upper, bucket.count
        );
    }

    for kind in CentralityKind::ALL {
        match graph.centrality_with(kind, TOP_K, &config.analysis) {
            Ok(top) => {
                for (rank, (node, score)) in top.iter().enumerate() {
                    info!(%kind, rank = rank + 1, %node, "{score:.4}");
                }
            }
            Err(e) => warn!(%kind, error = %e, "centrality unavailable"),
        }
    }

    let periphery = graph.diameter_and_periphery()?;
    info!(
        diameter = periphery.diameter,
        component_size = periphery.component_size,
        connected = periphery.connected,
        periphery = ?periphery.periphery,
        "periphery"
    );

    let communities = detect_communities(graph, config.analysis.seed)?;
    info!(
        communities = communities.len(),
        modularity = format_args!("{:.4}", communities.modularity()),
        sizes = ?communities.sizes(),
        "communities"
    );

    for (model, summary) in compare_against_models(graph, &config.analysis)? {
        info!(%model, "{summary}");
    }

    Ok(())
}
