//! Dropnet is a small toolkit for building and analysing the network of monsters and the items
//! they drop.
//!
//! # Basic usage
//!
//! Monster records are resolved by a [`Fetcher`](fetch::Fetcher), which consults a
//! [`Store`](cache::Store) before asking an upstream [`Source`](fetch::Source). A
//! [`build`](builder::build) walks a range of monster IDs, keeps the monsters matching its
//! [`FilterCriteria`](builder::FilterCriteria) and assembles a directed [`Graph`](graph::Graph)
//! with an edge from each monster to every item it drops. Once built, the graph can be measured,
//! partitioned into communities and compared against random models.
//!
//! ```rust
//! use dropnet::centrality::CentralityKind;
//! use dropnet::community::{detect_communities, DEFAULT_SEED};
//! use dropnet::edge::Edge;
//! use dropnet::graph::{Graph, NodeKey};
//!
//! // Construct the graph instance.
//! let mut graph = Graph::new();
//!
//! // Monsters and items live in separate key spaces, so these are two distinct nodes.
//! graph.insert_monster("Poring", "prt_fild08");
//! graph.insert(Edge::drop("Poring", "Jellopy"));
//! graph.insert(Edge::drop("Poring", "Sticky Mucus"));
//! graph.insert(Edge::drop("Wolf", "Wolf Claw"));
//! graph.insert(Edge::drop("Wolf", "Poring"));
//!
//! assert_eq!(graph.node_count(), 6);
//! assert_eq!(graph.density(), 4.0 / 30.0);
//!
//! // Rank nodes by centrality...
//! let top = graph.centrality(CentralityKind::Degree, 2).unwrap();
//! assert_eq!(top[0].0, NodeKey::monster("Poring"));
//!
//! // ...and split them into communities.
//! let communities = detect_communities(&graph, DEFAULT_SEED).unwrap();
//! assert_eq!(communities.sizes().iter().sum::<usize>(), 6);
//! ```

mod betweenness;
pub mod builder;
pub mod cache;
pub mod centrality;
mod closeness;
pub mod community;
pub mod config;
pub mod edge;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod metrics;
pub mod models;
pub mod record;
pub mod undirected;

pub use error::{Error, Result};
