//! A module for working with drop edges.

use std::fmt;

use crate::graph::NodeKey;

/// The relation carried by every edge.
pub const DROPS: &str = "drops";

/// A directed `source -> target` edge, meaning the source monster drops the target item.
///
/// Unlike an undirected pair, `Edge::new(a, b)` and `Edge::new(b, a)` are different edges.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    source: NodeKey,
    target: NodeKey,
}

impl Edge {
    /// Creates a new edge from two nodes.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropnet::edge::Edge;
    /// use dropnet::graph::NodeKey;
    ///
    /// let edge = Edge::new(NodeKey::monster("Poring"), NodeKey::item("Jellopy"));
    /// assert_ne!(edge, Edge::new(NodeKey::item("Jellopy"), NodeKey::monster("Poring")));
    /// ```
    pub fn new(source: NodeKey, target: NodeKey) -> Self {
        Self { source, target }
    }

    /// Creates the edge for a monster dropping an item.
    pub fn drop(monster: &str, item: &str) -> Self {
        Self::new(NodeKey::monster(monster), NodeKey::item(item))
    }

    /// Returns the node the edge starts from.
    pub fn source(&self) -> &NodeKey {
        &self.source
    }

    /// Returns the node the edge points to.
    pub fn target(&self) -> &NodeKey {
        &self.target
    }

    /// Returns the relation label of the edge.
    pub fn relation(&self) -> &'static str {
        DROPS
    }

    /// Returns whether the edge contains the given node, at either end.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropnet::edge::Edge;
    /// use dropnet::graph::NodeKey;
    ///
    /// let edge = Edge::drop("Poring", "Jellopy");
    ///
    /// assert!(edge.contains(&NodeKey::monster("Poring")));
    /// assert!(edge.contains(&NodeKey::item("Jellopy")));
    /// assert!(!edge.contains(&NodeKey::item("Poring")));
    /// ```
    pub fn contains(&self, node: &NodeKey) -> bool {
        self.source() == node || self.target() == node
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -{}-> {}", self.source, DROPS, self.target)
    }
}
