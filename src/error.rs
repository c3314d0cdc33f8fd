//! Error types for building and analysing drop networks.

/// Result type alias for dropnet operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring, building or analysing a graph.
///
/// A monster ID that can't be resolved is not an error: the fetcher reports it as `None` and the
/// builder collects it into [`Build::not_found`](crate::builder::Build::not_found).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO errors, e.g. while reading or rewriting the cache file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport errors from the upstream API client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed configuration files.
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// An upstream payload that doesn't match the monster schema.
    #[error("decode error: {0}")]
    Decode(String),

    /// A range whose end lies before its start.
    #[error("invalid {what} range: {start}..={end}")]
    InvalidRange {
        what: &'static str,
        start: u32,
        end: u32,
    },

    /// An analytic was invoked on a graph without nodes.
    #[error("graph has no nodes")]
    EmptyGraph,

    /// The eigenvector power iteration didn't settle within its iteration budget.
    #[error("eigenvector centrality failed to converge after {iterations} iterations")]
    ConvergenceFailure { iterations: usize },
}

impl Error {
    /// Creates a new decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
