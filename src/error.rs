use thiserror::Error;

/// Errors surfaced to callers of the topology API.
///
/// Per-node unreachability is never reported here; a node that cannot be
/// probed is simply absent from the snapshot.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Invalid candidate: {0}")]
    InvalidCandidate(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Candidate source error: {0}")]
    Source(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TopologyError>;

impl TopologyError {
    pub fn invalid_candidate(msg: impl Into<String>) -> Self {
        TopologyError::InvalidCandidate(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        TopologyError::Config(msg.into())
    }

    pub fn candidate_source(msg: impl Into<String>) -> Self {
        TopologyError::Source(msg.into())
    }
}

/// Failure of a single probe. Stays inside the refresh engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Connection closed by peer")]
    Closed,
}

impl From<std::io::Error> for ProbeError {
    fn from(e: std::io::Error) -> Self {
        ProbeError::Io(e.to_string())
    }
}
