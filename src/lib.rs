pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod prober;
pub mod refresh;
pub mod source;
pub mod types;

// Re-export common types
pub use config::TopologyConfig;
pub use error::{ProbeError, Result, TopologyError};
pub use prober::{NodeConnection, NodeProber, ProbeMode, TcpProber};
pub use refresh::{ProbeReport, ProbeResult, RefreshReport, TopologyRefresh};
pub use source::{CandidateSource, StaticCandidates};
pub use types::{ConnectionTarget, NodeDescriptor, NodeRole, TopologySnapshot};
