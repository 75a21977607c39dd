//! Node Types
//!
//! Identity and declared role of the nodes in a primary/replica deployment:
//! - Node roles
//! - Connection targets (per-node address templates)
//! - Node descriptors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::error::{Result, TopologyError};

/// Declared role of a node in the deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Primary node accepts writes
    Primary,
    /// Replica nodes serve reads
    Replica,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Primary => write!(f, "PRIMARY"),
            NodeRole::Replica => write!(f, "REPLICA"),
        }
    }
}

/// Address template used to reach a node.
///
/// A seed target carries the connection settings shared by every node of a
/// deployment; [`ConnectionTarget::for_node`] derives the per-node target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    host: String,
    port: u16,
    timeout: Duration,
    database: u32,
    client_name: Option<String>,
    tls: bool,
}

impl ConnectionTarget {
    pub const DEFAULT_PORT: u16 = 6379;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Self::DEFAULT_TIMEOUT,
            database: 0,
            client_name: None,
            tls: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_database(mut self, database: u32) -> Self {
        self.database = database;
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Derive the target of another node, keeping every setting but the address.
    pub fn for_node(&self, host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..self.clone()
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Configured command timeout; callers derive refresh deadlines from it.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn database(&self) -> u32 {
        self.database
    }

    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    pub fn tls(&self) -> bool {
        self.tls
    }

    /// `host:port` form accepted by `tokio::net::TcpStream::connect`.
    pub fn socket_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for ConnectionTarget {
    fn default() -> Self {
        Self::new("localhost", Self::DEFAULT_PORT)
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls { "rediss" } else { "redis" };
        write!(f, "{}://{}/{}", scheme, self.socket_addr(), self.database)
    }
}

/// A candidate node: immutable identity plus declared role.
///
/// Equality and hashing only consider `(host, port)`, so two descriptors of
/// the same node compare equal even when their declared roles differ.
#[derive(Debug, Clone, Serialize)]
pub struct NodeDescriptor {
    host: String,
    port: u16,
    #[serde(skip)]
    target: ConnectionTarget,
    role: NodeRole,
}

impl NodeDescriptor {
    pub fn new(host: impl Into<String>, port: u16, target: ConnectionTarget, role: NodeRole) -> Self {
        Self {
            host: host.into(),
            port,
            target,
            role,
        }
    }

    /// Build a descriptor whose target is derived from a seed template.
    pub fn from_template(template: &ConnectionTarget, host: impl Into<String>, port: u16, role: NodeRole) -> Self {
        let host = host.into();
        let target = template.for_node(host.clone(), port);
        Self::new(host, port, target, role)
    }

    pub fn primary(host: impl Into<String>, port: u16) -> Self {
        Self::from_template(&ConnectionTarget::default(), host, port, NodeRole::Primary)
    }

    pub fn replica(host: impl Into<String>, port: u16) -> Self {
        Self::from_template(&ConnectionTarget::default(), host, port, NodeRole::Replica)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    /// Natural key of the node.
    pub fn key(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    /// Check that the descriptor can be probed at all.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(TopologyError::invalid_candidate(format!(
                "{} node on port {} has an empty host",
                self.role, self.port
            )));
        }
        if self.port == 0 {
            return Err(TopologyError::invalid_candidate(format!(
                "{} node {} has port 0",
                self.role, self.host
            )));
        }
        if self.target.host() != self.host || self.target.port() != self.port {
            return Err(TopologyError::invalid_candidate(format!(
                "{} node {}:{} points at a different target {}",
                self.role, self.host, self.port, self.target
            )));
        }
        Ok(())
    }
}

impl PartialEq for NodeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for NodeDescriptor {}

impl Hash for NodeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.role, self.host, self.port)
    }
}
