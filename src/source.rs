use tracing::debug;

use crate::error::Result;
use crate::types::{NodeDescriptor, TopologySnapshot};

/// Supplies the candidate nodes of a refresh.
///
/// Implementations are read-only: the refresh engine lists candidates once
/// per call and never goes back to the source mid-refresh.
pub trait CandidateSource {
    fn list_candidates(&self) -> Result<Vec<NodeDescriptor>>;
}

/// Fixed candidate list, typically built from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticCandidates {
    nodes: Vec<NodeDescriptor>,
}

impl StaticCandidates {
    pub fn new(nodes: Vec<NodeDescriptor>) -> Self {
        Self { nodes }
    }
}

impl FromIterator<NodeDescriptor> for StaticCandidates {
    fn from_iter<I: IntoIterator<Item = NodeDescriptor>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl CandidateSource for StaticCandidates {
    fn list_candidates(&self) -> Result<Vec<NodeDescriptor>> {
        debug!("Listing {} static candidates", self.nodes.len());
        Ok(self.nodes.clone())
    }
}

/// A previous discovery round seeds the next one.
impl CandidateSource for TopologySnapshot {
    fn list_candidates(&self) -> Result<Vec<NodeDescriptor>> {
        Ok(self.nodes().to_vec())
    }
}

impl<F> CandidateSource for F
where
    F: Fn() -> Result<Vec<NodeDescriptor>>,
{
    fn list_candidates(&self) -> Result<Vec<NodeDescriptor>> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TopologyError;

    #[test]
    fn test_static_candidates_keep_order() {
        let source: StaticCandidates = [
            NodeDescriptor::primary("localhost", 1),
            NodeDescriptor::replica("localhost", 2),
        ]
        .into_iter()
        .collect();

        let ports: Vec<_> = source
            .list_candidates()
            .unwrap()
            .iter()
            .map(|n| n.port())
            .collect();
        assert_eq!(ports, vec![1, 2]);
    }

    #[test]
    fn test_closure_source() {
        let failing = || -> Result<Vec<NodeDescriptor>> {
            Err(TopologyError::candidate_source("sentinel unavailable"))
        };
        assert!(matches!(failing.list_candidates(), Err(TopologyError::Source(_))));
    }
}
