use chrono::{DateTime, Utc};
use serde::Serialize;

use super::node::{NodeDescriptor, NodeRole};

/// Confirmed-live nodes of one refresh, in candidate order.
#[derive(Debug, Clone, Serialize)]
pub struct TopologySnapshot {
    nodes: Vec<NodeDescriptor>,
    captured_at: DateTime<Utc>,
}

impl TopologySnapshot {
    pub(crate) fn new(nodes: Vec<NodeDescriptor>) -> Self {
        Self {
            nodes,
            captured_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeDescriptor> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: &NodeDescriptor) -> bool {
        self.nodes.contains(node)
    }

    /// First reachable node declared as primary.
    pub fn primary(&self) -> Option<&NodeDescriptor> {
        self.nodes.iter().find(|n| n.role() == NodeRole::Primary)
    }

    pub fn replicas(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.iter().filter(|n| n.role() == NodeRole::Replica)
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn into_nodes(self) -> Vec<NodeDescriptor> {
        self.nodes
    }
}

/// Two snapshots are equal when they list the same nodes with the same roles
/// in the same order; capture time is ignored.
impl PartialEq for TopologySnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.nodes.len() == other.nodes.len()
            && self
                .nodes
                .iter()
                .zip(&other.nodes)
                .all(|(a, b)| a == b && a.role() == b.role())
    }
}

impl<'a> IntoIterator for &'a TopologySnapshot {
    type Item = &'a NodeDescriptor;
    type IntoIter = std::slice::Iter<'a, NodeDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_views() {
        let snapshot = TopologySnapshot::new(vec![
            NodeDescriptor::replica("localhost", 2),
            NodeDescriptor::primary("localhost", 1),
            NodeDescriptor::replica("localhost", 3),
        ]);

        assert_eq!(snapshot.primary().map(|n| n.port()), Some(1));
        let replicas: Vec<_> = snapshot.replicas().map(|n| n.port()).collect();
        assert_eq!(replicas, vec![2, 3]);
    }

    #[test]
    fn test_equality_compares_roles_and_order() {
        let a = TopologySnapshot::new(vec![NodeDescriptor::primary("localhost", 1)]);
        let b = TopologySnapshot::new(vec![NodeDescriptor::replica("localhost", 1)]);
        assert_ne!(a, b);
        assert_eq!(a, TopologySnapshot::new(vec![NodeDescriptor::primary("localhost", 1)]));
        assert!(TopologySnapshot::empty().is_empty());
    }
}
