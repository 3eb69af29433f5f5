//! Directed cross-reference graph over entity identifiers.
//!
//! Networks are 1-hop: a node records only the identifiers it directly
//! references. Deeper traversal is intentionally out of scope.

use std::collections::HashMap;

/// A node in the cross-reference graph.
#[derive(Debug, Clone, Default)]
struct CrossReferenceNode {
    references: Vec<String>,
}

/// Records directed identifier references and builds per-entity networks.
#[derive(Debug, Default)]
pub struct CrossReferenceMapper {
    nodes: HashMap<String, CrossReferenceNode>,
}

impl CrossReferenceMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a directed edge, de-duplicating repeats.
    pub fn add_reference(&mut self, source_id: &str, reference_id: &str) {
        let node = self.nodes.entry(source_id.to_string()).or_default();
        if !node.references.iter().any(|r| r == reference_id) {
            node.references.push(reference_id.to_string());
        }
    }

    /// The identifiers directly referenced by `root_id`. Unknown roots
    /// yield an empty network.
    pub fn build_network(&self, root_id: &str) -> HashMap<String, Vec<String>> {
        let references = self
            .nodes
            .get(root_id)
            .map(|node| node.references.clone())
            .unwrap_or_default();
        HashMap::from([(root_id.to_string(), references)])
    }

    /// Whether any edges were recorded for `root_id`.
    pub fn has_references(&self, root_id: &str) -> bool {
        self.nodes
            .get(root_id)
            .is_some_and(|node| !node.references.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_are_deduplicated_and_ordered() {
        let mut mapper = CrossReferenceMapper::new();
        mapper.add_reference("MED13", "4282399");
        mapper.add_reference("MED13", "4282399");
        mapper.add_reference("MED13", "702748");

        let network = mapper.build_network("MED13");
        assert_eq!(
            network["MED13"],
            vec!["4282399".to_string(), "702748".to_string()]
        );
    }

    #[test]
    fn unknown_root_builds_empty_network() {
        let mapper = CrossReferenceMapper::new();
        let network = mapper.build_network("TP53");
        assert_eq!(network["TP53"], Vec::<String>::new());
        assert!(!mapper.has_references("TP53"));
    }

    #[test]
    fn networks_are_one_hop_only() {
        let mut mapper = CrossReferenceMapper::new();
        mapper.add_reference("A", "B");
        mapper.add_reference("B", "C");

        let network = mapper.build_network("A");
        assert_eq!(network["A"], vec!["B".to_string()]);
        assert!(!network.contains_key("B"));
    }
}
