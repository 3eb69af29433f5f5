//! HPO ontology parser for phenotype term records.
//!
//! Consumes line records produced by the HPO source client (one record per
//! `[Term]` stanza) and builds structured terms with lightweight hierarchy
//! scaffolding.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{RawRecord, log_unknown_keys, raw_str, raw_string_list};

/// Broad HPO term categories inferred from term names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HpoTermType {
    PhenotypicAbnormality,
    ClinicalCourse,
    ClinicalModifier,
    Frequency,
    ModeOfInheritance,
    Onset,
    Other,
}

impl HpoTermType {
    /// Infer the term type from name keywords.
    pub fn infer(name: &str) -> Self {
        let name_lower = name.to_ascii_lowercase();
        if name_lower.contains("abnormality") {
            Self::PhenotypicAbnormality
        } else if name_lower.contains("course") {
            Self::ClinicalCourse
        } else if name_lower.contains("modifier") {
            Self::ClinicalModifier
        } else if name_lower.contains("frequency") {
            Self::Frequency
        } else if name_lower.contains("inherit") {
            Self::ModeOfInheritance
        } else if name_lower.contains("onset") {
            Self::Onset
        } else {
            Self::Other
        }
    }
}

/// Directed relationship between two HPO terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HpoRelationship {
    pub term_id: String,
    pub relationship_type: String,
}

/// Structured representation of an HPO ontology term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HpoTerm {
    pub hpo_id: String,
    pub name: String,
    pub definition: Option<String>,
    pub synonyms: Vec<String>,
    pub term_type: HpoTermType,
    pub parents: Vec<HpoRelationship>,
    pub children: Vec<HpoRelationship>,
    pub comment: Option<String>,
    pub xrefs: Vec<String>,
    pub is_obsolete: bool,
    pub replaced_by: Option<String>,
}

/// Parser for HPO term records, with a cache keyed by HPO id.
#[derive(Debug, Default)]
pub struct HpoParser {
    term_cache: HashMap<String, HpoTerm>,
}

impl HpoParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one raw term record. Returns `None` when the id or name is
    /// missing.
    pub fn parse_raw(&self, raw: &RawRecord) -> Option<HpoTerm> {
        log_unknown_keys(
            "hpo",
            raw,
            &[
                "hpo_id",
                "name",
                "definition",
                "synonyms",
                "comment",
                "xrefs",
                "is_a",
                "is_obsolete",
                "replaced_by",
                "source",
            ],
        );
        let hpo_id = raw_str(raw, "hpo_id")?;
        let name = raw_str(raw, "name")?;

        let parents = raw_string_list(raw, "is_a")
            .into_iter()
            .map(|term_id| HpoRelationship {
                term_id,
                relationship_type: "is_a".to_string(),
            })
            .collect();

        Some(HpoTerm {
            hpo_id: hpo_id.to_string(),
            name: name.to_string(),
            definition: raw_str(raw, "definition").map(str::to_string),
            synonyms: raw_string_list(raw, "synonyms"),
            term_type: HpoTermType::infer(name),
            parents,
            children: Vec::new(),
            comment: raw_str(raw, "comment").map(str::to_string),
            xrefs: raw_string_list(raw, "xrefs"),
            is_obsolete: raw
                .get("is_obsolete")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            replaced_by: raw_str(raw, "replaced_by").map(str::to_string),
        })
    }

    /// Parse a batch of raw term records, caching every parsed term.
    pub fn parse_batch(&mut self, raw_records: &[RawRecord]) -> Vec<HpoTerm> {
        let mut parsed = Vec::new();
        for raw in raw_records {
            if let Some(term) = self.parse_raw(raw) {
                self.term_cache.insert(term.hpo_id.clone(), term.clone());
                parsed.push(term);
            }
        }
        parsed
    }

    /// Resolve declared `is_a` parents into reciprocal child links across a
    /// term set. Returns the terms keyed by id with relationships populated.
    pub fn build_hierarchy(&mut self, terms: Vec<HpoTerm>) -> HashMap<String, HpoTerm> {
        let mut term_map: HashMap<String, HpoTerm> = terms
            .into_iter()
            .map(|term| (term.hpo_id.clone(), term))
            .collect();

        let edges: Vec<(String, String)> = term_map
            .values()
            .flat_map(|term| {
                term.parents
                    .iter()
                    .map(|parent| (parent.term_id.clone(), term.hpo_id.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();

        for (parent_id, child_id) in edges {
            if let Some(parent) = term_map.get_mut(&parent_id) {
                if !parent.children.iter().any(|c| c.term_id == child_id) {
                    parent.children.push(HpoRelationship {
                        term_id: child_id,
                        relationship_type: "has_child".to_string(),
                    });
                }
            }
        }

        for term in term_map.values() {
            self.term_cache.insert(term.hpo_id.clone(), term.clone());
        }
        term_map
    }

    /// Structural validation issues for a parsed term.
    pub fn validate(&self, term: &HpoTerm) -> Vec<String> {
        let mut errors = Vec::new();
        if term.hpo_id.is_empty() {
            errors.push("Missing HPO ID".to_string());
        }
        if term.name.is_empty() {
            errors.push("Missing term name".to_string());
        }
        if !term.hpo_id.starts_with("HP:") {
            errors.push("Invalid HPO ID format (should start with HP:)".to_string());
        }
        if term.is_obsolete {
            errors.push("Term is marked as obsolete".to_string());
        }
        errors
    }

    /// Cached term lookup by id.
    pub fn term_by_id(&self, term_id: &str) -> Option<&HpoTerm> {
        self.term_cache.get(term_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> RawRecord {
        value.as_object().expect("object literal").clone()
    }

    #[test]
    fn parses_full_term_record() {
        let parser = HpoParser::new();
        let term = parser
            .parse_raw(&record(json!({
                "hpo_id": "HP:0001249",
                "name": "Intellectual disability",
                "definition": "Subnormal intellectual functioning.",
                "synonyms": ["Mental retardation"],
                "xrefs": ["MSH:D008607"],
                "is_a": ["HP:0012759"],
            })))
            .expect("parsed term");

        assert_eq!(term.hpo_id, "HP:0001249");
        assert_eq!(term.synonyms, vec!["Mental retardation".to_string()]);
        assert_eq!(term.xrefs, vec!["MSH:D008607".to_string()]);
        assert_eq!(term.parents.len(), 1);
        assert_eq!(term.parents[0].relationship_type, "is_a");
        assert!(!term.is_obsolete);
    }

    #[test]
    fn term_type_inferred_from_name() {
        assert_eq!(
            HpoTermType::infer("Abnormality of the nervous system"),
            HpoTermType::PhenotypicAbnormality
        );
        assert_eq!(
            HpoTermType::infer("Autosomal dominant inheritance"),
            HpoTermType::ModeOfInheritance
        );
        assert_eq!(HpoTermType::infer("Adult onset"), HpoTermType::Onset);
        assert_eq!(HpoTermType::infer("Seizure"), HpoTermType::Other);
    }

    #[test]
    fn missing_name_is_skipped() {
        let parser = HpoParser::new();
        assert!(parser.parse_raw(&record(json!({"hpo_id": "HP:1"}))).is_none());
    }

    #[test]
    fn build_hierarchy_links_children_back() {
        let mut parser = HpoParser::new();
        let terms = parser.parse_batch(&[
            record(json!({"hpo_id": "HP:0000118", "name": "Phenotypic abnormality"})),
            record(json!({
                "hpo_id": "HP:0001249",
                "name": "Intellectual disability",
                "is_a": ["HP:0000118"],
            })),
        ]);

        let hierarchy = parser.build_hierarchy(terms);
        let root = &hierarchy["HP:0000118"];
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].term_id, "HP:0001249");
        assert_eq!(root.children[0].relationship_type, "has_child");
    }

    #[test]
    fn validate_flags_obsolete_and_malformed_ids() {
        let parser = HpoParser::new();
        let term = parser
            .parse_raw(&record(json!({
                "hpo_id": "XYZ:1",
                "name": "Bad term",
                "is_obsolete": true,
            })))
            .expect("parsed term");

        let errors = parser.validate(&term);
        assert!(errors.iter().any(|e| e.contains("Invalid HPO ID format")));
        assert!(errors.iter().any(|e| e.contains("obsolete")));
    }

    #[test]
    fn parse_batch_populates_cache() {
        let mut parser = HpoParser::new();
        parser.parse_batch(&[record(
            json!({"hpo_id": "HP:0000729", "name": "Autistic behavior"}),
        )]);
        assert!(parser.term_by_id("HP:0000729").is_some());
        assert!(parser.term_by_id("HP:9999999").is_none());
    }
}
