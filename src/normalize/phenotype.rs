//! Phenotype identifier normalization.
//!
//! Standardizes phenotype terms from HPO, ClinVar trait names, and generic
//! sources, with lightweight HPO hint mapping for well-known trait names.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::entities::{
    CrossReferences, NormalizedPhenotype, PhenotypeIdentifierType, merge_cross_references,
    merge_synonyms,
};
use crate::error::HarvestError;
use crate::parsers::hpo::HpoTerm;
use crate::parsers::{RawRecord, raw_str, raw_string_list};

use super::{MERGED_SOURCE, merged_confidence};

static HPO_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^HP:\d+$").expect("valid regex"));
static OMIM_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("valid regex"));
static ORPHA_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ORPHA:\d+$").expect("valid regex"));
static MONDO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^MONDO:\d+$").expect("valid regex"));

const HPO_CONFIDENCE: f64 = 0.95;
const CLINVAR_CONFIDENCE: f64 = 0.7;
const GENERIC_CONFIDENCE: f64 = 0.5;

/// Normalizes phenotype identifiers from different sources.
#[derive(Debug, Default)]
pub struct PhenotypeNormalizer {
    cache: HashMap<String, NormalizedPhenotype>,
}

impl PhenotypeNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a parsed HPO term. Terms with malformed ids are rejected.
    pub fn normalize_hpo(&mut self, term: &HpoTerm) -> Option<NormalizedPhenotype> {
        if term.hpo_id.is_empty() || term.name.is_empty() {
            return None;
        }
        if !HPO_ID.is_match(&term.hpo_id) {
            return None;
        }

        let mut cross_references = CrossReferences::new();
        cross_references.insert("HPO".to_string(), vec![term.hpo_id.clone()]);
        cross_references.insert("NAME".to_string(), vec![term.name.clone()]);

        let normalized = NormalizedPhenotype {
            primary_id: term.hpo_id.clone(),
            id_type: PhenotypeIdentifierType::HpoId,
            name: term.name.clone(),
            definition: term.definition.clone(),
            synonyms: term.synonyms.clone(),
            category: hpo_category(&term.hpo_id),
            cross_references,
            source: "hpo".to_string(),
            confidence_score: HPO_CONFIDENCE,
        };

        self.cache.insert(term.hpo_id.clone(), normalized.clone());
        Some(normalized)
    }

    /// Normalize a ClinVar trait name. The name itself is the primary id
    /// since ClinVar traits carry no standardized identifier.
    pub fn normalize_clinvar(&mut self, phenotype_name: &str) -> Option<NormalizedPhenotype> {
        let name = phenotype_name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cross_references = CrossReferences::new();
        let hpo_hints = hpo_hint_mappings(name);
        if !hpo_hints.is_empty() {
            cross_references.insert("HPO".to_string(), hpo_hints);
        }

        let normalized = NormalizedPhenotype {
            primary_id: name.to_string(),
            id_type: PhenotypeIdentifierType::Other,
            name: name.to_string(),
            definition: None,
            synonyms: Vec::new(),
            category: None,
            cross_references,
            source: "clinvar".to_string(),
            confidence_score: CLINVAR_CONFIDENCE,
        };

        self.cache.insert(name.to_string(), normalized.clone());
        Some(normalized)
    }

    /// Normalize phenotype data from a schema-loose record.
    pub fn normalize_generic(
        &mut self,
        raw: &RawRecord,
        source: &str,
    ) -> Option<NormalizedPhenotype> {
        let phenotype_id = raw_str(raw, "id").or_else(|| raw_str(raw, "phenotype_id"));
        let name = raw_str(raw, "name").or_else(|| raw_str(raw, "term"));
        let definition = raw_str(raw, "definition").or_else(|| raw_str(raw, "description"));

        if name.is_none() && phenotype_id.is_none() {
            return None;
        }

        let (primary_id, id_type) = match phenotype_id {
            Some(id) => (id.to_string(), Self::identify_type(id)),
            None => (
                name.expect("name present").to_string(),
                PhenotypeIdentifierType::Other,
            ),
        };

        let normalized = NormalizedPhenotype {
            primary_id: primary_id.clone(),
            id_type,
            name: name.unwrap_or("Unknown").to_string(),
            definition: definition.map(str::to_string),
            synonyms: raw_string_list(raw, "synonyms"),
            category: None,
            cross_references: CrossReferences::new(),
            source: source.to_string(),
            confidence_score: GENERIC_CONFIDENCE,
        };

        self.cache.insert(primary_id, normalized.clone());
        Some(normalized)
    }

    /// Classify a phenotype identifier string.
    pub fn identify_type(phenotype_id: &str) -> PhenotypeIdentifierType {
        if HPO_ID.is_match(phenotype_id) {
            PhenotypeIdentifierType::HpoId
        } else if OMIM_ID.is_match(phenotype_id) {
            PhenotypeIdentifierType::OmimId
        } else if ORPHA_ID.is_match(phenotype_id) {
            PhenotypeIdentifierType::OrphaId
        } else if MONDO_ID.is_match(phenotype_id) {
            PhenotypeIdentifierType::MondoId
        } else {
            PhenotypeIdentifierType::Other
        }
    }

    /// Trim, title-case, and expand common clinical abbreviations.
    pub fn normalize_name(name: &str) -> String {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        let titled = trimmed
            .split_whitespace()
            .map(capitalize_word)
            .collect::<Vec<_>>()
            .join(" ");

        let mut out = Vec::new();
        for word in titled.split_whitespace() {
            match word.to_ascii_uppercase().as_str() {
                "ID" => out.push("Intellectual Disability".to_string()),
                "ASD" => out.push("Autism Spectrum Disorder".to_string()),
                _ => out.push(word.to_string()),
            }
        }
        out.join(" ")
    }

    /// Merge multiple records for the same phenotype.
    pub fn merge(phenotypes: &[NormalizedPhenotype]) -> Result<NormalizedPhenotype, HarvestError> {
        let base = phenotypes
            .iter()
            .max_by(|a, b| {
                a.confidence_score
                    .partial_cmp(&b.confidence_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or_else(|| HarvestError::InvalidArgument("No phenotypes to merge".into()))?;

        if phenotypes.len() == 1 {
            return Ok(base.clone());
        }

        let mut merged = base.clone();
        for phenotype in phenotypes {
            merge_cross_references(&mut merged.cross_references, &phenotype.cross_references);
            merge_synonyms(&mut merged.synonyms, &phenotype.synonyms);
        }
        merged.source = MERGED_SOURCE.to_string();
        merged.confidence_score = merged_confidence(base.confidence_score);
        Ok(merged)
    }

    /// Validation issues for a normalized phenotype.
    pub fn validate(phenotype: &NormalizedPhenotype) -> Vec<String> {
        let mut errors = Vec::new();
        if phenotype.primary_id.is_empty() {
            errors.push("Missing primary ID".to_string());
        }
        if phenotype.name.is_empty() {
            errors.push("Missing phenotype name".to_string());
        }
        if phenotype.id_type == PhenotypeIdentifierType::HpoId
            && !HPO_ID.is_match(&phenotype.primary_id)
        {
            errors.push("Invalid HPO ID format".to_string());
        }
        if !(0.0..=1.0).contains(&phenotype.confidence_score) {
            errors.push("Confidence score out of range [0,1]".to_string());
        }
        errors
    }

    /// Cached phenotype lookup by primary id.
    pub fn phenotype_by_id(&self, phenotype_id: &str) -> Option<&NormalizedPhenotype> {
        self.cache.get(phenotype_id)
    }

    /// Name-based lookup against the cache, case-insensitive after name
    /// normalization.
    pub fn find_by_name(&self, name: &str) -> Option<&NormalizedPhenotype> {
        let normalized_name = Self::normalize_name(name);
        self.cache
            .values()
            .find(|phenotype| phenotype.name.eq_ignore_ascii_case(&normalized_name))
    }
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Root-level HPO categories for predefined ids.
fn hpo_category(hpo_id: &str) -> Option<String> {
    match hpo_id {
        "HP:0000118" => Some("Phenotypic abnormality".to_string()),
        "HP:0000005" => Some("Mode of inheritance".to_string()),
        "HP:0000001" => Some("All".to_string()),
        _ => None,
    }
}

/// Well-known trait-name to HPO id hints for ClinVar phenotypes.
fn hpo_hint_mappings(phenotype_name: &str) -> Vec<String> {
    let name_lower = phenotype_name.to_ascii_lowercase();
    if name_lower.contains("intellectual disability") {
        vec!["HP:0001249".to_string()]
    } else if name_lower.contains("autism") {
        vec!["HP:0000729".to_string()]
    } else if name_lower.contains("developmental delay") {
        vec!["HP:0001263".to_string()]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::hpo::{HpoTerm, HpoTermType};

    fn hpo_term(id: &str, name: &str) -> HpoTerm {
        HpoTerm {
            hpo_id: id.to_string(),
            name: name.to_string(),
            definition: Some("A definition.".into()),
            synonyms: vec!["Synonym".into()],
            term_type: HpoTermType::Other,
            parents: Vec::new(),
            children: Vec::new(),
            comment: None,
            xrefs: Vec::new(),
            is_obsolete: false,
            replaced_by: None,
        }
    }

    #[test]
    fn hpo_term_gets_highest_confidence() {
        let mut normalizer = PhenotypeNormalizer::new();
        let phenotype = normalizer
            .normalize_hpo(&hpo_term("HP:0001249", "Intellectual disability"))
            .expect("normalized");

        assert_eq!(phenotype.primary_id, "HP:0001249");
        assert_eq!(phenotype.id_type, PhenotypeIdentifierType::HpoId);
        assert_eq!(phenotype.confidence_score, 0.95);
        assert_eq!(phenotype.cross_references["HPO"], vec!["HP:0001249".to_string()]);
    }

    #[test]
    fn malformed_hpo_id_is_rejected() {
        let mut normalizer = PhenotypeNormalizer::new();
        assert!(normalizer.normalize_hpo(&hpo_term("HPO-1", "Bad id")).is_none());
    }

    #[test]
    fn clinvar_trait_name_becomes_primary_id() {
        let mut normalizer = PhenotypeNormalizer::new();
        let phenotype = normalizer
            .normalize_clinvar("Severe intellectual disability")
            .expect("normalized");

        assert_eq!(phenotype.primary_id, "Severe intellectual disability");
        assert_eq!(phenotype.id_type, PhenotypeIdentifierType::Other);
        assert_eq!(phenotype.confidence_score, 0.7);
        assert_eq!(
            phenotype.cross_references.get("HPO"),
            Some(&vec!["HP:0001249".to_string()])
        );
    }

    #[test]
    fn empty_clinvar_trait_is_rejected() {
        let mut normalizer = PhenotypeNormalizer::new();
        assert!(normalizer.normalize_clinvar("   ").is_none());
    }

    #[test]
    fn identify_type_recognizes_ontology_ids() {
        assert_eq!(
            PhenotypeNormalizer::identify_type("HP:0001249"),
            PhenotypeIdentifierType::HpoId
        );
        assert_eq!(
            PhenotypeNormalizer::identify_type("154700"),
            PhenotypeIdentifierType::OmimId
        );
        assert_eq!(
            PhenotypeNormalizer::identify_type("ORPHA:558"),
            PhenotypeIdentifierType::OrphaId
        );
        assert_eq!(
            PhenotypeNormalizer::identify_type("MONDO:0007739"),
            PhenotypeIdentifierType::MondoId
        );
        assert_eq!(
            PhenotypeNormalizer::identify_type("Marfan syndrome"),
            PhenotypeIdentifierType::Other
        );
    }

    #[test]
    fn normalize_name_expands_abbreviations() {
        assert_eq!(
            PhenotypeNormalizer::normalize_name("severe id"),
            "Severe Intellectual Disability"
        );
        assert_eq!(
            PhenotypeNormalizer::normalize_name("asd with seizures"),
            "Autism Spectrum Disorder With Seizures"
        );
    }

    #[test]
    fn merge_boosts_confidence_and_unions_refs() {
        let mut normalizer = PhenotypeNormalizer::new();
        let hpo = normalizer
            .normalize_hpo(&hpo_term("HP:0001249", "Intellectual disability"))
            .expect("normalized");
        let clinvar = normalizer
            .normalize_clinvar("Intellectual disability")
            .expect("normalized");

        let merged = PhenotypeNormalizer::merge(&[clinvar, hpo.clone()]).expect("merged");
        assert_eq!(merged.primary_id, hpo.primary_id);
        assert_eq!(merged.source, "merged");
        assert!((merged.confidence_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn find_by_name_normalizes_before_matching() {
        let mut normalizer = PhenotypeNormalizer::new();
        normalizer
            .normalize_clinvar("Intellectual Disability")
            .expect("normalized");
        assert!(normalizer.find_by_name("intellectual disability").is_some());
        assert!(normalizer.find_by_name("seizures").is_none());
    }

    #[test]
    fn validate_checks_hpo_format_consistency() {
        let mut phenotype = NormalizedPhenotype {
            primary_id: "HP:1".into(),
            id_type: PhenotypeIdentifierType::HpoId,
            name: "Term".into(),
            definition: None,
            synonyms: Vec::new(),
            category: None,
            cross_references: CrossReferences::new(),
            source: "hpo".into(),
            confidence_score: 0.95,
        };
        assert!(PhenotypeNormalizer::validate(&phenotype).is_empty());

        phenotype.primary_id = "BAD".into();
        assert!(
            PhenotypeNormalizer::validate(&phenotype)
                .contains(&"Invalid HPO ID format".to_string())
        );
    }
}
