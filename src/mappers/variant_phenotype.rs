//! Variant-phenotype relationship mapping driven by clinical significance.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entities::{NormalizedPhenotype, NormalizedVariant};

/// Relationship classes between a variant and a phenotype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantPhenotypeRelationship {
    Causative,
    Associated,
    Protective,
    Modifier,
    RiskFactor,
    Uncertain,
}

impl VariantPhenotypeRelationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Causative => "causative",
            Self::Associated => "associated",
            Self::Protective => "protective",
            Self::Modifier => "modifier",
            Self::RiskFactor => "risk_factor",
            Self::Uncertain => "uncertain",
        }
    }
}

/// A directed link between a variant and a phenotype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantPhenotypeLink {
    pub variant_id: String,
    pub phenotype_id: String,
    pub relationship_type: VariantPhenotypeRelationship,
    pub confidence_score: f64,
    pub evidence_sources: Vec<String>,
    pub clinical_significance: Option<String>,
    pub inheritance_pattern: Option<String>,
    pub penetrance: Option<String>,
}

/// Supplementary evidence supplied alongside a variant-phenotype pair.
#[derive(Debug, Clone, Default)]
pub struct EvidenceData {
    pub evidence_type: Option<String>,
    pub sources: Vec<String>,
}

/// Aggregate statistics over the mapped relationships.
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipStatistics {
    pub total_relationships: usize,
    pub variants_with_phenotypes: usize,
    pub phenotypes_with_variants: usize,
    pub relationship_types: HashMap<String, usize>,
    pub confidence_distribution: HashMap<String, usize>,
}

const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.8;
const MEDIUM_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Maps variant-phenotype relationships from clinical significance and
/// evidence context.
#[derive(Debug, Default)]
pub struct VariantPhenotypeMapper {
    links: Vec<VariantPhenotypeLink>,
    variant_to_phenotypes: HashMap<String, Vec<usize>>,
    phenotype_to_variants: HashMap<String, Vec<usize>>,
}

impl VariantPhenotypeMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify and record the relationship between a variant and a
    /// phenotype. Returns `None` when no relationship can be derived.
    pub fn map_relationship(
        &mut self,
        variant: &NormalizedVariant,
        phenotype: &NormalizedPhenotype,
        evidence: Option<&EvidenceData>,
    ) -> Option<VariantPhenotypeLink> {
        let relationship = determine_relationship(variant, phenotype, evidence)?;

        let link = VariantPhenotypeLink {
            variant_id: variant.primary_id.clone(),
            phenotype_id: phenotype.primary_id.clone(),
            relationship_type: relationship,
            confidence_score: calculate_confidence(variant, phenotype, evidence),
            evidence_sources: collect_evidence_sources(variant, phenotype, evidence),
            clinical_significance: variant.clinical_significance.clone(),
            inheritance_pattern: None,
            penetrance: None,
        };

        let index = self.links.len();
        self.links.push(link.clone());
        self.variant_to_phenotypes
            .entry(link.variant_id.clone())
            .or_default()
            .push(index);
        self.phenotype_to_variants
            .entry(link.phenotype_id.clone())
            .or_default()
            .push(index);
        Some(link)
    }

    /// All links recorded for a variant.
    pub fn phenotypes_for_variant(&self, variant_id: &str) -> Vec<&VariantPhenotypeLink> {
        self.variant_to_phenotypes
            .get(variant_id)
            .map(|indices| indices.iter().map(|&i| &self.links[i]).collect())
            .unwrap_or_default()
    }

    /// All links recorded for a phenotype.
    pub fn variants_for_phenotype(&self, phenotype_id: &str) -> Vec<&VariantPhenotypeLink> {
        self.phenotype_to_variants
            .get(phenotype_id)
            .map(|indices| indices.iter().map(|&i| &self.links[i]).collect())
            .unwrap_or_default()
    }

    /// Causative and associated links for a phenotype.
    pub fn pathogenic_variants_for_phenotype(
        &self,
        phenotype_id: &str,
    ) -> Vec<&VariantPhenotypeLink> {
        self.variants_for_phenotype(phenotype_id)
            .into_iter()
            .filter(|link| {
                matches!(
                    link.relationship_type,
                    VariantPhenotypeRelationship::Causative
                        | VariantPhenotypeRelationship::Associated
                )
            })
            .collect()
    }

    /// Aggregate statistics over all recorded links.
    pub fn relationship_statistics(&self) -> RelationshipStatistics {
        let mut relationship_types: HashMap<String, usize> = HashMap::new();
        let mut confidence_distribution: HashMap<String, usize> = HashMap::from([
            ("high".to_string(), 0),
            ("medium".to_string(), 0),
            ("low".to_string(), 0),
        ]);

        for link in &self.links {
            *relationship_types
                .entry(link.relationship_type.as_str().to_string())
                .or_insert(0) += 1;

            let bucket = if link.confidence_score >= HIGH_CONFIDENCE_THRESHOLD {
                "high"
            } else if link.confidence_score >= MEDIUM_CONFIDENCE_THRESHOLD {
                "medium"
            } else {
                "low"
            };
            *confidence_distribution
                .get_mut(bucket)
                .expect("bucket present") += 1;
        }

        RelationshipStatistics {
            total_relationships: self.links.len(),
            variants_with_phenotypes: self.variant_to_phenotypes.len(),
            phenotypes_with_variants: self.phenotype_to_variants.len(),
            relationship_types,
            confidence_distribution,
        }
    }

    /// Structural validation issues for a link.
    pub fn validate_mapping(&self, link: &VariantPhenotypeLink) -> Vec<String> {
        let mut errors = Vec::new();
        if link.variant_id.is_empty() {
            errors.push("Missing variant ID".to_string());
        }
        if link.phenotype_id.is_empty() {
            errors.push("Missing phenotype ID".to_string());
        }
        if !(0.0..=1.0).contains(&link.confidence_score) {
            errors.push("Invalid confidence score".to_string());
        }
        if link.evidence_sources.is_empty() {
            errors.push("No evidence sources provided".to_string());
        }
        errors
    }

    /// Serialize the recorded links grouped by variant id.
    pub fn export_mappings(&self) -> serde_json::Value {
        let mut grouped = serde_json::Map::new();
        for (variant_id, indices) in &self.variant_to_phenotypes {
            let links: Vec<serde_json::Value> = indices
                .iter()
                .filter_map(|&i| serde_json::to_value(&self.links[i]).ok())
                .collect();
            grouped.insert(variant_id.clone(), serde_json::Value::Array(links));
        }
        serde_json::Value::Object(grouped)
    }
}

fn determine_relationship(
    variant: &NormalizedVariant,
    phenotype: &NormalizedPhenotype,
    evidence: Option<&EvidenceData>,
) -> Option<VariantPhenotypeRelationship> {
    if let Some(significance) = variant.clinical_significance.as_deref() {
        let sig_lower = significance.to_ascii_lowercase();
        if sig_lower.contains("pathogenic") {
            return Some(VariantPhenotypeRelationship::Causative);
        }
        if sig_lower.contains("benign") {
            return Some(VariantPhenotypeRelationship::Protective);
        }
        if sig_lower.contains("uncertain") {
            return Some(VariantPhenotypeRelationship::Uncertain);
        }
        if sig_lower.contains("risk") {
            return Some(VariantPhenotypeRelationship::RiskFactor);
        }
    }

    if let Some(evidence_type) = evidence.and_then(|e| e.evidence_type.as_deref()) {
        let type_lower = evidence_type.to_ascii_lowercase();
        if type_lower.contains("causative") || type_lower.contains("pathogenic") {
            return Some(VariantPhenotypeRelationship::Causative);
        }
        if type_lower.contains("association") {
            return Some(VariantPhenotypeRelationship::Associated);
        }
        if type_lower.contains("protective") {
            return Some(VariantPhenotypeRelationship::Protective);
        }
        if type_lower.contains("modifier") {
            return Some(VariantPhenotypeRelationship::Modifier);
        }
    }

    // Co-occurrence within ClinVar still counts as an association.
    if variant.source == "clinvar" && phenotype.source == "clinvar" {
        return Some(VariantPhenotypeRelationship::Associated);
    }

    None
}

fn calculate_confidence(
    variant: &NormalizedVariant,
    phenotype: &NormalizedPhenotype,
    evidence: Option<&EvidenceData>,
) -> f64 {
    let mut confidence = 0.3_f64;

    if variant.source == "clinvar" && phenotype.source == "clinvar" {
        confidence += 0.4;
    }

    if let Some(significance) = variant.clinical_significance.as_deref() {
        let sig_lower = significance.to_ascii_lowercase();
        if sig_lower.contains("likely pathogenic") {
            confidence += 0.1;
        } else if sig_lower.contains("pathogenic") {
            confidence += 0.2;
        }
    }

    if evidence.is_some() {
        confidence += 0.1;
    }

    if phenotype.is_hpo() {
        confidence += 0.1;
    }

    confidence.min(1.0)
}

fn collect_evidence_sources(
    variant: &NormalizedVariant,
    phenotype: &NormalizedPhenotype,
    evidence: Option<&EvidenceData>,
) -> Vec<String> {
    let mut sources = vec![variant.source.clone()];
    if !sources.contains(&phenotype.source) {
        sources.push(phenotype.source.clone());
    }
    if let Some(evidence) = evidence {
        for source in &evidence.sources {
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }
    }
    sources
}
