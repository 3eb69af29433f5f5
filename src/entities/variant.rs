use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::CrossReferences;

/// Identifier classes a normalized variant can be keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantIdentifierType {
    HgvsC,
    HgvsP,
    HgvsG,
    ClinvarVcv,
    DbsnpRs,
    CosmicId,
    Other,
}

/// Normalized genomic location on a reference assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomicLocation {
    pub chromosome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_allele: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_allele: Option<String>,
    pub assembly: String,
}

impl GenomicLocation {
    pub fn new(chromosome: impl Into<String>, position: Option<i64>) -> Self {
        Self {
            chromosome: chromosome.into(),
            position,
            reference_allele: None,
            alternate_allele: None,
            assembly: "GRCh38".to_string(),
        }
    }
}

/// Normalized variant identifier with metadata.
///
/// `hgvs_notations` is keyed by the notation prefix without the trailing
/// dot (`c`, `p`, `g`, `m`, `n`, `r`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedVariant {
    pub primary_id: String,
    pub id_type: VariantIdentifierType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genomic_location: Option<GenomicLocation>,
    #[serde(default)]
    pub hgvs_notations: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_significance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gene_symbol: Option<String>,
    #[serde(default)]
    pub cross_references: CrossReferences,
    pub source: String,
    pub confidence_score: f64,
}

impl NormalizedVariant {
    pub fn display_name(&self) -> Option<&str> {
        Some(self.primary_id.as_str())
    }
}
