use serde::{Deserialize, Serialize};

use super::CrossReferences;

/// Identifier classes a normalized phenotype can be keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhenotypeIdentifierType {
    HpoId,
    HpoTerm,
    OmimId,
    OrphaId,
    MondoId,
    Other,
}

/// Normalized phenotype identifier with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPhenotype {
    pub primary_id: String,
    pub id_type: PhenotypeIdentifierType,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub cross_references: CrossReferences,
    pub source: String,
    pub confidence_score: f64,
}

impl NormalizedPhenotype {
    pub fn display_name(&self) -> Option<&str> {
        Some(self.name.as_str())
    }

    pub fn is_hpo(&self) -> bool {
        self.id_type == PhenotypeIdentifierType::HpoId
    }
}
