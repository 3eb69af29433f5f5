use serde::{Deserialize, Serialize};

use super::CrossReferences;

/// Identifier classes a normalized gene can be keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneIdentifierType {
    HgncId,
    HgncSymbol,
    EnsemblId,
    NcbiGeneId,
    UniprotId,
    EntrezId,
    Symbol,
    Alias,
    Other,
}

/// Normalized gene identifier with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedGene {
    pub primary_id: String,
    pub id_type: GeneIdentifierType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub cross_references: CrossReferences,
    pub source: String,
    pub confidence_score: f64,
}

impl NormalizedGene {
    /// Name used in export listings: full name when present, else symbol.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.symbol.as_deref())
    }
}
