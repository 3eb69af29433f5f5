use serde::{Deserialize, Serialize};

use super::CrossReferences;

/// Identifier classes a normalized publication can be keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationIdentifierType {
    PubmedId,
    Doi,
    PmcId,
    Other,
}

/// Normalized publication identifier with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPublication {
    pub primary_id: String,
    pub id_type: PublicationIdentifierType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubmed_id: Option<String>,
    #[serde(default)]
    pub cross_references: CrossReferences,
    pub source: String,
    pub confidence_score: f64,
}

impl NormalizedPublication {
    pub fn display_name(&self) -> Option<&str> {
        self.title.as_deref()
    }
}
