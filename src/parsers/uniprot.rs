//! UniProt JSON parser for protein knowledge-base records.
//!
//! UniProt records arrive as JSON objects from the REST API; deserialization
//! does the structural work and the parser layers validation on top.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{RawRecord, log_unknown_keys};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniProtTextValue {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniProtNameContainer {
    pub full_name: Option<UniProtTextValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniProtProteinDescription {
    pub recommended_name: Option<UniProtNameContainer>,
    pub submission_names: Option<Vec<UniProtNameContainer>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniProtGene {
    pub gene_name: Option<UniProtTextValue>,
    #[serde(default)]
    pub synonyms: Vec<UniProtTextValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniProtOrganism {
    pub scientific_name: Option<String>,
    pub common_name: Option<String>,
    #[serde(default)]
    pub taxon_id: Option<i64>,
    #[serde(default)]
    pub lineage: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniProtSequence {
    pub length: Option<u32>,
    pub mass: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniProtComment {
    pub comment_type: Option<String>,
    #[serde(default)]
    pub texts: Vec<UniProtTextValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniProtFeature {
    #[serde(rename = "type")]
    pub feature_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniProtCitation {
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub publication_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniProtReference {
    pub citation: Option<UniProtCitation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniProtDbReference {
    #[serde(rename = "type")]
    pub reference_type: Option<String>,
    pub id: Option<String>,
}

/// Structured representation of a UniProtKB protein entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniProtEntry {
    #[serde(default)]
    pub primary_accession: String,
    #[serde(rename = "uniProtkbId")]
    pub uniprot_kb_id: Option<String>,
    pub protein_description: Option<UniProtProteinDescription>,
    #[serde(default)]
    pub genes: Vec<UniProtGene>,
    pub organism: Option<UniProtOrganism>,
    pub sequence: Option<UniProtSequence>,
    #[serde(default)]
    pub comments: Vec<UniProtComment>,
    #[serde(default)]
    pub features: Vec<UniProtFeature>,
    #[serde(default)]
    pub references: Vec<UniProtReference>,
    #[serde(default, rename = "dbReferences")]
    pub db_references: Vec<UniProtDbReference>,
}

impl UniProtEntry {
    /// Recommended protein name, falling back to submission names, then the
    /// entry id, then the accession.
    pub fn protein_name(&self) -> String {
        if let Some(desc) = self.protein_description.as_ref() {
            if let Some(value) = desc
                .recommended_name
                .as_ref()
                .and_then(|n| n.full_name.as_ref())
                .map(|v| v.value.trim())
                .filter(|v| !v.is_empty())
            {
                return value.to_string();
            }
            if let Some(value) = desc
                .submission_names
                .as_ref()
                .and_then(|names| names.first())
                .and_then(|n| n.full_name.as_ref())
                .map(|v| v.value.trim())
                .filter(|v| !v.is_empty())
            {
                return value.to_string();
            }
        }
        self.uniprot_kb_id
            .clone()
            .unwrap_or_else(|| self.primary_accession.clone())
    }

    /// First gene symbol on the entry.
    pub fn primary_gene_symbol(&self) -> Option<String> {
        self.genes
            .first()
            .and_then(|g| g.gene_name.as_ref())
            .map(|g| g.value.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// First FUNCTION comment text.
    pub fn function_summary(&self) -> Option<String> {
        self.comments
            .iter()
            .find(|c| {
                c.comment_type
                    .as_deref()
                    .map(str::trim)
                    .is_some_and(|v| v.eq_ignore_ascii_case("function"))
            })
            .and_then(|c| c.texts.first())
            .map(|v| v.value.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Database cross-references grouped by database name.
    pub fn database_reference_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for reference in &self.db_references {
            let Some(db) = reference.reference_type.as_deref().map(str::trim) else {
                continue;
            };
            let Some(id) = reference.id.as_deref().map(str::trim) else {
                continue;
            };
            if db.is_empty() || id.is_empty() {
                continue;
            }
            out.entry(db.to_string()).or_default().push(id.to_string());
        }
        out
    }
}

/// Parser for UniProt JSON entries, with a cache keyed by accession.
#[derive(Debug, Default)]
pub struct UniProtParser {
    entry_cache: BTreeMap<String, UniProtEntry>,
}

impl UniProtParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one raw JSON entry. Returns `None` when deserialization fails
    /// or the accession is missing.
    pub fn parse_raw(&mut self, raw: &RawRecord) -> Option<UniProtEntry> {
        log_unknown_keys(
            "uniprot",
            raw,
            &[
                "primaryAccession",
                "uniProtkbId",
                "proteinDescription",
                "genes",
                "organism",
                "sequence",
                "comments",
                "features",
                "references",
                "dbReferences",
                "source",
            ],
        );
        let value = serde_json::Value::Object(raw.clone());
        let entry: UniProtEntry = match serde_json::from_value(value) {
            Ok(entry) => entry,
            Err(err) => {
                debug!("failed to deserialize UniProt entry: {err}");
                return None;
            }
        };
        if entry.primary_accession.trim().is_empty() {
            return None;
        }
        self.entry_cache
            .insert(entry.primary_accession.clone(), entry.clone());
        Some(entry)
    }

    /// Parse a batch of raw entries, skipping any that fail.
    pub fn parse_batch(&mut self, raw_records: &[RawRecord]) -> Vec<UniProtEntry> {
        raw_records
            .iter()
            .filter_map(|raw| self.parse_raw(raw))
            .collect()
    }

    /// Structural validation issues for a parsed entry.
    pub fn validate(&self, entry: &UniProtEntry) -> Vec<String> {
        let mut errors = Vec::new();
        if entry.primary_accession.is_empty() {
            errors.push("Missing primary accession".to_string());
        }
        if entry.protein_name().is_empty() {
            errors.push("Missing protein name".to_string());
        }
        if entry.sequence.as_ref().and_then(|s| s.length).unwrap_or(0) == 0 {
            errors.push("Invalid sequence length".to_string());
        }
        if entry
            .organism
            .as_ref()
            .and_then(|o| o.scientific_name.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .is_none()
        {
            errors.push("Missing organism information".to_string());
        }
        errors
    }

    /// Cached entry lookup by accession.
    pub fn entry_by_accession(&self, accession: &str) -> Option<&UniProtEntry> {
        self.entry_cache.get(accession)
    }
}
