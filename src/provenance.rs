use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Upstream data sources the harvester knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    ClinVar,
    PubMed,
    Hpo,
    UniProt,
    Manual,
    Computed,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClinVar => "clinvar",
            Self::PubMed => "pubmed",
            Self::Hpo => "hpo",
            Self::UniProt => "uniprot",
            Self::Manual => "manual",
            Self::Computed => "computed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "clinvar" => Some(Self::ClinVar),
            "pubmed" => Some(Self::PubMed),
            "hpo" => Some(Self::Hpo),
            "uniprot" => Some(Self::UniProt),
            "manual" => Some(Self::Manual),
            "computed" => Some(Self::Computed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable lineage record attached to every acquired record and job.
///
/// Mutating operations return a new value; the original is never touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: DataSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub acquired_at: OffsetDateTime,
    pub acquired_by: String,
    #[serde(default)]
    pub processing_steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    pub validation_status: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Provenance {
    pub fn new(source: DataSource, acquired_by: impl Into<String>) -> Self {
        Self {
            source,
            source_version: None,
            source_url: None,
            acquired_at: OffsetDateTime::now_utc(),
            acquired_by: acquired_by.into(),
            processing_steps: Vec::new(),
            quality_score: None,
            validation_status: "pending".to_string(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_source_version(mut self, version: impl Into<String>) -> Self {
        self.source_version = Some(version.into());
        self
    }

    /// Returns a new provenance with the step appended.
    pub fn add_processing_step(&self, step: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.processing_steps.push(step.into());
        next
    }

    /// Returns a new provenance with the quality score replaced.
    pub fn update_quality_score(&self, score: f64) -> Self {
        let mut next = self.clone();
        next.quality_score = Some(score);
        next
    }

    /// Returns a new provenance marked with the given validation status.
    pub fn mark_validated(&self, status: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.validation_status = status.into();
        next
    }

    pub fn is_validated(&self) -> bool {
        matches!(self.validation_status.as_str(), "validated" | "approved")
    }

    pub fn processing_summary(&self) -> String {
        if self.processing_steps.is_empty() {
            return "No processing steps recorded".to_string();
        }
        self.processing_steps.join(" -> ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_processing_step_leaves_original_untouched() {
        let prov = Provenance::new(DataSource::ClinVar, "test");
        let updated = prov.add_processing_step("Parsed XML");

        assert!(prov.processing_steps.is_empty());
        assert_eq!(updated.processing_steps, vec!["Parsed XML".to_string()]);
        assert_eq!(prov.source, updated.source);
    }

    #[test]
    fn mark_validated_recognizes_approved_states() {
        let prov = Provenance::new(DataSource::Hpo, "test");
        assert!(!prov.is_validated());
        assert!(prov.mark_validated("validated").is_validated());
        assert!(prov.mark_validated("approved").is_validated());
        assert!(!prov.mark_validated("failed").is_validated());
    }

    #[test]
    fn processing_summary_joins_steps_in_order() {
        let prov = Provenance::new(DataSource::PubMed, "test")
            .add_processing_step("Fetched")
            .add_processing_step("Parsed");
        assert_eq!(prov.processing_summary(), "Fetched -> Parsed");

        let empty = Provenance::new(DataSource::PubMed, "test");
        assert_eq!(empty.processing_summary(), "No processing steps recorded");
    }

    #[test]
    fn data_source_round_trips_through_str() {
        for source in [
            DataSource::ClinVar,
            DataSource::PubMed,
            DataSource::Hpo,
            DataSource::UniProt,
            DataSource::Manual,
            DataSource::Computed,
        ] {
            assert_eq!(DataSource::parse(source.as_str()), Some(source));
        }
        assert_eq!(DataSource::parse("dbgap"), None);
    }
}
