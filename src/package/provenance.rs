//! Provenance serialization for packaging.
//!
//! Provenance records become `DataDownload` entities that either attach to
//! a crate's root dataset or ship as a standalone `provenance.json`.

use std::path::Path;

use serde_json::{Value, json};
use time::format_description::well_known::Rfc3339;

use crate::error::HarvestError;
use crate::provenance::Provenance;

/// Serializes provenance records for inclusion in package metadata.
pub struct ProvenanceTracker;

impl ProvenanceTracker {
    /// Serialize provenance records as `{"sources": [DataDownload...]}`.
    pub fn serialize_provenance(records: &[Provenance]) -> Value {
        let sources: Vec<Value> = records.iter().map(Self::serialize_record).collect();
        json!({ "sources": sources })
    }

    fn serialize_record(record: &Provenance) -> Value {
        let date_published = record
            .acquired_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| {
                time::OffsetDateTime::now_utc()
                    .format(&Rfc3339)
                    .unwrap_or_default()
            });

        let mut entity = json!({
            "@type": "DataDownload",
            "name": record.source.as_str(),
            "datePublished": date_published,
        });

        if let Some(url) = record.source_url.as_deref() {
            entity["url"] = json!(url);
        }
        if let Some(version) = record.source_version.as_deref() {
            entity["version"] = json!(version);
        }
        if !record.processing_steps.is_empty() {
            entity["processingSteps"] = json!(record.processing_steps);
        }
        if let Some(score) = record.quality_score {
            entity["qualityScore"] = json!(score);
        }
        if !record.validation_status.is_empty() {
            entity["validationStatus"] = json!(record.validation_status);
        }
        entity
    }

    /// Append serialized sources to the root dataset's `hasPart` list.
    /// Metadata without an `@graph` is returned unchanged.
    pub fn enrich_with_provenance(mut metadata: Value, records: &[Provenance]) -> Value {
        let serialized = Self::serialize_provenance(records);
        let Some(sources) = serialized.get("sources").and_then(Value::as_array).cloned() else {
            return metadata;
        };

        let Some(graph) = metadata.get_mut("@graph").and_then(Value::as_array_mut) else {
            return metadata;
        };

        for entity in graph.iter_mut() {
            if entity.get("@id").and_then(Value::as_str) == Some("./") {
                match entity.get_mut("hasPart").and_then(Value::as_array_mut) {
                    Some(has_part) => has_part.extend(sources.iter().cloned()),
                    None => {
                        entity["hasPart"] = Value::Array(sources.clone());
                    }
                }
                break;
            }
        }
        metadata
    }

    /// Write a standalone provenance file, creating parent directories.
    pub fn write_provenance_file(
        records: &[Provenance],
        output_path: &Path,
    ) -> Result<(), HarvestError> {
        let metadata = Self::serialize_provenance(records);
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output_path, serde_json::to_string_pretty(&metadata)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::DataSource;

    fn record() -> Provenance {
        Provenance::new(DataSource::ClinVar, "test")
            .with_source_url("https://www.ncbi.nlm.nih.gov/clinvar/")
            .with_source_version("2026-07")
            .add_processing_step("Fetched 12 records from clinvar")
            .update_quality_score(0.95)
    }

    #[test]
    fn serialization_includes_optional_fields_when_set() {
        let serialized = ProvenanceTracker::serialize_provenance(&[record()]);
        let source = &serialized["sources"][0];

        assert_eq!(source["@type"], "DataDownload");
        assert_eq!(source["name"], "clinvar");
        assert_eq!(source["url"], "https://www.ncbi.nlm.nih.gov/clinvar/");
        assert_eq!(source["version"], "2026-07");
        assert_eq!(source["qualityScore"], 0.95);
        assert_eq!(source["validationStatus"], "pending");
        assert_eq!(
            source["processingSteps"][0],
            "Fetched 12 records from clinvar"
        );
        assert!(source["datePublished"].as_str().is_some());
    }

    #[test]
    fn bare_record_omits_optional_fields() {
        let bare = Provenance::new(DataSource::Hpo, "test");
        let serialized = ProvenanceTracker::serialize_provenance(&[bare]);
        let source = &serialized["sources"][0];

        assert!(source.get("url").is_none());
        assert!(source.get("version").is_none());
        assert!(source.get("processingSteps").is_none());
        assert!(source.get("qualityScore").is_none());
    }

    #[test]
    fn enrich_appends_to_existing_has_part() {
        let metadata = json!({
            "@context": {},
            "@graph": [{
                "@id": "./",
                "@type": "Dataset",
                "hasPart": [{"@id": "data/x.json", "@type": "File"}],
            }],
        });

        let enriched = ProvenanceTracker::enrich_with_provenance(metadata, &[record()]);
        let has_part = enriched["@graph"][0]["hasPart"].as_array().expect("hasPart");
        assert_eq!(has_part.len(), 2);
        assert_eq!(has_part[1]["@type"], "DataDownload");
    }

    #[test]
    fn enrich_creates_has_part_when_absent() {
        let metadata = json!({
            "@graph": [{"@id": "./", "@type": "Dataset"}],
        });
        let enriched = ProvenanceTracker::enrich_with_provenance(metadata, &[record()]);
        assert_eq!(
            enriched["@graph"][0]["hasPart"]
                .as_array()
                .expect("hasPart")
                .len(),
            1
        );
    }

    #[test]
    fn enrich_without_graph_returns_metadata_unchanged() {
        let metadata = json!({"name": "no graph here"});
        let enriched = ProvenanceTracker::enrich_with_provenance(metadata.clone(), &[record()]);
        assert_eq!(enriched, metadata);
    }

    #[test]
    fn write_provenance_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/provenance.json");
        ProvenanceTracker::write_provenance_file(&[record()], &path).expect("written");

        let parsed: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(parsed["sources"].as_array().expect("sources").len(), 1);
    }
}
