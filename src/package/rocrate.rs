//! RO-Crate builder and validator.
//!
//! A crate is a directory rooted at `base_path` with a JSON-LD metadata
//! graph at `ro-crate-metadata.json`, copied data files under `data/`, and
//! an optional `metadata/` directory for enrichments.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;
use uuid::Uuid;

use crate::error::HarvestError;
use crate::provenance::Provenance;

use super::provenance::ProvenanceTracker;

/// A data file to include in the crate.
#[derive(Debug, Clone)]
pub struct DataFileSpec {
    /// Path inside the crate, e.g. `data/genes_normalized.json`.
    pub path: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub encoding_format: Option<String>,
}

impl DataFileSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
            description: None,
            encoding_format: None,
        }
    }
}

/// Outcome of validating an on-disk crate section.
#[derive(Debug, Clone, Serialize)]
pub struct CrateValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl CrateValidation {
    fn from_parts(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Builder for RO-Crate compliant packages.
pub struct RoCrateBuilder {
    base_path: PathBuf,
    name: String,
    description: String,
    version: String,
    license: String,
    author: String,
    crate_id: Uuid,
    created_at: OffsetDateTime,
}

impl RoCrateBuilder {
    pub fn new(base_path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            name: name.into(),
            description: "Curated biomedical data for genetic variants, phenotypes, \
                          and supporting evidence"
                .to_string(),
            version: "1.0.0".to_string(),
            license: "CC-BY-4.0".to_string(),
            author: "Biomedical Resource Library".to_string(),
            crate_id: Uuid::new_v4(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn license(mut self, license: impl Into<String>) -> Self {
        self.license = license.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn crate_id(&self) -> Uuid {
        self.crate_id
    }

    /// Create the crate directory skeleton.
    pub fn create_structure(&self) -> Result<BTreeMap<String, PathBuf>, HarvestError> {
        let paths = BTreeMap::from([
            ("data".to_string(), self.base_path.join("data")),
            ("metadata".to_string(), self.base_path.join("metadata")),
        ]);
        for path in paths.values() {
            std::fs::create_dir_all(path)?;
        }
        Ok(paths)
    }

    /// Copy a file into `data/`, returning its crate-relative path.
    pub fn add_data_file(
        &self,
        source_path: &Path,
        target_name: Option<&str>,
    ) -> Result<String, HarvestError> {
        let data_dir = self.base_path.join("data");
        std::fs::create_dir_all(&data_dir)?;

        let file_name = match target_name {
            Some(name) => name.to_string(),
            None => source_path
                .file_name()
                .ok_or_else(|| {
                    HarvestError::InvalidArgument(format!(
                        "Data file path has no file name: {}",
                        source_path.display()
                    ))
                })?
                .to_string_lossy()
                .to_string(),
        };

        std::fs::copy(source_path, data_dir.join(&file_name))?;
        Ok(format!("data/{file_name}"))
    }

    /// Generate the `ro-crate-metadata.json` document.
    pub fn generate_metadata(
        &self,
        data_files: &[DataFileSpec],
        provenance_records: &[Provenance],
    ) -> Value {
        let context = json!({
            "@vocab": "https://schema.org/",
            "ro-crate": "https://w3id.org/ro/crate#",
        });

        let mut root_dataset = json!({
            "@id": "./",
            "@type": "Dataset",
            "identifier": self.crate_id.to_string(),
            "name": self.name,
            "description": self.description,
            "version": self.version,
            "license": {
                "@id": format!("https://spdx.org/licenses/{}.html", self.license),
                "@type": "CreativeWork",
                "name": self.license,
            },
            "creator": {
                "@type": "Organization",
                "name": self.author,
            },
            "datePublished": self
                .created_at
                .format(&Rfc3339)
                .unwrap_or_default(),
            "keywords": [
                "genetics",
                "variants",
                "phenotypes",
                "biomedical data",
                "FAIR data",
            ],
        });

        let file_entities: Vec<Value> = data_files.iter().map(file_entity).collect();

        let mut has_part: Vec<Value> = Vec::new();
        if !provenance_records.is_empty() {
            let serialized = ProvenanceTracker::serialize_provenance(provenance_records);
            if let Some(sources) = serialized.get("sources").and_then(Value::as_array) {
                has_part.extend(sources.iter().cloned());
            }
        }
        has_part.extend(file_entities.iter().cloned());

        if !has_part.is_empty() {
            root_dataset["hasPart"] = Value::Array(has_part);
        }

        let mut graph = vec![root_dataset];
        graph.extend(file_entities);

        json!({
            "@context": context,
            "@graph": graph,
        })
    }

    /// Build the complete crate: structure, metadata file, done.
    pub fn build(
        &self,
        data_files: &[DataFileSpec],
        provenance_records: &[Provenance],
    ) -> Result<PathBuf, HarvestError> {
        self.create_structure()?;
        let metadata = self.generate_metadata(data_files, provenance_records);
        let metadata_path = self.base_path.join("ro-crate-metadata.json");
        std::fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;
        info!(
            path = %self.base_path.display(),
            files = data_files.len(),
            "built RO-Crate package"
        );
        Ok(self.base_path.clone())
    }
}

fn file_entity(spec: &DataFileSpec) -> Value {
    let file_name = spec
        .path
        .rsplit('/')
        .next()
        .unwrap_or(spec.path.as_str())
        .to_string();
    let mut entity = json!({
        "@id": spec.path,
        "@type": "File",
        "name": spec.name.clone().unwrap_or(file_name),
    });
    if let Some(description) = spec.description.as_deref() {
        entity["description"] = json!(description);
    }
    let encoding = spec
        .encoding_format
        .clone()
        .or_else(|| infer_encoding_format(&spec.path));
    if let Some(encoding) = encoding {
        entity["encodingFormat"] = json!(encoding);
    }
    entity
}

/// MIME type inferred from a file extension.
fn infer_encoding_format(path: &str) -> Option<String> {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())?
        .to_ascii_lowercase();
    let mime = match extension.as_str() {
        "json" => "application/json",
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "xml" => "application/xml",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime.to_string())
}

/// Validator for on-disk RO-Crate packages.
pub struct RoCrateValidator {
    crate_path: PathBuf,
}

impl RoCrateValidator {
    pub fn new(crate_path: impl Into<PathBuf>) -> Self {
        Self {
            crate_path: crate_path.into(),
        }
    }

    /// Structural and metadata validation of the crate.
    pub fn validate(&self) -> CrateValidation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if !self.crate_path.exists() {
            errors.push("Crate path does not exist".to_string());
            return CrateValidation::from_parts(errors, warnings);
        }

        let metadata_path = self.crate_path.join("ro-crate-metadata.json");
        if !metadata_path.exists() {
            errors.push("Missing ro-crate-metadata.json".to_string());
        } else {
            match std::fs::read_to_string(&metadata_path)
                .map_err(|err| err.to_string())
                .and_then(|text| {
                    serde_json::from_str::<Value>(&text).map_err(|err| err.to_string())
                }) {
                Ok(metadata) => {
                    if metadata.get("@context").is_none() {
                        errors.push("Missing @context in metadata".to_string());
                    }
                    match metadata.get("@graph").and_then(Value::as_array) {
                        Some(graph) => {
                            let root_found = graph.iter().any(|entity| {
                                entity.get("@id").and_then(Value::as_str) == Some("./")
                                    && entity.get("@type").and_then(Value::as_str)
                                        == Some("Dataset")
                            });
                            if !root_found {
                                errors.push("Missing root dataset entity".to_string());
                            }
                        }
                        None => errors.push("Missing @graph in metadata".to_string()),
                    }
                }
                Err(err) => errors.push(format!("Invalid JSON in metadata: {err}")),
            }
        }

        if !self.crate_path.join("data").exists() {
            warnings.push("Data directory does not exist".to_string());
        }

        CrateValidation::from_parts(errors, warnings)
    }

    /// FAIR summary: `findable` uses the structural report, the other
    /// three use the metadata report.
    pub fn validate_fair_compliance(&self) -> BTreeMap<String, CrateValidation> {
        let structure = self.structure_report();
        let metadata = self.metadata_report();
        BTreeMap::from([
            ("findable".to_string(), structure),
            ("accessible".to_string(), metadata.clone()),
            ("interoperable".to_string(), metadata.clone()),
            ("reusable".to_string(), metadata),
        ])
    }

    fn structure_report(&self) -> CrateValidation {
        let mut errors = Vec::new();
        if !self.crate_path.exists() {
            errors.push("Crate path does not exist".to_string());
        }
        if !self.crate_path.join("ro-crate-metadata.json").exists() {
            errors.push("Missing ro-crate-metadata.json".to_string());
        }
        if !self.crate_path.join("data").exists() {
            errors.push("Missing data directory".to_string());
        }
        CrateValidation::from_parts(errors, Vec::new())
    }

    fn metadata_report(&self) -> CrateValidation {
        let metadata_path = self.crate_path.join("ro-crate-metadata.json");
        if !metadata_path.exists() {
            return CrateValidation::from_parts(
                vec!["Missing ro-crate-metadata.json".to_string()],
                Vec::new(),
            );
        }

        let metadata: Value = match std::fs::read_to_string(&metadata_path)
            .map_err(|err| err.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|err| err.to_string()))
        {
            Ok(metadata) => metadata,
            Err(err) => {
                return CrateValidation::from_parts(
                    vec![format!("Invalid metadata: {err}")],
                    Vec::new(),
                );
            }
        };

        let missing: Vec<String> = ["@context", "@graph"]
            .iter()
            .filter(|field| metadata.get(**field).is_none())
            .map(|field| field.to_string())
            .collect();
        CrateValidation::from_parts(missing, Vec::new())
    }
}
