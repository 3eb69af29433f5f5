//! License compliance checking and manifest generation.
//!
//! Compatibility is a static matrix: the permissive licenses accept each
//! other, GPL-3.0 accepts only itself. Matching is case- and
//! whitespace-sensitive.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::HarvestError;

/// Default license applied to emitted packages.
pub const DEFAULT_PACKAGE_LICENSE: &str = "CC-BY-4.0";

const PERMISSIVE_SET: &[&str] = &["CC-BY-4.0", "CC0-1.0", "MIT", "Apache-2.0"];
const KNOWN_LICENSES: &[&str] = &["CC-BY-4.0", "CC0-1.0", "MIT", "Apache-2.0", "GPL-3.0"];

/// Outcome of a pairwise license check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseCompatibility {
    Compatible,
    Incompatible,
    Missing,
}

/// Compatible targets for a source license, per the static matrix.
fn compatible_targets(source_license: &str) -> &'static [&'static str] {
    match source_license {
        "CC-BY-4.0" | "CC0-1.0" | "MIT" | "Apache-2.0" => PERMISSIVE_SET,
        "GPL-3.0" => &["GPL-3.0"],
        _ => &[],
    }
}

/// Check compatibility between a source license and a target license.
pub fn check_compatibility(source_license: &str, target_license: &str) -> LicenseCompatibility {
    if source_license.is_empty() || source_license == "unknown" {
        return LicenseCompatibility::Missing;
    }
    if target_license.is_empty() || target_license == "unknown" {
        return LicenseCompatibility::Missing;
    }
    if source_license == target_license {
        return LicenseCompatibility::Compatible;
    }
    if compatible_targets(source_license).contains(&target_license) {
        return LicenseCompatibility::Compatible;
    }
    LicenseCompatibility::Incompatible
}

/// Whether a license identifier is one the engine recognizes.
pub fn validate_license(license_id: &str) -> (bool, String) {
    let valid = KNOWN_LICENSES.contains(&license_id);
    let message = if valid {
        format!("License '{license_id}' is valid")
    } else {
        format!("License '{license_id}' is not recognized")
    };
    (valid, message)
}

/// Basic license information: id, canonical URL, name.
pub fn license_info(license_id: &str) -> (String, String, String) {
    let url = match license_id {
        "CC-BY-4.0" => "https://creativecommons.org/licenses/by/4.0/",
        "CC0-1.0" => "https://creativecommons.org/publicdomain/zero/1.0/",
        "MIT" => "https://opensource.org/licenses/MIT",
        "Apache-2.0" => "https://opensource.org/licenses/Apache-2.0",
        "GPL-3.0" => "https://www.gnu.org/licenses/gpl-3.0.html",
        _ => "",
    };
    (
        license_id.to_string(),
        url.to_string(),
        license_id.to_string(),
    )
}

/// License entry for one upstream source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLicense {
    pub source: String,
    pub license: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
}

/// Build a source license entry with the canonical URL and a default
/// attribution line.
pub fn source_license_info(
    source_name: &str,
    license_id: &str,
    license_url: Option<&str>,
    attribution: Option<&str>,
) -> SourceLicense {
    let (_, canonical_url, _) = license_info(license_id);
    SourceLicense {
        source: source_name.to_string(),
        license: license_id.to_string(),
        license_url: Some(
            license_url
                .map(str::to_string)
                .unwrap_or(canonical_url),
        ),
        attribution: Some(
            attribution
                .map(str::to_string)
                .unwrap_or_else(|| format!("Data from {source_name}")),
        ),
    }
}

/// Compliance block embedded in a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSection {
    pub status: String,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

/// License manifest emitted alongside a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseManifest {
    pub package_license: String,
    pub sources: Vec<SourceLicense>,
    pub compliance: ComplianceSection,
}

impl LicenseManifest {
    pub fn is_compliant(&self) -> bool {
        self.compliance.status == "compliant"
    }
}

/// Generate a license manifest, optionally writing it as block-style YAML.
///
/// Missing licenses produce warnings; incompatible licenses produce issues
/// and flip the status to `non-compliant`.
pub fn generate_manifest(
    licenses: &[SourceLicense],
    package_license: &str,
    output_path: Option<&Path>,
) -> Result<LicenseManifest, HarvestError> {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    for entry in licenses {
        match check_compatibility(&entry.license, package_license) {
            LicenseCompatibility::Missing => {
                warnings.push(format!("Missing license for source: {}", entry.source));
            }
            LicenseCompatibility::Incompatible => {
                issues.push(format!(
                    "Incompatible license '{}' from source '{}'",
                    entry.license, entry.source
                ));
            }
            LicenseCompatibility::Compatible => {}
        }
    }

    let status = if issues.is_empty() {
        "compliant"
    } else {
        "non-compliant"
    };
    let manifest = LicenseManifest {
        package_license: package_license.to_string(),
        sources: licenses.to_vec(),
        compliance: ComplianceSection {
            status: status.to_string(),
            issues,
            warnings,
        },
    };

    if let Some(path) = output_path {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(&manifest)?)?;
        debug!(path = %path.display(), "wrote license manifest");
    }

    Ok(manifest)
}

/// Result of validating source licenses against a package license.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseValidation {
    pub valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validates license compliance for packages.
#[derive(Debug, Clone)]
pub struct LicenseValidator {
    package_license: String,
}

impl Default for LicenseValidator {
    fn default() -> Self {
        Self {
            package_license: DEFAULT_PACKAGE_LICENSE.to_string(),
        }
    }
}

impl LicenseValidator {
    pub fn new(package_license: impl Into<String>) -> Self {
        Self {
            package_license: package_license.into(),
        }
    }

    /// Validate source licenses against the configured package license.
    pub fn validate_sources(&self, source_licenses: &[SourceLicense]) -> LicenseValidation {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        for entry in source_licenses {
            match check_compatibility(&entry.license, &self.package_license) {
                LicenseCompatibility::Missing => {
                    warnings.push(format!("Missing license for source: {}", entry.source));
                }
                LicenseCompatibility::Incompatible => {
                    issues.push(format!(
                        "Incompatible license '{}' from source '{}'",
                        entry.license, entry.source
                    ));
                }
                LicenseCompatibility::Compatible => {}
            }
        }

        LicenseValidation {
            valid: issues.is_empty(),
            issues,
            warnings,
        }
    }

    /// Validate a manifest file on disk: structure first, then sources.
    pub fn validate_manifest(&self, manifest_path: &Path) -> LicenseValidation {
        if !manifest_path.exists() {
            return LicenseValidation {
                valid: false,
                issues: vec!["License manifest file not found".to_string()],
                warnings: Vec::new(),
            };
        }

        let text = match std::fs::read_to_string(manifest_path) {
            Ok(text) => text,
            Err(err) => {
                return LicenseValidation {
                    valid: false,
                    issues: vec![format!("Error reading manifest: {err}")],
                    warnings: Vec::new(),
                };
            }
        };

        let value: serde_yaml::Value = match serde_yaml::from_str(&text) {
            Ok(value) => value,
            Err(err) => {
                return LicenseValidation {
                    valid: false,
                    issues: vec![format!("Error reading manifest: {err}")],
                    warnings: Vec::new(),
                };
            }
        };

        let Some(mapping) = value.as_mapping() else {
            return LicenseValidation {
                valid: false,
                issues: vec!["Manifest is not a mapping".to_string()],
                warnings: Vec::new(),
            };
        };
        if !mapping.contains_key("package_license") {
            return LicenseValidation {
                valid: false,
                issues: vec!["Missing package_license in manifest".to_string()],
                warnings: Vec::new(),
            };
        }
        let Some(sources) = mapping.get("sources").and_then(|v| v.as_sequence()) else {
            return LicenseValidation {
                valid: false,
                issues: vec!["Missing sources in manifest".to_string()],
                warnings: Vec::new(),
            };
        };

        let mut parsed_sources = Vec::new();
        for source in sources {
            let Some(source_map) = source.as_mapping() else {
                return LicenseValidation {
                    valid: false,
                    issues: vec!["Source entry is not a mapping".to_string()],
                    warnings: Vec::new(),
                };
            };
            let name = source_map
                .get("source")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let license = source_map
                .get("license")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            parsed_sources.push(SourceLicense {
                source: name.to_string(),
                license: license.to_string(),
                license_url: None,
                attribution: None,
            });
        }

        self.validate_sources(&parsed_sources)
    }
}
