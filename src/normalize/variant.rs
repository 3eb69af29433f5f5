//! Variant identifier normalization.
//!
//! Standardizes variant identifiers and HGVS notations from ClinVar and
//! generic sources into consistent representations.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::entities::{
    CrossReferences, GenomicLocation, NormalizedVariant, VariantIdentifierType,
    merge_cross_references,
};
use crate::error::HarvestError;
use crate::parsers::clinvar::ClinVarVariant;
use crate::parsers::{RawRecord, raw_i64, raw_str};

use super::{MERGED_SOURCE, merged_confidence};

static HGVS_C: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^c\.\d+.*$").expect("valid regex"));
static HGVS_P: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^p\.\w+\d+\w+$").expect("valid regex"));
static HGVS_G: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^g\.\d+.*$").expect("valid regex"));
static CLINVAR_VCV: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^VCV\d+$").expect("valid regex"));
static DBSNP_RS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^rs\d+$").expect("valid regex"));
static CHROMOSOME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(chr)?[0-9XYM]+$").expect("valid regex"));
static PROTEIN_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+\d+\w+$").expect("valid regex"));

const CLINVAR_CONFIDENCE: f64 = 0.9;
const GENERIC_CONFIDENCE: f64 = 0.6;

/// Normalizes genetic variant identifiers from different sources.
#[derive(Debug, Default)]
pub struct VariantNormalizer {
    cache: HashMap<String, NormalizedVariant>,
}

impl VariantNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a parsed ClinVar variant record.
    ///
    /// Primary id precedence: `clinvar_id`, then `variant_id`, then a
    /// synthesized `<chr>:<pos>:<ref>><alt>` coordinate id.
    pub fn normalize_clinvar(&mut self, variant: &ClinVarVariant) -> Option<NormalizedVariant> {
        let clinvar_id = non_empty(&variant.clinvar_id);
        let variant_id = non_empty(&variant.variant_id);

        let (primary_id, id_type) = if let Some(id) = clinvar_id {
            (id.to_string(), VariantIdentifierType::ClinvarVcv)
        } else if let Some(id) = variant_id {
            (id.to_string(), VariantIdentifierType::Other)
        } else if let (Some(chromosome), Some(position)) =
            (variant.chromosome.as_deref(), variant.start_position)
        {
            let reference = variant.reference_allele.as_deref().unwrap_or("N");
            let alternate = variant.alternate_allele.as_deref().unwrap_or("N");
            (
                format!("{chromosome}:{position}:{reference}>{alternate}"),
                VariantIdentifierType::Other,
            )
        } else {
            return None;
        };

        let genomic_location = variant.chromosome.as_deref().map(|chromosome| {
            let mut location = GenomicLocation::new(chromosome, variant.start_position);
            location.reference_allele = variant.reference_allele.clone();
            location.alternate_allele = variant.alternate_allele.clone();
            location
        });

        // ClinVar variation names are often HGVS.
        let mut hgvs_notations = BTreeMap::new();
        let variation_name = variant.variation_name.trim();
        if !variation_name.is_empty() {
            if HGVS_C.is_match(variation_name) {
                hgvs_notations.insert("c".to_string(), variation_name.to_string());
            } else if HGVS_P.is_match(variation_name) {
                hgvs_notations.insert("p".to_string(), variation_name.to_string());
            } else if HGVS_G.is_match(variation_name) {
                hgvs_notations.insert("g".to_string(), variation_name.to_string());
            }
        }

        let mut cross_references = CrossReferences::new();
        if let Some(id) = variant_id {
            cross_references.insert("CLINVAR".to_string(), vec![id.to_string()]);
        }
        if !variation_name.is_empty() {
            cross_references.insert("VARIATION_NAME".to_string(), vec![variation_name.to_string()]);
        }

        let normalized = NormalizedVariant {
            primary_id: primary_id.clone(),
            id_type,
            genomic_location,
            hgvs_notations,
            clinical_significance: Some(variant.clinical_significance.to_string()),
            gene_symbol: variant.gene_symbol.clone(),
            cross_references,
            source: "clinvar".to_string(),
            confidence_score: CLINVAR_CONFIDENCE,
        };

        self.cache.insert(primary_id, normalized.clone());
        Some(normalized)
    }

    /// Normalize variant data from a schema-loose record.
    pub fn normalize_generic(
        &mut self,
        raw: &RawRecord,
        source: &str,
    ) -> Option<NormalizedVariant> {
        let variant_id = raw_str(raw, "id")
            .or_else(|| raw_str(raw, "variant_id"))
            .or_else(|| raw_str(raw, "identifier"))?;

        let genomic_location = raw_str(raw, "chromosome").map(|chromosome| {
            let position = raw_i64(raw, "start_position").or_else(|| raw_i64(raw, "position"));
            let mut location = GenomicLocation::new(chromosome, position);
            location.reference_allele = raw_str(raw, "reference_allele").map(str::to_string);
            location.alternate_allele = raw_str(raw, "alternate_allele").map(str::to_string);
            if let Some(assembly) = raw_str(raw, "assembly") {
                location.assembly = assembly.to_string();
            }
            location
        });

        let mut hgvs_notations = BTreeMap::new();
        for (key, field) in [("c", "hgvs_c"), ("p", "hgvs_p"), ("g", "hgvs_g")] {
            if let Some(value) = raw_str(raw, field) {
                hgvs_notations.insert(key.to_string(), value.to_string());
            }
        }

        let normalized = NormalizedVariant {
            primary_id: variant_id.to_string(),
            id_type: Self::identify_type(variant_id),
            genomic_location,
            hgvs_notations,
            clinical_significance: raw_str(raw, "clinical_significance").map(str::to_string),
            gene_symbol: raw_str(raw, "gene_symbol").map(str::to_string),
            cross_references: CrossReferences::new(),
            source: source.to_string(),
            confidence_score: GENERIC_CONFIDENCE,
        };

        self.cache.insert(variant_id.to_string(), normalized.clone());
        Some(normalized)
    }

    /// Classify a variant identifier string.
    pub fn identify_type(variant_id: &str) -> VariantIdentifierType {
        if CLINVAR_VCV.is_match(variant_id) {
            VariantIdentifierType::ClinvarVcv
        } else if DBSNP_RS.is_match(variant_id) {
            VariantIdentifierType::DbsnpRs
        } else if HGVS_C.is_match(variant_id) {
            VariantIdentifierType::HgvsC
        } else if HGVS_P.is_match(variant_id) {
            VariantIdentifierType::HgvsP
        } else if HGVS_G.is_match(variant_id) {
            VariantIdentifierType::HgvsG
        } else {
            VariantIdentifierType::Other
        }
    }

    /// Ensure an HGVS string carries a recognized prefix, inferring one for
    /// bare protein- or genomic-shaped notations.
    pub fn standardize_hgvs(hgvs: &str) -> String {
        let standardized = hgvs.trim();
        if standardized.is_empty() {
            return String::new();
        }
        let has_prefix = ["c.", "p.", "g.", "m.", "n.", "r."]
            .iter()
            .any(|prefix| standardized.starts_with(prefix));
        if has_prefix {
            return standardized.to_string();
        }
        if standardized.contains("p.") || PROTEIN_SHAPE.is_match(standardized) {
            format!("p.{standardized}")
        } else if standardized.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            format!("g.{standardized}")
        } else {
            standardized.to_string()
        }
    }

    /// Merge multiple records for the same variant. HGVS notations are
    /// unioned across records; the base record wins per notation key.
    pub fn merge(variants: &[NormalizedVariant]) -> Result<NormalizedVariant, HarvestError> {
        let base = variants
            .iter()
            .max_by(|a, b| {
                a.confidence_score
                    .partial_cmp(&b.confidence_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or_else(|| HarvestError::InvalidArgument("No variants to merge".into()))?;

        if variants.len() == 1 {
            return Ok(base.clone());
        }

        let mut merged = base.clone();
        for variant in variants {
            merge_cross_references(&mut merged.cross_references, &variant.cross_references);
            for (key, value) in &variant.hgvs_notations {
                merged
                    .hgvs_notations
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        merged.source = MERGED_SOURCE.to_string();
        merged.confidence_score = merged_confidence(base.confidence_score);
        Ok(merged)
    }

    /// Validation issues for a normalized variant.
    pub fn validate(variant: &NormalizedVariant) -> Vec<String> {
        let mut errors = Vec::new();
        if variant.primary_id.is_empty() {
            errors.push("Missing primary ID".to_string());
        }
        if !(0.0..=1.0).contains(&variant.confidence_score) {
            errors.push("Confidence score out of range [0,1]".to_string());
        }
        if let Some(location) = &variant.genomic_location {
            if location.chromosome.is_empty() {
                errors.push("Genomic location missing chromosome".to_string());
            } else if !CHROMOSOME.is_match(&location.chromosome) {
                errors.push("Invalid chromosome format".to_string());
            }
        }
        for (notation_type, notation) in &variant.hgvs_notations {
            let pattern = match notation_type.as_str() {
                "c" => &*HGVS_C,
                "g" => &*HGVS_G,
                "p" => &*HGVS_P,
                _ => continue,
            };
            if !pattern.is_match(notation) {
                errors.push(format!(
                    "Invalid HGVS {notation_type} notation: {notation}"
                ));
            }
        }
        errors
    }

    /// Cached variant lookup by primary id.
    pub fn variant_by_id(&self, variant_id: &str) -> Option<&NormalizedVariant> {
        self.cache.get(variant_id)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() {
        debug!("empty identifier skipped");
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::clinvar::{ClinicalSignificance, VariantType};
    use serde_json::json;

    fn clinvar_variant() -> ClinVarVariant {
        ClinVarVariant {
            clinvar_id: "4282399".into(),
            variant_id: "702748".into(),
            variation_name: "c.335-5C>T".into(),
            variant_type: VariantType::SingleNucleotideVariant,
            clinical_significance: ClinicalSignificance::Pathogenic,
            gene_symbol: Some("KCNT1".into()),
            gene_id: Some("57582".into()),
            gene_name: None,
            chromosome: Some("9".into()),
            start_position: Some(1_000_000),
            end_position: Some(1_000_000),
            reference_allele: Some("C".into()),
            alternate_allele: Some("T".into()),
            phenotypes: vec!["Seizures".into()],
            review_status: None,
            last_updated: None,
        }
    }

    #[test]
    fn clinvar_id_takes_precedence_as_primary_id() {
        let mut normalizer = VariantNormalizer::new();
        let variant = normalizer
            .normalize_clinvar(&clinvar_variant())
            .expect("normalized");

        assert_eq!(variant.primary_id, "4282399");
        assert_eq!(variant.id_type, VariantIdentifierType::ClinvarVcv);
        assert_eq!(variant.confidence_score, 0.9);
        assert_eq!(
            variant.clinical_significance.as_deref(),
            Some("Pathogenic")
        );
        assert_eq!(
            variant.genomic_location.as_ref().map(|l| l.chromosome.as_str()),
            Some("9")
        );
        assert_eq!(variant.hgvs_notations.get("c").map(String::as_str), Some("c.335-5C>T"));
    }

    #[test]
    fn coordinate_id_synthesized_when_ids_missing() {
        let mut normalizer = VariantNormalizer::new();
        let mut source = clinvar_variant();
        source.clinvar_id = String::new();
        source.variant_id = String::new();

        let variant = normalizer.normalize_clinvar(&source).expect("normalized");
        assert_eq!(variant.primary_id, "9:1000000:C>T");
        assert_eq!(variant.id_type, VariantIdentifierType::Other);
    }

    #[test]
    fn identify_type_recognizes_known_shapes() {
        assert_eq!(
            VariantNormalizer::identify_type("VCV000702748"),
            VariantIdentifierType::ClinvarVcv
        );
        assert_eq!(
            VariantNormalizer::identify_type("rs113488022"),
            VariantIdentifierType::DbsnpRs
        );
        assert_eq!(
            VariantNormalizer::identify_type("c.1799T>A"),
            VariantIdentifierType::HgvsC
        );
        assert_eq!(
            VariantNormalizer::identify_type("p.Val600Glu"),
            VariantIdentifierType::HgvsP
        );
        assert_eq!(
            VariantNormalizer::identify_type("g.140753336A>T"),
            VariantIdentifierType::HgvsG
        );
        assert_eq!(
            VariantNormalizer::identify_type("COSM476"),
            VariantIdentifierType::Other
        );
    }

    #[test]
    fn standardize_hgvs_infers_missing_prefixes() {
        assert_eq!(VariantNormalizer::standardize_hgvs("c.335-5C>T"), "c.335-5C>T");
        assert_eq!(
            VariantNormalizer::standardize_hgvs("Val600Glu"),
            "p.Val600Glu"
        );
        assert_eq!(
            VariantNormalizer::standardize_hgvs("140753336A>T"),
            "g.140753336A>T"
        );
        assert_eq!(VariantNormalizer::standardize_hgvs("  "), "");
    }

    #[test]
    fn generic_variant_reads_location_fields() {
        let mut normalizer = VariantNormalizer::new();
        let raw = json!({
            "variant_id": "rs113488022",
            "chromosome": "7",
            "position": 140753336,
            "reference_allele": "A",
            "alternate_allele": "T",
            "gene_symbol": "BRAF",
        })
        .as_object()
        .expect("object literal")
        .clone();

        let variant = normalizer.normalize_generic(&raw, "dbsnp").expect("normalized");
        assert_eq!(variant.id_type, VariantIdentifierType::DbsnpRs);
        assert_eq!(variant.confidence_score, 0.6);
        assert_eq!(
            variant.genomic_location.as_ref().and_then(|l| l.position),
            Some(140_753_336)
        );
    }

    #[test]
    fn validate_rejects_bad_chromosome_and_hgvs() {
        let mut normalizer = VariantNormalizer::new();
        let mut variant = normalizer
            .normalize_clinvar(&clinvar_variant())
            .expect("normalized");
        assert!(VariantNormalizer::validate(&variant).is_empty());

        variant.genomic_location.as_mut().expect("location").chromosome = "chr99Z".into();
        variant
            .hgvs_notations
            .insert("p".into(), "not-hgvs".into());
        let errors = VariantNormalizer::validate(&variant);
        assert!(errors.contains(&"Invalid chromosome format".to_string()));
        assert!(errors.iter().any(|e| e.contains("Invalid HGVS p notation")));
    }

    #[test]
    fn merge_prefers_highest_confidence_base() {
        let mut normalizer = VariantNormalizer::new();
        let clinvar = normalizer
            .normalize_clinvar(&clinvar_variant())
            .expect("normalized");

        let raw = json!({"variant_id": "4282399", "hgvs_p": "p.Thr112Met"})
            .as_object()
            .expect("object literal")
            .clone();
        let generic = normalizer.normalize_generic(&raw, "cosmic").expect("normalized");

        let merged = VariantNormalizer::merge(&[generic, clinvar.clone()]).expect("merged");
        assert_eq!(merged.primary_id, clinvar.primary_id);
        assert_eq!(merged.source, "merged");
        assert!((merged.confidence_score - 1.0).abs() < 1e-9);
        assert!(merged.hgvs_notations.contains_key("c"));
        assert!(merged.hgvs_notations.contains_key("p"));
    }
}
