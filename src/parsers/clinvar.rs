//! ClinVar XML parser for genetic variant records.
//!
//! Extracts clinical significance, gene association, genomic location
//! (GRCh38 assembly preferred), and trait names from `VariationArchive`
//! documents.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::xml::{XmlElement, parse_document};
use super::{RawRecord, log_unknown_keys, raw_str};

/// Variation categories ClinVar reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantType {
    SingleNucleotideVariant,
    Deletion,
    Duplication,
    Insertion,
    Indel,
    CopyNumberGain,
    CopyNumberLoss,
    Microsatellite,
    Inversion,
    Other,
}

impl VariantType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().replace('_', " ").as_str() {
            "single nucleotide variant" | "snv" => Self::SingleNucleotideVariant,
            "deletion" => Self::Deletion,
            "duplication" => Self::Duplication,
            "insertion" => Self::Insertion,
            "indel" => Self::Indel,
            "copy number gain" => Self::CopyNumberGain,
            "copy number loss" => Self::CopyNumberLoss,
            "microsatellite" => Self::Microsatellite,
            "inversion" => Self::Inversion,
            _ => Self::Other,
        }
    }
}

/// Clinical significance classifications ClinVar reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalSignificance {
    Pathogenic,
    LikelyPathogenic,
    Benign,
    LikelyBenign,
    UncertainSignificance,
    ConflictingInterpretations,
    RiskFactor,
    Association,
    Protective,
    DrugResponse,
    NotProvided,
    Other,
}

impl ClinicalSignificance {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pathogenic" => Self::Pathogenic,
            "likely pathogenic" => Self::LikelyPathogenic,
            "benign" => Self::Benign,
            "likely benign" => Self::LikelyBenign,
            "uncertain significance" => Self::UncertainSignificance,
            "conflicting interpretations of pathogenicity" => Self::ConflictingInterpretations,
            "risk factor" => Self::RiskFactor,
            "association" => Self::Association,
            "protective" => Self::Protective,
            "drug response" => Self::DrugResponse,
            "not provided" | "" => Self::NotProvided,
            _ => Self::Other,
        }
    }

    /// Canonical display string, matching ClinVar's own casing.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pathogenic => "Pathogenic",
            Self::LikelyPathogenic => "Likely pathogenic",
            Self::Benign => "Benign",
            Self::LikelyBenign => "Likely benign",
            Self::UncertainSignificance => "Uncertain significance",
            Self::ConflictingInterpretations => "Conflicting interpretations of pathogenicity",
            Self::RiskFactor => "risk factor",
            Self::Association => "association",
            Self::Protective => "protective",
            Self::DrugResponse => "drug response",
            Self::NotProvided => "not provided",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ClinicalSignificance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured representation of a ClinVar variant record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinVarVariant {
    pub clinvar_id: String,
    pub variant_id: String,
    pub variation_name: String,
    pub variant_type: VariantType,
    pub clinical_significance: ClinicalSignificance,

    pub gene_symbol: Option<String>,
    pub gene_id: Option<String>,
    pub gene_name: Option<String>,

    pub chromosome: Option<String>,
    pub start_position: Option<i64>,
    pub end_position: Option<i64>,
    pub reference_allele: Option<String>,
    pub alternate_allele: Option<String>,

    pub phenotypes: Vec<String>,
    pub review_status: Option<String>,
    pub last_updated: Option<String>,
}

/// Parser for ClinVar `VariationArchive` XML payloads.
#[derive(Debug, Default)]
pub struct ClinVarParser;

impl ClinVarParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse one raw record (`clinvar_id` + `raw_xml`). Returns `None` on
    /// malformed input; the record is skipped, never fatal.
    pub fn parse_raw(&self, raw: &RawRecord) -> Option<ClinVarVariant> {
        log_unknown_keys("clinvar", raw, &["clinvar_id", "raw_xml", "source"]);
        let clinvar_id = raw_str(raw, "clinvar_id")?;
        let raw_xml = raw_str(raw, "raw_xml")?;

        let doc = match parse_document(raw_xml) {
            Ok(doc) => doc,
            Err(err) => {
                debug!(clinvar_id, "failed to parse ClinVar XML: {err}");
                return None;
            }
        };

        let mut variant = ClinVarVariant {
            clinvar_id: clinvar_id.to_string(),
            variant_id: String::new(),
            variation_name: String::new(),
            variant_type: VariantType::Other,
            clinical_significance: ClinicalSignificance::NotProvided,
            gene_symbol: None,
            gene_id: None,
            gene_name: None,
            chromosome: None,
            start_position: None,
            end_position: None,
            reference_allele: None,
            alternate_allele: None,
            phenotypes: Vec::new(),
            review_status: None,
            last_updated: None,
        };

        if let Some(archive) = doc.find("VariationArchive") {
            variant.variant_id = archive.attr("VariationID").unwrap_or_default().to_string();
            variant.variation_name = archive
                .attr("VariationName")
                .unwrap_or_default()
                .to_string();
            variant.variant_type =
                VariantType::parse(archive.attr("VariationType").unwrap_or_default());
            variant.last_updated = archive
                .attr("DateLastUpdated")
                .filter(|v| !v.is_empty())
                .map(str::to_string);
        }

        if let Some(gene) = doc.find("Gene") {
            variant.gene_symbol = attr_string(gene, "Symbol");
            variant.gene_id = attr_string(gene, "GeneID");
            variant.gene_name = attr_string(gene, "FullName");
        }

        // GRCh38 is the preferred assembly; older assemblies are ignored.
        for location in doc.find_all("SequenceLocation") {
            if location.attr("Assembly") != Some("GRCh38") {
                continue;
            }
            variant.chromosome = attr_string(location, "Chr");
            variant.start_position = location.attr("start").and_then(|v| v.parse().ok());
            variant.end_position = location.attr("stop").and_then(|v| v.parse().ok());
            variant.reference_allele = attr_string(location, "referenceAlleleVCF");
            variant.alternate_allele = attr_string(location, "alternateAlleleVCF");
            break;
        }

        if let Some(clinical) = doc.find("ClinicalSignificance") {
            if let Some(description) = clinical.find("Description").and_then(XmlElement::text_value)
            {
                variant.clinical_significance = ClinicalSignificance::parse(description);
            }
            variant.review_status = clinical
                .find("ReviewStatus")
                .and_then(XmlElement::text_value)
                .map(str::to_string);
        }

        if let Some(trait_set) = doc.find("TraitSet") {
            for trait_elem in trait_set.find_all("Trait") {
                for value in trait_elem.find_all("ElementValue") {
                    if value.attr("Type") == Some("Preferred") {
                        if let Some(name) = value.text_value() {
                            variant.phenotypes.push(name.to_string());
                        }
                    }
                }
            }
        }

        Some(variant)
    }

    /// Parse a batch of raw records, skipping any that fail.
    pub fn parse_batch(&self, raw_records: &[RawRecord]) -> Vec<ClinVarVariant> {
        raw_records
            .iter()
            .filter_map(|raw| self.parse_raw(raw))
            .collect()
    }

    /// Structural validation issues for a parsed record.
    pub fn validate(&self, variant: &ClinVarVariant) -> Vec<String> {
        let mut errors = Vec::new();
        if variant.clinvar_id.is_empty() {
            errors.push("Missing ClinVar ID".to_string());
        }
        if variant.variant_id.is_empty() {
            errors.push("Missing variant ID".to_string());
        }
        if variant.gene_symbol.is_none() {
            errors.push("Missing gene symbol".to_string());
        }
        errors
    }
}

fn attr_string(element: &XmlElement, key: &str) -> Option<String> {
    element
        .attr(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ClinVarResult-Set>
<VariationArchive VariationID="702748" VariationName="NM_020822.3(KCNT1):c.335-5C&gt;T" VariationType="single nucleotide variant" DateLastUpdated="2024-01-07">
<ClassifiedRecord>
<SimpleAllele AlleleID="695429" VariationID="702748">
<GeneList>
<Gene Symbol="KCNT1" GeneID="57582" FullName="potassium sodium-activated channel subfamily T member 1"/>
</GeneList>
<Location>
<SequenceLocation Assembly="GRCh37" Chr="9" start="138651772" stop="138651772"/>
<SequenceLocation Assembly="GRCh38" Chr="9" start="135760000" stop="135760000" referenceAlleleVCF="C" alternateAlleleVCF="T"/>
</Location>
</SimpleAllele>
<ClinicalSignificance>
<Description>Pathogenic</Description>
<ReviewStatus>criteria provided, single submitter</ReviewStatus>
</ClinicalSignificance>
<TraitSet Type="Disease">
<Trait Type="Disease">
<Name><ElementValue Type="Preferred">Developmental and epileptic encephalopathy</ElementValue></Name>
</Trait>
</TraitSet>
</ClassifiedRecord>
</VariationArchive>
</ClinVarResult-Set>"#;

    fn sample_record() -> RawRecord {
        json!({"clinvar_id": "4282399", "raw_xml": SAMPLE_XML})
            .as_object()
            .expect("object literal")
            .clone()
    }

    #[test]
    fn parses_variation_archive_fields() {
        let parser = ClinVarParser::new();
        let variant = parser.parse_raw(&sample_record()).expect("parsed variant");

        assert_eq!(variant.clinvar_id, "4282399");
        assert_eq!(variant.variant_id, "702748");
        assert_eq!(variant.variant_type, VariantType::SingleNucleotideVariant);
        assert_eq!(variant.gene_symbol.as_deref(), Some("KCNT1"));
        assert_eq!(variant.gene_id.as_deref(), Some("57582"));
        assert_eq!(
            variant.clinical_significance,
            ClinicalSignificance::Pathogenic
        );
        assert_eq!(
            variant.phenotypes,
            vec!["Developmental and epileptic encephalopathy".to_string()]
        );
    }

    #[test]
    fn prefers_grch38_sequence_location() {
        let parser = ClinVarParser::new();
        let variant = parser.parse_raw(&sample_record()).expect("parsed variant");

        assert_eq!(variant.chromosome.as_deref(), Some("9"));
        assert_eq!(variant.start_position, Some(135_760_000));
        assert_eq!(variant.reference_allele.as_deref(), Some("C"));
        assert_eq!(variant.alternate_allele.as_deref(), Some("T"));
    }

    #[test]
    fn missing_raw_xml_is_skipped() {
        let parser = ClinVarParser::new();
        let raw = json!({"clinvar_id": "1"})
            .as_object()
            .expect("object literal")
            .clone();
        assert!(parser.parse_raw(&raw).is_none());
    }

    #[test]
    fn parse_batch_skips_bad_records() {
        let parser = ClinVarParser::new();
        let bad = json!({"clinvar_id": "2", "raw_xml": "<broken"})
            .as_object()
            .expect("object literal")
            .clone();
        let parsed = parser.parse_batch(&[sample_record(), bad]);
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn validate_flags_missing_gene_symbol() {
        let parser = ClinVarParser::new();
        let mut variant = parser.parse_raw(&sample_record()).expect("parsed variant");
        assert!(parser.validate(&variant).is_empty());

        variant.gene_symbol = None;
        let errors = parser.validate(&variant);
        assert_eq!(errors, vec!["Missing gene symbol".to_string()]);
    }

    #[test]
    fn clinical_significance_parse_is_case_insensitive() {
        assert_eq!(
            ClinicalSignificance::parse("LIKELY PATHOGENIC"),
            ClinicalSignificance::LikelyPathogenic
        );
        assert_eq!(
            ClinicalSignificance::parse("Uncertain significance"),
            ClinicalSignificance::UncertainSignificance
        );
        assert_eq!(
            ClinicalSignificance::parse("something new"),
            ClinicalSignificance::Other
        );
    }

    #[test]
    fn variant_type_parse_normalizes_underscores() {
        assert_eq!(
            VariantType::parse("copy_number_gain"),
            VariantType::CopyNumberGain
        );
        assert_eq!(VariantType::parse("Deletion"), VariantType::Deletion);
    }
}
