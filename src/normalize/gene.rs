//! Gene identifier normalization.
//!
//! Standardizes gene identifiers from ClinVar, UniProt, and generic sources
//! into consistent symbols for cross-referencing and deduplication.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::entities::{
    CrossReferences, GeneIdentifierType, NormalizedGene, merge_cross_references, merge_synonyms,
};
use crate::error::HarvestError;
use crate::parsers::clinvar::ClinVarVariant;
use crate::parsers::uniprot::UniProtEntry;
use crate::parsers::{RawRecord, raw_str, raw_string_list};

use super::{MERGED_SOURCE, merged_confidence};

static SYMBOL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_-]*$").expect("valid regex"));

const CLINVAR_CONFIDENCE: f64 = 0.9;
const UNIPROT_CONFIDENCE: f64 = 0.8;
const GENERIC_CONFIDENCE: f64 = 0.5;

/// Normalizes gene identifiers from different sources.
#[derive(Debug, Default)]
pub struct GeneNormalizer {
    cache: HashMap<String, NormalizedGene>,
}

impl GeneNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize the gene carried by a ClinVar variant record.
    ///
    /// Primary id is the symbol when present, else `NCBIGENE:<id>`.
    pub fn normalize_clinvar(&mut self, variant: &ClinVarVariant) -> Option<NormalizedGene> {
        let symbol = variant.gene_symbol.as_deref().map(str::trim).filter(|v| !v.is_empty());
        let gene_id = variant.gene_id.as_deref().map(str::trim).filter(|v| !v.is_empty());

        if symbol.is_none() && gene_id.is_none() {
            return None;
        }

        let (primary_id, id_type) = match symbol {
            Some(symbol) => (symbol.to_string(), GeneIdentifierType::Symbol),
            None => (
                format!("NCBIGENE:{}", gene_id.expect("gene id present")),
                GeneIdentifierType::NcbiGeneId,
            ),
        };

        let mut cross_references = CrossReferences::new();
        if let Some(id) = gene_id {
            cross_references.insert("NCBI".to_string(), vec![id.to_string()]);
        }
        if let Some(symbol) = symbol {
            cross_references.insert("SYMBOL".to_string(), vec![symbol.to_string()]);
        }

        let normalized = NormalizedGene {
            primary_id: primary_id.clone(),
            id_type,
            symbol: symbol.map(str::to_string),
            name: variant.gene_name.clone(),
            synonyms: Vec::new(),
            cross_references,
            source: "clinvar".to_string(),
            confidence_score: CLINVAR_CONFIDENCE,
        };

        self.cache.insert(primary_id, normalized.clone());
        Some(normalized)
    }

    /// Normalize a gene entry from a UniProt protein record.
    pub fn normalize_uniprot(
        &mut self,
        entry: &UniProtEntry,
        gene_index: usize,
    ) -> Option<NormalizedGene> {
        let gene = entry.genes.get(gene_index)?;
        let raw_symbol = gene
            .gene_name
            .as_ref()
            .map(|v| v.value.trim())
            .filter(|v| !v.is_empty())?;

        let symbol = Self::normalize_symbol(raw_symbol);
        let synonyms: Vec<String> = gene
            .synonyms
            .iter()
            .map(|v| v.value.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();

        let mut cross_references = CrossReferences::new();
        cross_references.insert("SYMBOL".to_string(), vec![raw_symbol.to_string()]);
        cross_references.insert(
            "UNIPROT".to_string(),
            vec![entry.primary_accession.clone()],
        );

        let normalized = NormalizedGene {
            primary_id: symbol.clone(),
            id_type: GeneIdentifierType::Symbol,
            symbol: Some(symbol.clone()),
            name: None,
            synonyms,
            cross_references,
            source: "uniprot".to_string(),
            confidence_score: UNIPROT_CONFIDENCE,
        };

        self.cache.insert(symbol, normalized.clone());
        Some(normalized)
    }

    /// Normalize gene data from a schema-loose record.
    pub fn normalize_generic(&mut self, raw: &RawRecord, source: &str) -> Option<NormalizedGene> {
        let symbol = raw_str(raw, "symbol").or_else(|| raw_str(raw, "name"));
        let gene_id = raw_str(raw, "id").or_else(|| raw_str(raw, "gene_id"));
        let name = raw_str(raw, "full_name").or_else(|| raw_str(raw, "description"));

        if symbol.is_none() && gene_id.is_none() {
            debug!(source, "generic gene record has neither symbol nor id");
            return None;
        }

        let (primary_id, id_type, symbol) = match symbol {
            Some(symbol) => {
                let normalized = Self::normalize_symbol(symbol);
                (normalized.clone(), GeneIdentifierType::Symbol, Some(normalized))
            }
            None => (
                gene_id.expect("gene id present").to_string(),
                GeneIdentifierType::Other,
                None,
            ),
        };

        let normalized = NormalizedGene {
            primary_id: primary_id.clone(),
            id_type,
            symbol,
            name: name.map(str::to_string),
            synonyms: raw_string_list(raw, "synonyms"),
            cross_references: CrossReferences::new(),
            source: source.to_string(),
            confidence_score: GENERIC_CONFIDENCE,
        };

        self.cache.insert(primary_id, normalized.clone());
        Some(normalized)
    }

    /// Uppercase, trimmed canonical symbol form.
    pub fn normalize_symbol(symbol: &str) -> String {
        symbol.trim().to_ascii_uppercase()
    }

    /// Merge multiple records for the same gene: highest-confidence record
    /// is the base, cross-references and synonyms are unioned, and the
    /// confidence gets a capped boost.
    pub fn merge(genes: &[NormalizedGene]) -> Result<NormalizedGene, HarvestError> {
        let base = genes
            .iter()
            .max_by(|a, b| {
                a.confidence_score
                    .partial_cmp(&b.confidence_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or_else(|| HarvestError::InvalidArgument("No genes to merge".into()))?;

        if genes.len() == 1 {
            return Ok(base.clone());
        }

        let mut merged = base.clone();
        for gene in genes {
            merge_cross_references(&mut merged.cross_references, &gene.cross_references);
            merge_synonyms(&mut merged.synonyms, &gene.synonyms);
        }
        merged.source = MERGED_SOURCE.to_string();
        merged.confidence_score = merged_confidence(base.confidence_score);
        Ok(merged)
    }

    /// Validation issues for a normalized gene. A non-conforming symbol
    /// fails validation but never fails normalization.
    pub fn validate(gene: &NormalizedGene) -> Vec<String> {
        let mut errors = Vec::new();
        if gene.primary_id.is_empty() {
            errors.push("Missing primary ID".to_string());
        }
        if gene.id_type == GeneIdentifierType::Symbol && gene.symbol.is_none() {
            errors.push("Symbol type gene missing symbol field".to_string());
        }
        if !(0.0..=1.0).contains(&gene.confidence_score) {
            errors.push("Confidence score out of range [0,1]".to_string());
        }
        if let Some(symbol) = gene.symbol.as_deref() {
            if !SYMBOL_PATTERN.is_match(symbol) {
                errors.push("Invalid gene symbol format".to_string());
            }
        }
        errors
    }

    /// Cached gene lookup by primary id.
    pub fn gene_by_id(&self, gene_id: &str) -> Option<&NormalizedGene> {
        self.cache.get(gene_id)
    }

    /// Cached gene lookup by (case-normalized) symbol.
    pub fn find_by_symbol(&self, symbol: &str) -> Option<&NormalizedGene> {
        self.cache.get(&Self::normalize_symbol(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::clinvar::{ClinicalSignificance, VariantType};
    use serde_json::json;

    fn clinvar_variant(symbol: Option<&str>, gene_id: Option<&str>) -> ClinVarVariant {
        ClinVarVariant {
            clinvar_id: "4282399".into(),
            variant_id: "702748".into(),
            variation_name: "NM_020822.3(KCNT1):c.335-5C>T".into(),
            variant_type: VariantType::SingleNucleotideVariant,
            clinical_significance: ClinicalSignificance::Pathogenic,
            gene_symbol: symbol.map(str::to_string),
            gene_id: gene_id.map(str::to_string),
            gene_name: Some("potassium channel subfamily T member 1".into()),
            chromosome: None,
            start_position: None,
            end_position: None,
            reference_allele: None,
            alternate_allele: None,
            phenotypes: Vec::new(),
            review_status: None,
            last_updated: None,
        }
    }

    #[test]
    fn clinvar_gene_uses_symbol_as_primary_id() {
        let mut normalizer = GeneNormalizer::new();
        let gene = normalizer
            .normalize_clinvar(&clinvar_variant(Some("KCNT1"), Some("57582")))
            .expect("normalized");

        assert_eq!(gene.primary_id, "KCNT1");
        assert_eq!(gene.id_type, GeneIdentifierType::Symbol);
        assert_eq!(gene.confidence_score, 0.9);
        assert_eq!(gene.cross_references["NCBI"], vec!["57582".to_string()]);
        assert_eq!(gene.source, "clinvar");
    }

    #[test]
    fn clinvar_gene_without_symbol_keys_on_ncbi_id() {
        let mut normalizer = GeneNormalizer::new();
        let gene = normalizer
            .normalize_clinvar(&clinvar_variant(None, Some("57582")))
            .expect("normalized");
        assert_eq!(gene.primary_id, "NCBIGENE:57582");
        assert_eq!(gene.id_type, GeneIdentifierType::NcbiGeneId);
    }

    #[test]
    fn clinvar_gene_without_identity_is_rejected() {
        let mut normalizer = GeneNormalizer::new();
        assert!(normalizer.normalize_clinvar(&clinvar_variant(None, None)).is_none());
    }

    #[test]
    fn uniprot_gene_symbol_is_uppercased() {
        let mut normalizer = GeneNormalizer::new();
        let raw = json!({
            "primaryAccession": "Q9UHV7",
            "genes": [{"geneName": {"value": "med13"}}],
        })
        .as_object()
        .expect("object literal")
        .clone();
        let mut parser = crate::parsers::UniProtParser::new();
        let entry = parser.parse_raw(&raw).expect("parsed entry");

        let gene = normalizer.normalize_uniprot(&entry, 0).expect("normalized");
        assert_eq!(gene.primary_id, "MED13");
        assert_eq!(gene.confidence_score, 0.8);
        assert_eq!(gene.cross_references["UNIPROT"], vec!["Q9UHV7".to_string()]);
    }

    #[test]
    fn generic_gene_gets_lower_confidence() {
        let mut normalizer = GeneNormalizer::new();
        let raw = json!({"symbol": "braf", "description": "proto-oncogene"})
            .as_object()
            .expect("object literal")
            .clone();
        let gene = normalizer.normalize_generic(&raw, "ensembl").expect("normalized");
        assert_eq!(gene.primary_id, "BRAF");
        assert_eq!(gene.confidence_score, 0.5);
        assert_eq!(gene.source, "ensembl");
    }

    #[test]
    fn merge_unions_refs_and_boosts_confidence() {
        let mut normalizer = GeneNormalizer::new();
        let clinvar_gene = normalizer
            .normalize_clinvar(&clinvar_variant(Some("KCNT1"), Some("57582")))
            .expect("normalized");
        let raw = json!({
            "primaryAccession": "Q5JUK3",
            "genes": [{"geneName": {"value": "KCNT1"}}],
        })
        .as_object()
        .expect("object literal")
        .clone();
        let mut parser = crate::parsers::UniProtParser::new();
        let entry = parser.parse_raw(&raw).expect("parsed entry");
        let uniprot_gene = normalizer.normalize_uniprot(&entry, 0).expect("normalized");

        let merged = GeneNormalizer::merge(&[clinvar_gene.clone(), uniprot_gene]).expect("merged");

        assert_eq!(merged.primary_id, "KCNT1");
        assert_eq!(merged.source, "merged");
        assert!((merged.confidence_score - 1.0).abs() < 1e-9);
        assert!(merged.cross_references.contains_key("NCBI"));
        assert!(merged.cross_references.contains_key("UNIPROT"));

        // The inputs are untouched.
        assert_eq!(clinvar_gene.source, "clinvar");
    }

    #[test]
    fn merge_of_single_gene_is_identity() {
        let mut normalizer = GeneNormalizer::new();
        let gene = normalizer
            .normalize_clinvar(&clinvar_variant(Some("KCNT1"), None))
            .expect("normalized");
        let merged = GeneNormalizer::merge(std::slice::from_ref(&gene)).expect("merged");
        assert_eq!(merged, gene);
    }

    #[test]
    fn merge_of_empty_list_is_an_error() {
        assert!(GeneNormalizer::merge(&[]).is_err());
    }

    #[test]
    fn validate_rejects_lowercase_symbols() {
        let gene = NormalizedGene {
            primary_id: "braf".into(),
            id_type: GeneIdentifierType::Symbol,
            symbol: Some("braf".into()),
            name: None,
            synonyms: Vec::new(),
            cross_references: CrossReferences::new(),
            source: "test".into(),
            confidence_score: 0.5,
        };
        let errors = GeneNormalizer::validate(&gene);
        assert!(errors.contains(&"Invalid gene symbol format".to_string()));
    }

    #[test]
    fn find_by_symbol_is_case_insensitive() {
        let mut normalizer = GeneNormalizer::new();
        let raw = json!({"symbol": "BRAF"})
            .as_object()
            .expect("object literal")
            .clone();
        normalizer.normalize_generic(&raw, "test");
        assert!(normalizer.find_by_symbol("braf").is_some());
        assert!(normalizer.find_by_symbol("TP53").is_none());
    }
}
