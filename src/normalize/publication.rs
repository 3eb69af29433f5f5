//! Publication identifier normalization.
//!
//! Detects the strongest identifier on a publication (pubmed-numeric, then
//! DOI, then PMC) and standardizes metadata for cross-referencing.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::entities::{
    CrossReferences, NormalizedPublication, PublicationIdentifierType, merge_cross_references,
};
use crate::error::HarvestError;
use crate::parsers::pubmed::PubMedPublication;
use crate::parsers::uniprot::UniProtReference;
use crate::parsers::{RawRecord, raw_str, raw_string_list};

use super::{MERGED_SOURCE, merged_confidence};

static PUBMED_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("valid regex"));
static DOI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^10\.\d{4,9}/[-._;()/:A-Z0-9]+$").expect("valid regex")
});
static PMC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^PMC\d+$").expect("valid regex"));

const PUBMED_CONFIDENCE: f64 = 0.9;
const UNIPROT_CONFIDENCE: f64 = 0.8;
const GENERIC_CONFIDENCE: f64 = 0.6;

/// Normalizes publication identifiers from different sources.
#[derive(Debug, Default)]
pub struct PublicationNormalizer {
    cache: HashMap<String, NormalizedPublication>,
}

impl PublicationNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a parsed PubMed publication record.
    pub fn normalize_pubmed(
        &mut self,
        publication: &PubMedPublication,
    ) -> Option<NormalizedPublication> {
        let pubmed_id = publication.pubmed_id.trim();
        if pubmed_id.is_empty() {
            return None;
        }

        let authors: Vec<String> = publication
            .authors
            .iter()
            .filter_map(|author| {
                let last = author.last_name.as_deref()?.trim();
                if last.is_empty() {
                    return None;
                }
                match author.first_name.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                    Some(first) => Some(format!("{last}, {first}")),
                    None => Some(last.to_string()),
                }
            })
            .collect();

        let publication_date = publication.publication_date.map(|date| {
            format!(
                "{:04}-{:02}-{:02}",
                date.year(),
                u8::from(date.month()),
                date.day()
            )
        });

        let mut cross_references = CrossReferences::new();
        cross_references.insert("PUBMED".to_string(), vec![pubmed_id.to_string()]);
        if let Some(doi) = publication.doi.as_deref() {
            cross_references.insert("DOI".to_string(), vec![doi.to_string()]);
        }
        if let Some(pmc) = publication.pmc_id.as_deref() {
            cross_references.insert("PMC".to_string(), vec![pmc.to_string()]);
        }

        let normalized = NormalizedPublication {
            primary_id: pubmed_id.to_string(),
            id_type: PublicationIdentifierType::PubmedId,
            title: Some(publication.title.clone()).filter(|t| !t.is_empty()),
            authors,
            journal: publication
                .journal
                .as_ref()
                .and_then(|j| j.title.clone()),
            publication_date,
            doi: publication.doi.clone(),
            pmc_id: publication.pmc_id.clone(),
            pubmed_id: Some(pubmed_id.to_string()),
            cross_references,
            source: "pubmed".to_string(),
            confidence_score: PUBMED_CONFIDENCE,
        };

        self.cache.insert(pubmed_id.to_string(), normalized.clone());
        Some(normalized)
    }

    /// Normalize a literature reference carried on a UniProt entry.
    pub fn normalize_uniprot(
        &mut self,
        reference: &UniProtReference,
    ) -> Option<NormalizedPublication> {
        let citation = reference.citation.as_ref()?;
        let title = citation.title.as_deref().map(str::trim).filter(|v| !v.is_empty())?;

        let normalized = NormalizedPublication {
            primary_id: title.to_string(),
            id_type: PublicationIdentifierType::Other,
            title: Some(title.to_string()),
            authors: citation.authors.clone(),
            journal: None,
            publication_date: citation.publication_date.clone(),
            doi: None,
            pmc_id: None,
            pubmed_id: None,
            cross_references: CrossReferences::new(),
            source: "uniprot".to_string(),
            confidence_score: UNIPROT_CONFIDENCE,
        };

        self.cache.insert(title.to_string(), normalized.clone());
        Some(normalized)
    }

    /// Normalize publication data from a schema-loose record.
    pub fn normalize_generic(
        &mut self,
        raw: &RawRecord,
        source: &str,
    ) -> Option<NormalizedPublication> {
        let identifier = raw_str(raw, "id")
            .or_else(|| raw_str(raw, "pubmed_id"))
            .or_else(|| raw_str(raw, "doi"))
            .or_else(|| raw_str(raw, "pmc_id"))?;

        let id_type = Self::identify_type(identifier);
        let normalized = NormalizedPublication {
            primary_id: identifier.to_string(),
            id_type,
            title: raw_str(raw, "title").map(str::to_string),
            authors: raw_string_list(raw, "authors"),
            journal: raw_str(raw, "journal").map(str::to_string),
            publication_date: raw_str(raw, "publication_date").map(str::to_string),
            doi: raw_str(raw, "doi").map(str::to_string),
            pmc_id: raw_str(raw, "pmc_id").map(str::to_string),
            pubmed_id: (id_type == PublicationIdentifierType::PubmedId)
                .then(|| identifier.to_string()),
            cross_references: CrossReferences::new(),
            source: source.to_string(),
            confidence_score: GENERIC_CONFIDENCE,
        };

        self.cache.insert(identifier.to_string(), normalized.clone());
        Some(normalized)
    }

    /// Detect the identifier class, in precedence order: pubmed-numeric,
    /// DOI, PMC, otherwise OTHER.
    pub fn identify_type(identifier: &str) -> PublicationIdentifierType {
        if PUBMED_ID.is_match(identifier) {
            PublicationIdentifierType::PubmedId
        } else if DOI.is_match(identifier) {
            PublicationIdentifierType::Doi
        } else if PMC_ID.is_match(identifier) {
            PublicationIdentifierType::PmcId
        } else {
            PublicationIdentifierType::Other
        }
    }

    /// Merge multiple records for the same publication.
    pub fn merge(
        publications: &[NormalizedPublication],
    ) -> Result<NormalizedPublication, HarvestError> {
        let base = publications
            .iter()
            .max_by(|a, b| {
                a.confidence_score
                    .partial_cmp(&b.confidence_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or_else(|| HarvestError::InvalidArgument("No publications to merge".into()))?;

        if publications.len() == 1 {
            return Ok(base.clone());
        }

        let mut merged = base.clone();
        for publication in publications {
            merge_cross_references(&mut merged.cross_references, &publication.cross_references);
            if merged.doi.is_none() {
                merged.doi = publication.doi.clone();
            }
            if merged.pmc_id.is_none() {
                merged.pmc_id = publication.pmc_id.clone();
            }
            if merged.pubmed_id.is_none() {
                merged.pubmed_id = publication.pubmed_id.clone();
            }
        }
        merged.source = MERGED_SOURCE.to_string();
        merged.confidence_score = merged_confidence(base.confidence_score);
        Ok(merged)
    }

    /// Validation issues for a normalized publication.
    pub fn validate(publication: &NormalizedPublication) -> Vec<String> {
        let mut errors = Vec::new();
        if publication.primary_id.is_empty() {
            errors.push("Missing primary ID".to_string());
        }
        if let Some(doi) = publication.doi.as_deref() {
            if !DOI.is_match(doi) {
                errors.push(format!("Invalid DOI format: {doi}"));
            }
        }
        if let Some(pmc_id) = publication.pmc_id.as_deref() {
            if !PMC_ID.is_match(pmc_id) {
                errors.push(format!("Invalid PMC ID format: {pmc_id}"));
            }
        }
        if !(0.0..=1.0).contains(&publication.confidence_score) {
            errors.push("Confidence score out of range [0,1]".to_string());
        }
        errors
    }

    /// Cached publication lookup by primary id.
    pub fn publication_by_id(&self, publication_id: &str) -> Option<&NormalizedPublication> {
        self.cache.get(publication_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::pubmed::{PubMedAuthor, PubMedJournal};
    use crate::parsers::uniprot::UniProtCitation;
    use serde_json::json;
    use time::{Date, Month};

    fn pubmed_publication() -> PubMedPublication {
        PubMedPublication {
            pubmed_id: "29740699".into(),
            title: "MED13 variants".into(),
            abstract_text: None,
            authors: vec![
                PubMedAuthor {
                    last_name: Some("Snijders Blok".into()),
                    first_name: Some("Lot".into()),
                    initials: Some("LS".into()),
                    affiliation: None,
                },
                PubMedAuthor {
                    last_name: None,
                    first_name: Some("Orphan".into()),
                    initials: None,
                    affiliation: None,
                },
            ],
            journal: Some(PubMedJournal {
                title: Some("Human Mutation".into()),
                iso_abbreviation: None,
                issn: None,
                volume: None,
                issue: None,
                pages: None,
            }),
            publication_date: Date::from_calendar_date(2018, Month::August, 15).ok(),
            publication_types: Vec::new(),
            keywords: Vec::new(),
            doi: Some("10.1002/humu.23541".into()),
            pmc_id: Some("PMC6175425".into()),
            language: None,
            country: None,
        }
    }

    #[test]
    fn pubmed_publication_normalizes_authors_and_date() {
        let mut normalizer = PublicationNormalizer::new();
        let publication = normalizer
            .normalize_pubmed(&pubmed_publication())
            .expect("normalized");

        assert_eq!(publication.primary_id, "29740699");
        assert_eq!(publication.id_type, PublicationIdentifierType::PubmedId);
        assert_eq!(publication.authors, vec!["Snijders Blok, Lot".to_string()]);
        assert_eq!(publication.publication_date.as_deref(), Some("2018-08-15"));
        assert_eq!(publication.confidence_score, 0.9);
        assert_eq!(
            publication.cross_references["DOI"],
            vec!["10.1002/humu.23541".to_string()]
        );
    }

    #[test]
    fn uniprot_reference_keys_on_title() {
        let mut normalizer = PublicationNormalizer::new();
        let reference = UniProtReference {
            citation: Some(UniProtCitation {
                title: Some("The status of the gene catalogue.".into()),
                authors: vec!["Amaral P".into()],
                publication_date: Some("2023".into()),
            }),
        };

        let publication = normalizer.normalize_uniprot(&reference).expect("normalized");
        assert_eq!(publication.primary_id, "The status of the gene catalogue.");
        assert_eq!(publication.id_type, PublicationIdentifierType::Other);
        assert_eq!(publication.confidence_score, 0.8);
    }

    #[test]
    fn untitled_uniprot_reference_is_rejected() {
        let mut normalizer = PublicationNormalizer::new();
        assert!(
            normalizer
                .normalize_uniprot(&UniProtReference { citation: None })
                .is_none()
        );
    }

    #[test]
    fn identify_type_detection_order() {
        assert_eq!(
            PublicationNormalizer::identify_type("29740699"),
            PublicationIdentifierType::PubmedId
        );
        assert_eq!(
            PublicationNormalizer::identify_type("10.1002/humu.23541"),
            PublicationIdentifierType::Doi
        );
        assert_eq!(
            PublicationNormalizer::identify_type("PMC6175425"),
            PublicationIdentifierType::PmcId
        );
        assert_eq!(
            PublicationNormalizer::identify_type("isbn:978-3"),
            PublicationIdentifierType::Other
        );
    }

    #[test]
    fn generic_record_detects_identifier() {
        let mut normalizer = PublicationNormalizer::new();
        let raw = json!({"id": "10.1038/nature12373", "title": "A paper"})
            .as_object()
            .expect("object literal")
            .clone();
        let publication = normalizer.normalize_generic(&raw, "crossref").expect("normalized");
        assert_eq!(publication.id_type, PublicationIdentifierType::Doi);
        assert_eq!(publication.confidence_score, 0.6);
    }

    #[test]
    fn validate_rejects_malformed_doi_and_pmc() {
        let mut normalizer = PublicationNormalizer::new();
        let mut publication = normalizer
            .normalize_pubmed(&pubmed_publication())
            .expect("normalized");
        assert!(PublicationNormalizer::validate(&publication).is_empty());

        publication.doi = Some("doi-not-valid".into());
        publication.pmc_id = Some("pmc-6175425".into());
        let errors = PublicationNormalizer::validate(&publication);
        assert!(errors.iter().any(|e| e.contains("Invalid DOI format")));
        assert!(errors.iter().any(|e| e.contains("Invalid PMC ID format")));
    }

    #[test]
    fn merge_fills_missing_identifiers_from_weaker_records() {
        let mut normalizer = PublicationNormalizer::new();
        let pubmed = normalizer
            .normalize_pubmed(&pubmed_publication())
            .expect("normalized");

        let raw = json!({"id": "29740699", "pmc_id": "PMC6175425"})
            .as_object()
            .expect("object literal")
            .clone();
        let mut generic = normalizer.normalize_generic(&raw, "europepmc").expect("normalized");
        generic.doi = None;

        let merged = PublicationNormalizer::merge(&[generic, pubmed]).expect("merged");
        assert_eq!(merged.source, "merged");
        assert_eq!(merged.doi.as_deref(), Some("10.1002/humu.23541"));
        assert!((merged.confidence_score - 1.0).abs() < 1e-9);
    }
}
