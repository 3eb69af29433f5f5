//! Canonical entity model produced by the normalization stage.
//!
//! Every entity carries its primary identifier, a typed identifier class,
//! a cross-reference map, the source tag it came from, and a confidence
//! score in `[0, 1]`.

pub mod gene;
pub mod phenotype;
pub mod publication;
pub mod variant;

pub use gene::{GeneIdentifierType, NormalizedGene};
pub use phenotype::{NormalizedPhenotype, PhenotypeIdentifierType};
pub use publication::{NormalizedPublication, PublicationIdentifierType};
pub use variant::{GenomicLocation, NormalizedVariant, VariantIdentifierType};

use std::collections::BTreeMap;

/// Cross-reference map: reference namespace -> identifiers.
pub type CrossReferences = BTreeMap<String, Vec<String>>;

/// Merge `extra` into `base`, de-duplicating identifiers per namespace while
/// preserving first-seen order.
pub fn merge_cross_references(base: &mut CrossReferences, extra: &CrossReferences) {
    for (ref_type, ids) in extra {
        let slot = base.entry(ref_type.clone()).or_default();
        for id in ids {
            if !slot.contains(id) {
                slot.push(id.clone());
            }
        }
    }
}

/// Union two synonym lists without duplicates, preserving order.
pub fn merge_synonyms(base: &mut Vec<String>, extra: &[String]) {
    for synonym in extra {
        if !base.contains(synonym) {
            base.push(synonym.clone());
        }
    }
}
