//! Relationship mappers: canonical entities to cross-referenced links.
//!
//! Links live in per-mapper arenas indexed by integer; forward maps from
//! entity id to link indices provide both traversal directions without
//! embedding entity pointers inside links.

pub mod cross_reference;
pub mod gene_variant;
pub mod variant_phenotype;

pub use cross_reference::CrossReferenceMapper;
pub use gene_variant::{GeneVariantLink, GeneVariantMapper, GeneVariantRelationship};
pub use variant_phenotype::{
    EvidenceData, RelationshipStatistics, VariantPhenotypeLink, VariantPhenotypeMapper,
    VariantPhenotypeRelationship,
};
