//! bioharvest: a biomedical data-harvesting engine.
//!
//! Acquires records from independent upstream sources (ClinVar, PubMed,
//! HPO, UniProt), transforms them into a normalized cross-referenced model
//! through a five-stage ETL pipeline, and packages the result as a
//! self-describing research object with provenance and license compliance.

pub mod cli;
pub mod entities;
pub mod error;
pub mod etl;
pub mod ingest;
pub mod job;
pub mod mappers;
pub mod normalize;
pub mod package;
pub mod parsers;
pub mod provenance;
pub mod sources;

pub use error::HarvestError;
