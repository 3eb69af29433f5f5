//! Ingestion: per-source workers driven by a bounded-concurrency
//! coordinator.

pub mod coordinator;
pub mod workers;

pub use coordinator::{
    CoordinatorProgress, CoordinatorResult, IngestionCoordinator, IngestionPhase, IngestionTask,
};
pub use workers::{ClinVarWorker, HpoWorker, PubMedWorker, SourceWorker, UniProtWorker};

use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;

use crate::job::{IngestionError, IngestionStatus};
use crate::parsers::RawRecord;
use crate::provenance::Provenance;

/// Parameters handed to a source worker. Task-level values override the
/// coordinator's global values on merge.
#[derive(Debug, Clone, Default)]
pub struct IngestParams {
    pub gene_symbol: Option<String>,
    pub query: Option<String>,
    pub max_records: Option<usize>,
    pub timeout: Option<Duration>,
}

impl IngestParams {
    pub fn for_gene(gene_symbol: impl Into<String>) -> Self {
        Self {
            gene_symbol: Some(gene_symbol.into()),
            ..Self::default()
        }
    }

    pub fn for_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    /// Merge task parameters over global parameters.
    pub fn merged(global: &Self, task: &Self) -> Self {
        Self {
            gene_symbol: task.gene_symbol.clone().or_else(|| global.gene_symbol.clone()),
            query: task.query.clone().or_else(|| global.query.clone()),
            max_records: task.max_records.or(global.max_records),
            timeout: task.timeout.or(global.timeout),
        }
    }

    pub fn effective_max_records(&self) -> usize {
        self.max_records.unwrap_or(25)
    }
}

/// Outcome of one worker run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    pub source: String,
    pub status: IngestionStatus,
    pub records_processed: u64,
    pub records_failed: u64,
    #[serde(skip)]
    pub data: Vec<RawRecord>,
    pub provenance: Provenance,
    pub errors: Vec<IngestionError>,
    pub duration_seconds: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl IngestionResult {
    pub fn is_completed(&self) -> bool {
        self.status == IngestionStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_prefers_task_values() {
        let global = IngestParams {
            gene_symbol: Some("MED13".into()),
            query: Some("MED13".into()),
            max_records: Some(100),
            timeout: Some(Duration::from_secs(30)),
        };
        let task = IngestParams {
            query: Some("MED13L".into()),
            ..IngestParams::default()
        };

        let merged = IngestParams::merged(&global, &task);
        assert_eq!(merged.gene_symbol.as_deref(), Some("MED13"));
        assert_eq!(merged.query.as_deref(), Some("MED13L"));
        assert_eq!(merged.max_records, Some(100));
        assert_eq!(merged.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn effective_max_records_defaults() {
        assert_eq!(IngestParams::default().effective_max_records(), 25);
        assert_eq!(
            IngestParams {
                max_records: Some(7),
                ..IngestParams::default()
            }
            .effective_max_records(),
            7
        );
    }
}
