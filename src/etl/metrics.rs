//! Transformation metrics accumulation.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;

use super::bundle::{MappedBundle, NormalizedBundle, ParsedBundle, ValidationSummary};
use super::StageResult;

/// Per-stage metric snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StageMetric {
    pub status: String,
    pub records_processed: usize,
    pub records_failed: usize,
    pub errors: Vec<String>,
    pub duration_seconds: f64,
}

/// Metrics collected during one ETL run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EtlMetrics {
    pub total_input_records: usize,
    pub parsed_records: usize,
    pub normalized_records: usize,
    pub mapped_relationships: usize,
    pub validation_errors: usize,
    pub processing_time_seconds: f64,
    pub stage_metrics: BTreeMap<String, StageMetric>,
}

/// Accumulates per-run ETL metrics across the stage sequence.
#[derive(Debug, Default)]
pub struct MetricsTracker {
    metrics: EtlMetrics,
    stage_results: BTreeMap<String, StageResult>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the number of raw records observed for this run.
    pub fn set_total_input_records(&mut self, total: usize) {
        self.metrics.total_input_records = total;
    }

    /// Refresh aggregate metrics after the stage sequence completes.
    pub fn update(
        &mut self,
        parsed: &ParsedBundle,
        normalized: &NormalizedBundle,
        mapped: &MappedBundle,
        validation: Option<&ValidationSummary>,
        total_time_seconds: f64,
        stage_results: &BTreeMap<String, StageResult>,
    ) {
        self.metrics.processing_time_seconds = total_time_seconds;
        self.metrics.parsed_records = parsed.total_records();
        self.metrics.normalized_records = normalized.total_records();
        self.metrics.mapped_relationships = mapped.relationship_count();
        self.metrics.validation_errors = validation.map(|v| v.failed).unwrap_or(0);
        self.metrics.stage_metrics = stage_results
            .iter()
            .map(|(stage, result)| {
                (
                    stage.clone(),
                    StageMetric {
                        status: result.status.as_str().to_string(),
                        records_processed: result.records_processed,
                        records_failed: result.records_failed,
                        errors: result.errors.clone(),
                        duration_seconds: result.duration_seconds,
                    },
                )
            })
            .collect();
        self.stage_results = stage_results.clone();
    }

    pub fn metrics(&self) -> &EtlMetrics {
        &self.metrics
    }

    /// Concise summary of the collected metrics.
    pub fn summary(&self) -> serde_json::Value {
        let stage_durations: BTreeMap<&String, f64> = self
            .stage_results
            .iter()
            .map(|(stage, result)| (stage, result.duration_seconds))
            .collect();
        json!({
            "total_input_records": self.metrics.total_input_records,
            "parsed_records": self.metrics.parsed_records,
            "normalized_records": self.metrics.normalized_records,
            "mapped_relationships": self.metrics.mapped_relationships,
            "validation_errors": self.metrics.validation_errors,
            "processing_time_seconds": self.metrics.processing_time_seconds,
            "stage_durations": stage_durations,
        })
    }
}
