//! ETL engine: five-stage transformation over typed artifact bundles.
//!
//! `ParsedBundle -> NormalizedBundle -> MappedBundle -> ValidationSummary
//! -> ExportReport`, each stage appending a [`StageResult`].

pub mod bundle;
pub mod metrics;
pub mod pipeline;
pub mod stages;

pub use bundle::{ExportReport, MappedBundle, NormalizedBundle, ParsedBundle, ValidationSummary};
pub use metrics::{EtlMetrics, MetricsTracker};
pub use pipeline::{
    PipelineArtifacts, PipelineConfig, PipelineMode, PipelineResult, TransformationPipeline,
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Stages of the transformation pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformationStage {
    Parsing,
    Normalization,
    Mapping,
    Validation,
    Export,
}

impl TransformationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsing => "parsing",
            Self::Normalization => "normalization",
            Self::Mapping => "mapping",
            Self::Validation => "validation",
            Self::Export => "export",
        }
    }
}

/// Outcome status of a stage run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Partial,
}

impl TransformationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Partial => "partial",
        }
    }
}

/// Result of one stage run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: TransformationStage,
    pub status: TransformationStatus,
    pub records_processed: usize,
    pub records_failed: usize,
    /// Compact summary of the stage's artifact, for reporting.
    pub data_snapshot: serde_json::Value,
    pub errors: Vec<String>,
    pub duration_seconds: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl StageResult {
    pub(crate) fn new(
        stage: TransformationStage,
        status: TransformationStatus,
        records_processed: usize,
        records_failed: usize,
        data_snapshot: serde_json::Value,
        errors: Vec<String>,
        duration_seconds: f64,
    ) -> Self {
        Self {
            stage,
            status,
            records_processed,
            records_failed,
            data_snapshot,
            errors,
            duration_seconds,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}
