//! Ingestion job aggregate: identity, lifecycle, metrics, and errors.
//!
//! Jobs are immutable values. Every transition returns a new job; stores
//! persist the replacement wholesale.

pub mod store;

pub use store::{JobStatistics, JobStore, MemoryJobStore};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::provenance::Provenance;

/// Lifecycle states of an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Partial,
}

impl IngestionStatus {
    /// Terminal states are absorbing.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Partial
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Partial => "partial",
        }
    }
}

/// What triggered an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionTrigger {
    Manual,
    Scheduled,
    Api,
    Webhook,
    Retry,
}

impl IngestionTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
            Self::Api => "api",
            Self::Webhook => "webhook",
            Self::Retry => "retry",
        }
    }
}

/// Performance and result metrics for an ingestion job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetrics {
    pub records_processed: u64,
    pub records_failed: u64,
    pub records_skipped: u64,
    pub bytes_processed: u64,
    pub api_calls_made: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_per_second: Option<f64>,
}

impl JobMetrics {
    pub fn total_records(&self) -> u64 {
        self.records_processed + self.records_failed + self.records_skipped
    }

    /// Fraction of records processed successfully; zero when nothing ran.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_records();
        if total == 0 {
            0.0
        } else {
            self.records_processed as f64 / total as f64
        }
    }

    /// Derive the processing rate once a duration is known.
    pub fn calculate_rate(&mut self) {
        if let Some(duration) = self.duration_seconds.filter(|d| *d > 0.0) {
            self.records_per_second = Some(self.total_records() as f64 / duration);
        }
    }
}

/// Error types considered transient and worth retrying.
const RECOVERABLE_ERROR_TYPES: &[&str] = &[
    "timeout",
    "rate_limit",
    "temporary_failure",
    "network_error",
    "service_unavailable",
];

/// Error recorded against an ingestion job. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionError {
    pub error_type: String,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub error_details: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl IngestionError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            error_message: message.into(),
            error_details: BTreeMap::new(),
            record_id: None,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn with_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    /// Build from a crate error, classifying recoverability by error type.
    pub fn from_harvest_error(err: &crate::error::HarvestError) -> Self {
        Self::new(err.error_type(), err.to_string())
    }

    pub fn is_recoverable(&self) -> bool {
        RECOVERABLE_ERROR_TYPES.contains(&self.error_type.as_str())
    }
}

/// Immutable ingestion job aggregate.
///
/// Tracks the complete lifecycle of data acquisition from one source,
/// including metrics, errors, and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionJob {
    pub id: Uuid,
    pub source_id: Uuid,

    pub trigger: IngestionTrigger,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub triggered_at: OffsetDateTime,

    pub status: IngestionStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,

    pub metrics: JobMetrics,
    #[serde(default)]
    pub errors: Vec<IngestionError>,

    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub source_config_snapshot: BTreeMap<String, serde_json::Value>,
}

impl IngestionJob {
    /// Create a pending job.
    pub fn new(source_id: Uuid, trigger: IngestionTrigger, provenance: Provenance) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            trigger,
            triggered_by: None,
            triggered_at: OffsetDateTime::now_utc(),
            status: IngestionStatus::Pending,
            started_at: None,
            completed_at: None,
            metrics: JobMetrics::default(),
            errors: Vec::new(),
            provenance,
            metadata: BTreeMap::new(),
            source_config_snapshot: BTreeMap::new(),
        }
    }

    /// New job with execution started.
    pub fn start_execution(&self) -> Self {
        let mut next = self.clone();
        next.status = IngestionStatus::Running;
        next.started_at = Some(OffsetDateTime::now_utc());
        next
    }

    /// New job completed successfully with final metrics.
    pub fn complete_successfully(&self, metrics: JobMetrics) -> Self {
        let mut metrics = metrics;
        metrics.calculate_rate();
        let mut next = self.clone();
        next.status = IngestionStatus::Completed;
        next.completed_at = Some(OffsetDateTime::now_utc());
        next.metrics = metrics;
        next
    }

    /// New job marked failed with the error appended.
    pub fn fail(&self, error: IngestionError) -> Self {
        let mut next = self.clone();
        next.status = IngestionStatus::Failed;
        next.completed_at = Some(OffsetDateTime::now_utc());
        next.errors.push(error);
        next
    }

    /// New job marked partial: the run finished but some records failed.
    pub fn complete_partially(&self, metrics: JobMetrics) -> Self {
        let mut metrics = metrics;
        metrics.calculate_rate();
        let mut next = self.clone();
        next.status = IngestionStatus::Partial;
        next.completed_at = Some(OffsetDateTime::now_utc());
        next.metrics = metrics;
        next
    }

    /// New job marked cancelled.
    pub fn cancel(&self) -> Self {
        let mut next = self.clone();
        next.status = IngestionStatus::Cancelled;
        next.completed_at = Some(OffsetDateTime::now_utc());
        next
    }

    /// New job with the error appended. Never advances state.
    pub fn add_error(&self, error: IngestionError) -> Self {
        let mut next = self.clone();
        next.errors.push(error);
        next
    }

    /// New job with metrics replaced and the rate recomputed.
    pub fn update_metrics(&self, metrics: JobMetrics) -> Self {
        let mut metrics = metrics;
        metrics.calculate_rate();
        let mut next = self.clone();
        next.metrics = metrics;
        next
    }

    /// Retrying never mutates a job: build a fresh pending job that
    /// references this one through its metadata.
    pub fn create_retry(&self) -> Self {
        let mut retry = Self::new(self.source_id, IngestionTrigger::Retry, self.provenance.clone());
        retry.triggered_by = self.triggered_by;
        retry.source_config_snapshot = self.source_config_snapshot.clone();
        retry.metadata.insert(
            "retry_of".to_string(),
            serde_json::Value::String(self.id.to_string()),
        );
        retry
    }

    pub fn is_running(&self) -> bool {
        self.status == IngestionStatus::Running
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock duration, available once both endpoints are set.
    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some((completed - started).as_seconds_f64()),
            _ => None,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn success_rate(&self) -> f64 {
        self.metrics.success_rate()
    }

    /// Retry eligibility: failed or partial with at least one recoverable
    /// error on record.
    pub fn can_retry(&self) -> bool {
        matches!(
            self.status,
            IngestionStatus::Failed | IngestionStatus::Partial
        ) && self.errors.iter().any(IngestionError::is_recoverable)
    }
}

impl std::fmt::Display for IngestionJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "IngestionJob(id={}, source={}, status={}, records={})",
            self.id,
            self.source_id,
            self.status.as_str(),
            self.metrics.total_records()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::DataSource;

    fn pending_job() -> IngestionJob {
        IngestionJob::new(
            Uuid::new_v4(),
            IngestionTrigger::Manual,
            Provenance::new(DataSource::ClinVar, "test"),
        )
    }

    #[test]
    fn lifecycle_transitions_produce_new_values() {
        let job = pending_job();
        assert_eq!(job.status, IngestionStatus::Pending);

        let running = job.start_execution();
        assert_eq!(job.status, IngestionStatus::Pending);
        assert_eq!(running.status, IngestionStatus::Running);
        assert!(running.started_at.is_some());

        let completed = running.complete_successfully(JobMetrics {
            records_processed: 10,
            ..JobMetrics::default()
        });
        assert_eq!(running.status, IngestionStatus::Running);
        assert_eq!(completed.status, IngestionStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert!(completed.is_completed());
    }

    #[test]
    fn duration_requires_both_endpoints() {
        let job = pending_job();
        assert!(job.duration_seconds().is_none());

        let finished = job.start_execution().cancel();
        let duration = finished.duration_seconds().expect("duration");
        assert!(duration >= 0.0);
    }

    #[test]
    fn fail_appends_error_and_freezes_completion() {
        let job = pending_job().start_execution();
        let failed = job.fail(IngestionError::new("timeout", "request timed out"));

        assert_eq!(failed.status, IngestionStatus::Failed);
        assert_eq!(failed.errors.len(), 1);
        assert!(failed.completed_at.is_some());
        assert!(job.errors.is_empty());
    }

    #[test]
    fn add_error_never_advances_state() {
        let job = pending_job();
        let with_error = job.add_error(IngestionError::new("parse_error", "bad record"));
        assert_eq!(with_error.status, IngestionStatus::Pending);
        assert_eq!(with_error.errors.len(), 1);
    }

    #[test]
    fn metrics_total_and_success_rate_are_consistent() {
        let metrics = JobMetrics {
            records_processed: 8,
            records_failed: 1,
            records_skipped: 1,
            ..JobMetrics::default()
        };
        assert_eq!(metrics.total_records(), 10);
        assert!((metrics.success_rate() - 0.8).abs() < 1e-9);

        let empty = JobMetrics::default();
        assert_eq!(empty.success_rate(), 0.0);
    }

    #[test]
    fn rate_derived_only_with_positive_duration() {
        let mut metrics = JobMetrics {
            records_processed: 100,
            duration_seconds: Some(4.0),
            ..JobMetrics::default()
        };
        metrics.calculate_rate();
        assert_eq!(metrics.records_per_second, Some(25.0));

        let mut zero = JobMetrics {
            records_processed: 100,
            duration_seconds: Some(0.0),
            ..JobMetrics::default()
        };
        zero.calculate_rate();
        assert!(zero.records_per_second.is_none());
    }

    #[test]
    fn can_retry_requires_recoverable_error() {
        let failed_recoverable = pending_job()
            .start_execution()
            .fail(IngestionError::new("timeout", "timed out"));
        assert!(failed_recoverable.can_retry());

        let failed_permanent = pending_job()
            .start_execution()
            .fail(IngestionError::new("parse_error", "bad xml"));
        assert!(!failed_permanent.can_retry());

        let completed = pending_job()
            .start_execution()
            .complete_successfully(JobMetrics::default());
        assert!(!completed.can_retry());
    }

    #[test]
    fn recoverable_error_taxonomy() {
        for error_type in [
            "timeout",
            "rate_limit",
            "temporary_failure",
            "network_error",
            "service_unavailable",
        ] {
            assert!(IngestionError::new(error_type, "x").is_recoverable());
        }
        assert!(!IngestionError::new("validation_error", "x").is_recoverable());
    }

    #[test]
    fn create_retry_references_previous_job() {
        let failed = pending_job()
            .start_execution()
            .fail(IngestionError::new("timeout", "slow upstream"));
        let retry = failed.create_retry();

        assert_ne!(retry.id, failed.id);
        assert_eq!(retry.source_id, failed.source_id);
        assert_eq!(retry.status, IngestionStatus::Pending);
        assert_eq!(retry.trigger, IngestionTrigger::Retry);
        assert_eq!(
            retry.metadata.get("retry_of"),
            Some(&serde_json::Value::String(failed.id.to_string()))
        );
        // The failed job is untouched.
        assert_eq!(failed.status, IngestionStatus::Failed);
    }

    #[test]
    fn job_round_trips_through_json() {
        let job = pending_job()
            .start_execution()
            .add_error(IngestionError::new("timeout", "slow upstream"));
        let encoded = serde_json::to_string(&job).expect("serialize");
        let decoded: IngestionJob = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(decoded, job);
    }
}
