//! Job store: persistence contract plus an in-memory implementation.
//!
//! Mutating operations are read-modify-write under a single write lock;
//! a mutated job replaces the stored record wholesale.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::Serialize;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::HarvestError;

use super::{IngestionError, IngestionJob, IngestionStatus, IngestionTrigger, JobMetrics};

/// Aggregate counters over stored jobs.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatistics {
    pub total_jobs: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub trigger_counts: BTreeMap<String, usize>,
}

/// Persistence contract for ingestion jobs.
pub trait JobStore: Send + Sync {
    fn save(&self, job: IngestionJob) -> Result<IngestionJob, HarvestError>;
    fn find_by_id(&self, job_id: Uuid) -> Result<Option<IngestionJob>, HarvestError>;
    fn find_by_source(
        &self,
        source_id: Uuid,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<IngestionJob>, HarvestError>;
    fn find_by_status(
        &self,
        status: IngestionStatus,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<IngestionJob>, HarvestError>;
    fn find_by_trigger(
        &self,
        trigger: IngestionTrigger,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<IngestionJob>, HarvestError>;
    fn find_by_triggered_by(
        &self,
        user_id: Uuid,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<IngestionJob>, HarvestError>;
    fn find_running_jobs(&self, skip: usize, limit: usize)
    -> Result<Vec<IngestionJob>, HarvestError>;
    fn find_failed_jobs(
        &self,
        since: Option<OffsetDateTime>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<IngestionJob>, HarvestError>;
    fn find_recent_jobs(
        &self,
        hours_back: i64,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<IngestionJob>, HarvestError>;

    fn update_status(
        &self,
        job_id: Uuid,
        status: IngestionStatus,
    ) -> Result<Option<IngestionJob>, HarvestError>;
    fn update_metrics(
        &self,
        job_id: Uuid,
        metrics: JobMetrics,
    ) -> Result<Option<IngestionJob>, HarvestError>;
    fn add_error(
        &self,
        job_id: Uuid,
        error: IngestionError,
    ) -> Result<Option<IngestionJob>, HarvestError>;
    fn start_job(&self, job_id: Uuid) -> Result<Option<IngestionJob>, HarvestError>;
    fn complete_job(
        &self,
        job_id: Uuid,
        metrics: JobMetrics,
    ) -> Result<Option<IngestionJob>, HarvestError>;
    fn fail_job(
        &self,
        job_id: Uuid,
        error: IngestionError,
    ) -> Result<Option<IngestionJob>, HarvestError>;
    fn cancel_job(&self, job_id: Uuid) -> Result<Option<IngestionJob>, HarvestError>;

    fn delete(&self, job_id: Uuid) -> Result<bool, HarvestError>;
    fn delete_old_jobs(&self, days: i64) -> Result<usize, HarvestError>;

    fn count_by_source(&self, source_id: Uuid) -> Result<usize, HarvestError>;
    fn count_by_status(&self, status: IngestionStatus) -> Result<usize, HarvestError>;
    fn count_by_trigger(&self, trigger: IngestionTrigger) -> Result<usize, HarvestError>;
    fn exists(&self, job_id: Uuid) -> Result<bool, HarvestError>;

    fn job_statistics(&self, source_id: Option<Uuid>) -> Result<JobStatistics, HarvestError>;
    fn recent_failures(
        &self,
        limit: usize,
    ) -> Result<Vec<(IngestionJob, IngestionError)>, HarvestError>;
}

/// In-memory job store guarded by a single read-write lock.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, IngestionJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<Uuid, IngestionJob>>, HarvestError>
    {
        self.jobs
            .read()
            .map_err(|_| HarvestError::JobStore("job store lock poisoned".into()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<Uuid, IngestionJob>>, HarvestError> {
        self.jobs
            .write()
            .map_err(|_| HarvestError::JobStore("job store lock poisoned".into()))
    }

    /// Apply an immutable mutation to a stored job under the write lock.
    fn mutate<F>(&self, job_id: Uuid, mutation: F) -> Result<Option<IngestionJob>, HarvestError>
    where
        F: FnOnce(&IngestionJob) -> IngestionJob,
    {
        let mut jobs = self.write()?;
        let Some(current) = jobs.get(&job_id) else {
            return Ok(None);
        };
        let updated = mutation(current);
        jobs.insert(job_id, updated.clone());
        Ok(Some(updated))
    }

    /// Filtered listing ordered by `triggered_at` descending.
    fn select<F>(&self, predicate: F, skip: usize, limit: usize) -> Result<Vec<IngestionJob>, HarvestError>
    where
        F: Fn(&IngestionJob) -> bool,
    {
        let jobs = self.read()?;
        let mut selected: Vec<IngestionJob> = jobs.values().filter(|j| predicate(j)).cloned().collect();
        selected.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        Ok(selected.into_iter().skip(skip).take(limit).collect())
    }

    fn count<F>(&self, predicate: F) -> Result<usize, HarvestError>
    where
        F: Fn(&IngestionJob) -> bool,
    {
        Ok(self.read()?.values().filter(|j| predicate(j)).count())
    }
}

impl JobStore for MemoryJobStore {
    fn save(&self, job: IngestionJob) -> Result<IngestionJob, HarvestError> {
        self.write()?.insert(job.id, job.clone());
        Ok(job)
    }

    fn find_by_id(&self, job_id: Uuid) -> Result<Option<IngestionJob>, HarvestError> {
        Ok(self.read()?.get(&job_id).cloned())
    }

    fn find_by_source(
        &self,
        source_id: Uuid,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<IngestionJob>, HarvestError> {
        self.select(|j| j.source_id == source_id, skip, limit)
    }

    fn find_by_status(
        &self,
        status: IngestionStatus,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<IngestionJob>, HarvestError> {
        self.select(|j| j.status == status, skip, limit)
    }

    fn find_by_trigger(
        &self,
        trigger: IngestionTrigger,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<IngestionJob>, HarvestError> {
        self.select(|j| j.trigger == trigger, skip, limit)
    }

    fn find_by_triggered_by(
        &self,
        user_id: Uuid,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<IngestionJob>, HarvestError> {
        self.select(|j| j.triggered_by == Some(user_id), skip, limit)
    }

    fn find_running_jobs(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<IngestionJob>, HarvestError> {
        self.find_by_status(IngestionStatus::Running, skip, limit)
    }

    fn find_failed_jobs(
        &self,
        since: Option<OffsetDateTime>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<IngestionJob>, HarvestError> {
        self.select(
            |j| {
                j.status == IngestionStatus::Failed
                    && since.is_none_or(|threshold| j.triggered_at >= threshold)
            },
            skip,
            limit,
        )
    }

    fn find_recent_jobs(
        &self,
        hours_back: i64,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<IngestionJob>, HarvestError> {
        let threshold = OffsetDateTime::now_utc() - Duration::hours(hours_back);
        self.select(|j| j.triggered_at >= threshold, skip, limit)
    }

    fn update_status(
        &self,
        job_id: Uuid,
        status: IngestionStatus,
    ) -> Result<Option<IngestionJob>, HarvestError> {
        self.mutate(job_id, |job| {
            let mut next = job.clone();
            next.status = status;
            next
        })
    }

    fn update_metrics(
        &self,
        job_id: Uuid,
        metrics: JobMetrics,
    ) -> Result<Option<IngestionJob>, HarvestError> {
        self.mutate(job_id, |job| job.update_metrics(metrics))
    }

    fn add_error(
        &self,
        job_id: Uuid,
        error: IngestionError,
    ) -> Result<Option<IngestionJob>, HarvestError> {
        self.mutate(job_id, |job| job.add_error(error))
    }

    fn start_job(&self, job_id: Uuid) -> Result<Option<IngestionJob>, HarvestError> {
        self.mutate(job_id, IngestionJob::start_execution)
    }

    fn complete_job(
        &self,
        job_id: Uuid,
        metrics: JobMetrics,
    ) -> Result<Option<IngestionJob>, HarvestError> {
        self.mutate(job_id, |job| job.complete_successfully(metrics))
    }

    fn fail_job(
        &self,
        job_id: Uuid,
        error: IngestionError,
    ) -> Result<Option<IngestionJob>, HarvestError> {
        self.mutate(job_id, |job| job.fail(error))
    }

    fn cancel_job(&self, job_id: Uuid) -> Result<Option<IngestionJob>, HarvestError> {
        self.mutate(job_id, IngestionJob::cancel)
    }

    fn delete(&self, job_id: Uuid) -> Result<bool, HarvestError> {
        Ok(self.write()?.remove(&job_id).is_some())
    }

    fn delete_old_jobs(&self, days: i64) -> Result<usize, HarvestError> {
        let threshold = OffsetDateTime::now_utc() - Duration::days(days);
        let mut jobs = self.write()?;
        let before = jobs.len();
        jobs.retain(|_, job| job.triggered_at >= threshold);
        Ok(before - jobs.len())
    }

    fn count_by_source(&self, source_id: Uuid) -> Result<usize, HarvestError> {
        self.count(|j| j.source_id == source_id)
    }

    fn count_by_status(&self, status: IngestionStatus) -> Result<usize, HarvestError> {
        self.count(|j| j.status == status)
    }

    fn count_by_trigger(&self, trigger: IngestionTrigger) -> Result<usize, HarvestError> {
        self.count(|j| j.trigger == trigger)
    }

    fn exists(&self, job_id: Uuid) -> Result<bool, HarvestError> {
        Ok(self.read()?.contains_key(&job_id))
    }

    fn job_statistics(&self, source_id: Option<Uuid>) -> Result<JobStatistics, HarvestError> {
        let jobs = self.read()?;
        let matching: Vec<&IngestionJob> = jobs
            .values()
            .filter(|j| source_id.is_none_or(|id| j.source_id == id))
            .collect();

        let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
        for status in [
            IngestionStatus::Pending,
            IngestionStatus::Running,
            IngestionStatus::Completed,
            IngestionStatus::Failed,
            IngestionStatus::Cancelled,
            IngestionStatus::Partial,
        ] {
            status_counts.insert(
                status.as_str().to_string(),
                matching.iter().filter(|j| j.status == status).count(),
            );
        }

        let mut trigger_counts: BTreeMap<String, usize> = BTreeMap::new();
        for trigger in [
            IngestionTrigger::Manual,
            IngestionTrigger::Scheduled,
            IngestionTrigger::Api,
            IngestionTrigger::Webhook,
            IngestionTrigger::Retry,
        ] {
            trigger_counts.insert(
                trigger.as_str().to_string(),
                matching.iter().filter(|j| j.trigger == trigger).count(),
            );
        }

        Ok(JobStatistics {
            total_jobs: matching.len(),
            status_counts,
            trigger_counts,
        })
    }

    fn recent_failures(
        &self,
        limit: usize,
    ) -> Result<Vec<(IngestionJob, IngestionError)>, HarvestError> {
        let failed = self.find_by_status(IngestionStatus::Failed, 0, limit)?;
        Ok(failed
            .into_iter()
            .map(|job| {
                let primary_error = job
                    .errors
                    .last()
                    .cloned()
                    .unwrap_or_else(|| IngestionError::new("unknown", "No error recorded"));
                (job, primary_error)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::{DataSource, Provenance};

    fn job_for(source_id: Uuid, trigger: IngestionTrigger) -> IngestionJob {
        IngestionJob::new(
            source_id,
            trigger,
            Provenance::new(DataSource::ClinVar, "test"),
        )
    }

    #[test]
    fn save_and_find_round_trip() {
        let store = MemoryJobStore::new();
        let job = job_for(Uuid::new_v4(), IngestionTrigger::Manual);
        let saved = store.save(job.clone()).expect("saved");
        assert_eq!(saved.id, job.id);

        let found = store.find_by_id(job.id).expect("query").expect("present");
        assert_eq!(found, job);
        assert!(store.exists(job.id).expect("query"));
        assert!(
            store
                .find_by_id(Uuid::new_v4())
                .expect("query")
                .is_none()
        );
    }

    #[test]
    fn listings_are_ordered_by_triggered_at_descending() {
        let store = MemoryJobStore::new();
        let source_id = Uuid::new_v4();

        let mut older = job_for(source_id, IngestionTrigger::Manual);
        older.triggered_at = OffsetDateTime::now_utc() - Duration::hours(2);
        let newer = job_for(source_id, IngestionTrigger::Manual);

        store.save(older.clone()).expect("saved");
        store.save(newer.clone()).expect("saved");

        let listed = store.find_by_source(source_id, 0, 10).expect("query");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);

        // Pagination applies after ordering.
        let page = store.find_by_source(source_id, 1, 10).expect("query");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, older.id);
    }

    #[test]
    fn lifecycle_helpers_persist_replacements() {
        let store = MemoryJobStore::new();
        let job = store
            .save(job_for(Uuid::new_v4(), IngestionTrigger::Api))
            .expect("saved");

        let started = store.start_job(job.id).expect("query").expect("present");
        assert_eq!(started.status, IngestionStatus::Running);

        let metrics = JobMetrics {
            records_processed: 5,
            duration_seconds: Some(2.0),
            ..JobMetrics::default()
        };
        let completed = store
            .complete_job(job.id, metrics)
            .expect("query")
            .expect("present");
        assert_eq!(completed.status, IngestionStatus::Completed);
        assert_eq!(completed.metrics.records_per_second, Some(2.5));

        // The stored record was replaced, not merged.
        let fetched = store.find_by_id(job.id).expect("query").expect("present");
        assert_eq!(fetched, completed);
    }

    #[test]
    fn fail_and_recent_failures_expose_primary_error() {
        let store = MemoryJobStore::new();
        let job = store
            .save(job_for(Uuid::new_v4(), IngestionTrigger::Scheduled))
            .expect("saved");
        store.start_job(job.id).expect("query");
        store
            .add_error(job.id, IngestionError::new("timeout", "first"))
            .expect("query");
        store
            .fail_job(job.id, IngestionError::new("network_error", "second"))
            .expect("query");

        let failures = store.recent_failures(10).expect("query");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].1.error_type, "network_error");
        assert_eq!(failures[0].1.error_message, "second");
    }

    #[test]
    fn recent_failures_synthesizes_error_when_none_recorded() {
        let store = MemoryJobStore::new();
        let job = store
            .save(job_for(Uuid::new_v4(), IngestionTrigger::Manual))
            .expect("saved");
        store
            .update_status(job.id, IngestionStatus::Failed)
            .expect("query");

        let failures = store.recent_failures(10).expect("query");
        assert_eq!(failures[0].1.error_type, "unknown");
        assert_eq!(failures[0].1.error_message, "No error recorded");
    }

    #[test]
    fn delete_old_jobs_removes_by_trigger_age() {
        let store = MemoryJobStore::new();
        let mut old = job_for(Uuid::new_v4(), IngestionTrigger::Manual);
        old.triggered_at = OffsetDateTime::now_utc() - Duration::days(120);
        let fresh = job_for(Uuid::new_v4(), IngestionTrigger::Manual);

        store.save(old.clone()).expect("saved");
        store.save(fresh.clone()).expect("saved");

        let deleted = store.delete_old_jobs(90).expect("query");
        assert_eq!(deleted, 1);
        assert!(store.find_by_id(old.id).expect("query").is_none());
        assert!(store.find_by_id(fresh.id).expect("query").is_some());
    }

    #[test]
    fn counters_and_statistics_reflect_contents() {
        let store = MemoryJobStore::new();
        let source_a = Uuid::new_v4();
        let source_b = Uuid::new_v4();

        store
            .save(job_for(source_a, IngestionTrigger::Manual))
            .expect("saved");
        store
            .save(job_for(source_a, IngestionTrigger::Retry))
            .expect("saved");
        let failing = store
            .save(job_for(source_b, IngestionTrigger::Api))
            .expect("saved");
        store.start_job(failing.id).expect("query");
        store
            .fail_job(failing.id, IngestionError::new("timeout", "x"))
            .expect("query");

        assert_eq!(store.count_by_source(source_a).expect("query"), 2);
        assert_eq!(
            store
                .count_by_status(IngestionStatus::Failed)
                .expect("query"),
            1
        );
        assert_eq!(
            store
                .count_by_trigger(IngestionTrigger::Retry)
                .expect("query"),
            1
        );

        let all_stats = store.job_statistics(None).expect("query");
        assert_eq!(all_stats.total_jobs, 3);
        assert_eq!(all_stats.status_counts["failed"], 1);
        assert_eq!(all_stats.trigger_counts["manual"], 1);

        let scoped = store.job_statistics(Some(source_b)).expect("query");
        assert_eq!(scoped.total_jobs, 1);
    }

    #[test]
    fn find_failed_jobs_honors_since_filter() {
        let store = MemoryJobStore::new();
        let mut stale = job_for(Uuid::new_v4(), IngestionTrigger::Manual);
        stale.triggered_at = OffsetDateTime::now_utc() - Duration::days(10);
        stale.status = IngestionStatus::Failed;
        let recent = job_for(Uuid::new_v4(), IngestionTrigger::Manual);
        store.save(stale).expect("saved");
        store
            .save(recent.start_execution().fail(IngestionError::new("timeout", "x")))
            .expect("saved");

        let since = OffsetDateTime::now_utc() - Duration::days(1);
        let failures = store
            .find_failed_jobs(Some(since), 0, 10)
            .expect("query");
        assert_eq!(failures.len(), 1);

        let all = store.find_failed_jobs(None, 0, 10).expect("query");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn find_recent_jobs_windows_by_hours() {
        let store = MemoryJobStore::new();
        let mut old = job_for(Uuid::new_v4(), IngestionTrigger::Manual);
        old.triggered_at = OffsetDateTime::now_utc() - Duration::hours(48);
        store.save(old).expect("saved");
        store
            .save(job_for(Uuid::new_v4(), IngestionTrigger::Manual))
            .expect("saved");

        assert_eq!(store.find_recent_jobs(24, 0, 10).expect("query").len(), 1);
        assert_eq!(store.find_recent_jobs(72, 0, 10).expect("query").len(), 2);
    }

    #[test]
    fn delete_removes_single_job() {
        let store = MemoryJobStore::new();
        let job = store
            .save(job_for(Uuid::new_v4(), IngestionTrigger::Manual))
            .expect("saved");
        assert!(store.delete(job.id).expect("query"));
        assert!(!store.delete(job.id).expect("query"));
    }
}
