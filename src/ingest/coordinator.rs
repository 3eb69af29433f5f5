//! Ingestion coordinator: drives per-source workers under bounded
//! concurrency and aggregates their outcomes.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde_json::json;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::error::HarvestError;
use crate::job::{IngestionError, IngestionStatus};
use crate::provenance::{DataSource, Provenance};

use super::workers::{
    ACQUIRED_BY, ClinVarWorker, HpoWorker, PubMedWorker, SourceWorker, UniProtWorker,
};
use super::{IngestParams, IngestionResult};

/// Phases of a coordinated ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionPhase {
    Initializing,
    Ingesting,
    Processing,
    Completed,
    Failed,
}

/// One ingestion task: a source, its worker, parameters, and priority.
/// Lower priority values run first within a concurrency window.
#[derive(Clone)]
pub struct IngestionTask {
    pub source: String,
    pub worker: Arc<dyn SourceWorker>,
    pub parameters: IngestParams,
    pub priority: i32,
}

/// Aggregated outcome of a coordinated run.
#[derive(Debug, Clone)]
pub struct CoordinatorResult {
    pub total_sources: usize,
    pub completed_sources: usize,
    pub failed_sources: usize,
    pub total_records: u64,
    pub total_errors: usize,
    pub duration_seconds: f64,
    pub source_results: HashMap<String, IngestionResult>,
    pub start_time: OffsetDateTime,
    pub end_time: OffsetDateTime,
    pub phase: IngestionPhase,
}

/// Progress callback: `(source, phase, percent_complete)`.
pub type CoordinatorProgress = Arc<dyn Fn(&str, IngestionPhase, f64) + Send + Sync>;

/// Coordinates parallel ingestion across multiple biomedical sources.
pub struct IngestionCoordinator {
    max_concurrent_workers: usize,
    enable_parallel: bool,
    progress_callback: Option<CoordinatorProgress>,
    workers: HashMap<String, Arc<dyn SourceWorker>>,
}

const DEFAULT_GENE_SYMBOL: &str = "MED13";

impl IngestionCoordinator {
    pub fn new(max_concurrent_workers: usize, enable_parallel: bool) -> Self {
        Self {
            max_concurrent_workers: max_concurrent_workers.max(1),
            enable_parallel,
            progress_callback: None,
            workers: HashMap::new(),
        }
    }

    pub fn with_progress_callback(mut self, callback: CoordinatorProgress) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Register a worker for task construction by source name. Built-in
    /// workers are registered by [`Self::register_builtin_workers`]; tests
    /// register their own.
    pub fn register_worker(&mut self, worker: Arc<dyn SourceWorker>) {
        self.workers.insert(worker.source().to_string(), worker);
    }

    /// Register the four built-in source workers.
    pub fn register_builtin_workers(&mut self) -> Result<(), HarvestError> {
        self.register_worker(Arc::new(ClinVarWorker::new()?));
        self.register_worker(Arc::new(PubMedWorker::new()?));
        self.register_worker(Arc::new(HpoWorker::new()?));
        self.register_worker(Arc::new(UniProtWorker::new()?));
        Ok(())
    }

    /// Coordinate ingestion across the given tasks.
    pub async fn coordinate(
        &self,
        tasks: Vec<IngestionTask>,
        global_params: &IngestParams,
    ) -> CoordinatorResult {
        let start_time = OffsetDateTime::now_utc();
        let started = std::time::Instant::now();
        self.report_progress("all", IngestionPhase::Initializing, 0.0);

        let total_tasks = tasks.len();
        let outcome = self.run_tasks(tasks, global_params).await;

        match outcome {
            Ok(results) => {
                let result = aggregate_results(results, start_time, started.elapsed());
                self.report_progress("all", IngestionPhase::Completed, 100.0);
                result
            }
            Err(err) => {
                error!("ingestion coordination failed: {err}");
                CoordinatorResult {
                    total_sources: total_tasks,
                    completed_sources: 0,
                    failed_sources: total_tasks,
                    total_records: 0,
                    total_errors: 1,
                    duration_seconds: started.elapsed().as_secs_f64(),
                    source_results: HashMap::new(),
                    start_time,
                    end_time: OffsetDateTime::now_utc(),
                    phase: IngestionPhase::Failed,
                }
            }
        }
    }

    async fn run_tasks(
        &self,
        mut tasks: Vec<IngestionTask>,
        global_params: &IngestParams,
    ) -> Result<Vec<IngestionResult>, HarvestError> {
        // Stable sort keeps submission order within equal priorities.
        tasks.sort_by_key(|task| task.priority);

        if self.enable_parallel {
            self.execute_parallel(tasks, global_params).await
        } else {
            self.execute_sequential(tasks, global_params).await
        }
    }

    /// Parallel execution bounded by a semaphore. Results are appended in
    /// completion order, not submission order.
    async fn execute_parallel(
        &self,
        tasks: Vec<IngestionTask>,
        global_params: &IngestParams,
    ) -> Result<Vec<IngestionResult>, HarvestError> {
        let total = tasks.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_workers));
        let mut in_flight = FuturesUnordered::new();

        for task in tasks {
            let semaphore = Arc::clone(&semaphore);
            in_flight.push(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|_| {
                    HarvestError::Api {
                        api: "coordinator".to_string(),
                        message: "worker semaphore closed".to_string(),
                    }
                })?;
                Ok::<IngestionResult, HarvestError>(
                    self.execute_single_task(&task, global_params).await,
                )
            });
        }

        let mut results = Vec::with_capacity(total);
        while let Some(outcome) = in_flight.next().await {
            results.push(outcome?);
            let progress = results.len() as f64 / total.max(1) as f64 * 100.0;
            self.report_progress("all", IngestionPhase::Ingesting, progress);
        }
        Ok(results)
    }

    /// Strict priority-order execution.
    async fn execute_sequential(
        &self,
        tasks: Vec<IngestionTask>,
        global_params: &IngestParams,
    ) -> Result<Vec<IngestionResult>, HarvestError> {
        let total = tasks.len();
        let mut results = Vec::with_capacity(total);
        for (index, task) in tasks.iter().enumerate() {
            results.push(self.execute_single_task(task, global_params).await);
            let progress = (index + 1) as f64 / total.max(1) as f64 * 100.0;
            self.report_progress("all", IngestionPhase::Ingesting, progress);
        }
        Ok(results)
    }

    /// Run one task. A worker failure never propagates; it becomes a
    /// synthetic FAILED result carrying the error.
    async fn execute_single_task(
        &self,
        task: &IngestionTask,
        global_params: &IngestParams,
    ) -> IngestionResult {
        info!(source = %task.source, "starting ingestion");
        let merged = IngestParams::merged(global_params, &task.parameters);
        let started = std::time::Instant::now();

        let outcome = match merged.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, task.worker.ingest(&merged)).await
            {
                Ok(result) => result,
                Err(_) => Err(HarvestError::Timeout {
                    api: task.source.clone(),
                }),
            },
            None => task.worker.ingest(&merged).await,
        };

        match outcome {
            Ok(result) => {
                info!(
                    source = %task.source,
                    records_processed = result.records_processed,
                    records_failed = result.records_failed,
                    "completed ingestion"
                );
                result
            }
            Err(err) => {
                warn!(source = %task.source, "ingestion failed: {err}");
                failed_result(&task.source, &err, started.elapsed())
            }
        }
    }

    /// Convenience: coordinate the canonical task set for all built-in
    /// sources focused on one gene.
    pub async fn ingest_all(
        &self,
        gene_symbol: &str,
        global_params: &IngestParams,
    ) -> CoordinatorResult {
        let tasks = ["clinvar", "pubmed", "hpo", "uniprot"]
            .iter()
            .filter_map(|source| self.canonical_task(source, gene_symbol))
            .collect();
        self.coordinate(tasks, global_params).await
    }

    /// Convenience: only the critical sources (ClinVar and UniProt).
    pub async fn ingest_critical_sources_only(
        &self,
        gene_symbol: &str,
        global_params: &IngestParams,
    ) -> CoordinatorResult {
        let tasks = ["clinvar", "uniprot"]
            .iter()
            .filter_map(|source| self.canonical_task(source, gene_symbol))
            .collect();
        self.coordinate(tasks, global_params).await
    }

    /// Retry only the sources whose previous status is FAILED. With no
    /// failures the previous result is returned unchanged.
    pub async fn retry_failed(
        &self,
        previous_result: &CoordinatorResult,
        retry_params: &IngestParams,
    ) -> CoordinatorResult {
        let failed_sources: Vec<&String> = previous_result
            .source_results
            .iter()
            .filter(|(_, result)| result.status == IngestionStatus::Failed)
            .map(|(source, _)| source)
            .collect();

        if failed_sources.is_empty() {
            return previous_result.clone();
        }

        info!(count = failed_sources.len(), "retrying failed sources");
        let gene_symbol = retry_params
            .gene_symbol
            .as_deref()
            .or(retry_params.query.as_deref())
            .unwrap_or(DEFAULT_GENE_SYMBOL)
            .to_string();

        let retry_tasks: Vec<IngestionTask> = failed_sources
            .into_iter()
            .filter_map(|source| self.canonical_task(source, &gene_symbol))
            .collect();
        self.coordinate(retry_tasks, retry_params).await
    }

    /// Canonical task shape for a built-in source, when its worker is
    /// registered.
    fn canonical_task(&self, source: &str, gene_symbol: &str) -> Option<IngestionTask> {
        let worker = self.workers.get(source)?.clone();
        let (parameters, priority) = match source {
            "clinvar" => (IngestParams::for_gene(gene_symbol), 1),
            "pubmed" => (IngestParams::for_query(gene_symbol), 2),
            "hpo" => (IngestParams::default(), 3),
            "uniprot" => (IngestParams::for_query(gene_symbol), 1),
            _ => (IngestParams::default(), 5),
        };
        Some(IngestionTask {
            source: source.to_string(),
            worker,
            parameters,
            priority,
        })
    }

    /// Summary of a coordinated run, including per-source details.
    pub fn summary(result: &CoordinatorResult) -> serde_json::Value {
        let success_rate = if result.total_sources > 0 {
            result.completed_sources as f64 / result.total_sources as f64 * 100.0
        } else {
            0.0
        };
        let records_per_second = if result.duration_seconds > 0.0 {
            result.total_records as f64 / result.duration_seconds
        } else {
            0.0
        };

        let mut source_details = serde_json::Map::new();
        for (source, source_result) in &result.source_results {
            source_details.insert(
                source.clone(),
                json!({
                    "status": source_result.status.as_str(),
                    "records_processed": source_result.records_processed,
                    "records_failed": source_result.records_failed,
                    "errors_count": source_result.errors.len(),
                    "duration_seconds": source_result.duration_seconds,
                }),
            );
        }

        json!({
            "total_sources": result.total_sources,
            "completed_sources": result.completed_sources,
            "failed_sources": result.failed_sources,
            "success_rate": success_rate,
            "total_records": result.total_records,
            "total_errors": result.total_errors,
            "duration_seconds": result.duration_seconds,
            "records_per_second": records_per_second,
            "source_details": source_details,
        })
    }

    fn report_progress(&self, source: &str, phase: IngestionPhase, progress: f64) {
        if let Some(callback) = self.progress_callback.as_ref() {
            callback(source, phase, progress);
        }
    }
}

/// Synthetic FAILED result for a worker that raised.
fn failed_result(
    source: &str,
    err: &HarvestError,
    elapsed: std::time::Duration,
) -> IngestionResult {
    let data_source = DataSource::parse(source).unwrap_or(DataSource::Manual);
    let mut provenance = Provenance::new(data_source, ACQUIRED_BY);
    provenance.processing_steps = vec![format!("Failed ingestion: {err}")];
    provenance.validation_status = "failed".to_string();
    provenance.quality_score = Some(0.0);

    IngestionResult {
        source: source.to_string(),
        status: IngestionStatus::Failed,
        records_processed: 0,
        records_failed: 1,
        data: Vec::new(),
        provenance,
        errors: vec![IngestionError::from_harvest_error(err)],
        duration_seconds: elapsed.as_secs_f64(),
        timestamp: OffsetDateTime::now_utc(),
    }
}

fn aggregate_results(
    results: Vec<IngestionResult>,
    start_time: OffsetDateTime,
    elapsed: std::time::Duration,
) -> CoordinatorResult {
    let total_sources = results.len();
    let completed_sources = results.iter().filter(|r| r.is_completed()).count();
    let failed_sources = total_sources - completed_sources;
    let total_records = results.iter().map(|r| r.records_processed).sum();
    let total_errors = results.iter().map(|r| r.errors.len()).sum();

    let source_results = results
        .into_iter()
        .map(|result| (result.source.clone(), result))
        .collect();

    CoordinatorResult {
        total_sources,
        completed_sources,
        failed_sources,
        total_records,
        total_errors,
        duration_seconds: elapsed.as_secs_f64(),
        source_results,
        start_time,
        end_time: OffsetDateTime::now_utc(),
        phase: IngestionPhase::Completed,
    }
}
