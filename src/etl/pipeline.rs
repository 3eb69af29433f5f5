//! Pipeline orchestrator: runs the five stages in order with progress
//! reporting, configurable validation, and metrics collection.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::HarvestError;

use super::bundle::{
    ExportReport, MappedBundle, NormalizedBundle, ParsedBundle, ValidationSummary,
};
use super::metrics::MetricsTracker;
use super::stages::{
    ExportStageRunner, MappingStageRunner, NormalizationStageRunner, ParsingStageRunner,
    RawSourceData, ValidationStageRunner,
};
use super::StageResult;

/// Execution modes for the transformation pipeline.
///
/// `Parallel` and `Incremental` are recognized but currently alias
/// `Sequential`; the fallback is logged and preserves the same contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    Sequential,
    Parallel,
    Incremental,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Incremental => "incremental",
        }
    }
}

/// Best-effort progress callback: `(message, percent_complete)`.
pub type ProgressCallback = Arc<dyn Fn(&str, f64) + Send + Sync>;

/// Configuration for a pipeline run.
#[derive(Clone)]
pub struct PipelineConfig {
    pub mode: PipelineMode,
    pub max_concurrent_sources: usize,
    pub batch_size: usize,
    pub enable_validation: bool,
    pub enable_metrics: bool,
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::Sequential,
            max_concurrent_sources: 2,
            batch_size: 1000,
            enable_validation: true,
            enable_metrics: true,
            progress_callback: None,
        }
    }
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("mode", &self.mode)
            .field("max_concurrent_sources", &self.max_concurrent_sources)
            .field("batch_size", &self.batch_size)
            .field("enable_validation", &self.enable_validation)
            .field("enable_metrics", &self.enable_metrics)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

/// Final artifact bundles from a pipeline run, handed to downstream
/// consumers (packaging) as an immutable snapshot.
#[derive(Debug, Default)]
pub struct PipelineArtifacts {
    pub parsed: ParsedBundle,
    pub normalized: NormalizedBundle,
    pub mapped: MappedBundle,
    pub validation: Option<ValidationSummary>,
    pub export: ExportReport,
}

/// Result of a pipeline execution.
#[derive(Debug)]
pub struct PipelineResult {
    pub success: bool,
    pub artifacts: PipelineArtifacts,
    pub stage_results: BTreeMap<String, StageResult>,
    pub metrics_summary: serde_json::Value,
    pub errors: Vec<String>,
    pub execution_time_seconds: f64,
}

impl PipelineResult {
    pub fn stages_completed(&self) -> Vec<String> {
        self.stage_results.keys().cloned().collect()
    }
}

/// Orchestrates the complete transformation pipeline.
pub struct TransformationPipeline {
    config: PipelineConfig,
    output_dir: PathBuf,
    tracker: MetricsTracker,
}

impl TransformationPipeline {
    pub fn new(config: PipelineConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            output_dir: output_dir.into(),
            tracker: MetricsTracker::new(),
        }
    }

    /// Configuration issues that would prevent a run.
    pub fn validate_config(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.config.max_concurrent_sources < 1 {
            errors.push("max_concurrent_sources must be >= 1".to_string());
        }
        if self.config.batch_size < 1 {
            errors.push("batch_size must be >= 1".to_string());
        }
        if let Err(err) = std::fs::create_dir_all(&self.output_dir) {
            errors.push(format!("Cannot create output directory: {err}"));
        }
        errors
    }

    /// Execute the pipeline over raw source data.
    pub async fn execute(&mut self, raw_data: &RawSourceData) -> PipelineResult {
        let start = Instant::now();
        info!(mode = self.config.mode.as_str(), "starting transformation pipeline");

        match self.config.mode {
            PipelineMode::Sequential => {}
            PipelineMode::Parallel => {
                warn!("parallel mode not yet implemented, falling back to sequential");
            }
            PipelineMode::Incremental => {
                warn!("incremental mode not yet implemented, falling back to sequential");
            }
        }

        let result = self.execute_sequential(raw_data, start).await;
        info!(
            execution_time_seconds = result.execution_time_seconds,
            errors = result.errors.len(),
            "pipeline completed"
        );
        result
    }

    async fn execute_sequential(
        &mut self,
        raw_data: &RawSourceData,
        start: Instant,
    ) -> PipelineResult {
        let mut stage_results: BTreeMap<String, StageResult> = BTreeMap::new();
        let mut all_errors: Vec<String> = Vec::new();

        let total_input: usize = raw_data.values().map(Vec::len).sum();
        self.tracker.set_total_input_records(total_input);

        self.report_progress("Parsing raw records", 0.0);
        let mut parsing = ParsingStageRunner::new();
        let (parsed, parse_result) = parsing.run(raw_data);
        all_errors.extend(parse_result.errors.iter().cloned());
        stage_results.insert(parse_result.stage.as_str().to_string(), parse_result);

        self.report_progress("Normalizing entities", 20.0);
        let mut normalization = NormalizationStageRunner::new();
        let (normalized, normalize_result) = normalization.run(&parsed);
        all_errors.extend(normalize_result.errors.iter().cloned());
        stage_results.insert(
            normalize_result.stage.as_str().to_string(),
            normalize_result,
        );

        self.report_progress("Mapping relationships", 40.0);
        let (mapped, map_result) = MappingStageRunner::new().run(&normalized);
        all_errors.extend(map_result.errors.iter().cloned());
        stage_results.insert(map_result.stage.as_str().to_string(), map_result);

        let validation = if self.config.enable_validation {
            self.report_progress("Validating mappings", 60.0);
            let (summary, validate_result) = ValidationStageRunner::new().run(&mapped);
            all_errors.extend(validate_result.errors.iter().cloned());
            stage_results.insert(validate_result.stage.as_str().to_string(), validate_result);
            Some(summary)
        } else {
            None
        };

        // Yield between the CPU stages and the exporter's file I/O.
        tokio::task::yield_now().await;

        self.report_progress("Exporting artifacts", 80.0);
        let export_runner = ExportStageRunner::new(&self.output_dir);
        let (export, export_result) = export_runner.run(&normalized, &mapped);
        let export_failed = !export.errors.is_empty();
        all_errors.extend(export_result.errors.iter().cloned());
        stage_results.insert(export_result.stage.as_str().to_string(), export_result);

        let execution_time = start.elapsed().as_secs_f64();
        if self.config.enable_metrics {
            self.tracker.update(
                &parsed,
                &normalized,
                &mapped,
                validation.as_ref(),
                execution_time,
                &stage_results,
            );
        }

        self.report_progress("Transformation completed", 100.0);

        PipelineResult {
            success: !export_failed,
            artifacts: PipelineArtifacts {
                parsed,
                normalized,
                mapped,
                validation,
                export,
            },
            stage_results,
            metrics_summary: self.tracker.summary(),
            errors: all_errors,
            execution_time_seconds: execution_time,
        }
    }

    /// Invoke the progress callback, swallowing panics. Progress is a
    /// side channel and never participates in correctness.
    fn report_progress(&self, message: &str, percent: f64) {
        info!(percent, "{message}");
        if let Some(callback) = self.config.progress_callback.as_ref() {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(message, percent)));
            if outcome.is_err() {
                warn!("progress callback panicked; continuing");
            }
        }
    }

    /// Export the collected metrics as JSON, optionally writing to a file.
    pub fn export_metrics(&self, filepath: Option<&std::path::Path>) -> Result<String, HarvestError> {
        let payload = serde_json::to_string_pretty(&serde_json::json!({
            "pipeline_config": {
                "mode": self.config.mode.as_str(),
                "max_concurrent_sources": self.config.max_concurrent_sources,
                "batch_size": self.config.batch_size,
                "enable_validation": self.config.enable_validation,
                "enable_metrics": self.config.enable_metrics,
            },
            "metrics": self.tracker.summary(),
        }))?;
        if let Some(path) = filepath {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &payload)?;
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etl::TransformationStatus;
    use serde_json::json;
    use std::sync::Mutex;

    fn raw(value: serde_json::Value) -> crate::parsers::RawRecord {
        value.as_object().expect("object literal").clone()
    }

    fn sample_raw_data() -> RawSourceData {
        let mut data = RawSourceData::new();
        data.insert(
            "hpo".into(),
            vec![raw(json!({
                "hpo_id": "HP:0001249",
                "name": "Intellectual disability",
            }))],
        );
        data.insert(
            "uniprot".into(),
            vec![raw(json!({
                "primaryAccession": "Q9UHV7",
                "uniProtkbId": "MED13_HUMAN",
                "proteinDescription": {"recommendedName": {"fullName": {"value": "Mediator subunit 13"}}},
                "genes": [{"geneName": {"value": "MED13"}}],
                "organism": {"scientificName": "Homo sapiens"},
                "sequence": {"length": 2174},
            }))],
        );
        data
    }

    #[tokio::test]
    async fn sequential_run_completes_all_stages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut pipeline = TransformationPipeline::new(PipelineConfig::default(), dir.path());

        let result = pipeline.execute(&sample_raw_data()).await;
        assert!(result.success);
        let stages = result.stages_completed();
        for stage in ["parsing", "normalization", "mapping", "validation", "export"] {
            assert!(stages.contains(&stage.to_string()), "missing stage {stage}");
        }
        assert_eq!(result.metrics_summary["total_input_records"], 2);
    }

    #[tokio::test]
    async fn validation_stage_can_be_disabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = PipelineConfig {
            enable_validation: false,
            ..PipelineConfig::default()
        };
        let mut pipeline = TransformationPipeline::new(config, dir.path());

        let result = pipeline.execute(&sample_raw_data()).await;
        assert!(result.success);
        assert!(!result.stage_results.contains_key("validation"));
        assert!(result.artifacts.validation.is_none());
    }

    #[tokio::test]
    async fn parallel_mode_falls_back_to_sequential() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = PipelineConfig {
            mode: PipelineMode::Parallel,
            ..PipelineConfig::default()
        };
        let mut pipeline = TransformationPipeline::new(config, dir.path());

        let result = pipeline.execute(&sample_raw_data()).await;
        assert!(result.success);
        assert_eq!(result.stage_results.len(), 5);
    }

    #[tokio::test]
    async fn progress_callback_receives_terminal_update() {
        let dir = tempfile::tempdir().expect("tempdir");
        let seen: Arc<Mutex<Vec<(String, f64)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let config = PipelineConfig {
            progress_callback: Some(Arc::new(move |message, percent| {
                sink.lock().expect("lock").push((message.to_string(), percent));
            })),
            ..PipelineConfig::default()
        };
        let mut pipeline = TransformationPipeline::new(config, dir.path());
        pipeline.execute(&sample_raw_data()).await;

        let updates = seen.lock().expect("lock");
        assert!(updates.iter().any(|(_, p)| *p == 0.0));
        assert!(updates.iter().any(|(_, p)| *p == 100.0));
    }

    #[tokio::test]
    async fn panicking_progress_callback_is_swallowed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = PipelineConfig {
            progress_callback: Some(Arc::new(|_, _| panic!("misbehaving callback"))),
            ..PipelineConfig::default()
        };
        let mut pipeline = TransformationPipeline::new(config, dir.path());
        let result = pipeline.execute(&sample_raw_data()).await;
        assert!(result.success);
    }

    #[test]
    fn validate_config_flags_zero_bounds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = PipelineConfig {
            max_concurrent_sources: 0,
            batch_size: 0,
            ..PipelineConfig::default()
        };
        let pipeline = TransformationPipeline::new(config, dir.path());
        let errors = pipeline.validate_config();
        assert!(errors.contains(&"max_concurrent_sources must be >= 1".to_string()));
        assert!(errors.contains(&"batch_size must be >= 1".to_string()));
    }

    #[tokio::test]
    async fn export_metrics_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut pipeline = TransformationPipeline::new(PipelineConfig::default(), dir.path());
        pipeline.execute(&sample_raw_data()).await;

        let metrics_path = dir.path().join("metrics/run.json");
        let payload = pipeline
            .export_metrics(Some(&metrics_path))
            .expect("metrics");
        assert!(metrics_path.exists());
        let parsed: serde_json::Value = serde_json::from_str(&payload).expect("json");
        assert_eq!(parsed["pipeline_config"]["mode"], "sequential");
    }

    #[tokio::test]
    async fn unknown_source_marks_parse_stage_partial_but_run_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut pipeline = TransformationPipeline::new(PipelineConfig::default(), dir.path());
        let mut data = sample_raw_data();
        data.insert("dbsnp".into(), vec![raw(json!({"id": "rs1"}))]);

        let result = pipeline.execute(&data).await;
        assert!(result.success);
        assert_eq!(
            result.stage_results["parsing"].status,
            TransformationStatus::Partial
        );
        assert!(
            result
                .errors
                .contains(&"No parser available for source: dbsnp".to_string())
        );
    }
}
