//! Top-level CLI parsing and command execution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::HarvestError;
use crate::etl::{PipelineConfig, PipelineMode, TransformationPipeline};
use crate::ingest::{CoordinatorResult, IngestParams, IngestionCoordinator};
use crate::job::{IngestionJob, IngestionTrigger, JobMetrics, JobStore, MemoryJobStore};
use crate::package::{
    DataFileSpec, LicenseValidator, PackageStorage, ProvenanceTracker, RoCrateBuilder,
    RoCrateValidator, generate_manifest, source_license_info,
};
use crate::parsers::RawRecord;
use crate::provenance::Provenance;

pub mod health;

#[derive(Parser, Debug)]
#[command(
    name = "bioharvest",
    about = "Harvest biomedical records from ClinVar, PubMed, HPO, and UniProt into a normalized, FAIR-packaged research object",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON instead of text
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest from the built-in sources, transform, and export
    Ingest {
        /// Gene symbol to focus the harvest on
        #[arg(short, long, default_value = "MED13")]
        gene: String,
        /// Output directory for transformed artifacts
        #[arg(short, long, default_value = "data/transformed")]
        output: PathBuf,
        /// Maximum records per source
        #[arg(long, default_value = "25")]
        max_records: usize,
        /// Per-source timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Maximum concurrent source workers
        #[arg(long, default_value = "4")]
        max_workers: usize,
        /// Run source workers one at a time in priority order
        #[arg(long)]
        sequential: bool,
        /// Ingest only the critical sources (ClinVar, UniProt)
        #[arg(long)]
        critical_only: bool,
        /// Skip the mapping validation stage
        #[arg(long)]
        skip_validation: bool,
        /// Package the exported artifacts as an RO-Crate
        #[arg(long)]
        package: bool,
        /// Package name (with --package)
        #[arg(long, default_value = "bioharvest-dataset")]
        package_name: String,
        /// Package version (with --package)
        #[arg(long, default_value = "1.0.0")]
        package_version: String,
        /// Package license (with --package)
        #[arg(long, default_value = "CC-BY-4.0")]
        package_license: String,
        /// Storage base for archived packages (with --package)
        #[arg(long)]
        storage: Option<PathBuf>,
        /// Also produce a ZIP archive (with --package)
        #[arg(long)]
        zip: bool,
    },
    /// Transform previously harvested raw records from a JSON file
    Transform {
        /// JSON file mapping source names to lists of raw records
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory for transformed artifacts
        #[arg(short, long, default_value = "data/transformed")]
        output: PathBuf,
        /// Pipeline mode (sequential, parallel, incremental)
        #[arg(long, default_value = "sequential")]
        mode: String,
        /// Skip the mapping validation stage
        #[arg(long)]
        skip_validation: bool,
    },
    /// Build an RO-Crate package from a directory of data files
    Package {
        /// Directory containing data files to package
        #[arg(short, long)]
        input: PathBuf,
        /// Crate output directory
        #[arg(short, long)]
        output: PathBuf,
        /// Package name
        #[arg(long, default_value = "bioharvest-dataset")]
        name: String,
        /// Package version
        #[arg(long, default_value = "1.0.0")]
        version: String,
        /// Package license
        #[arg(long, default_value = "CC-BY-4.0")]
        license: String,
        /// Storage base for archived packages
        #[arg(long)]
        storage: Option<PathBuf>,
        /// Also produce a ZIP archive
        #[arg(long)]
        zip: bool,
    },
    /// Validate an on-disk RO-Crate or license manifest
    Validate {
        /// Path to a crate directory
        #[arg(long)]
        crate_path: Option<PathBuf>,
        /// Path to a license manifest file
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Include the FAIR compliance summary
        #[arg(long)]
        fair: bool,
    },
    /// Check upstream source connectivity
    Health,
}

/// Parse arguments and execute the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let json_output = cli.json;

    match cli.command {
        Commands::Ingest {
            gene,
            output,
            max_records,
            timeout,
            max_workers,
            sequential,
            critical_only,
            skip_validation,
            package,
            package_name,
            package_version,
            package_license,
            storage,
            zip,
        } => {
            run_ingest(IngestOptions {
                gene,
                output,
                max_records,
                timeout: timeout.map(Duration::from_secs),
                max_workers,
                sequential,
                critical_only,
                skip_validation,
                package: package.then_some(PackageOptions {
                    name: package_name,
                    version: package_version,
                    license: package_license,
                    storage,
                    zip,
                }),
                json_output,
            })
            .await?;
        }
        Commands::Transform {
            input,
            output,
            mode,
            skip_validation,
        } => {
            run_transform(&input, &output, &mode, skip_validation, json_output).await?;
        }
        Commands::Package {
            input,
            output,
            name,
            version,
            license,
            storage,
            zip,
        } => {
            run_package(
                &input,
                &output,
                &PackageOptions {
                    name,
                    version,
                    license,
                    storage,
                    zip,
                },
                &[],
                json_output,
            )?;
        }
        Commands::Validate {
            crate_path,
            manifest,
            fair,
        } => {
            run_validate(crate_path.as_deref(), manifest.as_deref(), fair, json_output)?;
        }
        Commands::Health => {
            let report = health::check().await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.to_markdown());
            }
            if !report.all_healthy() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

struct PackageOptions {
    name: String,
    version: String,
    license: String,
    storage: Option<PathBuf>,
    zip: bool,
}

struct IngestOptions {
    gene: String,
    output: PathBuf,
    max_records: usize,
    timeout: Option<Duration>,
    max_workers: usize,
    sequential: bool,
    critical_only: bool,
    skip_validation: bool,
    package: Option<PackageOptions>,
    json_output: bool,
}

async fn run_ingest(options: IngestOptions) -> anyhow::Result<()> {
    let mut coordinator = IngestionCoordinator::new(options.max_workers, !options.sequential);
    coordinator.register_builtin_workers()?;

    let global_params = IngestParams {
        max_records: Some(options.max_records),
        timeout: options.timeout,
        ..IngestParams::default()
    };

    let result = if options.critical_only {
        coordinator
            .ingest_critical_sources_only(&options.gene, &global_params)
            .await
    } else {
        coordinator.ingest_all(&options.gene, &global_params).await
    };

    let job_store = MemoryJobStore::new();
    record_jobs(&job_store, &result)?;

    let summary = IngestionCoordinator::summary(&result);
    if options.json_output {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Ingested {} records from {}/{} sources ({} errors)",
            result.total_records,
            result.completed_sources,
            result.total_sources,
            result.total_errors
        );
    }

    // Feed the ETL pipeline with whatever the workers brought back.
    let mut raw_data: BTreeMap<String, Vec<RawRecord>> = BTreeMap::new();
    for (source, source_result) in &result.source_results {
        raw_data.insert(source.clone(), source_result.data.clone());
    }

    let config = PipelineConfig {
        enable_validation: !options.skip_validation,
        ..PipelineConfig::default()
    };
    let mut pipeline = TransformationPipeline::new(config, &options.output);
    let config_errors = pipeline.validate_config();
    if !config_errors.is_empty() {
        return Err(HarvestError::InvalidArgument(config_errors.join("; ")).into());
    }

    let pipeline_result = pipeline.execute(&raw_data).await;
    if options.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&pipeline_result.metrics_summary)?
        );
    } else {
        println!(
            "Transformed {} entities, {} relationships in {:.2}s",
            pipeline_result.metrics_summary["normalized_records"],
            pipeline_result.metrics_summary["mapped_relationships"],
            pipeline_result.execution_time_seconds
        );
    }

    if let Some(package_options) = options.package {
        let provenance_records: Vec<Provenance> = result
            .source_results
            .values()
            .map(|r| r.provenance.clone())
            .collect();
        run_package(
            &options.output,
            &options.output.join("package"),
            &package_options,
            &provenance_records,
            options.json_output,
        )?;
    }

    if !pipeline_result.success {
        std::process::exit(1);
    }
    Ok(())
}

/// Persist one job per source outcome into the store.
fn record_jobs(store: &MemoryJobStore, result: &CoordinatorResult) -> Result<(), HarvestError> {
    for source_result in result.source_results.values() {
        let job = IngestionJob::new(
            Uuid::new_v4(),
            IngestionTrigger::Manual,
            source_result.provenance.clone(),
        );
        let job = store.save(job)?;
        store.start_job(job.id)?;

        let metrics = JobMetrics {
            records_processed: source_result.records_processed,
            records_failed: source_result.records_failed,
            duration_seconds: Some(source_result.duration_seconds),
            ..JobMetrics::default()
        };
        if source_result.is_completed() {
            store.complete_job(job.id, metrics)?;
        } else {
            for error in &source_result.errors {
                store.add_error(job.id, error.clone())?;
            }
            store.update_metrics(job.id, metrics)?;
            store.update_status(job.id, source_result.status)?;
        }
    }

    let stats = store.job_statistics(None)?;
    info!(
        total_jobs = stats.total_jobs,
        completed = stats.status_counts.get("completed").copied().unwrap_or(0),
        failed = stats.status_counts.get("failed").copied().unwrap_or(0),
        "recorded ingestion jobs"
    );
    Ok(())
}

async fn run_transform(
    input: &Path,
    output: &Path,
    mode: &str,
    skip_validation: bool,
    json_output: bool,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(input)?;
    let parsed: BTreeMap<String, Vec<RawRecord>> = serde_json::from_str(&text)?;

    let mode = match mode.trim().to_ascii_lowercase().as_str() {
        "sequential" => PipelineMode::Sequential,
        "parallel" => PipelineMode::Parallel,
        "incremental" => PipelineMode::Incremental,
        other => {
            return Err(HarvestError::InvalidArgument(format!(
                "Unknown pipeline mode \"{other}\". Available: sequential, parallel, incremental"
            ))
            .into());
        }
    };

    let config = PipelineConfig {
        mode,
        enable_validation: !skip_validation,
        ..PipelineConfig::default()
    };
    let mut pipeline = TransformationPipeline::new(config, output);
    let result = pipeline.execute(&parsed).await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result.metrics_summary)?);
    } else {
        println!(
            "Stages: {}; errors: {}",
            result.stages_completed().join(", "),
            result.errors.len()
        );
        for file in &result.artifacts.export.files_created {
            println!("  wrote {}", file.display());
        }
    }

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

fn run_package(
    input: &Path,
    output: &Path,
    options: &PackageOptions,
    provenance_records: &[Provenance],
    json_output: bool,
) -> anyhow::Result<()> {
    let builder = RoCrateBuilder::new(output, &options.name)
        .version(&options.version)
        .license(&options.license);

    // Every regular file in the input directory ships under data/.
    let mut data_files = Vec::new();
    if input.exists() {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(input)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        entries.sort();
        for path in entries {
            let crate_relative = builder.add_data_file(&path, None)?;
            data_files.push(DataFileSpec::new(crate_relative));
        }
    }

    let crate_path = builder.build(&data_files, provenance_records)?;

    let source_licenses = vec![
        source_license_info("clinvar", "CC0-1.0", None, None),
        source_license_info("pubmed", "CC0-1.0", None, None),
        source_license_info("hpo", "CC-BY-4.0", None, None),
        source_license_info("uniprot", "CC-BY-4.0", None, None),
    ];
    let manifest = generate_manifest(
        &source_licenses,
        &options.license,
        Some(&crate_path.join("license-manifest.yml")),
    )?;
    if !manifest.is_compliant() {
        warn!(
            issues = manifest.compliance.issues.len(),
            "package license manifest is non-compliant"
        );
    }

    if !provenance_records.is_empty() {
        ProvenanceTracker::write_provenance_file(
            provenance_records,
            &crate_path.join("provenance.json"),
        )?;
    }

    let validation = RoCrateValidator::new(&crate_path).validate();
    if !validation.valid {
        return Err(HarvestError::Package(format!(
            "Built crate failed validation: {}",
            validation.errors.join("; ")
        ))
        .into());
    }

    let mut archived_path = None;
    let mut zip_path = None;
    if let Some(storage_base) = options.storage.as_deref() {
        let storage = PackageStorage::new(storage_base)?;
        archived_path =
            Some(storage.archive_package(&crate_path, &options.version, Some(&options.name))?);
        if options.zip {
            zip_path =
                Some(storage.create_zip_archive(&crate_path, &options.version, Some(&options.name))?);
        }
    }

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "crate_path": crate_path.display().to_string(),
                "data_files": data_files.len(),
                "compliance": manifest.compliance.status,
                "archived_path": archived_path.map(|p| p.display().to_string()),
                "zip_path": zip_path.map(|p| p.display().to_string()),
            }))?
        );
    } else {
        println!(
            "Packaged {} data files at {} (license: {})",
            data_files.len(),
            crate_path.display(),
            manifest.compliance.status
        );
        if let Some(path) = archived_path {
            println!("  archived to {}", path.display());
        }
        if let Some(path) = zip_path {
            println!("  zipped to {}", path.display());
        }
    }

    Ok(())
}

fn run_validate(
    crate_path: Option<&Path>,
    manifest: Option<&Path>,
    fair: bool,
    json_output: bool,
) -> anyhow::Result<()> {
    if crate_path.is_none() && manifest.is_none() {
        return Err(HarvestError::InvalidArgument(
            "Provide --crate-path and/or --manifest to validate".into(),
        )
        .into());
    }

    let mut all_valid = true;
    let mut report = serde_json::Map::new();

    if let Some(path) = crate_path {
        let validator = RoCrateValidator::new(path);
        let validation = validator.validate();
        all_valid &= validation.valid;
        report.insert("crate".into(), serde_json::to_value(&validation)?);
        if fair {
            let compliance = validator.validate_fair_compliance();
            report.insert("fair_compliance".into(), serde_json::to_value(&compliance)?);
        }
        if !json_output {
            println!(
                "Crate {}: {}",
                path.display(),
                if validation.valid { "valid" } else { "invalid" }
            );
            for error in &validation.errors {
                println!("  error: {error}");
            }
            for warning in &validation.warnings {
                println!("  warning: {warning}");
            }
        }
    }

    if let Some(path) = manifest {
        let validation = LicenseValidator::default().validate_manifest(path);
        all_valid &= validation.valid;
        if !json_output {
            println!(
                "Manifest {}: {}",
                path.display(),
                if validation.valid { "valid" } else { "invalid" }
            );
            for issue in &validation.issues {
                println!("  issue: {issue}");
            }
            for warning in &validation.warnings {
                println!("  warning: {warning}");
            }
        }
        report.insert("manifest".into(), serde_json::to_value(&validation)?);
    }

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::Value::Object(report))?
        );
    }

    if !all_valid {
        std::process::exit(1);
    }
    Ok(())
}
