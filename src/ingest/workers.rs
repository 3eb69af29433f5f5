//! Built-in source workers wrapping the upstream clients.

use std::time::Instant;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::info;

use crate::error::HarvestError;
use crate::job::IngestionStatus;
use crate::parsers::RawRecord;
use crate::provenance::{DataSource, Provenance};
use crate::sources::{ClinVarClient, HpoClient, PubMedClient, UniProtClient};

use super::{IngestParams, IngestionResult};

/// System name recorded as the acquiring agent on provenance records.
pub const ACQUIRED_BY: &str = "bioharvest-coordinator";

/// A worker that acquires raw records from one upstream source.
#[async_trait]
pub trait SourceWorker: Send + Sync {
    fn source(&self) -> &str;

    async fn ingest(&self, params: &IngestParams) -> Result<IngestionResult, HarvestError>;
}

fn completed_result(
    source: DataSource,
    source_url: &str,
    data: Vec<RawRecord>,
    started: Instant,
) -> IngestionResult {
    let provenance = Provenance::new(source, ACQUIRED_BY)
        .with_source_url(source_url)
        .add_processing_step(format!(
            "Fetched {} records from {}",
            data.len(),
            source.as_str()
        ))
        .update_quality_score(1.0);

    IngestionResult {
        source: source.as_str().to_string(),
        status: IngestionStatus::Completed,
        records_processed: data.len() as u64,
        records_failed: 0,
        data,
        provenance,
        errors: Vec::new(),
        duration_seconds: started.elapsed().as_secs_f64(),
        timestamp: OffsetDateTime::now_utc(),
    }
}

/// Variant-database worker.
pub struct ClinVarWorker {
    client: ClinVarClient,
}

impl ClinVarWorker {
    pub fn new() -> Result<Self, HarvestError> {
        Ok(Self {
            client: ClinVarClient::new()?,
        })
    }
}

#[async_trait]
impl SourceWorker for ClinVarWorker {
    fn source(&self) -> &str {
        "clinvar"
    }

    async fn ingest(&self, params: &IngestParams) -> Result<IngestionResult, HarvestError> {
        let started = Instant::now();
        let gene_symbol = params.gene_symbol.as_deref().ok_or_else(|| {
            HarvestError::InvalidArgument("ClinVar ingestion requires a gene symbol".into())
        })?;

        let data = self
            .client
            .fetch_raw_records(gene_symbol, params.effective_max_records())
            .await?;
        info!(gene_symbol, records = data.len(), "ClinVar ingestion finished");
        Ok(completed_result(
            DataSource::ClinVar,
            "https://www.ncbi.nlm.nih.gov/clinvar/",
            data,
            started,
        ))
    }
}

/// Literature-index worker.
pub struct PubMedWorker {
    client: PubMedClient,
}

impl PubMedWorker {
    pub fn new() -> Result<Self, HarvestError> {
        Ok(Self {
            client: PubMedClient::new()?,
        })
    }
}

#[async_trait]
impl SourceWorker for PubMedWorker {
    fn source(&self) -> &str {
        "pubmed"
    }

    async fn ingest(&self, params: &IngestParams) -> Result<IngestionResult, HarvestError> {
        let started = Instant::now();
        let query = params
            .query
            .as_deref()
            .or(params.gene_symbol.as_deref())
            .ok_or_else(|| {
                HarvestError::InvalidArgument("PubMed ingestion requires a query".into())
            })?;

        let data = self
            .client
            .fetch_raw_records(query, params.effective_max_records())
            .await?;
        info!(query, records = data.len(), "PubMed ingestion finished");
        Ok(completed_result(
            DataSource::PubMed,
            "https://pubmed.ncbi.nlm.nih.gov/",
            data,
            started,
        ))
    }
}

/// Ontology worker.
pub struct HpoWorker {
    client: HpoClient,
}

impl HpoWorker {
    pub fn new() -> Result<Self, HarvestError> {
        Ok(Self {
            client: HpoClient::new()?,
        })
    }
}

#[async_trait]
impl SourceWorker for HpoWorker {
    fn source(&self) -> &str {
        "hpo"
    }

    async fn ingest(&self, params: &IngestParams) -> Result<IngestionResult, HarvestError> {
        let started = Instant::now();
        let data = self
            .client
            .fetch_raw_records(params.max_records.unwrap_or(0))
            .await?;
        info!(records = data.len(), "HPO ingestion finished");
        Ok(completed_result(
            DataSource::Hpo,
            "https://hpo.jax.org/",
            data,
            started,
        ))
    }
}

/// Protein knowledge-base worker.
pub struct UniProtWorker {
    client: UniProtClient,
}

impl UniProtWorker {
    pub fn new() -> Result<Self, HarvestError> {
        Ok(Self {
            client: UniProtClient::new()?,
        })
    }
}

#[async_trait]
impl SourceWorker for UniProtWorker {
    fn source(&self) -> &str {
        "uniprot"
    }

    async fn ingest(&self, params: &IngestParams) -> Result<IngestionResult, HarvestError> {
        let started = Instant::now();
        let query = params
            .query
            .as_deref()
            .or(params.gene_symbol.as_deref())
            .ok_or_else(|| {
                HarvestError::InvalidArgument("UniProt ingestion requires a query".into())
            })?;

        let data = self
            .client
            .fetch_raw_records(query, params.effective_max_records())
            .await?;
        info!(query, records = data.len(), "UniProt ingestion finished");
        Ok(completed_result(
            DataSource::UniProt,
            "https://www.uniprot.org/",
            data,
            started,
        ))
    }
}
