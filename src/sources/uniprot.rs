//! UniProtKB REST client.

use std::borrow::Cow;

use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;

use crate::error::HarvestError;
use crate::parsers::RawRecord;

use super::{endpoint, env_base, http_client, read_success_body, retry_send};

const UNIPROT_BASE: &str = "https://rest.uniprot.org";
const UNIPROT_API: &str = "uniprot";
const UNIPROT_BASE_ENV: &str = "BIOHARVEST_UNIPROT_BASE";
const RETRY_ATTEMPTS: usize = 3;

pub struct UniProtClient {
    client: reqwest::Client,
    base: Cow<'static, str>,
}

#[derive(Debug, Deserialize)]
struct UniProtSearchResponse {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

impl UniProtClient {
    pub fn new() -> Result<Self, HarvestError> {
        Ok(Self {
            client: http_client()?,
            base: env_base(UNIPROT_BASE, UNIPROT_BASE_ENV),
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(base: String) -> Result<Self, HarvestError> {
        Ok(Self {
            client: http_client()?,
            base: Cow::Owned(base),
        })
    }

    /// Full entry JSON for one accession.
    pub async fn fetch_entry(&self, accession: &str) -> Result<RawRecord, HarvestError> {
        let accession = accession.trim();
        if accession.is_empty() {
            return Err(HarvestError::InvalidArgument(
                "UniProt accession is required".into(),
            ));
        }

        let url = endpoint(&self.base, &format!("uniprotkb/{accession}.json"));
        let response = retry_send(UNIPROT_API, RETRY_ATTEMPTS, || {
            self.client
                .get(&url)
                .header(ACCEPT, "application/json")
                .send()
        })
        .await?;

        let payload = read_success_body(UNIPROT_API, response).await?;
        let value: serde_json::Value =
            serde_json::from_slice(&payload).map_err(|err| HarvestError::Api {
                api: UNIPROT_API.to_string(),
                message: format!(
                    "Invalid JSON response: {} ({err})",
                    super::body_excerpt(&payload)
                ),
            })?;
        value
            .as_object()
            .cloned()
            .ok_or_else(|| HarvestError::Api {
                api: UNIPROT_API.to_string(),
                message: "Entry response is not a JSON object".into(),
            })
    }

    /// Raw entry records matching a gene query.
    pub async fn fetch_raw_records(
        &self,
        query: &str,
        max_records: usize,
    ) -> Result<Vec<RawRecord>, HarvestError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(HarvestError::InvalidArgument(
                "UniProt query is required".into(),
            ));
        }

        let url = endpoint(&self.base, "uniprotkb/search");
        let size = max_records.clamp(1, 500).to_string();
        let gene_query = format!("gene:{query}");
        let response = retry_send(UNIPROT_API, RETRY_ATTEMPTS, || {
            self.client
                .get(&url)
                .header(ACCEPT, "application/json")
                .query(&[
                    ("query", gene_query.as_str()),
                    ("format", "json"),
                    ("size", size.as_str()),
                ])
                .send()
        })
        .await?;

        let payload = read_success_body(UNIPROT_API, response).await?;
        let parsed: UniProtSearchResponse =
            serde_json::from_slice(&payload).map_err(|err| HarvestError::Api {
                api: UNIPROT_API.to_string(),
                message: format!(
                    "Invalid JSON response: {} ({err})",
                    super::body_excerpt(&payload)
                ),
            })?;

        let records: Vec<RawRecord> = parsed
            .results
            .into_iter()
            .filter_map(|value| value.as_object().cloned())
            .collect();
        debug!(query, count = records.len(), "fetched UniProt entries");
        Ok(records)
    }
}
