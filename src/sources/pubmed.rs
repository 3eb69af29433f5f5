//! PubMed client over the NCBI E-utilities endpoints.

use std::borrow::Cow;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::HarvestError;
use crate::parsers::RawRecord;

use super::{endpoint, env_base, http_client, read_success_body, retry_send};

const PUBMED_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const PUBMED_API: &str = "pubmed";
const PUBMED_BASE_ENV: &str = "BIOHARVEST_PUBMED_BASE";
const RETRY_ATTEMPTS: usize = 3;

pub struct PubMedClient {
    client: reqwest::Client,
    base: Cow<'static, str>,
}

#[derive(Debug, Deserialize)]
struct EsearchResponse {
    esearchresult: EsearchResult,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

impl PubMedClient {
    pub fn new() -> Result<Self, HarvestError> {
        Ok(Self {
            client: http_client()?,
            base: env_base(PUBMED_BASE, PUBMED_BASE_ENV),
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(base: String) -> Result<Self, HarvestError> {
        Ok(Self {
            client: http_client()?,
            base: Cow::Owned(base),
        })
    }

    /// PubMed ids matching a free-text query.
    pub async fn search_pubmed_ids(
        &self,
        query: &str,
        max_records: usize,
    ) -> Result<Vec<String>, HarvestError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(HarvestError::InvalidArgument(
                "Query is required for a PubMed search".into(),
            ));
        }

        let url = endpoint(&self.base, "esearch.fcgi");
        let retmax = max_records.max(1).to_string();
        let response = retry_send(PUBMED_API, RETRY_ATTEMPTS, || {
            self.client
                .get(&url)
                .query(&[
                    ("db", "pubmed"),
                    ("term", query),
                    ("retmode", "json"),
                    ("retmax", retmax.as_str()),
                ])
                .send()
        })
        .await?;

        let payload = read_success_body(PUBMED_API, response).await?;
        let parsed: EsearchResponse =
            serde_json::from_slice(&payload).map_err(|err| HarvestError::Api {
                api: PUBMED_API.to_string(),
                message: format!(
                    "Invalid esearch response: {} ({err})",
                    super::body_excerpt(&payload)
                ),
            })?;
        Ok(parsed.esearchresult.idlist)
    }

    /// Full PubmedArticle XML for one PubMed id.
    pub async fn fetch_article_xml(&self, pubmed_id: &str) -> Result<String, HarvestError> {
        let url = endpoint(&self.base, "efetch.fcgi");
        let response = retry_send(PUBMED_API, RETRY_ATTEMPTS, || {
            self.client
                .get(&url)
                .query(&[("db", "pubmed"), ("retmode", "xml"), ("id", pubmed_id)])
                .send()
        })
        .await?;

        let payload = read_success_body(PUBMED_API, response).await?;
        Ok(String::from_utf8_lossy(&payload).to_string())
    }

    /// Raw publication records for a query: one record per PubMed id.
    pub async fn fetch_raw_records(
        &self,
        query: &str,
        max_records: usize,
    ) -> Result<Vec<RawRecord>, HarvestError> {
        let ids = self.search_pubmed_ids(query, max_records).await?;
        debug!(query, count = ids.len(), "resolved PubMed ids");

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let raw_xml = self.fetch_article_xml(&id).await?;
            let mut record = RawRecord::new();
            record.insert("pubmed_id".to_string(), Value::String(id));
            record.insert("raw_xml".to_string(), Value::String(raw_xml));
            records.push(record);
        }
        Ok(records)
    }
}
