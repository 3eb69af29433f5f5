//! ClinVar client over the NCBI E-utilities endpoints.
//!
//! `esearch` resolves a gene symbol to variation ids, `efetch` pulls the
//! full `VariationArchive` XML for each id. Raw records carry the id plus
//! the untouched XML payload for the parsing stage.

use std::borrow::Cow;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::HarvestError;
use crate::parsers::RawRecord;

use super::{endpoint, env_base, http_client, read_success_body, retry_send};

const CLINVAR_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const CLINVAR_API: &str = "clinvar";
const CLINVAR_BASE_ENV: &str = "BIOHARVEST_CLINVAR_BASE";
const RETRY_ATTEMPTS: usize = 3;

pub struct ClinVarClient {
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

impl ClinVarClient {
    pub fn new() -> Result<Self, HarvestError> {
        Ok(Self {
            client: http_client()?,
            base: env_base(CLINVAR_BASE, CLINVAR_BASE_ENV),
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(base: String) -> Result<Self, HarvestError> {
        Ok(Self {
            client: http_client()?,
            base: Cow::Owned(base),
        })
    }

    /// Variation ids associated with a gene symbol.
    pub async fn search_variation_ids(
        &self,
        gene_symbol: &str,
        max_records: usize,
    ) -> Result<Vec<String>, HarvestError> {
        let gene_symbol = gene_symbol.trim();
        if gene_symbol.is_empty() {
            return Err(HarvestError::InvalidArgument(
                "Gene symbol is required for a ClinVar search".into(),
            ));
        }

        let url = endpoint(&self.base, "esearch.fcgi");
        let term = format!("{gene_symbol}[gene]");
        let retmax = max_records.max(1).to_string();
        let response = retry_send(CLINVAR_API, RETRY_ATTEMPTS, || {
            self.client
                .get(&url)
                .query(&[
                    ("db", "clinvar"),
                    ("term", term.as_str()),
                    ("retmode", "json"),
                    ("retmax", retmax.as_str()),
                ])
                .send()
        })
        .await?;

        let payload = read_success_body(CLINVAR_API, response).await?;
        let parsed: EsearchResponse =
            serde_json::from_slice(&payload).map_err(|err| HarvestError::Api {
                api: CLINVAR_API.to_string(),
                message: format!(
                    "Invalid esearch response: {} ({err})",
                    super::body_excerpt(&payload)
                ),
            })?;
        Ok(parsed.esearchresult.idlist)
    }

    /// Full VariationArchive XML for one variation id.
    pub async fn fetch_variation_xml(&self, variation_id: &str) -> Result<String, HarvestError> {
        let url = endpoint(&self.base, "efetch.fcgi");
        let response = retry_send(CLINVAR_API, RETRY_ATTEMPTS, || {
            self.client
                .get(&url)
                .query(&[("db", "clinvar"), ("rettype", "vcv"), ("id", variation_id)])
                .send()
        })
        .await?;

        let payload = read_success_body(CLINVAR_API, response).await?;
        Ok(String::from_utf8_lossy(&payload).to_string())
    }

    /// Raw variant records for a gene: one record per variation id, each
    /// carrying the fetched XML.
    pub async fn fetch_raw_records(
        &self,
        gene_symbol: &str,
        max_records: usize,
    ) -> Result<Vec<RawRecord>, HarvestError> {
        let ids = self.search_variation_ids(gene_symbol, max_records).await?;
        debug!(
            gene_symbol,
            count = ids.len(),
            "resolved ClinVar variation ids"
        );

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let raw_xml = self.fetch_variation_xml(&id).await?;
            let mut record = RawRecord::new();
            record.insert("clinvar_id".to_string(), Value::String(id));
            record.insert("raw_xml".to_string(), Value::String(raw_xml));
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_builds_gene_scoped_term() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .and(query_param("db", "clinvar"))
            .and(query_param("term", "MED13[gene]"))
            .and(query_param("retmax", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "esearchresult": {"idlist": ["4282399", "702748"]}
            })))
            .mount(&server)
            .await;

        let client = ClinVarClient::new_for_test(server.uri()).expect("client");
        let ids = client.search_variation_ids("MED13", 5).await.expect("ids");
        assert_eq!(ids, vec!["4282399".to_string(), "702748".to_string()]);
    }

    #[tokio::test]
    async fn fetch_raw_records_attaches_xml_per_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "esearchresult": {"idlist": ["4282399"]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/efetch.fcgi"))
            .and(query_param("id", "4282399"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<VariationArchive VariationID=\"4282399\"/>"),
            )
            .mount(&server)
            .await;

        let client = ClinVarClient::new_for_test(server.uri()).expect("client");
        let records = client.fetch_raw_records("MED13", 10).await.expect("records");
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].get("clinvar_id").and_then(|v| v.as_str()),
            Some("4282399")
        );
        assert!(
            records[0]
                .get("raw_xml")
                .and_then(|v| v.as_str())
                .expect("xml")
                .contains("VariationArchive")
        );
    }

    #[tokio::test]
    async fn empty_gene_symbol_is_rejected() {
        let client = ClinVarClient::new_for_test("http://127.0.0.1:9".into()).expect("client");
        let err = client
            .search_variation_ids("  ", 5)
            .await
            .expect_err("invalid argument");
        assert!(matches!(err, HarvestError::InvalidArgument(_)));
    }
}
