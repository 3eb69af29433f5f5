use std::time::{Duration, Instant};

use crate::error::HarvestError;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthRow {
    pub api: String,
    pub status: String,
    pub latency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affects: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub healthy: usize,
    pub total: usize,
    pub rows: Vec<HealthRow>,
}

impl HealthReport {
    pub fn all_healthy(&self) -> bool {
        self.healthy == self.total
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# bioharvest Health Check\n\n");
        out.push_str("| API | Status | Latency | Affects |\n");
        out.push_str("|-----|--------|---------|---------|\n");
        for row in &self.rows {
            let affects = row.affects.as_deref().unwrap_or("-");
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                row.api, row.status, row.latency, affects
            ));
        }
        out.push_str(&format!(
            "\nStatus: {}/{} APIs healthy\n",
            self.healthy, self.total
        ));
        out
    }
}

fn affects_for_api(api: &str) -> Option<&'static str> {
    match api {
        "ClinVar" => Some("variant ingestion"),
        "PubMed" => Some("publication ingestion"),
        "HPO" => Some("phenotype ontology ingestion"),
        "UniProt" => Some("protein and gene ingestion"),
        _ => None,
    }
}

async fn check_one(client: reqwest::Client, api: &str, url: &str) -> HealthRow {
    let start = Instant::now();
    let resp = client.get(url).send().await;

    match resp {
        Ok(resp) => {
            let status = resp.status();
            let elapsed = start.elapsed().as_millis();
            if status.is_success() {
                HealthRow {
                    api: api.to_string(),
                    status: "ok".into(),
                    latency: format!("{elapsed}ms"),
                    affects: None,
                }
            } else {
                HealthRow {
                    api: api.to_string(),
                    status: "error".into(),
                    latency: format!("{elapsed}ms (HTTP {})", status.as_u16()),
                    affects: affects_for_api(api).map(str::to_string),
                }
            }
        }
        Err(err) => {
            let reason = if err.is_timeout() {
                "timeout"
            } else if err.is_connect() {
                "connect"
            } else {
                "error"
            };
            HealthRow {
                api: api.to_string(),
                status: "error".into(),
                latency: reason.into(),
                affects: affects_for_api(api).map(str::to_string),
            }
        }
    }
}

/// Runs connectivity checks for the four upstream source APIs.
///
/// # Errors
///
/// Returns an error when the HTTP client cannot be created.
pub async fn check() -> Result<HealthReport, HarvestError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("bioharvest/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(HarvestError::HttpClientInit)?;

    let (clinvar, pubmed, hpo, uniprot) = tokio::join!(
        check_one(
            client.clone(),
            "ClinVar",
            "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi?db=clinvar&term=BRAF[gene]&retmode=json&retmax=1"
        ),
        check_one(
            client.clone(),
            "PubMed",
            "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi?db=pubmed&term=BRAF&retmode=json&retmax=1"
        ),
        check_one(
            client.clone(),
            "HPO",
            "https://purl.obolibrary.org/obo/hp.obo"
        ),
        check_one(
            client.clone(),
            "UniProt",
            "https://rest.uniprot.org/uniprotkb/search?query=gene:BRAF&format=json&size=1"
        ),
    );

    let rows = vec![clinvar, pubmed, hpo, uniprot];
    let healthy = rows.iter().filter(|r| r.status == "ok").count();
    Ok(HealthReport {
        healthy,
        total: rows.len(),
        rows,
    })
}
