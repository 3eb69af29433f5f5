//! HPO ontology client: downloads the ontology in OBO format and splits it
//! into per-term line records for the parsing stage.

use std::borrow::Cow;

use serde_json::{Value, json};
use tracing::debug;

use crate::error::HarvestError;
use crate::parsers::RawRecord;

use super::{endpoint, env_base, http_client, read_success_body, retry_send};

const HPO_BASE: &str = "https://purl.obolibrary.org/obo";
const HPO_API: &str = "hpo";
const HPO_BASE_ENV: &str = "BIOHARVEST_HPO_BASE";
const RETRY_ATTEMPTS: usize = 3;

pub struct HpoClient {
    client: reqwest::Client,
    base: Cow<'static, str>,
}

impl HpoClient {
    pub fn new() -> Result<Self, HarvestError> {
        Ok(Self {
            client: http_client()?,
            base: env_base(HPO_BASE, HPO_BASE_ENV),
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(base: String) -> Result<Self, HarvestError> {
        Ok(Self {
            client: http_client()?,
            base: Cow::Owned(base),
        })
    }

    /// Download the ontology and return one raw record per `[Term]` stanza,
    /// capped at `max_records` when non-zero.
    pub async fn fetch_raw_records(&self, max_records: usize) -> Result<Vec<RawRecord>, HarvestError> {
        let url = endpoint(&self.base, "hp.obo");
        let response =
            retry_send(HPO_API, RETRY_ATTEMPTS, || self.client.get(&url).send()).await?;
        let payload = read_success_body(HPO_API, response).await?;
        let text = String::from_utf8_lossy(&payload);

        let mut records = parse_obo_terms(&text);
        debug!(count = records.len(), "parsed HPO term stanzas");
        if max_records > 0 && records.len() > max_records {
            records.truncate(max_records);
        }
        Ok(records)
    }
}

/// Split OBO text into `[Term]` stanzas and lift each into a raw record
/// with `hpo_id`, `name`, `definition`, `synonyms`, `xrefs`, `is_a`,
/// `is_obsolete`, and `replaced_by` fields.
pub(crate) fn parse_obo_terms(text: &str) -> Vec<RawRecord> {
    let mut records = Vec::new();
    let mut current: Option<RawRecord> = None;

    for line in text.lines() {
        let line = line.trim();
        if line == "[Term]" {
            if let Some(record) = current.take() {
                push_if_identified(&mut records, record);
            }
            current = Some(RawRecord::new());
            continue;
        }
        if line.starts_with('[') {
            // Typedef or other stanza: close out any open term.
            if let Some(record) = current.take() {
                push_if_identified(&mut records, record);
            }
            continue;
        }
        let Some(record) = current.as_mut() else {
            continue;
        };
        let Some((tag, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match tag {
            "id" => {
                record.insert("hpo_id".into(), Value::String(value.to_string()));
            }
            "name" => {
                record.insert("name".into(), Value::String(value.to_string()));
            }
            "def" => {
                record.insert(
                    "definition".into(),
                    Value::String(unquote_obo_value(value)),
                );
            }
            "comment" => {
                record.insert("comment".into(), Value::String(value.to_string()));
            }
            "synonym" => {
                append_to_list(record, "synonyms", unquote_obo_value(value));
            }
            "xref" => {
                append_to_list(record, "xrefs", value.to_string());
            }
            "is_a" => {
                let parent = value.split('!').next().unwrap_or("").trim();
                if !parent.is_empty() {
                    append_to_list(record, "is_a", parent.to_string());
                }
            }
            "is_obsolete" => {
                record.insert("is_obsolete".into(), Value::Bool(value == "true"));
            }
            "replaced_by" => {
                record.insert("replaced_by".into(), Value::String(value.to_string()));
            }
            _ => {}
        }
    }

    if let Some(record) = current.take() {
        push_if_identified(&mut records, record);
    }
    records
}

fn push_if_identified(records: &mut Vec<RawRecord>, record: RawRecord) {
    if record.contains_key("hpo_id") && record.contains_key("name") {
        records.push(record);
    }
}

fn append_to_list(record: &mut RawRecord, key: &str, value: String) {
    match record.get_mut(key) {
        Some(Value::Array(items)) => items.push(Value::String(value)),
        _ => {
            record.insert(key.into(), json!([value]));
        }
    }
}

/// Strip the quoted portion of an OBO `def:`/`synonym:` value, dropping
/// trailing qualifier brackets.
fn unquote_obo_value(value: &str) -> String {
    if let Some(start) = value.find('"') {
        if let Some(end) = value[start + 1..].find('"') {
            return value[start + 1..start + 1 + end].to_string();
        }
    }
    value.to_string()
}
