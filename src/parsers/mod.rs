//! Source parsers: raw upstream bytes to typed source records.
//!
//! Parsers are pure — no I/O beyond the supplied record — and tolerant:
//! a bad record is skipped (and counted by the caller), never fatal.

pub mod clinvar;
pub mod hpo;
pub mod pubmed;
pub mod uniprot;
pub(crate) mod xml;

pub use clinvar::{ClinVarParser, ClinVarVariant, ClinicalSignificance, VariantType};
pub use hpo::{HpoParser, HpoRelationship, HpoTerm, HpoTermType};
pub use pubmed::{PubMedAuthor, PubMedJournal, PubMedParser, PubMedPublication};
pub use uniprot::{UniProtEntry, UniProtParser};

/// Schema-loose upstream record: a JSON object with whatever keys the
/// source handed back. Parsers pull out the fields they understand and log
/// the rest at debug level.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Extract a non-empty string field from a raw record.
pub(crate) fn raw_str<'a>(raw: &'a RawRecord, key: &str) -> Option<&'a str> {
    raw.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Extract an integer field, accepting both numbers and numeric strings.
pub(crate) fn raw_i64(raw: &RawRecord, key: &str) -> Option<i64> {
    match raw.get(key)? {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Extract a list-of-strings field.
pub(crate) fn raw_string_list(raw: &RawRecord, key: &str) -> Vec<String> {
    raw.get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Log raw-record keys the parser does not consume. Unknown upstream fields
/// are never dropped silently.
pub(crate) fn log_unknown_keys(source: &str, raw: &RawRecord, known: &[&str]) {
    for key in raw.keys() {
        if !known.contains(&key.as_str()) {
            tracing::debug!(source, field = %key, "ignoring unrecognized record field");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> RawRecord {
        value.as_object().expect("object literal").clone()
    }

    #[test]
    fn raw_str_trims_and_rejects_empty() {
        let raw = record(json!({"a": "  x  ", "b": "   ", "c": 3}));
        assert_eq!(raw_str(&raw, "a"), Some("x"));
        assert_eq!(raw_str(&raw, "b"), None);
        assert_eq!(raw_str(&raw, "c"), None);
        assert_eq!(raw_str(&raw, "missing"), None);
    }

    #[test]
    fn raw_i64_accepts_numbers_and_numeric_strings() {
        let raw = record(json!({"n": 42, "s": "17", "bad": "x"}));
        assert_eq!(raw_i64(&raw, "n"), Some(42));
        assert_eq!(raw_i64(&raw, "s"), Some(17));
        assert_eq!(raw_i64(&raw, "bad"), None);
    }

    #[test]
    fn raw_string_list_filters_non_strings() {
        let raw = record(json!({"xs": ["a", "", 1, " b "]}));
        assert_eq!(raw_string_list(&raw, "xs"), vec!["a", "b"]);
        assert!(raw_string_list(&raw, "missing").is_empty());
    }
}
