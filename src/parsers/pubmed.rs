//! PubMed XML parser for scientific publication records.

use serde::{Deserialize, Serialize};
use time::{Date, Month};
use tracing::debug;

use super::xml::{XmlElement, parse_document};
use super::{RawRecord, log_unknown_keys, raw_str};

/// Author entry on a publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubMedAuthor {
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub initials: Option<String>,
    pub affiliation: Option<String>,
}

/// Journal metadata for a publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubMedJournal {
    pub title: Option<String>,
    pub iso_abbreviation: Option<String>,
    pub issn: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
}

/// Structured representation of a PubMed publication record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubMedPublication {
    pub pubmed_id: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub authors: Vec<PubMedAuthor>,
    pub journal: Option<PubMedJournal>,
    pub publication_date: Option<Date>,
    pub publication_types: Vec<String>,
    pub keywords: Vec<String>,
    pub doi: Option<String>,
    pub pmc_id: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
}

/// Parser for `PubmedArticle` XML payloads.
#[derive(Debug, Default)]
pub struct PubMedParser;

impl PubMedParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse one raw record (`pubmed_id` + `raw_xml`). Returns `None` on
    /// malformed input.
    pub fn parse_raw(&self, raw: &RawRecord) -> Option<PubMedPublication> {
        log_unknown_keys("pubmed", raw, &["pubmed_id", "raw_xml", "source"]);
        let pubmed_id = raw_str(raw, "pubmed_id")?;
        let raw_xml = raw_str(raw, "raw_xml")?;

        let doc = match parse_document(raw_xml) {
            Ok(doc) => doc,
            Err(err) => {
                debug!(pubmed_id, "failed to parse PubMed XML: {err}");
                return None;
            }
        };

        Some(PubMedPublication {
            pubmed_id: pubmed_id.to_string(),
            title: extract_title(&doc),
            abstract_text: extract_abstract(&doc),
            authors: extract_authors(&doc),
            journal: extract_journal(&doc),
            publication_date: extract_publication_date(&doc),
            publication_types: collect_texts(&doc, "PublicationTypeList", "PublicationType"),
            keywords: extract_keywords(&doc),
            doi: extract_article_id(&doc, "doi"),
            pmc_id: extract_article_id(&doc, "pmc"),
            language: doc
                .find("Language")
                .and_then(XmlElement::text_value)
                .map(str::to_string),
            country: doc
                .find("Country")
                .and_then(XmlElement::text_value)
                .map(str::to_string),
        })
    }

    /// Parse a batch of raw records, skipping any that fail.
    pub fn parse_batch(&self, raw_records: &[RawRecord]) -> Vec<PubMedPublication> {
        raw_records
            .iter()
            .filter_map(|raw| self.parse_raw(raw))
            .collect()
    }

    /// Structural validation issues for a parsed record.
    pub fn validate(&self, publication: &PubMedPublication) -> Vec<String> {
        let mut errors = Vec::new();
        if publication.pubmed_id.is_empty() {
            errors.push("Missing PubMed ID".to_string());
        }
        if publication.title.is_empty() {
            errors.push("Missing publication title".to_string());
        }
        if publication.authors.is_empty() {
            errors.push("No authors found".to_string());
        }
        errors
    }
}

fn extract_title(doc: &XmlElement) -> String {
    for name in ["ArticleTitle", "Title", "BookTitle"] {
        if let Some(element) = doc.find(name) {
            let text = element.text_content();
            if !text.is_empty() {
                return text;
            }
        }
    }
    "Unknown Title".to_string()
}

fn extract_abstract(doc: &XmlElement) -> Option<String> {
    let abstract_elem = doc.find("Abstract")?;
    let mut parts = Vec::new();
    for section in abstract_elem.find_all("AbstractText") {
        let text = section.text_content();
        if text.is_empty() {
            continue;
        }
        match section.attr("Label") {
            Some(label) => parts.push(format!("{label}: {text}")),
            None => parts.push(text),
        }
    }
    (!parts.is_empty()).then(|| parts.join(" "))
}

fn extract_authors(doc: &XmlElement) -> Vec<PubMedAuthor> {
    let Some(author_list) = doc.find("AuthorList") else {
        return Vec::new();
    };
    author_list
        .find_all("Author")
        .into_iter()
        .map(|author| PubMedAuthor {
            last_name: child_text(author, "LastName"),
            first_name: child_text(author, "ForeName"),
            initials: child_text(author, "Initials"),
            affiliation: author
                .find("Affiliation")
                .and_then(XmlElement::text_value)
                .map(str::to_string),
        })
        .collect()
}

fn extract_journal(doc: &XmlElement) -> Option<PubMedJournal> {
    let journal = doc.find("Journal")?;
    Some(PubMedJournal {
        title: child_text(journal, "Title"),
        iso_abbreviation: child_text(journal, "ISOAbbreviation"),
        issn: child_text(journal, "ISSN"),
        volume: child_text(journal, "Volume"),
        issue: child_text(journal, "Issue"),
        pages: doc
            .find("MedlinePgn")
            .and_then(XmlElement::text_value)
            .map(str::to_string),
    })
}

fn extract_publication_date(doc: &XmlElement) -> Option<Date> {
    let date_elem = doc
        .find("PubDate")
        .or_else(|| doc.find("ArticleDate"))
        .or_else(|| doc.find("DateCompleted"))?;

    let year: i32 = child_text(date_elem, "Year")?.parse().ok()?;
    let month = child_text(date_elem, "Month")
        .map(|m| month_number(&m))
        .unwrap_or(1);
    let day: u8 = child_text(date_elem, "Day")
        .and_then(|d| d.parse().ok())
        .unwrap_or(1);

    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

fn extract_keywords(doc: &XmlElement) -> Vec<String> {
    let mut keywords = Vec::new();
    for list in doc.find_all("KeywordList") {
        for keyword in list.find_all("Keyword") {
            if let Some(text) = keyword.text_value() {
                keywords.push(text.to_string());
            }
        }
    }
    // MeSH descriptors count as keywords too.
    if let Some(mesh_list) = doc.find("MeshHeadingList") {
        for heading in mesh_list.find_all("MeshHeading") {
            if let Some(descriptor) = heading.find("DescriptorName").and_then(XmlElement::text_value)
            {
                keywords.push(descriptor.to_string());
            }
        }
    }
    keywords
}

fn extract_article_id(doc: &XmlElement, id_type: &str) -> Option<String> {
    let id_list = doc.find("ArticleIdList")?;
    for article_id in id_list.find_all("ArticleId") {
        if article_id.attr("IdType") == Some(id_type) {
            if let Some(text) = article_id.text_value() {
                return Some(text.to_string());
            }
        }
    }
    None
}

fn collect_texts(doc: &XmlElement, list_name: &str, item_name: &str) -> Vec<String> {
    let Some(list) = doc.find(list_name) else {
        return Vec::new();
    };
    list.find_all(item_name)
        .into_iter()
        .filter_map(XmlElement::text_value)
        .map(str::to_string)
        .collect()
}

fn child_text(element: &XmlElement, name: &str) -> Option<String> {
    element
        .find(name)
        .and_then(XmlElement::text_value)
        .map(str::to_string)
}

fn month_number(name: &str) -> u8 {
    match name.trim() {
        "Jan" | "January" | "1" | "01" => 1,
        "Feb" | "February" | "2" | "02" => 2,
        "Mar" | "March" | "3" | "03" => 3,
        "Apr" | "April" | "4" | "04" => 4,
        "May" | "5" | "05" => 5,
        "Jun" | "June" | "6" | "06" => 6,
        "Jul" | "July" | "7" | "07" => 7,
        "Aug" | "August" | "8" | "08" => 8,
        "Sep" | "September" | "9" | "09" => 9,
        "Oct" | "October" | "10" => 10,
        "Nov" | "November" | "11" => 11,
        "Dec" | "December" | "12" => 12,
        _ => 1,
    }
}
