//! Minimal XML tree reader on top of `quick-xml`.
//!
//! Upstream XML payloads (ClinVar, PubMed) are small per-record documents,
//! so materializing a tree keeps the extraction code declarative instead of
//! threading state through an event loop.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::HarvestError;

/// A parsed XML element: name, attributes, direct text, and children.
#[derive(Debug, Clone, Default)]
pub(crate) struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Attribute value by name.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First descendant with the given element name, depth-first.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants with the given element name, document order.
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut out = Vec::new();
        self.collect_named(name, &mut out);
        out
    }

    fn collect_named<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlElement>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.collect_named(name, out);
        }
    }

    /// Trimmed direct text, `None` when empty.
    pub fn text_value(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }

    /// All text in the subtree concatenated, whitespace-trimmed at the ends.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.append_text(&mut out);
        out.trim().to_string()
    }

    fn append_text(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            child.append_text(out);
        }
    }
}

/// Parse an XML document into a synthetic root element whose children are
/// the document's top-level elements.
pub(crate) fn parse_document(xml: &str) -> Result<XmlElement, HarvestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = vec![XmlElement {
        name: "#document".to_string(),
        ..XmlElement::default()
    }];

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let element = element_from_start(&start)?;
                stack.push(element);
            }
            Ok(Event::Empty(start)) => {
                let element = element_from_start(&start)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(element);
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(HarvestError::Parse {
                        source_name: "xml".to_string(),
                        message: "unmatched closing tag".to_string(),
                    });
                }
                let finished = stack.pop().expect("non-empty stack");
                stack
                    .last_mut()
                    .expect("document root")
                    .children
                    .push(finished);
            }
            Ok(Event::Text(text)) => {
                let value = text.unescape().map_err(|err| HarvestError::Parse {
                    source_name: "xml".to_string(),
                    message: format!("invalid text node: {err}"),
                })?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&value);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(HarvestError::Parse {
                    source_name: "xml".to_string(),
                    message: err.to_string(),
                });
            }
        }
    }

    if stack.len() != 1 {
        return Err(HarvestError::Parse {
            source_name: "xml".to_string(),
            message: "unexpected end of document".to_string(),
        });
    }
    Ok(stack.remove(0))
}

fn element_from_start(
    start: &quick_xml::events::BytesStart<'_>,
) -> Result<XmlElement, HarvestError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| HarvestError::Parse {
            source_name: "xml".to_string(),
            message: format!("invalid attribute: {err}"),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| HarvestError::Parse {
                source_name: "xml".to_string(),
                message: format!("invalid attribute value: {err}"),
            })?
            .to_string();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        ..XmlElement::default()
    })
}
