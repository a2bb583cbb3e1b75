//! OAI-PMH response parsing
//!
//! Parsing is namespace-agnostic: elements are matched on their local names
//! so prefixed (`oai:Identify`) and default-namespace documents read the same.

use super::{IdentifyInfo, OaiError, OaiSet};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeSet;

const ROOT: &str = "OAI-PMH";

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn xml_error(e: impl std::fmt::Display) -> OaiError {
    OaiError::Xml(e.to_string())
}

/// Walks a document, handing every element and text node to `visit` together
/// with the stack of open element names. Checks the root element and turns
/// an OAI-PMH `<error>` into [`OaiError::Protocol`].
fn walk<F>(xml: &str, mut visit: F) -> Result<(), OaiError>
where
    F: FnMut(Node<'_>),
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut seen_root = false;
    let mut protocol_error: Option<(String, String)> = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(ref e) => {
                let name = local_name(e);
                if !seen_root {
                    if name != ROOT {
                        return Err(OaiError::UnexpectedRoot(name));
                    }
                    seen_root = true;
                }
                if name == "error" && stack.len() == 1 {
                    let code = attribute(e, "code").unwrap_or_default();
                    protocol_error = Some((code, String::new()));
                }
                visit(Node::Open { path: &stack, name: &name });
                stack.push(name);
            }
            Event::Empty(ref e) => {
                let name = local_name(e);
                if !seen_root {
                    if name != ROOT {
                        return Err(OaiError::UnexpectedRoot(name));
                    }
                    seen_root = true;
                }
                if name == "error" && stack.len() == 1 {
                    let code = attribute(e, "code").unwrap_or_default();
                    protocol_error = Some((code, String::new()));
                }
                visit(Node::Open { path: &stack, name: &name });
            }
            Event::Text(ref t) => {
                let text = t.unescape().map_err(xml_error)?;
                if let Some((_, message)) = protocol_error.as_mut() {
                    if stack.last().map(String::as_str) == Some("error") {
                        message.push_str(&text);
                    }
                }
                visit(Node::Text { path: &stack, text: &text });
            }
            Event::CData(ref t) => {
                let text = String::from_utf8_lossy(t).to_string();
                visit(Node::Text { path: &stack, text: &text });
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(OaiError::Xml("document has no root element".to_string()));
    }
    if !stack.is_empty() {
        return Err(OaiError::Xml(format!("unclosed element <{}>", stack.join("/"))));
    }
    if let Some((code, message)) = protocol_error {
        return Err(OaiError::Protocol { code, message });
    }

    Ok(())
}

enum Node<'a> {
    Open {
        path: &'a [String],
        name: &'a str,
    },
    Text {
        path: &'a [String],
        text: &'a str,
    },
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.to_string()))
}

/// `path` ends with the given names, in order.
fn ends_with(path: &[String], tail: &[&str]) -> bool {
    path.len() >= tail.len()
        && path[path.len() - tail.len()..]
            .iter()
            .zip(tail)
            .all(|(a, b)| a == b)
}

/// Parses a `verb=Identify` response. Requires an `OAI-PMH` root with an
/// `Identify` child.
pub fn parse_identify(xml: &str) -> Result<IdentifyInfo, OaiError> {
    let mut info = IdentifyInfo::default();
    let mut found = false;

    walk(xml, |node| match node {
        Node::Open { path, name } => {
            if path.len() == 1 && name == "Identify" {
                found = true;
            }
        }
        Node::Text { path, text } => {
            if path.len() != 3 || path[1] != "Identify" {
                return;
            }
            let value = text.to_string();
            match path[2].as_str() {
                "repositoryName" => info.repository_name = value,
                "baseURL" => info.base_url = value,
                "protocolVersion" => info.protocol_version = value,
                "earliestDatestamp" => info.earliest_datestamp = Some(value),
                "deletedRecord" => info.deleted_record = Some(value),
                "granularity" => info.granularity = Some(value),
                "adminEmail" => info.admin_emails.push(value),
                _ => {}
            }
        }
    })?;

    if !found {
        return Err(OaiError::MissingElement("Identify"));
    }

    Ok(info)
}

/// Parses one `ListSets` page; returns the sets and the resumption token, if any.
pub fn parse_sets(xml: &str) -> Result<(Vec<OaiSet>, Option<String>), OaiError> {
    let mut sets = Vec::new();
    let mut token = None;

    walk(xml, |node| match node {
        Node::Open { path, name } => {
            if name == "set" && ends_with(path, &["ListSets"]) {
                sets.push(OaiSet::default());
            }
        }
        Node::Text { path, text } => {
            if ends_with(path, &["ListSets", "set", "setSpec"]) {
                if let Some(set) = sets.last_mut() {
                    set.spec = text.to_string();
                }
            } else if ends_with(path, &["ListSets", "set", "setName"]) {
                if let Some(set) = sets.last_mut() {
                    set.name = text.to_string();
                }
            } else if ends_with(path, &["ListSets", "resumptionToken"]) && !text.is_empty() {
                token = Some(text.to_string());
            }
        }
    })?;

    sets.retain(|s| !s.spec.is_empty());
    Ok((sets, token))
}

/// Collects the element names used inside each record's metadata payload
/// (the children of e.g. `oai_dc:dc`).
pub fn parse_record_properties(xml: &str) -> Result<BTreeSet<String>, OaiError> {
    let mut properties = BTreeSet::new();

    walk(xml, |node| {
        if let Node::Open { path, name } = node {
            let depth = path.len();
            if depth >= 1 && ends_with(&path[..depth - 1], &["record", "metadata"]) {
                properties.insert(name.to_string());
            }
        }
    })?;

    Ok(properties)
}
