// ── XML flattening and leaf rewriting ──
//
// Flattening keys elements by local name (namespace prefixes dropped),
// relative to the document root. Repeated siblings get `[1]`, `[2]`, ...
// after the first occurrence, attributes become `path@name`, and each
// leaf is also reachable by its bare local name (first occurrence wins).
//
// Rewriting replaces the text of selected leaves and passes every other
// event through untouched, so namespaces and unknown elements survive a
// read-modify-write cycle.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::error::Error;
use crate::fields::{FieldBag, FieldValue};

const FORMAT: &str = "XML";

fn xml_err(err: impl std::fmt::Display) -> Error {
    Error::malformed(FORMAT, err.to_string())
}

/// Flatten a document; keys are relative to the root element.
pub fn flatten(body: &str) -> Result<FieldBag, Error> {
    flatten_with(body, 1, false)
}

/// Flatten a SOAP envelope; keys are relative to the element inside
/// `Body` (the `...Response` wrapper). The `Header` is ignored.
pub fn flatten_soap_body(body: &str) -> Result<FieldBag, Error> {
    flatten_with(body, 3, true)
}

/// Check that `body` parses as a single well-formed element tree.
pub fn validate_well_formed(body: &str) -> Result<(), Error> {
    let mut reader = Reader::from_str(body);
    let mut depth = 0usize;
    let mut roots = 0usize;
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(_) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Event::Empty(_) if depth == 0 => roots += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }
    match (roots, depth) {
        (0, _) => Err(xml_err("document has no root element")),
        (1, 0) => Ok(()),
        (_, 0) => Err(xml_err("document has more than one root element")),
        _ => Err(xml_err("unexpected end of document")),
    }
}

struct Frame {
    name: String,
    segment: String,
    children: HashMap<String, usize>,
}

fn push(stack: &mut Vec<Frame>, name: String) {
    let segment = match stack.last_mut() {
        Some(parent) => {
            let seen = parent.children.entry(name.clone()).or_insert(0);
            let segment = if *seen == 0 {
                name.clone()
            } else {
                format!("{name}[{seen}]")
            };
            *seen += 1;
            segment
        }
        None => name.clone(),
    };
    stack.push(Frame {
        name,
        segment,
        children: HashMap::new(),
    });
}

/// Dotted path of the innermost element, skipping the first `drop` levels.
fn path(stack: &[Frame], drop: usize) -> Option<String> {
    let tail = stack.get(drop..).filter(|t| !t.is_empty())?;
    Some(
        tail.iter()
            .map(|f| f.segment.as_str())
            .collect::<Vec<_>>()
            .join("."),
    )
}

fn local_name(start: &BytesStart<'_>) -> Result<String, Error> {
    std::str::from_utf8(start.local_name().as_ref())
        .map(str::to_owned)
        .map_err(xml_err)
}

fn record_attributes(
    start: &BytesStart<'_>,
    stack: &[Frame],
    drop: usize,
    bag: &mut FieldBag,
) -> Result<(), Error> {
    let base = path(stack, drop).unwrap_or_default();
    for attr in start.attributes() {
        let attr = attr.map_err(xml_err)?;
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let name = std::str::from_utf8(attr.key.local_name().as_ref())
            .map_err(xml_err)?
            .to_owned();
        let value = attr.unescape_value().map_err(xml_err)?;
        bag.insert(format!("{base}@{name}"), FieldValue::Text(value.into_owned()));
    }
    Ok(())
}

fn record_leaf(stack: &[Frame], drop: usize, text: String, bag: &mut FieldBag) {
    let Some(key) = path(stack, drop) else {
        return;
    };
    if let Some(frame) = stack.last() {
        bag.insert_if_absent(frame.name.clone(), FieldValue::Text(text.clone()));
    }
    bag.insert(key, FieldValue::Text(text));
}

fn flatten_with(body: &str, drop: usize, skip_header: bool) -> Result<FieldBag, Error> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut bag = FieldBag::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut skip_at: Option<usize> = None;
    let mut seen_root = false;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) => {
                push(&mut stack, local_name(&e)?);
                seen_root = true;
                if skip_header
                    && skip_at.is_none()
                    && stack.len() == 2
                    && stack.last().is_some_and(|f| f.name == "Header")
                {
                    skip_at = Some(stack.len());
                }
                if skip_at.is_none() {
                    record_attributes(&e, &stack, drop, &mut bag)?;
                }
            }
            Event::Empty(e) => {
                push(&mut stack, local_name(&e)?);
                seen_root = true;
                if skip_at.is_none() {
                    record_attributes(&e, &stack, drop, &mut bag)?;
                }
                stack.pop();
            }
            Event::End(_) => {
                if skip_at == Some(stack.len()) {
                    skip_at = None;
                }
                stack.pop();
            }
            Event::Text(t) if skip_at.is_none() => {
                let text = t.unescape().map_err(xml_err)?;
                record_leaf(&stack, drop, text.into_owned(), &mut bag);
            }
            Event::CData(c) if skip_at.is_none() => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                record_leaf(&stack, drop, text, &mut bag);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(xml_err("document has no root element"));
    }
    if !stack.is_empty() {
        return Err(xml_err("unexpected end of document"));
    }
    Ok(bag)
}

// ── Rewrite ─────────────────────────────────────────────────────────

/// Result of [`rewrite_leaves`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub document: String,
    /// Edit paths that matched no element.
    pub missing: Vec<String>,
}

/// Replace the text of the leaves named by `edits` (paths as produced by
/// [`flatten`]) and return the re-serialized document.
pub fn rewrite_leaves<'e>(doc: &str, edits: &[(&str, &'e str)]) -> Result<Rewrite, Error> {
    let mut reader = Reader::from_str(doc);
    let mut writer = Writer::new(Vec::new());
    let mut stack: Vec<Frame> = Vec::new();
    let mut applied = vec![false; edits.len()];
    // (depth of the element being rewritten, replacement not yet written)
    let mut active: Option<(usize, Option<&'e str>)> = None;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) => {
                push(&mut stack, local_name(&e)?);
                if active.is_none() {
                    active = find_edit(&stack, edits, &mut applied).map(|v| (stack.len(), Some(v)));
                }
                writer.write_event(Event::Start(e)).map_err(xml_err)?;
            }
            Event::Empty(e) => {
                push(&mut stack, local_name(&e)?);
                let replacement = if active.is_none() {
                    find_edit(&stack, edits, &mut applied)
                } else {
                    None
                };
                match replacement {
                    Some(value) => {
                        writer
                            .write_event(Event::Start(e.clone()))
                            .map_err(xml_err)?;
                        writer
                            .write_event(Event::Text(BytesText::new(value)))
                            .map_err(xml_err)?;
                        writer
                            .write_event(Event::End(e.to_end()))
                            .map_err(xml_err)?;
                    }
                    None => writer.write_event(Event::Empty(e)).map_err(xml_err)?,
                }
                stack.pop();
            }
            ev @ (Event::Text(_) | Event::CData(_)) => match &mut active {
                Some((depth, pending)) if *depth == stack.len() => {
                    if let Some(value) = pending.take() {
                        writer
                            .write_event(Event::Text(BytesText::new(value)))
                            .map_err(xml_err)?;
                    }
                }
                _ => writer.write_event(ev).map_err(xml_err)?,
            },
            Event::End(e) => {
                if let Some((depth, pending)) = active {
                    if depth == stack.len() {
                        if let Some(value) = pending {
                            writer
                                .write_event(Event::Text(BytesText::new(value)))
                                .map_err(xml_err)?;
                        }
                        active = None;
                    }
                }
                stack.pop();
                writer.write_event(Event::End(e)).map_err(xml_err)?;
            }
            Event::Eof => break,
            other => writer.write_event(other).map_err(xml_err)?,
        }
    }

    let missing: Vec<String> = edits
        .iter()
        .zip(&applied)
        .filter(|(_, done)| !**done)
        .map(|((p, _), _)| (*p).to_owned())
        .collect();
    if !missing.is_empty() {
        debug!(?missing, "rewrite targets not present in document");
    }

    let document = String::from_utf8(writer.into_inner()).map_err(xml_err)?;
    validate_well_formed(&document)?;
    Ok(Rewrite { document, missing })
}

fn find_edit<'e>(stack: &[Frame], edits: &[(&str, &'e str)], applied: &mut [bool]) -> Option<&'e str> {
    let current = path(stack, 1)?;
    let idx = edits.iter().position(|(p, _)| *p == current)?;
    if let Some(flag) = applied.get_mut(idx) {
        *flag = true;
    }
    edits.get(idx).map(|(_, value)| *value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fields::resolve;

    const IP_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<IPAddress version="2.0" xmlns="http://www.hikvision.com/ver20/XMLSchema">
  <ipVersion>v4</ipVersion>
  <addressingType>static</addressingType>
  <ipAddress>192.168.1.64</ipAddress>
  <subnetMask>255.255.255.0</subnetMask>
  <DefaultGateway>
    <ipAddress>192.168.1.1</ipAddress>
  </DefaultGateway>
  <PrimaryDNS>
    <ipAddress>8.8.8.8</ipAddress>
  </PrimaryDNS>
  <SecondaryDNS>
    <ipAddress></ipAddress>
  </SecondaryDNS>
</IPAddress>"#;

    #[test]
    fn flattens_relative_to_root_with_bare_aliases() {
        let bag = flatten(IP_DOC).unwrap();
        assert_eq!(resolve(&bag, &["ipAddress"], ""), "192.168.1.64");
        assert_eq!(resolve(&bag, &["DefaultGateway.ipAddress"], ""), "192.168.1.1");
        assert_eq!(resolve(&bag, &["PrimaryDNS.ipAddress"], ""), "8.8.8.8");
        assert_eq!(resolve(&bag, &["@version"], ""), "2.0");
        assert!(!bag.contains_key("@xmlns"));
    }

    #[test]
    fn repeated_siblings_are_indexed() {
        let bag = flatten("<r><s><v>a</v></s><s><v>b</v></s></r>").unwrap();
        assert_eq!(resolve(&bag, &["s.v"], ""), "a");
        assert_eq!(resolve(&bag, &["s[1].v"], ""), "b");
    }

    #[test]
    fn soap_body_keys_skip_envelope_and_header() {
        let env = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">
  <s:Header><Security><Username>x</Username></Security></s:Header>
  <s:Body>
    <tds:GetNetworkInterfacesResponse xmlns:tds="http://www.onvif.org/ver10/device/wsdl">
      <tds:NetworkInterfaces token="eth0">
        <tt:Info xmlns:tt="http://www.onvif.org/ver10/schema"><tt:HwAddress>00:11:22:33:44:55</tt:HwAddress></tt:Info>
      </tds:NetworkInterfaces>
    </tds:GetNetworkInterfacesResponse>
  </s:Body>
</s:Envelope>"#;
        let bag = flatten_soap_body(env).unwrap();
        assert_eq!(resolve(&bag, &["NetworkInterfaces@token"], ""), "eth0");
        assert_eq!(
            resolve(&bag, &["NetworkInterfaces.Info.HwAddress"], ""),
            "00:11:22:33:44:55"
        );
        assert!(!bag.contains_key("Username"));
    }

    #[test]
    fn rewrite_touches_only_target_leaves() {
        let out = rewrite_leaves(
            IP_DOC,
            &[
                ("ipAddress", "10.0.0.20"),
                ("DefaultGateway.ipAddress", "10.0.0.1"),
                ("SecondaryDNS.ipAddress", "1.1.1.1"),
                ("NoSuch.leaf", "x"),
            ],
        )
        .unwrap();
        assert_eq!(out.missing, vec!["NoSuch.leaf".to_owned()]);
        assert!(out.document.contains(r#"xmlns="http://www.hikvision.com/ver20/XMLSchema""#));
        assert!(out.document.contains("<ipVersion>v4</ipVersion>"));

        let bag = flatten(&out.document).unwrap();
        assert_eq!(resolve(&bag, &["ipAddress"], ""), "10.0.0.20");
        assert_eq!(resolve(&bag, &["DefaultGateway.ipAddress"], ""), "10.0.0.1");
        assert_eq!(resolve(&bag, &["PrimaryDNS.ipAddress"], ""), "8.8.8.8");
        assert_eq!(resolve(&bag, &["SecondaryDNS.ipAddress"], ""), "1.1.1.1");
    }

    #[test]
    fn rewrite_escapes_values() {
        let out = rewrite_leaves("<a><b/></a>", &[("b", "x<y")]).unwrap();
        assert_eq!(out.document, "<a><b>x&lt;y</b></a>");
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(flatten("<a><b></a>").is_err());
        assert!(flatten("<a><b>").is_err());
        assert!(flatten("").is_err());
        assert!(validate_well_formed("<a/><b/>").is_err());
        assert!(validate_well_formed("<a><b/></a>").is_ok());
    }
}
