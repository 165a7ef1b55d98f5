//! Submission document exchanged with asynchronous providers
//!
//! Every translatable unit carries the id of the queue item it came from,
//! and the provider is expected to echo that id back on the translated unit.
//! That echo is the only link between a result and its queue item.
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <translations id="PROJECT" source_language="en-us" target_language="fr-fr">
//!   <t id="QUEUE_ITEM_ID"><![CDATA[Source text]]></t>
//! </translations>
//! ```

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{Error, Result};

const ROOT_TAG: &str = "translations";
const UNIT_TAG: &str = "t";

/// One translatable unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadUnit {
    pub id: String,
    pub text: String,
}

impl PayloadUnit {
    pub fn new(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionDocument {
    pub project_id: String,
    pub source_language: String,
    pub target_language: String,
    pub units: Vec<PayloadUnit>,
}

fn payload_error(context: &str, err: impl std::fmt::Display) -> Error {
    Error::Payload(format!("{}: {}", context, err))
}

/// Serialize a submission document
///
/// Texts are written as CDATA sections, except texts containing `]]>`, which
/// cannot live inside CDATA and are written as escaped text instead.
pub fn build_document(document: &SubmissionDocument) -> Result<String> {
    let mut writer = Writer::new(Vec::new());

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(|e| payload_error("writing declaration", e))?;

    let mut root = BytesStart::new(ROOT_TAG);
    root.push_attribute(("id", document.project_id.as_str()));
    root.push_attribute(("source_language", document.source_language.as_str()));
    root.push_attribute(("target_language", document.target_language.as_str()));
    writer
        .write_event(Event::Start(root))
        .map_err(|e| payload_error("writing root element", e))?;

    for unit in &document.units {
        let mut start = BytesStart::new(UNIT_TAG);
        start.push_attribute(("id", unit.id.as_str()));
        writer
            .write_event(Event::Start(start))
            .map_err(|e| payload_error("writing unit", e))?;

        let content = if unit.text.contains("]]>") {
            Event::Text(BytesText::new(&unit.text))
        } else {
            Event::CData(BytesCData::new(unit.text.as_str()))
        };
        writer
            .write_event(content)
            .map_err(|e| payload_error("writing unit text", e))?;

        writer
            .write_event(Event::End(BytesEnd::new(UNIT_TAG)))
            .map_err(|e| payload_error("closing unit", e))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(ROOT_TAG)))
        .map_err(|e| payload_error("closing root element", e))?;

    String::from_utf8(writer.into_inner()).map_err(|e| payload_error("encoding document", e))
}

/// Read every `<t id="...">` unit of a result document, in document order
///
/// Unit text may be CDATA, escaped text or a mix of both. Whitespace-only
/// text around a CDATA section (pretty-printed documents) is ignored.
pub fn parse_units(xml: &str) -> Result<Vec<PayloadUnit>> {
    let mut reader = Reader::from_str(xml);
    let mut units = Vec::new();

    // (id, collected text, saw CDATA)
    let mut current: Option<(String, String, bool)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == UNIT_TAG.as_bytes() => {
                current = Some((unit_id(&e)?, String::new(), false));
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == UNIT_TAG.as_bytes() => {
                units.push(PayloadUnit {
                    id: unit_id(&e)?,
                    text: String::new(),
                });
            }
            Ok(Event::CData(e)) => {
                if let Some((_, text, saw_cdata)) = current.as_mut() {
                    if !*saw_cdata && text.trim().is_empty() {
                        text.clear();
                    }
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    *saw_cdata = true;
                }
            }
            Ok(Event::Text(e)) => {
                if let Some((_, text, saw_cdata)) = current.as_mut() {
                    let unescaped = e
                        .unescape()
                        .map_err(|err| payload_error("unescaping unit text", err))?;
                    if !(*saw_cdata && unescaped.trim().is_empty()) {
                        text.push_str(&unescaped);
                    }
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == UNIT_TAG.as_bytes() => {
                if let Some((id, text, _)) = current.take() {
                    units.push(PayloadUnit { id, text });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(payload_error(
                    &format!("malformed document at byte {}", reader.buffer_position()),
                    e,
                ));
            }
            _ => {}
        }
    }

    Ok(units)
}

fn unit_id(element: &BytesStart<'_>) -> Result<String> {
    let attribute = element
        .try_get_attribute("id")
        .map_err(|e| payload_error("reading unit attributes", e))?
        .ok_or_else(|| Error::Payload("translation unit without id".to_string()))?;
    let value = attribute
        .unescape_value()
        .map_err(|e| payload_error("reading unit id", e))?;
    Ok(value.into_owned())
}

/// Longest HTML5 entity name plus its `&` and `;`
const MAX_REFERENCE_LEN: usize = 40;

/// Decode XML/HTML character references (`&amp;`, `&#39;`, `&nbsp;`, ...) in
/// provider output
///
/// References are decoded one at a time; an unknown one is left in place
/// without affecting the others.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        decoded.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = tail[1..]
            .find(|c: char| c == ';' || c == '&' || c.is_whitespace())
            .map(|i| i + 1)
            .filter(|&i| i < MAX_REFERENCE_LEN && tail[i..].starts_with(';'));
        match end {
            Some(end) => {
                let reference = &tail[..=end];
                match unescape_with(reference, resolve_html5_entity) {
                    Ok(value) => decoded.push_str(&value),
                    Err(_) => decoded.push_str(reference),
                }
                rest = &tail[end + 1..];
            }
            None => {
                decoded.push('&');
                rest = &tail[1..];
            }
        }
    }
    decoded.push_str(rest);
    Cow::Owned(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(units: Vec<PayloadUnit>) -> SubmissionDocument {
        SubmissionDocument {
            project_id: "p-1".to_string(),
            source_language: "en-us".to_string(),
            target_language: "fr-fr".to_string(),
            units,
        }
    }

    #[test]
    fn test_build_document_tags_every_unit() {
        let xml = build_document(&document(vec![
            PayloadUnit::new("a:fr:OHT", "Hello"),
            PayloadUnit::new("b:fr:OHT", "Goodbye"),
        ]))
        .unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains(
            r#"<translations id="p-1" source_language="en-us" target_language="fr-fr">"#
        ));
        assert!(xml.contains(r#"<t id="a:fr:OHT"><![CDATA[Hello]]></t>"#));
        assert!(xml.contains(r#"<t id="b:fr:OHT"><![CDATA[Goodbye]]></t>"#));
    }

    #[test]
    fn test_units_survive_the_document() {
        let units = vec![
            PayloadUnit::new("a", "Hello {name}, <b>welcome</b> & enjoy"),
            PayloadUnit::new("b", ""),
            PayloadUnit::new("c", "tricky ]]> content"),
        ];
        let xml = build_document(&document(units.clone())).unwrap();
        assert_eq!(parse_units(&xml).unwrap(), units);
    }

    #[test]
    fn test_parse_pretty_printed_result() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<translations id="p-1">
  <t id="a">
    <![CDATA[Bonjour]]>
  </t>
  <t id="b">Au revoir &amp; merci</t>
  <t id="c"/>
</translations>"#;
        let units = parse_units(xml).unwrap();
        assert_eq!(
            units,
            vec![
                PayloadUnit::new("a", "Bonjour"),
                PayloadUnit::new("b", "Au revoir & merci"),
                PayloadUnit::new("c", ""),
            ]
        );
    }

    #[test]
    fn test_unit_without_id_is_rejected() {
        let xml = "<translations><t>Bonjour</t></translations>";
        assert!(matches!(parse_units(xml), Err(Error::Payload(_))));
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        let xml = "<translations><t id=\"a\">Bonjour</x></translations>";
        assert!(parse_units(xml).is_err());
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("l&#39;homme &amp; la femme"), "l'homme & la femme");
        assert_eq!(decode_entities("&quot;ok&quot;"), "\"ok\"");
        assert_eq!(decode_entities("plain"), "plain");
        assert_eq!(decode_entities("caf&eacute;"), "café");
    }

    #[test]
    fn test_decode_entities_one_reference_at_a_time() {
        assert_eq!(decode_entities("Tom &amp; Jerry&nbsp;!"), "Tom & Jerry\u{a0}!");
        assert_eq!(decode_entities("&bogus; &amp; &lt;b&gt;"), "&bogus; & <b>");
        assert_eq!(decode_entities("R&D &amp; more"), "R&D & more");
        assert_eq!(decode_entities("trailing &"), "trailing &");
    }
}
