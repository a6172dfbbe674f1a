//! The `[Content_Types].xml` item.
use crate::error::Result;
use crate::ooxml::opc::constants::{content_type as ct, namespace};
use crate::ooxml::opc::packuri::PackURI;
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use std::collections::BTreeMap;

/// Maps part names to content types: overrides by part name first, then
/// defaults by extension. Both lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct ContentTypes {
    /// Lower-cased extension to content type
    defaults: BTreeMap<String, String>,
    /// Lower-cased part name to (part name, content type)
    overrides: BTreeMap<String, (String, String)>,
}

impl Default for ContentTypes {
    fn default() -> Self {
        let mut defaults = BTreeMap::new();
        defaults.insert("rels".to_string(), ct::OPC_RELATIONSHIPS.to_string());
        defaults.insert("xml".to_string(), ct::XML.to_string());
        Self {
            defaults,
            overrides: BTreeMap::new(),
        }
    }
}

impl ContentTypes {
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut types = Self {
            defaults: BTreeMap::new(),
            overrides: BTreeMap::new(),
        };
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) => {
                    let kind = e.local_name().as_ref().to_vec();
                    if kind != b"Default" && kind != b"Override" {
                        buf.clear();
                        continue;
                    }
                    let mut key = None;
                    let mut content_type = None;
                    for attr in e.attributes() {
                        let attr = attr?;
                        let value = attr.unescape_value()?.into_owned();
                        match attr.key.local_name().as_ref() {
                            b"Extension" | b"PartName" => key = Some(value),
                            b"ContentType" => content_type = Some(value),
                            _ => {},
                        }
                    }
                    if let (Some(key), Some(content_type)) = (key, content_type) {
                        if kind == b"Default" {
                            types.defaults.insert(key.to_lowercase(), content_type);
                        } else {
                            types
                                .overrides
                                .insert(key.to_lowercase(), (key, content_type));
                        }
                    }
                },
                Event::Eof => break,
                _ => {},
            }
            buf.clear();
        }

        Ok(types)
    }

    /// Content type of a part, if declared.
    pub fn content_type(&self, uri: &PackURI) -> Option<&str> {
        self.overrides
            .get(&uri.as_str().to_lowercase())
            .map(|(_, ct)| ct.as_str())
            .or_else(|| {
                self.defaults
                    .get(&uri.ext().to_lowercase())
                    .map(String::as_str)
            })
    }

    /// Declare `content_type` for `uri`, using the extension default when it
    /// already matches.
    pub fn declare(&mut self, uri: &PackURI, content_type: &str) {
        let ext = uri.ext().to_lowercase();
        if self.defaults.get(&ext).is_some_and(|d| d == content_type) {
            return;
        }
        self.overrides.insert(
            uri.as_str().to_lowercase(),
            (uri.as_str().to_string(), content_type.to_string()),
        );
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(512 + self.overrides.len() * 160);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(r#"<Types xmlns="{}">"#, namespace::OPC_CONTENT_TYPES));
        for (ext, content_type) in &self.defaults {
            xml.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape(ext.as_str()),
                escape(content_type.as_str())
            ));
        }
        for (partname, content_type) in self.overrides.values() {
            xml.push_str(&format!(
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                escape(partname.as_str()),
                escape(content_type.as_str())
            ));
        }
        xml.push_str("</Types>");
        xml
    }
}
