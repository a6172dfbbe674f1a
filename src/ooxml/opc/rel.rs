//! Relationship parts (`*.rels`) of OPC packages.
use crate::error::{CompareError, Result};
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::opc::packuri::PackURI;
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;

/// A single relationship from a source part to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    r_id: String,
    /// Relationship type URI
    reltype: String,
    /// Target reference - either a relative part reference or external URL
    target_ref: String,
    is_external: bool,
}

impl Relationship {
    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.is_external
    }
}

/// Relationships from a single source, in document order.
#[derive(Debug, Clone)]
pub struct Relationships {
    /// Directory of the source part; relative targets resolve against it
    base_uri: String,
    rels: Vec<Relationship>,
}

impl Relationships {
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            rels: Vec::new(),
        }
    }

    /// Parse a `.rels` part.
    pub fn from_xml(base_uri: impl Into<String>, xml: &[u8]) -> Result<Self> {
        let mut rels = Self::new(base_uri);
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                    let mut rel = Relationship {
                        r_id: String::new(),
                        reltype: String::new(),
                        target_ref: String::new(),
                        is_external: false,
                    };
                    for attr in e.attributes() {
                        let attr = attr?;
                        let value = attr.unescape_value()?;
                        match attr.key.local_name().as_ref() {
                            b"Id" => rel.r_id = value.into_owned(),
                            b"Type" => rel.reltype = value.into_owned(),
                            b"Target" => rel.target_ref = value.into_owned(),
                            b"TargetMode" => rel.is_external = value == "External",
                            _ => {},
                        }
                    }
                    rels.rels.push(rel);
                },
                Event::Eof => break,
                _ => {},
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Add an internal relationship and return its new rId.
    pub fn add(&mut self, reltype: &str, target_ref: &str) -> String {
        let r_id = self.next_r_id();
        self.rels.push(Relationship {
            r_id: r_id.clone(),
            reltype: reltype.to_string(),
            target_ref: target_ref.to_string(),
            is_external: false,
        });
        r_id
    }

    /// First available "rIdN".
    fn next_r_id(&self) -> String {
        let mut n = self.rels.len() + 1;
        while self.rels.iter().any(|r| r.r_id == format!("rId{n}")) {
            n += 1;
        }
        format!("rId{n}")
    }

    /// First internal relationship of any of the given types.
    pub fn first_of_types(&self, reltypes: &[&str]) -> Option<&Relationship> {
        self.rels
            .iter()
            .find(|r| !r.is_external && reltypes.contains(&r.reltype.as_str()))
    }

    /// Absolute part name of an internal relationship's target.
    pub fn target_partname(&self, rel: &Relationship) -> Result<PackURI> {
        if rel.is_external {
            return Err(CompareError::Format(format!(
                "relationship {} points outside the package",
                rel.r_id
            )));
        }
        PackURI::from_rel_ref(&self.base_uri, &rel.target_ref).map_err(CompareError::Format)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// Serialize to a `.rels` part.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + self.rels.len() * 160);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<Relationships xmlns="{}">"#,
            namespace::OPC_RELATIONSHIPS
        ));

        for rel in &self.rels {
            let target_mode = if rel.is_external {
                r#" TargetMode="External""#
            } else {
                ""
            };
            xml.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                escape(rel.r_id.as_str()),
                escape(rel.reltype.as_str()),
                escape(rel.target_ref.as_str()),
                target_mode
            ));
        }

        xml.push_str("</Relationships>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::relationship_type as rt;

    #[test]
    fn test_next_r_id_skips_used() {
        let mut rels = Relationships::new("/word");
        assert_eq!(rels.add("type1", "a.xml"), "rId1");
        assert_eq!(rels.add("type1", "b.xml"), "rId2");
        assert_eq!(rels.len(), 2);
    }

    #[test]
    fn test_round_trip_and_resolve() {
        let mut rels = Relationships::new("/");
        rels.add(rt::OFFICE_DOCUMENT, "word/document.xml");
        rels.add(rt::CORE_PROPERTIES, "docProps/core.xml");

        let parsed = Relationships::from_xml("/", rels.to_xml().as_bytes()).unwrap();
        assert_eq!(parsed.len(), 2);
        let main = parsed.first_of_types(&[rt::OFFICE_DOCUMENT]).unwrap();
        assert_eq!(main.r_id(), "rId1");
        assert_eq!(
            parsed.target_partname(main).unwrap().as_str(),
            "/word/document.xml"
        );
    }

    #[test]
    fn test_external_relationship() {
        let xml = br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
            <Relationship Id="rId9" Type="http://x/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>
        </Relationships>"#;
        let rels = Relationships::from_xml("/word", xml).unwrap();
        let rel = rels.iter().next().unwrap();
        assert!(rel.is_external());
        assert_eq!(rel.target_ref(), "https://example.com/?a=1&b=2");
        assert!(rels.target_partname(rel).is_err());
        assert!(rels.first_of_types(&["http://x/hyperlink"]).is_none());
    }
}
