/// In-memory OPC packages.
///
/// An [`OpcPackage`] holds every part of a ZIP package as raw bytes keyed
/// by part name, plus the content-type map. XML parts are parsed by the
/// format layers on top.
use crate::common::CancellationToken;
use crate::error::{CompareError, Result};
use crate::ooxml::opc::constants::{content_type as ct, relationship_type as rt};
use crate::ooxml::opc::content_types::ContentTypes;
use crate::ooxml::opc::packuri::{CONTENT_TYPES_URI, PACKAGE_URI, PackURI};
use crate::ooxml::opc::pkgwriter::PackageWriter;
use crate::ooxml::opc::rel::Relationships;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};

/// Fallback location of the main document part when `_rels/.rels` does
/// not name one.
const DEFAULT_MAIN_PART: &str = "/word/document.xml";

#[derive(Debug, Clone, Default)]
pub struct OpcPackage {
    parts: BTreeMap<PackURI, Vec<u8>>,
    content_types: ContentTypes,
}

impl OpcPackage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every member of a ZIP package.
    ///
    /// The token is checked between members.
    pub fn from_bytes(bytes: &[u8], cancel: &CancellationToken) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| CompareError::Format(format!("Invalid ZIP archive: {e}")))?;

        let mut parts = BTreeMap::new();
        let mut content_types = None;
        for i in 0..archive.len() {
            cancel.check()?;
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let uri = PackURI::from_membername(file.name());
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;

            if uri.as_str().eq_ignore_ascii_case(CONTENT_TYPES_URI) {
                content_types = Some(ContentTypes::from_xml(&data)?);
            } else {
                parts.insert(uri, data);
            }
        }

        let content_types = content_types.ok_or_else(|| {
            CompareError::Format("package has no [Content_Types].xml".to_string())
        })?;
        tracing::debug!(parts = parts.len(), "read OPC package");

        Ok(Self {
            parts,
            content_types,
        })
    }

    /// Raw bytes of a part.
    pub fn part(&self, uri: &PackURI) -> Option<&[u8]> {
        self.parts.get(uri).map(Vec::as_slice).or_else(|| {
            // Part names compare case-insensitively
            self.parts
                .iter()
                .find(|(k, _)| k.as_str().eq_ignore_ascii_case(uri.as_str()))
                .map(|(_, v)| v.as_slice())
        })
    }

    /// Add or replace a part and declare its content type.
    pub fn add_part(&mut self, uri: PackURI, content_type: &str, data: Vec<u8>) {
        self.content_types.declare(&uri, content_type);
        self.parts.insert(uri, data);
    }

    /// Add a relationships part for `source`.
    pub fn set_relationships(&mut self, source: &PackURI, rels: &Relationships) {
        self.add_part(
            source.rels_uri(),
            ct::OPC_RELATIONSHIPS,
            rels.to_xml().into_bytes(),
        );
    }

    pub fn content_type(&self, uri: &PackURI) -> Option<&str> {
        self.content_types.content_type(uri)
    }

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// Parts in part-name order.
    pub fn parts(&self) -> impl Iterator<Item = (&PackURI, &[u8])> {
        self.parts.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Relationships whose source is `source`; empty when it has none.
    pub fn relationships(&self, source: &PackURI) -> Result<Relationships> {
        match self.part(&source.rels_uri()) {
            Some(xml) => Relationships::from_xml(source.base_uri(), xml),
            None => Ok(Relationships::new(source.base_uri())),
        }
    }

    /// Locate the WordprocessingML main document part.
    ///
    /// Follows the package-level `officeDocument` relationship, falling back
    /// to `/word/document.xml`, and checks the part's content type.
    pub fn main_document_part(&self) -> Result<PackURI> {
        let root = PackURI::new(PACKAGE_URI).map_err(CompareError::Format)?;
        let rels = self.relationships(&root)?;

        let uri = match rels.first_of_types(&[rt::OFFICE_DOCUMENT, rt::OFFICE_DOCUMENT_STRICT]) {
            Some(rel) => rels.target_partname(rel)?,
            None => PackURI::new(DEFAULT_MAIN_PART).map_err(CompareError::Format)?,
        };

        if self.part(&uri).is_none() {
            return Err(CompareError::Format(format!(
                "main document part {uri} is missing"
            )));
        }

        match self.content_type(&uri) {
            Some(content_type) if ct::WML_MAIN_PARTS.contains(&content_type) => Ok(uri),
            Some(other) => Err(CompareError::Format(format!(
                "{uri} is not a WordprocessingML document (content type {other})"
            ))),
            None => Err(CompareError::Format(format!(
                "{uri} has no declared content type"
            ))),
        }
    }

    /// Serialize to ZIP bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        PackageWriter::to_bytes(self)
    }
}
