//! Package writer for OPC packages.
//!
//! Writes `[Content_Types].xml` first, then every part in part-name order,
//! all deflate-compressed.
use crate::error::Result;
use crate::ooxml::opc::package::OpcPackage;
use crate::ooxml::opc::packuri::CONTENT_TYPES_URI;
use std::io::{Cursor, Write};
use zip::write::{SimpleFileOptions, ZipWriter};

/// Serializes an [`OpcPackage`] to a ZIP archive.
pub struct PackageWriter;

impl PackageWriter {
    pub fn to_bytes(package: &OpcPackage) -> Result<Vec<u8>> {
        let mut zip_writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip_writer.start_file(&CONTENT_TYPES_URI[1..], options)?;
        zip_writer.write_all(package.content_types().to_xml().as_bytes())?;

        for (uri, data) in package.parts() {
            zip_writer.start_file(uri.membername(), options)?;
            zip_writer.write_all(data)?;
        }

        Ok(zip_writer.finish()?.into_inner())
    }

    /// Serialize and write to any sink.
    pub fn write_to_stream<W: Write>(mut writer: W, package: &OpcPackage) -> Result<()> {
        writer.write_all(&Self::to_bytes(package)?)?;
        Ok(())
    }
}
