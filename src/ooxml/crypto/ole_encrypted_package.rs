use crate::error::{CompareError, Result};
use crate::ole::{OleFile, OleWriter};

const DATASPACES: &str = "\u{0006}DataSpaces";

/// Build an OLE compound file that wraps the given OOXML `EncryptionInfo`
/// and `EncryptedPackage` streams with the standard StrongEncryptionDataSpace
/// DataSpaces structure.
pub(crate) fn build_ole_encrypted_package(
    encryption_info: &[u8],
    encrypted_package: &[u8],
) -> Result<Vec<u8>> {
    let mut writer = OleWriter::new();

    writer.create_stream(&["EncryptionInfo"], encryption_info)?;
    writer.create_stream(&["EncryptedPackage"], encrypted_package)?;

    writer.create_storage(&[DATASPACES, "DataSpaceInfo"])?;
    writer.create_storage(&[DATASPACES, "TransformInfo", "StrongEncryptionTransform"])?;

    writer.create_stream(&[DATASPACES, "DataSpaceMap"], &build_dataspace_map_stream())?;
    writer.create_stream(
        &[DATASPACES, "DataSpaceInfo", "StrongEncryptionDataSpace"],
        &build_dataspace_definition_stream(),
    )?;
    writer.create_stream(
        &[
            DATASPACES,
            "TransformInfo",
            "StrongEncryptionTransform",
            "\u{0006}Primary",
        ],
        &build_transform_primary_stream(),
    )?;
    writer.create_stream(&[DATASPACES, "Version"], &build_dataspace_version_stream())?;

    Ok(writer.to_bytes()?)
}

/// Extract the `EncryptionInfo` and `EncryptedPackage` streams.
///
/// A compound file without them (a legacy binary document, say) is a
/// format error rather than a password problem.
pub(crate) fn read_ole_encrypted_package(container: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let ole = OleFile::from_bytes(container.to_vec())?;
    if !ole.exists(&["EncryptionInfo"]) || !ole.exists(&["EncryptedPackage"]) {
        return Err(CompareError::Format(
            "compound file is not an encrypted OOXML package".to_string(),
        ));
    }
    let info = ole.open_stream(&["EncryptionInfo"])?;
    let package = ole.open_stream(&["EncryptedPackage"])?;
    Ok((info, package))
}

fn write_unicode_lpp4(buf: &mut Vec<u8>, s: &str) {
    let start = buf.len();
    buf.extend_from_slice(&0u32.to_le_bytes());
    for ch in s.encode_utf16() {
        buf.extend_from_slice(&ch.to_le_bytes());
    }
    let len = (buf.len() - start - 4) as u32;
    buf[start..start + 4].copy_from_slice(&len.to_le_bytes());
    if len % 4 == 2 {
        buf.extend_from_slice(&0u16.to_le_bytes());
    }
}

/// Three (major, minor) version pairs: reader, updater, writer.
fn write_versions_1_0(buf: &mut Vec<u8>) {
    for _ in 0..3 {
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
    }
}

fn build_dataspace_map_stream() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&8u32.to_le_bytes()); // header length
    buf.extend_from_slice(&1u32.to_le_bytes()); // entry count

    let entry_start = buf.len();
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes()); // reference components
    buf.extend_from_slice(&0u32.to_le_bytes()); // component type: stream
    write_unicode_lpp4(&mut buf, "EncryptedPackage");
    write_unicode_lpp4(&mut buf, "StrongEncryptionDataSpace");
    let entry_len = (buf.len() - entry_start) as u32;
    buf[entry_start..entry_start + 4].copy_from_slice(&entry_len.to_le_bytes());

    buf
}

fn build_dataspace_definition_stream() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&8u32.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());
    write_unicode_lpp4(&mut buf, "StrongEncryptionTransform");
    buf
}

fn build_transform_primary_stream() -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes()); // transform type
    write_unicode_lpp4(&mut buf, "{FF9A3F03-56EF-4613-BDD5-5A41C1D07246}");
    let header_len = buf.len() as u32;
    buf[0..4].copy_from_slice(&header_len.to_le_bytes());

    write_unicode_lpp4(&mut buf, "Microsoft.Container.EncryptionTransform");
    write_versions_1_0(&mut buf);

    buf.extend_from_slice(&0u32.to_le_bytes()); // cipher name: empty
    buf.extend_from_slice(&0u32.to_le_bytes()); // block size
    buf.extend_from_slice(&0u32.to_le_bytes()); // cipher mode
    buf.extend_from_slice(&4u32.to_le_bytes()); // reserved

    buf
}

fn build_dataspace_version_stream() -> Vec<u8> {
    let mut buf = Vec::new();
    write_unicode_lpp4(&mut buf, "Microsoft.Container.DataSpaces");
    write_versions_1_0(&mut buf);
    buf
}
