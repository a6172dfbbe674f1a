/// Loading and saving .docx files.
///
/// Both plain OPC packages and password-protected packages (an OLE
/// compound file wrapping the encrypted ZIP) are accepted. The container is
/// recognized by its leading bytes, never by the file extension.
use crate::common::{CancellationToken, ContainerKind, detect_container};
use crate::error::{CompareError, DocumentRole, PasswordIssue, Result};
use crate::ole::OleFile;
use crate::ooxml::crypto::{self, EncryptionScheme};
use crate::ooxml::docx::model::DocumentTree;
use crate::ooxml::docx::{reader, writer};
use crate::ooxml::opc::OpcPackage;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Load a document from a file.
///
/// A missing file is reported as [`CompareError::InputNotFound`] with the
/// source role.
///
/// # Examples
///
/// ```rust,no_run
/// use litchi_compare::ooxml::docx;
///
/// let tree = docx::load("report.docx", None)?;
/// println!("{} blocks", tree.blocks.len());
/// # Ok::<(), litchi_compare::CompareError>(())
/// ```
pub fn load<P: AsRef<Path>>(path: P, password: Option<&str>) -> Result<DocumentTree> {
    load_as(
        path.as_ref(),
        password,
        DocumentRole::Source,
        &CancellationToken::new(),
    )
}

/// Load a document from a file on behalf of one side of a comparison.
pub(crate) fn load_as(
    path: &Path,
    password: Option<&str>,
    role: DocumentRole,
    cancel: &CancellationToken,
) -> Result<DocumentTree> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CompareError::InputNotFound {
                role,
                path: path.to_path_buf(),
            });
        },
        Err(e) => return Err(CompareError::io_at(path, e)),
    };
    load_from_reader_with_cancel(file, password, cancel).map_err(|e| e.in_document(role, path))
}

/// Load a document from any byte stream.
///
/// The reader is consumed and dropped before this returns, on success and
/// on failure.
pub fn load_from_reader<R: Read>(reader: R, password: Option<&str>) -> Result<DocumentTree> {
    load_from_reader_with_cancel(reader, password, &CancellationToken::new())
}

/// [`load_from_reader`] with a cancellation token polled between reads.
pub fn load_from_reader_with_cancel<R: Read>(
    reader: R,
    password: Option<&str>,
    cancel: &CancellationToken,
) -> Result<DocumentTree> {
    let bytes = cancel.read_to_end(reader)?;
    load_from_bytes(&bytes, password, cancel)
}

/// Load a document from its raw file bytes.
pub fn load_from_bytes(
    bytes: &[u8],
    password: Option<&str>,
    cancel: &CancellationToken,
) -> Result<DocumentTree> {
    let plain = match detect_container(bytes) {
        ContainerKind::Zip => {
            if password.is_some() {
                tracing::warn!("document is not encrypted; ignoring the supplied password");
            }
            None
        },
        ContainerKind::Ole => Some(unlock_container(bytes, password)?),
        ContainerKind::Unknown => {
            return Err(CompareError::Format(
                "not a WordprocessingML package (unrecognized file signature)".to_string(),
            ));
        },
    };
    cancel.check()?;

    let package_bytes = plain.as_deref().unwrap_or(bytes);
    if detect_container(package_bytes) != ContainerKind::Zip {
        return Err(CompareError::Format(
            "decrypted package is not a ZIP archive".to_string(),
        ));
    }
    let package = OpcPackage::from_bytes(package_bytes, cancel)?;
    cancel.check()?;
    reader::read_document(&package, cancel)
}

/// Decrypt an OLE-wrapped package.
fn unlock_container(bytes: &[u8], password: Option<&str>) -> Result<Vec<u8>> {
    let ole = OleFile::from_bytes(bytes.to_vec())?;
    if !ole.exists(&["EncryptionInfo"]) || !ole.exists(&["EncryptedPackage"]) {
        return Err(CompareError::Format(
            "compound file holds no encrypted package (legacy binary .doc is not supported)"
                .to_string(),
        ));
    }
    let password = password.ok_or_else(|| {
        CompareError::password(PasswordIssue::Missing, "document is password protected")
    })?;
    crypto::unlock(bytes, password)
}

/// Serialize a tree to .docx bytes, encrypted when a password is given.
pub fn to_bytes(
    tree: &DocumentTree,
    password: Option<&str>,
    scheme: EncryptionScheme,
) -> Result<Vec<u8>> {
    let package = writer::build_package(tree)?.to_bytes()?;
    match password {
        Some(password) => crypto::lock(&package, password, scheme),
        None => Ok(package),
    }
}

/// Save a tree to a file; encrypted with Agile encryption when a password
/// is given.
pub fn save<P: AsRef<Path>>(tree: &DocumentTree, path: P, password: Option<&str>) -> Result<()> {
    save_with_scheme(tree, path, password, EncryptionScheme::default())
}

/// Save a tree to a file atomically.
///
/// The whole file is produced in memory, written to a temporary file next
/// to the destination and renamed over it. Missing parent directories are
/// created. On failure nothing appears at `path`.
pub fn save_with_scheme<P: AsRef<Path>>(
    tree: &DocumentTree,
    path: P,
    password: Option<&str>,
    scheme: EncryptionScheme,
) -> Result<()> {
    let path = path.as_ref();
    let bytes = to_bytes(tree, password, scheme)?;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| CompareError::io_at(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CompareError::io_at(dir, e))?;
    tmp.write_all(&bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| CompareError::io_at(path, e))?;
    tmp.persist(path)
        .map_err(|e| CompareError::io_at(path, e.error))?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved document");
    Ok(())
}

/// Serialize a tree into a writer.
pub fn save_to_writer<W: Write>(
    tree: &DocumentTree,
    mut writer: W,
    password: Option<&str>,
    scheme: EncryptionScheme,
) -> Result<()> {
    let bytes = to_bytes(tree, password, scheme)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::docx::model::{Block, Paragraph, Run, RunAttributes, RunFlags};
    use std::io::Cursor;

    fn sample() -> DocumentTree {
        DocumentTree::new(vec![
            Block::Paragraph(Paragraph::from_text("Hello world")),
            Block::Paragraph(Paragraph::from_runs([Run::new(
                "bold",
                RunAttributes {
                    flags: RunFlags::BOLD,
                    ..Default::default()
                },
            )])),
        ])
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.docx");
        let tree = sample();
        save(&tree, &path, None).unwrap();

        let loaded = load(&path, None).unwrap();
        assert_eq!(loaded.blocks, tree.blocks);
        // Only the destination remains in the directory
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_load_from_reader_matches_bytes() {
        let mut out = Vec::new();
        save_to_writer(&sample(), &mut out, None, EncryptionScheme::Agile).unwrap();
        let from_reader = load_from_reader(Cursor::new(out.clone()), None).unwrap();
        let from_bytes = load_from_bytes(&out, None, &CancellationToken::new()).unwrap();
        assert_eq!(from_reader, from_bytes);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path().join("absent.docx"), None).unwrap_err();
        assert!(matches!(
            err,
            CompareError::InputNotFound {
                role: DocumentRole::Source,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_signature() {
        let err = load_from_reader(Cursor::new(b"plain text".to_vec()), None).unwrap_err();
        assert!(err.is_format_error());
        let err = load_from_reader(Cursor::new(Vec::new()), None).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_unencrypted_ole_is_format_error() {
        let mut writer = crate::ole::OleWriter::new();
        writer.create_stream(&["WordDocument"], b"legacy").unwrap();
        let bytes = writer.to_bytes().unwrap();
        let err = load_from_bytes(&bytes, Some("pw"), &CancellationToken::new()).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_cancelled_load() {
        let mut out = Vec::new();
        save_to_writer(&sample(), &mut out, None, EncryptionScheme::Agile).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = load_from_reader_with_cancel(Cursor::new(out), None, &token).unwrap_err();
        assert!(matches!(err, CompareError::Cancelled));
    }

    #[cfg(feature = "encryption")]
    #[test]
    fn test_encrypted_round_trip() {
        let tree = sample();
        for scheme in [EncryptionScheme::Agile, EncryptionScheme::Standard] {
            let bytes = to_bytes(&tree, Some("s3cret"), scheme).unwrap();
            assert_eq!(detect_container(&bytes), ContainerKind::Ole);

            let token = CancellationToken::new();
            let loaded = load_from_bytes(&bytes, Some("s3cret"), &token).unwrap();
            assert_eq!(loaded.blocks, tree.blocks);

            let err = load_from_bytes(&bytes, Some("wrong"), &token).unwrap_err();
            assert!(err.is_password_error());
            assert!(!err.is_format_error());

            let err = load_from_bytes(&bytes, None, &token).unwrap_err();
            assert!(matches!(
                err,
                CompareError::Password {
                    reason: PasswordIssue::Missing,
                    ..
                }
            ));
        }
    }

    #[cfg(not(feature = "encryption"))]
    #[test]
    fn test_encryption_unavailable() {
        let err = to_bytes(&sample(), Some("pw"), EncryptionScheme::Agile).unwrap_err();
        assert!(matches!(
            err,
            CompareError::Password {
                reason: PasswordIssue::Unsupported,
                ..
            }
        ));
    }
}
