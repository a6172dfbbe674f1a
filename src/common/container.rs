//! Container detection from leading signature bytes.
//!
//! A plain .docx is a ZIP archive. A password-protected .docx is an OLE2
//! compound file wrapping the encrypted ZIP, so the first bytes are enough
//! to decide whether a password is needed before any parsing happens.
use crate::ole::consts::MAGIC as OLE_MAGIC;

/// Local file header signature of a ZIP archive.
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";
/// End of central directory signature (an empty ZIP archive starts with it).
const ZIP_EMPTY_MAGIC: &[u8; 4] = b"PK\x05\x06";

/// Outer container of a document file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// ZIP-based OPC package (.docx, .docm, .dotx, .dotm)
    Zip,
    /// OLE2 compound file (encrypted OOXML or legacy binary .doc)
    Ole,
    /// Anything else
    Unknown,
}

/// Detect the outer container from the leading bytes.
///
/// # Examples
///
/// ```rust
/// use litchi_compare::common::{ContainerKind, detect_container};
///
/// assert_eq!(detect_container(b"PK\x03\x04rest"), ContainerKind::Zip);
/// assert_eq!(detect_container(b"plain text"), ContainerKind::Unknown);
/// ```
pub fn detect_container(bytes: &[u8]) -> ContainerKind {
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(ZIP_EMPTY_MAGIC) {
        ContainerKind::Zip
    } else if bytes.starts_with(OLE_MAGIC) {
        ContainerKind::Ole
    } else {
        ContainerKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_ole() {
        let mut data = OLE_MAGIC.to_vec();
        data.extend_from_slice(&[0u8; 16]);
        assert_eq!(detect_container(&data), ContainerKind::Ole);
    }

    #[test]
    fn test_detect_short_input() {
        assert_eq!(detect_container(b"PK"), ContainerKind::Unknown);
        assert_eq!(detect_container(b""), ContainerKind::Unknown);
    }
}
