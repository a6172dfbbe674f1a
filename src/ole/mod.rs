//! OLE2 compound file support.
//!
//! Password-protected Office documents are not ZIP packages but compound
//! files holding an `EncryptionInfo` stream, an `EncryptedPackage` stream and
//! the `\u{6}DataSpaces` storage. This module reads and writes that container.

/// Constants for OLE file format
pub mod consts;

/// Compound file reader
mod file;

/// Compound file writer
pub mod writer;

pub use file::{DirectoryEntry, OleError, OleFile};
pub use writer::OleWriter;

/// Whether `data` starts with the compound file signature.
#[inline]
pub fn is_ole_file(data: &[u8]) -> bool {
    data.starts_with(consts::MAGIC)
}
