//! OLE2 file writing module
//!
//! Creates compound documents with version 3 (512-byte sector) layout.

/// Allocation table generation (FAT and MiniFAT)
mod fat;

/// Directory tree generation
mod directory;

/// Core OLE writer implementation
mod core;


pub use self::core::OleWriter;
