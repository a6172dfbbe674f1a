//! Office Open XML (OOXML) format implementation for WordprocessingML.
//!
//! The module is organized into three layers:
//!
//! 1. **OPC Layer** (`opc`): package handling (ZIP, parts, relationships, content types)
//! 2. **Encryption** (`crypto`): ECMA-376 Agile and Standard encryption of whole packages
//! 3. **Word documents** (`docx`): document tree, reader and writer
pub mod crypto;
pub mod docx;
pub mod opc;

pub use opc::{OpcPackage, PackURI};
