/// Open Packaging Conventions (OPC) implementation.
///
/// - Package structure (parts, relationships)
/// - Content type management
/// - ZIP-based physical packaging

pub mod constants;
pub mod content_types;
pub mod package;
pub mod packuri;
pub mod pkgwriter;
pub mod rel;

pub use package::OpcPackage;
pub use packuri::PackURI;
pub use rel::{Relationship, Relationships};
