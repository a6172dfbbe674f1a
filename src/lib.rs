//! Litchi Compare - structural comparison of Word documents
//!
//! This library compares two WordprocessingML (.docx) documents and writes
//! a result document in which every change is styled: insertions, deletions
//! and changes each get their own highlight colour, font colour and text
//! decorations.
//!
//! # Features
//!
//! - **Document model**: streaming `quick-xml` reader and writer for
//!   paragraphs, runs and nested tables
//! - **Structural diff**: block alignment by content fingerprint, word-level
//!   diff of paired paragraphs, format-only changes and moved blocks
//! - **Styled output**: configurable styles per change kind and an optional
//!   summary page
//! - **Encryption**: password-protected input and output (ECMA-376 Agile
//!   and Standard encryption in an OLE compound file), behind the
//!   `encryption` feature
//! - **Atomic output**: results are written to a temporary file and renamed
//!   into place
//!
//! # Example - Comparing two files
//!
//! ```no_run
//! use litchi_compare::{Comparer, ComparisonOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ComparisonOptions::default();
//! let output = Comparer::new(options).compare("source.docx", "target.docx", "result.docx")?;
//! println!("Result saved to {}", output.display());
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Password-protected documents
//!
//! ```no_run
//! use litchi_compare::{ComparisonOptions, compare_documents};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ComparisonOptions::default()
//!     .with_passwords(Some("source-password"), Some("target-password"));
//! let result = compare_documents("source_protected.docx", "target_protected.docx", &options)?;
//! println!(
//!     "{} inserted, {} deleted, {} moved, {} changed",
//!     result.summary.inserted, result.summary.deleted, result.summary.moved, result.summary.changed
//! );
//! result.save("result.docx", None, Default::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Working with the edit script
//!
//! ```no_run
//! use litchi_compare::ooxml::docx;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let before = docx::load("v1.docx", None)?;
//! let after = docx::load("v2.docx", None)?;
//! for op in litchi_compare::diff(&before, &after) {
//!     println!("{op}");
//! }
//! # Ok(())
//! # }
//! ```

/// Shared utilities: colours, cancellation and container detection
pub mod common;

/// Comparison pipeline: diff, annotation, options
pub mod compare;

/// Error types
pub mod error;

/// OLE2 compound file reader and writer
///
/// Encrypted OOXML packages are stored inside a compound file; this module
/// provides the container for the encryption layer.
pub mod ole;

/// OOXML (Office Open XML) packages and the WordprocessingML document model
pub mod ooxml;

// Re-export commonly used types for convenience
pub use common::{CancellationToken, Color};
pub use compare::{
    ChangeKind, ChangeSummary, ComparisonJob, ComparisonOptions, ComparisonResult, Comparer,
    EditOperation, StylePolicy, StyleSettings, annotate, compare_batch, compare_documents, diff,
};
pub use error::{CompareError, DocumentRole, PasswordIssue, Result};
pub use ooxml::crypto::EncryptionScheme;
pub use ooxml::docx::DocumentTree;
