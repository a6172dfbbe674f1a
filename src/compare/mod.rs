//! Document comparison.
//!
//! The pipeline runs in four stages:
//! - load both documents into [`DocumentTree`](crate::ooxml::docx::DocumentTree)s,
//! - [`diff`] them into an ordered list of [`EditOperation`]s,
//! - [`annotate`] the target with a visual style per [`ChangeKind`],
//! - save the result, optionally with a summary page and encryption.
//!
//! [`Comparer`] runs all four for file paths; the stages are also usable on
//! their own.
//!
//! # Example
//!
//! ```rust
//! use litchi_compare::compare::{ChangeKind, StylePolicy, annotate, diff};
//! use litchi_compare::ooxml::docx::DocumentTree;
//!
//! let before = DocumentTree::from_paragraphs(["Hello world"]);
//! let after = DocumentTree::from_paragraphs(["Hello brave world"]);
//!
//! let ops = diff(&before, &after);
//! assert_eq!(ops.len(), 1);
//! assert_eq!(ops[0].kind(), ChangeKind::Inserted);
//! assert_eq!(ops[0].node().text(), "brave ");
//!
//! let styled = annotate(&after, &ops, &StylePolicy::default());
//! assert_eq!(styled.text(), "Hello brave world");
//! ```

pub mod annotate;
pub mod comparer;
pub mod diff;
pub mod fingerprint;
pub mod lcs;
pub mod operation;
pub mod options;
pub mod style;
pub mod summary;
pub mod tokens;

pub use annotate::{annotate, annotate_with_summary};
pub use comparer::{
    ComparisonJob, ComparisonResult, Comparer, SUPPORTED_EXTENSIONS, compare_batch,
    compare_documents, compare_trees, is_supported_extension,
};
pub use diff::{diff, diff_with_cancel};
pub use operation::{ChangeKind, EditOperation, Formatting, Node, Position};
pub use options::ComparisonOptions;
pub use style::{ResolvedStyle, StylePolicy, StyleSettings};
pub use summary::ChangeSummary;

#[cfg(test)]
mod tests;
