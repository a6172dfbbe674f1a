//! The comparison pipeline: load, diff, annotate, save.
use crate::common::CancellationToken;
use crate::compare::annotate::annotate_with_summary;
use crate::compare::diff::diff_with_cancel;
use crate::compare::operation::EditOperation;
use crate::compare::options::ComparisonOptions;
use crate::compare::summary::ChangeSummary;
use crate::error::{CompareError, DocumentRole, Result};
use crate::ooxml::crypto::EncryptionScheme;
use crate::ooxml::docx::model::DocumentTree;
use crate::ooxml::docx::{self, package::load_as};
use rayon::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// File extensions accepted for input and output documents.
///
/// `.doc` is accepted by name; its content decides whether it loads.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["docx", "docm", "dotx", "dotm", "doc"];

/// Whether `path` has one of [`SUPPORTED_EXTENSIONS`], ignoring case.
pub fn is_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)))
}

fn check_extension(path: &Path, role: DocumentRole) -> Result<()> {
    if is_supported_extension(path) {
        Ok(())
    } else {
        Err(CompareError::Format(format!(
            "{role} document {}: unsupported file extension (expected one of {})",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        )))
    }
}

/// The outcome of one comparison.
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    /// Target tree with every change styled, summary page included when
    /// requested
    pub tree: DocumentTree,
    /// Edit script from source to target, sorted by target position
    pub operations: Vec<EditOperation>,
    pub summary: ChangeSummary,
}

impl ComparisonResult {
    /// Write the annotated document atomically.
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
        password: Option<&str>,
        scheme: EncryptionScheme,
    ) -> Result<()> {
        let path = path.as_ref();
        docx::save_with_scheme(&self.tree, path, password, scheme)
            .map_err(|e| e.in_document(DocumentRole::Output, path))
    }
}

/// Diff two loaded trees and annotate the target.
pub fn compare_trees(
    source: &DocumentTree,
    target: &DocumentTree,
    options: &ComparisonOptions,
    cancel: &CancellationToken,
) -> Result<ComparisonResult> {
    let started = Instant::now();
    let operations = diff_with_cancel(source, target, cancel)?;
    let summary = ChangeSummary::from_operations(&operations);
    tracing::debug!(
        operations = operations.len(),
        inserted = summary.inserted,
        deleted = summary.deleted,
        moved = summary.moved,
        changed = summary.changed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "changes counted"
    );

    cancel.check()?;
    let tree = annotate_with_summary(
        target,
        &operations,
        &options.policy(),
        options.generate_summary_page,
    );
    Ok(ComparisonResult {
        tree,
        operations,
        summary,
    })
}

/// Load two documents and compare them.
pub fn compare_documents<S: AsRef<Path>, T: AsRef<Path>>(
    source: S,
    target: T,
    options: &ComparisonOptions,
) -> Result<ComparisonResult> {
    Comparer::new(options.clone()).compare_paths(source.as_ref(), target.as_ref())
}

/// One job of [`compare_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonJob {
    pub source: PathBuf,
    pub target: PathBuf,
    pub output: PathBuf,
}

/// Run independent comparisons on the rayon pool.
///
/// Results are in job order. A failing job does not stop the others.
pub fn compare_batch(jobs: &[ComparisonJob], options: &ComparisonOptions) -> Vec<Result<PathBuf>> {
    let comparer = Comparer::new(options.clone());
    jobs.par_iter()
        .map(|job| comparer.compare(&job.source, &job.target, &job.output))
        .collect()
}

/// Runs comparisons with one set of options.
///
/// # Examples
///
/// ```rust,no_run
/// use litchi_compare::{Comparer, ComparisonOptions};
///
/// let options = ComparisonOptions::from_yaml_str("generate_summary_page: false")?;
/// let output = Comparer::new(options).compare("v1.docx", "v2.docx", "out/diff.docx")?;
/// println!("wrote {}", output.display());
/// # Ok::<(), litchi_compare::CompareError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Comparer {
    options: ComparisonOptions,
    cancel: CancellationToken,
}

impl Comparer {
    pub fn new(options: ComparisonOptions) -> Self {
        Self {
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `cancel` for every comparison run by this comparer.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &ComparisonOptions {
        &self.options
    }

    /// Compare two files and write the styled result to `output`.
    ///
    /// Both inputs are checked before any work starts. The output's parent
    /// directory is created when missing, and `output` only appears once
    /// the whole document has been written.
    pub fn compare<S, T, O>(&self, source: S, target: T, output: O) -> Result<PathBuf>
    where
        S: AsRef<Path>,
        T: AsRef<Path>,
        O: AsRef<Path>,
    {
        let (source, target, output) = (source.as_ref(), target.as_ref(), output.as_ref());
        check_extension(output, DocumentRole::Output)?;
        tracing::info!(
            source = %source.display(),
            target = %target.display(),
            output = %output.display(),
            "comparing documents"
        );

        let result = self.compare_paths(source, target)?;
        self.cancel.check()?;
        self.write(&result, output)?;

        tracing::info!(
            output = %output.display(),
            changes = result.summary.total(),
            "comparison saved"
        );
        Ok(output.to_path_buf())
    }

    /// Compare two byte streams and write the styled result to `output`.
    ///
    /// Both readers are consumed and dropped before this returns.
    pub fn compare_readers<S: Read, T: Read, O: AsRef<Path>>(
        &self,
        source: S,
        target: T,
        output: O,
    ) -> Result<PathBuf> {
        let output = output.as_ref();
        self.options.validate()?;
        check_extension(output, DocumentRole::Output)?;
        let source_tree = docx::load_from_reader_with_cancel(
            source,
            self.options.source_password.as_deref(),
            &self.cancel,
        )
        .map_err(|e| e.in_document(DocumentRole::Source, Path::new("<stream>")))?;
        let target_tree = docx::load_from_reader_with_cancel(
            target,
            self.options.target_password.as_deref(),
            &self.cancel,
        )
        .map_err(|e| e.in_document(DocumentRole::Target, Path::new("<stream>")))?;

        let result = compare_trees(&source_tree, &target_tree, &self.options, &self.cancel)?;
        self.cancel.check()?;
        self.write(&result, output)?;
        tracing::info!(output = %output.display(), "stream comparison saved");
        Ok(output.to_path_buf())
    }

    /// Load and compare two files without writing anything.
    pub fn compare_paths(&self, source: &Path, target: &Path) -> Result<ComparisonResult> {
        self.options.validate()?;
        for (path, role) in [(source, DocumentRole::Source), (target, DocumentRole::Target)] {
            if !path.exists() {
                return Err(CompareError::InputNotFound {
                    role,
                    path: path.to_path_buf(),
                });
            }
            check_extension(path, role)?;
        }

        let started = Instant::now();
        let (source_tree, target_tree) = rayon::join(
            || {
                load_as(
                    source,
                    self.options.source_password.as_deref(),
                    DocumentRole::Source,
                    &self.cancel,
                )
            },
            || {
                load_as(
                    target,
                    self.options.target_password.as_deref(),
                    DocumentRole::Target,
                    &self.cancel,
                )
            },
        );
        let (source_tree, target_tree) = (source_tree?, target_tree?);
        tracing::debug!(
            source_blocks = source_tree.blocks.len(),
            target_blocks = target_tree.blocks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "documents loaded"
        );

        compare_trees(&source_tree, &target_tree, &self.options, &self.cancel)
    }

    fn write(&self, result: &ComparisonResult, output: &Path) -> Result<()> {
        result.save(
            output,
            self.options.output_password.as_deref(),
            self.options.output_encryption,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_extension(Path::new("a/b.docx")));
        assert!(is_supported_extension(Path::new("B.DOCX")));
        assert!(is_supported_extension(Path::new("t.dotm")));
        assert!(is_supported_extension(Path::new("legacy.doc")));
        assert!(!is_supported_extension(Path::new("notes.txt")));
        assert!(!is_supported_extension(Path::new("noext")));
    }

    #[test]
    fn test_trees_without_summary() {
        let source = DocumentTree::from_paragraphs(["a", "b"]);
        let target = DocumentTree::from_paragraphs(["a", "b", "c"]);
        let options = ComparisonOptions::default().with_summary_page(false);
        let result = compare_trees(&source, &target, &options, &CancellationToken::new()).unwrap();
        assert_eq!(result.summary.inserted, 1);
        assert_eq!(result.tree.blocks.len(), 3);
    }

    #[test]
    fn test_cancelled_before_diff() {
        let token = CancellationToken::new();
        token.cancel();
        let tree = DocumentTree::from_paragraphs(["x"]);
        let err = compare_trees(&tree, &tree, &ComparisonOptions::default(), &token).unwrap_err();
        assert!(matches!(err, CompareError::Cancelled));
    }

    #[test]
    fn test_compare_paths_honours_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.docx");
        docx::save(&DocumentTree::from_paragraphs(["x"]), &path, None).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let err = Comparer::default().with_cancel(token).compare_paths(&path, &path).unwrap_err();
        assert!(matches!(err, CompareError::Cancelled));
        assert!(Comparer::default().compare_paths(&path, &path).is_ok());
    }
}
