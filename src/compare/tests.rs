//! End-to-end tests over real files.
use super::*;
use crate::common::{CancellationToken, Color};
use crate::error::{CompareError, DocumentRole, PasswordIssue};
use crate::ooxml::crypto::EncryptionScheme;
use crate::ooxml::docx::{self, Block, DocumentTree, Paragraph, Run, RunAttributes, RunFlags};
use proptest::prelude::*;
use std::path::{Path, PathBuf};

fn write_doc(dir: &Path, name: &str, paragraphs: &[&str]) -> PathBuf {
    let path = dir.join(name);
    docx::save(&DocumentTree::from_paragraphs(paragraphs.iter().copied()), &path, None).unwrap();
    path
}

fn body(tree: &DocumentTree, summary: bool) -> &[Block] {
    // Title, four count lines and the page break
    if summary { &tree.blocks[6..] } else { &tree.blocks }
}

#[test]
fn test_hello_brave_world() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_doc(dir.path(), "source.docx", &["Hello world"]);
    let target = write_doc(dir.path(), "target.docx", &["Hello brave world"]);
    let output = dir.path().join("out").join("result.docx");

    let options = ComparisonOptions::default();
    let result = compare_documents(&source, &target, &options).unwrap();
    assert_eq!(result.operations.len(), 1);
    match &result.operations[0] {
        EditOperation::Insert { node, position } => {
            assert_eq!(node.text(), "brave ");
            assert_eq!(position.offset, Some(6));
        },
        other => panic!("unexpected operation {other}"),
    }
    assert_eq!(
        result.summary,
        ChangeSummary {
            inserted: 1,
            ..Default::default()
        }
    );

    let written = Comparer::new(options).compare(&source, &target, &output).unwrap();
    assert_eq!(written, output);

    let loaded = docx::load(&output, None).unwrap();
    assert_eq!(loaded.blocks[0].text(), summary::SUMMARY_TITLE);
    assert_eq!(loaded.blocks[1].text(), "Inserted: 1");
    assert_eq!(loaded.blocks[2].text(), "Deleted: 0");
    assert_eq!(loaded.blocks[4].text(), "Changed: 0");

    let paragraph = body(&loaded, true)[0].as_paragraph().unwrap();
    assert_eq!(paragraph.text(), "Hello brave world");
    let brave = &paragraph.runs()[1];
    assert_eq!(brave.text, "brave ");
    assert_eq!(brave.attrs.highlight, Some(Color::BLUE));
    assert_eq!(brave.attrs.color, Some(Color::BLUE));
    assert!(brave.attrs.bold());
    assert!(paragraph.runs()[0].attrs.is_plain());
}

#[test]
fn test_self_comparison_counts_zero() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "same.docx", &["one", "two", "three"]);
    let output = dir.path().join("self.docx");
    Comparer::default().compare(&doc, &doc, &output).unwrap();

    let loaded = docx::load(&output, None).unwrap();
    for (i, label) in ["Inserted", "Deleted", "Moved", "Changed"].iter().enumerate() {
        assert_eq!(loaded.blocks[i + 1].text(), format!("{label}: 0"));
    }
    let original = docx::load(&doc, None).unwrap();
    assert_eq!(body(&loaded, true), &original.blocks[..]);
}

#[test]
fn test_moved_paragraph() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_doc(
        dir.path(),
        "a.docx",
        &["Introduction to the topic", "Main body", "Closing remarks"],
    );
    let target = write_doc(
        dir.path(),
        "b.docx",
        &["Main body", "Closing remarks", "Introduction to the topic"],
    );
    let options = ComparisonOptions::default().with_summary_page(false);
    let result = compare_documents(&source, &target, &options).unwrap();
    assert_eq!(result.operations.len(), 1);
    assert!(matches!(result.operations[0], EditOperation::Move { .. }));
    assert_eq!(result.summary.moved, 1);

    let moved = body(&result.tree, false)[2].as_paragraph().unwrap();
    assert_eq!(moved.runs()[0].attrs.highlight, Some(Color::GREEN));
}

#[test]
fn test_bold_only_change() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_doc(dir.path(), "a.docx", &["make this bold"]);
    let target = dir.path().join("b.docx");
    let bold = RunAttributes {
        flags: RunFlags::BOLD,
        ..Default::default()
    };
    let tree = DocumentTree::new(vec![Block::Paragraph(Paragraph::from_runs([
        Run::plain("make this "),
        Run::new("bold", bold),
    ]))]);
    docx::save(&tree, &target, None).unwrap();

    let options = ComparisonOptions::default().with_summary_page(false);
    let result = compare_documents(&source, &target, &options).unwrap();
    assert_eq!(result.operations.len(), 1);
    assert!(matches!(result.operations[0], EditOperation::FormatChange { .. }));
    assert_eq!(result.summary.changed, 1);
}

#[test]
fn test_custom_styles_from_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_doc(dir.path(), "a.docx", &["keep", "drop me"]);
    let target = write_doc(dir.path(), "b.docx", &["keep"]);
    let config = dir.path().join("options.yaml");
    std::fs::write(
        &config,
        "deleted_style:\n  highlight_color: yellow\n  strikethrough: true\n  bold: false\ngenerate_summary_page: false\n",
    )
    .unwrap();

    let options = ComparisonOptions::from_yaml_file(&config).unwrap();
    let result = compare_documents(&source, &target, &options).unwrap();
    let deleted = result.tree.blocks[1].as_paragraph().unwrap();
    assert_eq!(deleted.text(), "drop me");
    let attrs = &deleted.runs()[0].attrs;
    assert_eq!(attrs.highlight, Some(Color::YELLOW));
    assert_eq!(attrs.color, Some(Color::RED));
    assert!(attrs.strike());
    assert!(!attrs.bold());
}

#[test]
fn test_invalid_color_in_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bad.yaml");
    std::fs::write(&config, "inserted_style:\n  font_color: not-a-colour\n").unwrap();
    let err = ComparisonOptions::from_yaml_file(&config).unwrap_err();
    assert!(matches!(err, CompareError::Configuration(_)));
}

#[test]
fn test_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_doc(dir.path(), "a.docx", &["x"]);
    let output = dir.path().join("out.docx");
    let err = Comparer::default()
        .compare(&source, dir.path().join("absent.docx"), &output)
        .unwrap_err();
    assert!(matches!(
        err,
        CompareError::InputNotFound {
            role: DocumentRole::Target,
            ..
        }
    ));
    assert!(!output.exists());
}

#[test]
fn test_unsupported_extension() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_doc(dir.path(), "a.docx", &["x"]);
    let err = Comparer::default()
        .compare(&source, &source, dir.path().join("out.txt"))
        .unwrap_err();
    assert!(err.is_format_error());
}

#[test]
fn test_not_a_document() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_doc(dir.path(), "a.docx", &["x"]);
    let bogus = dir.path().join("bogus.docx");
    std::fs::write(&bogus, b"definitely not a zip").unwrap();
    let err = compare_documents(&source, &bogus, &ComparisonOptions::default()).unwrap_err();
    assert!(err.is_format_error());
    assert!(err.to_string().contains("target"));
}

#[test]
fn test_failed_save_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_doc(dir.path(), "a.docx", &["x"]);
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"a file, not a directory").unwrap();
    let output = blocker.join("out.docx");

    let err = Comparer::default().compare(&source, &source, &output).unwrap_err();
    assert!(matches!(err, CompareError::Io { .. }));
    assert!(!output.exists());
}

#[test]
fn test_cancelled_comparison() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_doc(dir.path(), "a.docx", &["x"]);
    let output = dir.path().join("out.docx");
    let token = CancellationToken::new();
    token.cancel();
    let err = Comparer::default()
        .with_cancel(token)
        .compare(&source, &source, &output)
        .unwrap_err();
    assert!(matches!(err, CompareError::Cancelled));
    assert!(!output.exists());
}

#[test]
fn test_stream_comparison() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_doc(dir.path(), "a.docx", &["alpha"]);
    let target = write_doc(dir.path(), "b.docx", &["alpha", "beta"]);
    let output = dir.path().join("stream.docx");

    let comparer = Comparer::new(ComparisonOptions::default().with_summary_page(false));
    comparer
        .compare_readers(
            std::fs::File::open(&source).unwrap(),
            std::fs::File::open(&target).unwrap(),
            &output,
        )
        .unwrap();
    let loaded = docx::load(&output, None).unwrap();
    assert_eq!(loaded.text(), "alpha\nbeta");
}

#[test]
fn test_batch() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_doc(dir.path(), "a.docx", &["one"]);
    let b = write_doc(dir.path(), "b.docx", &["two"]);
    let jobs = vec![
        ComparisonJob {
            source: a.clone(),
            target: b.clone(),
            output: dir.path().join("ab.docx"),
        },
        ComparisonJob {
            source: a,
            target: dir.path().join("missing.docx"),
            output: dir.path().join("am.docx"),
        },
    ];
    let results = compare_batch(&jobs, &ComparisonOptions::default());
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(CompareError::InputNotFound { .. })));
}

#[cfg(feature = "encryption")]
#[test]
fn test_protected_documents() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source_protected.docx");
    let target = dir.path().join("target_protected.docx");
    let output = dir.path().join("result_protected.docx");
    docx::save_with_scheme(
        &DocumentTree::from_paragraphs(["Quarterly figures"]),
        &source,
        Some("source-pw"),
        EncryptionScheme::Agile,
    )
    .unwrap();
    docx::save_with_scheme(
        &DocumentTree::from_paragraphs(["Quarterly figures", "Revised outlook"]),
        &target,
        Some("target-pw"),
        EncryptionScheme::Standard,
    )
    .unwrap();

    let options = ComparisonOptions::default()
        .with_passwords(Some("source-pw"), Some("target-pw"))
        .with_output_password("result-pw", EncryptionScheme::Agile);
    Comparer::new(options.clone())
        .compare(&source, &target, &output)
        .unwrap();

    let err = docx::load(&output, None).unwrap_err();
    assert!(matches!(
        err,
        CompareError::Password {
            reason: PasswordIssue::Missing,
            ..
        }
    ));
    let loaded = docx::load(&output, Some("result-pw")).unwrap();
    assert_eq!(loaded.blocks[1].text(), "Inserted: 1");

    let wrong = options.with_passwords(Some("source-pw"), Some("nope"));
    let err = compare_documents(&source, &target, &wrong).unwrap_err();
    assert!(err.is_password_error());
    assert!(!err.is_format_error());
    assert!(err.to_string().contains("target"));
}

fn arb_document() -> impl Strategy<Value = DocumentTree> {
    let paragraph = prop::sample::select(vec![
        "the cat sat",
        "the cat sat down",
        "a dog barked",
        "rain again today",
        "",
        "final words here",
        "the dog sat",
    ]);
    prop::collection::vec(paragraph, 0..8).prop_map(DocumentTree::from_paragraphs)
}

fn block_texts(ops: &[EditOperation], kind: ChangeKind) -> Vec<String> {
    let mut texts: Vec<String> = ops
        .iter()
        .filter(|op| op.kind() == kind && op.node().is_block())
        .map(|op| op.node().text())
        .collect();
    texts.sort();
    texts
}

proptest! {
    #[test]
    fn prop_identity(a in arb_document()) {
        let ops = diff(&a, &a);
        prop_assert!(ops.is_empty());
        prop_assert_eq!(annotate(&a, &ops, &StylePolicy::default()), a);
    }

    #[test]
    fn prop_deterministic(a in arb_document(), b in arb_document()) {
        prop_assert_eq!(diff(&a, &b), diff(&a, &b));
    }

    #[test]
    fn prop_symmetric(a in arb_document(), b in arb_document()) {
        let forward = diff(&a, &b);
        let backward = diff(&b, &a);
        prop_assert_eq!(
            block_texts(&forward, ChangeKind::Inserted),
            block_texts(&backward, ChangeKind::Deleted)
        );
        prop_assert_eq!(
            block_texts(&forward, ChangeKind::Deleted),
            block_texts(&backward, ChangeKind::Inserted)
        );
        let moves = |ops: &[EditOperation]| {
            ops.iter().filter(|op| matches!(op, EditOperation::Move { .. })).count()
        };
        prop_assert_eq!(moves(&forward), moves(&backward));
    }

    #[test]
    fn prop_annotation_keeps_target_text(a in arb_document(), b in arb_document()) {
        // Without deletions the styled tree reads exactly like the target
        let ops: Vec<EditOperation> = diff(&a, &b)
            .into_iter()
            .filter(|op| op.kind() != ChangeKind::Deleted)
            .collect();
        let styled = annotate(&b, &ops, &StylePolicy::default());
        prop_assert_eq!(styled.text(), b.text());
    }
}
