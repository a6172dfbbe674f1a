/// Word (.docx) document support.
///
/// The module is organized around these pieces:
/// - `model`: the in-memory [`DocumentTree`] (blocks, paragraphs, runs, tables)
/// - `reader`: streaming parser for `word/document.xml`
/// - `writer`: serializer producing a complete minimal package
/// - `package`: file and stream entry points, including encryption
///
/// # Example
///
/// ```rust,no_run
/// use litchi_compare::ooxml::docx;
///
/// let tree = docx::load("document.docx", None)?;
/// for block in &tree.blocks {
///     println!("{}", block.text());
/// }
/// docx::save(&tree, "copy.docx", Some("secret"))?;
/// # Ok::<(), litchi_compare::CompareError>(())
/// ```
pub mod model;
pub mod package;
pub mod reader;
pub mod writer;

pub use model::{
    Block, BlockPath, DocumentTree, Paragraph, ParagraphProperties, Run, RunAttributes, RunFlags,
    StyleSheet, Table, TableCell, TableRow,
};
pub use package::{
    load, load_from_bytes, load_from_reader, load_from_reader_with_cancel, save,
    save_to_writer, save_with_scheme, to_bytes,
};
