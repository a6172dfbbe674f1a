/// In-memory document tree for WordprocessingML bodies.
///
/// The tree keeps only what the comparison engine looks at: block order,
/// paragraph properties, run text and run formatting. Everything else in
/// the body (bookmarks, fields, drawings, section properties) is dropped
/// by the reader.
use crate::common::Color;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Tab stop in run text.
pub const TAB: char = '\t';
/// Line break (`<w:br/>` or `<w:cr/>`) in run text.
pub const LINE_BREAK: char = '\n';
/// Page break (`<w:br w:type="page"/>`) in run text.
pub const PAGE_BREAK: char = '\u{000C}';

bitflags! {
    /// On/off character formatting toggles.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct RunFlags: u8 {
        /// `<w:b/>`
        const BOLD = 0x01;
        /// `<w:i/>`
        const ITALIC = 0x02;
        /// `<w:u/>` with any style other than `none`
        const UNDERLINE = 0x04;
        /// `<w:strike/>` or `<w:dstrike/>`
        const STRIKE = 0x08;
    }
}

/// Character formatting of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RunAttributes {
    pub flags: RunFlags,
    /// Font colour; `None` is automatic
    pub color: Option<Color>,
    /// Background highlight; `None` is no highlight
    pub highlight: Option<Color>,
    /// Font size in half-points
    pub size: Option<u32>,
}

impl RunAttributes {
    #[inline]
    pub fn bold(&self) -> bool {
        self.flags.contains(RunFlags::BOLD)
    }

    #[inline]
    pub fn italic(&self) -> bool {
        self.flags.contains(RunFlags::ITALIC)
    }

    #[inline]
    pub fn underline(&self) -> bool {
        self.flags.contains(RunFlags::UNDERLINE)
    }

    #[inline]
    pub fn strike(&self) -> bool {
        self.flags.contains(RunFlags::STRIKE)
    }

    /// Whether any property is set; plain runs are written without `<w:rPr>`.
    pub fn is_plain(&self) -> bool {
        self.flags.is_empty()
            && self.color.is_none()
            && self.highlight.is_none()
            && self.size.is_none()
    }
}

/// A run of text sharing one set of attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Run {
    pub text: String,
    pub attrs: RunAttributes,
}

impl Run {
    pub fn new(text: impl Into<String>, attrs: RunAttributes) -> Self {
        Self {
            text: text.into(),
            attrs,
        }
    }

    /// A run without formatting.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, RunAttributes::default())
    }

    /// Length in chars, the unit of inline offsets.
    #[inline]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Paragraph-level properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ParagraphProperties {
    /// `<w:pStyle w:val>`
    pub style_id: Option<String>,
    /// `<w:jc w:val>`, kept verbatim (`left`, `center`, `both`, ...)
    pub alignment: Option<String>,
}

/// A paragraph: properties plus an ordered list of runs.
///
/// Runs are normalized on insertion: empty runs are dropped and a run
/// whose attributes equal its predecessor's is merged into it, so two
/// paragraphs with the same visible content compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Paragraph {
    pub properties: ParagraphProperties,
    runs: Vec<Run>,
}

impl Paragraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single plain run.
    pub fn from_text(text: impl Into<String>) -> Self {
        let mut para = Self::new();
        para.push_run(Run::plain(text));
        para
    }

    pub fn from_runs(runs: impl IntoIterator<Item = Run>) -> Self {
        let mut para = Self::new();
        para.extend_runs(runs);
        para
    }

    pub fn with_properties(mut self, properties: ParagraphProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Append a run, merging it into the last run when attributes match.
    pub fn push_run(&mut self, run: Run) {
        if run.text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(last) if last.attrs == run.attrs => last.text.push_str(&run.text),
            _ => self.runs.push(run),
        }
    }

    pub fn extend_runs(&mut self, runs: impl IntoIterator<Item = Run>) {
        for run in runs {
            self.push_run(run);
        }
    }

    #[inline]
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn into_runs(self) -> Vec<Run> {
        self.runs
    }

    /// Concatenated text of all runs.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    pub fn char_len(&self) -> usize {
        self.runs.iter().map(Run::char_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// One table cell; holds nested blocks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TableCell {
    pub blocks: Vec<Block>,
}

impl TableCell {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![Block::Paragraph(Paragraph::from_text(text))])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

impl TableRow {
    pub fn new(cells: Vec<TableCell>) -> Self {
        Self { cells }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

impl Table {
    pub fn new(rows: Vec<TableRow>) -> Self {
        Self { rows }
    }

    /// Cells per row; two tables with the same shape are diffed cell by cell.
    pub fn shape(&self) -> SmallVec<[usize; 8]> {
        self.rows.iter().map(|r| r.cells.len()).collect()
    }

    /// Widest row, used for the `<w:tblGrid>`.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&TableCell> {
        self.rows.get(row).and_then(|r| r.cells.get(col))
    }
}

/// Body-level content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

impl Block {
    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Block::Paragraph(p) => Some(p),
            Block::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Block::Table(t) => Some(t),
            Block::Paragraph(_) => None,
        }
    }

    /// Visible text; table cells are separated by tabs and rows by newlines.
    pub fn text(&self) -> String {
        match self {
            Block::Paragraph(p) => p.text(),
            Block::Table(t) => {
                let mut text = String::new();
                for (r, row) in t.rows.iter().enumerate() {
                    if r > 0 {
                        text.push(LINE_BREAK);
                    }
                    for (c, cell) in row.cells.iter().enumerate() {
                        if c > 0 {
                            text.push(TAB);
                        }
                        let parts: Vec<String> = cell.blocks.iter().map(Block::text).collect();
                        text.push_str(&parts.join("\n"));
                    }
                }
                text
            },
        }
    }
}

impl From<Paragraph> for Block {
    fn from(p: Paragraph) -> Self {
        Block::Paragraph(p)
    }
}

impl From<Table> for Block {
    fn from(t: Table) -> Self {
        Block::Table(t)
    }
}

/// The raw `word/styles.xml` part, carried through a load/save cycle.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StyleSheet(pub Vec<u8>);

impl fmt::Debug for StyleSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StyleSheet({} bytes)", self.0.len())
    }
}

/// Address of a block: top-level index, then for each enclosing table
/// `row, cell, block` inside that cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockPath(SmallVec<[usize; 4]>);

impl BlockPath {
    /// Path of a top-level block.
    pub fn top(index: usize) -> Self {
        let mut path = SmallVec::new();
        path.push(index);
        Self(path)
    }

    pub fn from_slice(indices: &[usize]) -> Self {
        Self(SmallVec::from_slice(indices))
    }

    /// Path of block `index` in the container addressed by `container`
    /// (empty for the body).
    pub fn in_container(container: &[usize], index: usize) -> Self {
        let mut path = SmallVec::from_slice(container);
        path.push(index);
        Self(path)
    }

    /// Path of block `index` inside cell `(row, cell)` of the table at `self`.
    pub fn cell_block(&self, row: usize, cell: usize, index: usize) -> Self {
        let mut path = self.0.clone();
        path.extend_from_slice(&[row, cell, index]);
        Self(path)
    }

    /// Path of a sibling inside the same container.
    pub fn sibling(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        if let Some(last) = path.last_mut() {
            *last = index;
        } else {
            path.push(index);
        }
        Self(path)
    }

    /// The container part of the path (everything but the last index).
    pub fn container(&self) -> &[usize] {
        self.0.split_last().map(|(_, rest)| rest).unwrap_or(&[])
    }

    /// Index inside the container.
    pub fn index(&self) -> Option<usize> {
        self.0.last().copied()
    }

    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Nesting depth; 1 for top-level blocks.
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for BlockPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(usize::to_string).collect();
        write!(f, "/{}", parts.join("/"))
    }
}

/// A parsed document body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentTree {
    pub blocks: Vec<Block>,
    pub styles: Option<StyleSheet>,
}

impl DocumentTree {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            styles: None,
        }
    }

    /// A document of plain paragraphs, one per item.
    pub fn from_paragraphs<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            texts
                .into_iter()
                .map(|t| Block::Paragraph(Paragraph::from_text(t)))
                .collect(),
        )
    }

    /// Resolve a path to a block.
    pub fn block_at(&self, path: &BlockPath) -> Option<&Block> {
        let (first, mut rest) = path.as_slice().split_first()?;
        let mut block = self.blocks.get(*first)?;
        while let [row, cell, index, tail @ ..] = rest {
            block = block.as_table()?.cell(*row, *cell)?.blocks.get(*index)?;
            rest = tail;
        }
        rest.is_empty().then_some(block)
    }

    /// Number of paragraphs at any depth.
    pub fn paragraph_count(&self) -> usize {
        fn count(blocks: &[Block]) -> usize {
            blocks
                .iter()
                .map(|b| match b {
                    Block::Paragraph(_) => 1,
                    Block::Table(t) => t
                        .rows
                        .iter()
                        .flat_map(|r| &r.cells)
                        .map(|c| count(&c.blocks))
                        .sum(),
                })
                .sum()
        }
        count(&self.blocks)
    }

    /// Plain text of the whole body, one line per top-level block.
    pub fn text(&self) -> String {
        let parts: Vec<String> = self.blocks.iter().map(Block::text).collect();
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold() -> RunAttributes {
        RunAttributes {
            flags: RunFlags::BOLD,
            ..Default::default()
        }
    }

    #[test]
    fn test_push_run_normalizes() {
        let mut para = Paragraph::new();
        para.push_run(Run::plain("Hello "));
        para.push_run(Run::plain(""));
        para.push_run(Run::plain("world"));
        para.push_run(Run::new("!", bold()));
        assert_eq!(para.runs().len(), 2);
        assert_eq!(para.runs()[0].text, "Hello world");
        assert_eq!(para.text(), "Hello world!");
        assert_eq!(para.char_len(), 12);
    }

    #[test]
    fn test_block_at_nested() {
        let inner = Table::new(vec![TableRow::new(vec![
            TableCell::from_text("a"),
            TableCell::new(vec![
                Block::Paragraph(Paragraph::from_text("b")),
                Block::Paragraph(Paragraph::from_text("c")),
            ]),
        ])]);
        let doc = DocumentTree::new(vec![
            Block::Paragraph(Paragraph::from_text("intro")),
            Block::Table(inner),
        ]);

        let path = BlockPath::top(1).cell_block(0, 1, 1);
        assert_eq!(path.as_slice(), &[1, 0, 1, 1]);
        assert_eq!(path.container(), &[1, 0, 1]);
        assert_eq!(doc.block_at(&path).map(Block::text).as_deref(), Some("c"));
        assert!(doc.block_at(&BlockPath::top(2)).is_none());
        assert!(doc.block_at(&BlockPath::from_slice(&[0, 0, 0, 0])).is_none());
        assert_eq!(doc.paragraph_count(), 4);
    }

    #[test]
    fn test_path_order() {
        let mut paths = vec![
            BlockPath::top(3),
            BlockPath::from_slice(&[2, 0, 1, 0]),
            BlockPath::top(2),
        ];
        paths.sort();
        assert_eq!(paths[0], BlockPath::top(2));
        assert_eq!(paths[2], BlockPath::top(3));
        assert_eq!(paths[1].to_string(), "/2/0/1/0");
    }

    #[test]
    fn test_table_text_and_shape() {
        let table = Table::new(vec![
            TableRow::new(vec![TableCell::from_text("a"), TableCell::from_text("b")]),
            TableRow::new(vec![TableCell::from_text("c")]),
        ]);
        assert_eq!(Block::Table(table.clone()).text(), "a\tb\nc");
        assert_eq!(table.shape().as_slice(), &[2, 1]);
        assert_eq!(table.column_count(), 2);
    }
}
