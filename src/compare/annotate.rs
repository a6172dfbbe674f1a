//! Styling of the target tree from an edit script.
//!
//! Inserted content and moved or reformatted content is restyled in place;
//! deleted content is put back at its anchor with the deleted style. When
//! changes overlap, the innermost one wins: inline operations beat block
//! operations and narrower spans beat wider ones. Overlaps and operations
//! that do not resolve against the tree are logged and skipped.
use crate::compare::operation::{ChangeKind, EditOperation, Node};
use crate::compare::style::{ResolvedStyle, StylePolicy};
use crate::compare::summary::{ChangeSummary, summary_blocks};
use crate::ooxml::docx::model::{
    Block, BlockPath, DocumentTree, Paragraph, Run, RunAttributes, Table,
};
use std::collections::{BTreeMap, HashMap};

/// Apply the styles of `policy` for every operation in `ops` to a copy of
/// `target`.
pub fn annotate(target: &DocumentTree, ops: &[EditOperation], policy: &StylePolicy) -> DocumentTree {
    if ops.is_empty() {
        return target.clone();
    }

    let plan = Plan::new(target, ops);
    let styles = Styles {
        inserted: policy.resolve(ChangeKind::Inserted),
        deleted: policy.resolve(ChangeKind::Deleted),
        changed: policy.resolve(ChangeKind::Changed),
    };
    let mut builder = Builder {
        plan: &plan,
        styles: &styles,
        overlaps: 0,
    };
    let blocks = builder.container(&target.blocks, &[], None);
    if builder.overlaps > 0 {
        tracing::warn!(
            overlaps = builder.overlaps,
            "overlapping changes; the innermost change's style was applied"
        );
    }

    DocumentTree {
        blocks,
        styles: target.styles.clone(),
    }
}

/// [`annotate`], then prepend the summary page when asked to.
pub fn annotate_with_summary(
    target: &DocumentTree,
    ops: &[EditOperation],
    policy: &StylePolicy,
    generate_summary_page: bool,
) -> DocumentTree {
    let mut tree = annotate(target, ops, policy);
    if generate_summary_page {
        let summary = ChangeSummary::from_operations(ops);
        let mut blocks = summary_blocks(&summary, policy);
        blocks.append(&mut tree.blocks);
        tree.blocks = blocks;
    }
    tree
}

struct Styles {
    inserted: ResolvedStyle,
    deleted: ResolvedStyle,
    changed: ResolvedStyle,
}

impl Styles {
    fn get(&self, kind: ChangeKind) -> &ResolvedStyle {
        match kind {
            ChangeKind::Inserted => &self.inserted,
            ChangeKind::Deleted => &self.deleted,
            ChangeKind::Changed => &self.changed,
        }
    }
}

/// A styled char range of a target paragraph.
struct Span {
    start: usize,
    end: usize,
    kind: ChangeKind,
}

#[derive(Default)]
struct InlinePlan<'a> {
    spans: Vec<Span>,
    /// Deleted runs and the target char offset they go before
    deletions: Vec<(usize, &'a [Run])>,
}

/// Operations indexed by the target location they affect.
#[derive(Default)]
struct Plan<'a> {
    block_styles: HashMap<BlockPath, ChangeKind>,
    deleted_blocks: BTreeMap<BlockPath, Vec<&'a Block>>,
    inline: HashMap<BlockPath, InlinePlan<'a>>,
}

impl<'a> Plan<'a> {
    fn new(target: &DocumentTree, ops: &'a [EditOperation]) -> Self {
        let mut plan = Plan::default();
        let mut unresolved = 0usize;

        for op in ops {
            let position = op.target_position();
            let resolved = target.block_at(&position.path);
            match (op.node(), position.offset) {
                (Node::Block(block), None) => {
                    if let EditOperation::Delete { anchor, .. } = op {
                        plan.deleted_blocks
                            .entry(anchor.path.clone())
                            .or_default()
                            .push(block);
                        continue;
                    }
                    if resolved.is_none() {
                        unresolved += 1;
                        continue;
                    }
                    if let Some(existing) = plan.block_styles.insert(position.path.clone(), op.kind())
                        && existing != op.kind()
                    {
                        tracing::warn!(path = %position.path, "two block-level changes on one block");
                    }
                },
                (Node::Inline(runs), Some(offset)) => {
                    let Some(para) = resolved.and_then(Block::as_paragraph) else {
                        unresolved += 1;
                        continue;
                    };
                    let offset = offset.min(para.char_len());
                    let entry = plan.inline.entry(position.path.clone()).or_default();
                    match op {
                        EditOperation::Delete { .. } => entry.deletions.push((offset, runs)),
                        _ => entry.spans.push(Span {
                            start: offset,
                            end: offset + op.node().char_len(),
                            kind: op.kind(),
                        }),
                    }
                },
                _ => unresolved += 1,
            }
        }

        if unresolved > 0 {
            tracing::warn!(unresolved, "operations that do not resolve against the target were skipped");
        }
        plan
    }
}

struct Builder<'p, 'a> {
    plan: &'p Plan<'a>,
    styles: &'p Styles,
    overlaps: usize,
}

impl Builder<'_, '_> {
    /// Rebuild one sibling list with deleted blocks put back.
    fn container(
        &mut self,
        blocks: &[Block],
        at: &[usize],
        inherited: Option<ChangeKind>,
    ) -> Vec<Block> {
        let mut out = Vec::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            let path = BlockPath::in_container(at, i);
            if let Some(deleted) = self.plan.deleted_blocks.get(&path) {
                out.extend(deleted.iter().map(|b| self.style_block(b, ChangeKind::Deleted)));
            }

            let own = self.plan.block_styles.get(&path).copied();
            if own.is_some() && inherited.is_some() {
                self.overlaps += 1;
            }
            let kind = own.or(inherited);
            out.push(match block {
                Block::Paragraph(p) => Block::Paragraph(self.paragraph(p, &path, kind)),
                Block::Table(t) => Block::Table(self.table(t, &path, kind)),
            });
        }

        // Deleted blocks after the last sibling
        let start = BlockPath::in_container(at, blocks.len());
        let end = BlockPath::in_container(at, usize::MAX);
        for deleted in self.plan.deleted_blocks.range(start..=end).map(|(_, v)| v) {
            out.extend(deleted.iter().map(|b| self.style_block(b, ChangeKind::Deleted)));
        }
        out
    }

    fn table(&mut self, table: &Table, path: &BlockPath, kind: Option<ChangeKind>) -> Table {
        let mut rebuilt = table.clone();
        for (r, row) in rebuilt.rows.iter_mut().enumerate() {
            for (c, cell) in row.cells.iter_mut().enumerate() {
                let cell_path = path.cell_block(r, c, 0);
                cell.blocks = self.container(&cell.blocks, cell_path.container(), kind);
            }
        }
        rebuilt
    }

    fn paragraph(&mut self, para: &Paragraph, path: &BlockPath, block: Option<ChangeKind>) -> Paragraph {
        let inline = self.plan.inline.get(path);
        if inline.is_none() && block.is_none() {
            return para.clone();
        }

        let len = para.char_len();
        let mut kinds: Vec<Option<ChangeKind>> = vec![None; len];
        if let Some(inline) = inline {
            // Widest first, so narrower spans overwrite
            let mut spans: Vec<&Span> = inline.spans.iter().collect();
            spans.sort_by_key(|s| std::cmp::Reverse(s.end - s.start));
            for span in spans {
                for slot in &mut kinds[span.start.min(len)..span.end.min(len)] {
                    if slot.is_some() {
                        self.overlaps += 1;
                    }
                    *slot = Some(span.kind);
                }
            }
        }
        if let Some(block) = block {
            let mut nested = false;
            for slot in &mut kinds {
                match slot {
                    Some(_) => nested = true,
                    None => *slot = Some(block),
                }
            }
            if nested {
                self.overlaps += 1;
            }
        }

        let mut deletions: Vec<(usize, &[Run])> =
            inline.map(|i| i.deletions.clone()).unwrap_or_default();
        deletions.sort_by_key(|(offset, _)| *offset);
        let mut deletions = deletions.into_iter().peekable();

        let mut out = Paragraph::new().with_properties(para.properties.clone());
        let mut pos = 0;
        for run in para.runs() {
            let mut segment = String::new();
            let mut segment_kind = None;
            for c in run.text.chars() {
                let kind = kinds[pos];
                let deletion_here = deletions.peek().is_some_and(|(at, _)| *at <= pos);
                if !segment.is_empty() && (kind != segment_kind || deletion_here) {
                    out.push_run(self.styled(&run.attrs, &std::mem::take(&mut segment), segment_kind));
                }
                while let Some((_, runs)) = deletions.next_if(|(at, _)| *at <= pos) {
                    self.push_deleted(&mut out, runs);
                }
                segment_kind = kind;
                segment.push(c);
                pos += 1;
            }
            if !segment.is_empty() {
                out.push_run(self.styled(&run.attrs, &segment, segment_kind));
            }
        }
        for (_, runs) in deletions {
            self.push_deleted(&mut out, runs);
        }
        out
    }

    fn styled(&self, attrs: &RunAttributes, text: &str, kind: Option<ChangeKind>) -> Run {
        match kind {
            Some(kind) => Run::new(text, self.styles.get(kind).apply(attrs)),
            None => Run::new(text, attrs.clone()),
        }
    }

    fn push_deleted(&self, out: &mut Paragraph, runs: &[Run]) {
        for run in runs {
            out.push_run(Run::new(run.text.clone(), self.styles.deleted.apply(&run.attrs)));
        }
    }

    /// Style a whole block, recursively.
    fn style_block(&self, block: &Block, kind: ChangeKind) -> Block {
        let style = self.styles.get(kind);
        match block {
            Block::Paragraph(p) => Block::Paragraph(
                Paragraph::from_runs(
                    p.runs()
                        .iter()
                        .map(|r| Run::new(r.text.clone(), style.apply(&r.attrs))),
                )
                .with_properties(p.properties.clone()),
            ),
            Block::Table(t) => {
                let mut table = t.clone();
                for cell in table.rows.iter_mut().flat_map(|r| r.cells.iter_mut()) {
                    cell.blocks = cell.blocks.iter().map(|b| self.style_block(b, kind)).collect();
                }
                Block::Table(table)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Color;
    use crate::compare::diff::diff;
    use crate::compare::operation::Position;
    use crate::ooxml::docx::model::{RunFlags, TableCell, TableRow};

    fn doc(paragraphs: &[&str]) -> DocumentTree {
        DocumentTree::from_paragraphs(paragraphs.iter().copied())
    }

    fn runs(tree: &DocumentTree, block: usize) -> Vec<(String, Option<Color>)> {
        tree.blocks[block]
            .as_paragraph()
            .unwrap()
            .runs()
            .iter()
            .map(|r| (r.text.clone(), r.attrs.highlight))
            .collect()
    }

    #[test]
    fn test_no_operations_is_identity() {
        let tree = doc(&["one", "two"]);
        assert_eq!(annotate(&tree, &[], &StylePolicy::default()), tree);
    }

    #[test]
    fn test_inserted_word_styled() {
        let target = doc(&["Hello brave world"]);
        let ops = diff(&doc(&["Hello world"]), &target);
        let out = annotate(&target, &ops, &StylePolicy::default());
        assert_eq!(
            runs(&out, 0),
            vec![
                ("Hello ".to_string(), None),
                ("brave ".to_string(), Some(Color::BLUE)),
                ("world".to_string(), None),
            ]
        );
        let brave = &out.blocks[0].as_paragraph().unwrap().runs()[1];
        assert!(brave.attrs.bold());
        assert_eq!(brave.attrs.color, Some(Color::BLUE));
    }

    #[test]
    fn test_deleted_and_inserted_words_shown_in_order() {
        let target = doc(&["the quick red fox"]);
        let ops = diff(&doc(&["the quick brown fox"]), &target);
        let out = annotate(&target, &ops, &StylePolicy::default());
        assert_eq!(
            runs(&out, 0),
            vec![
                ("the quick ".to_string(), None),
                ("brown".to_string(), Some(Color::RED)),
                ("red".to_string(), Some(Color::BLUE)),
                (" fox".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_deleted_blocks_reinserted() {
        let target = doc(&["keep"]);
        let ops = diff(&doc(&["gone at start", "keep", "gone at end"]), &target);
        let out = annotate(&target, &ops, &StylePolicy::default());
        let texts: Vec<String> = out.blocks.iter().map(Block::text).collect();
        assert_eq!(texts, vec!["gone at start", "keep", "gone at end"]);
        assert_eq!(runs(&out, 0)[0].1, Some(Color::RED));
        assert_eq!(runs(&out, 1)[0].1, None);
        assert_eq!(runs(&out, 2)[0].1, Some(Color::RED));
    }

    #[test]
    fn test_inline_beats_block_style() {
        let target = doc(&["abc def"]);
        let ops = vec![
            EditOperation::Move {
                node: Node::Block(target.blocks[0].clone()),
                from: Position::block(BlockPath::top(3)),
                to: Position::block(BlockPath::top(0)),
            },
            EditOperation::Insert {
                node: Node::Inline(vec![Run::plain("def")]),
                position: Position::inline(BlockPath::top(0), 4),
            },
        ];
        let out = annotate(&target, &ops, &StylePolicy::default());
        assert_eq!(
            runs(&out, 0),
            vec![
                ("abc ".to_string(), Some(Color::GREEN)),
                ("def".to_string(), Some(Color::BLUE)),
            ]
        );
    }

    #[test]
    fn test_unresolved_operations_skipped() {
        let target = doc(&["only"]);
        let ops = vec![EditOperation::Insert {
            node: Node::Inline(vec![Run::plain("x")]),
            position: Position::inline(BlockPath::top(7), 0),
        }];
        assert_eq!(annotate(&target, &ops, &StylePolicy::default()), target);
    }

    #[test]
    fn test_inserted_table_styled_throughout() {
        let table = Block::Table(crate::ooxml::docx::model::Table::new(vec![TableRow::new(
            vec![TableCell::from_text("cell")],
        )]));
        let target = DocumentTree::new(vec![table]);
        let ops = diff(&DocumentTree::default(), &target);
        let out = annotate(&target, &ops, &StylePolicy::default());
        let cell = out.blocks[0].as_table().unwrap().cell(0, 0).unwrap();
        let run = &cell.blocks[0].as_paragraph().unwrap().runs()[0];
        assert_eq!(run.attrs.highlight, Some(Color::BLUE));
    }

    #[test]
    fn test_summary_prepended() {
        let target = doc(&["same"]);
        let out = annotate_with_summary(&target, &[], &StylePolicy::default(), true);
        assert_eq!(out.blocks.len(), 7);
        assert_eq!(out.blocks[1].text(), "Inserted: 0");
        assert_eq!(out.blocks[6], target.blocks[0]);
    }

    #[test]
    fn test_existing_formatting_kept() {
        let italic = RunAttributes {
            flags: RunFlags::ITALIC,
            ..Default::default()
        };
        let target = DocumentTree::new(vec![Block::Paragraph(Paragraph::from_runs([Run::new(
            "new text",
            italic,
        )]))]);
        let ops = diff(&DocumentTree::default(), &target);
        let out = annotate(&target, &ops, &StylePolicy::default());
        let run = &out.blocks[0].as_paragraph().unwrap().runs()[0];
        assert_eq!(run.attrs.flags, RunFlags::ITALIC | RunFlags::BOLD);
    }
}
