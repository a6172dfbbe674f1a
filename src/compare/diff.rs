//! Structural diff of two document trees.
//!
//! Blocks are aligned first by full fingerprint. Inside each unaligned gap
//! a second alignment pairs similar paragraphs and same-shape tables;
//! paired paragraphs are diffed word by word and paired tables cell by
//! cell. Remaining block deletions and insertions with identical content
//! are finally folded into moves.
use crate::common::CancellationToken;
use crate::compare::fingerprint::{BlockFingerprint, Digest, fingerprint_blocks};
use crate::compare::lcs;
use crate::compare::operation::{EditOperation, Formatting, Node, Position};
use crate::compare::tokens::{Atom, WordBag, tokenize};
use crate::error::Result;
use crate::ooxml::docx::model::{Block, BlockPath, DocumentTree, Paragraph, Run, RunAttributes};
use std::collections::{HashMap, VecDeque};

/// Minimum word similarity for two different paragraphs to be diffed
/// inline instead of as a deletion plus an insertion.
pub const PAIRING_THRESHOLD: f64 = 0.5;

/// Compute the edit script turning `source` into `target`.
///
/// Operations are sorted by their position in the target tree. The result
/// depends only on the two trees.
pub fn diff(source: &DocumentTree, target: &DocumentTree) -> Vec<EditOperation> {
    // A token that is never cancelled has no deadline to hit
    diff_with_cancel(source, target, &CancellationToken::new()).unwrap_or_default()
}

/// [`diff`] with a cancellation token polled between stages and inside
/// the alignment loops.
pub fn diff_with_cancel(
    source: &DocumentTree,
    target: &DocumentTree,
    cancel: &CancellationToken,
) -> Result<Vec<EditOperation>> {
    let mut differ = Differ {
        cancel,
        ops: Vec::new(),
    };
    differ.diff_container(&source.blocks, &[], &target.blocks, &[])?;
    cancel.check()?;

    let mut ops = detect_moves(differ.ops);
    ops.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    tracing::debug!(
        source_blocks = source.blocks.len(),
        target_blocks = target.blocks.len(),
        operations = ops.len(),
        "diff complete"
    );
    Ok(ops)
}

struct Differ<'c> {
    cancel: &'c CancellationToken,
    ops: Vec<EditOperation>,
}

impl Differ<'_> {
    /// Diff two sibling lists; `src_at` and `tgt_at` address their containers.
    fn diff_container(
        &mut self,
        src: &[Block],
        src_at: &[usize],
        tgt: &[Block],
        tgt_at: &[usize],
    ) -> Result<()> {
        self.cancel.check()?;
        let src_fps = fingerprint_blocks(src);
        let tgt_fps = fingerprint_blocks(tgt);

        let src_keys: Vec<Digest> = src_fps.iter().map(|f| f.full).collect();
        let tgt_keys: Vec<Digest> = tgt_fps.iter().map(|f| f.full).collect();
        let matches = lcs::align(&src_keys, &tgt_keys, self.cancel)?;

        let src_side = Side {
            blocks: src,
            at: src_at,
            fps: &src_fps,
        };
        let tgt_side = Side {
            blocks: tgt,
            at: tgt_at,
            fps: &tgt_fps,
        };

        let (mut i0, mut j0) = (0, 0);
        for (i, j) in matches.into_iter().chain([(src.len(), tgt.len())]) {
            self.diff_gap(&src_side, i0..i, &tgt_side, j0..j)?;
            i0 = i + 1;
            j0 = j + 1;
        }
        Ok(())
    }

    /// Pair up and diff the blocks of one unaligned gap.
    fn diff_gap(
        &mut self,
        src: &Side<'_>,
        src_range: std::ops::Range<usize>,
        tgt: &Side<'_>,
        tgt_range: std::ops::Range<usize>,
    ) -> Result<()> {
        if src_range.is_empty() && tgt_range.is_empty() {
            return Ok(());
        }

        let src_bags = word_bags(&src.blocks[src_range.clone()]);
        let tgt_bags = word_bags(&tgt.blocks[tgt_range.clone()]);
        let (s0, t0) = (src_range.start, tgt_range.start);

        let pairs = lcs::align_by(
            src_range.len(),
            tgt_range.len(),
            |i, j| {
                pairable(
                    &src.blocks[s0 + i],
                    &src.fps[s0 + i],
                    src_bags[i].as_ref(),
                    &tgt.blocks[t0 + j],
                    &tgt.fps[t0 + j],
                    tgt_bags[j].as_ref(),
                )
            },
            |i, j| src.fps[s0 + i].full < tgt.fps[t0 + j].full,
            self.cancel,
        )?;

        let (mut i0, mut j0) = (s0, t0);
        let sentinel = (src_range.len(), tgt_range.len());
        for (pi, pj) in pairs.into_iter().chain([sentinel]) {
            let (i, j) = (s0 + pi, t0 + pj);
            for k in i0..i {
                self.ops.push(EditOperation::Delete {
                    node: Node::Block(src.blocks[k].clone()),
                    position: Position::block(src.path(k)),
                    anchor: Position::block(tgt.path(j0)),
                });
            }
            for k in j0..j {
                self.ops.push(EditOperation::Insert {
                    node: Node::Block(tgt.blocks[k].clone()),
                    position: Position::block(tgt.path(k)),
                });
            }
            if (pi, pj) != sentinel {
                self.diff_pair(&src.blocks[i], src.path(i), &tgt.blocks[j], tgt.path(j))?;
            }
            i0 = i + 1;
            j0 = j + 1;
        }
        Ok(())
    }

    fn diff_pair(
        &mut self,
        src: &Block,
        src_path: BlockPath,
        tgt: &Block,
        tgt_path: BlockPath,
    ) -> Result<()> {
        match (src, tgt) {
            (Block::Paragraph(a), Block::Paragraph(b)) => {
                self.diff_paragraph(a, src_path, b, tgt_path)
            },
            (Block::Table(a), Block::Table(b)) => {
                for (r, (row_a, row_b)) in a.rows.iter().zip(&b.rows).enumerate() {
                    for (c, (cell_a, cell_b)) in row_a.cells.iter().zip(&row_b.cells).enumerate() {
                        let src_cell = src_path.cell_block(r, c, 0);
                        let tgt_cell = tgt_path.cell_block(r, c, 0);
                        self.diff_container(
                            &cell_a.blocks,
                            src_cell.container(),
                            &cell_b.blocks,
                            tgt_cell.container(),
                        )?;
                    }
                }
                Ok(())
            },
            _ => {
                self.ops.push(EditOperation::Delete {
                    node: Node::Block(src.clone()),
                    position: Position::block(src_path),
                    anchor: Position::block(tgt_path.clone()),
                });
                self.ops.push(EditOperation::Insert {
                    node: Node::Block(tgt.clone()),
                    position: Position::block(tgt_path),
                });
                Ok(())
            },
        }
    }

    /// Word-level diff of two paired paragraphs.
    fn diff_paragraph(
        &mut self,
        a: &Paragraph,
        src_path: BlockPath,
        b: &Paragraph,
        tgt_path: BlockPath,
    ) -> Result<()> {
        if a.properties != b.properties {
            self.ops.push(EditOperation::FormatChange {
                node: Node::Block(Block::Paragraph(b.clone())),
                position: Position::block(tgt_path.clone()),
                old: Formatting::Paragraph(a.properties.clone()),
                new: Formatting::Paragraph(b.properties.clone()),
            });
        }

        let atoms_a = tokenize(a);
        let atoms_b = tokenize(b);
        let keys_a: Vec<&str> = atoms_a.iter().map(|t| t.text).collect();
        let keys_b: Vec<&str> = atoms_b.iter().map(|t| t.text).collect();
        let matches = merge_across_spaces(lcs::align(&keys_a, &keys_b, self.cancel)?, &atoms_a);

        let target_len = b.char_len();
        let target_offset = |j: usize| atoms_b.get(j).map_or(target_len, |t| t.start);

        let mut group: Option<FormatGroup> = None;
        let (mut i0, mut j0) = (0, 0);
        let sentinel = (atoms_a.len(), atoms_b.len());
        for (i, j) in matches.into_iter().chain([sentinel]) {
            if i > i0 || j > j0 {
                self.flush_format(&mut group, b, &atoms_b, &tgt_path);
            }
            if i > i0 {
                self.ops.push(EditOperation::Delete {
                    node: Node::Inline(runs_of(a, &atoms_a[i0..i])),
                    position: Position::inline(src_path.clone(), atoms_a[i0].start),
                    anchor: Position::inline(tgt_path.clone(), target_offset(j0)),
                });
            }
            if j > j0 {
                self.ops.push(EditOperation::Insert {
                    node: Node::Inline(runs_of(b, &atoms_b[j0..j])),
                    position: Position::inline(tgt_path.clone(), atoms_b[j0].start),
                });
            }

            if (i, j) != sentinel {
                let old = &a.runs()[atoms_a[i].run].attrs;
                let new = &b.runs()[atoms_b[j].run].attrs;
                if old == new {
                    self.flush_format(&mut group, b, &atoms_b, &tgt_path);
                } else {
                    match group.as_mut() {
                        Some(g) if g.end == j && g.old == *old && g.new == *new => g.end = j + 1,
                        _ => {
                            self.flush_format(&mut group, b, &atoms_b, &tgt_path);
                            group = Some(FormatGroup {
                                start: j,
                                end: j + 1,
                                old: old.clone(),
                                new: new.clone(),
                            });
                        },
                    }
                }
            }
            i0 = i + 1;
            j0 = j + 1;
        }
        self.flush_format(&mut group, b, &atoms_b, &tgt_path);
        Ok(())
    }

    fn flush_format(
        &mut self,
        group: &mut Option<FormatGroup>,
        para: &Paragraph,
        atoms: &[Atom<'_>],
        path: &BlockPath,
    ) {
        if let Some(g) = group.take() {
            self.ops.push(EditOperation::FormatChange {
                node: Node::Inline(runs_of(para, &atoms[g.start..g.end])),
                position: Position::inline(path.clone(), atoms[g.start].start),
                old: Formatting::Run(g.old),
                new: Formatting::Run(g.new),
            });
        }
    }
}

/// One side of a container diff.
struct Side<'a> {
    blocks: &'a [Block],
    at: &'a [usize],
    fps: &'a [BlockFingerprint],
}

impl Side<'_> {
    fn path(&self, index: usize) -> BlockPath {
        BlockPath::in_container(self.at, index)
    }
}

/// Consecutive matched atoms that share one attribute change.
struct FormatGroup {
    start: usize,
    end: usize,
    old: RunAttributes,
    new: RunAttributes,
}

fn word_bags(blocks: &[Block]) -> Vec<Option<WordBag>> {
    blocks
        .iter()
        .map(|b| b.as_paragraph().map(|p| WordBag::new(&p.text())))
        .collect()
}

/// Whether two unaligned blocks describe the same content closely enough
/// to be diffed inside rather than replaced.
fn pairable(
    a: &Block,
    fa: &BlockFingerprint,
    bag_a: Option<&WordBag>,
    b: &Block,
    fb: &BlockFingerprint,
    bag_b: Option<&WordBag>,
) -> bool {
    match (a, b) {
        (Block::Paragraph(_), Block::Paragraph(_)) => {
            fa.text == fb.text
                || matches!((bag_a, bag_b), (Some(x), Some(y)) if x.similarity(y) >= PAIRING_THRESHOLD)
        },
        (Block::Table(x), Block::Table(y)) => x.shape() == y.shape(),
        _ => false,
    }
}

/// Drop whitespace matches that sit between two edits, so that a
/// rewritten phrase becomes one replacement instead of one per word.
fn merge_across_spaces(matches: lcs::Matches, atoms_a: &[Atom<'_>]) -> lcs::Matches {
    let mut kept = lcs::Matches::with_capacity(matches.len());
    // Whether unmatched atoms precede the current match
    let mut gap_open = false;
    let mut next_free = (0, 0);
    for (k, &(i, j)) in matches.iter().enumerate() {
        gap_open |= i > next_free.0 || j > next_free.1;
        next_free = (i + 1, j + 1);
        let gap_after = matches
            .get(k + 1)
            .map_or(true, |&(ni, nj)| ni > i + 1 || nj > j + 1);
        if gap_open && gap_after && atoms_a[i].is_space() {
            continue;
        }
        kept.push((i, j));
        gap_open = false;
    }
    kept
}

/// Runs covering a contiguous range of atoms.
fn runs_of(para: &Paragraph, atoms: &[Atom<'_>]) -> Vec<Run> {
    Paragraph::from_runs(
        atoms
            .iter()
            .map(|t| Run::new(t.text, para.runs()[t.run].attrs.clone())),
    )
    .into_runs()
}

/// Fold block deletions and insertions with identical content into moves,
/// pairing the first deletion with the first insertion of each content.
fn detect_moves(ops: Vec<EditOperation>) -> Vec<EditOperation> {
    let fingerprint = |op: &EditOperation| match op {
        EditOperation::Delete {
            node: Node::Block(block),
            ..
        }
        | EditOperation::Insert {
            node: Node::Block(block),
            ..
        } => Some(BlockFingerprint::of(block).full),
        _ => None,
    };
    let fps: Vec<Option<Digest>> = ops.iter().map(fingerprint).collect();

    let mut inserts: Vec<usize> = (0..ops.len())
        .filter(|&k| fps[k].is_some() && matches!(ops[k], EditOperation::Insert { .. }))
        .collect();
    inserts.sort_by(|&x, &y| ops[x].target_position().cmp(ops[y].target_position()));
    let mut deletes: Vec<usize> = (0..ops.len())
        .filter(|&k| fps[k].is_some() && matches!(ops[k], EditOperation::Delete { .. }))
        .collect();
    deletes.sort_by(|&x, &y| source_position(&ops[x]).cmp(source_position(&ops[y])));

    let mut queues: HashMap<Digest, VecDeque<usize>> = HashMap::new();
    for k in inserts {
        if let Some(fp) = fps[k] {
            queues.entry(fp).or_default().push_back(k);
        }
    }

    // delete index -> insert index
    let mut pairs: HashMap<usize, usize> = HashMap::new();
    let mut paired_inserts = vec![false; ops.len()];
    for k in deletes {
        if let Some(ins) = fps[k].and_then(|fp| queues.get_mut(&fp)).and_then(|q| q.pop_front()) {
            pairs.insert(k, ins);
            paired_inserts[ins] = true;
        }
    }
    if pairs.is_empty() {
        return ops;
    }

    let mut slots: Vec<Option<EditOperation>> = ops.into_iter().map(Some).collect();
    let mut result = Vec::with_capacity(slots.len() - pairs.len());
    for k in 0..slots.len() {
        if paired_inserts[k] {
            continue;
        }
        let Some(op) = slots[k].take() else { continue };
        match pairs.get(&k) {
            Some(&ins) => {
                let from = source_position(&op).clone();
                if let Some(EditOperation::Insert { node, position }) = slots[ins].take() {
                    result.push(EditOperation::Move {
                        node,
                        from,
                        to: position,
                    });
                }
            },
            None => result.push(op),
        }
    }
    result
}

fn source_position(op: &EditOperation) -> &Position {
    match op {
        EditOperation::Delete { position, .. } => position,
        EditOperation::Move { from, .. } => from,
        other => other.target_position(),
    }
}
