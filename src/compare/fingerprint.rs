//! Block fingerprints for fast alignment.
//!
//! Every block gets two SHA-1 digests: one over its full content
//! (text, run formatting and paragraph properties, recursively for tables)
//! and one over its visible text only. Blocks with equal full digests are
//! treated as identical by the aligner.
use crate::ooxml::docx::model::{Block, Paragraph, RunAttributes, Table};
use rayon::prelude::*;
use sha1::{Digest as _, Sha1};

/// A SHA-1 digest.
pub type Digest = [u8; 20];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockFingerprint {
    pub full: Digest,
    pub text: Digest,
}

impl BlockFingerprint {
    pub fn of(block: &Block) -> Self {
        let mut full = Sha1::new();
        hash_block(&mut full, block);
        let mut text = Sha1::new();
        update_str(&mut text, &block.text());
        Self {
            full: finish(full),
            text: finish(text),
        }
    }
}

/// Fingerprint every block in parallel; results keep block order.
pub fn fingerprint_blocks(blocks: &[Block]) -> Vec<BlockFingerprint> {
    blocks.par_iter().map(BlockFingerprint::of).collect()
}

fn finish(hasher: Sha1) -> Digest {
    let mut out = [0u8; 20];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Length-prefixed so that adjacent fields cannot run together.
fn update_str(hasher: &mut Sha1, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn update_opt_str(hasher: &mut Sha1, s: Option<&str>) {
    match s {
        Some(s) => {
            hasher.update([1u8]);
            update_str(hasher, s);
        },
        None => hasher.update([0u8]),
    }
}

fn hash_block(hasher: &mut Sha1, block: &Block) {
    match block {
        Block::Paragraph(p) => hash_paragraph(hasher, p),
        Block::Table(t) => hash_table(hasher, t),
    }
}

fn hash_paragraph(hasher: &mut Sha1, para: &Paragraph) {
    hasher.update(b"P");
    update_opt_str(hasher, para.properties.style_id.as_deref());
    update_opt_str(hasher, para.properties.alignment.as_deref());
    hasher.update((para.runs().len() as u64).to_le_bytes());
    for run in para.runs() {
        update_str(hasher, &run.text);
        hash_attrs(hasher, &run.attrs);
    }
}

fn hash_attrs(hasher: &mut Sha1, attrs: &RunAttributes) {
    hasher.update([attrs.flags.bits()]);
    for color in [attrs.color, attrs.highlight] {
        match color {
            Some(c) => hasher.update([1u8, c.r, c.g, c.b]),
            None => hasher.update([0u8]),
        }
    }
    match attrs.size {
        Some(size) => {
            hasher.update([1u8]);
            hasher.update(size.to_le_bytes());
        },
        None => hasher.update([0u8]),
    }
}

fn hash_table(hasher: &mut Sha1, table: &Table) {
    hasher.update(b"T");
    hasher.update((table.rows.len() as u64).to_le_bytes());
    for row in &table.rows {
        hasher.update((row.cells.len() as u64).to_le_bytes());
        for cell in &row.cells {
            hasher.update((cell.blocks.len() as u64).to_le_bytes());
            for block in &cell.blocks {
                hash_block(hasher, block);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::docx::model::{Run, RunFlags, TableCell, TableRow};

    #[test]
    fn test_formatting_changes_full_only() {
        let plain = Block::Paragraph(Paragraph::from_text("Hello world"));
        let bold = Block::Paragraph(Paragraph::from_runs([Run::new(
            "Hello world",
            RunAttributes {
                flags: RunFlags::BOLD,
                ..Default::default()
            },
        )]));
        let a = BlockFingerprint::of(&plain);
        let b = BlockFingerprint::of(&bold);
        assert_ne!(a.full, b.full);
        assert_eq!(a.text, b.text);
        assert_eq!(a, BlockFingerprint::of(&plain.clone()));
    }

    #[test]
    fn test_run_boundaries_do_not_collide() {
        let a = Paragraph::from_runs([
            Run::plain("ab"),
            Run::new("c", RunAttributes { size: Some(20), ..Default::default() }),
        ]);
        let b = Paragraph::from_runs([
            Run::plain("a"),
            Run::new("bc", RunAttributes { size: Some(20), ..Default::default() }),
        ]);
        assert_ne!(
            BlockFingerprint::of(&Block::Paragraph(a)).full,
            BlockFingerprint::of(&Block::Paragraph(b)).full
        );
    }

    #[test]
    fn test_parallel_keeps_order() {
        let blocks: Vec<Block> = (0..100)
            .map(|i| Block::Paragraph(Paragraph::from_text(format!("p{i}"))))
            .collect();
        let fps = fingerprint_blocks(&blocks);
        for (block, fp) in blocks.iter().zip(&fps) {
            assert_eq!(*fp, BlockFingerprint::of(block));
        }

        let table = Block::Table(Table::new(vec![TableRow::new(vec![TableCell::from_text(
            "p1",
        )])]));
        assert_ne!(BlockFingerprint::of(&table).full, fps[1].full);
    }
}
