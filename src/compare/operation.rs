//! Edit operations produced by the structural diff.
use crate::ooxml::docx::model::{Block, BlockPath, ParagraphProperties, Run, RunAttributes};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an operation applies.
///
/// `offset` is a char offset into the paragraph at `path` for inline
/// operations and `None` for block operations. Positions order by path,
/// then block before inline, then offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub path: BlockPath,
    pub offset: Option<usize>,
}

impl Position {
    pub fn block(path: BlockPath) -> Self {
        Self { path, offset: None }
    }

    pub fn inline(path: BlockPath, offset: usize) -> Self {
        Self {
            path,
            offset: Some(offset),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{}@{offset}", self.path),
            None => write!(f, "{}", self.path),
        }
    }
}

/// Content an operation carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A whole paragraph or table
    Block(Block),
    /// Runs inside a paragraph
    Inline(Vec<Run>),
}

impl Node {
    pub fn text(&self) -> String {
        match self {
            Node::Block(block) => block.text(),
            Node::Inline(runs) => runs.iter().map(|r| r.text.as_str()).collect(),
        }
    }

    /// Char length of inline content; 0 for blocks.
    pub fn char_len(&self) -> usize {
        match self {
            Node::Block(_) => 0,
            Node::Inline(runs) => runs.iter().map(Run::char_len).sum(),
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Node::Block(_))
    }
}

/// Formatting before or after a format-only change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formatting {
    Run(RunAttributes),
    Paragraph(ParagraphProperties),
}

/// Change category used to pick a style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Inserted,
    Deleted,
    Changed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Inserted => f.write_str("inserted"),
            ChangeKind::Deleted => f.write_str("deleted"),
            ChangeKind::Changed => f.write_str("changed"),
        }
    }
}

/// One atomic change between a source and a target tree.
///
/// Source-side positions (`Delete::position`, `Move::from`) address the
/// source tree; every other position addresses the target tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOperation {
    /// Content present only in the target
    Insert { node: Node, position: Position },
    /// Content present only in the source; `anchor` is where it belongs in
    /// the target
    Delete {
        node: Node,
        position: Position,
        anchor: Position,
    },
    /// An unchanged block that moved
    Move {
        node: Node,
        from: Position,
        to: Position,
    },
    /// Same text, different formatting
    FormatChange {
        node: Node,
        position: Position,
        old: Formatting,
        new: Formatting,
    },
}

impl EditOperation {
    pub fn kind(&self) -> ChangeKind {
        match self {
            EditOperation::Insert { .. } => ChangeKind::Inserted,
            EditOperation::Delete { .. } => ChangeKind::Deleted,
            EditOperation::Move { .. } | EditOperation::FormatChange { .. } => ChangeKind::Changed,
        }
    }

    pub fn node(&self) -> &Node {
        match self {
            EditOperation::Insert { node, .. }
            | EditOperation::Delete { node, .. }
            | EditOperation::Move { node, .. }
            | EditOperation::FormatChange { node, .. } => node,
        }
    }

    /// Position in the target tree where this operation shows up.
    pub fn target_position(&self) -> &Position {
        match self {
            EditOperation::Insert { position, .. }
            | EditOperation::FormatChange { position, .. } => position,
            EditOperation::Delete { anchor, .. } => anchor,
            EditOperation::Move { to, .. } => to,
        }
    }

    /// Ordering key: target position, then deletions before moves before
    /// insertions before format changes.
    pub(crate) fn sort_key(&self) -> (&Position, u8) {
        let rank = match self {
            EditOperation::Delete { .. } => 0,
            EditOperation::Move { .. } => 1,
            EditOperation::Insert { .. } => 2,
            EditOperation::FormatChange { .. } => 3,
        };
        (self.target_position(), rank)
    }
}

impl fmt::Display for EditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditOperation::Insert { node, position } => {
                write!(f, "insert {:?} at {position}", node.text())
            },
            EditOperation::Delete {
                node,
                position,
                anchor,
            } => write!(f, "delete {:?} at {position} (shown at {anchor})", node.text()),
            EditOperation::Move { node, from, to } => {
                write!(f, "move {:?} from {from} to {to}", node.text())
            },
            EditOperation::FormatChange { node, position, .. } => {
                write!(f, "format {:?} at {position}", node.text())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::docx::model::Paragraph;

    #[test]
    fn test_position_order() {
        let block = Position::block(BlockPath::top(2));
        let inline = Position::inline(BlockPath::top(2), 0);
        let later = Position::inline(BlockPath::top(2), 5);
        let next = Position::block(BlockPath::top(3));
        let mut positions = vec![next.clone(), later.clone(), inline.clone(), block.clone()];
        positions.sort();
        assert_eq!(positions, vec![block, inline, later, next]);
    }

    #[test]
    fn test_kind_and_display() {
        let op = EditOperation::Insert {
            node: Node::Inline(vec![Run::plain("brave ")]),
            position: Position::inline(BlockPath::top(0), 6),
        };
        assert_eq!(op.kind(), ChangeKind::Inserted);
        assert_eq!(op.node().char_len(), 6);
        assert_eq!(op.to_string(), r#"insert "brave " at /0@6"#);

        let moved = EditOperation::Move {
            node: Node::Block(Block::Paragraph(Paragraph::from_text("x"))),
            from: Position::block(BlockPath::top(0)),
            to: Position::block(BlockPath::top(4)),
        };
        assert_eq!(moved.kind(), ChangeKind::Changed);
        assert_eq!(moved.target_position().path, BlockPath::top(4));
    }
}
