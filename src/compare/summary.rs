//! Change counts and the generated summary page.
use crate::compare::operation::{ChangeKind, EditOperation};
use crate::compare::style::StylePolicy;
use crate::ooxml::docx::model::{
    Block, PAGE_BREAK, Paragraph, ParagraphProperties, Run, RunAttributes, RunFlags,
};
use serde::{Deserialize, Serialize};

pub const SUMMARY_TITLE: &str = "Comparison Summary";

/// Title size in half-points.
const TITLE_SIZE: u32 = 32;

/// Operation counts by type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub inserted: usize,
    pub deleted: usize,
    pub moved: usize,
    /// Format-only changes
    pub changed: usize,
}

impl ChangeSummary {
    pub fn from_operations(ops: &[EditOperation]) -> Self {
        let mut summary = Self::default();
        for op in ops {
            match op {
                EditOperation::Insert { .. } => summary.inserted += 1,
                EditOperation::Delete { .. } => summary.deleted += 1,
                EditOperation::Move { .. } => summary.moved += 1,
                EditOperation::FormatChange { .. } => summary.changed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.inserted + self.deleted + self.moved + self.changed
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Blocks of the summary page: a title, one line per count with its label
/// in the matching style, and a page break.
pub fn summary_blocks(summary: &ChangeSummary, policy: &StylePolicy) -> Vec<Block> {
    let title = Paragraph::from_runs([Run::new(
        SUMMARY_TITLE,
        RunAttributes {
            flags: RunFlags::BOLD,
            size: Some(TITLE_SIZE),
            ..Default::default()
        },
    )])
    .with_properties(ParagraphProperties {
        style_id: None,
        alignment: Some("center".to_string()),
    });

    let line = |label: &str, kind: ChangeKind, count: usize| {
        let style = policy.resolve(kind);
        Block::Paragraph(Paragraph::from_runs([
            Run::new(label, style.apply(&RunAttributes::default())),
            Run::plain(format!(": {count}")),
        ]))
    };

    vec![
        Block::Paragraph(title),
        line("Inserted", ChangeKind::Inserted, summary.inserted),
        line("Deleted", ChangeKind::Deleted, summary.deleted),
        line("Moved", ChangeKind::Changed, summary.moved),
        line("Changed", ChangeKind::Changed, summary.changed),
        Block::Paragraph(Paragraph::from_text(PAGE_BREAK.to_string())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::operation::{Node, Position};
    use crate::ooxml::docx::model::BlockPath;

    #[test]
    fn test_counts() {
        let insert = EditOperation::Insert {
            node: Node::Inline(vec![Run::plain("x")]),
            position: Position::inline(BlockPath::top(0), 0),
        };
        let summary = ChangeSummary::from_operations(&[insert.clone(), insert]);
        assert_eq!(
            summary,
            ChangeSummary {
                inserted: 2,
                ..Default::default()
            }
        );
        assert!(ChangeSummary::default().is_empty());
    }

    #[test]
    fn test_summary_page_text() {
        let summary = ChangeSummary {
            inserted: 1,
            deleted: 0,
            moved: 2,
            changed: 0,
        };
        let blocks = summary_blocks(&summary, &StylePolicy::default());
        let texts: Vec<String> = blocks.iter().map(Block::text).collect();
        assert_eq!(
            texts,
            vec![
                SUMMARY_TITLE.to_string(),
                "Inserted: 1".to_string(),
                "Deleted: 0".to_string(),
                "Moved: 2".to_string(),
                "Changed: 0".to_string(),
                "\u{000C}".to_string(),
            ]
        );
        let label = &blocks[1].as_paragraph().unwrap().runs()[0];
        assert_eq!(label.attrs.color, Some(crate::common::Color::BLUE));
    }
}
