//! Visual styles applied to changed content.
use crate::common::Color;
use crate::compare::operation::ChangeKind;
use crate::ooxml::docx::model::{RunAttributes, RunFlags};
use serde::{Deserialize, Serialize};

/// Caller-supplied style for one change kind.
///
/// Unset fields fall back to the kind's defaults: highlight and font
/// colour take the kind colour, `bold` is on, and the other decorations
/// are off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleSettings {
    pub highlight_color: Option<Color>,
    pub font_color: Option<Color>,
    pub bold: Option<bool>,
    pub underline: Option<bool>,
    pub italic: Option<bool>,
    pub strikethrough: Option<bool>,
}

impl StyleSettings {
    pub fn highlight(mut self, color: Color) -> Self {
        self.highlight_color = Some(color);
        self
    }

    pub fn font(mut self, color: Color) -> Self {
        self.font_color = Some(color);
        self
    }

    pub fn bold(mut self, on: bool) -> Self {
        self.bold = Some(on);
        self
    }

    pub fn underline(mut self, on: bool) -> Self {
        self.underline = Some(on);
        self
    }

    pub fn italic(mut self, on: bool) -> Self {
        self.italic = Some(on);
        self
    }

    pub fn strikethrough(mut self, on: bool) -> Self {
        self.strikethrough = Some(on);
        self
    }

    /// Fill unset fields with the defaults of `kind`.
    pub fn resolve(&self, kind: ChangeKind) -> ResolvedStyle {
        let default_color = kind.default_color();
        let mut flags = RunFlags::empty();
        flags.set(RunFlags::BOLD, self.bold != Some(false));
        flags.set(RunFlags::UNDERLINE, self.underline == Some(true));
        flags.set(RunFlags::ITALIC, self.italic == Some(true));
        flags.set(RunFlags::STRIKE, self.strikethrough == Some(true));
        ResolvedStyle {
            highlight: self.highlight_color.unwrap_or(default_color),
            font: self.font_color.unwrap_or(default_color),
            flags,
        }
    }
}

impl ChangeKind {
    /// Blue for insertions, red for deletions, green for changes.
    pub fn default_color(self) -> Color {
        match self {
            ChangeKind::Inserted => Color::BLUE,
            ChangeKind::Deleted => Color::RED,
            ChangeKind::Changed => Color::GREEN,
        }
    }
}

/// A style with every field decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedStyle {
    pub highlight: Color,
    pub font: Color,
    /// Toggles switched on; toggles already on in the run stay on
    pub flags: RunFlags,
}

impl ResolvedStyle {
    pub fn apply(&self, attrs: &RunAttributes) -> RunAttributes {
        RunAttributes {
            flags: attrs.flags | self.flags,
            color: Some(self.font),
            highlight: Some(self.highlight),
            size: attrs.size,
        }
    }
}

/// Styles for all three change kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylePolicy {
    pub inserted: StyleSettings,
    pub deleted: StyleSettings,
    pub changed: StyleSettings,
}

impl StylePolicy {
    pub fn settings(&self, kind: ChangeKind) -> &StyleSettings {
        match kind {
            ChangeKind::Inserted => &self.inserted,
            ChangeKind::Deleted => &self.deleted,
            ChangeKind::Changed => &self.changed,
        }
    }

    pub fn resolve(&self, kind: ChangeKind) -> ResolvedStyle {
        self.settings(kind).resolve(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = StylePolicy::default();
        let inserted = policy.resolve(ChangeKind::Inserted);
        assert_eq!(inserted.highlight, Color::BLUE);
        assert_eq!(inserted.font, Color::BLUE);
        assert_eq!(inserted.flags, RunFlags::BOLD);
        assert_eq!(policy.resolve(ChangeKind::Deleted).font, Color::RED);
        assert_eq!(policy.resolve(ChangeKind::Changed).highlight, Color::GREEN);
    }

    #[test]
    fn test_explicit_values() {
        let settings = StyleSettings::default()
            .highlight(Color::YELLOW)
            .bold(false)
            .strikethrough(true);
        let style = settings.resolve(ChangeKind::Deleted);
        assert_eq!(style.highlight, Color::YELLOW);
        assert_eq!(style.font, Color::RED);
        assert_eq!(style.flags, RunFlags::STRIKE);
    }

    #[test]
    fn test_apply_keeps_existing_toggles() {
        let attrs = RunAttributes {
            flags: RunFlags::ITALIC,
            size: Some(24),
            ..Default::default()
        };
        let styled = StylePolicy::default()
            .resolve(ChangeKind::Inserted)
            .apply(&attrs);
        assert_eq!(styled.flags, RunFlags::ITALIC | RunFlags::BOLD);
        assert_eq!(styled.color, Some(Color::BLUE));
        assert_eq!(styled.size, Some(24));
    }
}
