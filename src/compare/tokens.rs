//! Word-level tokenization of paragraphs.
//!
//! An atom is a word, a single punctuation or ideographic character, or a
//! run of whitespace. Words match on their own text regardless of what
//! follows them. Atoms never cross run boundaries, so every atom has exactly
//! one set of run attributes.
use crate::ooxml::docx::model::{Paragraph, Run};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atom<'a> {
    pub text: &'a str,
    /// Char offset in the paragraph text
    pub start: usize,
    /// Length in chars
    pub len: usize,
    /// Index of the owning run
    pub run: usize,
}

pub type Atoms<'a> = SmallVec<[Atom<'a>; 16]>;

impl Atom<'_> {
    pub fn is_space(&self) -> bool {
        self.text.chars().all(char::is_whitespace)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Space,
    Word,
    Single,
}

fn classify(c: char) -> CharClass {
    if c.is_whitespace() {
        CharClass::Space
    } else if is_ideographic(c) || (!c.is_alphanumeric() && c != '_') {
        CharClass::Single
    } else {
        CharClass::Word
    }
}

/// CJK scripts have no spaces between words; each character is an atom.
fn is_ideographic(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF // Hiragana, Katakana
        | 0x3400..=0x4DBF // CJK Extension A
        | 0x4E00..=0x9FFF // CJK Unified Ideographs
        | 0xAC00..=0xD7AF // Hangul syllables
        | 0xF900..=0xFAFF // CJK Compatibility Ideographs
        | 0x20000..=0x2FA1F)
}

/// Split a paragraph into atoms.
pub fn tokenize(para: &Paragraph) -> Atoms<'_> {
    let mut atoms = Atoms::new();
    let mut offset = 0;
    for (run_index, run) in para.runs().iter().enumerate() {
        offset = tokenize_run(run, run_index, offset, &mut atoms);
    }
    atoms
}

fn tokenize_run<'a>(run: &'a Run, run_index: usize, mut offset: usize, out: &mut Atoms<'a>) -> usize {
    let text = run.text.as_str();
    let mut chars = text.char_indices().peekable();

    while let Some((begin, first)) = chars.next() {
        let mut len = 1;
        let class = classify(first);
        if class != CharClass::Single {
            while let Some(&(_, c)) = chars.peek() {
                if classify(c) != class {
                    break;
                }
                chars.next();
                len += 1;
            }
        }
        let end = chars.peek().map(|&(i, _)| i).unwrap_or(text.len());
        out.push(Atom {
            text: &text[begin..end],
            start: offset,
            len,
            run: run_index,
        });
        offset += len;
    }
    offset
}

/// Sorted list of words, for similarity scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordBag(Vec<String>);

impl WordBag {
    pub fn new(text: &str) -> Self {
        let mut words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
        words.sort_unstable();
        Self(words)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Dice coefficient over word multisets, in `[0, 1]`.
    pub fn similarity(&self, other: &WordBag) -> f64 {
        if self.is_empty() && other.is_empty() {
            return 1.0;
        }
        let (mut i, mut j, mut common) = (0, 0, 0usize);
        while i < self.0.len() && j < other.0.len() {
            match self.0[i].cmp(&other.0[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    common += 1;
                    i += 1;
                    j += 1;
                },
            }
        }
        (2 * common) as f64 / (self.len() + other.len()) as f64
    }
}
