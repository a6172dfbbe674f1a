//! Streaming parser for the WordprocessingML main document part.
//!
//! The parser walks `word/document.xml` once with quick-xml and builds a
//! [`DocumentTree`]. Wrapper elements it does not know (hyperlinks, smart
//! tags, content controls, tracked insertions) are descended into; the
//! elements in [`SKIPPED_ELEMENTS`] are skipped along with their subtree.
use crate::common::{CancellationToken, Color};
use crate::error::{CompareError, Result};
use crate::ooxml::docx::model::{
    Block, DocumentTree, LINE_BREAK, PAGE_BREAK, Paragraph, ParagraphProperties, Run,
    RunAttributes, RunFlags, StyleSheet, TAB, Table, TableCell, TableRow,
};
use crate::ooxml::opc::OpcPackage;
use crate::ooxml::opc::constants::relationship_type as rt;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;

/// Elements whose whole subtree carries no body text, or carries text
/// that is not part of the current document state (tracked deletions,
/// field instructions, text boxes and alternate content).
const SKIPPED_ELEMENTS: &[&[u8]] = &[
    b"del",
    b"moveFrom",
    b"delText",
    b"instrText",
    b"sectPr",
    b"drawing",
    b"pict",
    b"object",
    b"AlternateContent",
    b"txbxContent",
    b"sdtPr",
    b"sdtEndPr",
    b"rPrChange",
    b"pPrChange",
    b"tblPr",
    b"tblPrEx",
    b"tblGrid",
    b"trPr",
    b"tcPr",
    b"customXmlPr",
    b"smartTagPr",
    b"ffData",
    b"background",
];

/// Paragraphs between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Read the main document and the carried stylesheet out of a package.
pub fn read_document(package: &OpcPackage, cancel: &CancellationToken) -> Result<DocumentTree> {
    let main = package.main_document_part()?;
    let xml = package
        .part(&main)
        .ok_or_else(|| CompareError::Format(format!("main document part {main} is missing")))?;
    let blocks = parse_body(xml, cancel)?;

    let rels = package.relationships(&main)?;
    let styles = match rels.first_of_types(&[rt::STYLES]) {
        Some(rel) => {
            let uri = rels.target_partname(rel)?;
            package.part(&uri).map(|data| StyleSheet(data.to_vec()))
        },
        None => None,
    };

    tracing::debug!(
        part = %main,
        blocks = blocks.len(),
        has_styles = styles.is_some(),
        "parsed document body"
    );
    Ok(DocumentTree { blocks, styles })
}

/// Parse the body of a `w:document` part into blocks.
pub fn parse_body(xml: &[u8], cancel: &CancellationToken) -> Result<Vec<Block>> {
    let mut reader = Reader::from_reader(xml);
    // Whitespace inside w:t is content
    reader.config_mut().trim_text(false);

    let mut state = BodyState::new();
    let mut buf = Vec::with_capacity(1024);
    let mut skip_buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if SKIPPED_ELEMENTS.contains(&e.local_name().as_ref()) {
                    let name = e.name().as_ref().to_vec();
                    reader.read_to_end_into(QName(&name), &mut skip_buf)?;
                    skip_buf.clear();
                } else {
                    state.start(&e, false)?;
                }
            },
            Event::Empty(e) => state.start(&e, true)?,
            Event::End(e) => state.end(e.local_name().as_ref(), cancel)?,
            Event::Text(e) => {
                if state.in_text {
                    state.push_text(&String::from_utf8_lossy(&e));
                }
            },
            Event::CData(e) => {
                if state.in_text {
                    state.push_text(&String::from_utf8_lossy(&e));
                }
            },
            Event::GeneralRef(e) => {
                if state.in_text {
                    let name = String::from_utf8_lossy(&e);
                    let resolved = resolve_reference(&name).ok_or_else(|| {
                        CompareError::Format(format!("unknown entity reference &{name};"))
                    })?;
                    state.push_text(&resolved);
                }
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }

    state.finish()
}

/// Table under construction.
#[derive(Default)]
struct TableBuilder {
    rows: Vec<TableRow>,
    row: Option<Vec<TableCell>>,
}

/// Parser state. Containers are the body and every open table cell.
struct BodyState {
    containers: Vec<Vec<Block>>,
    tables: Vec<TableBuilder>,
    paragraph: Option<Paragraph>,
    run: Option<Run>,
    in_ppr: bool,
    in_rpr: bool,
    in_text: bool,
    paragraphs_seen: usize,
}

impl BodyState {
    fn new() -> Self {
        Self {
            containers: vec![Vec::new()],
            tables: Vec::new(),
            paragraph: None,
            run: None,
            in_ppr: false,
            in_rpr: false,
            in_text: false,
            paragraphs_seen: 0,
        }
    }

    fn push_block(&mut self, block: Block) {
        if let Some(container) = self.containers.last_mut() {
            container.push(block);
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(run) = self.run.as_mut() {
            run.text.push_str(text);
        }
    }

    fn push_char(&mut self, c: char) {
        if let Some(run) = self.run.as_mut() {
            run.text.push(c);
        }
    }

    fn start(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<()> {
        match e.local_name().as_ref() {
            b"p" => {
                if empty {
                    self.push_block(Block::Paragraph(Paragraph::new()));
                } else {
                    self.paragraph = Some(Paragraph::new());
                }
            },
            b"pPr" if !empty && self.paragraph.is_some() => self.in_ppr = true,
            b"pStyle" if self.in_ppr => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.properties.style_id = val_attr(e)?;
                }
            },
            b"jc" if self.in_ppr => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.properties.alignment = val_attr(e)?;
                }
            },
            b"r" if !empty && self.paragraph.is_some() => {
                self.run = Some(Run::plain(String::new()));
            },
            b"rPr" if !empty && self.run.is_some() => self.in_rpr = true,
            b"t" if !empty && self.run.is_some() && !self.in_rpr => self.in_text = true,
            b"tab" if self.run.is_some() && !self.in_rpr => self.push_char(TAB),
            b"br" if self.run.is_some() && !self.in_rpr => {
                let c = match val_attr_named(e, b"type")?.as_deref() {
                    Some("page") => PAGE_BREAK,
                    _ => LINE_BREAK,
                };
                self.push_char(c);
            },
            b"cr" if self.run.is_some() && !self.in_rpr => self.push_char(LINE_BREAK),
            b"tbl" if !empty => self.tables.push(TableBuilder::default()),
            b"tr" => {
                if let Some(table) = self.tables.last_mut() {
                    if empty {
                        table.rows.push(TableRow::default());
                    } else {
                        table.row = Some(Vec::new());
                    }
                }
            },
            b"tc" => {
                if empty {
                    if let Some(row) = self.tables.last_mut().and_then(|t| t.row.as_mut()) {
                        row.push(TableCell::default());
                    }
                } else {
                    self.containers.push(Vec::new());
                }
            },
            name if self.in_rpr => {
                if let Some(run) = self.run.as_mut() {
                    apply_run_property(&mut run.attrs, name, e)?;
                }
            },
            _ => {},
        }
        Ok(())
    }

    fn end(&mut self, local: &[u8], cancel: &CancellationToken) -> Result<()> {
        match local {
            b"p" => {
                if let Some(p) = self.paragraph.take() {
                    self.push_block(Block::Paragraph(p));
                    self.paragraphs_seen += 1;
                    if self.paragraphs_seen % CANCEL_CHECK_INTERVAL == 0 {
                        cancel.check()?;
                    }
                }
                self.in_ppr = false;
            },
            b"pPr" => self.in_ppr = false,
            b"r" => {
                if let (Some(run), Some(p)) = (self.run.take(), self.paragraph.as_mut()) {
                    p.push_run(run);
                }
                self.in_rpr = false;
                self.in_text = false;
            },
            b"rPr" => self.in_rpr = false,
            b"t" => self.in_text = false,
            b"tc" => {
                if self.containers.len() > 1
                    && let Some(blocks) = self.containers.pop()
                    && let Some(row) = self.tables.last_mut().and_then(|t| t.row.as_mut())
                {
                    row.push(TableCell::new(blocks));
                }
            },
            b"tr" => {
                if let Some(table) = self.tables.last_mut()
                    && let Some(cells) = table.row.take()
                {
                    table.rows.push(TableRow::new(cells));
                }
            },
            b"tbl" => {
                if let Some(table) = self.tables.pop() {
                    self.push_block(Block::Table(Table::new(table.rows)));
                }
            },
            _ => {},
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Block>> {
        if self.containers.len() != 1 || !self.tables.is_empty() || self.paragraph.is_some() {
            return Err(CompareError::Format(
                "document body ends inside an open paragraph or table".to_string(),
            ));
        }
        Ok(self.containers.pop().unwrap_or_default())
    }
}

/// Apply one `w:rPr` child to the run attributes.
fn apply_run_property(attrs: &mut RunAttributes, name: &[u8], e: &BytesStart<'_>) -> Result<()> {
    match name {
        b"b" => attrs.flags.set(RunFlags::BOLD, toggle(e)?),
        b"i" => attrs.flags.set(RunFlags::ITALIC, toggle(e)?),
        b"strike" => attrs.flags.set(RunFlags::STRIKE, toggle(e)?),
        b"dstrike" => {
            if toggle(e)? {
                attrs.flags.insert(RunFlags::STRIKE);
            }
        },
        b"u" => {
            let on = !matches!(val_attr(e)?.as_deref(), Some("none"));
            attrs.flags.set(RunFlags::UNDERLINE, on);
        },
        b"color" => attrs.color = val_attr(e)?.and_then(|v| Color::from_hex(&v)),
        b"highlight" => attrs.highlight = val_attr(e)?.and_then(|v| Color::from_highlight_name(&v)),
        b"shd" => {
            // w:highlight takes precedence over shading
            if attrs.highlight.is_none() {
                attrs.highlight = val_attr_named(e, b"fill")?.and_then(|v| Color::from_hex(&v));
            }
        },
        b"sz" => attrs.size = val_attr(e)?.and_then(|v| v.parse().ok()),
        _ => {},
    }
    Ok(())
}

/// `w:val` of an on/off property; absent means on.
fn toggle(e: &BytesStart<'_>) -> Result<bool> {
    Ok(!matches!(
        val_attr(e)?.as_deref(),
        Some("0" | "false" | "off")
    ))
}

fn val_attr(e: &BytesStart<'_>) -> Result<Option<String>> {
    val_attr_named(e, b"val")
}

/// Attribute value by local name.
fn val_attr_named(e: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Resolve a predefined entity or a character reference.
fn resolve_reference(name: &str) -> Option<String> {
    if let Some(code) = name.strip_prefix('#') {
        let value = match code.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => code.parse().ok()?,
        };
        return char::from_u32(value).map(String::from);
    }
    quick_xml::escape::resolve_predefined_entity(name).map(str::to_string)
}
