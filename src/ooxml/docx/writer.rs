//! WordprocessingML serialization of a [`DocumentTree`].
//!
//! Produces a complete minimal package: the main document, its
//! relationships, a stylesheet, and the core and extended properties.
use crate::error::{CompareError, Result};
use crate::ooxml::docx::model::{
    Block, DocumentTree, LINE_BREAK, PAGE_BREAK, Paragraph, Run, RunAttributes, TAB, Table,
};
use crate::ooxml::opc::constants::{content_type as ct, namespace, relationship_type as rt};
use crate::ooxml::opc::packuri::PACKAGE_URI;
use crate::ooxml::opc::{OpcPackage, PackURI, Relationships};
use quick_xml::escape::escape;

const DOCUMENT_PART: &str = "/word/document.xml";
const STYLES_PART: &str = "/word/styles.xml";
const CORE_PART: &str = "/docProps/core.xml";
const APP_PART: &str = "/docProps/app.xml";

const APPLICATION_NAME: &str = "The Litchi Rust Library";

/// Usable page width in twentieths of a point (Letter, one-inch margins).
const TEXT_WIDTH_TWIPS: usize = 9360;

/// Build the OPC package for a document tree.
pub fn build_package(tree: &DocumentTree) -> Result<OpcPackage> {
    let mut package = OpcPackage::new();
    let uri = |s: &str| PackURI::new(s).map_err(CompareError::Format);

    let root = uri(PACKAGE_URI)?;
    let mut root_rels = Relationships::new("/");
    root_rels.add(rt::OFFICE_DOCUMENT, &DOCUMENT_PART[1..]);
    root_rels.add(rt::CORE_PROPERTIES, &CORE_PART[1..]);
    root_rels.add(rt::EXTENDED_PROPERTIES, &APP_PART[1..]);
    package.set_relationships(&root, &root_rels);

    let document = uri(DOCUMENT_PART)?;
    let mut doc_rels = Relationships::new(document.base_uri());
    doc_rels.add(rt::STYLES, "styles.xml");
    package.set_relationships(&document, &doc_rels);
    package.add_part(
        document,
        ct::WML_DOCUMENT_MAIN,
        document_xml(tree).into_bytes(),
    );

    let styles = match &tree.styles {
        Some(sheet) => sheet.0.clone(),
        None => default_styles_xml().into_bytes(),
    };
    package.add_part(uri(STYLES_PART)?, ct::WML_STYLES, styles);

    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    package.add_part(
        uri(CORE_PART)?,
        ct::OPC_CORE_PROPERTIES,
        core_xml(&now).into_bytes(),
    );
    package.add_part(
        uri(APP_PART)?,
        ct::OFC_EXTENDED_PROPERTIES,
        app_xml(tree.paragraph_count()).into_bytes(),
    );

    Ok(package)
}

/// The `word/document.xml` part.
pub fn document_xml(tree: &DocumentTree) -> String {
    let mut xml = String::with_capacity(1024 + tree.blocks.len() * 128);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push('\n');
    xml.push_str(&format!(
        r#"<w:document xmlns:w="{}" xmlns:r="{}">"#,
        namespace::WML_MAIN,
        namespace::OFC_RELATIONSHIPS
    ));
    xml.push_str("<w:body>");
    write_blocks(&tree.blocks, &mut xml);
    xml.push_str(
        r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr>"#,
    );
    xml.push_str("</w:body></w:document>");
    xml
}

fn write_blocks(blocks: &[Block], xml: &mut String) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => write_paragraph(p, xml),
            Block::Table(t) => write_table(t, xml),
        }
    }
}

fn write_paragraph(para: &Paragraph, xml: &mut String) {
    let props = &para.properties;
    if para.is_empty() && props.style_id.is_none() && props.alignment.is_none() {
        xml.push_str("<w:p/>");
        return;
    }

    xml.push_str("<w:p>");
    if props.style_id.is_some() || props.alignment.is_some() {
        xml.push_str("<w:pPr>");
        if let Some(style) = &props.style_id {
            xml.push_str(&format!(r#"<w:pStyle w:val="{}"/>"#, escape(style.as_str())));
        }
        if let Some(jc) = &props.alignment {
            xml.push_str(&format!(r#"<w:jc w:val="{}"/>"#, escape(jc.as_str())));
        }
        xml.push_str("</w:pPr>");
    }
    for run in para.runs() {
        write_run(run, xml);
    }
    xml.push_str("</w:p>");
}

fn write_run(run: &Run, xml: &mut String) {
    xml.push_str("<w:r>");
    write_run_properties(&run.attrs, xml);

    let mut segment = String::new();
    for c in run.text.chars() {
        let special = match c {
            TAB => "<w:tab/>",
            LINE_BREAK | '\r' => "<w:br/>",
            PAGE_BREAK => r#"<w:br w:type="page"/>"#,
            // Not representable in XML 1.0
            c if (c as u32) < 0x20 => continue,
            c => {
                segment.push(c);
                continue;
            },
        };
        flush_text(&mut segment, xml);
        xml.push_str(special);
    }
    flush_text(&mut segment, xml);
    xml.push_str("</w:r>");
}

fn flush_text(segment: &mut String, xml: &mut String) {
    if segment.is_empty() {
        return;
    }
    xml.push_str(r#"<w:t xml:space="preserve">"#);
    xml.push_str(&escape(segment.as_str()));
    xml.push_str("</w:t>");
    segment.clear();
}

/// `w:rPr` children in schema order.
fn write_run_properties(attrs: &RunAttributes, xml: &mut String) {
    if attrs.is_plain() {
        return;
    }
    xml.push_str("<w:rPr>");
    if attrs.bold() {
        xml.push_str("<w:b/><w:bCs/>");
    }
    if attrs.italic() {
        xml.push_str("<w:i/><w:iCs/>");
    }
    if attrs.strike() {
        xml.push_str("<w:strike/>");
    }
    if let Some(color) = attrs.color {
        xml.push_str(&format!(r#"<w:color w:val="{}"/>"#, color.to_hex()));
    }
    if let Some(size) = attrs.size {
        xml.push_str(&format!(r#"<w:sz w:val="{size}"/><w:szCs w:val="{size}"/>"#));
    }
    let highlight_name = attrs.highlight.and_then(|c| c.highlight_name());
    if let Some(name) = highlight_name {
        xml.push_str(&format!(r#"<w:highlight w:val="{name}"/>"#));
    }
    if attrs.underline() {
        xml.push_str(r#"<w:u w:val="single"/>"#);
    }
    if let (Some(color), None) = (attrs.highlight, highlight_name) {
        xml.push_str(&format!(
            r#"<w:shd w:val="clear" w:color="auto" w:fill="{}"/>"#,
            color.to_hex()
        ));
    }
    xml.push_str("</w:rPr>");
}

fn write_table(table: &Table, xml: &mut String) {
    let columns = table.column_count().max(1);
    let width = TEXT_WIDTH_TWIPS / columns;

    xml.push_str("<w:tbl><w:tblPr>");
    xml.push_str(r#"<w:tblW w:w="0" w:type="auto"/><w:tblBorders>"#);
    for edge in ["top", "left", "bottom", "right", "insideH", "insideV"] {
        xml.push_str(&format!(
            r#"<w:{edge} w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#
        ));
    }
    xml.push_str("</w:tblBorders></w:tblPr><w:tblGrid>");
    for _ in 0..columns {
        xml.push_str(&format!(r#"<w:gridCol w:w="{width}"/>"#));
    }
    xml.push_str("</w:tblGrid>");

    for row in &table.rows {
        xml.push_str("<w:tr>");
        for cell in &row.cells {
            xml.push_str(&format!(
                r#"<w:tc><w:tcPr><w:tcW w:w="{width}" w:type="dxa"/></w:tcPr>"#
            ));
            write_blocks(&cell.blocks, xml);
            // A cell must end with a paragraph
            if !matches!(cell.blocks.last(), Some(Block::Paragraph(_))) {
                xml.push_str("<w:p/>");
            }
            xml.push_str("</w:tc>");
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
}

/// Stylesheet used when the tree carries none.
pub fn default_styles_xml() -> String {
    let mut xml = String::with_capacity(1024);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push('\n');
    xml.push_str(&format!(r#"<w:styles xmlns:w="{}">"#, namespace::WML_MAIN));
    xml.push_str("<w:docDefaults>");
    xml.push_str("<w:rPrDefault><w:rPr>");
    xml.push_str(r#"<w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri"/>"#);
    xml.push_str(r#"<w:sz w:val="22"/><w:szCs w:val="22"/>"#);
    xml.push_str("</w:rPr></w:rPrDefault>");
    xml.push_str(r#"<w:pPrDefault><w:pPr><w:spacing w:after="160" w:line="259" w:lineRule="auto"/></w:pPr></w:pPrDefault>"#);
    xml.push_str("</w:docDefaults>");
    xml.push_str(r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>"#);
    xml.push_str(r#"<w:style w:type="character" w:default="1" w:styleId="DefaultParagraphFont"><w:name w:val="Default Paragraph Font"/><w:uiPriority w:val="1"/><w:semiHidden/></w:style>"#);
    xml.push_str(r#"<w:style w:type="table" w:default="1" w:styleId="TableNormal"><w:name w:val="Normal Table"/><w:tblPr><w:tblInd w:w="0" w:type="dxa"/><w:tblCellMar><w:top w:w="0" w:type="dxa"/><w:left w:w="108" w:type="dxa"/><w:bottom w:w="0" w:type="dxa"/><w:right w:w="108" w:type="dxa"/></w:tblCellMar></w:tblPr></w:style>"#);
    xml.push_str("</w:styles>");
    xml
}

fn core_xml(timestamp: &str) -> String {
    let mut xml = String::with_capacity(640);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push('\n');
    xml.push_str(&format!(
        r#"<cp:coreProperties xmlns:cp="{}" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
        namespace::OPC_CORE_PROPERTIES
    ));
    xml.push_str(&format!("<dc:creator>{APPLICATION_NAME}</dc:creator>"));
    xml.push_str(&format!(
        "<cp:lastModifiedBy>{APPLICATION_NAME}</cp:lastModifiedBy>"
    ));
    xml.push_str(&format!(
        r#"<dcterms:created xsi:type="dcterms:W3CDTF">{timestamp}</dcterms:created>"#
    ));
    xml.push_str(&format!(
        r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{timestamp}</dcterms:modified>"#
    ));
    xml.push_str("</cp:coreProperties>");
    xml
}

fn app_xml(paragraphs: usize) -> String {
    let mut xml = String::with_capacity(384);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push('\n');
    xml.push_str(&format!(
        r#"<Properties xmlns="{}" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">"#,
        namespace::OFC_EXTENDED_PROPERTIES
    ));
    xml.push_str(&format!("<Application>{APPLICATION_NAME}</Application>"));
    xml.push_str("<DocSecurity>0</DocSecurity>");
    xml.push_str(&format!("<Paragraphs>{paragraphs}</Paragraphs>"));
    xml.push_str("<LinksUpToDate>false</LinksUpToDate>");
    xml.push_str("</Properties>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{CancellationToken, Color};
    use crate::ooxml::docx::model::{
        ParagraphProperties, RunFlags, StyleSheet, TableCell, TableRow,
    };
    use crate::ooxml::docx::reader::{parse_body, read_document};

    fn sample_tree() -> DocumentTree {
        let mut heading = Paragraph::from_text("Title & <more>");
        heading.properties = ParagraphProperties {
            style_id: Some("Heading1".to_string()),
            alignment: Some("center".to_string()),
        };
        let styled = Paragraph::from_runs([
            Run::plain("  lead\tand "),
            Run::new(
                "styled",
                RunAttributes {
                    flags: RunFlags::BOLD | RunFlags::STRIKE | RunFlags::UNDERLINE,
                    color: Some(Color::RED),
                    highlight: Some(Color::rgb(0x12, 0x34, 0x56)),
                    size: Some(30),
                },
            ),
            Run::new(
                "\nnext\u{000C}",
                RunAttributes {
                    flags: RunFlags::ITALIC,
                    highlight: Some(Color::YELLOW),
                    ..Default::default()
                },
            ),
        ]);
        let table = Table::new(vec![
            TableRow::new(vec![TableCell::from_text("a"), TableCell::from_text("b")]),
            TableRow::new(vec![TableCell::from_text("c")]),
        ]);
        DocumentTree::new(vec![
            Block::Paragraph(heading),
            Block::Paragraph(Paragraph::new()),
            Block::Paragraph(styled),
            Block::Table(table),
        ])
    }

    #[test]
    fn test_document_xml_round_trip() {
        let tree = sample_tree();
        let xml = document_xml(&tree);
        assert!(xml.contains("Title &amp; &lt;more&gt;"));
        assert!(xml.contains(r#"<w:highlight w:val="yellow"/>"#));
        assert!(xml.contains(r#"w:fill="123456""#));

        let blocks = parse_body(xml.as_bytes(), &CancellationToken::new()).unwrap();
        assert_eq!(blocks, tree.blocks);
    }

    #[test]
    fn test_package_round_trip_keeps_styles() {
        let mut tree = sample_tree();
        let package = build_package(&tree).unwrap();
        let read = read_document(&package, &CancellationToken::new()).unwrap();
        assert_eq!(read.blocks, tree.blocks);
        assert_eq!(
            read.styles,
            Some(StyleSheet(default_styles_xml().into_bytes()))
        );

        tree.styles = Some(StyleSheet(b"<w:styles/>".to_vec()));
        let package = build_package(&tree).unwrap();
        let read = read_document(&package, &CancellationToken::new()).unwrap();
        assert_eq!(read, tree);
    }

    #[test]
    fn test_cell_ending_with_table_gets_paragraph() {
        let inner = Table::new(vec![TableRow::new(vec![TableCell::from_text("x")])]);
        let outer = Table::new(vec![TableRow::new(vec![TableCell::new(vec![
            Block::Table(inner),
        ])])]);
        let xml = document_xml(&DocumentTree::new(vec![Block::Table(outer)]));
        assert!(xml.contains("</w:tbl><w:p/></w:tc>"));
    }
}
