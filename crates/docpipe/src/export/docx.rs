//! Minimal WordprocessingML writer.
//!
//! Produces the three parts Word needs to open a document: content types,
//! package relationships and `word/document.xml`.

use std::borrow::Cow;
use std::io::{Cursor, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::ExportError;

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

struct Paragraph<'a> {
    text: &'a str,
    bold: bool,
}

fn paragraphs<'a>(title: Option<&'a str>, markdown: &'a str) -> Vec<Paragraph<'a>> {
    let mut out = Vec::new();
    if let Some(title) = title.filter(|t| !t.is_empty()) {
        out.push(Paragraph {
            text: title,
            bold: true,
        });
    }
    for line in markdown.lines() {
        let line = line.trim_end();
        if line.starts_with('#') {
            out.push(Paragraph {
                text: line.trim_start_matches('#').trim(),
                bold: true,
            });
        } else {
            out.push(Paragraph {
                text: line,
                bold: false,
            });
        }
    }
    out
}

/// Characters allowed by the XML 1.0 `Char` production.
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

/// Drops characters Word would reject, such as the form feeds OCR emits
/// between pages.
fn xml_text(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|c| is_xml_char(*c)).collect())
    }
}

fn xml_err<E: std::fmt::Display>(e: E) -> ExportError {
    ExportError::Xml(e.to_string())
}

fn document_xml(paragraphs: &[Paragraph<'_>]) -> Result<Vec<u8>, ExportError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(
            BytesStart::new("w:document").with_attributes([("xmlns:w", WORD_NS)]),
        ))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("w:body")))
        .map_err(xml_err)?;

    for p in paragraphs {
        writer
            .write_event(Event::Start(BytesStart::new("w:p")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::Start(BytesStart::new("w:r")))
            .map_err(xml_err)?;
        if p.bold {
            writer
                .write_event(Event::Start(BytesStart::new("w:rPr")))
                .map_err(xml_err)?;
            writer
                .write_event(Event::Empty(BytesStart::new("w:b")))
                .map_err(xml_err)?;
            writer
                .write_event(Event::End(BytesEnd::new("w:rPr")))
                .map_err(xml_err)?;
        }
        writer
            .write_event(Event::Start(
                BytesStart::new("w:t").with_attributes([("xml:space", "preserve")]),
            ))
            .map_err(xml_err)?;
        writer
            .write_event(Event::Text(BytesText::new(&xml_text(p.text))))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("w:t")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("w:r")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("w:p")))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("w:body")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("w:document")))
        .map_err(xml_err)?;

    Ok(writer.into_inner().into_inner())
}

/// Renders a title and markdown body as a `.docx` package.
///
/// The title and every `#` heading line become bold paragraphs; all other
/// lines become plain paragraphs.
pub fn render_docx(title: Option<&str>, markdown: &str) -> Result<Vec<u8>, ExportError> {
    let body = document_xml(&paragraphs(title, markdown))?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, bytes) in [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS.as_bytes()),
        ("word/document.xml", body.as_slice()),
    ] {
        zip.start_file(name, options)
            .map_err(|e| ExportError::Zip(e.to_string()))?;
        zip.write_all(bytes)?;
    }

    let cursor = zip.finish().map_err(|e| ExportError::Zip(e.to_string()))?;
    Ok(cursor.into_inner())
}
