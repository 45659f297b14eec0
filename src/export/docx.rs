use std::io::{Cursor, Write as _};

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;

use crate::export::DocxRenderer;

const PAGE_BREAK: &str = r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#;

/// Writes a minimal WordprocessingML package: a centered title, then for every
/// page an italic `Page N` header followed by one paragraph per text line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipDocxRenderer;

impl DocxRenderer for ZipDocxRenderer {
    fn render(&self, title: &str, pages: &[String]) -> Result<Vec<u8>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let parts = [
            ("[Content_Types].xml", content_types_xml()),
            ("_rels/.rels", package_rels_xml()),
            ("word/_rels/document.xml.rels", document_rels_xml()),
            ("word/styles.xml", styles_xml()),
            ("word/document.xml", document_xml(title, pages)),
        ];
        for (name, body) in parts {
            zip.start_file(name, options)
                .with_context(|| format!("docx start_file {name}"))?;
            zip.write_all(body.as_bytes())
                .with_context(|| format!("docx write {name}"))?;
        }

        let cursor = zip.finish().context("docx finish zip")?;
        Ok(cursor.into_inner())
    }
}

fn content_types_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
  <Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
</Types>
"#
    .to_string()
}

fn package_rels_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>
"#
    .to_string()
}

fn document_rels_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>
"#
    .to_string()
}

fn styles_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal">
    <w:name w:val="Normal"/>
    <w:pPr><w:spacing w:after="200"/></w:pPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="Heading1">
    <w:name w:val="heading 1"/>
    <w:basedOn w:val="Normal"/>
    <w:next w:val="Normal"/>
    <w:pPr><w:keepNext/><w:spacing w:after="400"/><w:outlineLvl w:val="0"/></w:pPr>
    <w:rPr><w:b/><w:sz w:val="36"/></w:rPr>
  </w:style>
  <w:style w:type="paragraph" w:customStyle="1" w:styleId="PageHeader">
    <w:name w:val="Page Header"/>
    <w:basedOn w:val="Normal"/>
    <w:rPr><w:i/><w:color w:val="666666"/></w:rPr>
  </w:style>
</w:styles>
"#
    .to_string()
}

pub(crate) fn document_xml(title: &str, pages: &[String]) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/><w:jc w:val="center"/></w:pPr>{}</w:p>"#,
        text_run(title)
    ));

    for (index, page) in pages.iter().enumerate() {
        body.push_str(&format!(
            r#"<w:p><w:pPr><w:pStyle w:val="PageHeader"/></w:pPr>{}</w:p>"#,
            text_run(&format!("Page {}", index + 1))
        ));
        for line in page.split('\n') {
            if line.is_empty() {
                body.push_str("<w:p/>");
            } else {
                body.push_str(&format!("<w:p>{}</w:p>", text_run(line)));
            }
        }
        if index + 1 < pages.len() {
            body.push_str(PAGE_BREAK);
        }
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr/></w:body></w:document>
"#
    )
}

fn text_run(text: &str) -> String {
    format!(r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#, xml_escape(text))
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    fn read_part(bytes: Vec<u8>, name: &str) -> anyhow::Result<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut file = archive.by_name(name)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(contents)
    }

    #[test]
    fn package_contains_required_parts() -> anyhow::Result<()> {
        let bytes = ZipDocxRenderer.render("Trip", &["Hello".to_string()])?;
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "[Content_Types].xml",
                "_rels/.rels",
                "word/_rels/document.xml.rels",
                "word/document.xml",
                "word/styles.xml",
            ]
        );
        let mut types = String::new();
        archive
            .by_name("[Content_Types].xml")?
            .read_to_string(&mut types)?;
        assert!(types.contains("wordprocessingml.document.main+xml"));
        Ok(())
    }

    #[test]
    fn pages_are_separated_by_breaks_but_not_trailed_by_one() -> anyhow::Result<()> {
        let pages = vec![
            "Day one\nsunny".to_string(),
            String::new(),
            "Fish & chips".to_string(),
        ];
        let document = read_part(ZipDocxRenderer.render("My <Trip>", &pages)?, "word/document.xml")?;

        assert_eq!(document.matches(r#"<w:br w:type="page"/>"#).count(), 2);
        assert!(document.contains("My &lt;Trip&gt;"));
        for number in 1..=3 {
            assert!(document.contains(&format!(">Page {number}<")));
        }
        assert!(document.contains(">Day one<"));
        assert!(document.contains(">sunny<"));
        assert!(document.contains("Fish &amp; chips"));
        let last_break = document.rfind("w:type=\"page\"").unwrap_or(0);
        assert!(document.find(">Page 3<").unwrap_or(0) > last_break);
        Ok(())
    }

    #[test]
    fn single_page_has_no_break() {
        let document = document_xml("Solo", &[String::new()]);
        assert!(!document.contains("w:type=\"page\""));
        assert!(document.contains(r#"<w:pStyle w:val="Heading1"/><w:jc w:val="center"/>"#));
    }
}
