use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use strum::{Display, EnumString};

use crate::config::ExportConfig;
use crate::notebook::Notebook;
use crate::richtext;

pub mod docx;
pub mod pdf;

pub use docx::ZipDocxRenderer;
pub use pdf::PandocPdfRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Docx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "PDF",
            ExportFormat::Docx => "DOCX",
        }
    }
}

/// Visual settings carried over from the notebook into rendered pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageStyle {
    pub font: String,
    pub page_color: String,
}

/// Turns a title and ordered HTML pages into a PDF document.
pub trait PdfRenderer {
    fn render(&self, title: &str, pages: &[String], style: &PageStyle) -> Result<Vec<u8>>;
}

/// Turns a title and ordered plain-text pages into a DOCX document.
pub trait DocxRenderer {
    fn render(&self, title: &str, pages: &[String]) -> Result<Vec<u8>>;
}

const FALLBACK_STEM: &str = "notebook";

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));
static PATH_HOSTILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).expect("path character pattern is valid")
});

/// `My Trip  2024` becomes `My_Trip_2024.pdf`. The result is always a single
/// file name: separators are replaced and leading dots dropped.
pub fn export_file_name(name: &str, format: ExportFormat) -> String {
    let stem = WHITESPACE_RUN.replace_all(name, "_");
    let stem = PATH_HOSTILE.replace_all(&stem, "_");
    let stem = match stem.trim_start_matches('.') {
        "" => FALLBACK_STEM,
        stem => stem,
    };
    format!("{stem}.{}", format.extension())
}

pub fn export_pdf(
    notebook: &Notebook,
    renderer: &dyn PdfRenderer,
    out_dir: &Path,
) -> Result<PathBuf> {
    let style = PageStyle {
        font: notebook.font.clone(),
        page_color: notebook.page_color.clone(),
    };
    let bytes = renderer
        .render(&notebook.name, &notebook.pages, &style)
        .context("rendering PDF")?;
    write_output(out_dir, &export_file_name(&notebook.name, ExportFormat::Pdf), &bytes)
}

pub fn export_docx(
    notebook: &Notebook,
    renderer: &dyn DocxRenderer,
    out_dir: &Path,
) -> Result<PathBuf> {
    let pages: Vec<String> = notebook
        .pages
        .iter()
        .map(|html| richtext::plain_text(html))
        .collect();
    let bytes = renderer
        .render(&notebook.name, &pages)
        .context("rendering DOCX")?;
    write_output(out_dir, &export_file_name(&notebook.name, ExportFormat::Docx), &bytes)
}

fn write_output(out_dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating export directory {}", out_dir.display()))?;
    let path = out_dir.join(file_name);
    fs::write(&path, bytes).with_context(|| format!("writing export {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "export written");
    Ok(path)
}

/// Bundles the configured converters with the output directory.
pub struct Exporter {
    pdf: Box<dyn PdfRenderer>,
    docx: Box<dyn DocxRenderer>,
    out_dir: PathBuf,
}

impl Exporter {
    pub fn new(pdf: Box<dyn PdfRenderer>, docx: Box<dyn DocxRenderer>, out_dir: PathBuf) -> Self {
        Self { pdf, docx, out_dir }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(
            Box::new(PandocPdfRenderer::new(&config.pandoc, config.pdf_engines.clone())),
            Box::new(ZipDocxRenderer),
            config.output_dir.clone(),
        )
    }

    pub fn with_out_dir(mut self, out_dir: PathBuf) -> Self {
        self.out_dir = out_dir;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn export(&self, notebook: &Notebook, format: ExportFormat) -> Result<PathBuf> {
        tracing::info!(name = %notebook.name, %format, "exporting notebook");
        match format {
            ExportFormat::Pdf => export_pdf(notebook, self.pdf.as_ref(), &self.out_dir),
            ExportFormat::Docx => export_docx(notebook, self.docx.as_ref(), &self.out_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_FONT;
    use crate::notebook::CoverSelection;
    use anyhow::bail;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<(String, Vec<String>)>>,
    }

    impl PdfRenderer for Recorder {
        fn render(&self, title: &str, pages: &[String], style: &PageStyle) -> Result<Vec<u8>> {
            assert_eq!(style.page_color, "#f5f1e7");
            self.calls
                .borrow_mut()
                .push((title.to_string(), pages.to_vec()));
            Ok(b"%PDF-1.7".to_vec())
        }
    }

    impl DocxRenderer for Recorder {
        fn render(&self, title: &str, pages: &[String]) -> Result<Vec<u8>> {
            self.calls
                .borrow_mut()
                .push((title.to_string(), pages.to_vec()));
            Ok(b"PK".to_vec())
        }
    }

    struct Broken;

    impl DocxRenderer for Broken {
        fn render(&self, _title: &str, _pages: &[String]) -> Result<Vec<u8>> {
            bail!("converter exploded")
        }
    }

    fn notebook() -> Notebook {
        let mut nb = Notebook::new("My Trip  2024", "#f5f1e7", CoverSelection::Color, DEFAULT_FONT);
        nb.pages = vec![
            "<span class=\"pen-text\" style=\"color: #000000\">Day one</span><br>sunny".into(),
            "Fish &amp; chips".into(),
        ];
        nb
    }

    #[test]
    fn file_names_replace_whitespace_runs() {
        assert_eq!(export_file_name("My Trip  2024", ExportFormat::Pdf), "My_Trip_2024.pdf");
        assert_eq!(export_file_name("Tabs\there", ExportFormat::Docx), "Tabs_here.docx");
        assert_eq!(export_file_name(" padded ", ExportFormat::Pdf), "_padded_.pdf");
    }

    #[test]
    fn file_names_never_leave_the_export_directory() -> anyhow::Result<()> {
        assert_eq!(export_file_name("../escaped", ExportFormat::Docx), "_escaped.docx");
        assert_eq!(export_file_name("Trip 2024/25", ExportFormat::Pdf), "Trip_2024_25.pdf");
        assert_eq!(export_file_name(r"a\b:c?", ExportFormat::Pdf), "a_b_c_.pdf");
        assert_eq!(export_file_name("..", ExportFormat::Docx), "notebook.docx");
        assert_eq!(export_file_name(".", ExportFormat::Pdf), "notebook.pdf");

        let root = TempDir::new()?;
        let out = root.path().join("exports");
        let mut nb = notebook();
        nb.name = "../escaped".into();
        let path = export_docx(&nb, &Recorder::default(), &out)?;
        assert_eq!(path, out.join("_escaped.docx"));
        assert!(!root.path().join("escaped.docx").exists());

        nb.name = "Trip 2024/25".into();
        let path = export_docx(&nb, &Recorder::default(), &out)?;
        assert_eq!(path, out.join("Trip_2024_25.docx"));
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn pdf_receives_title_and_html_pages_in_order() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let recorder = Recorder::default();
        let path = export_pdf(&notebook(), &recorder, temp.path())?;

        assert_eq!(path, temp.path().join("My_Trip_2024.pdf"));
        assert_eq!(fs::read(&path)?, b"%PDF-1.7");
        let calls = recorder.calls.borrow();
        assert_eq!(calls[0].0, "My Trip  2024");
        assert_eq!(calls[0].1, notebook().pages);
        Ok(())
    }

    #[test]
    fn docx_receives_plain_text_pages() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let recorder = Recorder::default();
        export_docx(&notebook(), &recorder, temp.path())?;

        let calls = recorder.calls.borrow();
        assert_eq!(calls[0].1, vec!["Day one\nsunny".to_string(), "Fish & chips".to_string()]);
        assert!(temp.path().join("My_Trip_2024.docx").exists());
        Ok(())
    }

    #[test]
    fn converter_failure_is_reported_and_writes_nothing() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let err = export_docx(&notebook(), &Broken, temp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("converter exploded"));
        assert!(!temp.path().join("My_Trip_2024.docx").exists());
        Ok(())
    }
}
