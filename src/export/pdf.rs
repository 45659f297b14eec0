use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Output};

use anyhow::{anyhow, bail, Context, Result};
use tempfile::TempDir;

use crate::export::{PageStyle, PdfRenderer};

const SCAFFOLD_FILE: &str = "notebook.html";
const OUTPUT_FILE: &str = "notebook.pdf";

/// Renders through `pandoc`, trying each PDF engine until one succeeds.
///
/// The HTML scaffold lives in a temporary directory that is removed when rendering
/// returns, whichever way it goes.
#[derive(Debug, Clone)]
pub struct PandocPdfRenderer {
    pandoc: String,
    engines: Vec<String>,
}

impl PandocPdfRenderer {
    pub fn new(pandoc: &str, engines: Vec<String>) -> Self {
        Self {
            pandoc: pandoc.to_string(),
            engines,
        }
    }

    fn run_pandoc(&self, args: &[OsString]) -> Result<Output> {
        match Command::new(&self.pandoc).args(args).output() {
            Ok(output) => Ok(output),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(anyhow!(
                "pandoc not found at `{}`; install pandoc or set export.pandoc in config",
                self.pandoc
            )),
            Err(err) => Err(err).with_context(|| format!("run pandoc: {}", self.pandoc)),
        }
    }
}

impl PdfRenderer for PandocPdfRenderer {
    fn render(&self, title: &str, pages: &[String], style: &PageStyle) -> Result<Vec<u8>> {
        let scratch = TempDir::new().context("creating PDF scaffold directory")?;
        let input = scratch.path().join(SCAFFOLD_FILE);
        let output = scratch.path().join(OUTPUT_FILE);
        fs::write(&input, build_scaffold(title, pages, style))
            .with_context(|| format!("writing PDF scaffold {}", input.display()))?;

        let mut last_failure: Option<anyhow::Error> = None;
        for engine in &self.engines {
            tracing::info!(pdf_engine = %engine, pandoc = %self.pandoc, "export pdf via pandoc");
            let args = pandoc_args(&input, &output, engine, title);
            let result = self.run_pandoc(&args)?;
            if result.status.success() {
                return fs::read(&output)
                    .with_context(|| format!("reading rendered PDF {}", output.display()));
            }
            last_failure = Some(anyhow!(
                "pandoc failed with pdf_engine={engine} ({}): {}",
                result.status,
                String::from_utf8_lossy(&result.stderr)
            ));
        }

        match last_failure {
            Some(err) => Err(err),
            None => bail!("export pdf failed: no pdf engine candidates"),
        }
    }
}

fn pandoc_args(input: &Path, output: &Path, engine: &str, title: &str) -> Vec<OsString> {
    vec![
        input.as_os_str().to_owned(),
        OsString::from("-o"),
        output.as_os_str().to_owned(),
        OsString::from("--from"),
        OsString::from("html"),
        OsString::from("--pdf-engine"),
        OsString::from(engine),
        OsString::from("--metadata"),
        OsString::from(format!("title={title}")),
    ]
}

/// One styled block per page, each headed by its page number.
pub fn build_scaffold(title: &str, pages: &[String], style: &PageStyle) -> String {
    let title = escape(title);
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{title}</title>\n"));
    html.push_str("<style>\n");
    html.push_str("body { margin: 10mm; }\n");
    html.push_str("h1 { text-align: center; margin-bottom: 20px; }\n");
    html.push_str(&format!(
        ".page {{ background-color: {}; font-family: {}; padding: 20px; margin-bottom: 20px; page-break-after: always; }}\n",
        escape(&style.page_color),
        escape(&style.font)
    ));
    html.push_str(".page:last-child { page-break-after: auto; }\n");
    html.push_str(".page-number { font-style: italic; color: #666; border-bottom: 1px solid rgba(0, 0, 0, 0.1); margin-bottom: 15px; padding-bottom: 10px; }\n");
    html.push_str("</style>\n</head>\n<body>\n");
    html.push_str(&format!("<h1>{title}</h1>\n"));
    for (index, page) in pages.iter().enumerate() {
        html.push_str("<div class=\"page\">\n");
        html.push_str(&format!(
            "<div class=\"page-number\">Page {}</div>\n",
            index + 1
        ));
        html.push_str(&format!("<div class=\"content\">{page}</div>\n"));
        html.push_str("</div>\n");
    }
    html.push_str("</body>\n</html>\n");
    html
}

fn escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
