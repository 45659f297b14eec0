use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;

use crate::app::state::page_count_label;
use crate::app::App;
use crate::clipboard;
use crate::config::palette::PageColorPalette;
use crate::config::AppConfig;
use crate::export::{ExportFormat, Exporter};
use crate::notebook::cover::read_cover_image;
use crate::notebook::{CoverSelection, CoverStyle, Notebook, NotebookId, NotebookRepository};
use crate::richtext;
use crate::storage::StorageHandle;

#[derive(Args, Debug, Clone, Default)]
pub struct TuiArgs {
    /// Open this notebook directly instead of the notebook list
    #[arg(long)]
    pub open: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Notebook name (prompted if omitted)
    #[arg()]
    pub name: Option<String>,
    /// Page color as a hex value from the palette
    #[arg(long)]
    pub color: Option<String>,
    /// Use an image file as the cover (max 5 MB by default)
    #[arg(long, conflicts_with = "cover_link")]
    pub cover_image: Option<PathBuf>,
    /// Use an image URL as the cover
    #[arg(long)]
    pub cover_link: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Notebook identifier
    pub id: String,
    /// Only print this page (1-based)
    #[arg(long)]
    pub page: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Notebook identifier
    pub id: String,
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Notebook identifier
    pub id: String,
    /// Output format
    #[arg(long, value_enum)]
    pub format: ExportFormat,
    /// Directory to write into (defaults to export.output_dir)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CopyArgs {
    /// Notebook identifier
    pub id: String,
    /// Page to copy (1-based)
    #[arg(long, default_value_t = 1)]
    pub page: usize,
}

pub fn run_tui(config: Arc<AppConfig>, storage: StorageHandle, args: TuiArgs) -> Result<()> {
    let open = args.open.as_deref().and_then(NotebookId::parse);
    let mut app = App::new(config, storage, open)?;
    app.run()
}

pub fn new_notebook(
    config: &AppConfig,
    repo: &mut NotebookRepository,
    args: NewArgs,
) -> Result<NotebookId> {
    let name = match args.name {
        Some(name) => name,
        None => prompt("Notebook name")?,
    };
    if name.trim().is_empty() {
        bail!("notebook name cannot be empty");
    }

    let palette = PageColorPalette::default();
    let page_color = match args.color.as_deref() {
        Some(color) => {
            let index = palette.position(color).ok_or_else(|| {
                let choices: Vec<&str> = palette.all().iter().map(|s| s.value).collect();
                anyhow!("unknown page color {color}; choose one of {}", choices.join(", "))
            })?;
            palette.all()[index].value.to_string()
        }
        None => config.editor.default_page_color.clone(),
    };

    let cover = if let Some(path) = &args.cover_image {
        let image = read_cover_image(path, config.cover.max_image_bytes)?;
        tracing::debug!(mime = image.mime, size = image.size, "cover image accepted");
        CoverSelection::Image(Some(image.data_uri))
    } else if let Some(link) = args.cover_link {
        CoverSelection::Link(Some(link))
    } else {
        CoverSelection::Color
    };

    repo.create(&name, &page_color, cover)
}

pub fn format_list(repo: &NotebookRepository) -> String {
    if repo.is_empty() {
        return "No notebooks yet.\n".to_string();
    }
    let mut out = String::new();
    for (id, notebook) in repo.list() {
        let _ = writeln!(&mut out, "{id}  {}", notebook.name);
        let _ = writeln!(
            &mut out,
            "    created {} • {} • cover {}",
            id.created_label(),
            page_count_label(notebook.page_count()),
            describe_cover(notebook)
        );
    }
    out
}

fn describe_cover(notebook: &Notebook) -> String {
    match notebook.cover() {
        CoverStyle::SolidColor(color) => format!("color {color}"),
        CoverStyle::Image(_) => "image".to_string(),
        CoverStyle::Link(url) => format!("link {url}"),
    }
}

pub fn render_show(repo: &NotebookRepository, args: &ShowArgs) -> Result<String> {
    let (_, notebook) = lookup(repo, &args.id)?;
    let selected: Vec<(usize, &String)> = match args.page {
        Some(page) => vec![(page, page_html(notebook, page)?)],
        None => notebook
            .pages
            .iter()
            .enumerate()
            .map(|(index, html)| (index + 1, html))
            .collect(),
    };

    let mut out = String::new();
    let _ = writeln!(&mut out, "{}", notebook.name);
    for (number, html) in selected {
        let _ = writeln!(&mut out, "\n--- Page {number} ---");
        let _ = writeln!(&mut out, "{}", richtext::plain_text(html));
    }
    Ok(out)
}

pub fn delete_notebook(repo: &mut NotebookRepository, args: DeleteArgs) -> Result<()> {
    let (id, notebook) = lookup(repo, &args.id)?;
    let name = notebook.name.clone();
    if !args.yes {
        if !atty::is(atty::Stream::Stdin) {
            bail!("refusing to delete without --yes when stdin is not a terminal");
        }
        let answer = prompt(&format!(
            "Are you sure you want to delete this notebook? ({name}) [y/N]"
        ))?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Delete canceled");
            return Ok(());
        }
    }
    repo.delete(&id).context("deleting notebook")?;
    println!("Notebook deleted successfully! ({name})");
    Ok(())
}

pub fn export_notebook(
    config: &AppConfig,
    repo: &NotebookRepository,
    args: ExportArgs,
) -> Result<()> {
    let (_, notebook) = lookup(repo, &args.id)?;
    let mut exporter = Exporter::from_config(&config.export);
    if let Some(out) = args.out {
        exporter = exporter.with_out_dir(out);
    }
    let path = exporter
        .export(notebook, args.format)
        .with_context(|| format!("Failed to export {}", args.format.label()))?;
    println!(
        "{} exported successfully! {}",
        args.format.label(),
        path.display()
    );
    Ok(())
}

pub fn copy_page(repo: &NotebookRepository, args: CopyArgs) -> Result<()> {
    let (_, notebook) = lookup(repo, &args.id)?;
    let text = richtext::plain_text(page_html(notebook, args.page)?);
    clipboard::copy_to_clipboard(&clipboard::format_page_for_clipboard(&text))
        .context("Failed to copy to clipboard")?;
    println!("Page content copied to clipboard!");
    Ok(())
}

fn lookup<'a>(repo: &'a NotebookRepository, raw: &str) -> Result<(NotebookId, &'a Notebook)> {
    let id = NotebookId::parse(raw).ok_or_else(|| anyhow!("notebook id cannot be blank"))?;
    let notebook = repo
        .get(&id)
        .ok_or_else(|| anyhow!("notebook {id} not found"))?;
    Ok((id, notebook))
}

fn page_html(notebook: &Notebook, page: usize) -> Result<&String> {
    page.checked_sub(1)
        .and_then(|index| notebook.pages.get(index))
        .ok_or_else(|| {
            anyhow!(
                "page {page} out of range; notebook has {}",
                page_count_label(notebook.page_count())
            )
        })
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_FONT;
    use crate::notebook::CoverType;
    use crate::storage::test_support::init_storage;
    use std::fs;
    use tempfile::TempDir;

    type TestResult<T = ()> = Result<T>;

    fn new_args(name: &str) -> NewArgs {
        NewArgs {
            name: Some(name.into()),
            color: None,
            cover_image: None,
            cover_link: None,
        }
    }

    fn setup() -> TestResult<(TempDir, NotebookRepository)> {
        let (temp, storage) = init_storage()?;
        let repo = NotebookRepository::load(storage, DEFAULT_FONT)?;
        Ok((temp, repo))
    }

    #[test]
    fn cli_new_validates_palette_and_cover() -> TestResult {
        let (temp, mut repo) = setup()?;
        let config = AppConfig::default();

        let mut args = new_args("Sketches");
        args.color = Some("#F4E4C1".into());
        args.cover_link = Some("https://example.com/c.jpg".into());
        let id = new_notebook(&config, &mut repo, args)?;
        let notebook = repo.get(&id).expect("created");
        assert_eq!(notebook.page_color, "#f4e4c1");
        assert_eq!(notebook.cover_type, CoverType::Link);

        let mut bad = new_args("Nope");
        bad.color = Some("#123456".into());
        let err = new_notebook(&config, &mut repo, bad).unwrap_err();
        assert!(err.to_string().contains("unknown page color"));

        let image = temp.path().join("cover.txt");
        fs::write(&image, "not an image")?;
        let mut with_image = new_args("Pictures");
        with_image.cover_image = Some(image);
        let err = new_notebook(&config, &mut repo, with_image).unwrap_err();
        assert_eq!(err.to_string(), "Please select an image file.");
        assert_eq!(repo.len(), 1);
        Ok(())
    }

    #[test]
    fn cli_list_and_show_print_pages() -> TestResult {
        let (_temp, mut repo) = setup()?;
        let config = AppConfig::default();
        let id = new_notebook(&config, &mut repo, new_args("Trip"))?;
        repo.set_pages(&id, vec!["Day one<br>sunny".into(), "Fish &amp; chips".into()])?;

        let listing = format_list(&repo);
        assert!(listing.contains(&format!("{id}  Trip")));
        assert!(listing.contains("2 pages"));
        assert!(listing.contains("cover color #f5f1e7"));

        let all = render_show(
            &repo,
            &ShowArgs {
                id: id.to_string(),
                page: None,
            },
        )?;
        assert!(all.contains("--- Page 1 ---\nDay one\nsunny"));
        assert!(all.contains("--- Page 2 ---\nFish & chips"));

        let err = render_show(
            &repo,
            &ShowArgs {
                id: id.to_string(),
                page: Some(3),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("page 3 out of range"));
        Ok(())
    }

    #[test]
    fn cli_delete_with_yes_removes_notebook() -> TestResult {
        let (_temp, mut repo) = setup()?;
        let id = new_notebook(&AppConfig::default(), &mut repo, new_args("Gone"))?;
        delete_notebook(
            &mut repo,
            DeleteArgs {
                id: id.to_string(),
                yes: true,
            },
        )?;
        assert!(repo.is_empty());

        let err = delete_notebook(
            &mut repo,
            DeleteArgs {
                id: id.to_string(),
                yes: true,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
        Ok(())
    }

    #[test]
    fn cli_export_docx_writes_into_out_dir() -> TestResult {
        let (_temp, mut repo) = setup()?;
        let id = new_notebook(&AppConfig::default(), &mut repo, new_args("Road Trip"))?;
        let out = TempDir::new()?;
        export_notebook(
            &AppConfig::default(),
            &repo,
            ExportArgs {
                id: id.to_string(),
                format: ExportFormat::Docx,
                out: Some(out.path().to_path_buf()),
            },
        )?;
        assert!(out.path().join("Road_Trip.docx").exists());
        Ok(())
    }
}
