use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::clipboard;
use crate::export::{ExportFormat, Exporter};
use crate::notebook::cover::{read_cover_image, CoverError, CoverImage};
use crate::notebook::{NotebookId, NotebookRepository};

use super::state::CreateDialog;

/// Repository-level operations triggered from the list and editor screens.
pub struct ActionDispatcher<'a> {
    repo: &'a mut NotebookRepository,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(repo: &'a mut NotebookRepository) -> Self {
        Self { repo }
    }

    /// Creates a notebook from the dialog contents.
    pub fn create_from_dialog(&mut self, dialog: &CreateDialog) -> Result<NotebookId> {
        self.repo
            .create(&dialog.name, dialog.page_color(), dialog.selection())
    }

    pub fn delete(&mut self, id: &NotebookId) -> Result<bool> {
        self.repo.delete(id)
    }

    pub fn export(&self, exporter: &Exporter, id: &NotebookId, format: ExportFormat) -> Result<PathBuf> {
        let notebook = self
            .repo
            .get(id)
            .ok_or_else(|| anyhow!("notebook {id} not found"))?;
        exporter.export(notebook, format)
    }
}

pub fn attach_cover_image(path: &str, max_bytes: u64) -> Result<CoverImage, CoverError> {
    let trimmed = path.trim();
    read_cover_image(Path::new(trimmed), max_bytes)
}

pub fn copy_page(text: &str) -> Result<()> {
    clipboard::copy_to_clipboard(&clipboard::format_page_for_clipboard(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_FONT, DEFAULT_PAGE_COLOR};
    use crate::export::{DocxRenderer, PdfRenderer, PageStyle};
    use crate::notebook::CoverType;
    use crate::storage::test_support::init_storage;
    use tempfile::TempDir;

    struct Fake;

    impl PdfRenderer for Fake {
        fn render(&self, _title: &str, _pages: &[String], _style: &PageStyle) -> Result<Vec<u8>> {
            Ok(b"%PDF".to_vec())
        }
    }

    impl DocxRenderer for Fake {
        fn render(&self, _title: &str, _pages: &[String]) -> Result<Vec<u8>> {
            Ok(b"PK".to_vec())
        }
    }

    #[test]
    fn dialog_creates_notebook_with_chosen_cover() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let mut repo = NotebookRepository::load(storage, DEFAULT_FONT)?;
        let mut dialog = CreateDialog::new(DEFAULT_PAGE_COLOR);
        dialog.name = "Sketches".into();
        dialog.cycle_color(true);
        dialog.cycle_cover_type(true);
        dialog.cycle_cover_type(true);
        dialog.link = "https://example.com/c.jpg".into();

        let id = ActionDispatcher::new(&mut repo).create_from_dialog(&dialog)?;
        let notebook = repo.get(&id).expect("created");
        assert_eq!(notebook.page_color, "#ffffff");
        assert_eq!(notebook.cover_type, CoverType::Link);
        assert_eq!(notebook.cover_link.as_deref(), Some("https://example.com/c.jpg"));
        Ok(())
    }

    #[test]
    fn export_of_unknown_notebook_fails() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let mut repo = NotebookRepository::load(storage, DEFAULT_FONT)?;
        let out = TempDir::new()?;
        let exporter = Exporter::new(Box::new(Fake), Box::new(Fake), out.path().to_path_buf());
        let dispatcher = ActionDispatcher::new(&mut repo);
        let err = dispatcher
            .export(&exporter, &NotebookId::from_millis(5), ExportFormat::Pdf)
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
        Ok(())
    }

    #[test]
    fn cover_path_is_trimmed_before_reading() {
        let err = attach_cover_image("  /definitely/missing.png  ", 10).unwrap_err();
        assert!(err.to_string().contains("/definitely/missing.png"));
    }
}
