use anyhow::{bail, Context, Result};

use crate::notebook::{CoverSelection, Notebook, NotebookId, NotebookMap};
use crate::storage::StorageHandle;

/// In-memory notebook mapping that writes itself back on every mutation.
///
/// Mutations addressed to an unknown id leave everything untouched and report
/// `false`/`None` instead of failing, so callers decide whether that matters.
pub struct NotebookRepository {
    storage: StorageHandle,
    notebooks: NotebookMap,
    default_font: String,
}

impl NotebookRepository {
    pub fn load(storage: StorageHandle, default_font: &str) -> Result<Self> {
        let notebooks = storage
            .load_notebooks()
            .context("loading notebooks from storage")?;
        tracing::debug!(count = notebooks.len(), "notebooks loaded");
        Ok(Self {
            storage,
            notebooks,
            default_font: default_font.to_string(),
        })
    }

    pub fn storage(&self) -> &StorageHandle {
        &self.storage
    }

    pub fn default_font(&self) -> &str {
        &self.default_font
    }

    pub fn reload(&mut self) -> Result<()> {
        self.notebooks = self
            .storage
            .load_notebooks()
            .context("reloading notebooks from storage")?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.notebooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notebooks.is_empty()
    }

    /// Notebooks in creation order.
    pub fn list(&self) -> impl Iterator<Item = (&NotebookId, &Notebook)> {
        self.notebooks.iter()
    }

    pub fn get(&self, id: &NotebookId) -> Option<&Notebook> {
        self.notebooks.get(id)
    }

    pub fn contains(&self, id: &NotebookId) -> bool {
        self.notebooks.contains_key(id)
    }

    pub fn create(
        &mut self,
        name: &str,
        page_color: &str,
        cover: CoverSelection,
    ) -> Result<NotebookId> {
        let name = name.trim();
        if name.is_empty() {
            bail!("notebook name cannot be empty");
        }
        let latest = self
            .notebooks
            .keys()
            .filter(|id| id.millis().is_some())
            .max_by_key(|id| id.millis());
        let id = NotebookId::generate_after(latest);
        let notebook = Notebook::new(name, page_color, cover, &self.default_font);
        tracing::info!(id = %id, cover = %notebook.cover_type, "creating notebook");
        self.notebooks.insert(id.clone(), notebook);
        self.persist()?;
        Ok(id)
    }

    /// Removes the notebook and any current-notebook pointer aimed at it.
    pub fn delete(&mut self, id: &NotebookId) -> Result<bool> {
        if self.notebooks.remove(id).is_none() {
            return Ok(false);
        }
        self.persist()?;
        if self
            .storage
            .clear_current_notebook_if(id)
            .context("clearing current notebook pointer")?
        {
            tracing::debug!(id = %id, "cleared current notebook pointer");
        }
        tracing::info!(id = %id, "notebook deleted");
        Ok(true)
    }

    /// Replaces the whole page sequence. An empty set is stored as one blank page.
    pub fn set_pages(&mut self, id: &NotebookId, mut pages: Vec<String>) -> Result<bool> {
        let Some(notebook) = self.notebooks.get_mut(id) else {
            return Ok(false);
        };
        if pages.is_empty() {
            pages.push(String::new());
        }
        notebook.pages = pages;
        self.persist()?;
        Ok(true)
    }

    pub fn set_font(&mut self, id: &NotebookId, font: &str) -> Result<bool> {
        let Some(notebook) = self.notebooks.get_mut(id) else {
            return Ok(false);
        };
        notebook.font = font.to_string();
        self.persist()?;
        Ok(true)
    }

    /// Appends a blank page and returns its 1-based number.
    pub fn append_page(&mut self, id: &NotebookId) -> Result<Option<usize>> {
        let Some(notebook) = self.notebooks.get_mut(id) else {
            return Ok(None);
        };
        notebook.pages.push(String::new());
        let number = notebook.pages.len();
        self.persist()?;
        Ok(Some(number))
    }

    pub fn mark_current(&self, id: &NotebookId) -> Result<bool> {
        if !self.contains(id) {
            return Ok(false);
        }
        self.storage
            .set_current_notebook(id)
            .context("recording current notebook")?;
        Ok(true)
    }

    fn persist(&self) -> Result<()> {
        self.storage
            .save_notebooks(&self.notebooks)
            .context("persisting notebooks")
    }
}
