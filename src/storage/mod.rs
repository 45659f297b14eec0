use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::config::{ConfigPaths, StorageOptions};
use crate::notebook::{Notebook, NotebookId, NotebookMap};

mod schema;

pub const NOTEBOOKS_KEY: &str = "diaries";
pub const FOCUS_MODE_KEY: &str = "focusMode";
pub const CURRENT_NOTEBOOK_KEY: &str = "currentDiaryId";

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("reading stored value '{key}'"))
        })
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .with_context(|| format!("writing stored value '{key}'"))?;
            Ok(())
        })
    }

    pub fn remove_item(&self, key: &str) -> Result<bool> {
        self.with_connection(|conn| {
            let removed = conn
                .execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                .with_context(|| format!("removing stored value '{key}'"))?;
            Ok(removed > 0)
        })
    }

    pub fn load_notebooks(&self) -> Result<NotebookMap> {
        let Some(raw) = self.get_item(NOTEBOOKS_KEY)? else {
            return Ok(NotebookMap::new());
        };
        Ok(decode_notebooks(&raw))
    }

    pub fn save_notebooks(&self, notebooks: &NotebookMap) -> Result<()> {
        let json = serde_json::to_string(notebooks).context("serialising notebooks")?;
        self.set_item(NOTEBOOKS_KEY, &json)
    }

    pub fn load_focus_mode(&self) -> Result<bool> {
        Ok(self.get_item(FOCUS_MODE_KEY)?.as_deref() == Some("true"))
    }

    pub fn save_focus_mode(&self, enabled: bool) -> Result<()> {
        self.set_item(FOCUS_MODE_KEY, if enabled { "true" } else { "false" })
    }

    pub fn current_notebook(&self) -> Result<Option<NotebookId>> {
        Ok(self
            .get_item(CURRENT_NOTEBOOK_KEY)?
            .and_then(|raw| NotebookId::parse(&raw)))
    }

    pub fn set_current_notebook(&self, id: &NotebookId) -> Result<()> {
        self.set_item(CURRENT_NOTEBOOK_KEY, id.as_str())
    }

    pub fn clear_current_notebook(&self) -> Result<bool> {
        self.remove_item(CURRENT_NOTEBOOK_KEY)
    }

    /// Clears the current-notebook pointer only when it references `id`.
    pub fn clear_current_notebook_if(&self, id: &NotebookId) -> Result<bool> {
        match self.current_notebook()? {
            Some(current) if &current == id => self.clear_current_notebook(),
            _ => Ok(false),
        }
    }
}

fn decode_notebooks(raw: &str) -> NotebookMap {
    let entries: Map<String, Value> = match serde_json::from_str(raw) {
        Ok(Value::Object(entries)) => entries,
        Ok(Value::Null) => return NotebookMap::new(),
        Ok(_) => {
            tracing::warn!("stored notebooks are not a mapping; starting empty");
            return NotebookMap::new();
        }
        Err(err) => {
            tracing::warn!(?err, "stored notebooks are malformed; starting empty");
            return NotebookMap::new();
        }
    };

    let mut notebooks = NotebookMap::new();
    for (key, value) in entries {
        let Some(id) = NotebookId::parse(&key) else {
            tracing::warn!(key = %key, "skipping notebook with blank identifier");
            continue;
        };
        match serde_json::from_value::<Notebook>(value) {
            Ok(notebook) => {
                notebooks.insert(id, notebook);
            }
            Err(err) => {
                tracing::warn!(?err, id = %id, "skipping unreadable notebook record");
            }
        }
    }
    notebooks
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = if storage.database_path.as_os_str().is_empty() {
        &paths.database_path
    } else {
        &storage.database_path
    };
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    tracing::debug!(path = %db_path.display(), "storage ready");
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}
