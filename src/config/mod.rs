use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::config::palette::{FontRegistry, PageColorPalette, PenPalette};

pub mod palette;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Papernotes";
const APP_NAME: &str = "papernotes";

pub const DEFAULT_FONT: &str = "'Crimson Pro', serif";
pub const DEFAULT_PAGE_COLOR: &str = "#f5f1e7";
pub const DEFAULT_PEN_COLOR: &str = "#000000";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths)?;
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub export_dir: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("PAPERNOTES_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("PAPERNOTES_DATA").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let database_path = data_root.join("papernotes.db");
        let export_dir = data_root.join("exports");

        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));
        let log_dir = state_dir.join("logs");

        Ok(Self {
            config_dir,
            config_file,
            data_dir: data_root,
            database_path,
            export_dir,
            log_dir,
            state_dir,
        })
    }

    /// Lays every directory out under `root`; used by tests and `--data-dir` sandboxes.
    pub fn rooted_at(root: &Path) -> Self {
        let data_dir = root.join("data");
        let state_dir = root.join("state");
        Self {
            config_dir: root.join("config"),
            config_file: root.join("config/config.toml"),
            database_path: data_dir.join("papernotes.db"),
            export_dir: data_dir.join("exports"),
            data_dir,
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub editor: EditorConfig,
    pub auto_save: AutoSaveConfig,
    pub cover: CoverConfig,
    pub export: ExportConfig,
    pub storage: StorageOptions,
    pub ui: UiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            editor: EditorConfig::default(),
            auto_save: AutoSaveConfig::default(),
            cover: CoverConfig::default(),
            export: ExportConfig::default(),
            storage: StorageOptions::default(),
            ui: UiConfig::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        if self.export.output_dir.as_os_str().is_empty() {
            self.export.output_dir = paths.export_dir.clone();
        }
        self.editor.normalize();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub default_font: String,
    pub default_page_color: String,
    pub pen_color: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_font: DEFAULT_FONT.to_string(),
            default_page_color: DEFAULT_PAGE_COLOR.to_string(),
            pen_color: DEFAULT_PEN_COLOR.to_string(),
        }
    }
}

impl EditorConfig {
    fn normalize(&mut self) {
        if !FontRegistry::default().contains(&self.default_font) {
            tracing::warn!(font = %self.default_font, "unknown default font in config, falling back");
            self.default_font = DEFAULT_FONT.to_string();
        }
        if !PageColorPalette::default().contains(&self.default_page_color) {
            tracing::warn!(color = %self.default_page_color, "unknown page color in config, falling back");
            self.default_page_color = DEFAULT_PAGE_COLOR.to_string();
        }
        if !PenPalette::default().contains(&self.pen_color) {
            tracing::warn!(color = %self.pen_color, "unknown pen color in config, falling back");
            self.pen_color = DEFAULT_PEN_COLOR.to_string();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    pub enabled: bool,
    /// Quiet period after the last edit before a save fires
    pub debounce_ms: u64,
    /// Unconditional save cadence, whether or not anything changed
    pub interval_secs: u64,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 300,
            interval_secs: 10,
        }
    }
}

impl AutoSaveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    pub max_image_bytes: u64,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub pandoc: String,
    pub pdf_engines: Vec<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::new(),
            pandoc: "pandoc".to_string(),
            pdf_engines: vec!["weasyprint".to_string(), "wkhtmltopdf".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub wal_autocheckpoint: u32,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            wal_autocheckpoint: 1000,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub tick_ms: u64,
    pub loading_delay_ms: u64,
    pub toast_secs: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            loading_delay_ms: 300,
            toast_secs: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_run_writes_defaults_and_resolves_paths() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        let loader = ConfigLoader::with_paths(paths.clone());

        let cfg = loader.load_or_init()?;
        assert!(paths.config_file.exists());
        assert_eq!(cfg.storage.database_path, paths.database_path);
        assert_eq!(cfg.export.output_dir, paths.export_dir);
        assert_eq!(cfg.auto_save.debounce_ms, 300);
        assert_eq!(cfg.auto_save.interval_secs, 10);
        assert_eq!(cfg.cover.max_image_bytes, 5 * 1024 * 1024);

        let reloaded = loader.load()?;
        assert_eq!(reloaded.editor.default_font, DEFAULT_FONT);
        Ok(())
    }

    #[test]
    fn unknown_font_and_colors_fall_back_to_defaults() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "[editor]\ndefault_font = \"Comic Sans\"\npen_color = \"#123456\"\n\n[auto_save]\ndebounce_ms = 50\n",
        )?;

        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.editor.default_font, DEFAULT_FONT);
        assert_eq!(cfg.editor.pen_color, DEFAULT_PEN_COLOR);
        assert_eq!(cfg.editor.default_page_color, DEFAULT_PAGE_COLOR);
        assert_eq!(cfg.auto_save.debounce_ms, 50);
        assert_eq!(cfg.auto_save.interval_secs, 10);
        Ok(())
    }
}
