use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigLoader;
use crate::notebook::NotebookRepository;
use crate::storage;

pub mod commands;

use self::commands::{CopyArgs, DeleteArgs, ExportArgs, NewArgs, ShowArgs, TuiArgs};

const LOG_FILE: &str = "papernotes.log";

#[derive(Parser, Debug)]
#[command(
    name = "papernotes",
    version,
    about = "Paper-style notebooks in your terminal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over PAPERNOTES_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over PAPERNOTES_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive notebook UI (default)
    Tui(TuiArgs),
    /// Create a notebook
    New(NewArgs),
    /// List notebooks in creation order
    List,
    /// Print a notebook's pages as plain text
    Show(ShowArgs),
    /// Delete a notebook
    Delete(DeleteArgs),
    /// Export a notebook to PDF or DOCX
    Export(ExportArgs),
    /// Copy one page to the system clipboard
    Copy(CopyArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("PAPERNOTES_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("PAPERNOTES_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui(TuiArgs::default()));
    let log_target = match command {
        Commands::Tui(_) => LogTarget::File(&paths.log_dir),
        _ => LogTarget::Stderr,
    };
    init_tracing(&cli.log_level, log_target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let storage = storage::init(&paths, &config.storage)?;

    let config = Arc::new(config);
    let open_repo = || NotebookRepository::load(storage.clone(), &config.editor.default_font);
    match command {
        Commands::Tui(args) => commands::run_tui(config.clone(), storage.clone(), args),
        Commands::New(args) => {
            let id = commands::new_notebook(&config, &mut open_repo()?, args)?;
            println!("Created notebook {id}");
            Ok(())
        }
        Commands::List => {
            print!("{}", commands::format_list(&open_repo()?));
            Ok(())
        }
        Commands::Show(args) => {
            print!("{}", commands::render_show(&open_repo()?, &args)?);
            Ok(())
        }
        Commands::Delete(args) => commands::delete_notebook(&mut open_repo()?, args),
        Commands::Export(args) => commands::export_notebook(&config, &open_repo()?, args),
        Commands::Copy(args) => commands::copy_page(&open_repo()?, args),
    }
}

enum LogTarget<'a> {
    Stderr,
    /// The TUI owns the terminal, so its logs go to a file.
    File(&'a Path),
}

fn init_tracing(level: &str, target: LogTarget<'_>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match target {
            LogTarget::Stderr => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            LogTarget::File(dir) => {
                fs::create_dir_all(dir)
                    .with_context(|| format!("creating log directory {}", dir.display()))?;
                let path = dir.join(LOG_FILE);
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
        }
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}
