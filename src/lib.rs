pub mod app;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod editor;
pub mod export;
pub mod journaling;
pub mod notebook;
pub mod richtext;
pub mod storage;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
