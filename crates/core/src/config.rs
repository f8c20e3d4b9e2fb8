use crate::planner::DEFAULT_SEPARATOR;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub include_dir_prefix: bool,
    pub dir_prefix_separator: String,
    pub move_files: bool,
    pub ignore_errors: bool,
    pub quiet: bool,
    pub recursive: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            include_dir_prefix: false,
            dir_prefix_separator: DEFAULT_SEPARATOR.to_string(),
            move_files: false,
            ignore_errors: false,
            quiet: false,
            recursive: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("org", "photo-organizer", "photo-organizer")
        .context("cannot determine the OS configuration directory")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    load_config_from(&paths.config_path)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read config file: {}", path.display()))?;
    let config = toml::from_str::<AppConfig>(&raw)
        .with_context(|| format!("cannot parse config file: {}", path.display()))?;
    Ok(config)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    let paths = app_paths()?;
    save_config_to(config, &paths.config_path)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create config directory: {}", dir.display()))?;
    }
    let body = toml::to_string_pretty(config).context("cannot serialize config")?;
    fs::write(path, body)
        .with_context(|| format!("cannot write config file: {}", path.display()))?;
    Ok(())
}
