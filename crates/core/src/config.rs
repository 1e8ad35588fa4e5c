use crate::date_format::DEFAULT_DATE_FORMAT;
use crate::error::EngineError;
use crate::executor::FailurePolicy;
use crate::planner::PlanOptions;
use crate::transform::{NamingPolicy, DEFAULT_PLACEHOLDER, DEFAULT_RESERVED_SUFFIX};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Defaults for the CLI. Every field can be overridden per invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub bad_chars: String,
    pub replacement: String,
    pub collapse_whitespace: bool,
    pub reserved_suffix: String,
    pub placeholder: String,
    pub sequential_prefix: String,
    pub sequential_padding: usize,
    pub date_format: String,
    pub recursive: bool,
    pub include_files: bool,
    pub include_directories: bool,
    pub include_hidden: bool,
    pub extensions: Vec<String>,
    pub continue_on_error: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bad_chars: "\"#%*:<>?/|".to_string(),
            replacement: String::new(),
            collapse_whitespace: true,
            reserved_suffix: DEFAULT_RESERVED_SUFFIX.to_string(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            sequential_prefix: "item".to_string(),
            sequential_padding: 0,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            recursive: false,
            include_files: true,
            include_directories: false,
            include_hidden: false,
            extensions: Vec::new(),
            continue_on_error: false,
        }
    }
}

impl AppConfig {
    pub fn naming(&self) -> NamingPolicy {
        NamingPolicy {
            reserved_suffix: self.reserved_suffix.clone(),
            placeholder: self.placeholder.clone(),
        }
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            recursive: self.recursive,
            include_files: self.include_files,
            include_directories: self.include_directories,
            include_hidden: self.include_hidden,
            extensions: self.extensions.clone(),
            naming: self.naming(),
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.continue_on_error {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Abort
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
    pub journal_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "skillerious", "clean-names")
        .context("cannot determine the per-user config directory")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        journal_path: config_dir.join("last_batch.json"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&app_paths()?.config_path)
}

/// Missing file means defaults; missing keys fall back individually.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read config file: {}", path.display()))?;

    let config = toml::from_str::<AppConfig>(&raw)
        .with_context(|| format!("cannot parse config file: {}", path.display()))?;
    config
        .naming()
        .validate()
        .map_err(EngineError::Validation)?;
    Ok(config)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(config, &app_paths()?.config_path)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create config folder: {}", dir.display()))?;
    }
    let body = toml::to_string_pretty(config).context("cannot serialize config")?;
    fs::write(path, body)
        .with_context(|| format!("cannot write config file: {}", path.display()))?;
    Ok(())
}
