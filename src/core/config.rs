//! Runtime configuration for scaffold runs.
//!
//! The configuration directory holds the catalog database and every template
//! source. It is resolved once at startup and passed down explicitly; nothing
//! below the CLI reads the environment.
//!
//! Resolution order for the directory: `--config-dir`, `MKPROJ_CONFIG_DIR`,
//! `$XDG_CONFIG_HOME/mkproj`, `$HOME/.config/mkproj`. An optional
//! `config.toml` inside it can move the catalog, change timeouts and turn on
//! cleanup-on-failure. `MKPROJ_CATALOG` overrides the catalog path last.

use crate::core::error::ScaffoldError;
use crate::core::schemas;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_DIR_ENV: &str = "MKPROJ_CONFIG_DIR";
pub const CATALOG_ENV: &str = "MKPROJ_CATALOG";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const AUDIT_LOG_NAME: &str = "scaffold.events.jsonl";

const APP_DIR_NAME: &str = "mkproj";
const DEFAULT_CREATE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_COPY_TIMEOUT_SECS: u64 = 30;

/// Per-operation time limits. Directory creation and touch share one limit;
/// template copies get a longer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub copy: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(DEFAULT_CREATE_TIMEOUT_SECS),
            copy: Duration::from_secs(DEFAULT_COPY_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScaffoldConfig {
    /// Base directory for the catalog and template sources.
    pub config_dir: PathBuf,
    pub catalog_path: PathBuf,
    pub timeouts: Timeouts,
    /// Remove the project root again when a run fails after creating it.
    pub cleanup_on_failure: bool,
}

impl ScaffoldConfig {
    /// Defaults rooted at `config_dir`, without reading any file.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        Self {
            catalog_path: config_dir.join(schemas::CATALOG_DB_REL_PATH),
            config_dir,
            timeouts: Timeouts::default(),
            cleanup_on_failure: false,
        }
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.config_dir.join(AUDIT_LOG_NAME)
    }

    /// Load `config.toml` from `config_dir` (if present) and apply
    /// environment overrides.
    pub fn load(config_dir: &Path) -> Result<Self, ScaffoldError> {
        Self::load_with_env(config_dir, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(config_dir: &Path, env: F) -> Result<Self, ScaffoldError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(config_dir);

        let file_path = config_dir.join(CONFIG_FILE_NAME);
        if file_path.exists() {
            let content = fs::read_to_string(&file_path).map_err(ScaffoldError::IoError)?;
            let file: ConfigFile = toml::from_str(&content).map_err(|e| {
                ScaffoldError::ConfigError(format!("{}: {}", file_path.display(), e))
            })?;
            config.apply_file(file)?;
        }

        if let Some(catalog) = env(CATALOG_ENV).filter(|v| !v.is_empty()) {
            config.catalog_path = config.resolve_relative(&catalog);
        }

        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) -> Result<(), ScaffoldError> {
        if let Some(path) = file.catalog.path {
            self.catalog_path = self.resolve_relative(&path);
        }
        if let Some(secs) = file.timeouts.create_secs {
            self.timeouts.create = positive_secs("timeouts.create_secs", secs)?;
        }
        if let Some(secs) = file.timeouts.copy_secs {
            self.timeouts.copy = positive_secs("timeouts.copy_secs", secs)?;
        }
        if let Some(cleanup) = file.scaffold.cleanup_on_failure {
            self.cleanup_on_failure = cleanup;
        }
        Ok(())
    }

    fn resolve_relative(&self, raw: &str) -> PathBuf {
        let path = PathBuf::from(raw);
        if path.is_absolute() {
            path
        } else {
            self.config_dir.join(path)
        }
    }
}

fn positive_secs(key: &str, secs: u64) -> Result<Duration, ScaffoldError> {
    if secs == 0 {
        return Err(ScaffoldError::ConfigError(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(Duration::from_secs(secs))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    catalog: CatalogSection,
    #[serde(default)]
    timeouts: TimeoutsSection,
    #[serde(default)]
    scaffold: ScaffoldSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogSection {
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimeoutsSection {
    create_secs: Option<u64>,
    copy_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScaffoldSection {
    cleanup_on_failure: Option<bool>,
}

/// Resolve the configuration directory, honoring an explicit override first.
pub fn resolve_config_dir(explicit: Option<PathBuf>) -> Result<PathBuf, ScaffoldError> {
    resolve_config_dir_with_env(explicit, |key| std::env::var(key).ok())
}

pub fn resolve_config_dir_with_env<F>(
    explicit: Option<PathBuf>,
    env: F,
) -> Result<PathBuf, ScaffoldError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    let non_empty = |key: &str| env(key).filter(|v| !v.is_empty());

    if let Some(dir) = non_empty(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join(APP_DIR_NAME));
    }
    if let Some(home) = non_empty("HOME") {
        return Ok(PathBuf::from(home).join(".config").join(APP_DIR_NAME));
    }
    Err(ScaffoldError::ConfigError(format!(
        "cannot locate configuration directory: set {CONFIG_DIR_ENV} or HOME, or pass --config-dir"
    )))
}
