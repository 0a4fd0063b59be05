use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

const CONFIG_FILE_NAME: &str = "config.toml";
const STATE_FILE_NAME: &str = "state.json";
const APP_NAME: &str = "pairbook";

pub const DEFAULT_BASE_URL: &str = "https://people.googleapis.com/v1";
pub const DEFAULT_CONTACTS_WEB_URL: &str = "https://contacts.google.com";
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    /// JSON file backing the key-value store (tokens, selections, toggle).
    pub state_file: PathBuf,
    pub api: ApiConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// People API root, without trailing slash.
    pub base_url: String,
    /// Contacts web UI used for the links printed by `status` and `show`.
    pub contacts_web_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            contacts_web_url: DEFAULT_CONTACTS_WEB_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

// =============================================================================
// Config file structure
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    state_file: Option<PathBuf>,
    api: ApiFile,
    log: LogFile,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ApiFile {
    base_url: String,
    contacts_web_url: String,
}

impl Default for ApiFile {
    fn default() -> Self {
        let defaults = ApiConfig::default();
        Self {
            base_url: defaults.base_url,
            contacts_web_url: defaults.contacts_web_url,
        }
    }
}

impl From<ApiFile> for ApiConfig {
    fn from(file: ApiFile) -> Self {
        let base_url = file.base_url.trim().trim_end_matches('/');
        let contacts_web_url = file.contacts_web_url.trim().trim_end_matches('/');
        Self {
            base_url: if base_url.is_empty() {
                DEFAULT_BASE_URL.to_string()
            } else {
                base_url.to_string()
            },
            contacts_web_url: if contacts_web_url.is_empty() {
                DEFAULT_CONTACTS_WEB_URL.to_string()
            } else {
                contacts_web_url.to_string()
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct LogFile {
    filter: String,
}

impl Default for LogFile {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

fn default_state_file() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.data_dir().join(APP_NAME).join(STATE_FILE_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Load from `explicit` or the default location. A missing file yields
/// the defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => config_path()?,
    };

    let cfg_file = if path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read configuration file at {}", path.display()))?;
        parse(&raw).with_context(|| format!("invalid configuration in {}", path.display()))?
    } else {
        ConfigFile::default()
    };

    let state_file = match cfg_file.state_file {
        Some(ref state_file) => expand_tilde(state_file),
        None => default_state_file()?,
    };

    Ok(Config {
        config_path: path,
        state_file,
        api: cfg_file.api.into(),
        log: LogConfig {
            filter: cfg_file.log.filter,
        },
    })
}

fn parse(raw: &str) -> Result<ConfigFile> {
    let value: toml::Value = toml::from_str(raw).context("failed to parse as TOML")?;
    warn_unknown_keys(&value);
    value
        .try_into()
        .context("failed to deserialize configuration")
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn unknown_keys(value: &toml::Value, known: &[&str]) -> Vec<String> {
    let Some(table) = value.as_table() else {
        return Vec::new();
    };
    let known: HashSet<&str> = known.iter().copied().collect();
    table
        .keys()
        .filter(|key| !known.contains(key.as_str()))
        .cloned()
        .collect()
}

fn warn_unknown_keys(value: &toml::Value) {
    for key in unknown_keys(value, &["state_file", "api", "log"]) {
        eprintln!("warning: unknown configuration key `{}`", key);
    }

    let Some(table) = value.as_table() else {
        return;
    };
    if let Some(api) = table.get("api") {
        for key in unknown_keys(api, &["base_url", "contacts_web_url"]) {
            eprintln!("warning: unknown api entry `{}`", key);
        }
    }
    if let Some(log) = table.get("log") {
        for key in unknown_keys(log, &["filter"]) {
            eprintln!("warning: unknown log entry `{}`", key);
        }
    }
}
