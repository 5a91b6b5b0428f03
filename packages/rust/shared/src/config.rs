//! Application configuration for splitmerge.
//!
//! User config lives at `~/.splitmerge/splitmerge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SplitMergeError};
use crate::types::SplitLayout;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "splitmerge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".splitmerge";

/// Column whose value `"0"` excludes a row when filtering is enabled.
pub const DEFAULT_FILTER_COLUMN: &str = "In Use";

// ---------------------------------------------------------------------------
// Config structs (matching splitmerge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Merge defaults.
    #[serde(default)]
    pub merge: MergeSettings,

    /// Dataset hub settings.
    #[serde(default)]
    pub hub: HubSettings,
}

impl AppConfig {
    /// Directory `publish` reads when no directory is given: the merge output
    /// for the combined layout, `[hub].raw_dir` for the raw layout.
    pub fn publish_dir(&self) -> &str {
        match self.hub.layout {
            SplitLayout::Combined => &self.merge.output_dir,
            SplitLayout::Raw => &self.hub.raw_dir,
        }
    }
}

/// `[merge]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSettings {
    /// Directory containing one subdirectory per domain.
    #[serde(default = "default_input_dir")]
    pub input_dir: String,

    /// Directory the merged split files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Drop flagged rows from train/validation.
    #[serde(default = "default_true")]
    pub filter_in_use: bool,

    /// Name of the flag column.
    #[serde(default = "default_filter_column")]
    pub filter_column: String,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            filter_in_use: true,
            filter_column: default_filter_column(),
        }
    }
}

fn default_input_dir() -> String {
    "data/subtaskB".into()
}
fn default_output_dir() -> String {
    "data/subtaskB_combined".into()
}
fn default_true() -> bool {
    true
}
fn default_filter_column() -> String {
    DEFAULT_FILTER_COLUMN.into()
}

/// `[hub]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSettings {
    /// Base URL of the dataset hub.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the env var holding the access token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Target dataset repository (`namespace/name`).
    #[serde(default = "default_repo_id")]
    pub repo_id: String,

    /// Create the repository as private.
    #[serde(default)]
    pub private: bool,

    /// Branch to commit to.
    #[serde(default = "default_revision")]
    pub revision: String,

    /// File naming of the directory being published.
    #[serde(default)]
    pub layout: SplitLayout,

    /// Directory published with the raw layout when none is given.
    /// The combined layout publishes `[merge].output_dir`.
    #[serde(default = "default_raw_dir")]
    pub raw_dir: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token_env: default_token_env(),
            repo_id: default_repo_id(),
            private: false,
            revision: default_revision(),
            layout: SplitLayout::default(),
            raw_dir: default_raw_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HubSettings {
    /// Parse the configured endpoint.
    pub fn endpoint_url(&self) -> Result<Url> {
        Url::parse(&self.endpoint).map_err(|e| {
            SplitMergeError::config(format!("invalid hub endpoint '{}': {e}", self.endpoint))
        })
    }
}

fn default_endpoint() -> String {
    "https://huggingface.co".into()
}
fn default_token_env() -> String {
    "HF_TOKEN".into()
}
fn default_repo_id() -> String {
    "yfhe/C-STANCE-B".into()
}
fn default_revision() -> String {
    "main".into()
}
fn default_raw_dir() -> String {
    "data/subtaskA".into()
}
fn default_timeout_secs() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.splitmerge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SplitMergeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.splitmerge/splitmerge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SplitMergeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SplitMergeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SplitMergeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SplitMergeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SplitMergeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the hub access token from the configured env var.
pub fn resolve_hub_token(settings: &HubSettings) -> Result<String> {
    let var_name = &settings.token_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(SplitMergeError::config(format!(
            "hub access token not found. Set the {var_name} environment variable.\n\
             Create a write token at https://huggingface.co/settings/tokens"
        ))),
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
