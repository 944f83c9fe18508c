//! Application configuration for PharmAI.
//!
//! User config lives at `~/.pharmai/pharmai.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PharmaiError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pharmai.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pharmai";

// ---------------------------------------------------------------------------
// Config structs (matching pharmai.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Batch extraction settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Retrieval context settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Directory where JSON artifacts are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// File name of the collection written for directory inputs.
    #[serde(default = "default_collection_file_name")]
    pub collection_file_name: String,

    /// Maximum number of documents to process from a directory (0 = all).
    #[serde(default)]
    pub limit: usize,

    /// Documents extracted concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Log a progress line every this many documents.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            collection_file_name: default_collection_file_name(),
            limit: 0,
            concurrency: default_concurrency(),
            progress_interval: default_progress_interval(),
        }
    }
}

fn default_output_dir() -> String {
    "data/outputs/wrangler".into()
}
fn default_collection_file_name() -> String {
    "medicamentos.json".into()
}
fn default_concurrency() -> usize {
    4
}
fn default_progress_interval() -> usize {
    100
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum fragments rendered into one context block.
    #[serde(default = "default_max_fragments")]
    pub max_fragments: usize,

    /// Maximum characters of fragment text before truncation.
    #[serde(default = "default_max_fragment_chars")]
    pub max_fragment_chars: usize,

    /// Neighbours requested from the vector search.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_fragments: default_max_fragments(),
            max_fragment_chars: default_max_fragment_chars(),
            top_k: default_top_k(),
        }
    }
}

fn default_max_fragments() -> usize {
    5
}
fn default_max_fragment_chars() -> usize {
    1000
}
fn default_top_k() -> usize {
    5
}

// ---------------------------------------------------------------------------
// Batch defaults (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime batch settings, merged from the config file and CLI flags.
#[derive(Debug, Clone)]
pub struct BatchDefaults {
    /// Output directory for artifacts.
    pub output_dir: PathBuf,
    /// Collection file name for directory inputs.
    pub collection_file_name: String,
    /// Document cap for directory inputs (0 = all).
    pub limit: usize,
    /// Concurrent extraction workers.
    pub concurrency: usize,
    /// Progress logging interval.
    pub progress_interval: usize,
}

impl From<&AppConfig> for BatchDefaults {
    fn from(config: &AppConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.extraction.output_dir),
            collection_file_name: config.extraction.collection_file_name.clone(),
            limit: config.extraction.limit,
            concurrency: config.extraction.concurrency,
            progress_interval: config.extraction.progress_interval,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pharmai/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PharmaiError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pharmai/pharmai.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| PharmaiError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        PharmaiError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    if config.extraction.collection_file_name.trim().is_empty() {
        return Err(PharmaiError::config(
            "extraction.collection_file_name must not be empty",
        ));
    }

    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PharmaiError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PharmaiError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PharmaiError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
