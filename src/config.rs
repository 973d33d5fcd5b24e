//! Configuration module.
//!
//! Handles loading, validating, and merging `shelfwise.toml`. Stock defaults
//! are the base layer; a user file in the library root (or one passed with
//! `--config`) is merged on top.
//!
//! ## Config File Location
//!
//! ```text
//! library/
//! ├── shelfwise.toml          # Optional, overrides stock defaults
//! ├── some-book.fb2
//! └── ...
//! ```
//!
//! The config file is never treated as a book during enumeration.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [layout]
//! organized_dir = "organized_books"     # Copies land here
//! not_organized_dir = "not_organized"   # Unsupported files are moved here
//! max_unique_attempts = 1000            # "x (1)" … "x (N)" before giving up
//!
//! [names]
//! # assets_dir = "/path/to/names"       # Default: <data dir>/shelfwise
//! embedding_threshold = 0.65            # Cosine similarity, strictly above
//! fuzzy_threshold = 70                  # Fuzzy ratio 0-100, at or above
//!
//! [embedding]
//! command = []                          # argv of an embedding program
//! # dimension = 384                     # Expected vector length
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse, override just the values you want:
//!
//! ```toml
//! [embedding]
//! command = ["python3", "embed.py"]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::normalizer::{DEFAULT_EMBEDDING_THRESHOLD, DEFAULT_FUZZY_THRESHOLD, Thresholds};
use crate::paths::DEFAULT_MAX_ATTEMPTS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the library root.
pub const CONFIG_FILE: &str = "shelfwise.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `shelfwise.toml`.
///
/// All fields have defaults; unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Output directory names and collision handling.
    pub layout: LayoutConfig,
    /// Known-names storage and matching thresholds.
    pub names: NamesConfig,
    /// External embedding provider.
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Directory under the root receiving organized copies.
    pub organized_dir: String,
    /// Directory under the root receiving unsupported files.
    pub not_organized_dir: String,
    /// Numbered candidates tried before a destination counts as exhausted.
    pub max_unique_attempts: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            organized_dir: "organized_books".to_string(),
            not_organized_dir: "not_organized".to_string(),
            max_unique_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamesConfig {
    /// Where `authors.json` and `series.json` live. `None` means the
    /// platform data directory.
    pub assets_dir: Option<PathBuf>,
    pub embedding_threshold: f32,
    pub fuzzy_threshold: u32,
}

impl Default for NamesConfig {
    fn default() -> Self {
        Self {
            assets_dir: None,
            embedding_threshold: DEFAULT_EMBEDDING_THRESHOLD,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

impl NamesConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            embedding: self.embedding_threshold,
            fuzzy: self.fuzzy_threshold,
        }
    }

    /// Configured assets directory, or the platform default.
    pub fn effective_assets_dir(&self) -> PathBuf {
        self.assets_dir.clone().unwrap_or_else(default_assets_dir)
    }
}

/// `<data dir>/shelfwise`, falling back to `./.shelfwise` on platforms
/// without a data directory.
pub fn default_assets_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("shelfwise"))
        .unwrap_or_else(|| PathBuf::from(".shelfwise"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Program and arguments. Empty disables embeddings.
    pub command: Vec<String>,
    /// Reject vectors of any other length.
    pub dimension: Option<usize>,
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        !self.command.is_empty()
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let layout = &self.layout;
        validate_dir_name("layout.organized_dir", &layout.organized_dir)?;
        validate_dir_name("layout.not_organized_dir", &layout.not_organized_dir)?;
        if layout.organized_dir == layout.not_organized_dir {
            return Err(ConfigError::Validation(
                "layout.organized_dir and layout.not_organized_dir must differ".into(),
            ));
        }
        if layout.max_unique_attempts == 0 {
            return Err(ConfigError::Validation(
                "layout.max_unique_attempts must be at least 1".into(),
            ));
        }

        let t = self.names.embedding_threshold;
        if !(-1.0..=1.0).contains(&t) {
            return Err(ConfigError::Validation(
                "names.embedding_threshold must be between -1.0 and 1.0".into(),
            ));
        }
        if self.names.fuzzy_threshold > 100 {
            return Err(ConfigError::Validation(
                "names.fuzzy_threshold must be 0-100".into(),
            ));
        }

        if self
            .embedding
            .command
            .first()
            .is_some_and(|program| program.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "embedding.command must start with a program name".into(),
            ));
        }
        if self.embedding.dimension == Some(0) {
            return Err(ConfigError::Validation(
                "embedding.dimension must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

fn validate_dir_name(key: &str, name: &str) -> Result<(), ConfigError> {
    let name = name.trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(ConfigError::Validation(format!("{key} must be a directory name")));
    }
    if name.contains(['/', '\\']) {
        return Err(ConfigError::Validation(format!(
            "{key} must not contain path separators"
        )));
    }
    Ok(())
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// The base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `shelfwise.toml` from the library root, falling back to defaults
/// when it does not exist.
pub fn load_config(root: &Path) -> Result<Config, ConfigError> {
    resolve_config(stock_defaults_value()?, load_raw_config(&root.join(CONFIG_FILE))?)
}

/// Load an explicitly named config file, which must exist.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let overlay: toml::Value = toml::from_str(&content)?;
    resolve_config(stock_defaults_value()?, Some(overlay))
}

/// Returns a fully-commented stock `shelfwise.toml` with all keys.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Shelfwise Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as shelfwise.toml in the folder you organize, or pass it
# with --config. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output layout
# ---------------------------------------------------------------------------
[layout]
# Organized copies go to <root>/<organized_dir>/<Author>/<Series>/.
organized_dir = "organized_books"

# Files no extractor supports are moved to <root>/<not_organized_dir>/,
# keeping their relative path.
not_organized_dir = "not_organized"

# When a destination exists, "Title (1)", "Title (2)", ... are tried up to
# this many times before the file is skipped.
max_unique_attempts = 1000

# ---------------------------------------------------------------------------
# Name canonicalization
# ---------------------------------------------------------------------------
[names]
# Directory holding authors.json and series.json.
# Omit to use the platform data directory (e.g. ~/.local/share/shelfwise).
# assets_dir = "/path/to/shelfwise-names"

# A known name is reused when its embedding cosine similarity with the new
# spelling is strictly above this value (-1.0 to 1.0).
embedding_threshold = 0.65

# Otherwise a known name is reused when the fuzzy ratio is at least this
# value (0-100).
fuzzy_threshold = 70

# ---------------------------------------------------------------------------
# Embedding provider
# ---------------------------------------------------------------------------
[embedding]
# Program and arguments. The name is written to its stdin; it must print a
# JSON array of floats. Leave empty to use fuzzy matching only.
command = []

# Expected vector length. Omit to accept any non-empty vector.
# dimension = 384
"##
}
