//! Run configuration.
//!
//! Every option can come from three places. Per key, the first one that sets
//! it wins:
//!
//! 1. the command line,
//! 2. the `[arguments]` table of the config file (`photo-trail.toml` in the
//!    working directory unless `--config` names another),
//! 3. the stock defaults below.
//!
//! The layers are merged as TOML values with [`merge_toml`] and the result is
//! deserialized into [`Config`]. A missing config file is not an error.
//!
//! ## Config File
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [arguments]
//! dirs = ["."]          # Directories searched for JPEG and GPX files
//! gpx = []              # Extra GPX files to merge
//! # output = "trip.kml" # Output file (stdout when unset)
//! # url = "http://host/photos/" # Base URL for photo links in captions
//! timezone = "+0000"    # Camera clock offset from UTC, (+|-)HHMM
//! progress = "normal"   # none | normal | debug
//! title = "JPEG GPS Position track"
//! update = false        # Merge into an existing output file
//! replace = false       # In update mode, replace same-named placemarks
//! # format = "gpx.fmt"  # exiftool print format for `gpx`
//! ```
//!
//! Unknown keys are rejected to catch typos early. Paths may start with `~`.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "photo-trail.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("{0} already exists (use --update to merge into it)")]
    DestinationExists(PathBuf),
    #[error("invalid timezone {0:?}, expected (+|-)HHMM such as -0800")]
    BadTimezone(String),
}

/// Log detail requested with `--progress`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Progress {
    None,
    #[default]
    Normal,
    Debug,
}

impl Progress {
    /// The `tracing` filter used when `RUST_LOG` is unset.
    pub fn filter_directive(self) -> &'static str {
        match self {
            Progress::None => "warn",
            Progress::Normal => "info",
            Progress::Debug => "debug",
        }
    }
}

/// The whole config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub arguments: Arguments,
}

/// Options shared by the config file and the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Arguments {
    pub dirs: Vec<String>,
    pub gpx: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub timezone: String,
    pub progress: Progress,
    pub title: String,
    pub update: bool,
    pub replace: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            dirs: vec![".".to_string()],
            gpx: Vec::new(),
            output: None,
            url: None,
            timezone: "+0000".to_string(),
            progress: Progress::Normal,
            title: "JPEG GPS Position track".to_string(),
            update: false,
            replace: false,
            format: None,
        }
    }
}

/// Options given on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dirs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gpx: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Overrides {
    /// This layer as a `[arguments]` table.
    pub fn to_value(&self) -> Result<toml::Value, ConfigError> {
        let mut table = toml::Table::new();
        table.insert("arguments".to_string(), toml::Value::try_from(self)?);
        Ok(toml::Value::Table(table))
    }
}

/// Fully resolved options with paths expanded and the timezone parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub dirs: Vec<PathBuf>,
    pub gpx: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub url: Option<String>,
    pub timezone: FixedOffset,
    pub progress: Progress,
    pub title: String,
    pub update: bool,
    pub replace: bool,
    pub format: Option<PathBuf>,
}

impl Arguments {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dirs.is_empty() {
            return Err(ConfigError::Validation(
                "at least one source directory is required".into(),
            ));
        }
        if self.update && self.output.is_none() {
            return Err(ConfigError::Validation(
                "update mode needs an output file".into(),
            ));
        }
        if self.replace && !self.update {
            return Err(ConfigError::Validation(
                "replace only applies in update mode".into(),
            ));
        }
        parse_timezone(&self.timezone)?;
        Ok(())
    }

    /// Expand paths, parse the timezone and check that every source directory
    /// exists.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let dirs: Vec<PathBuf> = self.dirs.iter().map(|d| expand_path(d)).collect();
        if let Some(missing) = dirs.iter().find(|d| !d.is_dir()) {
            return Err(ConfigError::NotADirectory(missing.clone()));
        }
        Ok(Settings {
            dirs,
            gpx: self.gpx.iter().map(|g| expand_path(g)).collect(),
            output: self.output.as_deref().map(expand_path),
            url: self.url.clone(),
            timezone: parse_timezone(&self.timezone)?,
            progress: self.progress,
            title: self.title.clone(),
            update: self.update,
            replace: self.replace,
            format: self.format.as_deref().map(expand_path),
        })
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, arrays included.
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

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge the layers in order, then deserialize and validate.
pub fn resolve_config(layers: impl IntoIterator<Item = toml::Value>) -> Result<Config, ConfigError> {
    let merged = layers.into_iter().fold(stock_defaults_value(), merge_toml);
    let config: Config = merged.try_into()?;
    config.arguments.validate()?;
    Ok(config)
}

/// The config file to read: `--config` if given, else [`DEFAULT_CONFIG_FILE`].
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => expand_path(&path.to_string_lossy()),
        None => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

/// Resolve the run's arguments from the config file at `path` (if it exists)
/// and the command line.
pub fn load_config(path: &Path, overrides: &Overrides) -> Result<Config, ConfigError> {
    let file = load_raw_config(path)?;
    debug!(config = %path.display(), found = file.is_some(), "config file");
    resolve_config(file.into_iter().chain([overrides.to_value()?]))
}

/// Parse `(+|-)HHMM` into a fixed offset east of UTC.
pub fn parse_timezone(raw: &str) -> Result<FixedOffset, ConfigError> {
    let bad = || ConfigError::BadTimezone(raw.to_string());
    let trimmed = raw.trim();
    let (sign, digits) = match trimmed.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => return Err(bad()),
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| bad())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| bad())?;
    if hours > 23 || minutes > 59 {
        return Err(bad());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(bad)
}

/// Expand a leading `~` to the home directory.
pub fn expand_path(raw: &str) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match (raw, home) {
        ("~", Some(home)) => home,
        (_, Some(home)) if raw.starts_with("~/") => home.join(&raw[2..]),
        _ => PathBuf::from(raw),
    }
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# photo-trail configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Command-line options override the values in this file, one key at a time.
# Unknown keys will cause an error.

[arguments]
# Directories searched recursively for JPEG photos and GPX logs.
dirs = ["."]

# Extra GPX files to merge into the document.
gpx = []

# Output file. When unset the document is written to stdout.
# output = "trip.kml"

# Base URL for photo links in captions. The photo's path relative to its
# source directory is appended. When unset, captions link to file:// URLs.
# url = "http://host.example/photos/"

# Offset of the camera clock from UTC, (+|-)HHMM. PST is -0800.
timezone = "+0000"

# Progress detail: "none", "normal" or "debug".
progress = "normal"

# Document title.
title = "JPEG GPS Position track"

# Merge into an existing output file instead of refusing to overwrite it.
update = false

# In update mode, replace placemarks that already exist instead of skipping.
replace = false

# exiftool print format used by `gpx`. A built-in GPX template is used when
# unset.
# format = "gpx.fmt"
"##
}
