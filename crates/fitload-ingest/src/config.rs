//! Run configuration
//!
//! Settings come from one keyed JSON file (`settings.json` by default): a
//! map of profile name to profile object, selected by the required `-c`
//! CLI flag. The loaded profile is an immutable run-wide snapshot, cloned
//! by value into every worker task.

use fitload_common::{FitError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Which projection is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Persist the flat record
    Db,
    /// Persist the full tree
    Full,
}

/// One configuration profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Source directory scanned for input files
    pub directory: String,

    /// Destination for per-record debug dumps
    pub dump_directory: String,

    /// File extension filter, e.g. `.fit`
    #[serde(rename = "fileType")]
    pub file_type: String,

    /// Clear the target collection before the run
    #[serde(rename = "reloadDB", deserialize_with = "flexible_bool")]
    pub reload_db: bool,

    /// Enable per-record diagnostic dumps and console trace
    #[serde(deserialize_with = "flexible_bool")]
    pub debug: bool,

    /// Which projection is persisted
    pub db_insert: OutputMode,

    /// Reserved throttling control; applies to a non-parallel code path
    #[serde(default)]
    pub document_skip: Option<u64>,

    /// Reserved throttling control; applies to a non-parallel code path
    #[serde(default)]
    pub document_limit: Option<u64>,

    /// Destination collection name
    pub collection_name: String,

    /// Sink connection string
    pub mongo_connection_string: String,

    /// Explicit allow-list of file names, overriding the directory scan
    #[serde(default)]
    pub activity_ids: Option<Vec<String>>,

    /// Worker pool width
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Time budget per file, in seconds
    #[serde(default = "default_file_timeout_secs")]
    pub file_timeout_secs: u64,
}

fn default_workers() -> usize {
    32
}

fn default_file_timeout_secs() -> u64 {
    300
}

/// Accept JSON booleans as well as the legacy `"True"` / `"False"` strings
/// found in existing settings files.
fn flexible_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Text(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Text(s) => match s.to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean or \"True\"/\"False\", got {:?}",
                other
            ))),
        },
    }
}

/// Load one named profile from a keyed settings file
pub fn load_settings(path: impl AsRef<Path>, profile: &str) -> Result<Settings> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        FitError::config(format!("cannot read settings file '{}': {}", path.display(), e))
    })?;

    let profiles: HashMap<String, serde_json::Value> = serde_json::from_str(&contents)
        .map_err(|e| FitError::config(format!("settings file is not valid JSON: {}", e)))?;

    let selected = profiles
        .get(profile)
        .ok_or_else(|| FitError::config(format!("profile '{}' not found", profile)))?;

    serde_json::from_value(selected.clone())
        .map_err(|e| FitError::config(format!("profile '{}' is invalid: {}", profile, e)))
}
