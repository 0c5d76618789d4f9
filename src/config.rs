//! User configuration, stored as YAML.
//!
//! The file lives at `$RAGDOLL_CONFIG` or `~/.ragdoll/config.yml`. A missing
//! file means defaults; nothing is written until `config init` or
//! `config set` asks for it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::{
    chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE},
    error::{Error, Result},
};

pub const CONFIG_ENV: &str = "RAGDOLL_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub processing: ProcessingConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where documents and the full-text index are kept. Unset means the
    /// XDG data directory.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Keywords extracted automatically when a document is added.
    pub max_keywords: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            max_keywords: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub similarity_threshold: f64,
    pub max_results: usize,
    pub semantic_weight: f64,
    pub text_weight: f64,
    pub track_searches: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.25,
            max_results: 10,
            semantic_weight: 0.7,
            text_weight: 0.3,
            track_searches: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log filter when neither `RAGDOLL_LOG` nor `-v`/`-q` is given.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Resolve the config file location.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".ragdoll").join("config.yml");
    }
    xdg::BaseDirectories::with_prefix("ragdoll")
        .get_config_home()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.yml")
}

impl Config {
    /// Load the file at `path`. A missing file yields defaults; a file that
    /// does not parse is an error, and the caller decides what to do.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => Ok(Self::default()),
            Ok(text) => Ok(serde_yaml::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Write a default config file. Refuses to overwrite unless `force`.
    pub fn init(path: &Path, force: bool) -> Result<Self> {
        if path.exists() && !force {
            return Err(Error::Config(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// Every leaf setting as `(dotted key, value)`, in file order.
    pub fn entries(&self) -> Result<Vec<(String, Value)>> {
        let mut out = Vec::new();
        flatten("", &serde_yaml::to_value(self)?, &mut out);
        Ok(out)
    }

    /// Look up a setting by dotted key, e.g. `search.similarity_threshold`.
    pub fn get(&self, key: &str) -> Result<Value> {
        let root = serde_yaml::to_value(self)?;
        let mut node = &root;
        for part in key.split('.') {
            node = node
                .as_mapping()
                .and_then(|m| m.get(part))
                .ok_or_else(|| unknown_key(key))?;
        }
        Ok(node.clone())
    }

    /// Change a setting by dotted key. The raw string is coerced to a
    /// boolean, integer, float or null where it looks like one.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<()> {
        match self.with_value(key, coerce(raw)) {
            Ok(updated) => *self = updated,
            // A setting that wants text gets the raw string back.
            Err(Error::Config(_)) if !matches!(coerce(raw), Value::String(_)) => {
                *self = self.with_value(key, Value::String(raw.to_string()))?;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn with_value(&self, key: &str, value: Value) -> Result<Self> {
        let mut root = serde_yaml::to_value(self)?;
        let (parents, leaf) = match key.rsplit_once('.') {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, key),
        };

        let mut node = &mut root;
        for part in parents.into_iter().flat_map(|p| p.split('.')) {
            node = node
                .as_mapping_mut()
                .and_then(|m| m.get_mut(part))
                .ok_or_else(|| unknown_key(key))?;
        }
        let mapping: &mut Mapping =
            node.as_mapping_mut().ok_or_else(|| unknown_key(key))?;
        match mapping.get_mut(leaf) {
            Some(slot) if !slot.is_mapping() => *slot = value,
            Some(_) => {
                return Err(Error::Config(format!(
                    "'{key}' is a section; set one of its keys instead"
                )));
            }
            None => return Err(unknown_key(key)),
        }

        serde_yaml::from_value(root).map_err(|e| {
            Error::Config(format!("invalid value for '{key}': {e}"))
        })
    }
}

fn unknown_key(key: &str) -> Error {
    Error::NotFound {
        kind: "config key",
        name: key.to_string(),
    }
}

fn coerce(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" | "~" => return Value::Null,
        _ => {}
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = trimmed.parse::<f64>()
        && f.is_finite()
    {
        return Value::Number(f.into());
    }
    Value::String(raw.to_string())
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, Value)>) {
    match value.as_mapping() {
        Some(mapping) => {
            for (k, v) in mapping {
                let Some(k) = k.as_str() else { continue };
                let key = if prefix.is_empty() {
                    k.to_string()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten(&key, v, out);
            }
        }
        None => out.push((prefix.to_string(), value.clone())),
    }
}

/// Render a setting for display.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "(unset)".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
