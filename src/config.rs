//! Settings and the extra config file.
//!
//! # Data flow
//! ```text
//! actio.toml
//!     → load_settings (read & deserialize, every field defaulted)
//!     → Settings::validate (semantic checks)
//!     → DispatcherBuilder::build
//!         → renderer init
//!         → load_extra_config (optional key/value file for controllers)
//! ```
//!
//! Settings are read once at startup and never change afterwards.

use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Root settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub dispatch: DispatchSettings,
    pub view: ViewSettings,
    /// Optional key/value file exposed to actions through
    /// [`Context::config_value`](crate::Context::config_value).
    pub extra_config: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_owned() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DispatchSettings {
    /// Module prefix joined to the routed controller name before lookup.
    pub controller_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewSettings {
    /// `template` or `string`.
    pub renderer: String,
    pub template_root: PathBuf,
    pub template_extension: String,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            renderer: "template".to_owned(),
            template_root: PathBuf::from("."),
            template_extension: ".html".to_owned(),
        }
    }
}

impl Settings {
    /// Parses and validates settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Semantic checks serde cannot express. Reports every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.server.bind.parse::<SocketAddr>().is_err() {
            errors.push(format!("server.bind `{}` is not a socket address", self.server.bind));
        }
        if self.view.renderer.trim().is_empty() {
            errors.push("view.renderer must not be empty".to_owned());
        }
        let ext = &self.view.template_extension;
        if !ext.is_empty() && !ext.starts_with('.') {
            errors.push(format!("view.template_extension `{ext}` must start with `.`"));
        }
        if let Some(prefix) = &self.dispatch.controller_prefix {
            if prefix.split('.').any(|p| p.trim().is_empty()) && !prefix.trim().is_empty() {
                errors.push(format!("dispatch.controller_prefix `{prefix}` has an empty module"));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(ConfigError::Validation(errors)) }
    }

    /// The configured prefix with surrounding whitespace removed, if any.
    pub fn controller_prefix(&self) -> Option<&str> {
        self.dispatch
            .controller_prefix
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// Loads and validates settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    Settings::from_toml(&read(path)?)
}

// ── Extra config ──────────────────────────────────────────────────────────────

/// Flat string key/value pairs read from a TOML file.
///
/// Nested tables flatten to dotted keys, so
///
/// ```toml
/// site_name = "Shop"
/// [mail]
/// host = "smtp.local"
/// port = 25
/// ```
///
/// yields `site_name`, `mail.host` and `mail.port` (`"25"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraConfig {
    values: HashMap<String, String>,
}

impl ExtraConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(text)?;
        let mut values = HashMap::new();
        flatten("", &table, &mut values);
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
}

/// Loads the extra config file named in [`Settings::extra_config`].
pub fn load_extra_config(path: &Path) -> Result<ExtraConfig, ConfigError> {
    ExtraConfig::from_toml(&read(path)?)
}

fn flatten(prefix: &str, table: &toml::Table, out: &mut HashMap<String, String>) {
    for (key, value) in table {
        let key = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
        match value {
            toml::Value::Table(inner) => flatten(&key, inner, out),
            toml::Value::String(s) => { out.insert(key, s.clone()); }
            other => { out.insert(key, other.to_string()); }
        }
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}
