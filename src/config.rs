//! Run configuration.
//!
//! Settings come from two places: a TOML configuration file (found through the
//! usual search path) and an optional JSON host-settings object that overrides
//! it key by key. Both use the same snake_case keys and are decoded once, here,
//! into the typed [`FilterSpec`], [`RenderSpec`] and [`TagRule`]s the rest of
//! the crate works with.
//!
//! # Configuration File Format
//!
//! ```toml
//! [settings]
//! template = "$studio - $date - $title"
//! path_template = "$up/$studio"
//! filter_studio = "Acme, Beta"
//! filter_organized = "yes"
//! performer_genders = ["FEMALE"]
//!
//! [[settings.rules]]
//! tag = "Favorites"
//! template = "$date - $title"
//!
//! [catalog]
//! per_page = 100
//!
//! [execution]
//! jobs = 4
//! ```

use crate::catalog::DEFAULT_PER_PAGE;
use crate::filter::{FilterSpec, TriState};
use crate::name_set::NameSet;
use crate::scene::Gender;
use crate::template::{DEFAULT_FILENAME_TEMPLATE, RenderSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const LOCAL_CONFIG: &str = ".scene-renamer.toml";

/// Errors that can occur while loading or decoding configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("Invalid value for `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("IO error reading configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A flag or number as hosts actually send it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// A list given either as an array or as one comma-separated string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListValue {
    Many(Vec<String>),
    One(String),
}

impl ListValue {
    pub fn to_name_set(&self) -> NameSet {
        match self {
            ListValue::Many(items) => items.iter().collect(),
            ListValue::One(csv) => NameSet::from_csv(csv),
        }
    }
}

/// A filename template applied to the scenes carrying one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    pub tag: String,
    pub template: String,
}

/// Settings exactly as read, before validation. Every key is optional so
/// layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    pub template: Option<String>,
    pub path_template: Option<String>,
    pub path_is_absolute: Option<FlagValue>,
    pub performer_genders: Option<ListValue>,
    pub max_path_len: Option<FlagValue>,
    pub path_like: Option<String>,
    pub exclude_path_like: Option<String>,
    pub skip_grouped: Option<FlagValue>,
    pub tags: Option<ListValue>,
    pub filter_studio: Option<ListValue>,
    pub filter_groups: Option<ListValue>,
    pub filter_tags: Option<ListValue>,
    pub filter_performer_genders: Option<ListValue>,
    pub filter_organized: Option<FlagValue>,
    pub filter_interactive: Option<FlagValue>,
    pub filter_min_scene_markers: Option<FlagValue>,
    pub rules: Option<Vec<TagRule>>,
}

/// Fully decoded settings for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSettings {
    pub filter: FilterSpec,
    pub render: RenderSpec,
    /// Per-tag templates. When non-empty, each rule is planned as its own pass.
    pub rules: Vec<TagRule>,
}

impl RawSettings {
    /// Decodes a host-settings object. The settings may be given directly or
    /// wrapped as `{"args": {...}}`.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let value = match value {
            serde_json::Value::Object(mut map) if map.get("args").is_some_and(|a| a.is_object()) => {
                map.remove("args").unwrap_or_default()
            }
            other => other,
        };
        serde_json::from_value(value).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Reads a host-settings JSON file.
    pub fn load_json(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        Self::from_json_value(value)
    }

    /// Overlays every key set in `other` onto `self`.
    pub fn merge(&mut self, other: RawSettings) {
        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        overlay!(
            template,
            path_template,
            path_is_absolute,
            performer_genders,
            max_path_len,
            path_like,
            exclude_path_like,
            skip_grouped,
            tags,
            filter_studio,
            filter_groups,
            filter_tags,
            filter_performer_genders,
            filter_organized,
            filter_interactive,
            filter_min_scene_markers,
            rules,
        );
    }

    /// Validates and decodes into typed settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a number that does not parse, an
    /// organized/interactive filter that is not a boolean or `any`, or a blank
    /// filename template when no tag rules are configured.
    pub fn into_run_settings(self) -> Result<RunSettings, ConfigError> {
        let rules = self.rules.unwrap_or_default();

        let filename_template = match self.template {
            Some(t) if t.trim().is_empty() && rules.is_empty() => {
                return Err(ConfigError::InvalidValue {
                    key: "template".to_string(),
                    reason: "filename template is blank".to_string(),
                });
            }
            Some(t) => t,
            None => DEFAULT_FILENAME_TEMPLATE.to_string(),
        };

        let render = RenderSpec {
            filename_template,
            path_template: self.path_template.filter(|t| !t.trim().is_empty()),
            path_is_absolute: flag(self.path_is_absolute.as_ref()),
            token_performer_genders: genders("performer_genders", self.performer_genders.as_ref()),
            max_path_len: count("max_path_len", self.max_path_len.as_ref())?,
        };

        let filter = FilterSpec {
            path_include: self.path_like.filter(|p| !p.trim().is_empty()),
            path_exclude: self.exclude_path_like.filter(|p| !p.trim().is_empty()),
            skip_grouped: flag(self.skip_grouped.as_ref()),
            selection_tags: names(self.tags.as_ref()),
            studio_names: names(self.filter_studio.as_ref()),
            group_names: names(self.filter_groups.as_ref()),
            tag_names: names(self.filter_tags.as_ref()),
            performer_genders: genders(
                "filter_performer_genders",
                self.filter_performer_genders.as_ref(),
            ),
            organized: tri_state("filter_organized", self.filter_organized.as_ref())?,
            interactive: tri_state("filter_interactive", self.filter_interactive.as_ref())?,
            min_marker_count: count(
                "filter_min_scene_markers",
                self.filter_min_scene_markers.as_ref(),
            )?,
        };

        Ok(RunSettings {
            filter,
            render,
            rules,
        })
    }
}

/// True for `true`, non-zero numbers, and `"true"`, `"1"`, `"yes"`, `"on"`.
fn flag(value: Option<&FlagValue>) -> bool {
    match value {
        None => false,
        Some(FlagValue::Bool(b)) => *b,
        Some(FlagValue::Int(n)) => *n != 0,
        Some(FlagValue::Text(s)) => {
            matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
        }
    }
}

/// `"any"` and blank mean "don't care"; text must otherwise read as a boolean.
fn tri_state(key: &str, value: Option<&FlagValue>) -> Result<TriState, ConfigError> {
    let text = match value {
        None => return Ok(TriState::Any),
        Some(FlagValue::Text(s)) => s.trim().to_lowercase(),
        Some(v) => return Ok(TriState::from(flag(Some(v)))),
    };
    match text.as_str() {
        "" | "any" => Ok(TriState::Any),
        "true" | "1" | "yes" | "on" => Ok(TriState::Yes),
        "false" | "0" | "no" | "off" => Ok(TriState::No),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected true, false or any, got `{text}`"),
        }),
    }
}

/// A non-negative count. Zero and blank mean "unset".
fn count(key: &str, value: Option<&FlagValue>) -> Result<Option<usize>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        key: key.to_string(),
        reason,
    };
    let n = match value {
        None => return Ok(None),
        Some(FlagValue::Int(n)) => *n,
        Some(FlagValue::Text(s)) if s.trim().is_empty() => return Ok(None),
        Some(FlagValue::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(format!("`{s}` is not a number")))?,
        Some(FlagValue::Bool(b)) => return Err(invalid(format!("expected a number, got {b}"))),
    };
    match usize::try_from(n) {
        Ok(0) => Ok(None),
        Ok(n) => Ok(Some(n)),
        Err(_) => Err(invalid(format!("{n} is negative"))),
    }
}

fn names(value: Option<&ListValue>) -> NameSet {
    value.map(ListValue::to_name_set).unwrap_or_default()
}

fn genders(key: &str, value: Option<&ListValue>) -> BTreeSet<Gender> {
    let mut set = BTreeSet::new();
    for name in names(value).iter() {
        match Gender::parse(name) {
            Some(gender) => {
                set.insert(gender);
            }
            None => warn!(key, value = %name, "ignoring unknown gender"),
        }
    }
    set
}

/// The `[catalog]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSection {
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

fn default_per_page() -> usize {
    DEFAULT_PER_PAGE
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
        }
    }
}

/// The `[execution]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSection {
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

fn default_jobs() -> usize {
    1
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
        }
    }
}

/// Contents of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenamerConfig {
    #[serde(default)]
    pub settings: RawSettings,
    #[serde(default)]
    pub catalog: CatalogSection,
    #[serde(default)]
    pub execution: ExecutionSection,
}

impl RenamerConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.scene-renamer.toml` in the current directory
    /// 3. Look for `~/.config/scene-renamer/config.toml` in the home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("scene-renamer")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if the file does not exist and
    /// `ConfigError::ConfigInvalid` if TOML parsing fails.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self =
            toml::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Overlays host settings onto the file's `[settings]`.
    pub fn with_overrides(mut self, overrides: RawSettings) -> Self {
        self.settings.merge(overrides);
        self
    }
}
