use schemars::{Schema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use serde_valid::Validate;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use super::error::{ConfigError, Document};
use super::models::{DialConfig, ModeDefinition, ModeKind, icons_of};

/// Default configuration file, relative to the install root.
pub const DEFAULT_CONFIG_FILE: &str = "configs/mode_dial.default.json";
/// Default schema file, relative to the install root.
pub const DEFAULT_SCHEMA_FILE: &str = "schema/mode_dial.schema.json";
/// Environment variable overriding the install root.
pub const HOME_ENV: &str = "MODEDIAL_HOME";

/// Outcome of a successful `validate_config`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SchemaCheck {
    /// The document was checked against the loaded JSON Schema.
    Enforced,
    /// No JSON Schema backend is compiled in; only the model checks ran.
    Skipped,
}

/// Loads, validates and serves the mode configuration.
///
/// The raw JSON documents are kept alongside a typed view (`DialConfig`).
/// The typed view is decoded leniently: a mode that fails to decode is
/// logged and skipped, so a damaged file still yields a usable dial.
/// `validate_config` is the strict path.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    schema_path: Option<PathBuf>,
    document: Option<Value>,
    schema: Option<Value>,
    config: DialConfig,
}

impl ConfigLoader {
    /// Create an empty loader (no documents loaded).
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the configuration document from a file, replacing any previous one.
    pub fn load_config<P: AsRef<Path>>(&mut self, path: P) -> Result<&Value, ConfigError> {
        let path = path.as_ref();
        let text = read_document(Document::Config, path)?;
        let document = parse_document(Document::Config, &text, &path.display().to_string())?;
        debug!(target: "modedial::loader", path = %path.display(), "Loaded configuration");
        self.config_path = Some(path.to_path_buf());
        Ok(self.install_config(document))
    }

    /// Load the configuration document from a string.
    pub fn load_config_str(&mut self, s: &str) -> Result<&Value, ConfigError> {
        let document = parse_document(Document::Config, s, "<string>")?;
        self.config_path = None;
        Ok(self.install_config(document))
    }

    /// Load the JSON Schema document from a file, replacing any previous one.
    pub fn load_schema<P: AsRef<Path>>(&mut self, path: P) -> Result<&Value, ConfigError> {
        let path = path.as_ref();
        let text = read_document(Document::Schema, path)?;
        let schema = parse_document(Document::Schema, &text, &path.display().to_string())?;
        debug!(target: "modedial::loader", path = %path.display(), "Loaded schema");
        self.schema_path = Some(path.to_path_buf());
        Ok(self.schema.insert(schema))
    }

    /// Load the JSON Schema document from a string.
    pub fn load_schema_str(&mut self, s: &str) -> Result<&Value, ConfigError> {
        let schema = parse_document(Document::Schema, s, "<string>")?;
        self.schema_path = None;
        Ok(self.schema.insert(schema))
    }

    /// Use the schema derived from the Rust model instead of a schema file.
    pub fn use_generated_schema(&mut self) -> Result<&Value, ConfigError> {
        let schema = serde_json::to_value(generate_schema())
            .map_err(|e| ConfigError::InvalidSchema(e.to_string()))?;
        self.schema_path = None;
        Ok(self.schema.insert(schema))
    }

    /// Validate the loaded configuration.
    ///
    /// Runs the JSON Schema check (when the `schema-validation` feature is
    /// enabled; otherwise it is skipped with a warning), then the model checks:
    /// strict decoding, field constraints and cross references.
    pub fn validate_config(&self) -> Result<SchemaCheck, ConfigError> {
        let document = self
            .document
            .as_ref()
            .ok_or(ConfigError::NotLoaded(Document::Config))?;
        let schema = self
            .schema
            .as_ref()
            .ok_or(ConfigError::NotLoaded(Document::Schema))?;

        let check = check_against_schema(schema, document)?;
        validate_model(document)?;
        trace!(target: "modedial::loader", ?check, "Configuration validated");
        Ok(check)
    }

    /// Ids of top-level modes in left-dial order; empty when nothing is loaded.
    pub fn dial_order(&self) -> &[String] {
        &self.config.dial_order
    }

    /// Top-level mode definitions (group members are not listed).
    pub fn modes(&self) -> &[ModeDefinition] {
        &self.config.modes
    }

    /// Find a top-level mode by id. Group members are not searched.
    pub fn mode_by_id(&self, id: &str) -> Option<&ModeDefinition> {
        self.config.modes.iter().find(|m| m.id == id)
    }

    /// The `ui` section, verbatim.
    pub fn ui_config(&self) -> Option<&Value> {
        self.config.ui.as_ref()
    }

    /// The `ui.icons` map (mode id -> icon).
    pub fn icons(&self) -> BTreeMap<String, String> {
        icons_of(self.ui_config())
    }

    /// The typed view of the loaded configuration.
    pub fn config(&self) -> &DialConfig {
        &self.config
    }

    pub fn document(&self) -> Option<&Value> {
        self.document.as_ref()
    }

    pub fn schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn schema_path(&self) -> Option<&Path> {
        self.schema_path.as_deref()
    }

    /// Load the default configuration and schema from the install root.
    ///
    /// Missing files are tolerated: the loader is then empty but usable.
    pub fn load_default_config() -> Self {
        Self::load_defaults_from(default_root())
    }

    /// Load `configs/mode_dial.default.json` and `schema/mode_dial.schema.json`
    /// below `root`, each only if present.
    pub fn load_defaults_from<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        let mut loader = Self::new();

        let config_path = root.join(DEFAULT_CONFIG_FILE);
        if config_path.exists() {
            if let Err(err) = loader.load_config(&config_path) {
                warn!(target: "modedial::loader", error = %err, "Default configuration could not be loaded");
            }
        } else {
            debug!(target: "modedial::loader", path = %config_path.display(), "No default configuration");
        }

        let schema_path = root.join(DEFAULT_SCHEMA_FILE);
        if schema_path.exists() {
            if let Err(err) = loader.load_schema(&schema_path) {
                warn!(target: "modedial::loader", error = %err, "Default schema could not be loaded");
            }
        } else {
            debug!(target: "modedial::loader", path = %schema_path.display(), "No default schema");
        }

        loader
    }

    fn install_config(&mut self, document: Value) -> &Value {
        self.config = decode_lenient(&document);
        self.document.insert(document)
    }
}

impl fmt::Display for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self
            .config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(f, "ConfigLoader(config='{}', modes={})", path, self.config.modes.len())
    }
}

/// Install root used by `load_default_config`: `$MODEDIAL_HOME` if set,
/// otherwise the crate directory.
pub fn default_root() -> PathBuf {
    std::env::var_os(HOME_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")))
}

/// Generate the JSON Schema for the configuration model.
pub fn generate_schema() -> Schema {
    schema_for!(DialConfig)
}

/// Write the JSON Schema for the configuration model to any writer (pretty-printed).
pub fn write_schema_to_writer<W: Write>(mut writer: W) -> anyhow::Result<()> {
    use anyhow::Context;

    let schema = generate_schema();
    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
    writer
        .write_all(json.as_bytes())
        .context("Failed to write schema to writer")?;
    Ok(())
}

fn read_document(kind: Document, path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                kind,
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                kind,
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn parse_document(kind: Document, text: &str, origin: &str) -> Result<Value, ConfigError> {
    let value: Value = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
        kind,
        origin: origin.to_string(),
        message: e.to_string(),
    })?;
    if kind == Document::Config && !value.is_object() {
        return Err(ConfigError::Parse {
            kind,
            origin: origin.to_string(),
            message: "top-level value must be an object".to_string(),
        });
    }
    Ok(value)
}

/// Build the typed view, skipping whatever does not decode.
fn decode_lenient(document: &Value) -> DialConfig {
    let Some(root) = document.as_object() else {
        return DialConfig::default();
    };

    let version = root
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string);

    let dial_order = match root.get("dialOrder") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| match item.as_str() {
                Some(id) => Some(id.to_string()),
                None => {
                    warn!(target: "modedial::loader", index = idx, entry = %item, "Ignoring non-string dialOrder entry");
                    None
                }
            })
            .collect(),
        Some(other) => {
            warn!(target: "modedial::loader", found = %other, "dialOrder is not an array; ignoring");
            Vec::new()
        }
        None => Vec::new(),
    };

    let modes = match root.get("modes") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(idx, raw)| match ModeDefinition::deserialize(raw) {
                Ok(mode) => Some(mode),
                Err(err) => {
                    let id = raw.get("id").and_then(Value::as_str).unwrap_or("?");
                    warn!(target: "modedial::loader", index = idx, id, error = %err, "Skipping mode that failed to decode");
                    None
                }
            })
            .collect(),
        Some(other) => {
            warn!(target: "modedial::loader", found = %other, "modes is not an array; ignoring");
            Vec::new()
        }
        None => Vec::new(),
    };

    DialConfig {
        version,
        dial_order,
        modes,
        ui: root.get("ui").cloned(),
    }
}

#[cfg(feature = "schema-validation")]
fn check_against_schema(schema: &Value, document: &Value) -> Result<SchemaCheck, ConfigError> {
    let validator =
        jsonschema::validator_for(schema).map_err(|e| ConfigError::InvalidSchema(e.to_string()))?;
    let messages: Vec<String> = validator
        .iter_errors(document)
        .map(|err| err.to_string())
        .collect();
    if messages.is_empty() {
        Ok(SchemaCheck::Enforced)
    } else {
        Err(ConfigError::Validation(messages.join("; ")))
    }
}

#[cfg(not(feature = "schema-validation"))]
fn check_against_schema(_schema: &Value, _document: &Value) -> Result<SchemaCheck, ConfigError> {
    Ok(skip_schema_check())
}

#[cfg_attr(feature = "schema-validation", allow(dead_code))]
fn skip_schema_check() -> SchemaCheck {
    warn!(
        target: "modedial::loader",
        "JSON Schema validation is not available (built without `schema-validation`); skipping"
    );
    SchemaCheck::Skipped
}

/// Strict decoding plus the checks a JSON Schema cannot express:
/// - ids are unique across all modes and group members
/// - groups do not nest and are not empty
/// - enums have options, ranges have `min <= max` and a positive step
/// - every dialOrder id names a top-level mode
fn validate_model(document: &Value) -> Result<(), ConfigError> {
    let cfg = DialConfig::deserialize(document).map_err(|e| invalid(e.to_string()))?;
    cfg.validate().map_err(|e| invalid(e.to_string()))?;

    let mut seen = BTreeSet::new();
    for mode in &cfg.modes {
        validate_mode(mode, &mut seen)?;
        for member in mode.members() {
            if member.is_group() {
                return Err(invalid(format!(
                    "group '{}' contains group '{}'; groups cannot nest",
                    mode.id, member.id
                )));
            }
            validate_mode(member, &mut seen)
                .map_err(|e| invalid(format!("in group '{}': {}", mode.id, bare(e))))?;
        }
    }

    for id in &cfg.dial_order {
        if !cfg.modes.iter().any(|m| &m.id == id) {
            return Err(invalid(format!(
                "dialOrder entry '{id}' does not name a top-level mode"
            )));
        }
    }

    Ok(())
}

fn validate_mode<'a>(mode: &'a ModeDefinition, seen: &mut BTreeSet<&'a str>) -> Result<(), ConfigError> {
    if !seen.insert(mode.id.as_str()) {
        return Err(invalid(format!("duplicate mode id '{}'", mode.id)));
    }
    match &mode.kind {
        ModeKind::Enum { options } if options.is_empty() => {
            Err(invalid(format!("enum mode '{}' has no options", mode.id)))
        }
        ModeKind::Range { range } => {
            range
                .validate()
                .map_err(|e| invalid(format!("range mode '{}': {}", mode.id, e)))?;
            if range.min > range.max {
                return Err(invalid(format!(
                    "range mode '{}' has min {} greater than max {}",
                    mode.id, range.min, range.max
                )));
            }
            Ok(())
        }
        ModeKind::Group { group } if group.is_empty() => {
            Err(invalid(format!("group mode '{}' has no members", mode.id)))
        }
        _ => Ok(()),
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Validation(message)
}

fn bare(err: ConfigError) -> String {
    match err {
        ConfigError::Validation(message) => message,
        other => other.to_string(),
    }
}
