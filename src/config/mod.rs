//! Configuration module for modedial.
//!
//! This module wires together the mode data model, the load/validate errors and
//! the `ConfigLoader` used by the state machine. Import from here for a
//! convenient, stable API.
//!
//! Example:
//! use modedial::config::ConfigLoader;
//!
//! let mut loader = ConfigLoader::new();
//! loader.load_config("configs/mode_dial.default.json")?;
//! loader.load_schema("schema/mode_dial.schema.json")?;
//! loader.validate_config()?;

pub mod error;
pub mod loader;
pub mod models;

// Re-export core data models
pub use models::{
    Bindings, DialConfig, EnumOption, EventAction, ModeDefinition, ModeEvents, ModeKind,
    PressType, RangeConfig, ToggleConfig, ToggleState, UnknownToken,
};

// Re-export loader utilities
pub use error::{ConfigError, Document};
pub use loader::{
    ConfigLoader, DEFAULT_CONFIG_FILE, DEFAULT_SCHEMA_FILE, HOME_ENV, SchemaCheck, default_root,
    generate_schema, write_schema_to_writer,
};
