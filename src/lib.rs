#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Modedial — a JSON-driven dual-dial mode state machine for camera controls.
//!
//! The left dial steps through a configured list of modes (shutter, ISO, EV,
//! ...), the right dial adjusts the value of the active mode and pressing it
//! confirms, toggles or enters sub modes. Value changes hand declarative
//! `bindings` to the host through callbacks; the crate itself never touches
//! camera hardware.
//!
//! Modules:
//! - `config`: Configuration models, loader, validation and schema helpers.
//! - `dial`: The `ModeDial` state machine, snapshots and callbacks.
//! - `sources`: Gesture sources (stdin, script replay) for the simulator.
//! - `utils`: Display formatting helpers.
//!
//! Use `modedial::prelude::*` to bring commonly used items into scope quickly.

/// Public module: configuration (models, loader, schema helpers).
pub mod config;
/// Public module: the dial state machine.
pub mod dial;
/// Public module: gesture sources (stdin, script).
pub mod sources;
/// Public module: utilities (display templates).
pub mod utils;

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version (e.g., "0.1.0").
#[inline]
pub const fn version() -> &'static str {
    PKG_VERSION
}

/// Parse a level name (`trace|debug|info|warn|error`), case-insensitively.
pub fn parse_level(s: &str) -> Option<tracing::Level> {
    use tracing::Level;

    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize tracing (logging) with a reasonable default.
/// - `level` wins if given and valid.
/// - Otherwise honors the `RUST_LOG` environment variable as a plain level.
/// - Falls back to `info` level.
///
/// Logs go to stderr so the simulator's stdout stays clean.
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing(level: Option<&str>) {
    use tracing_subscriber::fmt;

    let level = level
        .and_then(parse_level)
        .or_else(|| std::env::var("RUST_LOG").ok().as_deref().and_then(parse_level))
        .unwrap_or(tracing::Level::INFO);

    // Ignore the error if the global subscriber was already set.
    let _ = fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use modedial::prelude::*;`
pub mod prelude {
    // Common result/error handling
    pub use anyhow::{Context, Error, Result, anyhow, bail, ensure};

    // Serialization
    pub use serde::{Deserialize, Serialize};

    // Tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    pub use crate as modedial;

    // Frequently used types
    pub use crate::config::{ConfigError, ConfigLoader, EventAction, ModeDefinition, PressType};
    pub use crate::dial::{DialCallbacks, DialEvent, DialState, ModeDial, ModeValue};
    pub use crate::sources::Gesture;

    // Frequently used internal modules
    pub use crate::{config, dial, sources, utils};
}
