use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{ModeDefinition, ModeKind};
use crate::utils::format::format_plain;

/// Version tag carried by every `DialState` snapshot.
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// Runtime value of one mode. The shape follows the mode type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModeValue {
    /// Selected option (`enum`) or selected member (`group`).
    Index(usize),
    /// Current value of a `range`.
    Number(f64),
    /// State of a `toggle`.
    Flag(bool),
    /// `action` modes hold no value. Serialized as `null`.
    Empty,
}

impl ModeValue {
    /// Initial value for a mode: first option / member, range midpoint, off.
    pub fn default_for(kind: &ModeKind) -> Self {
        match kind {
            ModeKind::Enum { .. } | ModeKind::Group { .. } => ModeValue::Index(0),
            ModeKind::Range { range } => ModeValue::Number(range.midpoint()),
            ModeKind::Toggle { .. } => ModeValue::Flag(false),
            ModeKind::Action { .. } => ModeValue::Empty,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            ModeValue::Index(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ModeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ModeValue::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ModeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeValue::Index(i) => write!(f, "{i}"),
            ModeValue::Number(n) => f.write_str(&format_plain(*n)),
            ModeValue::Flag(b) => write!(f, "{b}"),
            ModeValue::Empty => Ok(()),
        }
    }
}

/// A group the user entered with `enterSub` and has not left with `back`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubModeFrame {
    pub group_id: String,
    pub sub_index: usize,
}

/// Owned snapshot of the whole dial, as returned by `ModeDial::current_state`.
///
/// Nothing in here borrows from the dial; callers may keep or mutate it freely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DialState {
    pub version: String,
    pub current_mode_index: usize,
    /// The active mode: the dial-position mode, or the selected member of a group.
    pub current_mode: Option<ModeDefinition>,
    /// Id of the dial-position mode (a group id when the position is a group).
    pub current_mode_id: String,
    /// Id of `current_mode`.
    pub active_mode_id: String,
    pub current_values: BTreeMap<String, ModeValue>,
    pub sub_mode_stack: Vec<SubModeFrame>,
    pub dial_order: Vec<String>,
    pub total_modes: usize,
    /// Human-readable value of the active mode.
    pub current_display_value: Option<String>,
    /// Label of the selected member when the dial position is a group.
    pub group_display_value: Option<String>,
}
