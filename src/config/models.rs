use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_valid::Validate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Root of a mode-dial configuration document.
///
/// This structure mirrors the JSON file consumed by the loader:
/// - `dialOrder`: top-level mode ids in left-dial order
/// - `modes`: the mode definitions (groups carry their members inline)
/// - `ui`: arbitrary display metadata passed through verbatim
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DialConfig {
    /// Free-form document version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Ids of top-level modes, in the order the left dial steps through them.
    #[serde(default)]
    #[validate(unique_items)]
    pub dial_order: Vec<String>,

    /// Top-level mode definitions.
    #[serde(default)]
    #[validate]
    pub modes: Vec<ModeDefinition>,

    /// Display metadata (icon map, themes, ...). Not interpreted by the dial.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<Value>,
}

/// Declarative payload attached to a mode value, forwarded to whoever applies it
/// to the camera (e.g. `{ "control": "ExposureTime", "value": 8333 }`).
pub type Bindings = serde_json::Map<String, Value>;

/// One selectable function on the dial.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, PartialEq)]
pub struct ModeDefinition {
    /// Unique id across all modes, group members included.
    #[validate(min_length = 1)]
    pub id: String,

    /// Display label.
    pub label: String,

    /// Optional help text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    /// Gesture -> action table.
    #[serde(default)]
    pub events: ModeEvents,

    /// Type tag plus its payload.
    #[serde(flatten)]
    pub kind: ModeKind,
}

impl ModeDefinition {
    /// The `type` tag as written in the configuration.
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, ModeKind::Group { .. })
    }

    /// Members of a group; empty for every other type.
    pub fn members(&self) -> &[ModeDefinition] {
        match &self.kind {
            ModeKind::Group { group } => group,
            _ => &[],
        }
    }
}

/// Mode type and type-specific payload, selected by the `type` field.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModeKind {
    /// Pick one of an ordered list of options.
    Enum {
        #[serde(rename = "enum", default)]
        options: Vec<EnumOption>,
    },

    /// A numeric value stepped within `[min, max]`.
    Range {
        #[serde(default)]
        range: RangeConfig,
    },

    /// An on/off switch.
    Toggle {
        #[serde(default)]
        toggle: ToggleConfig,
    },

    /// A selector over nested modes; the selected member receives input.
    Group {
        #[serde(default)]
        group: Vec<ModeDefinition>,
    },

    /// Fires bindings only; has no value of its own.
    Action {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bindings: Option<Bindings>,
    },
}

impl ModeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ModeKind::Enum { .. } => "enum",
            ModeKind::Range { .. } => "range",
            ModeKind::Toggle { .. } => "toggle",
            ModeKind::Group { .. } => "group",
            ModeKind::Action { .. } => "action",
        }
    }
}

/// One option of an `enum` mode.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct EnumOption {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bindings: Option<Bindings>,
}

/// Payload of a `range` mode.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, PartialEq)]
pub struct RangeConfig {
    #[serde(default)]
    pub min: f64,

    #[serde(default = "default_range_max")]
    pub max: f64,

    /// Increment per detent. Must be positive.
    #[serde(default = "default_range_step")]
    #[validate(exclusive_minimum = 0.0)]
    pub step: f64,

    /// Display template, e.g. `"{value:+.1f} EV"`. `{unit}` expands to `unit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    #[serde(default)]
    pub unit: String,

    /// Bindings shared by every value of the range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bindings: Option<Bindings>,
}

fn default_range_max() -> f64 {
    100.0
}

fn default_range_step() -> f64 {
    1.0
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: default_range_max(),
            step: default_range_step(),
            display: None,
            unit: String::new(),
            bindings: None,
        }
    }
}

impl RangeConfig {
    /// Arithmetic midpoint of `[min, max]`, the initial value of the range.
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

/// Payload of a `toggle` mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ToggleConfig {
    #[serde(default)]
    pub on: ToggleState,
    #[serde(default)]
    pub off: ToggleState,
}

impl ToggleConfig {
    /// The `on` or `off` entry matching `flag`.
    pub fn state(&self, flag: bool) -> &ToggleState {
        if flag { &self.on } else { &self.off }
    }
}

/// One side of a toggle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ToggleState {
    /// Display label; defaults to `on` / `off`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bindings: Option<Bindings>,
}

/// Gesture -> action table of a mode. A missing entry means `noop`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModeEvents {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate: Option<EventAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub press: Option<EventAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_press: Option<EventAction>,
}

impl ModeEvents {
    pub fn rotate_action(&self) -> EventAction {
        self.rotate.unwrap_or_default()
    }

    pub fn press_action(&self, press: PressType) -> EventAction {
        match press {
            PressType::Press => self.press,
            PressType::LongPress => self.long_press,
        }
        .unwrap_or_default()
    }
}

/// Action token bound to a gesture.
#[derive(Debug, Copy, Clone, Default, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum EventAction {
    Next,
    Prev,
    Inc,
    Dec,
    Toggle,
    Confirm,
    EnterSub,
    Back,
    Enter,
    #[default]
    Noop,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Next => "next",
            EventAction::Prev => "prev",
            EventAction::Inc => "inc",
            EventAction::Dec => "dec",
            EventAction::Toggle => "toggle",
            EventAction::Confirm => "confirm",
            EventAction::EnterSub => "enterSub",
            EventAction::Back => "back",
            EventAction::Enter => "enter",
            EventAction::Noop => "noop",
        }
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a token is not a known action or press type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown token '{0}'")]
pub struct UnknownToken(pub String);

impl FromStr for EventAction {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "next" => EventAction::Next,
            "prev" => EventAction::Prev,
            "inc" => EventAction::Inc,
            "dec" => EventAction::Dec,
            "toggle" => EventAction::Toggle,
            "confirm" => EventAction::Confirm,
            "enterSub" => EventAction::EnterSub,
            "back" => EventAction::Back,
            "enter" => EventAction::Enter,
            "noop" => EventAction::Noop,
            other => return Err(UnknownToken(other.to_string())),
        })
    }
}

// Unknown tokens degrade to `noop` so one typo does not drop a whole mode.
impl<'de> Deserialize<'de> for EventAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_else(|err| {
            warn!(target: "modedial::loader", %err, "Unknown event action; treating as noop");
            EventAction::Noop
        }))
    }
}

/// Right-dial press gesture.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PressType {
    #[default]
    Press,
    LongPress,
}

impl FromStr for PressType {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "press" => Ok(PressType::Press),
            "longPress" => Ok(PressType::LongPress),
            other => Err(UnknownToken(other.to_string())),
        }
    }
}

impl fmt::Display for PressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PressType::Press => f.write_str("press"),
            PressType::LongPress => f.write_str("longPress"),
        }
    }
}

/// Extract the `icons` map of a `ui` section, ignoring non-string entries.
pub fn icons_of(ui: Option<&Value>) -> BTreeMap<String, String> {
    ui.and_then(|ui| ui.get("icons"))
        .and_then(Value::as_object)
        .map(|icons| {
            icons
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
