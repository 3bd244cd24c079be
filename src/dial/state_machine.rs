use std::path::Path;
use tracing::{debug, info, trace, warn};

use crate::config::{
    Bindings, ConfigError, ConfigLoader, EventAction, ModeDefinition, ModeKind, PressType,
    RangeConfig,
};
use crate::dial::callbacks::DialCallbacks;
use crate::dial::state::{DialState, ModeValue, SNAPSHOT_VERSION, SubModeFrame};
use crate::dial::table::ModeTable;
use crate::utils::format::{format_plain, render_template};

/// Dual-dial camera control state machine.
///
/// The left dial selects a mode from the dial order, the right dial adjusts
/// the active mode's value, and pressing the right dial runs the mode's
/// press actions. Gestures never fail: anything that does not apply to the
/// active mode is absorbed.
///
/// The dial is synchronous and performs no locking. Hosts driving it from
/// several threads wrap it in a mutex.
#[derive(Debug)]
pub struct ModeDial {
    loader: ConfigLoader,
    table: ModeTable,
    current_mode_index: usize,
    values: Vec<ModeValue>,
    sub_mode_stack: Vec<SubModeFrame>,
    callbacks: DialCallbacks,
}

impl ModeDial {
    /// Build a dial from `config_path`, or from the default configuration
    /// when `None`.
    ///
    /// Load and validation failures are logged and the dial starts with
    /// whatever could be loaded, possibly nothing.
    pub fn new(config_path: Option<&Path>) -> Self {
        let loader = match config_path {
            Some(path) => {
                let mut loader = ConfigLoader::new();
                if let Err(err) = loader.load_config(path) {
                    warn!(target: "modedial::dial", error = %err, "Configuration could not be loaded; starting empty");
                }
                loader
            }
            None => ConfigLoader::load_default_config(),
        };
        Self::from_loader(loader)
    }

    /// Build a dial from a prepared loader. Validation failures are logged only.
    pub fn from_loader(loader: ConfigLoader) -> Self {
        validate_leniently(&loader);
        let mut dial = Self {
            loader: ConfigLoader::new(),
            table: ModeTable::default(),
            current_mode_index: 0,
            values: Vec::new(),
            sub_mode_stack: Vec::new(),
            callbacks: DialCallbacks::default(),
        };
        dial.install(loader);
        dial
    }

    /// Reload the configuration from `path`, keeping the loaded schema.
    ///
    /// On a load error the current configuration stays active and the error
    /// is returned. On success the state is reset and `on_mode_changed` fires.
    pub fn reload_config<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let mut loader = self.loader.clone();
        loader.load_config(path.as_ref())?;
        validate_leniently(&loader);
        self.install(loader);
        info!(target: "modedial::dial", path = %path.as_ref().display(), modes = self.table.dial_order().len(), "Configuration reloaded");
        self.fire_mode_changed();
        Ok(())
    }

    fn install(&mut self, loader: ConfigLoader) {
        self.table = ModeTable::compile(loader.dial_order(), loader.modes());
        self.loader = loader;
        self.current_mode_index = 0;
        self.values = self.table.defaults();
        self.sub_mode_stack.clear();
        debug!(
            target: "modedial::dial",
            positions = self.table.dial_order().len(),
            entries = self.table.len(),
            "Mode table compiled"
        );
    }

    /// Register callbacks. Slots left unset in `callbacks` keep their
    /// current registration.
    pub fn set_callbacks(&mut self, callbacks: DialCallbacks) {
        self.callbacks.merge(callbacks);
    }

    /// The active mode: the mode at the dial position, or the selected
    /// member when that mode is a group.
    pub fn current_mode(&self) -> Option<&ModeDefinition> {
        self.active_entry().map(|idx| &self.table.entry(idx).def)
    }

    /// Id at the dial position. For a group this is the group id.
    pub fn current_mode_id(&self) -> &str {
        self.table
            .dial_order()
            .get(self.current_mode_index)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Id of `current_mode()`, or `""`.
    pub fn current_active_mode_id(&self) -> &str {
        self.current_mode().map(|m| m.id.as_str()).unwrap_or("")
    }

    pub fn current_mode_index(&self) -> usize {
        self.current_mode_index
    }

    /// Stored value of any mode or group member.
    pub fn value_of(&self, id: &str) -> Option<ModeValue> {
        self.table.index_of(id).map(|idx| self.values[idx])
    }

    pub fn sub_mode_stack(&self) -> &[SubModeFrame] {
        &self.sub_mode_stack
    }

    pub fn dial_order(&self) -> &[String] {
        self.table.dial_order()
    }

    /// Top-level mode definitions.
    pub fn modes(&self) -> &[ModeDefinition] {
        self.loader.modes()
    }

    pub fn loader(&self) -> &ConfigLoader {
        &self.loader
    }

    /// Step the mode selection. Wraps around in both directions.
    pub fn rotate_left_dial(&mut self, direction: i32) {
        let len = self.table.dial_order().len();
        if len == 0 || direction == 0 {
            return;
        }

        let old = self.current_mode_index;
        self.current_mode_index = wrap(old, i64::from(direction), len);
        trace!(target: "modedial::dial", old, new = self.current_mode_index, "Left dial");

        if old != self.current_mode_index {
            self.fire_mode_changed();
        }
    }

    /// Adjust the active mode with its `rotate` action.
    pub fn rotate_right_dial(&mut self, direction: i32) {
        if direction == 0 {
            return;
        }
        let Some(active) = self.active_entry() else {
            return;
        };

        let def = &self.table.entry(active).def;
        let action = def.events.rotate_action();
        if action == EventAction::Noop {
            trace!(target: "modedial::dial", mode = %def.id, "Rotate is noop");
            return;
        }

        let old = self.values[active];
        let new = rotated_value(def, old, direction, action);
        if new != old {
            self.store_value(active, new);
            self.trigger_bindings(active);
        }
    }

    /// Run the active mode's action for `press`.
    ///
    /// When the active mode is a group member with no action for this press,
    /// the owning group's action applies to the group instead.
    pub fn press_right_dial(&mut self, press: PressType) {
        let Some(active) = self.active_entry() else {
            return;
        };

        let entry = self.table.entry(active);
        let mut target = active;
        let mut action = entry.def.events.press_action(press);

        if action == EventAction::Noop {
            if let Some(group) = entry.group {
                action = self.table.entry(group).def.events.press_action(press);
                target = group;
            }
        }
        if action == EventAction::Noop {
            trace!(target: "modedial::dial", mode = %entry.def.id, %press, "Press is noop");
            return;
        }

        debug!(target: "modedial::dial", mode = %self.table.entry(target).def.id, %press, %action, "Press");
        self.handle_press(target, action);
    }

    fn handle_press(&mut self, target: usize, action: EventAction) {
        let def = &self.table.entry(target).def;
        match (action, &def.kind) {
            (EventAction::Confirm | EventAction::Enter, _) => self.trigger_bindings(target),
            (EventAction::Toggle, ModeKind::Toggle { .. }) => {
                let flag = self.values[target].as_flag().unwrap_or(false);
                self.store_value(target, ModeValue::Flag(!flag));
                self.trigger_bindings(target);
            }
            (EventAction::EnterSub, ModeKind::Group { group }) => {
                let sub_index = self.values[target].as_index().unwrap_or(0);
                if sub_index < group.len() {
                    self.sub_mode_stack.push(SubModeFrame {
                        group_id: def.id.clone(),
                        sub_index,
                    });
                    debug!(target: "modedial::dial", group = %def.id, sub_index, depth = self.sub_mode_stack.len(), "Entered sub mode");
                }
            }
            (EventAction::Back, _) => {
                if let Some(frame) = self.sub_mode_stack.pop() {
                    debug!(target: "modedial::dial", group = %frame.group_id, depth = self.sub_mode_stack.len(), "Left sub mode");
                }
            }
            (EventAction::Next | EventAction::Prev, ModeKind::Group { group }) if !group.is_empty() => {
                let delta = if action == EventAction::Next { 1 } else { -1 };
                let old = self.values[target].as_index().unwrap_or(0);
                let new = wrap(old, delta, group.len());
                if new != old {
                    self.store_value(target, ModeValue::Index(new));
                    self.fire_mode_changed();
                }
            }
            _ => {
                trace!(target: "modedial::dial", mode = %def.id, %action, "Press action does not apply");
            }
        }
    }

    /// Restore index 0, default values and an empty sub-mode stack.
    pub fn reset_to_defaults(&mut self) {
        self.current_mode_index = 0;
        self.values = self.table.defaults();
        self.sub_mode_stack.clear();
        debug!(target: "modedial::dial", "Reset to defaults");
        self.fire_mode_changed();
    }

    /// Owned snapshot of the dial.
    pub fn current_state(&self) -> DialState {
        let active = self.active_entry();
        let group_display_value = self
            .table
            .slot(self.current_mode_index)
            .and_then(|top| {
                let def = &self.table.entry(top).def;
                let idx = self.values[top].as_index()?;
                def.members().get(idx).map(|m| m.label.clone())
            });

        DialState {
            version: SNAPSHOT_VERSION.to_string(),
            current_mode_index: self.current_mode_index,
            current_mode: active.map(|idx| self.table.entry(idx).def.clone()),
            current_mode_id: self.current_mode_id().to_string(),
            active_mode_id: self.current_active_mode_id().to_string(),
            current_values: self.table.value_map(&self.values),
            sub_mode_stack: self.sub_mode_stack.clone(),
            dial_order: self.table.dial_order().to_vec(),
            total_modes: self.table.dial_order().len(),
            current_display_value: active
                .map(|idx| display_value(&self.table.entry(idx).def, &self.values[idx])),
            group_display_value,
        }
    }

    fn active_entry(&self) -> Option<usize> {
        self.table.active(self.current_mode_index, &self.values)
    }

    fn store_value(&mut self, idx: usize, new: ModeValue) {
        let old = std::mem::replace(&mut self.values[idx], new);
        let id = &self.table.entry(idx).def.id;
        debug!(target: "modedial::dial", mode = %id, %old, %new, "Value changed");
        if let Some(cb) = self.callbacks.on_value_changed.as_mut() {
            cb(id, &old, &new);
        }
    }

    fn trigger_bindings(&mut self, idx: usize) {
        let def = &self.table.entry(idx).def;
        let value = self.values[idx];
        let Some(bindings) = bindings_for(def, &value).filter(|b| !b.is_empty()) else {
            return;
        };
        debug!(target: "modedial::dial", mode = %def.id, %value, "Bindings triggered");
        if let Some(cb) = self.callbacks.on_binding_triggered.as_mut() {
            cb(&def.id, bindings, &value);
        }
    }

    fn fire_mode_changed(&mut self) {
        let mode = self
            .table
            .active(self.current_mode_index, &self.values)
            .map(|idx| &self.table.entry(idx).def);
        debug!(
            target: "modedial::dial",
            index = self.current_mode_index,
            mode = mode.map(|m| m.id.as_str()).unwrap_or(""),
            "Mode changed"
        );
        if let Some(cb) = self.callbacks.on_mode_changed.as_mut() {
            cb(self.current_mode_index, mode);
        }
    }
}

fn validate_leniently(loader: &ConfigLoader) {
    if let Err(err) = loader.validate_config() {
        warn!(target: "modedial::dial", error = %err, "Configuration validation failed; continuing with what was loaded");
    }
}

/// `(index + delta) mod len`, always in `0..len`. `len` must be non-zero.
fn wrap(index: usize, delta: i64, len: usize) -> usize {
    let len = len as i64;
    (index as i64 + delta).rem_euclid(len) as usize
}

/// Value after one right-dial detent. Only the sign of `direction` counts.
fn rotated_value(def: &ModeDefinition, old: ModeValue, direction: i32, action: EventAction) -> ModeValue {
    let forward = direction > 0;
    match (&def.kind, action) {
        (ModeKind::Enum { options }, EventAction::Next | EventAction::Prev) if !options.is_empty() => {
            let mut delta = if action == EventAction::Next { 1 } else { -1 };
            if !forward {
                delta = -delta;
            }
            ModeValue::Index(wrap(old.as_index().unwrap_or(0), delta, options.len()))
        }
        (ModeKind::Range { range }, EventAction::Inc | EventAction::Dec) => {
            let mut delta = if action == EventAction::Inc { range.step } else { -range.step };
            if !forward {
                delta = -delta;
            }
            let current = old.as_number().unwrap_or_else(|| range.midpoint());
            ModeValue::Number(step_range(range, current, delta))
        }
        // Only reachable for a group that did not resolve to a member.
        (ModeKind::Group { group }, _) if !group.is_empty() => {
            let delta = if forward { 1 } else { -1 };
            ModeValue::Index(wrap(old.as_index().unwrap_or(0), delta, group.len()))
        }
        (ModeKind::Toggle { .. }, EventAction::Next | EventAction::Prev | EventAction::Toggle) => {
            ModeValue::Flag(!old.as_flag().unwrap_or(false))
        }
        _ => old,
    }
}

/// Add `delta` to `current` and clamp into `[min, max]`.
///
/// A sum that lies within rounding error of a `min + j * step` grid point is
/// pulled onto that point, so repeated steps do not drift. Values off the
/// grid (an off-grid midpoint default) are kept as computed.
fn step_range(range: &RangeConfig, current: f64, delta: f64) -> f64 {
    let raw = current + delta;
    let step = range.step.abs();
    let stepped = if step > 0.0 {
        let grid = range.min + ((raw - range.min) / step).round() * step;
        if (raw - grid).abs() <= step * GRID_TOLERANCE {
            grid
        } else {
            raw
        }
    } else {
        raw
    };
    // Not f64::clamp: an unvalidated range may have min > max.
    stepped.min(range.max).max(range.min)
}

/// Fraction of a step treated as floating-point noise when snapping to the grid.
const GRID_TOLERANCE: f64 = 1e-6;

/// Bindings attached to the current value of a mode.
fn bindings_for<'a>(def: &'a ModeDefinition, value: &ModeValue) -> Option<&'a Bindings> {
    match &def.kind {
        ModeKind::Enum { options } => options.get(value.as_index()?)?.bindings.as_ref(),
        ModeKind::Range { range } => range.bindings.as_ref(),
        ModeKind::Toggle { toggle } => toggle.state(value.as_flag()?).bindings.as_ref(),
        ModeKind::Action { bindings } => bindings.as_ref(),
        ModeKind::Group { .. } => None,
    }
}

/// Human-readable form of a mode's value.
fn display_value(def: &ModeDefinition, value: &ModeValue) -> String {
    let shown = match &def.kind {
        ModeKind::Enum { options } => value
            .as_index()
            .and_then(|idx| options.get(idx))
            .map(|o| o.label.clone()),
        ModeKind::Range { range } => value.as_number().map(|v| range_display(range, v)),
        ModeKind::Toggle { toggle } => value.as_flag().map(|flag| {
            toggle
                .state(flag)
                .label
                .clone()
                .unwrap_or_else(|| if flag { "on" } else { "off" }.to_string())
        }),
        ModeKind::Group { group } => value
            .as_index()
            .and_then(|idx| group.get(idx))
            .map(|m| m.label.clone()),
        ModeKind::Action { .. } => Some(def.label.clone()),
    };
    shown.unwrap_or_else(|| value.to_string())
}

fn range_display(range: &RangeConfig, value: f64) -> String {
    match range.display.as_deref() {
        Some(template) if template.contains("{value") => render_template(template, value, &range.unit)
            .unwrap_or_else(|| format_plain(value)),
        _ => format!("{}{}", format_plain(value), range.unit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dial::callbacks::DialEvent;
    use serde_json::{Value, json};
    use std::fs;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn fixture() -> Value {
        json!({
            "dialOrder": ["shutter", "iso", "ev", "flash", "focus", "menu"],
            "modes": [
                {"id": "shutter", "label": "Shutter", "type": "enum",
                 "enum": [
                    {"label": "1/60"},
                    {"label": "1/125", "bindings": {"control": "ExposureTime", "value": 8000}},
                    {"label": "1/250", "bindings": {"control": "ExposureTime", "value": 4000}}
                 ],
                 "events": {"rotate": "next", "press": "confirm"}},
                {"id": "iso", "label": "ISO", "type": "enum",
                 "enum": [{"label": "100"}, {"label": "200"}, {"label": "400"}],
                 "events": {"rotate": "prev"}},
                {"id": "ev", "label": "EV", "type": "range",
                 "range": {"min": -3, "max": 3, "step": 1, "display": "{value:+.1f} EV",
                           "bindings": {"control": "ExposureValue"}},
                 "events": {"rotate": "inc"}},
                {"id": "flash", "label": "Flash", "type": "toggle",
                 "toggle": {"on": {"label": "ON", "bindings": {"control": "Flash", "value": true}},
                            "off": {"bindings": {}}},
                 "events": {"press": "toggle", "rotate": "toggle"}},
                {"id": "focus", "label": "Focus", "type": "group",
                 "events": {"press": "next", "longPress": "enterSub"},
                 "group": [
                    {"id": "af", "label": "AF", "type": "enum",
                     "enum": [{"label": "AF-S"}, {"label": "AF-C"}],
                     "events": {"rotate": "next"}},
                    {"id": "mf", "label": "MF", "type": "range",
                     "range": {"min": 0, "max": 1, "step": 0.1, "unit": "m"},
                     "events": {"rotate": "inc", "longPress": "back"}}
                 ]},
                {"id": "menu", "label": "Menu", "type": "action",
                 "bindings": {"action": "enter_settings"},
                 "events": {"press": "enter", "rotate": "next"}}
            ]
        })
    }

    fn dial_from(config: &Value) -> ModeDial {
        let mut loader = ConfigLoader::new();
        loader.load_config_str(&config.to_string()).unwrap();
        loader.load_schema_str(r#"{"type": "object"}"#).unwrap();
        ModeDial::from_loader(loader)
    }

    fn with_events(dial: &mut ModeDial) -> UnboundedReceiver<DialEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        dial.set_callbacks(DialCallbacks::forward_to(tx));
        rx
    }

    fn drain(rx: &mut UnboundedReceiver<DialEvent>) -> Vec<DialEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn select(dial: &mut ModeDial, id: &str) {
        let pos = dial.dial_order().iter().position(|m| m == id).unwrap();
        dial.rotate_left_dial(pos as i32 - dial.current_mode_index() as i32);
        assert_eq!(dial.current_mode_id(), id);
    }

    #[test]
    fn test_initial_state_matches_defaults() {
        let dial = dial_from(&fixture());
        let state = dial.current_state();

        assert_eq!(state.version, "1.0.0");
        assert_eq!(state.current_mode_index, 0);
        assert_eq!(state.total_modes, 6);
        assert_eq!(state.current_mode_id, "shutter");
        assert_eq!(state.current_values["shutter"], ModeValue::Index(0));
        assert_eq!(state.current_values["ev"], ModeValue::Number(0.0));
        assert_eq!(state.current_values["flash"], ModeValue::Flag(false));
        assert_eq!(state.current_values["focus"], ModeValue::Index(0));
        assert_eq!(state.current_values["mf"], ModeValue::Number(0.5));
        assert_eq!(state.current_values["menu"], ModeValue::Empty);
        assert!(state.sub_mode_stack.is_empty());
        assert_eq!(state.current_display_value.as_deref(), Some("1/60"));
        assert_eq!(state.group_display_value, None);
    }

    #[test]
    fn test_left_dial_wraps_both_ways() {
        let mut dial = dial_from(&fixture());
        let n = dial.dial_order().len();

        for _ in 0..n {
            dial.rotate_left_dial(1);
        }
        assert_eq!(dial.current_mode_index(), 0);
        for _ in 0..n {
            dial.rotate_left_dial(-1);
        }
        assert_eq!(dial.current_mode_index(), 0);

        dial.rotate_left_dial(n as i32 + 2);
        assert_eq!(dial.current_mode_index(), 2);
    }

    #[test]
    fn test_scenario_a_enum_step() {
        let mut dial = dial_from(&json!({
            "dialOrder": ["shutter", "iso"],
            "modes": [
                {"id": "shutter", "label": "Shutter", "type": "enum",
                 "enum": [{"label": "1/60"}, {"label": "1/125"}, {"label": "1/250"}],
                 "events": {"rotate": "next"}},
                {"id": "iso", "label": "ISO", "type": "enum", "enum": [{"label": "100"}]}
            ]
        }));

        dial.rotate_right_dial(1);
        assert_eq!(dial.value_of("shutter"), Some(ModeValue::Index(1)));
        assert_eq!(
            dial.current_state().current_display_value.as_deref(),
            Some("1/125")
        );
    }

    #[test]
    fn test_scenario_b_range_clamps_at_min() {
        let mut dial = dial_from(&fixture());
        select(&mut dial, "ev");

        for _ in 0..3 {
            dial.rotate_right_dial(-1);
        }
        assert_eq!(dial.value_of("ev"), Some(ModeValue::Number(-3.0)));

        let mut rx = with_events(&mut dial);
        dial.rotate_right_dial(-1);
        assert_eq!(dial.value_of("ev"), Some(ModeValue::Number(-3.0)));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_scenario_c_toggle_press() {
        let mut dial = dial_from(&fixture());
        select(&mut dial, "flash");
        let mut rx = with_events(&mut dial);

        dial.press_right_dial(PressType::Press);
        assert_eq!(dial.value_of("flash"), Some(ModeValue::Flag(true)));
        let events = drain(&mut rx);
        assert_eq!(
            events[0],
            DialEvent::ValueChanged {
                mode_id: "flash".into(),
                old: ModeValue::Flag(false),
                new: ModeValue::Flag(true),
            }
        );
        assert!(matches!(events[1], DialEvent::BindingTriggered { .. }));
        assert_eq!(dial.current_state().current_display_value.as_deref(), Some("ON"));

        dial.press_right_dial(PressType::Press);
        assert_eq!(dial.value_of("flash"), Some(ModeValue::Flag(false)));
        // The `off` bindings are empty, so only the value change is reported.
        assert_eq!(drain(&mut rx).len(), 1);
        assert_eq!(dial.current_state().current_display_value.as_deref(), Some("off"));
    }

    #[test]
    fn test_scenario_d_left_wrap_fires_mode_changed() {
        let mut dial = dial_from(&json!({
            "dialOrder": ["a", "b", "c"],
            "modes": [
                {"id": "a", "label": "A", "type": "action"},
                {"id": "b", "label": "B", "type": "action"},
                {"id": "c", "label": "C", "type": "action"}
            ]
        }));
        let mut rx = with_events(&mut dial);

        dial.rotate_left_dial(-1);
        assert_eq!(dial.current_mode_index(), 2);
        assert_eq!(
            drain(&mut rx),
            vec![DialEvent::ModeChanged {
                index: 2,
                mode_id: Some("c".into())
            }]
        );
    }

    #[cfg(not(feature = "schema-validation"))]
    #[test]
    fn test_scenario_e_missing_validator_is_not_fatal() {
        let mut loader = ConfigLoader::new();
        loader.load_config_str(&fixture().to_string()).unwrap();
        loader
            .load_schema_str(r#"{"type": "object", "required": ["profile"]}"#)
            .unwrap();
        assert_eq!(
            loader.validate_config().unwrap(),
            crate::config::SchemaCheck::Skipped
        );

        let mut dial = None;
        let logs = crate::utils::capture_logs(|| dial = Some(ModeDial::from_loader(loader)));
        assert!(logs.contains("JSON Schema validation is not available"), "{logs}");
        assert_eq!(dial.unwrap().current_state().total_modes, 6);
    }

    #[test]
    fn test_enum_wraps_in_both_directions() {
        let mut dial = dial_from(&fixture());
        for step in 1..=7 {
            dial.rotate_right_dial(1);
            assert_eq!(dial.value_of("shutter"), Some(ModeValue::Index(step % 3)));
        }

        dial.reset_to_defaults();
        dial.rotate_right_dial(-1);
        assert_eq!(dial.value_of("shutter"), Some(ModeValue::Index(2)));

        // `prev` inverts the sense of the dial.
        select(&mut dial, "iso");
        dial.rotate_right_dial(1);
        assert_eq!(dial.value_of("iso"), Some(ModeValue::Index(2)));
    }

    #[test]
    fn test_range_saturates_exactly_and_stays_on_grid() {
        let mut dial = dial_from(&fixture());
        select(&mut dial, "focus");
        dial.press_right_dial(PressType::Press);
        assert_eq!(dial.current_active_mode_id(), "mf");

        for _ in 0..20 {
            dial.rotate_right_dial(1);
        }
        assert_eq!(dial.value_of("mf"), Some(ModeValue::Number(1.0)));

        for _ in 0..3 {
            dial.rotate_right_dial(-1);
        }
        let v = dial.value_of("mf").unwrap().as_number().unwrap();
        let j = (v / 0.1).round();
        assert_eq!(v, 0.0 + j * 0.1);
        assert!((v - 0.7).abs() < 1e-9);

        for _ in 0..50 {
            dial.rotate_right_dial(-1);
        }
        assert_eq!(dial.value_of("mf"), Some(ModeValue::Number(0.0)));
    }

    fn range_dial(min: f64, max: f64, step: f64) -> ModeDial {
        dial_from(&json!({
            "dialOrder": ["level"],
            "modes": [
                {"id": "level", "label": "Level", "type": "range",
                 "range": {"min": min, "max": max, "step": step},
                 "events": {"rotate": "inc"}}
            ]
        }))
    }

    fn level(dial: &ModeDial) -> f64 {
        dial.value_of("level").unwrap().as_number().unwrap()
    }

    #[test]
    fn test_range_steps_back_from_max_on_min_grid() {
        let mut dial = range_dial(0.0, 255.0, 1.0);
        assert_eq!(level(&dial), 127.5);

        // The off-grid midpoint default moves by whole steps.
        dial.rotate_right_dial(1);
        assert_eq!(level(&dial), 128.5);

        for _ in 0..300 {
            dial.rotate_right_dial(1);
        }
        assert_eq!(level(&dial), 255.0);

        dial.rotate_right_dial(-1);
        assert_eq!(level(&dial), 254.0);
        dial.rotate_right_dial(1);
        assert_eq!(level(&dial), 255.0);

        for _ in 0..300 {
            dial.rotate_right_dial(-1);
        }
        assert_eq!(level(&dial), 0.0);
        dial.rotate_right_dial(1);
        assert_eq!(level(&dial), 1.0);
    }

    #[test]
    fn test_range_with_off_grid_max_steps_by_whole_steps() {
        let mut dial = range_dial(0.0, 1.0, 0.3);

        for _ in 0..5 {
            dial.rotate_right_dial(1);
        }
        assert_eq!(level(&dial), 1.0);

        dial.rotate_right_dial(-1);
        assert!((level(&dial) - 0.7).abs() < 1e-9);

        for _ in 0..5 {
            dial.rotate_right_dial(-1);
        }
        assert_eq!(level(&dial), 0.0);

        dial.rotate_right_dial(1);
        assert!((level(&dial) - 0.3).abs() < 1e-9);
        dial.rotate_right_dial(1);
        assert!((level(&dial) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_toggle_pairing_returns_to_start() {
        let mut dial = dial_from(&fixture());
        select(&mut dial, "flash");
        let before = dial.value_of("flash");
        dial.press_right_dial(PressType::Press);
        dial.press_right_dial(PressType::Press);
        assert_eq!(dial.value_of("flash"), before);

        // Rotating a toggle flips it regardless of direction.
        dial.rotate_right_dial(-1);
        assert_eq!(dial.value_of("flash"), Some(ModeValue::Flag(true)));
    }

    #[test]
    fn test_value_changed_only_on_change() {
        let mut dial = dial_from(&fixture());
        select(&mut dial, "menu");
        let mut rx = with_events(&mut dial);

        dial.rotate_right_dial(1);
        dial.rotate_right_dial(-1);
        let events = drain(&mut rx);
        assert!(
            events
                .iter()
                .all(|e| !matches!(e, DialEvent::ValueChanged { .. }))
        );

        // A toggle press on a non-toggle mode changes nothing.
        let mut cfg = fixture();
        cfg["modes"][5]["events"]["press"] = json!("toggle");
        let mut dial = dial_from(&cfg);
        select(&mut dial, "menu");
        let mut rx = with_events(&mut dial);
        dial.press_right_dial(PressType::Press);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_zero_direction_is_absorbed() {
        let mut dial = dial_from(&fixture());
        let mut rx = with_events(&mut dial);
        dial.rotate_left_dial(0);
        dial.rotate_right_dial(0);
        assert_eq!(dial.current_mode_index(), 0);
        assert_eq!(dial.value_of("shutter"), Some(ModeValue::Index(0)));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_bindings_follow_selected_option() {
        let mut dial = dial_from(&fixture());
        let mut rx = with_events(&mut dial);

        // 1/60 carries no bindings.
        dial.press_right_dial(PressType::Press);
        assert!(drain(&mut rx).is_empty());

        dial.rotate_right_dial(1);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        match &events[1] {
            DialEvent::BindingTriggered {
                mode_id,
                bindings,
                value,
            } => {
                assert_eq!(mode_id, "shutter");
                assert_eq!(bindings["value"], 8000);
                assert_eq!(*value, ModeValue::Index(1));
            }
            other => panic!("unexpected event {other:?}"),
        }

        dial.press_right_dial(PressType::Press);
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [DialEvent::BindingTriggered { .. }]
        ));
    }

    #[test]
    fn test_action_enter_fires_bindings() {
        let mut dial = dial_from(&fixture());
        select(&mut dial, "menu");
        let mut rx = with_events(&mut dial);

        dial.press_right_dial(PressType::Press);
        match drain(&mut rx).as_slice() {
            [DialEvent::BindingTriggered { bindings, value, .. }] => {
                assert_eq!(bindings["action"], "enter_settings");
                assert_eq!(*value, ModeValue::Empty);
            }
            other => panic!("unexpected events {other:?}"),
        }
        assert_eq!(dial.current_state().current_display_value.as_deref(), Some("Menu"));
    }

    #[test]
    fn test_group_press_cycles_members() {
        let mut dial = dial_from(&fixture());
        select(&mut dial, "focus");
        assert_eq!(dial.current_mode_id(), "focus");
        assert_eq!(dial.current_active_mode_id(), "af");
        let mut rx = with_events(&mut dial);

        // `af` has no press action, so the group's `next` applies.
        dial.press_right_dial(PressType::Press);
        assert_eq!(dial.current_active_mode_id(), "mf");
        let index = dial.current_mode_index();
        assert_eq!(
            drain(&mut rx),
            vec![
                DialEvent::ValueChanged {
                    mode_id: "focus".into(),
                    old: ModeValue::Index(0),
                    new: ModeValue::Index(1),
                },
                DialEvent::ModeChanged {
                    index,
                    mode_id: Some("mf".into()),
                },
            ]
        );

        let state = dial.current_state();
        assert_eq!(state.current_mode.unwrap().id, "mf");
        assert_eq!(state.group_display_value.as_deref(), Some("MF"));
        assert_eq!(state.current_display_value.as_deref(), Some("0.5m"));

        dial.press_right_dial(PressType::Press);
        assert_eq!(dial.current_active_mode_id(), "af");
    }

    #[test]
    fn test_right_dial_targets_active_member() {
        let mut dial = dial_from(&fixture());
        select(&mut dial, "focus");

        dial.rotate_right_dial(1);
        assert_eq!(dial.value_of("af"), Some(ModeValue::Index(1)));
        assert_eq!(dial.value_of("focus"), Some(ModeValue::Index(0)));
        assert_eq!(
            dial.current_state().current_display_value.as_deref(),
            Some("AF-C")
        );
    }

    #[test]
    fn test_sub_mode_stack_push_and_pop() {
        let mut dial = dial_from(&fixture());
        select(&mut dial, "focus");

        // `af` has no long press, so the group's `enterSub` applies.
        dial.press_right_dial(PressType::LongPress);
        assert_eq!(
            dial.sub_mode_stack(),
            [SubModeFrame {
                group_id: "focus".into(),
                sub_index: 0
            }]
        );
        assert_eq!(dial.current_state().sub_mode_stack.len(), 1);

        // `mf` binds its long press to `back`.
        dial.press_right_dial(PressType::Press);
        assert_eq!(dial.current_active_mode_id(), "mf");
        dial.press_right_dial(PressType::LongPress);
        assert!(dial.sub_mode_stack().is_empty());
        dial.press_right_dial(PressType::LongPress);
        assert!(dial.sub_mode_stack().is_empty());

        dial.press_right_dial(PressType::Press);
        dial.press_right_dial(PressType::LongPress);
        assert_eq!(dial.sub_mode_stack().len(), 1);

        // The stack does not gate the dials.
        dial.rotate_left_dial(1);
        assert_eq!(dial.current_mode_id(), "menu");
        assert_eq!(dial.sub_mode_stack().len(), 1);
    }

    #[test]
    fn test_display_values() {
        let mut dial = dial_from(&fixture());
        select(&mut dial, "ev");
        assert_eq!(
            dial.current_state().current_display_value.as_deref(),
            Some("+0.0 EV")
        );
        dial.rotate_right_dial(-1);
        assert_eq!(
            dial.current_state().current_display_value.as_deref(),
            Some("-1.0 EV")
        );
        select(&mut dial, "flash");
        assert_eq!(
            dial.current_state().current_display_value.as_deref(),
            Some("off")
        );
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut dial = dial_from(&fixture());
        let mut state = dial.current_state();
        state.current_values.insert("shutter".into(), ModeValue::Index(2));
        state.dial_order.clear();

        assert_eq!(dial.value_of("shutter"), Some(ModeValue::Index(0)));
        assert_eq!(dial.dial_order().len(), 6);
        dial.rotate_right_dial(1);
        assert_eq!(state.current_values["shutter"], ModeValue::Index(2));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut dial = dial_from(&fixture());
        let initial = dial.current_state();

        dial.rotate_right_dial(1);
        select(&mut dial, "focus");
        dial.press_right_dial(PressType::LongPress);
        dial.rotate_left_dial(1);

        let mut rx = with_events(&mut dial);
        dial.reset_to_defaults();
        assert_eq!(dial.current_state(), initial);
        assert_eq!(
            drain(&mut rx),
            vec![DialEvent::ModeChanged {
                index: 0,
                mode_id: Some("shutter".into())
            }]
        );
    }

    #[test]
    fn test_set_callbacks_keeps_other_slots() {
        let mut dial = dial_from(&fixture());
        let mut rx = with_events(&mut dial);
        dial.set_callbacks(DialCallbacks::new());
        dial.set_callbacks(DialCallbacks::new().on_binding_triggered(|_, _, _| {}));

        dial.rotate_right_dial(1);
        dial.rotate_left_dial(1);
        // Value and mode changes still reach the channel; bindings do not.
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn test_empty_configuration_absorbs_everything() {
        let mut dial = ModeDial::from_loader(ConfigLoader::new());
        let mut rx = with_events(&mut dial);

        dial.rotate_left_dial(1);
        dial.rotate_right_dial(1);
        dial.press_right_dial(PressType::Press);
        dial.press_right_dial(PressType::LongPress);

        assert!(drain(&mut rx).is_empty());
        assert!(dial.current_mode().is_none());
        assert_eq!(dial.current_mode_id(), "");
        assert_eq!(dial.current_active_mode_id(), "");
        let state = dial.current_state();
        assert_eq!(state.total_modes, 0);
        assert_eq!(state.current_display_value, None);
    }

    #[test]
    fn test_unresolved_dial_entry_is_inert() {
        let mut dial = dial_from(&json!({
            "dialOrder": ["ghost", "a"],
            "modes": [{"id": "a", "label": "A", "type": "toggle", "events": {"rotate": "toggle"}}]
        }));
        assert_eq!(dial.current_mode_id(), "ghost");
        assert!(dial.current_mode().is_none());
        dial.rotate_right_dial(1);
        assert_eq!(dial.value_of("a"), Some(ModeValue::Flag(false)));

        dial.rotate_left_dial(1);
        dial.rotate_right_dial(1);
        assert_eq!(dial.value_of("a"), Some(ModeValue::Flag(true)));
    }

    #[test]
    fn test_new_with_missing_file_starts_empty() {
        let dial = ModeDial::new(Some(Path::new("/definitely/not/here.json")));
        assert!(dial.dial_order().is_empty());
        assert_eq!(dial.current_state().total_modes, 0);
    }

    #[test]
    fn test_new_loads_given_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dial.json");
        fs::write(&path, fixture().to_string()).unwrap();

        let dial = ModeDial::new(Some(path.as_path()));
        assert_eq!(dial.dial_order().len(), 6);
        assert_eq!(dial.modes().len(), 6);
        assert_eq!(dial.loader().config_path(), Some(path.as_path()));
    }

    #[test]
    fn test_reload_resets_and_keeps_old_config_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        fs::write(
            &path,
            json!({
                "dialOrder": ["wb"],
                "modes": [{"id": "wb", "label": "WB", "type": "enum", "enum": [{"label": "Auto"}]}]
            })
            .to_string(),
        )
        .unwrap();

        let mut dial = dial_from(&fixture());
        dial.rotate_left_dial(2);
        let mut rx = with_events(&mut dial);

        assert!(dial.reload_config(dir.path().join("missing.json")).is_err());
        assert_eq!(dial.dial_order().len(), 6);
        assert_eq!(dial.current_mode_index(), 2);

        dial.reload_config(&path).unwrap();
        assert_eq!(dial.dial_order(), ["wb"]);
        assert_eq!(dial.current_mode_index(), 0);
        assert!(dial.loader().schema().is_some());
        assert_eq!(
            drain(&mut rx),
            vec![DialEvent::ModeChanged {
                index: 0,
                mode_id: Some("wb".into())
            }]
        );
    }

    #[test]
    fn test_shipped_configuration_drives_the_dial() {
        let loader = ConfigLoader::load_defaults_from(env!("CARGO_MANIFEST_DIR"));
        let mut dial = ModeDial::from_loader(loader);
        let n = dial.dial_order().len();
        assert!(n > 0);

        for _ in 0..n {
            assert!(dial.current_mode().is_some());
            assert!(dial.current_state().current_display_value.is_some());
            dial.rotate_right_dial(1);
            dial.press_right_dial(PressType::Press);
            dial.rotate_left_dial(1);
        }
        assert_eq!(dial.current_mode_index(), 0);
    }

    #[test]
    fn test_helpers() {
        assert_eq!(wrap(0, -1, 3), 2);
        assert_eq!(wrap(2, 1, 3), 0);
        assert_eq!(wrap(1, -7, 3), 0);

        let range = RangeConfig {
            min: 5.0,
            max: 1.0,
            ..RangeConfig::default()
        };
        // Inverted bounds resolve to min instead of panicking.
        assert_eq!(step_range(&range, 3.0, 1.0), 5.0);
    }
}
