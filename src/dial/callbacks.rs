//! Outbound notifications of the mode dial.
//!
//! Three optional callback slots are invoked synchronously from inside the
//! gesture call that caused them. Keep them short, or hand the work off:
//! `DialCallbacks::forward_to` turns every notification into an owned
//! `DialEvent` on a Tokio channel that the host drains at its own pace.

use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use crate::config::{Bindings, ModeDefinition};
use crate::dial::state::ModeValue;

/// `(dial position, active mode)` after the active mode changed.
pub type ModeChangedFn = Box<dyn FnMut(usize, Option<&ModeDefinition>) + Send>;
/// `(mode id, old value, new value)`.
pub type ValueChangedFn = Box<dyn FnMut(&str, &ModeValue, &ModeValue) + Send>;
/// `(mode id, bindings, current value)`.
pub type BindingTriggeredFn = Box<dyn FnMut(&str, &Bindings, &ModeValue) + Send>;

/// Callback registrations. Unset slots are skipped.
#[derive(Default)]
pub struct DialCallbacks {
    pub(crate) on_mode_changed: Option<ModeChangedFn>,
    pub(crate) on_value_changed: Option<ValueChangedFn>,
    pub(crate) on_binding_triggered: Option<BindingTriggeredFn>,
}

impl DialCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_mode_changed<F>(mut self, f: F) -> Self
    where
        F: FnMut(usize, Option<&ModeDefinition>) + Send + 'static,
    {
        self.on_mode_changed = Some(Box::new(f));
        self
    }

    pub fn on_value_changed<F>(mut self, f: F) -> Self
    where
        F: FnMut(&str, &ModeValue, &ModeValue) + Send + 'static,
    {
        self.on_value_changed = Some(Box::new(f));
        self
    }

    pub fn on_binding_triggered<F>(mut self, f: F) -> Self
    where
        F: FnMut(&str, &Bindings, &ModeValue) + Send + 'static,
    {
        self.on_binding_triggered = Some(Box::new(f));
        self
    }

    /// Register all three slots to send `DialEvent`s on `sender`.
    ///
    /// A closed receiver is ignored; the dial keeps running.
    pub fn forward_to(sender: UnboundedSender<DialEvent>) -> Self {
        let modes = sender.clone();
        let values = sender.clone();
        let bindings = sender;

        Self::new()
            .on_mode_changed(move |index, mode| {
                let event = DialEvent::ModeChanged {
                    index,
                    mode_id: mode.map(|m| m.id.clone()),
                };
                if modes.send(event).is_err() {
                    trace!(target: "modedial::dial", "Event receiver dropped");
                }
            })
            .on_value_changed(move |mode_id, old, new| {
                let event = DialEvent::ValueChanged {
                    mode_id: mode_id.to_string(),
                    old: *old,
                    new: *new,
                };
                if values.send(event).is_err() {
                    trace!(target: "modedial::dial", "Event receiver dropped");
                }
            })
            .on_binding_triggered(move |mode_id, b, value| {
                let event = DialEvent::BindingTriggered {
                    mode_id: mode_id.to_string(),
                    bindings: b.clone(),
                    value: *value,
                };
                if bindings.send(event).is_err() {
                    trace!(target: "modedial::dial", "Event receiver dropped");
                }
            })
    }

    /// Move every slot set in `other` into `self`, keeping the rest.
    pub(crate) fn merge(&mut self, other: DialCallbacks) {
        if other.on_mode_changed.is_some() {
            self.on_mode_changed = other.on_mode_changed;
        }
        if other.on_value_changed.is_some() {
            self.on_value_changed = other.on_value_changed;
        }
        if other.on_binding_triggered.is_some() {
            self.on_binding_triggered = other.on_binding_triggered;
        }
    }
}

impl fmt::Debug for DialCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialCallbacks")
            .field("on_mode_changed", &self.on_mode_changed.is_some())
            .field("on_value_changed", &self.on_value_changed.is_some())
            .field("on_binding_triggered", &self.on_binding_triggered.is_some())
            .finish()
    }
}

/// Owned form of a dial notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DialEvent {
    #[serde(rename_all = "camelCase")]
    ModeChanged {
        index: usize,
        mode_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ValueChanged {
        mode_id: String,
        old: ModeValue,
        new: ModeValue,
    },
    #[serde(rename_all = "camelCase")]
    BindingTriggered {
        mode_id: String,
        bindings: Bindings,
        value: ModeValue,
    },
}
