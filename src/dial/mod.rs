//! The dual-dial state machine.
//!
//! - `state_machine`: `ModeDial`, gesture handling and snapshots
//! - `state`: runtime values and the `DialState` snapshot
//! - `callbacks`: callback slots and the `DialEvent` channel adapter
//! - `table`: compiled lookup table over the configured modes

pub mod callbacks;
pub mod state;
pub mod state_machine;
mod table;

pub use callbacks::{
    BindingTriggeredFn, DialCallbacks, DialEvent, ModeChangedFn, ValueChangedFn,
};
pub use state::{DialState, ModeValue, SNAPSHOT_VERSION, SubModeFrame};
pub use state_machine::ModeDial;
