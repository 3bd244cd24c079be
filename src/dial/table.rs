use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::config::ModeDefinition;
use crate::dial::state::ModeValue;

/// One compiled mode: a top-level mode or a member of a group.
#[derive(Debug, Clone)]
pub(crate) struct ModeEntry {
    pub def: ModeDefinition,
    /// Entry indices of the members, for a top-level group.
    pub members: Vec<usize>,
    /// Entry index of the owning group, for a group member.
    pub group: Option<usize>,
}

/// Flat two-level view of the configured modes.
///
/// Top-level modes and their group members live side by side in `entries`;
/// runtime values are stored in a parallel vector indexed the same way.
/// Only one level of grouping is resolved: a group nested inside a group
/// is compiled as a plain member and never descended into.
#[derive(Debug, Clone, Default)]
pub(crate) struct ModeTable {
    entries: Vec<ModeEntry>,
    ids: HashMap<String, usize>,
    dial_order: Vec<String>,
    /// Entry index of each dial position; `None` for ids with no top-level mode.
    slots: Vec<Option<usize>>,
}

impl ModeTable {
    pub fn compile(dial_order: &[String], modes: &[ModeDefinition]) -> Self {
        let mut table = ModeTable {
            dial_order: dial_order.to_vec(),
            ..Self::default()
        };
        let mut top_level = HashMap::new();

        for mode in modes {
            let idx = table.push(mode.clone(), None);
            top_level.entry(mode.id.clone()).or_insert(idx);

            for member in mode.members() {
                if member.is_group() {
                    warn!(
                        target: "modedial::dial",
                        group = %mode.id, member = %member.id,
                        "Nested group is not descended into"
                    );
                }
                let member_idx = table.push(member.clone(), Some(idx));
                table.entries[idx].members.push(member_idx);
            }
        }

        table.slots = dial_order
            .iter()
            .map(|id| {
                let slot = top_level.get(id).copied();
                if slot.is_none() {
                    warn!(target: "modedial::dial", id = %id, "dialOrder entry has no top-level mode");
                }
                slot
            })
            .collect();

        table
    }

    fn push(&mut self, def: ModeDefinition, group: Option<usize>) -> usize {
        let idx = self.entries.len();
        match self.ids.entry(def.id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(idx);
            }
            Entry::Occupied(_) => {
                warn!(target: "modedial::dial", id = %def.id, "Duplicate mode id; lookups use the first");
            }
        }
        self.entries.push(ModeEntry {
            def,
            members: Vec::new(),
            group,
        });
        idx
    }

    pub fn entry(&self, idx: usize) -> &ModeEntry {
        &self.entries[idx]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.ids.get(id).copied()
    }

    pub fn dial_order(&self) -> &[String] {
        &self.dial_order
    }

    /// Top-level entry at a dial position.
    pub fn slot(&self, position: usize) -> Option<usize> {
        self.slots.get(position).copied().flatten()
    }

    /// The entry receiving input for top-level entry `top`: the selected
    /// member when `top` is a group with a member at its stored index.
    pub fn resolve(&self, top: usize, values: &[ModeValue]) -> usize {
        let entry = &self.entries[top];
        values[top]
            .as_index()
            .and_then(|sub| entry.members.get(sub).copied())
            .unwrap_or(top)
    }

    /// `slot` followed by `resolve`.
    pub fn active(&self, position: usize, values: &[ModeValue]) -> Option<usize> {
        self.slot(position).map(|top| self.resolve(top, values))
    }

    /// Initial value of every entry.
    pub fn defaults(&self) -> Vec<ModeValue> {
        self.entries
            .iter()
            .map(|e| ModeValue::default_for(&e.def.kind))
            .collect()
    }

    /// Values keyed by mode id. With duplicate ids the first entry wins.
    pub fn value_map(&self, values: &[ModeValue]) -> BTreeMap<String, ModeValue> {
        self.ids
            .iter()
            .map(|(id, &idx)| (id.clone(), values[idx]))
            .collect()
    }
}
