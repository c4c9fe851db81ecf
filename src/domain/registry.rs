//! Controller Session Registry
//!
//! Single source of truth for which controllers are attached, their latest
//! decoded readings and their DSU pad slots. Shared between the BLE event
//! bridge (writer) and the DSU server (reader).

use crate::domain::models::{ControllerState, PadSnapshot};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Number of pad slots the DSU protocol exposes.
pub const MAX_PADS: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("all {MAX_PADS} pad slots are occupied")]
    NoFreeSlot,
}

#[derive(Debug, Clone)]
struct Session {
    address: u64,
    state: ControllerState,
    battery_percent: Option<u8>,
}

/// Thread-safe 4-slot pad registry.
///
/// Cloning yields another handle to the same registry. A single mutex covers
/// every read-modify-write so the DSU server never observes a partially
/// applied update; no I/O happens while the lock is held.
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    slots: Arc<Mutex<[Option<Session>; MAX_PADS]>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the lowest free slot to `address`.
    ///
    /// Idempotent: re-attaching a known address returns its existing slot.
    /// Slot 0 is handed out first so a single controller always lands on the
    /// primary pad that slot-0-only clients poll.
    pub fn attach(&self, address: u64) -> Result<u8, RegistryError> {
        let mut slots = self.slots.lock().unwrap();

        if let Some(slot) = find_slot(&slots, address) {
            return Ok(slot as u8);
        }

        for (slot, entry) in slots.iter_mut().enumerate() {
            if entry.is_none() {
                *entry = Some(Session {
                    address,
                    state: ControllerState::default(),
                    battery_percent: None,
                });
                return Ok(slot as u8);
            }
        }

        Err(RegistryError::NoFreeSlot)
    }

    /// Free the slot held by `address`, if any.
    ///
    /// Subsequent queries for that slot return the inactive placeholder,
    /// never stale data from the previous occupant.
    pub fn detach(&self, address: u64) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = find_slot(&slots, address) {
            slots[slot] = None;
        }
    }

    /// Replace the latest reading for `address`. No history is kept; events
    /// for unknown addresses (racing a detach) are dropped.
    pub fn update_state(&self, address: u64, state: ControllerState) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = find_slot(&slots, address) {
            if let Some(session) = slots[slot].as_mut() {
                session.state = state;
            }
        }
    }

    /// Replace the last known battery level for `address`. Battery arrives
    /// on its own cadence, independent of sensor reports.
    pub fn update_battery(&self, address: u64, percent: u8) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = find_slot(&slots, address) {
            if let Some(session) = slots[slot].as_mut() {
                session.battery_percent = Some(percent);
            }
        }
    }

    /// Read-only snapshot of one slot. Out-of-range or unassigned slots
    /// yield the inactive placeholder.
    pub fn snapshot(&self, slot: u8) -> PadSnapshot {
        let slots = self.slots.lock().unwrap();
        snapshot_slot(&slots, slot)
    }

    /// Snapshot all four slots under a single lock acquisition.
    pub fn snapshot_all(&self) -> [PadSnapshot; MAX_PADS] {
        let slots = self.slots.lock().unwrap();
        std::array::from_fn(|slot| snapshot_slot(&slots, slot as u8))
    }
}

fn find_slot(slots: &[Option<Session>; MAX_PADS], address: u64) -> Option<usize> {
    slots
        .iter()
        .position(|s| s.as_ref().is_some_and(|s| s.address == address))
}

fn snapshot_slot(slots: &[Option<Session>; MAX_PADS], slot: u8) -> PadSnapshot {
    let session = slots.get(slot as usize).and_then(|s| s.as_ref());
    match session {
        Some(session) => PadSnapshot {
            slot,
            connected: true,
            address: session.address,
            state: session.state,
            battery_percent: session.battery_percent,
        },
        None => PadSnapshot::inactive(slot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_assigns_lowest_free_slot() {
        let registry = ControllerRegistry::new();
        assert_eq!(registry.attach(0xA1), Ok(0));
        assert_eq!(registry.attach(0xA2), Ok(1));
        registry.detach(0xA1);
        // slot 0 freed up and is reused before slot 2
        assert_eq!(registry.attach(0xA3), Ok(0));
    }

    #[test]
    fn attach_is_idempotent() {
        let registry = ControllerRegistry::new();
        assert_eq!(registry.attach(0xA1), Ok(0));
        assert_eq!(registry.attach(0xA2), Ok(1));
        assert_eq!(registry.attach(0xA1), Ok(0));
    }

    #[test]
    fn fifth_attach_fails_and_leaves_others_intact() {
        let registry = ControllerRegistry::new();
        for (i, addr) in [0xA1u64, 0xA2, 0xA3, 0xA4].iter().enumerate() {
            assert_eq!(registry.attach(*addr), Ok(i as u8));
        }
        assert_eq!(registry.attach(0xA5), Err(RegistryError::NoFreeSlot));

        for (i, addr) in [0xA1u64, 0xA2, 0xA3, 0xA4].iter().enumerate() {
            let snap = registry.snapshot(i as u8);
            assert!(snap.connected);
            assert_eq!(snap.address, *addr);
        }
    }

    #[test]
    fn detach_then_query_returns_inactive_placeholder() {
        let registry = ControllerRegistry::new();
        registry.attach(0xA1).unwrap();
        registry.update_state(
            0xA1,
            ControllerState {
                button_a: true,
                axis_x: 0.5,
                gyro_z: 12.0,
                ..Default::default()
            },
        );
        registry.update_battery(0xA1, 80);
        registry.detach(0xA1);

        let snap = registry.snapshot(0);
        assert_eq!(snap, PadSnapshot::inactive(0));
    }

    #[test]
    fn updates_for_unknown_address_are_dropped() {
        let registry = ControllerRegistry::new();
        registry.update_state(0xBEEF, ControllerState::default());
        registry.update_battery(0xBEEF, 50);
        assert_eq!(registry.snapshot(0), PadSnapshot::inactive(0));
    }

    #[test]
    fn state_and_battery_update_independently() {
        let registry = ControllerRegistry::new();
        registry.attach(0xA1).unwrap();

        registry.update_battery(0xA1, 65);
        let snap = registry.snapshot(0);
        assert_eq!(snap.battery_percent, Some(65));
        assert_eq!(snap.state, ControllerState::default());

        let state = ControllerState {
            axis_y: -1.0,
            ..Default::default()
        };
        registry.update_state(0xA1, state);
        let snap = registry.snapshot(0);
        assert_eq!(snap.state, state);
        assert_eq!(snap.battery_percent, Some(65));
    }

    #[test]
    fn out_of_range_slot_is_inactive() {
        let registry = ControllerRegistry::new();
        assert_eq!(registry.snapshot(7), PadSnapshot::inactive(7));
    }

    #[test]
    fn snapshot_all_covers_every_slot() {
        let registry = ControllerRegistry::new();
        registry.attach(0xA1).unwrap();
        registry.attach(0xA2).unwrap();

        let all = registry.snapshot_all();
        assert_eq!(all.len(), MAX_PADS);
        assert!(all[0].connected && all[1].connected);
        assert!(!all[2].connected && !all[3].connected);
        for (i, snap) in all.iter().enumerate() {
            assert_eq!(snap.slot, i as u8);
        }
    }
}
