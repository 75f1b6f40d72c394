//! Reservation registry shared by all control connections

use dronedesk_shared::{ClaimOutcome, ConnectionId, DeviceId, Reservations};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Tracks which connection controls which drone.
///
/// One lock guards the whole map. The fleet is small and every critical
/// section is a single map operation, so there is nothing to gain from
/// per-drone locking. The lock is synchronous so a release can run from
/// `Drop` on any exit path.
#[derive(Debug, Default)]
pub struct ReservationRegistry {
    /// Map of device_id -> holding connection
    entries: Mutex<HashMap<DeviceId, ConnectionId>>,
}

impl ReservationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder of a drone
    pub fn holder(&self, device: &DeviceId) -> Option<ConnectionId> {
        self.entries.lock().get(device).copied()
    }

    /// Number of reserved drones
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of all reservations, sorted by device id
    pub fn snapshot(&self) -> Vec<(DeviceId, ConnectionId)> {
        let mut entries: Vec<_> = self
            .entries
            .lock()
            .iter()
            .map(|(device, holder)| (device.clone(), *holder))
            .collect();
        entries.sort();
        entries
    }
}

impl Reservations for ReservationRegistry {
    fn try_acquire(&self, device: &DeviceId, holder: ConnectionId) -> ClaimOutcome {
        let mut entries = self.entries.lock();
        match entries.get(device) {
            None => {
                entries.insert(device.clone(), holder);
                ClaimOutcome::Acquired
            }
            Some(current) if *current == holder => ClaimOutcome::AlreadyHeldBySelf,
            Some(current) => ClaimOutcome::AlreadyHeldByOther(*current),
        }
    }

    fn release(&self, device: &DeviceId, holder: ConnectionId) -> bool {
        let mut entries = self.entries.lock();
        if entries.get(device) == Some(&holder) {
            entries.remove(device);
            true
        } else {
            false
        }
    }
}
