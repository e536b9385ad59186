//! The directory of known devices, keyed by hardware address.
//!
//! # Liveness (for beginners)
//!
//! UDP gives no "connection closed" signal, so a device is considered gone
//! when it has not answered a discovery probe for longer than the *staleness
//! window*.  Discovery calls [`DeviceDirectory::sweep_stale`] once per probe
//! round; every device it returns gets exactly one "lost" notification.  If
//! that device answers again later it is a brand-new entry and gets a fresh
//! "discovered" notification.
//!
//! Time is passed in by the caller rather than read from the clock, so tests
//! can move time forward without waiting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::domain::device::KnownDevice;
use crate::protocol::messages::MacAddress;

/// Live devices keyed by hardware address.
#[derive(Debug, Clone, Default)]
pub struct DeviceDirectory {
    devices: HashMap<MacAddress, KnownDevice>,
}

impl DeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a known device as seen at `now`, moving it to `endpoint` if it
    /// changed address.
    ///
    /// Returns `false` if `mac` is not in the directory.
    pub fn refresh(&mut self, mac: &MacAddress, endpoint: SocketAddr, now: Instant) -> bool {
        let Some(device) = self.devices.get_mut(mac) else {
            return false;
        };
        if device.endpoint != endpoint {
            debug!(%mac, old = %device.endpoint, new = %endpoint, "device endpoint changed");
            device.endpoint = endpoint;
        }
        device.last_seen = now;
        true
    }

    /// Adds or replaces a device. Returns the previous entry, if any.
    pub fn insert(&mut self, device: KnownDevice) -> Option<KnownDevice> {
        self.devices.insert(device.mac, device)
    }

    pub fn remove(&mut self, mac: &MacAddress) -> Option<KnownDevice> {
        self.devices.remove(mac)
    }

    pub fn get(&self, mac: &MacAddress) -> Option<&KnownDevice> {
        self.devices.get(mac)
    }

    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.devices.contains_key(mac)
    }

    /// Removes and returns every device last seen more than `window` before
    /// `now`.
    pub fn sweep_stale(&mut self, now: Instant, window: Duration) -> Vec<KnownDevice> {
        let stale: Vec<MacAddress> = self
            .devices
            .values()
            .filter(|d| now.saturating_duration_since(d.last_seen) > window)
            .map(|d| d.mac)
            .collect();

        let mut removed: Vec<KnownDevice> = stale
            .iter()
            .filter_map(|mac| self.devices.remove(mac))
            .collect();
        removed.sort_by_key(|d| d.mac);
        removed
    }

    /// Snapshot of every device, ordered by hardware address.
    pub fn devices(&self) -> Vec<KnownDevice> {
        let mut all: Vec<KnownDevice> = self.devices.values().cloned().collect();
        all.sort_by_key(|d| d.mac);
        all
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
