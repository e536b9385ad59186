//! Known devices and how to address them.

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::protocol::messages::MacAddress;

/// Product ids reported by multizone light strips.
const MULTIZONE_PRODUCTS: &[u32] = &[31, 32, 38];
/// Product ids reported by tile chains.
const TILE_PRODUCTS: &[u32] = &[55];
/// Product ids reported by relay switches.
const SWITCH_PRODUCTS: &[u32] = &[70];

/// What a device can do, inferred from its product id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceClass {
    /// A single-zone bulb. Also the fallback for unrecognised products.
    #[default]
    Light,
    MultiZoneStrip,
    TileGroup,
    Switch,
}

impl DeviceClass {
    /// Classifies a product id from a StateVersion reply.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lifx_core::DeviceClass;
    ///
    /// assert_eq!(DeviceClass::from_product_id(32), DeviceClass::MultiZoneStrip);
    /// assert_eq!(DeviceClass::from_product_id(1), DeviceClass::Light);
    /// ```
    pub fn from_product_id(product: u32) -> Self {
        if MULTIZONE_PRODUCTS.contains(&product) {
            DeviceClass::MultiZoneStrip
        } else if TILE_PRODUCTS.contains(&product) {
            DeviceClass::TileGroup
        } else if SWITCH_PRODUCTS.contains(&product) {
            DeviceClass::Switch
        } else {
            DeviceClass::Light
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceClass::Light => "light",
            DeviceClass::MultiZoneStrip => "multizone strip",
            DeviceClass::TileGroup => "tile group",
            DeviceClass::Switch => "switch",
        };
        f.write_str(name)
    }
}

/// A device seen answering discovery probes.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownDevice {
    pub mac: MacAddress,
    /// Where the last probe reply came from.
    pub endpoint: SocketAddr,
    pub class: DeviceClass,
    /// Set when the device was classified with a version query.
    pub product_id: Option<u32>,
    /// Service id from StateService (1 = UDP).
    pub service: u8,
    /// Port from StateService.
    pub service_port: u32,
    pub last_seen: Instant,
}

impl KnownDevice {
    /// A freshly discovered device, classified as a basic light until told
    /// otherwise.
    pub fn new(mac: MacAddress, endpoint: SocketAddr, seen_at: Instant) -> Self {
        Self {
            mac,
            endpoint,
            class: DeviceClass::Light,
            product_id: None,
            service: 1,
            service_port: u32::from(endpoint.port()),
            last_seen: seen_at,
        }
    }

    /// Records the product id and the class derived from it.
    pub fn with_product(mut self, product_id: u32) -> Self {
        self.product_id = Some(product_id);
        self.class = DeviceClass::from_product_id(product_id);
        self
    }

    pub fn target(&self) -> DeviceTarget {
        DeviceTarget::new(self.endpoint, self.mac)
    }
}

/// Where to send a request: an endpoint plus the device's hardware address.
///
/// Build one by hand to talk to a device without running discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceTarget {
    pub endpoint: SocketAddr,
    pub mac: MacAddress,
}

impl DeviceTarget {
    pub fn new(endpoint: SocketAddr, mac: MacAddress) -> Self {
        Self { endpoint, mac }
    }
}

impl From<&KnownDevice> for DeviceTarget {
    fn from(device: &KnownDevice) -> Self {
        device.target()
    }
}

impl From<KnownDevice> for DeviceTarget {
    fn from(device: KnownDevice) -> Self {
        device.target()
    }
}
