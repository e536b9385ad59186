//! LIFX LAN protocol constants, message type codes, and shared wire structures.
//!
//! All multi-byte integers on the wire are little-endian.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Well-known UDP port every LIFX device listens on.
pub const LIFX_PORT: u16 = 56700;

/// Total size of the frame header in bytes.
pub const HEADER_SIZE: usize = 36;

/// Origin 0, tagged 1, addressable 1, protocol 1024.
pub const PROTOCOL_TAG: u16 = 0x3400;

/// Width of every fixed-size string field (labels, location and group names).
pub const LABEL_SIZE: usize = 32;

/// Kelvin range accepted by lights. Enforced by callers, not by the codec.
pub const KELVIN_MIN: u16 = 2500;
pub const KELVIN_MAX: u16 = 9000;

/// Power level reported by devices that are on.
pub const POWER_ON: u16 = u16::MAX;

// ── Message type codes ────────────────────────────────────────────────────────

/// Every message type code the client knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum MessageType {
    // Device (2–59)
    DeviceGetService = 2,
    DeviceStateService = 3,
    DeviceGetTime = 4,
    DeviceSetTime = 5,
    DeviceStateTime = 6,
    DeviceGetHostInfo = 12,
    DeviceStateHostInfo = 13,
    DeviceGetHostFirmware = 14,
    DeviceStateHostFirmware = 15,
    DeviceGetWifiInfo = 16,
    DeviceStateWifiInfo = 17,
    DeviceGetWifiFirmware = 18,
    DeviceStateWifiFirmware = 19,
    DeviceGetPower = 20,
    DeviceSetPower = 21,
    DeviceStatePower = 22,
    DeviceGetLabel = 23,
    DeviceSetLabel = 24,
    DeviceStateLabel = 25,
    DeviceGetVersion = 32,
    DeviceStateVersion = 33,
    DeviceGetInfo = 34,
    DeviceStateInfo = 35,
    DeviceAcknowledgement = 45,
    DeviceGetLocation = 48,
    DeviceSetLocation = 49,
    DeviceStateLocation = 50,
    DeviceGetGroup = 51,
    DeviceSetGroup = 52,
    DeviceStateGroup = 53,
    DeviceEchoRequest = 58,
    DeviceEchoResponse = 59,
    // Light (101–119)
    LightGet = 101,
    LightSetColor = 102,
    LightSetWaveform = 103,
    LightSetBrightness = 104,
    LightState = 107,
    LightGetTemperature = 110,
    LightGetPower = 116,
    LightSetPower = 117,
    LightStatePower = 118,
    LightSetWaveformOptional = 119,
    // Infrared (120–122)
    InfraredGet = 120,
    InfraredState = 121,
    InfraredSet = 122,
    // Multizone (501–512)
    SetColorZones = 501,
    GetColorZones = 502,
    StateZone = 503,
    StateMultiZone = 506,
    SetExtendedColorZones = 510,
    GetExtendedColorZones = 511,
    StateExtendedColorZones = 512,
    // Tile (701–715)
    GetDeviceChain = 701,
    StateDeviceChain = 702,
    SetUserPosition = 703,
    GetTileState64 = 707,
    StateTileState64 = 711,
    SetTileState64 = 715,
    // Relay (816–818)
    GetRelayPower = 816,
    SetRelayPower = 817,
    StateRelayPower = 818,
}

impl MessageType {
    /// Returns the raw wire code.
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for MessageType {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, u16> {
        use MessageType::*;
        let ty = match value {
            2 => DeviceGetService,
            3 => DeviceStateService,
            4 => DeviceGetTime,
            5 => DeviceSetTime,
            6 => DeviceStateTime,
            12 => DeviceGetHostInfo,
            13 => DeviceStateHostInfo,
            14 => DeviceGetHostFirmware,
            15 => DeviceStateHostFirmware,
            16 => DeviceGetWifiInfo,
            17 => DeviceStateWifiInfo,
            18 => DeviceGetWifiFirmware,
            19 => DeviceStateWifiFirmware,
            20 => DeviceGetPower,
            21 => DeviceSetPower,
            22 => DeviceStatePower,
            23 => DeviceGetLabel,
            24 => DeviceSetLabel,
            25 => DeviceStateLabel,
            32 => DeviceGetVersion,
            33 => DeviceStateVersion,
            34 => DeviceGetInfo,
            35 => DeviceStateInfo,
            45 => DeviceAcknowledgement,
            48 => DeviceGetLocation,
            49 => DeviceSetLocation,
            50 => DeviceStateLocation,
            51 => DeviceGetGroup,
            52 => DeviceSetGroup,
            53 => DeviceStateGroup,
            58 => DeviceEchoRequest,
            59 => DeviceEchoResponse,
            101 => LightGet,
            102 => LightSetColor,
            103 => LightSetWaveform,
            104 => LightSetBrightness,
            107 => LightState,
            110 => LightGetTemperature,
            116 => LightGetPower,
            117 => LightSetPower,
            118 => LightStatePower,
            119 => LightSetWaveformOptional,
            120 => InfraredGet,
            121 => InfraredState,
            122 => InfraredSet,
            501 => SetColorZones,
            502 => GetColorZones,
            503 => StateZone,
            506 => StateMultiZone,
            510 => SetExtendedColorZones,
            511 => GetExtendedColorZones,
            512 => StateExtendedColorZones,
            701 => GetDeviceChain,
            702 => StateDeviceChain,
            703 => SetUserPosition,
            707 => GetTileState64,
            711 => StateTileState64,
            715 => SetTileState64,
            816 => GetRelayPower,
            817 => SetRelayPower,
            818 => StateRelayPower,
            other => return Err(other),
        };
        Ok(ty)
    }
}

// ── Color ─────────────────────────────────────────────────────────────────────

/// A device color in the native hue/saturation/brightness/kelvin form.
///
/// Hue spans the full `u16` range for 0–360°. Saturation and brightness use
/// the full `u16` range for 0–100 %.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Hsbk {
    pub hue: u16,
    pub saturation: u16,
    pub brightness: u16,
    pub kelvin: u16,
}

impl Hsbk {
    /// Encoded width on the wire.
    pub const WIRE_SIZE: usize = 8;

    pub const fn new(hue: u16, saturation: u16, brightness: u16, kelvin: u16) -> Self {
        Self {
            hue,
            saturation,
            brightness,
            kelvin,
        }
    }
}

// ── Hardware address ──────────────────────────────────────────────────────────

/// The 6-byte hardware (MAC) address that identifies a device.
///
/// On the wire it occupies the low 6 bytes of the 8-byte target field; the
/// top two bytes are zero. The all-zero address targets every device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Addresses all devices on the network.
    pub const BROADCAST: MacAddress = MacAddress([0; 6]);

    /// Expands to the 8-byte target field.
    pub fn to_target(self) -> [u8; 8] {
        let mut target = [0u8; 8];
        target[..6].copy_from_slice(&self.0);
        target
    }

    /// Takes the low 6 bytes of an 8-byte target field.
    pub fn from_target(target: [u8; 8]) -> Self {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&target[..6]);
        MacAddress(mac)
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

// ── Frame header ──────────────────────────────────────────────────────────────

/// The addressing and sequencing fields of a packet header.
///
/// `size`, the protocol tag, and the message type are not stored here: the
/// first two are derived at encode time and the message type travels beside
/// the header.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Identifies the requesting client. Zero means replies are broadcast and
    /// no reply routing is wanted.
    pub source: u32,
    /// Target device; [`MacAddress::BROADCAST`] addresses every device.
    pub target: MacAddress,
    pub ack_required: bool,
    pub res_required: bool,
    /// Client-assigned, echoed back by the device.
    pub sequence: u8,
    /// Nanoseconds since the Unix epoch; zero for client-originated messages.
    pub at_time: u64,
}

impl FrameHeader {
    /// Bit 0 of the flags byte.
    pub const RES_REQUIRED: u8 = 0x01;
    /// Bit 1 of the flags byte.
    pub const ACK_REQUIRED: u8 = 0x02;

    /// Header carrying only a source id, addressed to every device.
    pub fn with_source(source: u32) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    /// Packs the two request flags into the wire flags byte.
    pub fn flags(&self) -> u8 {
        let mut flags = 0u8;
        if self.res_required {
            flags |= Self::RES_REQUIRED;
        }
        if self.ack_required {
            flags |= Self::ACK_REQUIRED;
        }
        flags
    }

    /// Applies a wire flags byte to this header. Reserved bits are ignored.
    pub fn set_flags(&mut self, flags: u8) {
        self.res_required = flags & Self::RES_REQUIRED != 0;
        self.ack_required = flags & Self::ACK_REQUIRED != 0;
    }
}
