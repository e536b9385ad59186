//! Message dispatcher: turns a decoded packet into a typed [`Response`].
//!
//! Every known reply type has a body struct whose fields are parsed eagerly,
//! in wire order, by [`build_response`].  Anything else, including request
//! types overheard from other clients on the same port, becomes
//! [`ResponseBody::Unknown`] with the raw payload kept.
//!
//! Parsing never fails.  Short payloads produce default field values and set
//! [`Response::partial`].

use serde::{Deserialize, Serialize};

use crate::protocol::codec::DecodedPacket;
use crate::protocol::messages::{FrameHeader, Hsbk, MessageType, LABEL_SIZE};
use crate::protocol::payload::Payload;

/// Most colors a single StateMultiZone reply carries.
pub const MULTIZONE_COLORS_MAX: usize = 8;
/// Most colors a single StateExtendedColorZones reply carries.
pub const EXTENDED_COLORS_MAX: usize = 82;
/// Tile records in every StateDeviceChain reply.
pub const DEVICE_CHAIN_TILES_MAX: usize = 16;
/// Colors in every StateTileState64 reply.
pub const TILE_STATE_COLORS: usize = 64;

// ── Envelope ──────────────────────────────────────────────────────────────────

/// A reply received from a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The header the reply arrived with.
    pub header: FrameHeader,
    /// Raw message type code.
    pub message_type: u16,
    /// Source id echoed by the device.
    pub source: u32,
    /// `true` if the payload was too short for at least one field.
    pub partial: bool,
    pub body: ResponseBody,
}

impl Response {
    /// Dispatches a decoded datagram.
    pub fn from_packet(packet: DecodedPacket) -> Self {
        let source = packet.header.source;
        let mut payload = Payload::from_bytes(packet.payload);
        build_response(packet.header, packet.message_type, source, &mut payload)
    }

    /// The message type, if the code is one the client knows.
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::try_from(self.message_type).ok()
    }

    pub fn is_service_announcement(&self) -> bool {
        matches!(self.body, ResponseBody::StateService(_))
    }
}

/// One case per reply type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseBody {
    Acknowledgement(Acknowledgement),
    StateService(StateService),
    StateHostInfo(StateHostInfo),
    StateHostFirmware(StateHostFirmware),
    StateWifiInfo(StateWifiInfo),
    StateWifiFirmware(StateWifiFirmware),
    StatePower(StatePower),
    StateLabel(StateLabel),
    StateVersion(StateVersion),
    StateInfo(StateInfo),
    StateLocation(StateLocation),
    StateGroup(StateGroup),
    EchoResponse(EchoResponse),
    LightState(LightState),
    LightStatePower(LightStatePower),
    InfraredState(InfraredState),
    StateZone(StateZone),
    StateMultiZone(StateMultiZone),
    StateExtendedColorZones(StateExtendedColorZones),
    StateDeviceChain(StateDeviceChain),
    StateTileState64(StateTileState64),
    StateRelayPower(StateRelayPower),
    /// Type code not handled here; nothing is parsed.
    Unknown { payload: Vec<u8> },
}

// ── Body types ────────────────────────────────────────────────────────────────

/// Empty reply to a request sent with `ack_required`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Acknowledgement;

/// Reply to a discovery probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateService {
    /// 1 = UDP.
    pub service: u8,
    pub port: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StateHostInfo {
    /// Radio receive signal strength in milliwatts.
    pub signal: f32,
    pub tx: u32,
    pub rx: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StateWifiInfo {
    pub signal: f32,
    pub tx: u32,
    pub rx: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateHostFirmware {
    /// Build timestamp, ns since epoch.
    pub build: u64,
    /// Major in the high 16 bits, minor in the low 16 bits.
    pub version: u32,
}

impl StateHostFirmware {
    pub fn major(&self) -> u16 {
        (self.version >> 16) as u16
    }

    pub fn minor(&self) -> u16 {
        (self.version & 0xFFFF) as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateWifiFirmware {
    pub build: u64,
    pub minor: u16,
    pub major: u16,
}

/// Device power level: 0 is off, 65535 is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatePower {
    pub level: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateLabel {
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateVersion {
    pub vendor: u32,
    pub product: u32,
    pub version: u32,
}

/// Times in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateInfo {
    pub time: i64,
    pub uptime: i64,
    pub downtime: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateLocation {
    pub location: [u8; 16],
    pub label: String,
    pub updated_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateGroup {
    pub group: [u8; 16],
    pub label: String,
    pub updated_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EchoResponse {
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LightState {
    pub color: Hsbk,
    pub power: u16,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LightStatePower {
    pub level: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InfraredState {
    pub brightness: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateZone {
    /// Total zones on the device.
    pub count: u8,
    pub index: u8,
    pub color: Hsbk,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateMultiZone {
    pub count: u8,
    /// Zone the first color belongs to.
    pub index: u8,
    pub colors: Vec<Hsbk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateExtendedColorZones {
    pub count: u16,
    pub index: u16,
    pub colors: Vec<Hsbk>,
}

/// One tile in a device chain.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Tile {
    pub accel_x: i16,
    pub accel_y: i16,
    pub accel_z: i16,
    pub user_x: f32,
    pub user_y: f32,
    pub width: u8,
    pub height: u8,
    pub vendor: u32,
    pub product: u32,
    pub version: u32,
    pub firmware_build: u64,
    pub firmware_minor: u16,
    pub firmware_major: u16,
}

impl Tile {
    /// Encoded width of one tile record.
    pub const WIRE_SIZE: usize = 55;

    fn read_from(p: &mut Payload) -> Self {
        let accel_x = p.read();
        let accel_y = p.read();
        let accel_z = p.read();
        p.advance(2);
        let user_x = p.read();
        let user_y = p.read();
        let width = p.read();
        let height = p.read();
        p.advance(1);
        let vendor = p.read();
        let product = p.read();
        let version = p.read();
        let firmware_build = p.read();
        p.advance(8);
        let firmware_minor = p.read();
        let firmware_major = p.read();
        p.advance(4);
        Self {
            accel_x,
            accel_y,
            accel_z,
            user_x,
            user_y,
            width,
            height,
            vendor,
            product,
            version,
            firmware_build,
            firmware_minor,
            firmware_major,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateDeviceChain {
    pub start_index: u8,
    /// Every tile slot present in the reply, valid or not.
    pub tiles: Vec<Tile>,
    pub total_count: u8,
}

impl StateDeviceChain {
    /// The tiles that are actually attached.
    pub fn active_tiles(&self) -> &[Tile] {
        let n = usize::from(self.total_count).min(self.tiles.len());
        &self.tiles[..n]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateTileState64 {
    pub tile_index: u8,
    pub x: u8,
    pub y: u8,
    pub width: u8,
    pub colors: Vec<Hsbk>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateRelayPower {
    pub relay_index: u8,
    pub level: u16,
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Builds a typed response from a payload.
///
/// The payload cursor is reset to 0 afterwards so the same buffer can be
/// parsed again.
pub fn build_response(
    header: FrameHeader,
    message_type: u16,
    source: u32,
    payload: &mut Payload,
) -> Response {
    payload.reset();
    let body = MessageType::try_from(message_type)
        .ok()
        .and_then(|ty| parse_body(ty, payload))
        .unwrap_or_else(|| ResponseBody::Unknown {
            payload: payload.as_bytes().to_vec(),
        });
    let partial = payload.is_underrun();
    payload.reset();

    Response {
        header,
        message_type,
        source,
        partial,
        body,
    }
}

fn parse_body(ty: MessageType, p: &mut Payload) -> Option<ResponseBody> {
    use MessageType as M;
    use ResponseBody as B;

    let body = match ty {
        M::DeviceAcknowledgement => B::Acknowledgement(Acknowledgement),
        M::DeviceStateService => B::StateService(StateService {
            service: p.read(),
            port: p.read(),
        }),
        M::DeviceStateHostInfo => B::StateHostInfo(StateHostInfo {
            signal: p.read(),
            tx: p.read(),
            rx: p.read(),
        }),
        M::DeviceStateWifiInfo => B::StateWifiInfo(StateWifiInfo {
            signal: p.read(),
            tx: p.read(),
            rx: p.read(),
        }),
        M::DeviceStateHostFirmware => {
            let build = p.read();
            p.advance(8);
            B::StateHostFirmware(StateHostFirmware {
                build,
                version: p.read(),
            })
        }
        M::DeviceStateWifiFirmware => {
            let build = p.read();
            p.advance(8);
            B::StateWifiFirmware(StateWifiFirmware {
                build,
                minor: p.read(),
                major: p.read(),
            })
        }
        M::DeviceStatePower => B::StatePower(StatePower { level: p.read() }),
        M::DeviceStateLabel => B::StateLabel(StateLabel {
            label: p.read_string(LABEL_SIZE),
        }),
        M::DeviceStateVersion => B::StateVersion(StateVersion {
            vendor: p.read(),
            product: p.read(),
            version: p.read(),
        }),
        M::DeviceStateInfo => B::StateInfo(StateInfo {
            time: p.read(),
            uptime: p.read(),
            downtime: p.read(),
        }),
        M::DeviceStateLocation => B::StateLocation(StateLocation {
            location: p.read_array(),
            label: p.read_string(LABEL_SIZE),
            updated_at: p.read(),
        }),
        M::DeviceStateGroup => B::StateGroup(StateGroup {
            group: p.read_array(),
            label: p.read_string(LABEL_SIZE),
            updated_at: p.read(),
        }),
        M::DeviceEchoResponse => B::EchoResponse(EchoResponse {
            payload: p.read_bytes(p.remaining()),
        }),
        M::LightState => {
            let color = p.read_color();
            p.advance(2);
            let power = p.read();
            let label = p.read_string(LABEL_SIZE);
            p.advance(8);
            B::LightState(LightState {
                color,
                power,
                label,
            })
        }
        M::LightStatePower => B::LightStatePower(LightStatePower { level: p.read() }),
        M::InfraredState => B::InfraredState(InfraredState {
            brightness: p.read(),
        }),
        M::StateZone => B::StateZone(StateZone {
            count: p.read(),
            index: p.read(),
            color: p.read_color(),
        }),
        M::StateMultiZone => {
            let count = p.read();
            let index = p.read();
            let mut colors = Vec::with_capacity(MULTIZONE_COLORS_MAX);
            while p.has_more() && colors.len() < MULTIZONE_COLORS_MAX {
                colors.push(p.read_color());
            }
            B::StateMultiZone(StateMultiZone {
                count,
                index,
                colors,
            })
        }
        M::StateExtendedColorZones => {
            let count = p.read();
            let index = p.read();
            let declared = usize::from(p.read::<u8>()).min(EXTENDED_COLORS_MAX);
            let mut colors = Vec::with_capacity(declared);
            while p.has_more() && colors.len() < declared {
                colors.push(p.read_color());
            }
            B::StateExtendedColorZones(StateExtendedColorZones {
                count,
                index,
                colors,
            })
        }
        M::StateDeviceChain => {
            let start_index = p.read();
            let mut tiles = Vec::new();
            // The trailing total_count byte follows the tile records.
            while p.remaining() > Tile::WIRE_SIZE && tiles.len() < DEVICE_CHAIN_TILES_MAX {
                tiles.push(Tile::read_from(p));
            }
            let total_count = p.read();
            B::StateDeviceChain(StateDeviceChain {
                start_index,
                tiles,
                total_count,
            })
        }
        M::StateTileState64 => {
            let tile_index = p.read();
            p.advance(1);
            let x = p.read();
            let y = p.read();
            let width = p.read();
            let colors = (0..TILE_STATE_COLORS).map(|_| p.read_color()).collect();
            B::StateTileState64(StateTileState64 {
                tile_index,
                x,
                y,
                width,
                colors,
            })
        }
        M::StateRelayPower => B::StateRelayPower(StateRelayPower {
            relay_index: p.read(),
            level: p.read(),
        }),
        _ => return None,
    };
    Some(body)
}

// ── Typed extraction ──────────────────────────────────────────────────────────

/// A reply type a caller can wait for.
///
/// The transport uses [`matches`](Self::matches) to decide whether an incoming
/// reply resolves a pending request, then [`from_response`](Self::from_response)
/// to hand the caller its typed value.
pub trait ExpectedResponse: Sized + Send + 'static {
    /// `false` for fire-and-forget requests that never wait.
    const AWAITS_REPLY: bool = true;

    fn matches(response: &Response) -> bool;

    fn from_response(response: Response) -> Option<Self>;

    /// The value handed back when the request is sent without waiting.
    fn without_reply() -> Option<Self> {
        None
    }
}

/// Sentinel for requests that send and return without waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoReply;

impl ExpectedResponse for NoReply {
    const AWAITS_REPLY: bool = false;

    fn matches(_: &Response) -> bool {
        false
    }

    fn from_response(_: Response) -> Option<Self> {
        None
    }

    fn without_reply() -> Option<Self> {
        Some(NoReply)
    }
}

/// Accepts any recognised reply and returns the whole envelope.
impl ExpectedResponse for Response {
    fn matches(response: &Response) -> bool {
        !matches!(response.body, ResponseBody::Unknown { .. })
    }

    fn from_response(response: Response) -> Option<Self> {
        Some(response)
    }
}

macro_rules! impl_expected_response {
    ($($body:ident),* $(,)?) => {
        $(
            impl ExpectedResponse for $body {
                fn matches(response: &Response) -> bool {
                    matches!(response.body, ResponseBody::$body(_))
                }

                fn from_response(response: Response) -> Option<Self> {
                    match response.body {
                        ResponseBody::$body(body) => Some(body),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_expected_response!(
    Acknowledgement,
    StateService,
    StateHostInfo,
    StateHostFirmware,
    StateWifiInfo,
    StateWifiFirmware,
    StatePower,
    StateLabel,
    StateVersion,
    StateInfo,
    StateLocation,
    StateGroup,
    EchoResponse,
    LightState,
    LightStatePower,
    InfraredState,
    StateZone,
    StateMultiZone,
    StateExtendedColorZones,
    StateDeviceChain,
    StateTileState64,
    StateRelayPower,
);
