//! # lifx-core
//!
//! Socket-free building blocks for talking to LIFX devices over the LAN
//! protocol: the binary codecs, the message type table, typed replies, and the
//! device directory used by discovery.
//!
//! The async transport and discovery live in `lifx-client`; everything here
//! is plain data and pure functions, so it can be tested without a network.
//!
//! # Architecture overview (for beginners)
//!
//! A LIFX packet is a fixed 36-byte header followed by a payload whose layout
//! depends on the message type.
//!
//! - **`protocol`** – How bytes travel over the network.  [`protocol::Payload`]
//!   reads and writes little-endian fields without ever failing on short
//!   input; [`protocol::codec`] adds and strips the header;
//!   [`protocol::response`] turns a decoded packet into a typed reply.
//!
//! - **`domain`** – What the client knows about devices: their hardware
//!   address, capability class, endpoint, and when they last answered.

pub mod domain;
pub mod protocol;

pub use domain::device::{DeviceClass, DeviceTarget, KnownDevice};
pub use domain::directory::DeviceDirectory;
pub use protocol::codec::{decode_packet, encode_packet, DecodedPacket, FrameError};
pub use protocol::messages::{FrameHeader, Hsbk, MacAddress, MessageType};
pub use protocol::response::{build_response, ExpectedResponse, NoReply, Response, ResponseBody};
