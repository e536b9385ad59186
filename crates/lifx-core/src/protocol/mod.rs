//! Protocol module: payload and frame codecs, message types, typed responses.

pub mod args;
pub mod codec;
pub mod messages;
pub mod payload;
pub mod response;
pub mod sequence;

pub use args::{encode_args, Arg};
pub use codec::{decode_packet, encode_packet, DecodedPacket, FrameError};
pub use messages::*;
pub use payload::{Payload, WireScalar};
pub use response::{build_response, ExpectedResponse, NoReply, Response, ResponseBody};
pub use sequence::{SequenceCounter, SourceIdAllocator};
