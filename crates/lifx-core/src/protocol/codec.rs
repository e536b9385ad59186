//! Frame codec: the fixed 36-byte packet header plus raw payload.
//!
//! Wire format (all integers little-endian):
//! ```text
//! offset  size  field
//!      0     2  size (header + payload)
//!      2     2  protocol tag (0x3400)
//!      4     4  source id
//!      8     8  target (6-byte MAC + 2 zero bytes)
//!     16     6  reserved
//!     22     1  flags (bit0 res_required, bit1 ack_required)
//!     23     1  sequence
//!     24     8  at_time (ns since epoch, 0 if unset)
//!     32     2  message type
//!     34     2  reserved
//!     36     N  payload
//! ```
//! The layout must match device firmware byte for byte.

use thiserror::Error;

use crate::protocol::messages::{FrameHeader, MacAddress, HEADER_SIZE, PROTOCOL_TAG};
use crate::protocol::payload::Payload;

/// Errors produced while framing or unframing a packet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Datagram (or its declared size) is shorter than the header.
    #[error("packet too short: {size} bytes, header needs {}", HEADER_SIZE)]
    Undersized { size: usize },

    /// The size field disagrees with the number of bytes received.
    #[error("packet size mismatch: header says {declared}, datagram has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Header plus payload does not fit the 16-bit size field.
    #[error("payload of {len} bytes does not fit in a single packet")]
    PayloadTooLarge { len: usize },
}

/// A datagram split back into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPacket {
    pub header: FrameHeader,
    /// Raw type code; unknown codes are kept so the dispatcher can report them.
    pub message_type: u16,
    pub payload: Vec<u8>,
}

impl DecodedPacket {
    /// Source id echoed by the device, the correlation key of the reply.
    pub fn source(&self) -> u32 {
        self.header.source
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Builds a complete wire packet from a header, a type code, and payload bytes.
///
/// # Errors
///
/// Returns [`FrameError::PayloadTooLarge`] if the packet would exceed
/// `u16::MAX` bytes.
///
/// # Examples
///
/// ```rust
/// use lifx_core::protocol::codec::{decode_packet, encode_packet};
/// use lifx_core::protocol::messages::FrameHeader;
///
/// let header = FrameHeader::with_source(42);
/// let bytes = encode_packet(&header, 2, &[]).unwrap();
/// assert_eq!(bytes.len(), 36);
/// let decoded = decode_packet(&bytes).unwrap();
/// assert_eq!(decoded.header, header);
/// assert_eq!(decoded.message_type, 2);
/// ```
pub fn encode_packet(
    header: &FrameHeader,
    message_type: u16,
    payload: &[u8],
) -> Result<Vec<u8>, FrameError> {
    let total = HEADER_SIZE + payload.len();
    let size = u16::try_from(total).map_err(|_| FrameError::PayloadTooLarge {
        len: payload.len(),
    })?;

    let mut buf = Payload::with_capacity(total);
    buf.write(size);
    buf.write(PROTOCOL_TAG);
    buf.write(header.source);
    buf.write_bytes(&header.target.to_target());
    buf.write_zeros(6);
    buf.write(header.flags());
    buf.write(header.sequence);
    buf.write(header.at_time);
    buf.write(message_type);
    buf.write_zeros(2);
    buf.write_bytes(payload);

    Ok(buf.into_bytes())
}

/// Parses a raw datagram into header, message type, and payload.
///
/// The protocol tag is read but not checked; devices set the tagged and
/// origin bits differently in replies.
///
/// # Errors
///
/// - [`FrameError::Undersized`] if fewer than 36 bytes arrived or the size
///   field is below 36.
/// - [`FrameError::LengthMismatch`] if the size field differs from the
///   datagram length.
pub fn decode_packet(bytes: &[u8]) -> Result<DecodedPacket, FrameError> {
    if bytes.len() < HEADER_SIZE {
        return Err(FrameError::Undersized { size: bytes.len() });
    }

    let mut reader = Payload::from_bytes(&bytes[..HEADER_SIZE]);
    let declared = usize::from(reader.read::<u16>());
    if declared < HEADER_SIZE {
        return Err(FrameError::Undersized { size: declared });
    }
    if declared != bytes.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }

    let _protocol_tag: u16 = reader.read();
    let source: u32 = reader.read();
    let target = MacAddress::from_target(reader.read_array::<8>());
    reader.advance(6);
    let flags: u8 = reader.read();
    let sequence: u8 = reader.read();
    let at_time: u64 = reader.read();
    let message_type: u16 = reader.read();

    let mut header = FrameHeader {
        source,
        target,
        sequence,
        at_time,
        ..FrameHeader::default()
    };
    header.set_flags(flags);

    Ok(DecodedPacket {
        header,
        message_type,
        payload: bytes[HEADER_SIZE..].to_vec(),
    })
}
