//! Sequential, bounds-safe reader/writer over a payload byte buffer.
//!
//! # Why reads never fail (for beginners)
//!
//! Devices from different firmware generations send payloads of slightly
//! different lengths for the same message type.  Rather than rejecting a reply
//! because a trailing field is missing, every read that would run past the end
//! of the buffer returns the type's zero value, moves the cursor to the end,
//! and remembers that an *underrun* happened.  The typed response built from
//! the payload then carries a `partial` flag instead of an error.
//!
//! Writing is append-only; reading only ever moves the cursor.

use tracing::debug;

use crate::protocol::messages::Hsbk;

// ── Wire scalars ──────────────────────────────────────────────────────────────

/// A fixed-width little-endian primitive that can be read from or written to
/// a [`Payload`].
pub trait WireScalar: Copy + Default {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Decodes from exactly [`Self::WIDTH`] bytes.
    fn decode_le(bytes: &[u8]) -> Self;

    /// Appends the little-endian encoding to `buf`.
    fn encode_le(self, buf: &mut Vec<u8>);
}

macro_rules! impl_wire_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WireScalar for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn decode_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::WIDTH]);
                    <$ty>::from_le_bytes(raw)
                }

                fn encode_le(self, buf: &mut Vec<u8>) {
                    buf.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_wire_scalar!(u8, u16, i16, u32, i32, u64, i64, f32);

// ── Payload ───────────────────────────────────────────────────────────────────

/// A byte buffer paired with a read cursor.
///
/// Invariant: `cursor <= data.len()` at all times.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    data: Vec<u8>,
    cursor: usize,
    underrun: bool,
}

impl Payload {
    /// Creates an empty payload ready for writing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty payload with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Wraps received bytes for reading, cursor at 0.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            data: bytes.into(),
            ..Self::default()
        }
    }

    // ── Reading ───────────────────────────────────────────────────────────

    /// Reads one little-endian scalar.
    ///
    /// On underrun returns `T::default()` and moves the cursor to the end.
    pub fn read<T: WireScalar>(&mut self) -> T {
        match self.take(T::WIDTH) {
            Some(bytes) => T::decode_le(bytes),
            None => T::default(),
        }
    }

    /// Reads `len` raw bytes. Returns an empty vector on underrun.
    pub fn read_bytes(&mut self, len: usize) -> Vec<u8> {
        self.take(len).map(<[u8]>::to_vec).unwrap_or_default()
    }

    /// Reads a fixed-size byte array. Returns all zeros on underrun.
    pub fn read_array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        if let Some(bytes) = self.take(N) {
            out.copy_from_slice(bytes);
        }
        out
    }

    /// Reads a fixed-width string field of `len` bytes.
    ///
    /// The text ends at the first NUL; anything after it is ignored.
    /// Invalid UTF-8 is replaced.
    pub fn read_string(&mut self, len: usize) -> String {
        match self.take(len) {
            Some(bytes) => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                String::from_utf8_lossy(&bytes[..end]).into_owned()
            }
            None => String::new(),
        }
    }

    /// Reads hue, saturation, brightness, kelvin in that order.
    pub fn read_color(&mut self) -> Hsbk {
        Hsbk {
            hue: self.read(),
            saturation: self.read(),
            brightness: self.read(),
            kelvin: self.read(),
        }
    }

    fn take(&mut self, len: usize) -> Option<&[u8]> {
        let available = self.remaining();
        if len > available {
            debug!(
                needed = len,
                available,
                position = self.cursor,
                "payload underrun, returning default"
            );
            self.cursor = self.data.len();
            self.underrun = true;
            return None;
        }
        let start = self.cursor;
        self.cursor += len;
        Some(&self.data[start..self.cursor])
    }

    // ── Writing ───────────────────────────────────────────────────────────

    /// Appends one little-endian scalar.
    pub fn write<T: WireScalar>(&mut self, value: T) {
        value.encode_le(&mut self.data);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Appends `len` zero bytes (reserved fields).
    pub fn write_zeros(&mut self, len: usize) {
        self.data.resize(self.data.len() + len, 0);
    }

    /// Appends `text` as a fixed-width field: truncated to `width` bytes on a
    /// character boundary, then zero-padded.
    pub fn write_fixed_string(&mut self, text: &str, width: usize) {
        let mut end = text.len().min(width);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        self.write_bytes(&text.as_bytes()[..end]);
        self.write_zeros(width - end);
    }

    pub fn write_color(&mut self, color: Hsbk) {
        self.write(color.hue);
        self.write(color.saturation);
        self.write(color.brightness);
        self.write(color.kelvin);
    }

    // ── Cursor control ────────────────────────────────────────────────────

    /// `true` while unread bytes remain.
    pub fn has_more(&self) -> bool {
        self.cursor < self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Moves the cursor back by `len` bytes, stopping at 0.
    pub fn rewind(&mut self, len: usize) {
        self.cursor = self.cursor.saturating_sub(len);
    }

    /// Skips `len` bytes. Skipping past the end counts as an underrun.
    pub fn advance(&mut self, len: usize) {
        let _ = self.take(len);
    }

    /// Moves the cursor back to the start and clears the underrun flag.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.underrun = false;
    }

    /// `true` if any read or skip ran past the end of the buffer.
    pub fn is_underrun(&self) -> bool {
        self.underrun
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_are_little_endian() {
        // Arrange
        let mut payload = Payload::new();
        payload.write(0x1234u16);
        payload.write(0xDEADBEEFu32);
        payload.write(-2i16);

        // Assert
        assert_eq!(
            payload.as_bytes(),
            &[0x34, 0x12, 0xEF, 0xBE, 0xAD, 0xDE, 0xFE, 0xFF]
        );
    }

    #[test]
    fn test_reads_advance_by_type_width() {
        // Arrange
        let mut writer = Payload::new();
        writer.write(7u8);
        writer.write(65_000u16);
        writer.write(-5i64);
        writer.write(1.5f32);
        let mut reader = Payload::from_bytes(writer.into_bytes());

        // Act / Assert
        assert_eq!(reader.read::<u8>(), 7);
        assert_eq!(reader.position(), 1);
        assert_eq!(reader.read::<u16>(), 65_000);
        assert_eq!(reader.position(), 3);
        assert_eq!(reader.read::<i64>(), -5);
        assert_eq!(reader.position(), 11);
        assert_eq!(reader.read::<f32>(), 1.5);
        assert!(!reader.has_more());
        assert!(!reader.is_underrun());
    }

    #[test]
    fn test_read_past_end_returns_default_and_moves_to_end() {
        // Arrange
        let mut payload = Payload::from_bytes(vec![0xAA, 0xBB, 0xCC]);

        // Act
        let value: u32 = payload.read();

        // Assert
        assert_eq!(value, 0);
        assert_eq!(payload.position(), 3);
        assert!(payload.is_underrun());
        assert!(!payload.has_more());
    }

    #[test]
    fn test_every_scalar_type_survives_an_empty_buffer() {
        let mut payload = Payload::new();
        assert_eq!(payload.read::<u8>(), 0);
        assert_eq!(payload.read::<u16>(), 0);
        assert_eq!(payload.read::<i16>(), 0);
        assert_eq!(payload.read::<u32>(), 0);
        assert_eq!(payload.read::<u64>(), 0);
        assert_eq!(payload.read::<i64>(), 0);
        assert_eq!(payload.read::<f32>(), 0.0);
        assert_eq!(payload.read_color(), Hsbk::default());
        assert_eq!(payload.read_string(32), "");
        assert!(payload.read_bytes(4).is_empty());
        assert_eq!(payload.position(), 0);
    }

    #[test]
    fn test_read_succeeds_when_exactly_enough_bytes_remain() {
        let mut payload = Payload::from_bytes(vec![1, 0]);
        assert_eq!(payload.read::<u16>(), 1);
        assert!(!payload.is_underrun());
    }

    #[test]
    fn test_color_field_order() {
        // Arrange
        let color = Hsbk::new(1, 2, 3, 3500);
        let mut payload = Payload::new();

        // Act
        payload.write_color(color);

        // Assert
        assert_eq!(payload.as_bytes(), &[1, 0, 2, 0, 3, 0, 0xAC, 0x0D]);
        assert_eq!(Payload::from_bytes(payload.into_bytes()).read_color(), color);
    }

    #[test]
    fn test_fixed_string_is_zero_padded_and_trimmed_on_read() {
        // Arrange
        let mut payload = Payload::new();

        // Act
        payload.write_fixed_string("Kitchen", 32);

        // Assert
        assert_eq!(payload.len(), 32);
        assert_eq!(&payload.as_bytes()[..7], b"Kitchen");
        assert!(payload.as_bytes()[7..].iter().all(|&b| b == 0));
        assert_eq!(Payload::from_bytes(payload.into_bytes()).read_string(32), "Kitchen");
    }

    #[test]
    fn test_string_stops_at_first_nul() {
        // Arrange: stale bytes from an older, longer label follow the terminator.
        let mut field = b"Lamp\0junk".to_vec();
        field.resize(32, 0);
        let mut payload = Payload::from_bytes(field);

        // Act
        let label = payload.read_string(32);

        // Assert
        assert_eq!(label, "Lamp");
        assert!(!payload.has_more());
    }

    #[test]
    fn test_fixed_string_truncates_on_char_boundary() {
        // "é" is two bytes, so a 4-byte field holds "aé" plus one byte of padding.
        let mut payload = Payload::new();
        payload.write_fixed_string("aéé", 4);
        assert_eq!(payload.as_bytes(), &[b'a', 0xC3, 0xA9, 0]);
    }

    #[test]
    fn test_rewind_advance_reset() {
        // Arrange
        let mut payload = Payload::from_bytes(vec![1, 2, 3, 4]);

        // Act / Assert
        payload.advance(2);
        assert_eq!(payload.read::<u8>(), 3);
        payload.rewind(2);
        assert_eq!(payload.read::<u8>(), 2);
        payload.rewind(10);
        assert_eq!(payload.position(), 0);
        payload.advance(10);
        assert_eq!(payload.position(), 4);
        assert!(payload.is_underrun());
        payload.reset();
        assert_eq!(payload.position(), 0);
        assert!(!payload.is_underrun());
        assert_eq!(payload.read::<u8>(), 1);
    }
}
