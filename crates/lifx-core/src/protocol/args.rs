//! Semantically typed request arguments.
//!
//! Operation builders describe a request payload as an ordered list of
//! [`Arg`] values; [`encode_args`] lays them out with the payload writer.

use serde::{Deserialize, Serialize};

use crate::protocol::messages::{Hsbk, LABEL_SIZE};
use crate::protocol::payload::Payload;

/// One field of a request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Arg {
    U8(u8),
    U16(u16),
    I16(i16),
    U32(u32),
    U64(u64),
    F32(f32),
    /// Raw bytes copied verbatim.
    Bytes(Vec<u8>),
    /// UTF-8 text in a fixed 32-byte field, truncated or zero-padded.
    Label(String),
    Color(Hsbk),
    /// `n` zero bytes.
    Reserved(usize),
}

impl Arg {
    /// Encoded width of this argument.
    pub fn wire_len(&self) -> usize {
        match self {
            Arg::U8(_) => 1,
            Arg::U16(_) | Arg::I16(_) => 2,
            Arg::U32(_) | Arg::F32(_) => 4,
            Arg::U64(_) => 8,
            Arg::Bytes(bytes) => bytes.len(),
            Arg::Label(_) => LABEL_SIZE,
            Arg::Color(_) => Hsbk::WIRE_SIZE,
            Arg::Reserved(n) => *n,
        }
    }

    /// Appends this argument to `payload`.
    pub fn write_to(&self, payload: &mut Payload) {
        match self {
            Arg::U8(v) => payload.write(*v),
            Arg::U16(v) => payload.write(*v),
            Arg::I16(v) => payload.write(*v),
            Arg::U32(v) => payload.write(*v),
            Arg::U64(v) => payload.write(*v),
            Arg::F32(v) => payload.write(*v),
            Arg::Bytes(bytes) => payload.write_bytes(bytes),
            Arg::Label(text) => payload.write_fixed_string(text, LABEL_SIZE),
            Arg::Color(color) => payload.write_color(*color),
            Arg::Reserved(n) => payload.write_zeros(*n),
        }
    }
}

macro_rules! impl_arg_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::$variant(value)
                }
            }
        )*
    };
}

impl_arg_from!(
    u8 => U8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    Hsbk => Color,
    Vec<u8> => Bytes,
);

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Label(value.to_string())
    }
}

/// Encodes an argument list into payload bytes, in order.
pub fn encode_args(args: &[Arg]) -> Vec<u8> {
    let mut payload = Payload::with_capacity(args.iter().map(Arg::wire_len).sum());
    for arg in args {
        arg.write_to(&mut payload);
    }
    payload.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_color_arguments_are_thirteen_bytes() {
        // Arrange
        let args = [
            Arg::Reserved(1),
            Arg::Color(Hsbk::new(0, 65535, 65535, 3500)),
            Arg::U32(0),
        ];

        // Act
        let bytes = encode_args(&args);

        // Assert
        assert_eq!(bytes.len(), 13);
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..9], &[0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xAC, 0x0D]);
    }

    #[test]
    fn test_label_is_fixed_width() {
        let short = encode_args(&[Arg::from("Desk")]);
        let long = encode_args(&[Arg::Label("x".repeat(40))]);
        assert_eq!(short.len(), LABEL_SIZE);
        assert_eq!(long.len(), LABEL_SIZE);
        assert_eq!(&short[..4], b"Desk");
        assert!(short[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_wire_len_matches_encoded_len() {
        let args = vec![
            Arg::from(1u8),
            Arg::from(2u16),
            Arg::from(-3i16),
            Arg::from(4u32),
            Arg::from(5u64),
            Arg::from(0.5f32),
            Arg::from(vec![1, 2, 3]),
            Arg::from("label"),
            Arg::from(Hsbk::default()),
            Arg::Reserved(2),
        ];
        let expected: usize = args.iter().map(Arg::wire_len).sum();
        assert_eq!(encode_args(&args).len(), expected);
    }
}
