//! Wire protocol definitions
//!
//! Two protocols share the listener port (selected at startup):
//!
//! - **Command**: back-to-back bincode records `[action: u8 | payload]`, each
//!   self-delimiting through the serialization format. No acknowledgement.
//! - **Raw**: back-to-back records of exactly `3 × pixels` bytes, one R,G,B
//!   triple per pixel in index order.

use bincode::Options;
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Cursor, ErrorKind};
use std::str::FromStr;
use thiserror::Error;

use crate::animation::AnimationSpec;
use crate::constants::{BYTES_PER_PIXEL, MAX_RECORD_BYTES};
use crate::error::ProtocolError;

/// Command action tags
pub const ACTION_SET_PIXELS: u8 = 0;
pub const ACTION_CLEAR: u8 = 1;
pub const ACTION_QUEUE_ANIMATIONS: u8 = 2;

/// One RGB pixel value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Pixel {
    pub const BLACK: Pixel = Pixel { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Wire order: R, G, B
    pub const fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }
}

/// Returned when a color string is not `RRGGBB` hex
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color {0:?}, expected RRGGBB hex")]
pub struct ParsePixelError(String);

/// Parses `RRGGBB`, with or without a leading `#`
impl FromStr for Pixel {
    type Err = ParsePixelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParsePixelError(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ParsePixelError(s.to_string()))
        };
        Ok(Pixel::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Pixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// A decoded command, ready for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Command<A = AnimationSpec> {
    /// Write pixel `i` from element `i`
    SetPixels(Vec<Pixel>),
    /// Black out the strand and drop every running animation
    Clear,
    /// Append animations to the running list
    QueueAnimations(Vec<A>),
}

impl<A> Command<A> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetPixels(_) => "set_pixels",
            Self::Clear => "clear",
            Self::QueueAnimations(_) => "queue_animations",
        }
    }
}

/// Payload half of a wire record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Empty,
    Pixels(Vec<Pixel>),
    Animations(Vec<AnimationSpec>),
}

impl Payload {
    fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Pixels(_) => "pixel",
            Self::Animations(_) => "animation",
        }
    }
}

/// Command as it travels on the wire: an action tag and an open payload
///
/// The tag and payload are independent on the wire, so a record may claim one
/// action while carrying another action's payload. [`Command::try_from`]
/// rejects such records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCommand {
    pub action: u8,
    pub payload: Payload,
}

impl TryFrom<WireCommand> for Command {
    type Error = ProtocolError;

    fn try_from(wire: WireCommand) -> Result<Self, Self::Error> {
        match (wire.action, wire.payload) {
            (ACTION_SET_PIXELS, Payload::Pixels(pixels)) => Ok(Command::SetPixels(pixels)),
            // Clear carries nothing; whatever payload came along is ignored
            (ACTION_CLEAR, _) => Ok(Command::Clear),
            (ACTION_QUEUE_ANIMATIONS, Payload::Animations(animations)) => {
                Ok(Command::QueueAnimations(animations))
            }
            (action @ (ACTION_SET_PIXELS | ACTION_QUEUE_ANIMATIONS), payload) => {
                Err(ProtocolError::Malformed {
                    action,
                    payload: payload.kind(),
                })
            }
            (action, _) => Err(ProtocolError::UnknownAction(action)),
        }
    }
}

impl From<Command> for WireCommand {
    fn from(command: Command) -> Self {
        match command {
            Command::SetPixels(pixels) => WireCommand {
                action: ACTION_SET_PIXELS,
                payload: Payload::Pixels(pixels),
            },
            Command::Clear => WireCommand {
                action: ACTION_CLEAR,
                payload: Payload::Empty,
            },
            Command::QueueAnimations(animations) => WireCommand {
                action: ACTION_QUEUE_ANIMATIONS,
                payload: Payload::Animations(animations),
            },
        }
    }
}

/// Bincode settings shared by encoder and decoder
fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .allow_trailing_bytes()
        .with_limit(MAX_RECORD_BYTES)
}

/// Serialize one wire record
pub fn encode_record(record: &WireCommand) -> Result<Vec<u8>, ProtocolError> {
    Ok(wire_options().serialize(record)?)
}

/// Serialize one command
pub fn encode_command(command: Command) -> Result<Vec<u8>, ProtocolError> {
    encode_record(&WireCommand::from(command))
}

/// Incremental decoder for the command stream
///
/// Bytes are appended to a caller-owned buffer; each call to [`decode`] either
/// consumes exactly one record, reports that more bytes are needed, or fails.
///
/// [`decode`]: CommandDecoder::decode
#[derive(Debug, Default)]
pub struct CommandDecoder {
    records_decoded: u64,
}

impl CommandDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take one record off the front of `buf`
    ///
    /// Returns `Ok(None)` when `buf` holds only a prefix of a record.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<WireCommand>, ProtocolError> {
        if buf.is_empty() {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&buf[..]);
        match wire_options().deserialize_from::<_, WireCommand>(&mut cursor) {
            Ok(record) => {
                let consumed = cursor.position() as usize;
                buf.advance(consumed);
                self.records_decoded += 1;
                Ok(Some(record))
            }
            Err(err) => match *err {
                bincode::ErrorKind::Io(ref io) if io.kind() == ErrorKind::UnexpectedEof => {
                    if buf.len() as u64 >= MAX_RECORD_BYTES {
                        Err(ProtocolError::TooLarge(MAX_RECORD_BYTES))
                    } else {
                        Ok(None)
                    }
                }
                bincode::ErrorKind::SizeLimit => Err(ProtocolError::TooLarge(MAX_RECORD_BYTES)),
                _ => Err(ProtocolError::Decode(err)),
            },
        }
    }

    /// Records successfully framed so far
    pub fn records_decoded(&self) -> u64 {
        self.records_decoded
    }
}

/// A full-strand frame from the raw protocol
///
/// Only constructible with exactly `3 × pixel_count` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    data: Bytes,
}

impl RawFrame {
    /// Byte length of a frame for `pixel_count` pixels
    pub const fn frame_len(pixel_count: usize) -> usize {
        pixel_count * BYTES_PER_PIXEL
    }

    /// Wrap `data` if it is exactly one frame long
    pub fn new(data: Bytes, pixel_count: usize) -> Option<Self> {
        (data.len() == Self::frame_len(pixel_count)).then_some(Self { data })
    }

    /// Number of pixels carried
    pub fn pixel_count(&self) -> usize {
        self.data.len() / BYTES_PER_PIXEL
    }

    /// Pixels in index order
    pub fn pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
        self.data
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|c| Pixel::from_bytes([c[0], c[1], c[2]]))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::AnimationSpec;

    fn red() -> Pixel {
        Pixel::new(255, 0, 0)
    }

    #[test]
    fn test_decode_back_to_back_records() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_command(Command::SetPixels(vec![red(), Pixel::BLACK])).unwrap());
        buf.extend_from_slice(&encode_command(Command::Clear).unwrap());

        let mut decoder = CommandDecoder::new();
        let first = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            Command::try_from(first).unwrap(),
            Command::SetPixels(vec![red(), Pixel::BLACK])
        );

        let second = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(Command::try_from(second).unwrap(), Command::Clear);

        assert!(buf.is_empty());
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert_eq!(decoder.records_decoded(), 2);
    }

    #[test]
    fn test_decode_partial_record_waits() {
        let bytes = encode_command(Command::SetPixels(vec![red(); 4])).unwrap();
        let mut decoder = CommandDecoder::new();

        let mut buf = BytesMut::from(&bytes[..bytes.len() - 1]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        // Nothing consumed while waiting
        assert_eq!(buf.len(), bytes.len() - 1);

        buf.extend_from_slice(&bytes[bytes.len() - 1..]);
        assert!(decoder.decode(&mut buf).unwrap().is_some());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_garbage_is_error() {
        // Action byte followed by an out-of-range payload variant
        let mut buf = BytesMut::from(&[0u8, 0xff, 0xff, 0xff, 0xff][..]);
        let err = CommandDecoder::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_decode_oversized_record() {
        // SetPixels claiming u64::MAX pixels, followed by more bytes than the limit
        let mut bytes = vec![ACTION_SET_PIXELS];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());

        let mut decoder = CommandDecoder::new();
        let mut buf = BytesMut::from(&bytes[..]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&vec![0u8; MAX_RECORD_BYTES as usize]);
        let err = decoder.decode(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::TooLarge(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_mismatched_payload_is_malformed() {
        let wire = WireCommand {
            action: ACTION_SET_PIXELS,
            payload: Payload::Animations(vec![AnimationSpec::Fill { color: red() }]),
        };
        let err = Command::try_from(wire).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Malformed {
                action: ACTION_SET_PIXELS,
                payload: "animation"
            }
        ));
        assert!(err.is_recoverable());

        let wire = WireCommand {
            action: ACTION_QUEUE_ANIMATIONS,
            payload: Payload::Empty,
        };
        assert!(Command::try_from(wire).is_err());
    }

    #[test]
    fn test_clear_ignores_payload() {
        let wire = WireCommand {
            action: ACTION_CLEAR,
            payload: Payload::Pixels(vec![red()]),
        };
        assert_eq!(Command::try_from(wire).unwrap(), Command::Clear);
    }

    #[test]
    fn test_unknown_action() {
        let wire = WireCommand {
            action: 7,
            payload: Payload::Empty,
        };
        assert!(matches!(
            Command::try_from(wire),
            Err(ProtocolError::UnknownAction(7))
        ));
    }

    #[test]
    fn test_pixel_hex() {
        assert_eq!("ff8000".parse::<Pixel>().unwrap(), Pixel::new(255, 128, 0));
        assert_eq!("#0000FF".parse::<Pixel>().unwrap(), Pixel::new(0, 0, 255));
        assert!("fff".parse::<Pixel>().is_err());
        assert!("gg0000".parse::<Pixel>().is_err());
        assert!("+f0000".parse::<Pixel>().is_err());
        assert_eq!(Pixel::new(1, 171, 255).to_string(), "#01abff");
    }

    #[test]
    fn test_raw_frame_requires_exact_length() {
        assert!(RawFrame::new(Bytes::from_static(&[1, 2, 3, 4, 5, 6]), 2).is_some());
        assert!(RawFrame::new(Bytes::from_static(&[1, 2, 3, 4, 5]), 2).is_none());
        assert!(RawFrame::new(Bytes::from_static(&[1, 2, 3, 4, 5, 6, 7, 8, 9]), 2).is_none());

        let frame = RawFrame::new(Bytes::from_static(&[1, 2, 3, 4, 5, 6]), 2).unwrap();
        let pixels: Vec<_> = frame.pixels().collect();
        assert_eq!(pixels, vec![Pixel::new(1, 2, 3), Pixel::new(4, 5, 6)]);
        assert_eq!(frame.pixel_count(), 2);
    }
}
