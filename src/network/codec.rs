//! Wire framing of [`NetworkMessage`]
//!
//! Fixed 28-byte layout, all integers big-endian:
//!
//! | offset | size | field       |
//! |--------|------|-------------|
//! | 0      | 2    | magic `"LS"`|
//! | 2      | 1    | version     |
//! | 3      | 1    | hops        |
//! | 4      | 6    | originator  |
//! | 10     | 6    | sender      |
//! | 16     | 4    | precedence  |
//! | 20     | 4    | pattern     |
//! | 24     | 4    | elapsed ms (signed) |
//!
//! Bytes past the end of the frame are ignored.

use core::fmt;

use super::{DeviceId, NetworkMessage};
use crate::pattern::PatternId;

const MAGIC: [u8; 2] = *b"LS";
pub const PROTOCOL_VERSION: u8 = 1;
pub const FRAME_LEN: usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer than [`FRAME_LEN`] bytes
    TooShort(usize),
    /// The frame does not start with the protocol magic
    BadMagic,
    /// Frame from another protocol version
    UnsupportedVersion(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort(len) => write!(f, "frame too short: {len} < {FRAME_LEN} bytes"),
            Self::BadMagic => f.write_str("bad frame magic"),
            Self::UnsupportedVersion(version) => {
                write!(f, "unsupported protocol version {version}")
            }
        }
    }
}

impl core::error::Error for DecodeError {}

pub fn encode(message: &NetworkMessage) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0..2].copy_from_slice(&MAGIC);
    frame[2] = PROTOCOL_VERSION;
    frame[3] = message.hops;
    frame[4..10].copy_from_slice(&message.originator.to_bytes());
    frame[10..16].copy_from_slice(&message.sender.to_bytes());
    frame[16..20].copy_from_slice(&message.precedence.to_be_bytes());
    frame[20..24].copy_from_slice(&message.pattern.raw().to_be_bytes());
    frame[24..28].copy_from_slice(&message.elapsed_ms.to_be_bytes());
    frame
}

pub fn decode(bytes: &[u8]) -> Result<NetworkMessage, DecodeError> {
    let Some(frame) = bytes.first_chunk::<FRAME_LEN>() else {
        return Err(DecodeError::TooShort(bytes.len()));
    };
    if frame[0..2] != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    if frame[2] != PROTOCOL_VERSION {
        return Err(DecodeError::UnsupportedVersion(frame[2]));
    }

    let mut originator = [0u8; 6];
    originator.copy_from_slice(&frame[4..10]);
    let mut sender = [0u8; 6];
    sender.copy_from_slice(&frame[10..16]);
    let word = |offset: usize| [frame[offset], frame[offset + 1], frame[offset + 2], frame[offset + 3]];

    Ok(NetworkMessage {
        originator: DeviceId::new(originator),
        sender: DeviceId::new(sender),
        precedence: u32::from_be_bytes(word(16)),
        pattern: PatternId::from_raw(u32::from_be_bytes(word(20))),
        elapsed_ms: i32::from_be_bytes(word(24)),
        hops: frame[3],
    })
}
