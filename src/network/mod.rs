//! Transport-independent networking
//!
//! Concrete transports (UDP multicast, BLE, ...) live outside the crate and
//! plug in through the [`Network`] trait. The crate owns the message model
//! and its framing ([`codec`]), plus transport adapters that hand messages
//! across execution contexts ([`NetworkLink`], [`SharedNetwork`]).

pub mod codec;
mod loopback;
mod shared;
#[cfg(feature = "std")]
pub mod worker;

use core::fmt;

use embassy_time::Instant;
use heapless::Vec;

pub use codec::{DecodeError, FRAME_LEN, decode, encode};
pub use loopback::{LoopbackBus, LoopbackNetwork};
pub use shared::{NetworkLink, SharedNetwork};

use crate::pattern::PatternId;

/// Maximum number of messages returned by one poll
pub const INBOX_CAPACITY: usize = 16;

/// Messages collected by [`Network::poll_received`]
pub type Inbox = Vec<ReceivedMessage, INBOX_CAPACITY>;

/// Unique hardware identifier of a device (a MAC address on most boards).
///
/// Ordered numerically, which breaks precedence ties.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DeviceId([u8; 6]);

impl DeviceId {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Build from the low 48 bits of `value`
    pub const fn from_u64(value: u64) -> Self {
        let b = value.to_be_bytes();
        Self([b[2], b[3], b[4], b[5], b[6], b[7]])
    }

    pub const fn to_bytes(self) -> [u8; 6] {
        self.0
    }

    pub const fn as_u64(self) -> u64 {
        let b = self.0;
        u64::from_be_bytes([0, 0, b[0], b[1], b[2], b[3], b[4], b[5]])
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Connectivity of one transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NetworkStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl NetworkStatus {
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

/// State a device broadcasts about the pattern it plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetworkMessage {
    /// Device whose pattern this is
    pub originator: DeviceId,
    /// Device that transmitted this copy (differs from `originator` when
    /// relayed)
    pub sender: DeviceId,
    /// Arbitration value of the originator
    pub precedence: u32,
    pub pattern: PatternId,
    /// Milliseconds since the pattern started, as seen by the sender
    pub elapsed_ms: i32,
    /// Number of relays between the originator and the sender
    pub hops: u8,
}

/// A message stamped with its local receipt time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message: NetworkMessage,
    pub received_at: Instant,
}

/// Uniform interface over one transport.
///
/// None of these calls may block: a transport doing blocking I/O runs it
/// elsewhere (see [`SharedNetwork`]).
pub trait Network {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Identifier this transport sends as
    fn local_device_id(&self) -> DeviceId;

    /// Whether our own broadcasts come back through `poll_received`
    fn should_echo(&self) -> bool;

    /// Move toward the `wanted` status and report the current one.
    ///
    /// Failures show up as `Connecting` or `Disconnected`, never as errors;
    /// the player calls this every tick, which doubles as the retry loop.
    fn update(&mut self, wanted: NetworkStatus, now: Instant) -> NetworkStatus;

    /// Queue one message for transmission. Best effort.
    fn try_send(&mut self, message: &NetworkMessage);

    /// Append messages received since the last poll to `inbox`
    fn poll_received(&mut self, now: Instant, inbox: &mut Inbox);
}
