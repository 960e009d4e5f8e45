use core::cell::RefCell;

use critical_section::Mutex;
use embassy_time::Instant;
use heapless::{Deque, Vec};

use super::codec;
use super::{DeviceId, Inbox, Network, NetworkMessage, NetworkStatus, ReceivedMessage};

/// Largest raw frame the bus carries
const MAX_FRAME: usize = 64;

type RawFrame = Vec<u8, MAX_FRAME>;

struct BusState<const SIZE: usize> {
    frames: Deque<(u32, RawFrame), SIZE>,
    next_sequence: u32,
}

/// In-memory broadcast medium.
///
/// Every frame sent by any attached [`LoopbackNetwork`] is seen by all of
/// them, including the sender. The bus keeps the last `SIZE` frames; slow
/// readers silently miss older ones, like a lossy radio.
pub struct LoopbackBus<const SIZE: usize> {
    state: Mutex<RefCell<BusState<SIZE>>>,
}

impl<const SIZE: usize> LoopbackBus<SIZE> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(BusState {
                frames: Deque::new(),
                next_sequence: 0,
            })),
        }
    }

    /// Attach a device to the bus
    pub fn attach(&self, device_id: DeviceId) -> LoopbackNetwork<'_, SIZE> {
        let cursor = critical_section::with(|cs| self.state.borrow(cs).borrow().next_sequence);
        LoopbackNetwork {
            bus: self,
            device_id,
            cursor,
            status: NetworkStatus::Disconnected,
        }
    }

    /// Put raw bytes on the bus, as a misbehaving peer might.
    ///
    /// Frames longer than the bus limit are truncated.
    pub fn broadcast_raw(&self, bytes: &[u8]) {
        let mut frame = RawFrame::new();
        let len = bytes.len().min(MAX_FRAME);
        // `len` fits the capacity.
        let _ = frame.extend_from_slice(&bytes[..len]);
        critical_section::with(|cs| {
            let mut state = self.state.borrow(cs).borrow_mut();
            if state.frames.is_full() {
                state.frames.pop_front();
            }
            let sequence = state.next_sequence;
            state.next_sequence = sequence.wrapping_add(1);
            let _ = state.frames.push_back((sequence, frame));
        });
    }

    /// Put an encoded message on the bus
    pub fn broadcast(&self, message: &NetworkMessage) {
        self.broadcast_raw(&codec::encode(message));
    }

    /// Number of frames ever sent on the bus
    pub fn sent_count(&self) -> u32 {
        critical_section::with(|cs| self.state.borrow(cs).borrow().next_sequence)
    }
}

impl<const SIZE: usize> Default for LoopbackBus<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

/// One device's endpoint on a [`LoopbackBus`].
pub struct LoopbackNetwork<'a, const SIZE: usize> {
    bus: &'a LoopbackBus<SIZE>,
    device_id: DeviceId,
    cursor: u32,
    status: NetworkStatus,
}

impl<const SIZE: usize> LoopbackNetwork<'_, SIZE> {
    /// Force a status, simulating a link failure
    pub fn set_status(&mut self, status: NetworkStatus) {
        self.status = status;
    }
}

impl<const SIZE: usize> Network for LoopbackNetwork<'_, SIZE> {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn local_device_id(&self) -> DeviceId {
        self.device_id
    }

    fn should_echo(&self) -> bool {
        true
    }

    fn update(&mut self, wanted: NetworkStatus, _now: Instant) -> NetworkStatus {
        // The bus is always reachable, so any request is honoured at once.
        self.status = wanted;
        self.status
    }

    fn try_send(&mut self, message: &NetworkMessage) {
        if self.status.is_connected() {
            self.bus.broadcast(message);
        }
    }

    fn poll_received(&mut self, now: Instant, inbox: &mut Inbox) {
        if !self.status.is_connected() {
            return;
        }
        critical_section::with(|cs| {
            let state = self.bus.state.borrow(cs).borrow();
            for (sequence, frame) in &state.frames {
                if sequence.wrapping_sub(self.cursor) >= 0x8000_0000 {
                    continue;
                }
                if inbox.is_full() {
                    return;
                }
                self.cursor = sequence.wrapping_add(1);
                match codec::decode(frame) {
                    Ok(message) => {
                        let _ = inbox.push(ReceivedMessage {
                            message,
                            received_at: now,
                        });
                    }
                    Err(err) => debug!("loopback: dropping malformed frame: {}", err),
                }
            }
        });
    }
}
