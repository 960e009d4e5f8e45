use core::cell::Cell;

use critical_section::Mutex;
use embassy_time::Instant;

use super::codec::{self, FRAME_LEN};
use super::{DeviceId, Inbox, Network, NetworkMessage, NetworkStatus, ReceivedMessage};
use crate::mailbox::{Mailbox, Slot};

/// State shared between a transport's I/O context and the player.
///
/// The I/O side (an interrupt handler or a worker thread) decodes incoming
/// frames into the inbox, picks up the single pending outbound message and
/// reports connectivity. The player side talks to it through
/// [`SharedNetwork`]. Every access is a short copy under the lock.
pub struct NetworkLink<const SIZE: usize> {
    device_id: DeviceId,
    echo: bool,
    inbox: Mailbox<ReceivedMessage, SIZE>,
    outbound: Slot<NetworkMessage>,
    status: Mutex<Cell<NetworkStatus>>,
    wanted: Mutex<Cell<NetworkStatus>>,
}

impl<const SIZE: usize> NetworkLink<SIZE> {
    pub const fn new(device_id: DeviceId, echo: bool) -> Self {
        Self {
            device_id,
            echo,
            inbox: Mailbox::new(),
            outbound: Slot::new(),
            status: Mutex::new(Cell::new(NetworkStatus::Disconnected)),
            wanted: Mutex::new(Cell::new(NetworkStatus::Disconnected)),
        }
    }

    pub const fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Decode a received frame and queue it.
    ///
    /// Malformed frames are dropped. When the inbox is full the oldest
    /// message goes, since newer state supersedes it anyway.
    pub fn deliver_frame(&self, bytes: &[u8], received_at: Instant) {
        match codec::decode(bytes) {
            Ok(message) => {
                if self
                    .inbox
                    .push_evicting(ReceivedMessage {
                        message,
                        received_at,
                    })
                    .is_some()
                {
                    trace!("inbox full, dropped oldest message");
                }
            }
            Err(err) => {
                debug!("dropping malformed frame: {}", err);
            }
        }
    }

    /// Take the pending outbound message, encoded for the wire
    pub fn take_outbound(&self) -> Option<[u8; FRAME_LEN]> {
        self.outbound.take().map(|message| codec::encode(&message))
    }

    /// Report connectivity from the I/O side
    pub fn set_status(&self, status: NetworkStatus) {
        critical_section::with(|cs| self.status.borrow(cs).set(status));
    }

    pub fn status(&self) -> NetworkStatus {
        critical_section::with(|cs| self.status.borrow(cs).get())
    }

    /// Connectivity the player asked for
    pub fn wanted_status(&self) -> NetworkStatus {
        critical_section::with(|cs| self.wanted.borrow(cs).get())
    }

    fn set_wanted(&self, wanted: NetworkStatus) {
        critical_section::with(|cs| self.wanted.borrow(cs).set(wanted));
    }
}

/// [`Network`] view of a [`NetworkLink`] for the player.
pub struct SharedNetwork<'a, const SIZE: usize> {
    name: &'static str,
    link: &'a NetworkLink<SIZE>,
    last_status: NetworkStatus,
}

impl<'a, const SIZE: usize> SharedNetwork<'a, SIZE> {
    pub const fn new(name: &'static str, link: &'a NetworkLink<SIZE>) -> Self {
        Self {
            name,
            link,
            last_status: NetworkStatus::Disconnected,
        }
    }
}

impl<const SIZE: usize> Network for SharedNetwork<'_, SIZE> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn local_device_id(&self) -> DeviceId {
        self.link.device_id
    }

    fn should_echo(&self) -> bool {
        self.link.echo
    }

    fn update(&mut self, wanted: NetworkStatus, _now: Instant) -> NetworkStatus {
        self.link.set_wanted(wanted);
        let status = self.link.status();
        if status != self.last_status {
            info!("{}: {} -> {}", self.name, self.last_status.as_str(), status.as_str());
            self.last_status = status;
        }
        status
    }

    fn try_send(&mut self, message: &NetworkMessage) {
        // Only the latest state matters, so an unsent message is replaced.
        let _ = self.link.outbound.put(*message);
    }

    fn poll_received(&mut self, _now: Instant, inbox: &mut Inbox) {
        self.link.inbox.drain_into(inbox);
    }
}
