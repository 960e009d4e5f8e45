//! Precedence arbitration
//!
//! Decides, from broadcast state alone, which device's pattern this device
//! plays. Every device compares `(precedence, originator)` keys; the highest
//! key heard within the receive timeout wins. Applying the same message
//! twice leaves the state unchanged, so duplicates and cross-transport
//! reordering are harmless.

use embassy_time::{Duration, Instant};

use crate::network::{DeviceId, NetworkMessage, ReceivedMessage};
use crate::pattern::PatternId;

/// Role of this device in the arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceRole {
    /// No peers heard recently; choosing patterns alone
    #[default]
    Standalone,
    /// Playing a higher-precedence peer's pattern
    Follower,
    /// Peers heard, none outranks us
    Leader,
}

impl DeviceRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::Follower => "follower",
            Self::Leader => "leader",
        }
    }
}

/// Total order used for arbitration: precedence first, then device id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArbitrationKey {
    pub precedence: u32,
    pub originator: DeviceId,
}

impl ArbitrationKey {
    pub const fn of(message: &NetworkMessage) -> Self {
        Self {
            precedence: message.precedence,
            originator: message.originator,
        }
    }
}

/// Pattern state adopted from a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Followed {
    pub key: ArbitrationKey,
    pub hops: u8,
    pub pattern: PatternId,
    /// Pattern start in local milliseconds since boot (may be negative)
    pub start_ms: i64,
    pub last_heard: Instant,
}

/// Outcome of feeding one message to the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Own broadcast, own state relayed back or over the hop limit
    Ignored,
    /// Lower than what we play; we are (still) the leader or follower
    Outranked,
    /// Started following a new originator or its pattern changed
    Adopted,
    /// Same originator and pattern, timing refreshed
    Refreshed,
}

/// Arbitration state machine.
#[derive(Debug, Clone)]
pub struct Arbiter {
    local_id: DeviceId,
    receive_timeout: Duration,
    /// Silence on the adopted path after which a longer relay path to the
    /// same originator is accepted
    path_timeout: Duration,
    max_hops: u8,
    role: DeviceRole,
    followed: Option<Followed>,
    last_peer_heard: Option<Instant>,
}

impl Arbiter {
    pub const fn new(
        local_id: DeviceId,
        receive_timeout: Duration,
        path_timeout: Duration,
        max_hops: u8,
    ) -> Self {
        Self {
            local_id,
            receive_timeout,
            path_timeout,
            max_hops,
            role: DeviceRole::Standalone,
            followed: None,
            last_peer_heard: None,
        }
    }

    pub const fn role(&self) -> DeviceRole {
        self.role
    }

    pub const fn followed(&self) -> Option<&Followed> {
        self.followed.as_ref()
    }

    pub const fn local_id(&self) -> DeviceId {
        self.local_id
    }

    /// Fold one received message into the state.
    ///
    /// `local_precedence` is this device's own precedence at receipt time.
    pub fn handle(&mut self, received: &ReceivedMessage, local_precedence: u32) -> Verdict {
        let message = &received.message;
        if message.sender == self.local_id {
            return Verdict::Ignored;
        }
        if message.hops >= self.max_hops {
            trace!("ignoring message from {} after {} hops", message.originator, message.hops);
            return Verdict::Ignored;
        }

        self.last_peer_heard = Some(latest(self.last_peer_heard, received.received_at));

        if message.originator == self.local_id {
            // A peer relaying our own state follows us.
            if self.followed.is_none() {
                self.set_role(DeviceRole::Leader);
            }
            return Verdict::Ignored;
        }

        let incoming = ArbitrationKey::of(message);
        let own = ArbitrationKey {
            precedence: local_precedence,
            originator: self.local_id,
        };

        if let Some(followed) = self.followed {
            if followed.key.originator == message.originator {
                if incoming < own {
                    // The device we followed dropped below us.
                    self.followed = None;
                    self.set_role(DeviceRole::Leader);
                    return Verdict::Outranked;
                }
                let path_alive = received
                    .received_at
                    .saturating_duration_since(followed.last_heard)
                    <= self.path_timeout;
                if message.hops > followed.hops && path_alive {
                    // Relayed copy of state we already hear more directly.
                    return Verdict::Ignored;
                }
                return self.follow(received);
            }
            if incoming > followed.key && incoming > own {
                return self.follow(received);
            }
            return Verdict::Outranked;
        }

        if incoming > own {
            return self.follow(received);
        }
        self.set_role(DeviceRole::Leader);
        Verdict::Outranked
    }

    fn follow(&mut self, received: &ReceivedMessage) -> Verdict {
        let message = &received.message;
        let start_ms = millis(received.received_at) - i64::from(message.elapsed_ms);
        let next = Followed {
            key: ArbitrationKey::of(message),
            hops: message.hops,
            pattern: message.pattern,
            start_ms,
            last_heard: received.received_at,
        };

        let verdict = match self.followed {
            Some(current)
                if current.key.originator == next.key.originator
                    && current.pattern == next.pattern =>
            {
                Verdict::Refreshed
            }
            _ => Verdict::Adopted,
        };
        if verdict == Verdict::Adopted {
            debug!(
                "following {} (precedence {}, {} hops) playing {}",
                message.originator, message.precedence, message.hops, message.pattern
            );
        }

        let last_heard = self
            .followed
            .filter(|current| current.key.originator == next.key.originator)
            .map_or(next.last_heard, |current| latest(Some(current.last_heard), next.last_heard));
        self.followed = Some(Followed { last_heard, ..next });
        self.set_role(DeviceRole::Follower);
        verdict
    }

    /// Drop stale state once the receive timeout has passed.
    ///
    /// Returns `true` on the tick where the role changed. A silent period
    /// produces at most one transition.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        let timeout = self.receive_timeout;
        let expired = |since: Instant| now.saturating_duration_since(since) > timeout;
        match self.role {
            DeviceRole::Standalone => false,
            DeviceRole::Follower => {
                let Some(followed) = self.followed else {
                    self.set_role(DeviceRole::Standalone);
                    return true;
                };
                if !expired(followed.last_heard) {
                    return false;
                }
                info!("lost {} after {} ms of silence", followed.key.originator, timeout.as_millis());
                self.followed = None;
                let peers_recent = self.last_peer_heard.is_some_and(|heard| !expired(heard));
                self.set_role(if peers_recent {
                    DeviceRole::Leader
                } else {
                    DeviceRole::Standalone
                });
                true
            }
            DeviceRole::Leader => {
                if self.last_peer_heard.is_some_and(|heard| !expired(heard)) {
                    return false;
                }
                self.set_role(DeviceRole::Standalone);
                true
            }
        }
    }

    /// Stop following and choose patterns locally again (user input).
    ///
    /// Peers are re-evaluated from the next message on.
    pub fn take_control(&mut self) {
        if let Some(followed) = self.followed.take() {
            debug!("released {}", followed.key.originator);
            self.set_role(DeviceRole::Standalone);
        }
    }

    fn set_role(&mut self, role: DeviceRole) {
        if self.role != role {
            info!("role {} -> {}", self.role.as_str(), role.as_str());
            self.role = role;
        }
    }
}

/// Milliseconds since boot as a signed value
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn millis(instant: Instant) -> i64 {
    instant.as_millis() as i64
}

fn latest(current: Option<Instant>, candidate: Instant) -> Instant {
    match current {
        Some(current) if current > candidate => current,
        _ => candidate,
    }
}
