//! Synchronization engine
//!
//! [`Player`] is the owned top-level context of a device. Every tick it
//! drains local triggers, services its networks, folds received state into
//! the [`Arbiter`], advances its own schedule when nobody outranks it, and
//! broadcasts what it currently plays. Rendering is a separate call so the
//! caller can pace frames independently (see
//! [`FrameScheduler`](crate::frame_scheduler::FrameScheduler)).

pub mod arbiter;

use core::fmt;

use embassy_time::{Duration, Instant};
use heapless::Vec;

pub use arbiter::{Arbiter, ArbitrationKey, DeviceRole, Followed, Verdict};

use crate::effect::EffectSlot;
use crate::frame::{Frame, PixelSink};
use crate::layout::{LayoutError, XYIndexStore};
use crate::network::{DeviceId, Inbox, Network, NetworkMessage, NetworkStatus};
use crate::pattern::{PatternId, PatternSchedule};
use crate::rng::{EntropySource, PredictableRandom, RandomSource, UnpredictableRandom};
use crate::trigger::{TriggerChannel, TriggerIntent};
use arbiter::millis;

pub const DEFAULT_BASE_PRECEDENCE: u32 = 1_000;
pub const DEFAULT_PRECEDENCE_JITTER: u32 = 1_000;
pub const DEFAULT_PRECEDENCE_GAIN: u32 = 1_000_000;
pub const DEFAULT_PRECEDENCE_BOOST: Duration = Duration::from_secs(300);
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(3_000);
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_PATTERN_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_HOPS: u8 = 30;
pub const DEFAULT_RESTART_MARGIN: Duration = Duration::from_secs(3_600);

/// Missed broadcasts after which a longer relay path to the followed device
/// takes over
const PATH_TIMEOUT_INTERVALS: u32 = 2;

/// Label mixed into the per-frame reseed
const FRAME_LABEL: &str = "frame";

/// Configuration for the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Precedence of a device nobody touched
    pub base_precedence: u32,
    /// Upper bound of the random amount added to `base_precedence` at
    /// start, so idle devices do not all tie
    pub precedence_jitter: u32,
    /// Extra precedence right after a local trigger
    pub precedence_gain: u32,
    /// Time for the trigger boost to decay to zero
    pub precedence_boost_duration: Duration,
    /// Silence after which followed or heard peers are forgotten
    pub receive_timeout: Duration,
    /// Maximum time between two broadcasts of unchanged state
    pub broadcast_interval: Duration,
    /// How long a pattern plays before the schedule moves on
    pub pattern_duration: Duration,
    /// Messages relayed this many times are dropped
    pub max_hops: u8,
    /// How long before the millisecond counter overflows `i32` the device
    /// asks for a restart
    pub restart_margin: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            base_precedence: DEFAULT_BASE_PRECEDENCE,
            precedence_jitter: DEFAULT_PRECEDENCE_JITTER,
            precedence_gain: DEFAULT_PRECEDENCE_GAIN,
            precedence_boost_duration: DEFAULT_PRECEDENCE_BOOST,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            broadcast_interval: DEFAULT_BROADCAST_INTERVAL,
            pattern_duration: DEFAULT_PATTERN_DURATION,
            max_hops: DEFAULT_MAX_HOPS,
            restart_margin: DEFAULT_RESTART_MARGIN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerError {
    /// Network table is full
    TooManyNetworks,
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyNetworks => write!(f, "too many networks"),
        }
    }
}

impl core::error::Error for PlayerError {}

struct NetworkSlot<'a> {
    network: &'a mut dyn Network,
    status: NetworkStatus,
    last_sent: Option<Instant>,
}

/// One device's synchronization engine.
pub struct Player<'a, E: EntropySource, const MAX_NETWORKS: usize> {
    // Configuration
    config: PlayerConfig,
    device_id: DeviceId,

    // External dependencies
    networks: Vec<NetworkSlot<'a>, MAX_NETWORKS>,
    schedule: PatternSchedule<'a>,
    entropy: UnpredictableRandom<E>,

    // Internal state
    arbiter: Arbiter,
    frame_rng: PredictableRandom,
    effect: EffectSlot,
    pattern: PatternId,
    /// Local milliseconds since boot; negative when a peer started the
    /// pattern before we booted
    pattern_start_ms: i64,
    precedence_offset: u32,
    last_beat: Option<Instant>,
    last_user_input: Option<Instant>,
    looping: bool,
    started: bool,
    state_changed: bool,
}

impl<'a, E: EntropySource, const MAX_NETWORKS: usize> Player<'a, E, MAX_NETWORKS> {
    pub fn new(
        device_id: DeviceId,
        config: PlayerConfig,
        schedule: PatternSchedule<'a>,
        entropy: E,
    ) -> Self {
        Self {
            config,
            device_id,
            networks: Vec::new(),
            schedule,
            entropy: UnpredictableRandom::new(entropy),
            arbiter: Arbiter::new(
                device_id,
                config.receive_timeout,
                config.broadcast_interval * PATH_TIMEOUT_INTERVALS,
                config.max_hops,
            ),
            frame_rng: PredictableRandom::new(),
            effect: EffectSlot::Black,
            pattern: PatternId::BLACK,
            pattern_start_ms: 0,
            precedence_offset: 0,
            last_beat: None,
            last_user_input: None,
            looping: false,
            started: false,
            state_changed: false,
        }
    }

    /// Register a transport. The player drives it from `tick`.
    pub fn add_network(&mut self, network: &'a mut dyn Network) -> Result<(), PlayerError> {
        info!("adding network {}", network.name());
        self.networks
            .push(NetworkSlot {
                network,
                status: NetworkStatus::Disconnected,
                last_sent: None,
            })
            .map_err(|_| PlayerError::TooManyNetworks)
    }

    /// Pick the first pattern. Called by the first `tick` if not done
    /// explicitly.
    pub fn begin(&mut self, now: Instant) {
        if self.started {
            return;
        }
        self.started = true;
        self.precedence_offset = self.entropy.random_between(0, self.config.precedence_jitter);
        let pattern = self.schedule.start(&mut self.entropy);
        info!(
            "{} starting with precedence {}",
            self.device_id,
            self.local_precedence(now)
        );
        self.play(pattern, millis(now));
    }

    /// Advance the engine by one step. Never blocks.
    pub fn tick(&mut self, now: Instant) {
        self.begin(now);
        self.receive(now);
        if self.arbiter.check_timeout(now) {
            self.state_changed = true;
        }
        self.advance_schedule(now);
        self.broadcast(now);
    }

    /// Apply every queued trigger
    pub fn process_triggers<const SIZE: usize>(
        &mut self,
        triggers: &TriggerChannel<SIZE>,
        now: Instant,
    ) {
        while let Ok(intent) = triggers.try_receive() {
            debug!("trigger {:?}", intent);
            match intent {
                TriggerIntent::Next => self.next(now),
                TriggerIntent::Prev => self.prev(now),
                TriggerIntent::ToggleLoop => self.toggle_loop(),
                TriggerIntent::Play(pattern) => self.set_pattern(pattern, now),
            }
        }
    }

    /// Move to the next pattern of the schedule
    pub fn next(&mut self, now: Instant) {
        self.begin(now);
        self.take_control(now);
        let pattern = self.schedule.next(&mut self.entropy);
        self.play(pattern, millis(now));
    }

    /// Move to the previous pattern of the schedule
    pub fn prev(&mut self, now: Instant) {
        self.begin(now);
        self.take_control(now);
        let pattern = self.schedule.prev(&mut self.entropy);
        self.play(pattern, millis(now));
    }

    /// Play `pattern` as is, restarting its clock
    pub fn set_pattern(&mut self, pattern: PatternId, now: Instant) {
        self.begin(now);
        self.take_control(now);
        self.play(pattern, millis(now));
    }

    /// Switch between rotating through the schedule and holding the
    /// current pattern.
    ///
    /// Only affects patterns this device chooses; a follower keeps
    /// following.
    pub fn toggle_loop(&mut self) {
        self.looping = !self.looping;
        info!("looping {}", if self.looping { "on" } else { "off" });
    }

    /// Record a beat (audio onset, tap) for beat-reactive effects
    pub fn handle_beat(&mut self, now: Instant) {
        self.last_beat = Some(now);
    }

    /// Render the current pattern into `sink`.
    ///
    /// Every pixel of every layout in `store` is set exactly once, then the
    /// sink is flushed.
    pub fn render<const MAX_LAYOUTS: usize, const MAX_PIXELS: usize, S: PixelSink + ?Sized>(
        &mut self,
        now: Instant,
        store: &XYIndexStore<MAX_LAYOUTS, MAX_PIXELS>,
        sink: &mut S,
    ) -> Result<Frame, LayoutError> {
        if !store.is_finalized() {
            return Err(LayoutError::NotFinalized);
        }
        let time = self.elapsed(now);
        let since_beat = self
            .last_beat
            .map_or(time, |beat| now.saturating_duration_since(beat).min(time));
        let frame = Frame {
            pattern: self.pattern,
            time,
            since_beat,
            viewport: store.viewport(),
            grid: store.grid(),
        };

        self.frame_rng
            .reset_with_frame(frame.pattern.raw(), frame.time_ms(), FRAME_LABEL);
        self.effect.begin(&frame, &mut self.frame_rng);

        for (layout, count) in store.layouts() {
            for index in 0..count {
                let pixel = store.pixel(layout, index)?;
                sink.set_pixel_color(layout, index, self.effect.color(&frame, &pixel));
            }
        }
        sink.flush();

        Ok(frame)
    }

    /// Whether the millisecond counter is close enough to overflowing the
    /// signed elapsed time field that the device should restart now
    pub fn needs_restart(&self, now: Instant) -> bool {
        let limit = u64::from(i32::MAX.unsigned_abs());
        now.as_millis()
            .saturating_add(self.config.restart_margin.as_millis())
            >= limit
    }

    /// Precedence this device broadcasts as originator.
    ///
    /// Local triggers add `precedence_gain`, decaying linearly to zero over
    /// `precedence_boost_duration`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn local_precedence(&self, now: Instant) -> u32 {
        let base = self
            .config
            .base_precedence
            .saturating_add(self.precedence_offset);
        let Some(input) = self.last_user_input else {
            return base;
        };
        let window = self.config.precedence_boost_duration.as_millis();
        let since = now.saturating_duration_since(input).as_millis();
        if window == 0 || since >= window {
            return base;
        }
        let boost = u64::from(self.config.precedence_gain) * (window - since) / window;
        base.saturating_add(boost as u32)
    }

    pub const fn role(&self) -> DeviceRole {
        self.arbiter.role()
    }

    pub const fn pattern(&self) -> PatternId {
        self.pattern
    }

    pub const fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub const fn is_looping(&self) -> bool {
        self.looping
    }

    pub const fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub const fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    /// Pattern start in local milliseconds since boot
    pub const fn pattern_start_ms(&self) -> i64 {
        self.pattern_start_ms
    }

    /// Time the current pattern has been playing
    #[allow(clippy::cast_sign_loss)]
    pub fn elapsed(&self, now: Instant) -> Duration {
        let elapsed = millis(now).saturating_sub(self.pattern_start_ms).max(0);
        Duration::from_millis(elapsed as u64)
    }

    /// Status reported by the network at `index` on the last tick
    pub fn network_status(&self, index: usize) -> Option<NetworkStatus> {
        self.networks.get(index).map(|slot| slot.status)
    }

    fn take_control(&mut self, now: Instant) {
        self.last_user_input = Some(now);
        self.arbiter.take_control();
        self.state_changed = true;
    }

    fn play(&mut self, pattern: PatternId, start_ms: i64) {
        if pattern != self.pattern {
            debug!("playing {} ({})", pattern, pattern.effect().as_str());
            self.effect = EffectSlot::for_pattern(pattern);
        }
        self.pattern = pattern;
        self.pattern_start_ms = start_ms;
        self.state_changed = true;
    }

    fn receive(&mut self, now: Instant) {
        let precedence = self.local_precedence(now);
        let mut inbox = Inbox::new();
        let mut adopted = false;

        for slot in &mut self.networks {
            let status = slot.network.update(NetworkStatus::Connected, now);
            slot.status = status;
            if !status.is_connected() {
                continue;
            }

            inbox.clear();
            slot.network.poll_received(now, &mut inbox);
            let own_id = slot.network.local_device_id();
            let echoes = slot.network.should_echo();
            for received in &inbox {
                if echoes && received.message.sender == own_id {
                    continue;
                }
                match self.arbiter.handle(received, precedence) {
                    Verdict::Adopted | Verdict::Refreshed => adopted = true,
                    Verdict::Ignored | Verdict::Outranked => {}
                }
            }
        }

        if !adopted {
            return;
        }
        if let Some(followed) = self.arbiter.followed().copied() {
            if followed.pattern != self.pattern {
                self.play(followed.pattern, followed.start_ms);
            } else {
                self.pattern_start_ms = followed.start_ms;
            }
        }
    }

    fn advance_schedule(&mut self, now: Instant) {
        if self.looping || self.arbiter.role() == DeviceRole::Follower {
            return;
        }
        if self.elapsed(now) < self.config.pattern_duration {
            return;
        }
        let pattern = self.schedule.next(&mut self.entropy);
        self.play(pattern, millis(now));
    }

    fn outgoing(&self, now: Instant) -> NetworkMessage {
        let elapsed_ms = i32::try_from(millis(now).saturating_sub(self.pattern_start_ms))
            .unwrap_or(i32::MAX);
        let (originator, precedence, hops) = match self.arbiter.followed() {
            Some(followed) => (
                followed.key.originator,
                followed.key.precedence,
                followed.hops.saturating_add(1),
            ),
            None => (self.device_id, self.local_precedence(now), 0),
        };
        NetworkMessage {
            originator,
            sender: self.device_id,
            precedence,
            pattern: self.pattern,
            elapsed_ms,
            hops,
        }
    }

    fn broadcast(&mut self, now: Instant) {
        let message = self.outgoing(now);
        let interval = self.config.broadcast_interval;
        let changed = self.state_changed;

        for slot in &mut self.networks {
            if !slot.status.is_connected() {
                continue;
            }
            let due = changed
                || slot
                    .last_sent
                    .is_none_or(|sent| now.saturating_duration_since(sent) >= interval);
            if due {
                trace!("{}: sending {}", slot.network.name(), message.pattern);
                slot.network.try_send(&message);
                slot.last_sent = Some(now);
            }
        }
        self.state_changed = false;
    }
}
