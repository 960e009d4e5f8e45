//! Frame scheduling and timing utilities.
//!
//! Provides portable frame pacing without async/await or platform-specific timers.
//! The caller is responsible for sleeping/waiting between frames.

use embassy_time::{Duration, Instant};

use crate::frame::{Frame, PixelSink};
use crate::layout::{LayoutError, XYIndexStore};
use crate::player::Player;
use crate::rng::EntropySource;
use crate::trigger::TriggerChannel;

/// Default target frame rate (90 FPS).
pub const DEFAULT_FPS: u32 = 90;

/// Default frame duration based on target FPS.
pub const DEFAULT_FRAME_DURATION: Duration = Duration::from_millis(1000 / DEFAULT_FPS as u64);

/// Result of a frame tick operation.
#[derive(Debug, Clone, Copy)]
pub struct FrameResult {
    /// The frame that was rendered.
    pub frame: Frame,
    /// The deadline for the next frame.
    pub next_deadline: Instant,
    /// How long to wait until the next frame (may be zero if behind schedule).
    pub sleep_duration: Duration,
}

/// Cooperative run loop for one device.
///
/// Each tick advances the player (network, arbitration, schedule,
/// broadcast), renders every pixel into the sink and returns how long the
/// caller should sleep. Falling more than two frames behind drops the
/// backlog instead of rendering a catch-up burst.
///
/// # Usage
///
/// ```ignore
/// let mut scheduler = FrameScheduler::new(player, &store, sink);
///
/// loop {
///     let now = Instant::now();
///     let result = scheduler.tick_with_triggers(&TRIGGERS, now)?;
///
///     // Platform-specific sleep
///     sleep_ms(result.sleep_duration.as_millis());
/// }
/// ```
pub struct FrameScheduler<
    'a,
    E: EntropySource,
    S: PixelSink,
    const MAX_NETWORKS: usize,
    const MAX_LAYOUTS: usize,
    const MAX_PIXELS: usize,
> {
    player: Player<'a, E, MAX_NETWORKS>,
    store: &'a XYIndexStore<MAX_LAYOUTS, MAX_PIXELS>,
    sink: S,
    next_frame: Instant,
    frame_duration: Duration,
}

impl<
    'a,
    E: EntropySource,
    S: PixelSink,
    const MAX_NETWORKS: usize,
    const MAX_LAYOUTS: usize,
    const MAX_PIXELS: usize,
> FrameScheduler<'a, E, S, MAX_NETWORKS, MAX_LAYOUTS, MAX_PIXELS>
{
    /// Create a new frame scheduler.
    ///
    /// Uses `DEFAULT_FRAME_DURATION` (90 FPS) for frame timing.
    pub fn new(
        player: Player<'a, E, MAX_NETWORKS>,
        store: &'a XYIndexStore<MAX_LAYOUTS, MAX_PIXELS>,
        sink: S,
    ) -> Self {
        Self::with_frame_duration(player, store, sink, DEFAULT_FRAME_DURATION)
    }

    /// Create a new frame scheduler with custom frame duration.
    pub fn with_frame_duration(
        player: Player<'a, E, MAX_NETWORKS>,
        store: &'a XYIndexStore<MAX_LAYOUTS, MAX_PIXELS>,
        sink: S,
        frame_duration: Duration,
    ) -> Self {
        Self {
            player,
            store,
            sink,
            next_frame: Instant::from_millis(0),
            frame_duration,
        }
    }

    /// Process one frame and return timing information.
    ///
    /// Fails only when the layout store was never finalized.
    pub fn tick(&mut self, now: Instant) -> Result<FrameResult, LayoutError> {
        let max_drift = self.frame_duration * 2;
        if now > self.next_frame + max_drift {
            self.next_frame = now;
        }

        self.player.tick(now);
        let frame = self.player.render(now, self.store, &mut self.sink)?;

        self.next_frame += self.frame_duration;
        let sleep_duration = self.next_frame.saturating_duration_since(now);

        Ok(FrameResult {
            frame,
            next_deadline: self.next_frame,
            sleep_duration,
        })
    }

    /// Apply every queued trigger, then process one frame.
    pub fn tick_with_triggers<const SIZE: usize>(
        &mut self,
        triggers: &TriggerChannel<SIZE>,
        now: Instant,
    ) -> Result<FrameResult, LayoutError> {
        self.player.process_triggers(triggers, now);
        self.tick(now)
    }

    pub fn player(&self) -> &Player<'a, E, MAX_NETWORKS> {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player<'a, E, MAX_NETWORKS> {
        &mut self.player
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
