#![no_std]

#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod fmt;

pub mod color;
pub mod effect;
pub mod frame;
pub mod frame_scheduler;
pub mod layout;
pub mod mailbox;
pub mod network;
pub mod palette;
pub mod pattern;
pub mod player;
pub mod rng;
pub mod trigger;

pub use effect::{Effect, EffectSlot};
pub use frame::{Frame, Pixel, PixelSink};
pub use frame_scheduler::{FrameResult, FrameScheduler};
pub use layout::{
    GridSize, Layout, LayoutError, LayoutId, MatrixLayout, Point, StripLayout, Viewport, XYIndex,
    XYIndexConfig, XYIndexStore,
};
pub use mailbox::{Mailbox, MailboxSender, Slot, TryReceiveError, TrySendError};
pub use network::{
    DeviceId, Network, NetworkLink, NetworkMessage, NetworkStatus, ReceivedMessage, SharedNetwork,
};
pub use pattern::{EffectFamily, EffectKind, PatternId, PatternSchedule, randomize_pattern};
pub use player::{DeviceRole, Player, PlayerConfig, PlayerError};
pub use rng::{
    CountingEntropy, EntropySource, PredictableRandom, RandomSource, UnpredictableRandom,
};
pub use trigger::{ButtonEvent, TriggerChannel, TriggerIntent, TriggerSender};

#[cfg(feature = "std")]
pub use rng::OsEntropy;

pub use color::Rgb;
pub use embassy_time::{Duration, Instant};
