//! Local trigger handling
//!
//! Button handlers (debounced elsewhere) turn presses into
//! [`TriggerIntent`]s and queue them on a [`TriggerChannel`]. The player
//! drains the channel at the start of every tick.

use crate::mailbox::{Mailbox, MailboxSender};
use crate::pattern::PatternId;

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerIntent {
    /// Advance to the next pattern
    Next,
    /// Go back to the previous pattern
    Prev,
    /// Toggle between rotating patterns and looping the current one
    ToggleLoop,
    /// Play a specific pattern
    Play(PatternId),
}

/// Debounced button gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    ShortPress,
    LongPress,
    Held,
}

impl From<ButtonEvent> for TriggerIntent {
    fn from(event: ButtonEvent) -> Self {
        match event {
            ButtonEvent::ShortPress => Self::Next,
            ButtonEvent::LongPress => Self::Prev,
            ButtonEvent::Held => Self::ToggleLoop,
        }
    }
}

/// Type alias for the trigger channel
pub type TriggerChannel<const SIZE: usize> = Mailbox<TriggerIntent, SIZE>;

/// Type alias for trigger sender
pub type TriggerSender<'a, const SIZE: usize> = MailboxSender<'a, TriggerIntent, SIZE>;
