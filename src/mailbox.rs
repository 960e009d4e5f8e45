//! Lock-protected hand-off primitives shared between I/O contexts and the
//! player.
//!
//! Both types are built on `critical-section`, so they work between an
//! interrupt handler and the main loop on a microcontroller as well as
//! between threads on a host. Locks are only held to copy values in or out.

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use heapless::{Deque, Vec};

/// Error returned when trying to send to a full mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrySendError<T>(pub T);

impl<T> fmt::Display for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("mailbox is full")
    }
}

impl<T: fmt::Debug> core::error::Error for TrySendError<T> {}

/// Error returned when trying to receive from an empty mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryReceiveError;

impl fmt::Display for TryReceiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("mailbox is empty")
    }
}

impl core::error::Error for TryReceiveError {}

/// Bounded FIFO queue.
///
/// Producers either fail on a full queue ([`Mailbox::try_send`]) or evict
/// the oldest entry ([`Mailbox::push_evicting`]); the latter suits state
/// broadcasts where only recent values matter.
pub struct Mailbox<T, const SIZE: usize> {
    inner: Mutex<RefCell<Deque<T, SIZE>>>,
}

impl<T, const SIZE: usize> Mailbox<T, SIZE> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Get a sender handle for this mailbox.
    pub const fn sender(&self) -> MailboxSender<'_, T, SIZE> {
        MailboxSender { mailbox: self }
    }

    /// Try to queue a value.
    ///
    /// Returns `Err(TrySendError(value))` if the mailbox is full.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        critical_section::with(|cs| {
            let mut queue = self.inner.borrow(cs).borrow_mut();
            queue.push_back(value).map_err(TrySendError)
        })
    }

    /// Queue a value, dropping the oldest one if the mailbox is full.
    ///
    /// Returns the dropped value.
    pub fn push_evicting(&self, value: T) -> Option<T> {
        critical_section::with(|cs| {
            let mut queue = self.inner.borrow(cs).borrow_mut();
            let evicted = if queue.is_full() {
                queue.pop_front()
            } else {
                None
            };
            // Space was made above.
            let _ = queue.push_back(value);
            evicted
        })
    }

    /// Try to take the oldest value.
    pub fn try_receive(&self) -> Result<T, TryReceiveError> {
        critical_section::with(|cs| {
            let mut queue = self.inner.borrow(cs).borrow_mut();
            queue.pop_front().ok_or(TryReceiveError)
        })
    }

    /// Move queued values into `out` until it is full.
    ///
    /// Values that do not fit stay queued. Returns the number moved.
    pub fn drain_into<const N: usize>(&self, out: &mut Vec<T, N>) -> usize {
        critical_section::with(|cs| {
            let mut queue = self.inner.borrow(cs).borrow_mut();
            let mut moved = 0;
            while !out.is_full() {
                let Some(value) = queue.pop_front() else {
                    break;
                };
                // `out` has room, checked by the loop condition.
                let _ = out.push(value);
                moved += 1;
            }
            moved
        })
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().clear());
    }
}

impl<T, const SIZE: usize> Default for Mailbox<T, SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight sending handle for a [`Mailbox`].
#[derive(Clone, Copy)]
pub struct MailboxSender<'a, T, const SIZE: usize> {
    mailbox: &'a Mailbox<T, SIZE>,
}

impl<T, const SIZE: usize> MailboxSender<'_, T, SIZE> {
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        self.mailbox.try_send(value)
    }

    pub fn push_evicting(&self, value: T) -> Option<T> {
        self.mailbox.push_evicting(value)
    }
}

/// Single pending value, newest write wins.
pub struct Slot<T> {
    inner: Mutex<RefCell<Option<T>>>,
}

impl<T> Slot<T> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Store `value`, returning the value it replaced
    pub fn put(&self, value: T) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().replace(value))
    }

    /// Remove and return the pending value
    pub fn take(&self) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().take())
    }

    pub fn is_empty(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().is_none())
    }
}

impl<T: Clone> Slot<T> {
    /// Copy of the pending value, leaving it in place
    pub fn peek(&self) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().clone())
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}
