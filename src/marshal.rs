//! Button edge marshalling from interrupt context onto the run loop.
//!
//! The edge handlers run in interrupt context. They touch exactly two
//! atomics: the [`PendingButton`] cell and the [`IrqPost`] bitmask. All
//! publishing happens later, when the scheduler dispatches the posted
//! delivery work and calls [`PendingButton::take`].
//!
//! Cell layout (one `AtomicU8`):
//! ```text
//! Bit 0: press pending
//! Bit 1: release pending
//! Bit 2: most recent edge was a press
//! ```
//! Edges of the same polarity that arrive before delivery collapse into
//! one (last value wins). If both polarities are pending, the older one is
//! delivered first so the final level matches the most recent edge.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::scheduler::{IrqPost, IrqWork};

const PRESS_PENDING: u8 = 1 << 0;
const RELEASE_PENDING: u8 = 1 << 1;
const LAST_WAS_PRESS: u8 = 1 << 2;

/// Single-word, single-producer/single-consumer button state cell.
pub struct PendingButton {
    state: AtomicU8,
}

impl PendingButton {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(0),
        }
    }

    /// Record an edge. Interrupt-safe: one CAS loop, never blocks.
    pub fn record(&self, pressed: bool) {
        let _ = self
            .state
            .fetch_update(Ordering::Release, Ordering::Relaxed, |s| {
                Some(if pressed {
                    s | PRESS_PENDING | LAST_WAS_PRESS
                } else {
                    (s | RELEASE_PENDING) & !LAST_WAS_PRESS
                })
            });
    }

    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) & (PRESS_PENDING | RELEASE_PENDING) != 0
    }

    /// Take every pending edge, oldest first.
    pub fn take(&self) -> Deliveries {
        let s = self.state.swap(0, Ordering::Acquire);
        let press = s & PRESS_PENDING != 0;
        let release = s & RELEASE_PENDING != 0;
        let last_press = s & LAST_WAS_PRESS != 0;

        match (press, release) {
            (true, true) => Deliveries {
                first: Some(!last_press),
                second: Some(last_press),
            },
            (true, false) => Deliveries::one(true),
            (false, true) => Deliveries::one(false),
            (false, false) => Deliveries::default(),
        }
    }
}

impl Default for PendingButton {
    fn default() -> Self {
        Self::new()
    }
}

/// Button levels to deliver, in order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Deliveries {
    first: Option<bool>,
    second: Option<bool>,
}

impl Deliveries {
    fn one(pressed: bool) -> Self {
        Self {
            first: Some(pressed),
            second: None,
        }
    }
}

impl Iterator for Deliveries {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        self.first.take().or_else(|| self.second.take())
    }
}

/// Interrupt-context entry points for the button.
///
/// Rising edge = press, falling edge = release (logical signal; the pin
/// polarity is resolved by the GPIO layer).
pub struct ButtonIrq<'a, W> {
    pending: &'a PendingButton,
    post: &'a IrqPost,
    deliver: W,
}

impl<'a, W: IrqWork> ButtonIrq<'a, W> {
    pub const fn new(pending: &'a PendingButton, post: &'a IrqPost, deliver: W) -> Self {
        Self {
            pending,
            post,
            deliver,
        }
    }

    pub fn on_rising_edge(&self) {
        self.pending.record(true);
        self.post.post(self.deliver);
    }

    pub fn on_falling_edge(&self) {
        self.pending.record(false);
        self.post.post(self.deliver);
    }
}
