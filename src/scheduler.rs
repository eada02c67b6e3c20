//! Single-threaded cooperative event queue.
//!
//! Work items are plain `Copy` values (see `node::Work`), not closures, so
//! the queue is a fixed-capacity `heapless` min-heap with no allocation.
//! Items run one at a time, to completion, ordered by due time and then by
//! insertion sequence:
//!
//! ```text
//!   schedule_once / schedule_every / post        IrqPost (interrupt context)
//!                 │                                     │ fetch_or(bit)
//!                 ▼                                     ▼
//!   ┌──────────────────────────────┐   drained at the start of each pass
//!   │ BinaryHeap<(due, seq, work)> │◄──────────────────────┘
//!   └──────────────┬───────────────┘
//!                  ▼
//!        Dispatch::dispatch(work)  ──►  may schedule / post more work
//! ```
//!
//! A pass only runs entries that existed when it started, so work posted
//! from a callback runs on the next pass.

use core::cmp::Ordering as CmpOrdering;
use core::sync::atomic::{AtomicU32, Ordering};

use heapless::binary_heap::{BinaryHeap, Min};

use crate::error::Error;

/// Milliseconds since boot.
pub type Millis = u64;

/// Time source and idle wait for the run loop.
#[allow(async_fn_in_trait)]
pub trait Timebase {
    fn now(&self) -> Millis;

    /// Sleep until `deadline` (or forever with `None`), returning early if
    /// an interrupt posted work. A deadline that has already passed still
    /// yields to other tasks once.
    async fn wait_until(&mut self, deadline: Option<Millis>);
}

/// Work handed over by other tasks (radio lifecycle callbacks), already
/// serialised; drained onto the queue by the run loop.
pub trait Inbox<W> {
    fn try_next(&mut self) -> Option<W>;
}

/// Work items that interrupt handlers may post through [`IrqPost`].
///
/// Each such item owns one bit, so at most 32 distinct kinds.
pub trait IrqWork: Copy {
    fn irq_slot(self) -> Option<u8>;
    fn from_irq_slot(slot: u8) -> Option<Self>;
}

/// Handler invoked by the scheduler for every due work item.
pub trait Dispatch<W> {
    fn dispatch<const N: usize>(&mut self, work: W, cx: &mut Context<'_, W, N>)
        -> Result<(), Error>;
}

/// Lock-free post channel from interrupt context to the run loop.
///
/// The interrupt side only sets bits and calls `wake`; it never touches
/// the queue itself.
pub struct IrqPost {
    bits: AtomicU32,
    wake: fn(),
}

impl IrqPost {
    pub const fn new(wake: fn()) -> Self {
        Self {
            bits: AtomicU32::new(0),
            wake,
        }
    }

    /// Post `work` from interrupt context. Posting an already-pending
    /// item is a no-op apart from the wake.
    pub fn post<W: IrqWork>(&self, work: W) {
        if let Some(slot) = work.irq_slot() {
            self.bits.fetch_or(1 << (slot & 31), Ordering::Release);
            (self.wake)();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.bits.load(Ordering::Acquire) != 0
    }

    fn take(&self) -> u32 {
        self.bits.swap(0, Ordering::Acquire)
    }

    fn restore(&self, bits: u32) {
        self.bits.fetch_or(bits, Ordering::Release);
    }
}

#[derive(Clone, Copy)]
struct Entry<W> {
    due: Millis,
    seq: u64,
    period: Option<Millis>,
    work: W,
}

impl<W> Entry<W> {
    fn key(&self) -> (Millis, u64) {
        (self.due, self.seq)
    }
}

impl<W> PartialEq for Entry<W> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<W> Eq for Entry<W> {}

impl<W> PartialOrd for Entry<W> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl<W> Ord for Entry<W> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.key().cmp(&other.key())
    }
}

/// Time-ordered queue of one-shot and periodic work.
pub struct EventQueue<W, const N: usize> {
    heap: BinaryHeap<Entry<W>, Min, N>,
    next_seq: u64,
}

impl<W: Copy, const N: usize> EventQueue<W, N> {
    pub const fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Run `work` once, `delay` ms after `now`.
    pub fn schedule_once(&mut self, now: Millis, delay: Millis, work: W) -> Result<(), Error> {
        self.push(now.saturating_add(delay), None, work)
    }

    /// Run `work` every `interval` ms, first at `now + interval`.
    pub fn schedule_every(&mut self, now: Millis, interval: Millis, work: W) -> Result<(), Error> {
        let interval = interval.max(1);
        self.push(now.saturating_add(interval), Some(interval), work)
    }

    /// Run `work` as soon as possible, after anything already due.
    pub fn post(&mut self, now: Millis, work: W) -> Result<(), Error> {
        self.push(now, None, work)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Due time of the earliest entry.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.heap.peek().map(|e| e.due)
    }

    /// Run every entry due at `now` that was queued before this pass began.
    ///
    /// Interrupt posts are moved into the queue first. Returns the number of
    /// items dispatched; failures are logged and do not stop the pass.
    pub fn dispatch<D>(&mut self, now: Millis, irq: &IrqPost, target: &mut D) -> usize
    where
        W: IrqWork,
        D: Dispatch<W>,
    {
        self.drain_irq(now, irq);

        let horizon = self.next_seq;
        let mut ran = 0;
        while let Some(entry) = self.pop_due(now, horizon) {
            if let Some(period) = entry.period {
                let next = entry.due.saturating_add(period);
                if self.push(next, Some(period), entry.work).is_err() {
                    error!("event queue full, periodic work dropped");
                }
            }

            let mut cx = Context {
                queue: &mut *self,
                now,
            };
            if let Err(e) = target.dispatch(entry.work, &mut cx) {
                error!("work item failed: {}", e);
            }
            ran += 1;
        }
        ran
    }

    /// Dispatch forever, idling on `timebase` between deadlines.
    pub async fn run_forever<D, T, I>(
        &mut self,
        irq: &IrqPost,
        inbox: &mut I,
        target: &mut D,
        timebase: &mut T,
    ) -> !
    where
        W: IrqWork,
        D: Dispatch<W>,
        T: Timebase,
        I: Inbox<W>,
    {
        loop {
            let now = timebase.now();
            while self.len() < N {
                let Some(work) = inbox.try_next() else { break };
                // Room was checked, so the post cannot fail.
                let _ = self.post(now, work);
            }
            self.dispatch(now, irq, target);

            // A bit still pending here may be one a full queue handed back,
            // so go round again only after the other tasks had a turn.
            let deadline = if irq.is_pending() {
                Some(now)
            } else {
                self.next_deadline()
            };
            timebase.wait_until(deadline).await;
        }
    }

    fn drain_irq(&mut self, now: Millis, irq: &IrqPost)
    where
        W: IrqWork,
    {
        let mut bits = irq.take();
        while bits != 0 {
            let slot = bits.trailing_zeros() as u8;
            let bit = 1u32 << slot;
            bits &= !bit;

            let Some(work) = W::from_irq_slot(slot) else {
                warn!("unknown interrupt slot {}", slot);
                continue;
            };
            if self.post(now, work).is_err() {
                // Keep the bit so the post is retried on the next pass.
                irq.restore(bit);
            }
        }
    }

    fn pop_due(&mut self, now: Millis, horizon: u64) -> Option<Entry<W>> {
        let head = self.heap.peek()?;
        if head.due > now || head.seq >= horizon {
            return None;
        }
        self.heap.pop()
    }

    fn push(&mut self, due: Millis, period: Option<Millis>, work: W) -> Result<(), Error> {
        let entry = Entry {
            due,
            seq: self.next_seq,
            period,
            work,
        };
        self.heap.push(entry).map_err(|_| Error::QueueFull)?;
        self.next_seq += 1;
        Ok(())
    }
}

impl<W: Copy, const N: usize> Default for EventQueue<W, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheduling handle passed to a running work item.
pub struct Context<'q, W, const N: usize> {
    queue: &'q mut EventQueue<W, N>,
    now: Millis,
}

impl<'q, W: Copy, const N: usize> Context<'q, W, N> {
    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn schedule_once(&mut self, delay: Millis, work: W) -> Result<(), Error> {
        self.queue.schedule_once(self.now, delay, work)
    }

    pub fn schedule_every(&mut self, interval: Millis, work: W) -> Result<(), Error> {
        self.queue.schedule_every(self.now, interval, work)
    }

    pub fn post(&mut self, work: W) -> Result<(), Error> {
        self.queue.post(self.now, work)
    }
}
