//! Render context pool.
//!
//! Fixed arena of `N_ctx` slots moving between three FIFO queues. Each queue
//! has its own lock; the per-list counts live behind a separate, narrower
//! lock that is updated in one step per move, so a [`ListCounts`] snapshot
//! always sums to `N_ctx`.
//!
//! A context taken off the ready queue for rendering stays `Ready` until it
//! is either started (`begin_busy`) or dropped (`release`).

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use spin::Mutex;

use super::frame::Frame;
use crate::dma::ContextId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Free,
    Ready,
    Busy,
}

/// Per-list context counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListCounts {
    pub free: usize,
    pub ready: usize,
    pub busy: usize,
}

impl ListCounts {
    pub fn total(&self) -> usize {
        self.free + self.ready + self.busy
    }

    fn get_mut(&mut self, list: ListKind) -> &mut usize {
        match list {
            ListKind::Free => &mut self.free,
            ListKind::Ready => &mut self.ready,
            ListKind::Busy => &mut self.busy,
        }
    }

    fn shift(&mut self, from: ListKind, to: ListKind) {
        let src = self.get_mut(from);
        *src = src.saturating_sub(1);
        *self.get_mut(to) += 1;
    }
}

struct RenderContext {
    frame: Option<Frame>,
    /// In-flight transfers, plus one while the caller is still submitting.
    pending: u32,
    list: ListKind,
    redundant: bool,
}

pub struct ContextPool {
    slots: Vec<Mutex<RenderContext>>,
    free: Mutex<VecDeque<ContextId>>,
    ready: Mutex<VecDeque<ContextId>>,
    busy: Mutex<VecDeque<ContextId>>,
    counts: Mutex<ListCounts>,
}

impl ContextPool {
    pub fn new(count: usize) -> Self {
        let slots = (0..count)
            .map(|_| {
                Mutex::new(RenderContext {
                    frame: None,
                    pending: 0,
                    list: ListKind::Free,
                    redundant: false,
                })
            })
            .collect();

        Self {
            slots,
            free: Mutex::new((0..count).map(ContextId).collect()),
            ready: Mutex::new(VecDeque::new()),
            busy: Mutex::new(VecDeque::new()),
            counts: Mutex::new(ListCounts {
                free: count,
                ready: 0,
                busy: 0,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn queue(&self, list: ListKind) -> &Mutex<VecDeque<ContextId>> {
        match list {
            ListKind::Free => &self.free,
            ListKind::Ready => &self.ready,
            ListKind::Busy => &self.busy,
        }
    }

    /// Record the move on the slot and the counts, then enqueue on `to`.
    /// The caller has already taken `id` off its old queue.
    fn attach<F>(&self, id: ContextId, to: ListKind, f: F)
    where
        F: FnOnce(&mut RenderContext),
    {
        let Some(slot) = self.slots.get(id.0) else {
            log::error!("usbdisp: {} out of range", id);
            return;
        };
        {
            let mut ctx = slot.lock();
            let from = ctx.list;
            f(&mut ctx);
            ctx.list = to;
            self.counts.lock().shift(from, to);
        }
        self.queue(to).lock().push_back(id);
    }

    /// free -> ready with `frame` attached.
    pub fn claim(&self, frame: Frame, redundant: bool) -> Option<ContextId> {
        let id = self.free.lock().pop_front()?;
        self.attach(id, ListKind::Ready, |ctx| {
            ctx.frame = Some(frame);
            ctx.redundant = redundant;
        });
        Some(id)
    }

    /// Oldest ready context, taken off the queue (still counted as ready).
    pub fn take_ready(&self) -> Option<ContextId> {
        self.ready.lock().pop_front()
    }

    /// Taken ready -> busy. Pending starts at one for the submitting caller.
    pub fn begin_busy(&self, id: ContextId) {
        self.attach(id, ListKind::Busy, |ctx| ctx.pending = 1);
    }

    /// One more transfer in flight for `id`.
    pub fn add_pending(&self, id: ContextId) {
        if let Some(slot) = self.slots.get(id.0) {
            slot.lock().pending += 1;
        }
    }

    /// One transfer (or the submitting caller) done. Returns `true` exactly
    /// once, when the count reaches zero.
    pub fn finish_one(&self, id: ContextId) -> bool {
        let Some(slot) = self.slots.get(id.0) else {
            return false;
        };
        let mut ctx = slot.lock();
        if ctx.pending == 0 {
            log::error!("usbdisp: {} completion with nothing pending", id);
            return false;
        }
        ctx.pending -= 1;
        ctx.pending == 0
    }

    /// busy -> free. Drops the frame reference.
    pub fn retire(&self, id: ContextId) {
        {
            let mut busy = self.busy.lock();
            if let Some(pos) = busy.iter().position(|c| *c == id) {
                busy.remove(pos);
            }
        }
        self.attach(id, ListKind::Free, |ctx| {
            ctx.frame = None;
            ctx.pending = 0;
            ctx.redundant = false;
        });
    }

    /// Taken ready -> free without rendering.
    pub fn release(&self, id: ContextId) {
        self.attach(id, ListKind::Free, |ctx| {
            ctx.frame = None;
            ctx.redundant = false;
        });
    }

    /// Move every queued ready context back to free.
    pub fn flush_ready(&self) -> usize {
        let mut flushed = 0;
        while let Some(id) = self.take_ready() {
            self.release(id);
            flushed += 1;
        }
        flushed
    }

    pub fn frame_of(&self, id: ContextId) -> Option<Frame> {
        self.slots.get(id.0)?.lock().frame.clone()
    }

    pub fn is_redundant(&self, id: ContextId) -> bool {
        self.slots.get(id.0).map_or(false, |slot| slot.lock().redundant)
    }

    pub fn pending(&self, id: ContextId) -> u32 {
        self.slots.get(id.0).map_or(0, |slot| slot.lock().pending)
    }

    pub fn membership(&self, id: ContextId) -> Option<ListKind> {
        self.slots.get(id.0).map(|slot| slot.lock().list)
    }

    pub fn counts(&self) -> ListCounts {
        *self.counts.lock()
    }

    /// Every slot is on exactly one list, pending is nonzero only while
    /// busy, and the counts agree with the slots.
    pub fn is_consistent(&self) -> bool {
        let mut seen = ListCounts::default();
        for slot in &self.slots {
            let ctx = slot.lock();
            if ctx.pending != 0 && ctx.list != ListKind::Busy {
                return false;
            }
            *seen.get_mut(ctx.list) += 1;
        }
        let counts = self.counts();
        counts.total() == self.slots.len() && seen == counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::ColorFormat;
    use alloc::vec;

    fn frame() -> Frame {
        Frame::new(vec![0u8; 12].into(), 2, 2, ColorFormat::Rgb24, 1)
    }

    #[test]
    fn test_lifecycle() {
        let pool = ContextPool::new(2);
        assert_eq!(pool.counts(), ListCounts { free: 2, ready: 0, busy: 0 });

        let id = pool.claim(frame(), false).unwrap();
        assert_eq!(pool.membership(id), Some(ListKind::Ready));
        assert_eq!(pool.counts().ready, 1);

        assert_eq!(pool.take_ready(), Some(id));
        pool.begin_busy(id);
        assert_eq!(pool.membership(id), Some(ListKind::Busy));
        assert_eq!(pool.pending(id), 1);

        pool.add_pending(id);
        assert!(!pool.finish_one(id));
        assert!(pool.finish_one(id));
        pool.retire(id);

        assert_eq!(pool.membership(id), Some(ListKind::Free));
        assert!(pool.frame_of(id).is_none());
        assert_eq!(pool.counts(), ListCounts { free: 2, ready: 0, busy: 0 });
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_claim_exhausts() {
        let pool = ContextPool::new(2);
        assert!(pool.claim(frame(), false).is_some());
        assert!(pool.claim(frame(), true).is_some());
        assert!(pool.claim(frame(), false).is_none());
        assert_eq!(pool.counts().total(), 2);
    }

    #[test]
    fn test_ready_fifo_and_flush() {
        let pool = ContextPool::new(3);
        let a = pool.claim(frame(), false).unwrap();
        let b = pool.claim(frame(), true).unwrap();
        assert!(pool.is_redundant(b));

        assert_eq!(pool.take_ready(), Some(a));
        pool.release(a);
        assert_eq!(pool.flush_ready(), 1);
        assert_eq!(pool.counts(), ListCounts { free: 3, ready: 0, busy: 0 });
        assert!(!pool.is_redundant(b));
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_finish_without_pending() {
        let pool = ContextPool::new(1);
        assert!(!pool.finish_one(ContextId(0)));
        assert!(!pool.finish_one(ContextId(5)));
    }
}
