//! Transfer buffer pool.
//!
//! Fixed set of pre-allocated buffers with free list tracking. `acquire` is
//! the only blocking call on the submission path; completions return buffers
//! from the transport's context under a short spin lock.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use spin::Mutex;

use super::buffer::TransferBuffer;
use super::ownership::BufferOwnership;
use super::transfer::{CompletionSink, CompletionStatus, Transfer, TransferTag};
use crate::driver::traits::{BulkTransport, Clock, Rejected};
use crate::error::PoolError;
use crate::render::LinkState;

/// Poll interval while waiting for a buffer (ms).
const ACQUIRE_POLL_MS: u32 = 1;

/// Pool statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub total: usize,
    pub available: usize,
    /// Buffers owned by the transport.
    pub in_flight: usize,
    /// Buffers lent to a caller but not yet submitted.
    pub lent: usize,
    pub capacity: usize,
    pub lost_pixels: bool,
}

struct PoolInner {
    free: VecDeque<TransferBuffer>,
    ownership: Vec<BufferOwnership>,
}

impl PoolInner {
    fn count(&self, state: BufferOwnership) -> usize {
        self.ownership.iter().filter(|o| **o == state).count()
    }

    fn transition(&mut self, index: u16, next: BufferOwnership) -> bool {
        match self.ownership.get_mut(index as usize) {
            Some(state) if state.can_transition_to(next) => {
                *state = next;
                true
            }
            Some(state) => {
                log::error!(
                    "usbdisp: buffer {} invalid transition {:?} -> {:?}",
                    index,
                    state,
                    next
                );
                false
            }
            None => {
                log::error!("usbdisp: buffer index {} out of range", index);
                false
            }
        }
    }
}

/// Pre-allocated transfer buffer pool.
pub struct TransferPool {
    inner: Mutex<PoolInner>,
    total: usize,
    capacity: usize,
    available: AtomicUsize,
    /// Sticky: set when frames were lost, cleared only by `take_lost_pixels`.
    lost_pixels: AtomicBool,
    closing: AtomicBool,
}

impl TransferPool {
    /// Allocate `count` buffers of `capacity` bytes each.
    ///
    /// `count` is bounded by the `u16` buffer index (checked by
    /// `PipelineConfig::validate`).
    pub fn new(count: usize, capacity: usize) -> Self {
        let count = count.min(u16::MAX as usize);
        let free = (0..count)
            .map(|i| TransferBuffer::new(capacity, i as u16))
            .collect::<VecDeque<_>>();

        log::info!("usbdisp: allocated {} {}-byte transfer buffers", count, capacity);

        Self {
            inner: Mutex::new(PoolInner {
                free,
                ownership: alloc::vec![BufferOwnership::Free; count],
            }),
            total: count,
            capacity,
            available: AtomicUsize::new(count),
            lost_pixels: AtomicBool::new(false),
            closing: AtomicBool::new(false),
        }
    }

    /// Take a free buffer without waiting.
    pub fn try_acquire(&self) -> Option<TransferBuffer> {
        if self.closing.load(Ordering::Acquire) {
            return None;
        }
        let mut inner = self.inner.lock();
        let buffer = inner.free.pop_front()?;
        if !inner.transition(buffer.index(), BufferOwnership::DriverOwned) {
            // bookkeeping is off; keep the buffer rather than hand out a shared one
            inner.free.push_back(buffer);
            return None;
        }
        self.available.fetch_sub(1, Ordering::AcqRel);
        Some(buffer)
    }

    /// Wait up to `timeout_ms` for a free buffer.
    ///
    /// Gives up early when the device goes away or the pool is closing.
    /// A timeout sets the sticky lost-pixels flag.
    pub fn acquire(
        &self,
        link: &LinkState,
        clock: &dyn Clock,
        timeout_ms: u32,
    ) -> Result<TransferBuffer, PoolError> {
        let deadline = clock.now_ms().saturating_add(timeout_ms as u64);

        loop {
            if link.is_device_gone() {
                return Err(PoolError::DeviceGone);
            }
            if self.closing.load(Ordering::Acquire) {
                return Err(PoolError::Closed);
            }
            if let Some(buffer) = self.try_acquire() {
                return Ok(buffer);
            }
            if clock.now_ms() >= deadline {
                self.lost_pixels.store(true, Ordering::Release);
                log::warn!(
                    "usbdisp: no transfer buffer within {} ms ({} of {} available)",
                    timeout_ms,
                    self.available(),
                    self.total
                );
                return Err(PoolError::Timeout);
            }
            clock.delay_ms(ACQUIRE_POLL_MS);
        }
    }

    /// Wrap a filled buffer into a transfer.
    pub fn prepare(
        &self,
        buffer: TransferBuffer,
        len: usize,
        tag: TransferTag,
        sink: Arc<dyn CompletionSink>,
    ) -> Result<Transfer, PoolError> {
        if len > buffer.capacity() {
            let capacity = buffer.capacity();
            self.release(buffer);
            return Err(PoolError::TooLarge { len, capacity });
        }
        Ok(Transfer::new(buffer, len, tag, sink))
    }

    /// Hand a transfer to the transport.
    ///
    /// On immediate rejection the transfer is completed synchronously with
    /// [`CompletionStatus::Rejected`], which returns its buffer, and the
    /// error is surfaced.
    pub fn submit(&self, transport: &dyn BulkTransport, transfer: Transfer) -> Result<(), PoolError> {
        if let Some(index) = transfer.buffer_index() {
            self.inner.lock().transition(index, BufferOwnership::DeviceOwned);
        }

        log::trace!("usbdisp: submit {} bytes ({:?})", transfer.len(), transfer.tag().kind);

        match transport.submit(transfer) {
            Ok(()) => Ok(()),
            Err(Rejected { transfer, error }) => {
                log::error!("usbdisp: bulk submit rejected: {}", error);
                transfer.complete(CompletionStatus::Rejected(error));
                Err(PoolError::Submit(error))
            }
        }
    }

    /// Return a buffer after its transfer completed.
    ///
    /// Called from the completion context.
    pub fn reclaim(&self, buffer: TransferBuffer, status: CompletionStatus) {
        if status.loses_pixels() {
            self.lost_pixels.store(true, Ordering::Release);
        }
        self.put_back(buffer);
    }

    /// Return a lent buffer that was never submitted.
    pub fn release(&self, buffer: TransferBuffer) {
        self.put_back(buffer);
    }

    fn put_back(&self, buffer: TransferBuffer) {
        let mut inner = self.inner.lock();
        if inner.transition(buffer.index(), BufferOwnership::Free) {
            inner.free.push_back(buffer);
            self.available.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Close the pool and wait for every outstanding buffer.
    ///
    /// Returns the number of buffers held once drained. With buffers still
    /// in flight after `timeout_ms` the memory is kept and
    /// [`PoolError::Outstanding`] is returned.
    pub fn drain(&self, clock: &dyn Clock, timeout_ms: u32) -> Result<usize, PoolError> {
        self.closing.store(true, Ordering::Release);
        let deadline = clock.now_ms().saturating_add(timeout_ms as u64);

        while self.available() < self.total {
            if clock.now_ms() >= deadline {
                let outstanding = self.total - self.available();
                log::warn!("usbdisp: pool drain timed out, {} transfers in flight", outstanding);
                return Err(PoolError::Outstanding(outstanding));
            }
            clock.delay_ms(ACQUIRE_POLL_MS);
        }

        log::info!("usbdisp: transfer pool drained ({} buffers)", self.total);
        Ok(self.total)
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Number of free buffers.
    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    /// Number of buffers owned by the transport.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().count(BufferOwnership::DeviceOwned)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Bytes per buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ownership(&self, index: u16) -> Option<BufferOwnership> {
        self.inner.lock().ownership.get(index as usize).copied()
    }

    pub fn lost_pixels(&self) -> bool {
        self.lost_pixels.load(Ordering::Acquire)
    }

    /// Read and clear the lost-pixels flag.
    pub fn take_lost_pixels(&self) -> bool {
        self.lost_pixels.swap(false, Ordering::AcqRel)
    }

    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock();
        PoolStats {
            total: self.total,
            available: inner.free.len(),
            in_flight: inner.count(BufferOwnership::DeviceOwned),
            lent: inner.count(BufferOwnership::DriverOwned),
            capacity: self.capacity,
            lost_pixels: self.lost_pixels(),
        }
    }
}
