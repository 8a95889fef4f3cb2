//! Render scheduler.
//!
//! # Flow
//! ```text
//! submit_frame ─► claim free ctx ─► ready FIFO ─► pass ─► lines ─► transport
//!                                                  ▲                   │
//!      poll() ◄── event queue ◄── retire ◄── completion (any context) ◄┘
//! ```
//!
//! A scheduling pass renders the whole ready FIFO, then tops the link up
//! with redundant copies of the last submitted frame while fewer than
//! `busy_cap` contexts are busy, at most `busy_cap` of them per pass.
//!
//! Completions never schedule work themselves: they return the buffer,
//! retire the context and post an event. [`Pipeline::poll`] consumes the
//! events on the caller's path and runs the next pass.

use alloc::collections::VecDeque;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use super::context::{ContextPool, ListCounts};
use super::frame::{Frame, LineEncoding};
use super::link::LinkState;
use crate::config::{EndOfFrame, PipelineConfig};
use crate::dma::{
    CompletionSink, CompletionStatus, ContextId, PoolStats, TransferBuffer, TransferKind,
    TransferPool, TransferTag,
};
use crate::driver::traits::{BulkTransport, Clock};
use crate::error::{Error, PoolError};
use crate::mode::DisplayParams;
use crate::monitor::Presence;

/// Why a frame produced no transfers (or stopped part-way).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Green light off.
    LinkStopped,
    DeviceGone,
    /// No free render context within the retry window.
    NoContext,
    /// No transfer buffer within the bounded wait.
    NoBuffer,
    NoMonitor,
    /// Frame geometry/format differs from the negotiated mode.
    GeometryMismatch,
    /// Transport rejected a transfer; the green light is now off.
    SubmitFailed,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::LinkStopped => "link stopped",
            Self::DeviceGone => "device gone",
            Self::NoContext => "no free render context",
            Self::NoBuffer => "no transfer buffer",
            Self::NoMonitor => "no monitor attached",
            Self::GeometryMismatch => "frame does not match display mode",
            Self::SubmitFailed => "transfer submission failed",
        };
        f.write_str(text)
    }
}

/// Result of [`Pipeline::submit_frame`]. Drops are never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Accepted,
    Dropped(DropReason),
}

impl FrameOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Posted from the completion path, consumed by [`Pipeline::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Last transfer of a context completed; it is free again.
    ContextRetired(ContextId),
    /// A transfer failed on the wire.
    TransferFailed(CompletionStatus),
    /// The transport reported the adapter removed.
    DeviceGone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    pub frames_submitted: u64,
    pub frames_rendered: u64,
    pub redundant_frames: u64,
    pub frames_dropped: u64,
    pub transfers_submitted: u64,
    pub transfers_completed: u64,
    pub transfer_errors: u64,
}

#[derive(Default)]
struct Counters {
    frames_submitted: AtomicU64,
    frames_rendered: AtomicU64,
    redundant_frames: AtomicU64,
    frames_dropped: AtomicU64,
    transfers_submitted: AtomicU64,
    transfers_completed: AtomicU64,
    transfer_errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            frames_submitted: self.frames_submitted.load(Ordering::Relaxed),
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            redundant_frames: self.redundant_frames.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            transfers_submitted: self.transfers_submitted.load(Ordering::Relaxed),
            transfers_completed: self.transfers_completed.load(Ordering::Relaxed),
            transfer_errors: self.transfer_errors.load(Ordering::Relaxed),
        }
    }
}

/// Per-context results of one scheduling pass.
#[derive(Debug, Default)]
struct PassReport {
    outcomes: Vec<(ContextId, Result<(), DropReason>)>,
}

impl PassReport {
    fn outcome_of(&self, id: ContextId) -> Option<Result<(), DropReason>> {
        self.outcomes.iter().find(|(c, _)| *c == id).map(|(_, r)| *r)
    }
}

/// Transfer/render pipeline for one adapter.
pub struct Pipeline {
    this: Weak<Pipeline>,
    config: PipelineConfig,
    transport: Arc<dyn BulkTransport>,
    clock: Arc<dyn Clock>,
    presence: Arc<Presence>,
    link: LinkState,
    pool: TransferPool,
    contexts: ContextPool,
    params: Mutex<Option<DisplayParams>>,
    last_frame: Mutex<Option<Frame>>,
    events: Mutex<VecDeque<PipelineEvent>>,
    /// Held for the duration of a scheduling pass.
    pass: Mutex<()>,
    counters: Counters,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        transport: Arc<dyn BulkTransport>,
        clock: Arc<dyn Clock>,
        presence: Arc<Presence>,
    ) -> Result<Arc<Self>, Error> {
        config.validate()?;

        log::info!(
            "usbdisp: pipeline with {} render contexts, busy cap {}",
            config.render_contexts,
            config.busy_cap
        );

        Ok(Arc::new_cyclic(|this| Self {
            this: this.clone(),
            config,
            transport,
            clock,
            presence,
            link: LinkState::new(),
            pool: TransferPool::new(config.transfer_buffers, config.buffer_capacity),
            contexts: ContextPool::new(config.render_contexts),
            params: Mutex::new(None),
            last_frame: Mutex::new(None),
            events: Mutex::new(VecDeque::with_capacity(config.render_contexts)),
            pass: Mutex::new(()),
            counters: Counters::default(),
        }))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LINK CONTROL
    // ═══════════════════════════════════════════════════════════════════════

    /// Green light on. Refused once the device is gone.
    pub fn start(&self) -> bool {
        if !self.link.start() {
            log::error!("usbdisp: cannot start pipeline, device gone");
            return false;
        }
        log::debug!("usbdisp: green light on");
        true
    }

    /// Green light off, queued work back to free, then wait for every busy
    /// context to drain.
    ///
    /// In-flight transfers run to completion. There is no hard timeout.
    /// Must not be called from the completion context. Returns the time
    /// waited in milliseconds.
    pub fn stop(&self) -> u64 {
        self.link.stop();
        let flushed = self.contexts.flush_ready();
        let waited = self.wait_idle();
        log::info!(
            "usbdisp: pipeline stopped ({} queued contexts released, waited {} ms)",
            flushed,
            waited
        );
        waited
    }

    fn wait_idle(&self) -> u64 {
        let started = self.clock.now_ms();
        // a pass in progress may still move contexts to busy
        while self.contexts.counts().busy != 0 || self.pass.is_locked() {
            self.clock.delay_ms(self.config.stop_poll_ms);
        }
        self.clock.now_ms().saturating_sub(started)
    }

    /// Stop and release the transfer buffers.
    pub fn shutdown(&self, timeout_ms: u32) -> Result<usize, PoolError> {
        self.stop();
        self.pool.drain(&*self.clock, timeout_ms)
    }

    pub fn is_running(&self) -> bool {
        self.link.can_submit()
    }

    pub fn is_device_gone(&self) -> bool {
        self.link.is_device_gone()
    }

    /// Latch the device as gone and stop new submissions.
    pub fn mark_device_gone(&self) {
        if self.link.mark_device_gone() {
            log::error!("usbdisp: device gone");
        }
    }

    pub fn link(&self) -> &LinkState {
        &self.link
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MODE STATE
    // ═══════════════════════════════════════════════════════════════════════

    pub fn set_params(&self, params: Option<DisplayParams>) {
        *self.params.lock() = params;
    }

    pub fn params(&self) -> Option<DisplayParams> {
        *self.params.lock()
    }

    /// Forget the last submitted frame so no redundant refresh reuses it.
    pub fn clear_last_frame(&self) {
        *self.last_frame.lock() = None;
    }

    pub fn last_frame_num(&self) -> Option<u64> {
        self.last_frame.lock().as_ref().map(Frame::frame_num)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SUBMISSION
    // ═══════════════════════════════════════════════════════════════════════

    /// Queue a frame for display. Best-effort: drops are counted, not raised.
    ///
    /// The frame becomes the "last submitted" frame even when dropped.
    pub fn submit_frame(&self, frame: Frame) -> FrameOutcome {
        Counters::bump(&self.counters.frames_submitted);
        *self.last_frame.lock() = Some(frame.clone());

        if self.link.is_device_gone() {
            return self.dropped(DropReason::DeviceGone, frame.frame_num());
        }
        if !self.link.is_green() {
            log::debug!("usbdisp: green light off, frame {} not queued", frame.frame_num());
            return self.dropped(DropReason::LinkStopped, frame.frame_num());
        }

        let frame_num = frame.frame_num();
        let Some(id) = self.claim_with_retry(frame) else {
            log::warn!("usbdisp: no free render context for frame {}", frame_num);
            return self.dropped(DropReason::NoContext, frame_num);
        };

        log::trace!("usbdisp: frame {} queued on {}", frame_num, id);

        match self.schedule_pass().outcome_of(id) {
            Some(Err(reason)) => FrameOutcome::Dropped(reason),
            // rendered, or still queued behind a pass running elsewhere
            _ => FrameOutcome::Accepted,
        }
    }

    fn claim_with_retry(&self, frame: Frame) -> Option<ContextId> {
        let attempts = self.config.enqueue_retries.max(1);
        for attempt in 0..attempts {
            if let Some(id) = self.contexts.claim(frame.clone(), false) {
                return Some(id);
            }
            if attempt + 1 < attempts {
                self.clock.delay_ms(self.config.enqueue_backoff_ms);
            }
        }
        None
    }

    fn dropped(&self, reason: DropReason, frame_num: u64) -> FrameOutcome {
        Counters::bump(&self.counters.frames_dropped);
        log::trace!("usbdisp: frame {} dropped: {}", frame_num, reason);
        FrameOutcome::Dropped(reason)
    }

    /// Consume the events queued so far and run a pass if any context
    /// retired (or work is waiting). Returns the number of events handled.
    pub fn poll(&self) -> usize {
        let batch: Vec<PipelineEvent> = {
            let mut events = self.events.lock();
            events.drain(..).collect()
        };

        let mut retired = 0usize;
        for event in &batch {
            match event {
                PipelineEvent::ContextRetired(_) => retired += 1,
                PipelineEvent::TransferFailed(status) => {
                    log::debug!("usbdisp: transfer failed: {:?}", status);
                }
                PipelineEvent::DeviceGone => {}
            }
        }

        if (retired > 0 || self.contexts.counts().ready > 0) && self.link.can_submit() {
            self.schedule_pass();
        }

        batch.len()
    }

    pub fn pending_events(&self) -> usize {
        self.events.lock().len()
    }

    fn post(&self, event: PipelineEvent) {
        let mut events = self.events.lock();
        // bounded: only the fact that something retired matters to poll()
        if events.len() >= self.config.render_contexts.max(1) * 2 {
            events.pop_front();
        }
        events.push_back(event);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SCHEDULING
    // ═══════════════════════════════════════════════════════════════════════

    fn schedule_pass(&self) -> PassReport {
        let mut report = PassReport::default();

        let Some(_pass) = self.pass.try_lock() else {
            // the running pass drains the ready queue
            return report;
        };

        let mut redundant = 0usize;
        loop {
            while let Some(id) = self.contexts.take_ready() {
                let outcome = if self.link.can_submit() {
                    self.render_context(id)
                } else {
                    self.contexts.release(id);
                    Err(self.stop_reason())
                };
                if let Err(reason) = outcome {
                    Counters::bump(&self.counters.frames_dropped);
                    log::trace!("usbdisp: {} dropped: {}", id, reason);
                }
                report.outcomes.push((id, outcome));
            }

            if redundant >= self.config.busy_cap
                || !self.link.can_submit()
                || self.contexts.counts().busy >= self.config.busy_cap
            {
                break;
            }

            let Some(frame) = self.refresh_candidate() else {
                break;
            };
            if self.contexts.claim(frame, true).is_none() {
                break;
            }
            redundant += 1;
        }

        report
    }

    /// Last submitted frame, if it can be shown in the current mode.
    fn refresh_candidate(&self) -> Option<Frame> {
        let frame = self.last_frame.lock().clone()?;
        let params = self.params()?;
        (self.presence.is_present() && frame.matches(&params)).then_some(frame)
    }

    fn stop_reason(&self) -> DropReason {
        if self.link.is_device_gone() {
            DropReason::DeviceGone
        } else {
            DropReason::LinkStopped
        }
    }

    /// Render a taken ready context. Every exit leaves it busy with
    /// transfers in flight, or free.
    fn render_context(&self, id: ContextId) -> Result<(), DropReason> {
        let Some(frame) = self.contexts.frame_of(id) else {
            self.contexts.release(id);
            return Err(DropReason::LinkStopped);
        };
        let Some(params) = self.params() else {
            self.contexts.release(id);
            return Err(DropReason::LinkStopped);
        };
        if !self.presence.is_present() {
            log::debug!("usbdisp: monitor not attached, {} back to free", id);
            self.contexts.release(id);
            return Err(DropReason::NoMonitor);
        }
        if !frame.matches(&params) {
            log::warn!(
                "usbdisp: frame {}x{} {} does not match mode {}",
                frame.width(),
                frame.height(),
                frame.format(),
                params
            );
            self.contexts.release(id);
            return Err(DropReason::GeometryMismatch);
        }

        let redundant = self.contexts.is_redundant(id);
        self.contexts.begin_busy(id);

        let result = self.push_frame(id, &frame, &params);

        // drop the submitting caller's hold
        if self.contexts.finish_one(id) {
            self.contexts.retire(id);
        }

        if result.is_ok() {
            Counters::bump(&self.counters.frames_rendered);
            if redundant {
                Counters::bump(&self.counters.redundant_frames);
            }
        }
        result
    }

    fn push_frame(&self, id: ContextId, frame: &Frame, params: &DisplayParams) -> Result<(), DropReason> {
        let encoding = LineEncoding::new(frame.format(), params.output);
        let src_bpp = encoding.src_bpp();
        let chunk_pixels = encoding.pixels_per_chunk(self.pool.capacity());
        let width = frame.width() as usize;

        for y in 0..frame.height() {
            if !self.link.can_submit() {
                return Err(self.stop_reason());
            }
            let line = frame.line(y).ok_or(DropReason::GeometryMismatch)?;

            let mut x = 0;
            while x < width {
                let pixels = chunk_pixels.min(width - x);
                let src = &line[x * src_bpp..(x + pixels) * src_bpp];

                let mut buffer = self.acquire()?;
                let len = encoding.encode(src, buffer.as_mut_slice());
                self.submit(id, buffer, len, TransferKind::Line)?;

                x += pixels;
            }
        }

        if self.config.end_of_frame == EndOfFrame::ZeroLength {
            let buffer = self.acquire()?;
            self.submit(id, buffer, 0, TransferKind::EndOfFrame)?;
        }

        log::trace!("usbdisp: frame {} on the wire via {}", frame.frame_num(), id);
        Ok(())
    }

    fn acquire(&self) -> Result<TransferBuffer, DropReason> {
        self.pool
            .acquire(&self.link, &*self.clock, self.config.acquire_timeout_ms)
            .map_err(|e| match e {
                PoolError::DeviceGone => DropReason::DeviceGone,
                PoolError::Timeout => DropReason::NoBuffer,
                _ => DropReason::LinkStopped,
            })
    }

    fn submit(
        &self,
        id: ContextId,
        buffer: TransferBuffer,
        len: usize,
        kind: TransferKind,
    ) -> Result<(), DropReason> {
        let Some(sink) = self.this.upgrade() else {
            self.pool.release(buffer);
            return Err(DropReason::LinkStopped);
        };
        let sink: Arc<dyn CompletionSink> = sink;

        let tag = TransferTag { context: id, kind };
        let transfer = self.pool.prepare(buffer, len, tag, sink).map_err(|e| {
            log::error!("usbdisp: {}", e);
            DropReason::SubmitFailed
        })?;

        self.contexts.add_pending(id);
        Counters::bump(&self.counters.transfers_submitted);

        match self.pool.submit(&*self.transport, transfer) {
            Ok(()) => Ok(()),
            Err(PoolError::Submit(error)) => {
                self.link.stop();
                if error.is_device_gone() {
                    self.mark_device_gone();
                    return Err(DropReason::DeviceGone);
                }
                log::error!("usbdisp: submission failed ({}), green light off", error);
                Err(DropReason::SubmitFailed)
            }
            Err(_) => {
                self.link.stop();
                Err(DropReason::SubmitFailed)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // STATISTICS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    pub fn counts(&self) -> ListCounts {
        self.contexts.counts()
    }

    pub fn contexts(&self) -> &ContextPool {
        &self.contexts
    }

    pub fn pool(&self) -> &TransferPool {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Sticky "frames were lost" flag.
    pub fn lost_pixels(&self) -> bool {
        self.pool.lost_pixels()
    }

    pub fn take_lost_pixels(&self) -> bool {
        self.pool.take_lost_pixels()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl CompletionSink for Pipeline {
    fn transfer_complete(&self, buffer: TransferBuffer, tag: TransferTag, status: CompletionStatus) {
        self.pool.reclaim(buffer, status);
        Counters::bump(&self.counters.transfers_completed);

        if status.is_device_gone() {
            self.mark_device_gone();
            self.post(PipelineEvent::DeviceGone);
        } else if !status.is_ok() && !status.is_expected_shutdown() {
            Counters::bump(&self.counters.transfer_errors);
            log::warn!("usbdisp: transfer for {} failed: {:?}", tag.context, status);
            self.post(PipelineEvent::TransferFailed(status));
        }

        if self.contexts.finish_one(tag.context) {
            self.contexts.retire(tag.context);
            self.post(PipelineEvent::ContextRetired(tag.context));
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("green", &self.link.is_green())
            .field("device_gone", &self.link.is_device_gone())
            .field("counts", &self.contexts.counts())
            .field("pool", &self.pool.stats())
            .finish()
    }
}
