//! Pipeline configuration and host-supplied adapter facts.

use crate::error::ConfigError;

/// Largest pool a `u16` buffer index can address.
pub const MAX_TRANSFER_BUFFERS: usize = u16::MAX as usize;

/// Default transfer buffer size: 16 pages less a 512 byte tail.
pub const DEFAULT_BUFFER_CAPACITY: usize = 16 * 4096 - 512;

/// How the end of a frame is signalled on the bulk stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfFrame {
    /// One zero-length transfer after the last line.
    ZeroLength,
    /// No marker; the frame ends with its last line.
    None,
}

/// Adapter silicon revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipRevision {
    Original,
    /// Later revision with I2C monitor detection and the LPM workaround bit.
    Dx,
}

/// Negotiated USB link speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSpeed {
    SuperSpeed,
    /// Lower-bandwidth link; forces 16-bit compressed output at <= 60 Hz.
    HighSpeed,
}

impl LinkSpeed {
    pub fn is_bandwidth_limited(&self) -> bool {
        matches!(self, Self::HighSpeed)
    }
}

/// Transfer/render pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of render contexts (N_ctx)
    pub render_contexts: usize,
    /// Number of transfer buffers (N_buf)
    pub transfer_buffers: usize,
    /// Bytes per transfer buffer
    pub buffer_capacity: usize,
    /// Busy contexts above which no redundant frame is scheduled
    pub busy_cap: usize,
    /// Bounded wait for a free transfer buffer (ms)
    pub acquire_timeout_ms: u32,
    /// Attempts at claiming a free render context
    pub enqueue_retries: u32,
    /// Sleep between context claim attempts (ms)
    pub enqueue_backoff_ms: u32,
    /// Poll interval while waiting for busy contexts to drain (ms)
    pub stop_poll_ms: u32,
    /// End-of-frame marker
    pub end_of_frame: EndOfFrame,
    /// Delay between DDC dword reads (ms)
    pub i2c_delay_ms: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            render_contexts: 16,
            transfer_buffers: 4,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            busy_cap: 2,
            acquire_timeout_ms: 1000,
            enqueue_retries: 4,
            enqueue_backoff_ms: 10,
            stop_poll_ms: 10,
            end_of_frame: EndOfFrame::ZeroLength,
            i2c_delay_ms: 10,
        }
    }
}

impl PipelineConfig {
    /// Smallest working pipeline: one buffer, two contexts, short waits.
    pub const fn minimal() -> Self {
        Self {
            render_contexts: 2,
            transfer_buffers: 1,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            busy_cap: 1,
            acquire_timeout_ms: 50,
            enqueue_retries: 2,
            enqueue_backoff_ms: 1,
            stop_poll_ms: 1,
            end_of_frame: EndOfFrame::ZeroLength,
            i2c_delay_ms: 1,
        }
    }

    /// Deeper queues for large modes on a fast link.
    pub const fn high_throughput() -> Self {
        Self {
            render_contexts: 32,
            transfer_buffers: 8,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            busy_cap: 3,
            acquire_timeout_ms: 1000,
            enqueue_retries: 4,
            enqueue_backoff_ms: 10,
            stop_poll_ms: 10,
            end_of_frame: EndOfFrame::ZeroLength,
            i2c_delay_ms: 10,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render_contexts == 0 {
            return Err(ConfigError::NoRenderContexts);
        }
        if self.transfer_buffers == 0 {
            return Err(ConfigError::NoTransferBuffers);
        }
        if self.transfer_buffers > MAX_TRANSFER_BUFFERS {
            return Err(ConfigError::TooManyBuffers(self.transfer_buffers));
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::ZeroBufferCapacity);
        }
        if self.busy_cap == 0 {
            return Err(ConfigError::ZeroBusyCap);
        }
        if self.busy_cap > self.render_contexts {
            return Err(ConfigError::BusyCapTooLarge {
                busy_cap: self.busy_cap,
                contexts: self.render_contexts,
            });
        }
        Ok(())
    }
}
