//! In-flight bulk transfer.
//!
//! A [`Transfer`] owns its buffer from submission until completion. The
//! transport completes it exactly once with [`Transfer::complete`]; a
//! transfer dropped without completing is completed as `Unlinked`, so a
//! buffer can never leak out of the pool.

use alloc::sync::Arc;
use core::fmt;

use super::buffer::TransferBuffer;
use crate::error::TransportError;

/// Render context slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub usize);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// One horizontal line (or a capacity-sized chunk of one).
    Line,
    /// Zero-length end-of-frame marker.
    EndOfFrame,
}

/// What a transfer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTag {
    pub context: ContextId,
    pub kind: TransferKind,
}

/// Final status of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Ok,
    /// Cancelled by an unlink (or dropped uncompleted).
    Unlinked,
    /// Port or link reset.
    LinkReset,
    /// Host controller shutting down.
    Shutdown,
    /// Transfer failed on the wire.
    LinkError(i32),
    /// Adapter physically removed.
    DeviceRemoved,
    /// Never reached the wire: the transport refused it at submission.
    Rejected(TransportError),
}

impl CompletionStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Statuses expected while tearing down; they do not count as lost pixels.
    pub fn is_expected_shutdown(&self) -> bool {
        matches!(
            self,
            Self::Unlinked | Self::LinkReset | Self::Shutdown | Self::DeviceRemoved
        )
    }

    /// Statuses after which the adapter is gone for good.
    pub fn is_device_gone(&self) -> bool {
        match self {
            Self::DeviceRemoved => true,
            Self::Rejected(e) => e.is_device_gone(),
            _ => false,
        }
    }

    /// Whether frames were lost because of this completion.
    pub fn loses_pixels(&self) -> bool {
        !self.is_ok() && !self.is_expected_shutdown()
    }
}

/// Receiver of transfer completions.
///
/// Called from the transport's completion context: implementations must not
/// block beyond short spin-lock sections.
pub trait CompletionSink: Send + Sync {
    fn transfer_complete(&self, buffer: TransferBuffer, tag: TransferTag, status: CompletionStatus);
}

/// One bulk OUT submission and its completion hook.
pub struct Transfer {
    buffer: Option<TransferBuffer>,
    len: usize,
    tag: TransferTag,
    sink: Arc<dyn CompletionSink>,
}

impl Transfer {
    /// Wrap a filled buffer. `len` is clamped to the buffer's capacity.
    pub fn new(
        buffer: TransferBuffer,
        len: usize,
        tag: TransferTag,
        sink: Arc<dyn CompletionSink>,
    ) -> Self {
        let len = len.min(buffer.capacity());
        Self {
            buffer: Some(buffer),
            len,
            tag,
            sink,
        }
    }

    /// Bytes to put on the wire.
    pub fn payload(&self) -> &[u8] {
        match &self.buffer {
            Some(buffer) => &buffer.as_slice()[..self.len],
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn tag(&self) -> TransferTag {
        self.tag
    }

    pub fn buffer_index(&self) -> Option<u16> {
        self.buffer.as_ref().map(TransferBuffer::index)
    }

    /// Report the final status. Consumes the transfer.
    pub fn complete(mut self, status: CompletionStatus) {
        self.finish(status);
    }

    fn finish(&mut self, status: CompletionStatus) {
        if let Some(buffer) = self.buffer.take() {
            self.sink.transfer_complete(buffer, self.tag, status);
        }
    }
}

impl Drop for Transfer {
    fn drop(&mut self) {
        if self.buffer.is_some() {
            log::trace!("transfer for {} dropped uncompleted", self.tag.context);
            self.finish(CompletionStatus::Unlinked);
        }
    }
}

impl fmt::Debug for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transfer")
            .field("buffer", &self.buffer_index())
            .field("len", &self.len)
            .field("tag", &self.tag)
            .finish()
    }
}
