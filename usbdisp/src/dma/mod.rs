//! Transfer buffer management.
//!
//! A fixed set of pre-allocated buffers cycles between the pool's free list
//! and exactly one in-flight [`Transfer`].

pub mod buffer;
pub mod ownership;
pub mod pool;
pub mod transfer;

pub use buffer::TransferBuffer;
pub use ownership::BufferOwnership;
pub use pool::{PoolStats, TransferPool};
pub use transfer::{CompletionSink, CompletionStatus, ContextId, Transfer, TransferKind, TransferTag};
