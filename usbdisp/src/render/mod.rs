//! Render pipeline.
//!
//! ```text
//!  submit_frame ──> [free] ──claim──> [ready] ──render──> [busy]
//!                     ▲                  │                  │
//!                     └─────release──────┘                  │
//!                     └────────────last completion──────────┘
//! ```

pub mod context;
pub mod frame;
pub mod link;
pub mod scheduler;

pub use context::{ContextPool, ListCounts, ListKind};
pub use frame::{Frame, LineEncoding};
pub use link::LinkState;
pub use scheduler::{DropReason, FrameOutcome, Pipeline, PipelineEvent, PipelineStats};
