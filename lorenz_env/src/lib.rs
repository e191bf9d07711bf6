//! Lorenz Pipeline Environment Layer
//!
//! Contracts for everything the pipeline actors consume but do not own,
//! plus in-process reference implementations of each:
//!
//! - Time and randomness (`PipelineContext`, `TokioContext`)
//! - Bulk payload storage (`StateStore`, `MemoryStore`)
//! - Stage-to-stage messaging (`WorkQueue`, `ChannelQueue`)
//! - Frame broadcast (`PublishSocket`, `LocalBus`)
//! - Diagnostics (`Diagnostics`, `TracingDiagnostics`)
//!
//! # Example
//!
//! ```ignore
//! use lorenz_env::{ChannelQueue, MemoryStore, StateStore, StateVector, WorkItem, WorkQueue};
//!
//! let store = MemoryStore::new();
//! let queue = ChannelQueue::shared(8);
//!
//! let handle = store.put(&StateVector::point(1.0, 1.0, 1.0), "seed")?;
//! queue.enqueue(WorkItem::new(handle, 0))?;
//! ```

mod context;
mod diagnostics;
mod error;
mod publish;
mod queue;
mod store;
mod tokio_impl;
mod types;

pub use context::PipelineContext;
pub use diagnostics::{Diagnostics, RecordingDiagnostics, Severity, TracingDiagnostics};
pub use error::{QueueError, ShapeError, StoreError, TransportError};
pub use publish::{BusPublisher, BusSubscriber, LocalBus, PublishSocket};
pub use queue::{ChannelQueue, WorkQueue};
pub use store::{MemoryStore, StateStore};
pub use tokio_impl::TokioContext;
pub use types::{Handle, StateKind, StateVector, WorkItem};
