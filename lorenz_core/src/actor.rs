//! Actor lifecycle - the interface the external scheduler drives.
//!
//! # Lifecycle
//!
//! ```text
//!   setup() ──► run_step() ──► run_step() ──► ... ──► stop()
//!     │             │                                   │
//!     │             └─ errors logged, never returned    └─ status code
//!     └─ errors abort startup
//! ```
//!
//! The scheduler may run different actors in parallel but calls one
//! actor's `run_step` sequentially, never reentrantly. Actors spawn no
//! tasks of their own.
//!
//! # Usage
//!
//! ```ignore
//! use lorenz_core::{Actor, Generator, GeneratorConfig};
//!
//! let mut generator = Generator::new(ctx, store, queue, diagnostics, GeneratorConfig::default());
//! generator.setup().await?;
//! for _ in 0..10 {
//!     generator.run_step().await;
//! }
//! assert_eq!(generator.stop(), STATUS_OK);
//! ```

use crate::error::SetupError;
use async_trait::async_trait;

/// Clean shutdown.
pub const STATUS_OK: i32 = 0;

/// Shutdown completed but something could not be released or persisted.
pub const STATUS_FAILED: i32 = 1;

/// The capability set `{setup, run_step, stop}` shared by every actor.
#[async_trait]
pub trait Actor: Send + 'static {
    /// Actor's logical name (for logging)
    fn name(&self) -> &str;

    /// Acquires resources. Failure means the actor cannot run at all.
    async fn setup(&mut self) -> Result<(), SetupError>;

    /// Performs one step. Waits are bounded; failures are logged, not returned.
    async fn run_step(&mut self);

    /// Releases resources. Safe at any point between steps, including when
    /// `setup` never ran or failed.
    fn stop(&mut self) -> i32;
}
