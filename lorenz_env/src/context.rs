//! Core environment context trait for pipeline actors.

use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

/// The central interface for time and randomness.
///
/// Actors never touch the clock or an entropy source directly, so the same
/// Generator/Processor code runs against the wall clock in production and
/// against a virtual clock in simulation.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, entropy-seeded RNG
/// - **Simulation**: `SimContext` (in `lorenz_sim`) - virtual clock, `ChaCha8Rng(seed)`
#[async_trait]
pub trait PipelineContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);

    /// Returns an RNG for the given stream.
    ///
    /// Seeded contexts derive the generator from the master seed and
    /// `stream`, so each actor gets its own reproducible sequence.
    fn rng(&self, stream: u64) -> ChaCha8Rng;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
