//! Processor - owns one evolving state and broadcasts every frame.
//!
//! # State machine
//!
//! ```text
//!                  first WorkItem drained + materialized
//!  Uninitialized ─────────────────────────────────────────► Running
//!    │  timeout: log "waiting", return                        │  Euler step → commit → encode → send
//!    │  queue/store/shape error: log, stay                    │  (Reseed: take one pending item first)
//!    └───────────────────────◄ never ◄───────────────────────┘
//! ```
//!
//! The update is computed into a temporary and validated before it replaces
//! the owned state, so a failed step never leaves partial state behind.

use crate::actor::{Actor, STATUS_OK};
use crate::dynamics::{euler_step, VectorField};
use crate::error::{NumericalError, SetupError, StepError};
use crate::frame::Frame;

use async_trait::async_trait;
use lorenz_env::{
    Diagnostics, PublishSocket, QueueError, ShapeError, StateStore, StateVector, WorkItem,
    WorkQueue,
};
use std::sync::Arc;
use std::time::Duration;

/// What to do with inbound items once the Processor is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedPolicy {
    /// The first seed is authoritative; the queue is never read again
    Once,

    /// Each step takes at most one already-queued item (no waiting) and
    /// replaces the working state with it. Frame numbering continues.
    Reseed,
}

/// What to do when an update produces NaN/Inf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivergencePolicy {
    /// Keep the last good state and publish nothing this step
    Skip,

    /// Restore the state the Processor was seeded with
    Reset,
}

/// Configuration for a Processor.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Actor's logical name (for logging)
    pub name: String,

    /// Broadcast address bound at setup
    pub address: String,

    /// Euler step size (default: 0.01)
    pub dt: f64,

    /// Bound on the inbound receive while uninitialized (default: 50ms)
    pub receive_timeout: Duration,

    /// Number carried by the first published frame (default: 1)
    pub initial_frame_number: u64,

    pub seed_policy: SeedPolicy,

    pub divergence: DivergencePolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            name: "lorenz_processor".to_string(),
            address: "tcp://127.0.0.1:5555".to_string(),
            dt: 0.01,
            receive_timeout: Duration::from_millis(50),
            initial_frame_number: 1,
            seed_policy: SeedPolicy::Once,
            divergence: DivergencePolicy::Skip,
        }
    }
}

/// Lifecycle of the owned state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Uninitialized,
    Running,
}

/// Outcome of one successful Processor step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorStep {
    /// No seed yet; the receive timed out
    Waiting,

    /// A frame went out with this number
    Published { frame_number: u64 },

    /// The update diverged and the state was restored to its seed
    Reset,
}

struct WorkingState {
    /// As materialized from the store, kept for `DivergencePolicy::Reset`
    seed: StateVector,

    /// Processor-owned copy advanced every step
    current: StateVector,
}

/// Advances a seeded state with a vector field and publishes each frame.
pub struct Processor<S, Q, P>
where
    S: StateStore,
    Q: WorkQueue,
    P: PublishSocket,
{
    config: ProcessorConfig,

    field: Box<dyn VectorField>,

    store: Arc<S>,

    /// Inbound edge from the Generator
    queue: Arc<Q>,

    publisher: P,

    diagnostics: Arc<dyn Diagnostics>,

    working: Option<WorkingState>,

    /// Number the next published frame will carry
    frame_number: u64,

    frames_published: u64,

    seeds_received: u64,
}

impl<S, Q, P> Processor<S, Q, P>
where
    S: StateStore,
    Q: WorkQueue,
    P: PublishSocket,
{
    pub fn new(
        store: Arc<S>,
        queue: Arc<Q>,
        publisher: P,
        field: Box<dyn VectorField>,
        diagnostics: Arc<dyn Diagnostics>,
        config: ProcessorConfig,
    ) -> Self {
        let frame_number = config.initial_frame_number;
        Self {
            config,
            field,
            store,
            queue,
            publisher,
            diagnostics,
            working: None,
            frame_number,
            frames_published: 0,
            seeds_received: 0,
        }
    }

    pub fn state(&self) -> ProcessorState {
        if self.working.is_some() {
            ProcessorState::Running
        } else {
            ProcessorState::Uninitialized
        }
    }

    /// The owned state, once seeded.
    pub fn current_state(&self) -> Option<&StateVector> {
        self.working.as_ref().map(|w| &w.current)
    }

    /// Number the next published frame will carry.
    pub fn next_frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn frames_published(&self) -> u64 {
        self.frames_published
    }

    /// Seeds accepted so far (1 under `SeedPolicy::Once`).
    pub fn seeds_received(&self) -> u64 {
        self.seeds_received
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Runs one step and reports what happened instead of logging it.
    pub async fn try_step(&mut self) -> Result<ProcessorStep, StepError> {
        if self.working.is_none() {
            match self.queue.dequeue(self.config.receive_timeout).await {
                Ok(item) => self.seed_from(item)?,
                Err(QueueError::Timeout(_)) => return Ok(ProcessorStep::Waiting),
                Err(e) => return Err(e.into()),
            }
        } else if self.config.seed_policy == SeedPolicy::Reseed {
            // A bad re-seed must not cost the running state its step
            match self.queue.dequeue(Duration::ZERO).await {
                Ok(item) => {
                    if let Err(e) = self.seed_from(item) {
                        self.diagnostics.warn(&format!("Re-seed rejected: {}", e));
                    }
                }
                Err(QueueError::Timeout(_)) => {}
                Err(e) => self.diagnostics.warn(&format!("Re-seed check failed: {}", e)),
            }
        }

        self.advance()
    }

    /// Materializes a seed from the store and takes ownership of a copy.
    fn seed_from(&mut self, item: WorkItem) -> Result<(), StepError> {
        let state = self.store.get(&item.handle)?;

        if !self.field.accepts(state.dimension()) {
            return Err(NumericalError::DimensionMismatch {
                field: self.field.name(),
                dimension: state.dimension(),
            }
            .into());
        }

        if !state.is_finite() {
            let component = state
                .components()
                .iter()
                .position(|v| !v.is_finite())
                .unwrap_or(0);
            return Err(NumericalError::NonFinite { component }.into());
        }

        // Subscribers parse with a fixed layout; the frame width never changes
        if let Some(working) = &self.working {
            if working.current.dimension() != state.dimension() {
                return Err(ShapeError {
                    expected: working.current.dimension(),
                    actual: state.dimension(),
                }
                .into());
            }
        }

        let verb = if self.working.is_some() { "Re-seeded" } else { "Initialized" };
        self.diagnostics.info(&format!(
            "{} from {} (tag {}): {}",
            verb, item.handle, item.sequence_tag, state
        ));

        self.working = Some(WorkingState {
            seed: state.clone(),
            current: state,
        });
        self.seeds_received += 1;
        Ok(())
    }

    /// Integrates, commits, and publishes one frame.
    fn advance(&mut self) -> Result<ProcessorStep, StepError> {
        let Some(working) = self.working.as_mut() else {
            return Ok(ProcessorStep::Waiting);
        };

        let components = working.current.components();
        let next = match euler_step(self.field.as_ref(), &components, self.config.dt) {
            Ok(next) => working.current.with_components(&next)?,
            Err(NumericalError::NonFinite { component })
                if self.config.divergence == DivergencePolicy::Reset =>
            {
                working.current = working.seed.clone();
                self.diagnostics.warn(&format!(
                    "Diverged in component {}; state reset to seed {}",
                    component, working.current
                ));
                return Ok(ProcessorStep::Reset);
            }
            Err(e) => return Err(e.into()),
        };

        // Commit, then publish. A failed send keeps the new state but not the number.
        working.current = next;
        let frame = Frame::new(working.current.clone(), self.frame_number);
        self.publisher.send(&frame.encode())?;

        self.frame_number += 1;
        self.frames_published += 1;
        Ok(ProcessorStep::Published {
            frame_number: frame.frame_number,
        })
    }
}

#[async_trait]
impl<S, Q, P> Actor for Processor<S, Q, P>
where
    S: StateStore,
    Q: WorkQueue,
    P: PublishSocket,
{
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn setup(&mut self) -> Result<(), SetupError> {
        if !(self.config.dt.is_finite() && self.config.dt > 0.0) {
            return Err(SetupError::Config(format!("dt must be positive, got {}", self.config.dt)));
        }

        self.publisher.bind(&self.config.address)?;
        self.diagnostics.info(&format!(
            "Completed setup: field '{}', dt {}, publishing on {}",
            self.field.name(),
            self.config.dt,
            self.config.address
        ));
        Ok(())
    }

    async fn run_step(&mut self) {
        match self.try_step().await {
            Ok(ProcessorStep::Waiting) => {
                self.diagnostics.debug("Waiting for initial coordinates...");
            }
            Ok(ProcessorStep::Published { frame_number }) => {
                if let Some(state) = self.current_state() {
                    self.diagnostics
                        .info(&format!("Sent frame {}: {}", frame_number, state));
                }
            }
            Ok(ProcessorStep::Reset) => {}
            Err(e) => {
                self.diagnostics.error(&format!("Error during processing: {}", e));
            }
        }
    }

    fn stop(&mut self) -> i32 {
        self.diagnostics.info("Stopping");
        if self.publisher.is_bound() {
            self.publisher.close();
        }
        STATUS_OK
    }
}
