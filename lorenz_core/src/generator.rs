//! Generator - seeds the pipeline at a fixed cadence.
//!
//! Each step stores the next unsent row in the state store and announces
//! its handle on the outbound queue. Delivery is at-most-once: a frame whose
//! enqueue fails is dropped, never retried, so the step cadence cannot be
//! held up by a full or closed queue.

use crate::actor::{Actor, STATUS_FAILED, STATUS_OK};
use crate::checkpoint::Checkpoint;
use crate::error::{SetupError, StepError};

use async_trait::async_trait;
use lorenz_env::{Diagnostics, PipelineContext, StateStore, StateVector, WorkItem, WorkQueue};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Where the initial rows come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedSource {
    /// Deterministic rows
    Fixed(Vec<StateVector>),

    /// `rows` samples of shape 1 x `cols`, integer-valued in `[0, max)`
    Random { rows: usize, cols: usize, max: u32 },

    /// Rows persisted by an earlier run's `stop()`
    Checkpoint(PathBuf),
}

/// What happens once every seed row has been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Send nothing more
    Idle,

    /// Append a fresh 1 x `cols` sample so the pipeline never runs dry
    Synthesize { cols: usize, max: u32 },
}

/// Configuration for a Generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Actor's logical name (for logging and store labels)
    pub name: String,

    /// Fixed delay at the start of every step (default: 500ms)
    pub step_delay: Duration,

    pub seed: SeedSource,

    pub continuation: Continuation,

    /// Checkpoint written on `stop()` (None = don't persist)
    pub checkpoint_path: Option<PathBuf>,

    /// RNG stream requested from the context
    pub rng_stream: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            name: "lorenz_generator".to_string(),
            step_delay: Duration::from_millis(500),
            seed: SeedSource::Fixed(vec![StateVector::point(1.0, 1.0, 1.0)]),
            continuation: Continuation::Idle,
            checkpoint_path: Some(PathBuf::from("lorenz_initial_data.json")),
            rng_stream: 1,
        }
    }
}

/// Outcome of one successful Generator step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorStep {
    /// A row was stored and enqueued under this tag
    Sent { tag: u64 },

    /// Rows were exhausted; a new one was appended for the next step
    Synthesized,

    /// Rows were exhausted and nothing is synthesized
    Exhausted,
}

/// Produces seed state and publishes handles to it.
pub struct Generator<Ctx, S, Q>
where
    Ctx: PipelineContext,
    S: StateStore,
    Q: WorkQueue,
{
    config: GeneratorConfig,

    context: Arc<Ctx>,

    store: Arc<S>,

    /// Outbound edge to the Processor
    queue: Arc<Q>,

    diagnostics: Arc<dyn Diagnostics>,

    /// Generator-owned rows; the store only ever receives copies
    rows: Vec<StateVector>,

    /// Index of the next row to send
    frame_num: u64,

    rng: Option<ChaCha8Rng>,

    sent: u64,

    dropped: u64,
}

impl<Ctx, S, Q> Generator<Ctx, S, Q>
where
    Ctx: PipelineContext,
    S: StateStore,
    Q: WorkQueue,
{
    pub fn new(
        context: Arc<Ctx>,
        store: Arc<S>,
        queue: Arc<Q>,
        diagnostics: Arc<dyn Diagnostics>,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            config,
            context,
            store,
            queue,
            diagnostics,
            rows: Vec::new(),
            frame_num: 0,
            rng: None,
            sent: 0,
            dropped: 0,
        }
    }

    /// Rows currently held (seed rows plus any synthesized ones).
    pub fn rows(&self) -> &[StateVector] {
        &self.rows
    }

    /// Index of the next row to send.
    pub fn frame_num(&self) -> u64 {
        self.frame_num
    }

    /// Frames successfully enqueued.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Frames lost to enqueue failures.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Runs the store/enqueue part of a step, without the cadence delay.
    pub fn try_step(&mut self) -> Result<GeneratorStep, StepError> {
        let index = self.frame_num as usize;

        if index >= self.rows.len() {
            return match self.config.continuation {
                Continuation::Idle => Ok(GeneratorStep::Exhausted),
                Continuation::Synthesize { cols, max } => {
                    let row = sample_row(self.rng_mut(), cols, max)?;
                    self.rows.push(row);
                    Ok(GeneratorStep::Synthesized)
                }
            };
        }

        let label = format!("{}: {}", self.config.name, self.frame_num);
        let handle = self.store.put(&self.rows[index], &label)?;

        // Advance before enqueue: a failed enqueue drops this frame for good
        let tag = self.frame_num;
        self.frame_num += 1;

        match self.queue.enqueue(WorkItem::new(handle.clone(), tag)) {
            Ok(()) => {
                self.sent += 1;
                Ok(GeneratorStep::Sent { tag })
            }
            Err(e) => {
                self.dropped += 1;
                // No WorkItem will ever carry this handle
                if let Err(store_err) = self.store.remove(&handle) {
                    self.diagnostics
                        .warn(&format!("Could not release {}: {}", handle, store_err));
                }
                Err(e.into())
            }
        }
    }

    fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        let context = &self.context;
        let stream = self.config.rng_stream;
        self.rng.get_or_insert_with(|| context.rng(stream))
    }

    fn build_rows(&mut self) -> Result<Vec<StateVector>, SetupError> {
        match self.config.seed.clone() {
            SeedSource::Fixed(rows) => Ok(rows),
            SeedSource::Random { rows, cols, max } => (0..rows)
                .map(|_| sample_row(self.rng_mut(), cols, max))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| SetupError::Config(e.to_string())),
            SeedSource::Checkpoint(path) => Ok(Checkpoint::load(path)?.rows),
        }
    }
}

/// Draws a 1 x `cols` row of integers in `[0, max)`.
fn sample_row(rng: &mut ChaCha8Rng, cols: usize, max: u32) -> Result<StateVector, StepError> {
    let max = max.max(1);
    let values: Vec<f64> = (0..cols).map(|_| rng.gen_range(0..max) as f64).collect();
    Ok(StateVector::table(1, cols, &values)?)
}

#[async_trait]
impl<Ctx, S, Q> Actor for Generator<Ctx, S, Q>
where
    Ctx: PipelineContext,
    S: StateStore,
    Q: WorkQueue,
{
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn setup(&mut self) -> Result<(), SetupError> {
        self.diagnostics.info("Beginning setup");

        let zero_columns = matches!(self.config.continuation, Continuation::Synthesize { cols: 0, .. })
            || matches!(self.config.seed, SeedSource::Random { cols: 0, .. });
        if zero_columns {
            return Err(SetupError::Config("sample rows need at least one column".into()));
        }

        self.rng = Some(self.context.rng(self.config.rng_stream));
        self.diagnostics.debug(&format!(
            "Context seed {}, RNG stream {}",
            self.context.seed(),
            self.config.rng_stream
        ));
        self.rows = self.build_rows()?;
        self.frame_num = 0;

        match self.rows.first() {
            Some(first) => self
                .diagnostics
                .info(&format!("Initialized {} row(s), first: {}", self.rows.len(), first)),
            None => self.diagnostics.warn("Initialized with no rows"),
        }
        Ok(())
    }

    async fn run_step(&mut self) {
        self.context.sleep(self.config.step_delay).await;

        match self.try_step() {
            Ok(GeneratorStep::Sent { tag }) => {
                let row = &self.rows[tag as usize];
                self.diagnostics.info(&format!(
                    "Sent frame {} at t={:.3}s: {}",
                    tag,
                    self.context.now().as_secs_f64(),
                    row
                ));
            }
            Ok(GeneratorStep::Synthesized) => {
                self.diagnostics.debug(&format!("Synthesized row {}", self.rows.len() - 1));
            }
            Ok(GeneratorStep::Exhausted) => {}
            Err(StepError::Queue(e)) => {
                self.diagnostics
                    .error(&format!("Dropped frame {}: {}", self.frame_num - 1, e));
            }
            Err(e) => {
                self.diagnostics.error(&format!("Step skipped: {}", e));
            }
        }
    }

    fn stop(&mut self) -> i32 {
        self.diagnostics.info("Stopping");

        let Some(path) = self.config.checkpoint_path.clone() else {
            return STATUS_OK;
        };
        if self.rows.is_empty() {
            self.diagnostics.debug("Nothing to persist");
            return STATUS_OK;
        }

        match Checkpoint::new(self.rows.clone()).save(&path) {
            Ok(()) => {
                self.diagnostics
                    .info(&format!("Saved {} row(s) to {}", self.rows.len(), path.display()));
                STATUS_OK
            }
            Err(e) => {
                self.diagnostics.error(&format!("Could not save checkpoint: {}", e));
                STATUS_FAILED
            }
        }
    }
}
