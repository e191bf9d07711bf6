//! Lorenz Pipeline Harness
//!
//! Runs a Generator/Processor pair under a scheduler, either in real time
//! (`TokioContext`) or on a virtual clock with seeded randomness
//! (`SimContext`), and records the published frames for inspection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     PipelineRunner                       │
//! │  ┌────────────┐   WorkQueue    ┌────────────┐            │
//! │  │ Generator  │───────────────►│ Processor  │──► PUB ────┼──► subscribers
//! │  │  (task)    │   StateStore   │  (task)    │            │    (FrameExport)
//! │  └────────────┘◄──────────────►└────────────┘            │
//! │        ▲ shutdown (watch)            ▲                   │
//! └────────┴─────────────────────────────┴───────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use lorenz_sim::{PipelineRunner, RunnerConfig};
//!
//! let runner = PipelineRunner::new(RunnerConfig { processor_steps: 200, max_duration: None });
//! let outcome = runner.run(generator, processor).await?;
//! assert!(outcome.clean());
//! ```

mod context;
pub mod exporter;
pub mod runner;

pub use context::SimContext;
pub use exporter::{collect, ExportedFrame, FrameExport};
pub use runner::{PipelineRunner, RunError, RunOutcome, RunnerConfig};
