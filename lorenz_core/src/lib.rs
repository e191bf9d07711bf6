//! Lorenz Pipeline Core - Generator/Processor actors for a real-time feed
//!
//! A Generator seeds a Processor through a state store and a work queue;
//! the Processor advances the state one explicit Euler step at a time and
//! broadcasts every frame as a flat array of little-endian f64 values.
//!
//! ```text
//! Generator ──put──► StateStore ◄──get── Processor ──frames──► PublishSocket ──► subscribers
//!     └──────── WorkItem(handle, tag) ───────►┘
//! ```

pub mod actor;
pub mod checkpoint;
pub mod dynamics;
pub mod error;
pub mod frame;
pub mod generator;
pub mod processor;
pub mod zmq_publisher;

// Re-export key types for convenience
pub use actor::{Actor, STATUS_FAILED, STATUS_OK};
pub use checkpoint::Checkpoint;
pub use dynamics::{euler_step, LinearDecay, Lorenz, LorenzParams, VectorField};
pub use error::{CheckpointError, FrameError, NumericalError, SetupError, StepError};
pub use frame::{DecodedFrame, Frame, FrameLayout};
pub use generator::{Continuation, Generator, GeneratorConfig, GeneratorStep, SeedSource};
pub use processor::{
    DivergencePolicy, Processor, ProcessorConfig, ProcessorState, ProcessorStep, SeedPolicy,
};
pub use zmq_publisher::ZmqPublisher;
