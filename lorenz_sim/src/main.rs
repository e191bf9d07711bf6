//! Lorenz pipeline CLI
//!
//! Runs a Generator/Processor pair and broadcasts the evolving state.

use clap::{Parser, ValueEnum};
use lorenz_core::{
    Continuation, DivergencePolicy, Generator, GeneratorConfig, LinearDecay, Lorenz, LorenzParams,
    Processor, ProcessorConfig, SeedPolicy, SeedSource, VectorField, ZmqPublisher,
};
use lorenz_env::{
    ChannelQueue, LocalBus, MemoryStore, PipelineContext, PublishSocket, StateVector,
    TokioContext, TracingDiagnostics,
};
use lorenz_sim::{collect, FrameExport, PipelineRunner, RunnerConfig, SimContext};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// In-process broadcast bus
    Bus,
    /// ZeroMQ PUB socket (needs the `zmq` feature)
    Zmq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FieldKind {
    Lorenz,
    Decay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SeedKind {
    /// Single point (1, 1, 1)
    Fixed,
    /// Integer-valued 1 x N samples
    Random,
    /// Rows saved by a previous run
    Checkpoint,
}

/// Lorenz pipeline runner
#[derive(Parser, Debug)]
#[command(name = "lorenz-sim")]
#[command(about = "Run the Lorenz Generator/Processor pipeline", long_about = None)]
struct Args {
    /// Processor steps to run
    #[arg(short = 'n', long, default_value = "200")]
    steps: u64,

    /// Wall-clock limit in seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// Broadcast transport
    #[arg(long, value_enum, default_value = "bus")]
    transport: Transport,

    /// Broadcast address
    #[arg(short, long, default_value = "tcp://127.0.0.1:5555")]
    address: String,

    /// Vector field integrated by the Processor
    #[arg(long, value_enum, default_value = "lorenz")]
    field: FieldKind,

    #[arg(long, default_value = "10.0")]
    sigma: f64,

    #[arg(long, default_value = "28.0")]
    rho: f64,

    #[arg(long, default_value = "2.667")]
    beta: f64,

    /// Rate for the decay field
    #[arg(long, default_value = "0.1")]
    decay_rate: f64,

    /// Euler step size
    #[arg(long, default_value = "0.01")]
    dt: f64,

    /// Generator step delay in milliseconds
    #[arg(long, default_value = "500")]
    delay_ms: u64,

    /// Processor receive timeout in milliseconds
    #[arg(long, default_value = "50")]
    timeout_ms: u64,

    /// Where the Generator's rows come from
    #[arg(long, value_enum, default_value = "fixed")]
    seed_source: SeedKind,

    /// Checkpoint file read by `--seed-source checkpoint` and written on stop
    #[arg(long, default_value = "lorenz_initial_data.json")]
    checkpoint: PathBuf,

    /// Don't write a checkpoint on stop
    #[arg(long)]
    no_checkpoint: bool,

    /// Random rows to draw
    #[arg(long, default_value = "1")]
    sample_rows: usize,

    /// Columns per random row
    #[arg(long, default_value = "5")]
    sample_cols: usize,

    /// Upper bound (exclusive) for random values
    #[arg(long, default_value = "10")]
    sample_max: u32,

    /// Keep drawing rows once the seed rows are sent
    #[arg(long)]
    synthesize: bool,

    /// Let later WorkItems replace the running state
    #[arg(long)]
    reseed: bool,

    /// Restore the seed state on divergence instead of skipping the frame
    #[arg(long)]
    reset_on_divergence: bool,

    /// Number of the first published frame
    #[arg(long, default_value = "1")]
    initial_frame: u64,

    /// Run on a virtual clock with this master seed
    #[arg(long)]
    sim_seed: Option<u64>,

    /// Export published frames to a JSON file (bus transport only)
    #[arg(long)]
    export: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON summary on stdout
    #[arg(long)]
    json: bool,
}

impl Args {
    fn field(&self) -> Box<dyn VectorField> {
        match self.field {
            FieldKind::Lorenz => Box::new(Lorenz::new(LorenzParams {
                s: self.sigma,
                r: self.rho,
                b: self.beta,
            })),
            FieldKind::Decay => Box::new(LinearDecay { rate: self.decay_rate }),
        }
    }

    fn generator_config(&self) -> GeneratorConfig {
        let seed = match self.seed_source {
            SeedKind::Fixed => SeedSource::Fixed(vec![StateVector::point(1.0, 1.0, 1.0)]),
            SeedKind::Random => SeedSource::Random {
                rows: self.sample_rows,
                cols: self.sample_cols,
                max: self.sample_max,
            },
            SeedKind::Checkpoint => SeedSource::Checkpoint(self.checkpoint.clone()),
        };
        let continuation = if self.synthesize {
            Continuation::Synthesize {
                cols: self.sample_cols,
                max: self.sample_max,
            }
        } else {
            Continuation::Idle
        };

        GeneratorConfig {
            step_delay: Duration::from_millis(self.delay_ms),
            seed,
            continuation,
            checkpoint_path: (!self.no_checkpoint).then(|| self.checkpoint.clone()),
            ..GeneratorConfig::default()
        }
    }

    fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            address: self.address.clone(),
            dt: self.dt,
            receive_timeout: Duration::from_millis(self.timeout_ms),
            initial_frame_number: self.initial_frame,
            seed_policy: if self.reseed { SeedPolicy::Reseed } else { SeedPolicy::Once },
            divergence: if self.reset_on_divergence {
                DivergencePolicy::Reset
            } else {
                DivergencePolicy::Skip
            },
            ..ProcessorConfig::default()
        }
    }

    /// Wall-clock limit, rejecting negative, NaN, and out-of-range values.
    fn max_duration(&self) -> Result<Option<Duration>, String> {
        self.duration
            .map(|secs| {
                Duration::try_from_secs_f64(secs)
                    .map_err(|e| format!("--duration {} is not a valid time limit: {}", secs, e))
            })
            .transpose()
    }

    /// Components per frame, when it is known before the run.
    fn frame_dimension(&self) -> Option<usize> {
        match (self.field, self.seed_source) {
            (FieldKind::Lorenz, _) => Some(3),
            (FieldKind::Decay, SeedKind::Fixed) => Some(3),
            (FieldKind::Decay, SeedKind::Random) => Some(self.sample_cols),
            (FieldKind::Decay, SeedKind::Checkpoint) => None,
        }
    }
}

/// Builds the pipeline, runs it, and returns the process exit code.
async fn run_pipeline<Ctx, P>(
    args: &Args,
    context: Arc<Ctx>,
    publisher: P,
    bus: Option<&LocalBus>,
) -> i32
where
    Ctx: PipelineContext,
    P: PublishSocket,
{
    let max_duration = match args.max_duration() {
        Ok(limit) => limit,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    let store = Arc::new(MemoryStore::new());
    let queue = ChannelQueue::shared(16);

    let generator_config = args.generator_config();
    let processor_config = args.processor_config();

    let generator = Generator::new(
        context,
        store.clone(),
        queue.clone(),
        TracingDiagnostics::shared(&generator_config.name),
        generator_config,
    );
    let processor = Processor::new(
        store,
        queue,
        publisher,
        args.field(),
        TracingDiagnostics::shared(&processor_config.name),
        processor_config,
    );

    // Subscribe before the first frame can go out
    let (export_tx, export_rx) = watch::channel(false);
    let export_task = match (&args.export, bus, args.frame_dimension()) {
        (Some(_), Some(bus), Some(dimension)) => Some(tokio::spawn(collect(
            bus.subscribe(&args.address),
            FrameExport::new(&args.address, dimension),
            export_rx,
        ))),
        (Some(_), None, _) => {
            error!("--export needs the bus transport");
            return 1;
        }
        (Some(_), _, None) => {
            error!("--export needs a known frame dimension; use --seed-source fixed or random");
            return 1;
        }
        _ => None,
    };

    let runner = PipelineRunner::new(RunnerConfig {
        processor_steps: args.steps,
        max_duration,
    });

    let outcome = match runner.run(generator, processor).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    let _ = export_tx.send(true);
    let exported = match (export_task, &args.export) {
        (Some(task), Some(path)) => match task.await {
            Ok(export) => {
                if let Err(e) = export.write_to_file(path) {
                    error!("Failed to write export: {:?}", e);
                } else {
                    info!("Exported {} frames to {}", export.frames.len(), path.display());
                }
                Some(export.frames.len())
            }
            Err(e) => {
                error!("Export task failed: {}", e);
                None
            }
        },
        _ => None,
    };

    let final_state = outcome
        .processor
        .current_state()
        .map(|s| s.components().iter().copied().collect::<Vec<f64>>());

    if args.json {
        let summary = serde_json::json!({
            "frames_published": outcome.processor.frames_published(),
            "processor_steps": outcome.processor_steps,
            "generator_sent": outcome.generator.sent(),
            "generator_dropped": outcome.generator.dropped(),
            "final_state": final_state,
            "elapsed_secs": outcome.elapsed.as_secs_f64(),
            "exported_frames": exported,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to render summary: {}", e),
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            "Published {} frames in {} steps ({:.2}s)",
            outcome.processor.frames_published(),
            outcome.processor_steps,
            outcome.elapsed.as_secs_f64()
        );
        if let Some(state) = outcome.processor.current_state() {
            info!("Final state: {}", state);
        }
    }

    if outcome.clean() {
        0
    } else {
        1
    }
}

async fn dispatch<Ctx: PipelineContext>(args: &Args, context: Arc<Ctx>) -> i32 {
    match args.transport {
        Transport::Bus => {
            let bus = LocalBus::new();
            run_pipeline(args, context, bus.publisher(), Some(&bus)).await
        }
        Transport::Zmq => run_pipeline(args, context, ZmqPublisher::new(), None).await,
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("Lorenz pipeline v{}", env!("CARGO_PKG_VERSION"));
    }

    let code = match args.sim_seed {
        Some(seed) => {
            info!(seed, "Running on a virtual clock");
            dispatch(&args, SimContext::shared(seed)).await
        }
        None => dispatch(&args, TokioContext::shared()).await,
    };

    if code != 0 {
        std::process::exit(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["lorenz-sim"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_duration_accepts_positive_seconds() {
        assert_eq!(parse(&[]).max_duration(), Ok(None));
        assert_eq!(
            parse(&["--duration", "1.5"]).max_duration(),
            Ok(Some(Duration::from_millis(1500)))
        );
    }

    #[test]
    fn test_duration_rejects_negative_and_nan() {
        assert!(parse(&["--duration=-1"]).max_duration().is_err());
        assert!(parse(&["--duration", "NaN"]).max_duration().is_err());
    }

    #[tokio::test]
    async fn test_bad_duration_exits_with_failure() {
        let args = parse(&["--duration=-2", "--no-checkpoint"]);
        let bus = LocalBus::new();
        let code = run_pipeline(&args, TokioContext::shared(), bus.publisher(), Some(&bus)).await;

        assert_eq!(code, 1);
        assert!(!bus.is_bound(&args.address));
    }
}
