//! Pipeline Demo - one Generator, one Processor, one subscriber
//! ============================================================
//!
//! Steps both actors by hand on the current task and prints every frame the
//! subscriber decodes from the in-process bus.
//!
//! Run:
//! ```bash
//! cargo run --example pipeline_demo -p lorenz_core
//! ```

use lorenz_core::{
    Actor, FrameLayout, Generator, GeneratorConfig, Lorenz, Processor, ProcessorConfig,
};
use lorenz_env::{ChannelQueue, LocalBus, MemoryStore, RecordingDiagnostics, TokioContext};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Lorenz pipeline demo");
    println!("====================\n");

    let store = Arc::new(MemoryStore::new());
    let queue = ChannelQueue::shared(4);
    let bus = LocalBus::new();

    let processor_config = ProcessorConfig::default();
    let mut subscriber = bus.subscribe(&processor_config.address);

    let mut generator = Generator::new(
        TokioContext::shared(),
        store.clone(),
        queue.clone(),
        Arc::new(RecordingDiagnostics::new()),
        GeneratorConfig {
            step_delay: Duration::from_millis(10),
            checkpoint_path: None,
            ..GeneratorConfig::default()
        },
    );
    let mut processor = Processor::new(
        store,
        queue,
        bus.publisher(),
        Box::new(Lorenz::default()),
        Arc::new(RecordingDiagnostics::new()),
        processor_config,
    );

    processor.setup().await?;
    generator.setup().await?;

    // One Generator step is enough: the Processor only takes the first seed
    generator.run_step().await;

    let layout = FrameLayout::new(3);
    for _ in 0..20 {
        processor.run_step().await;
        while let Some(bytes) = subscriber.try_recv() {
            let frame = layout.decode(&bytes)?;
            println!(
                "frame {:>3}  x={:>9.5}  y={:>9.5}  z={:>9.5}",
                frame.frame_number, frame.components[0], frame.components[1], frame.components[2]
            );
        }
    }

    generator.stop();
    processor.stop();
    println!("\n{} frames published", processor.frames_published());
    Ok(())
}
