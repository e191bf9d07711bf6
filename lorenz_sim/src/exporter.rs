//! JSON exporter for published frames.
//!
//! Subscribes to the Processor's broadcast channel like any external
//! consumer would and records every decodable frame for offline plotting.

use lorenz_core::FrameLayout;
use lorenz_env::BusSubscriber;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tokio::sync::watch;
use tracing::{debug, warn};

/// A single decoded frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedFrame {
    pub frame_number: u64,
    pub components: Vec<f64>,
}

/// Complete frame export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameExport {
    /// Address the frames were published on
    pub address: String,

    /// State components per frame
    pub dimension: usize,

    pub frames: Vec<ExportedFrame>,

    /// Messages that did not match the layout
    pub malformed: u64,
}

impl FrameExport {
    /// Creates an empty export container.
    pub fn new(address: &str, dimension: usize) -> Self {
        Self {
            address: address.to_string(),
            dimension,
            frames: Vec::new(),
            malformed: 0,
        }
    }

    /// Decodes one raw message. Returns false if it was malformed.
    pub fn ingest(&mut self, bytes: &[u8]) -> bool {
        match FrameLayout::new(self.dimension).decode(bytes) {
            Ok(frame) => {
                self.frames.push(ExportedFrame {
                    frame_number: frame.frame_number,
                    components: frame.components,
                });
                true
            }
            Err(e) => {
                warn!("Discarding message: {}", e);
                self.malformed += 1;
                false
            }
        }
    }

    /// Frame numbers strictly increase with no gaps.
    pub fn is_contiguous(&self) -> bool {
        self.frames
            .windows(2)
            .all(|w| w[1].frame_number == w[0].frame_number + 1)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

/// Records frames until shutdown, then drains whatever is still buffered.
pub async fn collect(
    mut subscriber: BusSubscriber,
    mut export: FrameExport,
    mut shutdown: watch::Receiver<bool>,
) -> FrameExport {
    loop {
        tokio::select! {
            message = subscriber.recv() => match message {
                Some(bytes) => {
                    export.ingest(&bytes);
                }
                None => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    while let Some(bytes) = subscriber.try_recv() {
        export.ingest(&bytes);
    }
    debug!(frames = export.frames.len(), "Export collected");
    export
}
