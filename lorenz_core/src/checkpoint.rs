//! Seed checkpoints persisted by the Generator between runs.

use crate::error::CheckpointError;
use lorenz_env::StateVector;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Rows written on `stop()` and reusable as a later run's seed.
///
/// JSON keeps f64 values exact (shortest round-trip representation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub rows: Vec<StateVector>,
}

impl Checkpoint {
    pub fn new(rows: Vec<StateVector>) -> Self {
        Self { rows }
    }

    /// Writes the checkpoint, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads a checkpoint. Empty checkpoints are rejected.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let reader = BufReader::new(File::open(path)?);
        let checkpoint: Self = serde_json::from_reader(reader)?;
        if checkpoint.rows.is_empty() {
            return Err(CheckpointError::Empty);
        }
        Ok(checkpoint)
    }
}
