//! Diagnostics sink injected into each actor.

use std::sync::{Arc, Mutex};

/// Severity of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// Where an actor reports what happened during a step.
///
/// Actors receive their sink at construction; nothing in the pipeline logs
/// through process-wide state of its own.
pub trait Diagnostics: Send + Sync + 'static {
    fn record(&self, severity: Severity, message: &str);

    fn debug(&self, message: &str) {
        self.record(Severity::Debug, message);
    }

    fn info(&self, message: &str) {
        self.record(Severity::Info, message);
    }

    fn warn(&self, message: &str) {
        self.record(Severity::Warn, message);
    }

    fn error(&self, message: &str) {
        self.record(Severity::Error, message);
    }
}

/// Forwards records to `tracing`, tagged with the actor name.
#[derive(Debug, Clone)]
pub struct TracingDiagnostics {
    actor: String,
}

impl TracingDiagnostics {
    pub fn new(actor: impl Into<String>) -> Self {
        Self { actor: actor.into() }
    }

    pub fn shared(actor: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(actor))
    }
}

impl Diagnostics for TracingDiagnostics {
    fn record(&self, severity: Severity, message: &str) {
        let actor = self.actor.as_str();
        match severity {
            Severity::Debug => tracing::debug!(actor, "{}", message),
            Severity::Info => tracing::info!(actor, "{}", message),
            Severity::Warn => tracing::warn!(actor, "{}", message),
            Severity::Error => tracing::error!(actor, "{}", message),
        }
    }
}

/// Keeps every record in memory. Used by tests to assert on what an actor
/// reported.
#[derive(Debug, Clone, Default)]
pub struct RecordingDiagnostics {
    records: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records so far.
    pub fn records(&self) -> Vec<(Severity, String)> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of records at `severity`.
    pub fn count(&self, severity: Severity) -> usize {
        self.records().iter().filter(|(s, _)| *s == severity).count()
    }

    /// True if any record at `severity` contains `needle`.
    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.records()
            .iter()
            .any(|(s, m)| *s == severity && m.contains(needle))
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn record(&self, severity: Severity, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push((severity, message.to_string()));
        }
    }
}
