//! Structured progress reporting for index builds.
//!
//! Assembling, chunking and embedding thousands of records takes a while; the
//! reporter lets the CLI print incremental feedback without the pipeline
//! knowing how it is displayed.

use std::sync::Arc;
use std::time::Instant;

/// Progress event emitted while building the index.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// "assemble", "chunk", "embed" or "index"
    pub phase: String,

    /// Units processed so far (records, chunks, vectors)
    pub current: u64,

    /// Total expected work, when known
    pub total: Option<u64>,

    /// 0.0 - 100.0
    pub percentage: Option<f64>,

    pub message: String,

    /// Seconds since the reporter was created
    pub elapsed_secs: Option<f64>,
}

impl ProgressEvent {
    pub fn new(
        phase: impl Into<String>,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        let percentage =
            total.map(|t| if t > 0 { (current as f64 / t as f64) * 100.0 } else { 0.0 });

        Self {
            phase: phase.into(),
            current,
            total,
            percentage,
            message: message.into(),
            elapsed_secs: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self
    }

    /// One line for the terminal, e.g. `[embed] 20/85 (24%) - model=...`.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };

        let pct = self
            .percentage
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();

        format!("[{}] {}{} - {}", self.phase, progress, pct, self.message)
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Emits progress events through an optional callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Arc<Instant>,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.callback.is_some())
            .finish()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Arc::new(Instant::now()),
        }
    }

    /// A reporter that drops every event.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Arc::new(Instant::now()),
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        let Some(callback) = &self.callback else {
            return;
        };

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let event = event.with_elapsed(elapsed);

        tracing::debug!(
            phase = %event.phase,
            current = event.current,
            total = ?event.total,
            message = %event.message,
            elapsed_secs = elapsed,
            "Progress event"
        );

        callback(event);
    }

    pub fn assemble(&self, records: u64, skipped: u64, source: &str) {
        self.emit(ProgressEvent::new(
            "assemble",
            records,
            None,
            format!("{} records from {} ({} skipped)", records, source, skipped),
        ));
    }

    pub fn chunk(&self, records: u64, chunks: u64) {
        self.emit(ProgressEvent::new(
            "chunk",
            chunks,
            None,
            format!("{} chunks from {} records", chunks, records),
        ));
    }

    pub fn embed(&self, current: u64, total: u64, model: &str) {
        self.emit(ProgressEvent::new(
            "embed",
            current,
            Some(total),
            format!("model={}", model),
        ));
    }

    pub fn index(&self, current: u64, total: u64, backend: &str) {
        self.emit(ProgressEvent::new(
            "index",
            current,
            Some(total),
            format!("writing to {}", backend),
        ));
    }
}
