//! Worker → surface diagnostics channel.
//!
//! An ordered, unbounded, multi-producer/single-consumer queue. Every message
//! is mirrored to `tracing` at the matching level, under [`LOG_TARGET`], when
//! it is pushed.

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// Notice pushed when an operation stops at a cancellation poll point.
pub const CANCELED_NOTICE: &str = "operation canceled";

/// `tracing` target of mirrored diagnostics.
pub const LOG_TARGET: &str = "examtrend::diagnostics";

/// One message from a running operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Diagnostic {
    Info(String),
    Warning(String),
    Error(String),
    /// Percentage in `0.0..=100.0`.
    Progress(f64),
}

/// Sending half of the diagnostics channel.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    tx: UnboundedSender<Diagnostic>,
}

impl Diagnostics {
    /// Create a connected sender/receiver pair.
    pub fn channel() -> (Self, UnboundedReceiver<Diagnostic>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: LOG_TARGET, "{message}");
        self.send(Diagnostic::Info(message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: LOG_TARGET, "{message}");
        self.send(Diagnostic::Warning(message));
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(target: LOG_TARGET, "{message}");
        self.send(Diagnostic::Error(message));
    }

    /// Report that `done` of `total` items are finished.
    pub fn progress(&self, done: usize, total: usize) {
        let percent = if total == 0 {
            100.0
        } else {
            (done as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        };
        tracing::debug!(target: LOG_TARGET, done, total, "progress {percent:.0}%");
        self.send(Diagnostic::Progress(percent));
    }

    pub fn canceled(&self) {
        self.info(CANCELED_NOTICE);
    }

    fn send(&self, diagnostic: Diagnostic) {
        // The surface may already be gone; the log line above still stands.
        let _ = self.tx.send(diagnostic);
    }
}

/// Take every message currently queued, in arrival order, without waiting.
pub fn drain(rx: &mut UnboundedReceiver<Diagnostic>) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(d) => out.push(d),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
    out
}
