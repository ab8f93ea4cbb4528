//! Background job + result channel.
//!
//! An operation runs as a blocking closure on the tokio blocking pool. The
//! caller drives it with [`JobHandle::drive`], which wakes on a fixed tick,
//! hands every queued diagnostic to a callback in arrival order, and returns
//! the closure's result once the worker has finished and the queue is empty.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::diagnostics::{drain, Diagnostic, Diagnostics};

/// What a running operation gets to talk back with.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub diagnostics: Diagnostics,
    pub cancel: CancellationToken,
}

impl JobContext {
    /// A fresh context with its own channel and token.
    pub fn new() -> (Self, UnboundedReceiver<Diagnostic>) {
        let (diagnostics, rx) = Diagnostics::channel();
        (
            Self {
                diagnostics,
                cancel: CancellationToken::new(),
            },
            rx,
        )
    }

    /// Poll point. Returns `true` and pushes the canceled notice if the
    /// operation should stop here.
    pub fn should_stop(&self) -> bool {
        if self.cancel.is_canceled() {
            self.diagnostics.canceled();
            true
        } else {
            false
        }
    }
}

/// A submitted job.
pub struct JobHandle<T> {
    id: Uuid,
    cancel: CancellationToken,
    receiver: UnboundedReceiver<Diagnostic>,
    task: JoinHandle<T>,
}

/// Submit `work` to the blocking pool. Must be called inside a tokio runtime.
pub fn spawn_job<T, F>(name: &'static str, work: F) -> JobHandle<T>
where
    F: FnOnce(JobContext) -> T + Send + 'static,
    T: Send + 'static,
{
    let (ctx, receiver) = JobContext::new();
    let cancel = ctx.cancel.clone();
    let id = Uuid::new_v4();
    let span = tracing::info_span!("job", %id, name);

    tracing::debug!(%id, name, "submitting job");
    let task = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        work(ctx)
    });

    JobHandle {
        id,
        cancel,
        receiver,
        task,
    }
}

impl<T> JobHandle<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Token that cancels this job at its next poll point.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Consume diagnostics on a fixed tick until the job finishes.
    pub async fn drive<F>(mut self, tick: Duration, mut on_message: F) -> Result<T>
    where
        F: FnMut(Diagnostic),
    {
        let mut interval = tokio::time::interval(tick.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            // Check before draining: anything sent before completion is
            // already queued, so one more drain picks up the tail.
            let finished = self.task.is_finished();
            for message in drain(&mut self.receiver) {
                on_message(message);
            }
            if finished {
                break;
            }
        }

        self.task
            .await
            .with_context(|| format!("background job {} did not complete", self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drive_returns_result_and_all_messages_in_order() {
        let handle = spawn_job("count", |ctx| {
            for i in 0..5 {
                ctx.diagnostics.info(format!("step {i}"));
            }
            ctx.diagnostics.progress(5, 5);
            42
        });

        let mut seen = Vec::new();
        let result = handle
            .drive(Duration::from_millis(5), |d| seen.push(d))
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[0], Diagnostic::Info("step 0".into()));
        assert_eq!(seen[4], Diagnostic::Info("step 4".into()));
        assert_eq!(seen[5], Diagnostic::Progress(100.0));
    }

    #[tokio::test]
    async fn cancellation_is_seen_at_poll_point() {
        let handle = spawn_job("wait", |ctx| {
            let mut polls = 0u32;
            loop {
                if ctx.should_stop() {
                    return polls;
                }
                polls += 1;
                std::thread::sleep(Duration::from_millis(2));
            }
        });
        let token = handle.cancellation();
        token.cancel();

        let mut seen = Vec::new();
        handle
            .drive(Duration::from_millis(5), |d| seen.push(d))
            .await
            .unwrap();
        assert_eq!(
            seen,
            vec![Diagnostic::Info(crate::diagnostics::CANCELED_NOTICE.into())]
        );
    }

    #[tokio::test]
    async fn panicking_job_is_reported_as_error() {
        let handle = spawn_job("boom", |_ctx| -> u32 { panic!("boom") });
        let err = handle
            .drive(Duration::from_millis(5), |_| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not complete"));
    }

    #[test]
    fn should_stop_only_when_canceled() {
        let (ctx, mut rx) = JobContext::new();
        assert!(!ctx.should_stop());
        ctx.cancel.cancel();
        assert!(ctx.should_stop());
        assert_eq!(drain(&mut rx).len(), 1);
    }
}
