//! Owned periodic background task
//!
//! A [`PeriodicSweep`] runs a synchronous closure on a fixed interval inside
//! a tokio task until it is stopped or dropped. Caches and rate limiters use
//! it to purge expired state.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CommonError, CommonResult};

/// Handle to a running periodic task
#[derive(Debug)]
pub struct PeriodicSweep {
    name: String,
    interval: Duration,
    cancellation_token: CancellationToken,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicSweep {
    /// Spawn `tick` on the current tokio runtime, first firing after one
    /// full `interval`
    ///
    /// # Errors
    ///
    /// Returns `CommonError::Config` if `interval` is zero and
    /// `CommonError::TaskCancelled` if no tokio runtime is available.
    pub fn spawn<F>(name: impl Into<String>, interval: Duration, tick: F) -> CommonResult<Self>
    where
        F: Fn() + Send + 'static,
    {
        let name = name.into();
        if interval.is_zero() {
            return Err(CommonError::config_field("interval", "must be greater than zero"));
        }
        let runtime = Handle::try_current().map_err(|e| {
            CommonError::task_cancelled_with_reason(name.clone(), e.to_string())
        })?;

        let cancellation_token = CancellationToken::new();
        let cancel = cancellation_token.clone();
        let task_name = name.clone();
        let handle = runtime.spawn(async move {
            Self::sweep_loop(task_name, interval, cancel, tick).await;
        });

        info!(sweep = %name, interval_ms = interval.as_millis() as u64, "Periodic sweep started");

        Ok(Self { name, interval, cancellation_token, task_handle: Mutex::new(Some(handle)) })
    }

    async fn sweep_loop<F>(name: String, interval: Duration, cancel: CancellationToken, tick: F)
    where
        F: Fn() + Send + 'static,
    {
        let mut ticker = tokio::time::interval(interval);
        // The first tick of a tokio interval completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(sweep = %name, "Sweep loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    tick();
                }
            }
        }
    }

    /// Name used in log events
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the task has not been stopped yet
    pub fn is_running(&self) -> bool {
        !self.cancellation_token.is_cancelled() && self.task_handle.lock().is_some()
    }

    /// Signal the task to stop. Idempotent.
    pub fn stop(&self) {
        if self.cancellation_token.is_cancelled() {
            return;
        }
        self.cancellation_token.cancel();
        // The loop exits at its next poll; the handle is detached.
        drop(self.task_handle.lock().take());
        info!(sweep = %self.name, "Periodic sweep stopped");
    }

    /// Stop the task and wait for it to finish
    ///
    /// # Errors
    ///
    /// Returns `CommonError::Timeout` if the task does not finish within
    /// five seconds.
    pub async fn shutdown(&self) -> CommonResult<()> {
        self.cancellation_token.cancel();
        let handle = self.task_handle.lock().take();
        if let Some(handle) = handle {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(sweep = %self.name, error = %e, "Sweep task panicked");
                    return Err(CommonError::task_cancelled_with_reason(
                        self.name.clone(),
                        e.to_string(),
                    ));
                }
                Err(_) => {
                    warn!(sweep = %self.name, "Sweep task did not complete within timeout");
                    return Err(CommonError::timeout(
                        format!("shutdown {}", self.name),
                        Duration::from_secs(5),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Drop for PeriodicSweep {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() {
            debug!(sweep = %self.name, "PeriodicSweep dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}
