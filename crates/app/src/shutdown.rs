//! Shutdown signalling and bounded task joins.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Broadcasts a one-shot stop request to every background loop.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    sender: watch::Sender<bool>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Ask every listener to stop. Idempotent.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    #[must_use]
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Receiving side held by a background loop.
#[derive(Clone, Debug)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Resolve once shutdown was requested (immediately if it already was).
    pub async fn wait(&mut self) {
        // a dropped sender also means stop
        let _ = self.receiver.wait_for(|stop| *stop).await;
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Wait for a task to finish, aborting it after `timeout`.
///
/// Returns the task output, or `None` if it panicked or had to be aborted.
pub async fn join_with_timeout<T>(
    name: &str,
    mut handle: JoinHandle<T>,
    timeout: Duration,
) -> Option<T> {
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(output)) => {
            tracing::debug!(task = name, "task stopped");
            Some(output)
        }
        Ok(Err(err)) => {
            tracing::error!(task = name, %err, "task failed");
            None
        }
        Err(_) => {
            tracing::warn!(task = name, ?timeout, "task did not stop in time, aborting");
            handle.abort();
            None
        }
    }
}
