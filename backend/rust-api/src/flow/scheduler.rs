use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Delayed transition owned by a session.
///
/// Dropping it aborts the pending task, so replacing or discarding a session
/// can never let an old timer fire into it. `ticket` identifies which arming
/// a firing belongs to.
#[derive(Debug)]
pub struct ScheduledTransition {
    ticket: u64,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTransition {
    pub fn spawn<F>(ticket: u64, delay: Duration, fire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire.await;
        });

        Self {
            ticket,
            handle: Some(handle),
        }
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Called from inside the firing task: forget the handle without aborting it
    pub fn disarm(mut self) {
        self.handle.take();
    }

    pub fn cancel(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ScheduledTransition {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
