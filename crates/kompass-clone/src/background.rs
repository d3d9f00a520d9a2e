//! Side-effect writes submitted during a clone run and awaited at its end.

use std::future::Future;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use kompass_core::Result;

/// Set of background writes with a single completion point.
///
/// Tasks start running as soon as they are spawned. [`drain`](Self::drain)
/// waits for all of them and logs every failure.
#[derive(Default)]
pub struct BackgroundTasks {
    tasks: Mutex<JoinSet<(String, Result<()>)>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a labelled write.
    pub async fn spawn<F>(&self, label: impl Into<String>, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let label = label.into();
        self.tasks
            .lock()
            .await
            .spawn(async move { (label, task.await) });
    }

    /// Wait for every submitted write. Returns the number that failed.
    pub async fn drain(&self) -> usize {
        let mut tasks = std::mem::take(&mut *self.tasks.lock().await);
        let mut completed = 0usize;
        let mut failures = 0usize;

        while let Some(joined) = tasks.join_next().await {
            completed += 1;
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((label, Err(e))) => {
                    failures += 1;
                    warn!(
                        subsystem = "clone",
                        component = "background",
                        task = %label,
                        error = %e,
                        "Background write failed"
                    );
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        subsystem = "clone",
                        component = "background",
                        error = ?e,
                        "Background task panicked or was cancelled"
                    );
                }
            }
        }

        debug!(
            subsystem = "clone",
            component = "background",
            completed,
            failures,
            "Background writes drained"
        );
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kompass_core::Error;

    #[tokio::test]
    async fn test_drain_counts_failures() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("ok", async { Ok(()) }).await;
        tasks
            .spawn("touch page 7", async { Err(Error::PageNotFound(7)) })
            .await;
        tasks.spawn("ok again", async { Ok(()) }).await;

        assert_eq!(tasks.drain().await, 1);
        // Drained set is empty afterwards.
        assert_eq!(tasks.drain().await, 0);
    }
}
