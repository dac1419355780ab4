//! Fan-out/fan-in supervision of long-running tasks.
//!
//! The supervisor owns the shared [`CancellationToken`]. The first task to
//! return an error cancels the token so its siblings unwind together;
//! [`Supervisor::wait`] joins every task and reports that first error.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::SupervisorError;
use crate::fixer::Fixer;
use crate::schedule::run_forever;

/// Spawns cancellable tasks and joins them as a group.
pub struct Supervisor {
    cancel: CancellationToken,
    tasks: JoinSet<anyhow::Result<()>>,
    names: HashMap<Id, String>,
}

impl Supervisor {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            tasks: JoinSet::new(),
            names: HashMap::new(),
        }
    }

    /// The token shared by every supervised task.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Spawn an arbitrary task under the group.
    pub fn spawn<F>(&mut self, name: impl Into<String>, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        debug!(task = %name, "spawning supervised task");
        let handle = self.tasks.spawn(task);
        self.names.insert(handle.id(), name);
    }

    /// Spawn a periodic scheduler for `fixer`.
    pub fn spawn_fixer(&mut self, fixer: Arc<dyn Fixer>, period: Duration) {
        let name = format!("fixer:{}", fixer.name());
        let cancel = self.cancel.clone();
        self.spawn(name, async move {
            run_forever(cancel, fixer, period).await?;
            Ok(())
        });
    }

    /// Wait for every task to finish.
    ///
    /// Returns the first error any task produced, after cancelling the
    /// shared token so the remaining tasks stop.
    pub async fn wait(mut self) -> Result<(), SupervisorError> {
        let mut first: Option<SupervisorError> = None;

        while let Some(joined) = self.tasks.join_next_with_id().await {
            let err = match joined {
                Ok((id, Ok(()))) => {
                    debug!(task = %self.task_name(id), "supervised task finished");
                    continue;
                }
                Ok((id, Err(source))) => SupervisorError::Task {
                    task: self.task_name(id),
                    source,
                },
                Err(source) => SupervisorError::Join {
                    task: self.task_name(source.id()),
                    source,
                },
            };

            if first.is_none() {
                if !err.is_cancellation() {
                    warn!(error = %err, "supervised task failed, cancelling siblings");
                }
                self.cancel.cancel();
                first = Some(err);
            } else {
                debug!(error = %err, "supervised task stopped");
            }
        }

        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn task_name(&mut self, id: Id) -> String {
        self.names
            .remove(&id)
            .unwrap_or_else(|| format!("task-{id}"))
    }
}
