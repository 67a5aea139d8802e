//! Background work tied to the lifetime of a view.
//!
//! A `ViewScope` is handed to every operation that starts fire-and-forget work
//! or performs a read whose result only matters while a view is shown. Once the
//! scope is unmounted (explicitly, or by dropping every handle) pending tasks are
//! abandoned and guarded reads resolve to `None`. Detached tasks ignore the
//! scope and only share its `TaskLog`.

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub name: &'static str,
    pub outcome: TaskOutcome,
}

/// Completion sink for background tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskLog {
    records: Arc<Mutex<Vec<TaskRecord>>>,
}

impl TaskLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &'static str, outcome: TaskOutcome) {
        match &outcome {
            TaskOutcome::Completed => info!(task = name, "background task completed"),
            TaskOutcome::Failed(error) => warn!(task = name, %error, "background task failed"),
            TaskOutcome::Cancelled => debug!(task = name, "background task cancelled"),
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TaskRecord { name, outcome });
    }

    #[must_use]
    pub fn records(&self) -> Vec<TaskRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Outcomes recorded under `name`, oldest first.
    #[must_use]
    pub fn outcomes_for(&self, name: &str) -> Vec<TaskOutcome> {
        self.records()
            .into_iter()
            .filter(|r| r.name == name)
            .map(|r| r.outcome)
            .collect()
    }
}

fn report<T, E: Display>(log: &TaskLog, name: &'static str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => {
            log.record(name, TaskOutcome::Completed);
            Some(value)
        }
        Err(e) => {
            log.record(name, TaskOutcome::Failed(e.to_string()));
            None
        }
    }
}

/// Cancellation token plus "still mounted" flag for one view.
#[derive(Debug, Clone)]
pub struct ViewScope {
    unmounted: Arc<watch::Sender<bool>>,
    log: TaskLog,
}

impl ViewScope {
    #[must_use]
    pub fn new(log: TaskLog) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            unmounted: Arc::new(tx),
            log,
        }
    }

    #[must_use]
    pub fn log(&self) -> &TaskLog {
        &self.log
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        !*self.unmounted.borrow()
    }

    /// Tear the view down. Idempotent.
    pub fn unmount(&self) {
        self.unmounted.send_replace(true);
    }

    /// Resolves once the scope is unmounted or every handle is dropped.
    fn cancelled(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.unmounted.subscribe();
        async move {
            // An error means the sender is gone, which also ends the scope.
            let _ = rx.wait_for(|gone| *gone).await;
        }
    }

    /// Run `task` in the background. The outcome is reported to the scope's
    /// `TaskLog`; the handle yields `None` unless the task completed. A task
    /// that is ready when the scope goes away still completes.
    pub fn spawn<T, E, F>(&self, name: &'static str, task: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display,
    {
        let cancelled = self.cancelled();
        let log = self.log.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                result = task => report(&log, name, result),
                () = cancelled => {
                    log.record(name, TaskOutcome::Cancelled);
                    None
                }
            }
        })
    }

    /// Run `task` to completion whether or not the view stays mounted. Used
    /// for writes that must outlive the view that started them.
    pub fn spawn_detached<T, E, F>(&self, name: &'static str, task: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display,
    {
        let log = self.log.clone();
        tokio::spawn(async move { report(&log, name, task.await) })
    }

    /// Await `read` and keep its result only if the view is still mounted.
    pub async fn guard<F: Future>(&self, read: F) -> Option<F::Output> {
        if !self.is_mounted() {
            return None;
        }
        let cancelled = self.cancelled();
        let output = tokio::select! {
            () = cancelled => None,
            output = read => Some(output),
        };
        if self.is_mounted() {
            output
        } else {
            debug!("view unmounted, discarding read result");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn completed_and_failed_tasks_are_logged() {
        let log = TaskLog::new();
        let scope = ViewScope::new(log.clone());

        let ok = scope.spawn("ok", async { Ok::<_, Infallible>(7) });
        let bad = scope.spawn("bad", async { Err::<(), _>("disk full") });

        assert_eq!(ok.await.unwrap(), Some(7));
        assert_eq!(bad.await.unwrap(), None);
        assert_eq!(log.outcomes_for("ok"), vec![TaskOutcome::Completed]);
        assert_eq!(
            log.outcomes_for("bad"),
            vec![TaskOutcome::Failed("disk full".to_owned())]
        );
    }

    #[tokio::test]
    async fn unmount_abandons_pending_tasks() {
        let log = TaskLog::new();
        let scope = ViewScope::new(log.clone());
        let (_hold, never) = oneshot::channel::<()>();

        let handle = scope.spawn("stuck", async move {
            let _ = never.await;
            Ok::<_, Infallible>(())
        });
        scope.unmount();

        assert_eq!(handle.await.unwrap(), None);
        assert_eq!(log.outcomes_for("stuck"), vec![TaskOutcome::Cancelled]);
        assert!(!scope.is_mounted());
    }

    #[tokio::test]
    async fn dropping_the_scope_cancels() {
        let log = TaskLog::new();
        let scope = ViewScope::new(log.clone());
        let handle = scope.spawn("orphan", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, Infallible>(())
        });
        drop(scope);

        assert_eq!(handle.await.unwrap(), None);
        assert_eq!(log.outcomes_for("orphan"), vec![TaskOutcome::Cancelled]);
    }

    #[tokio::test]
    async fn detached_tasks_outlive_the_scope() {
        let log = TaskLog::new();
        let scope = ViewScope::new(log.clone());
        let (tx, rx) = oneshot::channel::<u32>();
        let handle = scope.spawn_detached("write", async move {
            rx.await.map_err(|_| "sender dropped")
        });
        scope.unmount();
        drop(scope);
        tx.send(9).unwrap();

        assert_eq!(handle.await.unwrap(), Some(9));
        assert_eq!(log.outcomes_for("write"), vec![TaskOutcome::Completed]);
    }

    #[tokio::test]
    async fn ready_task_wins_over_unmount() {
        let log = TaskLog::new();
        let scope = ViewScope::new(log.clone());
        scope.unmount();
        let handle = scope.spawn("instant", async { Ok::<_, Infallible>(3) });

        assert_eq!(handle.await.unwrap(), Some(3));
        assert_eq!(log.outcomes_for("instant"), vec![TaskOutcome::Completed]);
    }

    #[tokio::test]
    async fn guard_discards_results_after_unmount() {
        let scope = ViewScope::new(TaskLog::new());
        assert_eq!(scope.guard(async { 1 }).await, Some(1));

        let (tx, rx) = oneshot::channel::<u32>();
        let reader = {
            let scope = scope.clone();
            tokio::spawn(async move { scope.guard(async { rx.await.unwrap_or(0) }).await })
        };
        scope.unmount();
        let _ = tx.send(5);

        assert_eq!(reader.await.unwrap(), None);
        assert_eq!(scope.guard(async { 2 }).await, None);
    }
}
