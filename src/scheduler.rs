// Periodic task runner.
//
// Each recurring job (a detector's poll loop, the re-tiering sweep, the
// notification drain) runs as its own spawned tokio task driven by an
// interval. Cancelling a task stops all future ticks immediately; a tick
// that is already running finishes first.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

pub struct PeriodicTask {
    name: String,
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn `tick` every `period`. The first tick fires immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(name: &str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, mut rx) = watch::channel(false);
        let task_name = name.to_string();

        let handle = tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(task = %task_name, period_secs = period.as_secs(), "Periodic task started");

            loop {
                tokio::select! {
                    biased;
                    changed = rx.changed() => {
                        // A dropped sender means the owner is gone.
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                    _ = timer.tick() => {
                        if *rx.borrow() {
                            break;
                        }
                        debug!(task = %task_name, "Tick");
                        tick().await;
                    }
                }
            }

            info!(task = %task_name, "Periodic task stopped");
        });

        Self {
            name: name.to_string(),
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop future ticks. Idempotent.
    pub fn cancel(&self) {
        // send_replace never fails, even once the loop has exited.
        self.shutdown.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Cancel and wait for the in-flight tick (if any) to finish.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Holder for at most one running task. Each detector owns one so its
/// schedule can be replaced or stopped without touching any other.
#[derive(Default)]
pub struct ScheduleSlot {
    task: Mutex<Option<PeriodicTask>>,
}

impl ScheduleSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<PeriodicTask>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Install a task, cancelling whatever was there before.
    pub fn install(&self, task: PeriodicTask) {
        if let Some(previous) = self.lock().replace(task) {
            previous.cancel();
        }
    }

    /// Cancel the running task, if any. Idempotent.
    pub fn cancel(&self) {
        if let Some(task) = self.lock().take() {
            debug!(task = task.name(), "Cancelling scheduled task");
            task.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock().as_ref().is_some_and(|t| !t.is_finished())
    }
}
