// NotificationQueue: FIFO delivery over direct messages.
//
// Ordering rules:
// - The oldest task is always attempted first.
// - A task whose send fails is re-inserted at the front once the drain
//   ends, ahead of anything queued after it.
// - After `max_attempts` failures a task moves to the dead-letter list.
//
// With a store attached every queued, retried and dead-lettered task is
// written through, and deleted once delivered. `restore` reloads them.
//
// Drains are serialized by an async mutex. Enqueue only touches the task
// list under a short std lock, so it is safe from any periodic source.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::templates::{link_for, render};
use super::{NotificationKind, NotificationTask, Notifier, NotifierStatus};
use crate::budget::{endpoints, BudgetTracker};
use crate::clock::Clock;
use crate::db::Store;
use crate::social::SocialPlatform;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<NotificationTask>,
    dead: Vec<NotificationTask>,
    last_sent_at: Option<DateTime<Utc>>,
    delivered: u64,
}

pub struct NotificationQueue {
    social: Arc<dyn SocialPlatform>,
    budget: Arc<BudgetTracker>,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn Store>>,
    claim_base_url: String,
    max_attempts: u32,
    state: Mutex<QueueState>,
    drain_lock: tokio::sync::Mutex<()>,
}

impl NotificationQueue {
    pub fn new(
        social: Arc<dyn SocialPlatform>,
        budget: Arc<BudgetTracker>,
        clock: Arc<dyn Clock>,
        claim_base_url: &str,
        max_attempts: u32,
    ) -> Self {
        Self {
            social,
            budget,
            clock,
            store: None,
            claim_base_url: claim_base_url.to_string(),
            max_attempts: max_attempts.max(1),
            state: Mutex::new(QueueState::default()),
            drain_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Persist undelivered tasks in `store`.
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Message text for a task, as it would be sent.
    pub fn message_for(&self, task: &NotificationTask) -> String {
        let url = link_for(task.kind, &self.claim_base_url, &task.asset_address);
        render(task.kind, &url)
    }

    // A store failure never drops the in-memory task; it only costs
    // durability until the next successful write.
    async fn persist(&self, task: &NotificationTask, dead_letter: bool) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store.save_notification(&task.to_record(dead_letter)).await {
            warn!(author_id = %task.author_id, error = %e, "Failed to persist notification");
        }
    }

    async fn forget(&self, task: &NotificationTask) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store.delete_notification(&task.key()).await {
            warn!(author_id = %task.author_id, error = %e, "Failed to remove delivered notification");
        }
    }
}

#[async_trait]
impl Notifier for NotificationQueue {
    async fn enqueue(&self, author_id: &str, asset_address: &str, kind: NotificationKind) {
        let task = NotificationTask {
            author_id: author_id.to_string(),
            asset_address: asset_address.to_string(),
            kind,
            queued_at: self.clock.now(),
            attempts: 0,
        };
        {
            let mut state = self.state();
            state.tasks.push_back(task.clone());
            debug!(author_id = author_id, pending = state.tasks.len(), "Notification queued");
        }
        self.persist(&task, false).await;
    }

    async fn drain(&self) -> usize {
        let _drain = self.drain_lock.lock().await;

        if !self.budget.may_call(endpoints::DM) {
            debug!(
                retry_after_secs = self.budget.time_until_available(endpoints::DM).as_secs(),
                "Message budget exhausted, notifications wait"
            );
            return 0;
        }

        let mut delivered = 0;
        let mut held = Vec::new();

        loop {
            let Some(mut task) = self.state().tasks.pop_front() else {
                break;
            };

            if self.budget.try_acquire(endpoints::DM).is_err() {
                self.state().tasks.push_front(task);
                break;
            }

            let text = self.message_for(&task);
            match self.social.send_message(&task.author_id, &text).await {
                Ok(()) => {
                    delivered += 1;
                    {
                        let mut state = self.state();
                        state.delivered += 1;
                        state.last_sent_at = Some(self.clock.now());
                    }
                    info!(
                        author_id = %task.author_id,
                        asset = %task.asset_address,
                        "Creator notified"
                    );
                    self.forget(&task).await;
                }
                Err(e) => {
                    task.attempts += 1;
                    if task.attempts >= self.max_attempts {
                        warn!(
                            author_id = %task.author_id,
                            attempts = task.attempts,
                            error = %e,
                            "Notification moved to dead letters"
                        );
                        self.persist(&task, true).await;
                        self.state().dead.push(task);
                    } else {
                        warn!(
                            author_id = %task.author_id,
                            attempts = task.attempts,
                            error = %e,
                            "Notification failed, will retry"
                        );
                        self.persist(&task, false).await;
                        held.push(task);
                    }
                }
            }
        }

        if !held.is_empty() {
            let mut state = self.state();
            for task in held.into_iter().rev() {
                state.tasks.push_front(task);
            }
        }

        delivered
    }

    fn pending(&self) -> Vec<NotificationTask> {
        self.state().tasks.iter().cloned().collect()
    }

    fn dead_letters(&self) -> Vec<NotificationTask> {
        self.state().dead.clone()
    }

    fn status(&self) -> NotifierStatus {
        let state = self.state();
        NotifierStatus {
            pending: state.tasks.len(),
            oldest_queued_at: state.tasks.front().map(|t| t.queued_at),
            last_sent_at: state.last_sent_at,
            delivered: state.delivered,
            dead_letters: state.dead.len(),
        }
    }

    /// Stored tasks are appended in their stored order, behind anything
    /// already queued in memory. Tasks already held are skipped.
    async fn restore(&self) -> anyhow::Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let _drain = self.drain_lock.lock().await;
        let records = store.list_notifications().await?;

        let mut state = self.state();
        let mut known: HashSet<String> = state
            .tasks
            .iter()
            .chain(state.dead.iter())
            .map(NotificationTask::key)
            .collect();

        let mut restored = 0;
        for record in records {
            if !known.insert(record.key.clone()) {
                continue;
            }
            let task = NotificationTask::from_record(&record);
            if record.dead_letter {
                state.dead.push(task);
            } else {
                state.tasks.push_back(task);
            }
            restored += 1;
        }
        if restored > 0 {
            info!(restored = restored, pending = state.tasks.len(), "Restored notifications from store");
        }
        Ok(restored)
    }
}
