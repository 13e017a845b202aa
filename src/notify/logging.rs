// LoggingNotifier: the simulated profile's notifier.
//
// Renders messages exactly like the real queue but writes them to the log
// instead of sending them. No budget applies.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use super::templates::{link_for, render};
use super::{NotificationKind, NotificationTask, Notifier, NotifierStatus};
use crate::clock::Clock;

#[derive(Default)]
struct LogState {
    tasks: VecDeque<NotificationTask>,
    delivered: Vec<(NotificationTask, String)>,
    last_sent_at: Option<DateTime<Utc>>,
}

pub struct LoggingNotifier {
    clock: Arc<dyn Clock>,
    claim_base_url: String,
    state: Mutex<LogState>,
}

impl LoggingNotifier {
    pub fn new(clock: Arc<dyn Clock>, claim_base_url: &str) -> Self {
        Self {
            clock,
            claim_base_url: claim_base_url.to_string(),
            state: Mutex::new(LogState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every "delivered" task with its rendered message.
    pub fn delivered(&self) -> Vec<(NotificationTask, String)> {
        self.state().delivered.clone()
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn enqueue(&self, author_id: &str, asset_address: &str, kind: NotificationKind) {
        self.state().tasks.push_back(NotificationTask {
            author_id: author_id.to_string(),
            asset_address: asset_address.to_string(),
            kind,
            queued_at: self.clock.now(),
            attempts: 0,
        });
    }

    async fn drain(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state();
        let mut count = 0;
        while let Some(task) = state.tasks.pop_front() {
            let url = link_for(task.kind, &self.claim_base_url, &task.asset_address);
            let text = render(task.kind, &url);
            info!(author_id = %task.author_id, message = %text, "Simulated notification");
            state.delivered.push((task, text));
            state.last_sent_at = Some(now);
            count += 1;
        }
        count
    }

    fn pending(&self) -> Vec<NotificationTask> {
        self.state().tasks.iter().cloned().collect()
    }

    fn dead_letters(&self) -> Vec<NotificationTask> {
        Vec::new()
    }

    fn status(&self) -> NotifierStatus {
        let state = self.state();
        NotifierStatus {
            pending: state.tasks.len(),
            oldest_queued_at: state.tasks.front().map(|t| t.queued_at),
            last_sent_at: state.last_sent_at,
            delivered: state.delivered.len() as u64,
            dead_letters: 0,
        }
    }
}
