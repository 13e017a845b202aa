// Creator notifications.
//
// The mint queue and the re-tiering sweep enqueue notifications; a periodic
// drain delivers them under the direct-message budget. Delivery never
// happens inside enqueue. A notifier backed by a store writes every queued
// task through to it, so undelivered messages outlive the process.

pub mod logging;
pub mod queue;
pub mod templates;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::NotificationRecord;
use crate::scoring::Tier;

pub use logging::LoggingNotifier;
pub use queue::NotificationQueue;

/// What the author is being told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationKind {
    /// First notification after a mint, at the minted tier.
    Minted(Tier),
    Upgraded { from: Tier, to: Tier },
}

impl NotificationKind {
    /// `previous` set means an upgrade from that tier.
    pub fn new(tier: Tier, previous: Option<Tier>) -> Self {
        match previous {
            Some(from) => NotificationKind::Upgraded { from, to: tier },
            None => NotificationKind::Minted(tier),
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            NotificationKind::Minted(tier) => *tier,
            NotificationKind::Upgraded { to, .. } => *to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationTask {
    pub author_id: String,
    pub asset_address: String,
    pub kind: NotificationKind,
    pub queued_at: DateTime<Utc>,
    /// Failed delivery attempts so far.
    pub attempts: u32,
}

impl NotificationTask {
    /// Store key: one notification per asset and tier.
    pub fn key(&self) -> String {
        format!("{}:tier{}", self.asset_address, self.kind.tier().as_u8())
    }

    pub fn to_record(&self, dead_letter: bool) -> NotificationRecord {
        let previous_tier = match self.kind {
            NotificationKind::Upgraded { from, .. } => Some(from),
            NotificationKind::Minted(_) => None,
        };
        NotificationRecord {
            key: self.key(),
            author_id: self.author_id.clone(),
            asset_address: self.asset_address.clone(),
            tier: self.kind.tier(),
            previous_tier,
            queued_at: self.queued_at,
            attempts: self.attempts,
            dead_letter,
        }
    }

    pub fn from_record(record: &NotificationRecord) -> Self {
        Self {
            author_id: record.author_id.clone(),
            asset_address: record.asset_address.clone(),
            kind: NotificationKind::new(record.tier, record.previous_tier),
            queued_at: record.queued_at,
            attempts: record.attempts,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotifierStatus {
    pub pending: usize,
    pub oldest_queued_at: Option<DateTime<Utc>>,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub delivered: u64,
    pub dead_letters: usize,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn enqueue(&self, author_id: &str, asset_address: &str, kind: NotificationKind);

    /// Deliver what the budget allows. Returns the number delivered.
    async fn drain(&self) -> usize;

    /// Queued tasks, next to be delivered first.
    fn pending(&self) -> Vec<NotificationTask>;

    /// Tasks that ran out of delivery attempts.
    fn dead_letters(&self) -> Vec<NotificationTask>;

    fn status(&self) -> NotifierStatus;

    /// Reload undelivered tasks a previous process persisted. Returns how
    /// many were added.
    async fn restore(&self) -> anyhow::Result<usize> {
        Ok(0)
    }
}
