// Store trait: backend-agnostic async interface for record persistence.
//
// Implementors: MemoryStore (in-process, used by the simulated profile and
// tests) and SqliteStore (wraps rusqlite). The core treats every method as a
// bounded-latency call that can fail; durability of mint progress lives here,
// not in the in-memory queues.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{ClaimRecord, MintStatus, NotificationRecord, PostRecord, PostUpdate};

#[async_trait]
pub trait Store: Send + Sync {
    // --- Posts ---

    /// Insert a post record, replacing any existing record with the same id.
    async fn create_post(&self, record: &PostRecord) -> Result<()>;

    /// Apply a partial update. Errors if the post doesn't exist.
    async fn update_post(&self, post_id: &str, update: &PostUpdate) -> Result<()>;

    async fn get_post(&self, post_id: &str) -> Result<Option<PostRecord>>;

    /// All posts, or only those in `status`, newest detection first.
    async fn list_posts(&self, status: Option<MintStatus>) -> Result<Vec<PostRecord>>;

    /// Record the minted asset. Marks the post completed at progress 100.
    async fn set_asset_address(&self, post_id: &str, asset_address: &str, metadata_uri: &str) -> Result<()>;

    /// Write a progress checkpoint (0-100).
    async fn update_progress(&self, post_id: &str, progress: u8) -> Result<()>;

    /// Posts detected strictly after `since`, newest first.
    async fn get_posts_since(&self, since: DateTime<Utc>) -> Result<Vec<PostRecord>>;

    // --- Claims ---

    async fn create_claim(&self, claim: &ClaimRecord) -> Result<()>;

    async fn get_claim(&self, asset_address: &str) -> Result<Option<ClaimRecord>>;

    // --- Notifications ---

    /// Insert or replace by key. A replaced record keeps its queue position.
    async fn save_notification(&self, record: &NotificationRecord) -> Result<()>;

    /// Remove a delivered notification. Missing keys are not an error.
    async fn delete_notification(&self, key: &str) -> Result<()>;

    /// Every stored notification in the order it was first saved.
    async fn list_notifications(&self) -> Result<Vec<NotificationRecord>>;
}
