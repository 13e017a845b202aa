// MemoryStore: in-process Store backend.
//
// Backs the simulated profile and the test suite. Keeps a log of every
// progress write so callers can observe the checkpoint sequence.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{ClaimRecord, MintStatus, NotificationRecord, PostRecord, PostUpdate};
use super::traits::Store;

#[derive(Default)]
struct Inner {
    posts: HashMap<String, PostRecord>,
    claims: HashMap<String, ClaimRecord>,
    notifications: Vec<NotificationRecord>,
    progress_log: Vec<(String, u8)>,
    failing: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every `update_progress` call in order, as (post_id, progress).
    pub fn progress_log(&self) -> Vec<(String, u8)> {
        self.inner().progress_log.clone()
    }

    /// Progress writes for a single post, in order.
    pub fn progress_for(&self, post_id: &str) -> Vec<u8> {
        self.inner()
            .progress_log
            .iter()
            .filter(|(id, _)| id == post_id)
            .map(|(_, p)| *p)
            .collect()
    }

    /// Make every subsequent call fail, simulating an outage.
    pub fn set_failing(&self, failing: bool) {
        self.inner().failing = failing;
    }
}

fn check(inner: &Inner) -> Result<()> {
    if inner.failing {
        anyhow::bail!("store unavailable");
    }
    Ok(())
}

fn newest_first(mut records: Vec<PostRecord>) -> Vec<PostRecord> {
    records.sort_by(|a, b| b.detected_at.cmp(&a.detected_at).then_with(|| a.post_id.cmp(&b.post_id)));
    records
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_post(&self, record: &PostRecord) -> Result<()> {
        let mut inner = self.inner();
        check(&inner)?;
        inner.posts.insert(record.post_id.clone(), record.clone());
        Ok(())
    }

    async fn update_post(&self, post_id: &str, update: &PostUpdate) -> Result<()> {
        let mut inner = self.inner();
        check(&inner)?;
        let record = inner
            .posts
            .get_mut(post_id)
            .ok_or_else(|| anyhow::anyhow!("post {post_id} not found"))?;
        if let Some(tier) = update.tier {
            record.tier = tier;
        }
        if let Some(score) = update.viral_score {
            record.viral_score = score;
        }
        if let Some(metrics) = update.metrics {
            record.metrics = metrics;
        }
        if let Some(ref uri) = update.metadata_uri {
            record.metadata_uri = Some(uri.clone());
        }
        if let Some(status) = update.mint_status {
            record.mint_status = status;
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn get_post(&self, post_id: &str) -> Result<Option<PostRecord>> {
        let inner = self.inner();
        check(&inner)?;
        Ok(inner.posts.get(post_id).cloned())
    }

    async fn list_posts(&self, status: Option<MintStatus>) -> Result<Vec<PostRecord>> {
        let inner = self.inner();
        check(&inner)?;
        let records = inner
            .posts
            .values()
            .filter(|r| status.map_or(true, |s| r.mint_status == s))
            .cloned()
            .collect();
        Ok(newest_first(records))
    }

    async fn set_asset_address(&self, post_id: &str, asset_address: &str, metadata_uri: &str) -> Result<()> {
        let mut inner = self.inner();
        check(&inner)?;
        let record = inner
            .posts
            .get_mut(post_id)
            .ok_or_else(|| anyhow::anyhow!("post {post_id} not found"))?;
        record.asset_address = Some(asset_address.to_string());
        record.metadata_uri = Some(metadata_uri.to_string());
        record.mint_status = MintStatus::Completed;
        record.mint_progress = 100;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn update_progress(&self, post_id: &str, progress: u8) -> Result<()> {
        let mut inner = self.inner();
        check(&inner)?;
        let record = inner
            .posts
            .get_mut(post_id)
            .ok_or_else(|| anyhow::anyhow!("post {post_id} not found"))?;
        record.mint_progress = progress.min(100);
        record.updated_at = Utc::now();
        inner.progress_log.push((post_id.to_string(), progress.min(100)));
        Ok(())
    }

    async fn get_posts_since(&self, since: DateTime<Utc>) -> Result<Vec<PostRecord>> {
        let inner = self.inner();
        check(&inner)?;
        let records = inner
            .posts
            .values()
            .filter(|r| r.detected_at > since)
            .cloned()
            .collect();
        Ok(newest_first(records))
    }

    async fn create_claim(&self, claim: &ClaimRecord) -> Result<()> {
        let mut inner = self.inner();
        check(&inner)?;
        inner
            .claims
            .insert(claim.asset_address.clone(), claim.clone());
        Ok(())
    }

    async fn get_claim(&self, asset_address: &str) -> Result<Option<ClaimRecord>> {
        let inner = self.inner();
        check(&inner)?;
        Ok(inner.claims.get(asset_address).cloned())
    }

    async fn save_notification(&self, record: &NotificationRecord) -> Result<()> {
        let mut inner = self.inner();
        check(&inner)?;
        match inner.notifications.iter_mut().find(|n| n.key == record.key) {
            Some(existing) => *existing = record.clone(),
            None => inner.notifications.push(record.clone()),
        }
        Ok(())
    }

    async fn delete_notification(&self, key: &str) -> Result<()> {
        let mut inner = self.inner();
        check(&inner)?;
        inner.notifications.retain(|n| n.key != key);
        Ok(())
    }

    async fn list_notifications(&self) -> Result<Vec<NotificationRecord>> {
        let inner = self.inner();
        check(&inner)?;
        Ok(inner.notifications.clone())
    }
}
