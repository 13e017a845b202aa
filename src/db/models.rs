// Data models: the record shapes the store collaborator persists.
//
// Kept separate from the backends so the queues can build and read records
// without depending on rusqlite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::{ScoredPost, Tier};
use crate::social::{EngagementMetrics, RawPost};

/// Mint lifecycle. Only the mint queue moves a post between these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MintStatus {
    Pending,
    Minting,
    Completed,
    Failed,
}

impl MintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MintStatus::Pending => "pending",
            MintStatus::Minting => "minting",
            MintStatus::Completed => "completed",
            MintStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MintStatus::Pending),
            "minting" => Some(MintStatus::Minting),
            "completed" => Some(MintStatus::Completed),
            "failed" => Some(MintStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for MintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked post as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub post_id: String,
    pub author_id: String,
    pub author_handle: String,
    pub content: String,
    pub posted_at: DateTime<Utc>,
    pub metrics: EngagementMetrics,
    pub viral_score: u8,
    pub tier: Tier,
    pub mint_status: MintStatus,
    pub mint_progress: u8,
    pub asset_address: Option<String>,
    pub metadata_uri: Option<String>,
    /// When the record was first written (i.e. when the post was accepted).
    pub detected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostRecord {
    /// A fresh pending record for a newly accepted post.
    pub fn pending(scored: &ScoredPost, now: DateTime<Utc>) -> Self {
        let post = &scored.post;
        Self {
            post_id: post.id.clone(),
            author_id: post.author_id.clone(),
            author_handle: post.author_handle.clone(),
            content: post.text.clone(),
            posted_at: post.created_at,
            metrics: post.metrics,
            viral_score: scored.viral_score,
            tier: scored.tier,
            mint_status: MintStatus::Pending,
            mint_progress: 0,
            asset_address: None,
            metadata_uri: None,
            detected_at: now,
            updated_at: now,
        }
    }

    /// Rebuild the scored view (metrics as last stored).
    pub fn to_scored(&self) -> ScoredPost {
        ScoredPost {
            post: RawPost {
                id: self.post_id.clone(),
                author_id: self.author_id.clone(),
                author_handle: self.author_handle.clone(),
                text: self.content.clone(),
                created_at: self.posted_at,
                metrics: self.metrics,
            },
            viral_score: self.viral_score,
            tier: self.tier,
        }
    }
}

/// Partial update. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostUpdate {
    pub tier: Option<Tier>,
    pub viral_score: Option<u8>,
    pub metrics: Option<EngagementMetrics>,
    pub metadata_uri: Option<String>,
    pub mint_status: Option<MintStatus>,
}

impl PostUpdate {
    pub fn status(status: MintStatus) -> Self {
        Self {
            mint_status: Some(status),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimState {
    Pending,
    Claimed,
}

impl ClaimState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimState::Pending => "pending",
            ClaimState::Claimed => "claimed",
        }
    }
}

/// Transfer of a minted asset to its author. The pipeline only ever writes
/// the initial pending record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub asset_address: String,
    pub post_id: String,
    pub author_id: String,
    pub status: ClaimState,
    pub created_at: DateTime<Utc>,
}

/// A creator notification that has not been delivered yet, or that ran out
/// of attempts. Delivered notifications are deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// One notification per asset and tier: `{asset}:tier{n}`.
    pub key: String,
    pub author_id: String,
    pub asset_address: String,
    pub tier: Tier,
    /// Set for upgrade notifications.
    pub previous_tier: Option<Tier>,
    pub queued_at: DateTime<Utc>,
    pub attempts: u32,
    pub dead_letter: bool,
}
