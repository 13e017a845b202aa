// Mint collaborator: the on-chain program that creates and upgrades assets.
//
// The core only sees these traits. HttpMintClient talks to a mint service
// over JSON; SimulatedMinter derives deterministic addresses offline.

pub mod client;
pub mod metadata;
pub mod simulated;

use anyhow::Result;
use async_trait::async_trait;

use crate::scoring::{ScoredPost, Tier};
use crate::social::EngagementMetrics;

pub use client::HttpMintClient;
pub use metadata::{StaticUriPublisher, TokenMetadata};
pub use simulated::SimulatedMinter;

#[async_trait]
pub trait MintCollaborator: Send + Sync {
    /// Create an asset for `post` at `tier`. Returns the asset address.
    async fn mint(&self, post: &ScoredPost, metadata_uri: &str, tier: Tier) -> Result<String>;

    /// Ask the program to re-evaluate an asset's tier from fresh metrics.
    async fn check_tier_upgrade(&self, asset_address: &str, metrics: &EngagementMetrics) -> Result<()>;

    /// Move an asset to the author's wallet.
    async fn transfer(&self, asset_address: &str, recipient: &str) -> Result<()>;
}

/// Stores a metadata document and returns the URI it can be fetched from.
#[async_trait]
pub trait MetadataPublisher: Send + Sync {
    async fn publish(&self, metadata: &TokenMetadata) -> Result<String>;
}
