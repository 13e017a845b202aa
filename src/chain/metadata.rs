// Tier metadata documents.
//
// Each minted asset points at a JSON document describing the post and its
// tier. A tier upgrade publishes a fresh document under a tier-specific URI.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::MetadataPublisher;
use crate::output::truncate_chars;
use crate::scoring::{ScoredPost, Tier};

pub const DEFAULT_METADATA_BASE_URL: &str = "https://metadata.solspace.app";

const DESCRIPTION_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: Value,
}

impl Attribute {
    fn new(trait_type: &str, value: impl Into<Value>) -> Self {
        Self {
            trait_type: trait_type.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataProperties {
    pub post_id: String,
    pub tier: u8,
    pub timestamp: DateTime<Utc>,
    pub viral_score: u8,
}

/// The document a minted asset's metadata URI resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub description: String,
    pub image: String,
    pub attributes: Vec<Attribute>,
    pub properties: MetadataProperties,
}

impl TokenMetadata {
    /// Build the document for `post` at `tier`. `site_url` hosts the tier
    /// badge images.
    pub fn for_post(post: &ScoredPost, tier: Tier, site_url: &str) -> Self {
        let raw = &post.post;
        let tier_name = tier.as_str();
        Self {
            name: format!("{tier_name} Content by {}", raw.author_handle),
            description: format!(
                "This NFT represents a {} social media post that gained significant engagement. \
                 Original content: \"{}\"",
                tier_name.to_lowercase(),
                truncate_chars(&raw.text, DESCRIPTION_PREVIEW_CHARS)
            ),
            image: badge_url(site_url, tier),
            attributes: vec![
                Attribute::new("Tier", tier_name),
                Attribute::new("Likes", raw.metrics.likes),
                Attribute::new("Reshares", raw.metrics.reshares),
                Attribute::new("Platform", "Twitter"),
                Attribute::new("Creator", raw.author_handle.as_str()),
            ],
            properties: MetadataProperties {
                post_id: raw.id.clone(),
                tier: tier.as_u8(),
                timestamp: raw.created_at,
                viral_score: post.viral_score,
            },
        }
    }
}

/// Badge image for a tier, e.g. `{site}/images/tiers/trending-badge.svg`.
pub fn badge_url(site_url: &str, tier: Tier) -> String {
    format!(
        "{}/images/tiers/{}-badge.svg",
        site_url.trim_end_matches('/'),
        tier.as_str().to_lowercase()
    )
}

/// Tier-specific metadata URI: `{base}/{post_id}/tier{n}`.
pub fn metadata_uri(base_url: &str, post_id: &str, tier: Tier) -> String {
    format!("{}/{}/tier{}", base_url.trim_end_matches('/'), post_id, tier.as_u8())
}

/// Publisher that derives the URI from the post id and tier and keeps the
/// documents in memory. The hosting service serves them from the same path.
pub struct StaticUriPublisher {
    base_url: String,
    published: Mutex<Vec<TokenMetadata>>,
}

impl StaticUriPublisher {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Documents published so far, oldest first.
    pub fn published(&self) -> Vec<TokenMetadata> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl MetadataPublisher for StaticUriPublisher {
    async fn publish(&self, metadata: &TokenMetadata) -> Result<String> {
        let tier = Tier::from_u8(metadata.properties.tier);
        let uri = metadata_uri(&self.base_url, &metadata.properties.post_id, tier);
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(metadata.clone());
        Ok(uri)
    }
}
