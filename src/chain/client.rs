// HTTP mint service client.
//
// The mint service fronts the on-chain program. Every call is a JSON POST
// with a bearer token; a timeout counts the same as any other failure.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::MintCollaborator;
use crate::scoring::{ScoredPost, Tier};
use crate::social::EngagementMetrics;

pub struct HttpMintClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpMintClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn post_json<B: Serialize + Sync, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to call mint service at {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mint service returned {} for {}: {}", status, path, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse mint service response from {path}"))
    }
}

#[async_trait]
impl MintCollaborator for HttpMintClient {
    async fn mint(&self, post: &ScoredPost, metadata_uri: &str, tier: Tier) -> Result<String> {
        let request = MintRequest {
            post_id: &post.post.id,
            author_id: &post.post.author_id,
            metadata_uri,
            tier: tier.as_u8(),
            viral_score: post.viral_score,
        };
        let resp: MintResponse = self.post_json("/v1/mint", &request).await?;
        debug!(post_id = %post.post.id, asset = %resp.asset_address, "Mint confirmed");
        Ok(resp.asset_address)
    }

    async fn check_tier_upgrade(&self, asset_address: &str, metrics: &EngagementMetrics) -> Result<()> {
        let path = format!("/v1/assets/{asset_address}/tier-check");
        let _: Ack = self.post_json(&path, metrics).await?;
        Ok(())
    }

    async fn transfer(&self, asset_address: &str, recipient: &str) -> Result<()> {
        let path = format!("/v1/assets/{asset_address}/transfer");
        let _: Ack = self.post_json(&path, &TransferRequest { recipient }).await?;
        Ok(())
    }
}

// --- Mint service request/response types ---

#[derive(Serialize)]
struct MintRequest<'a> {
    post_id: &'a str,
    author_id: &'a str,
    metadata_uri: &'a str,
    tier: u8,
    viral_score: u8,
}

#[derive(Deserialize)]
struct MintResponse {
    asset_address: String,
}

#[derive(Serialize)]
struct TransferRequest<'a> {
    recipient: &'a str,
}

/// Body-less acknowledgement; any JSON object is accepted.
#[derive(Deserialize)]
struct Ack {}
