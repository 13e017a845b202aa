// Offline mint collaborator.
//
// Asset addresses are the first 40 hex chars of sha256("{post_id}:{tier}"),
// so repeated runs produce the same addresses.

use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::MintCollaborator;
use crate::scoring::{ScoredPost, Tier};
use crate::social::EngagementMetrics;

#[derive(Default)]
struct MinterState {
    minted: Vec<(String, Tier)>,
    upgrade_checks: Vec<(String, EngagementMetrics)>,
    transfers: Vec<(String, String)>,
    fail_posts: HashSet<String>,
    fail_all: bool,
}

#[derive(Default)]
pub struct SimulatedMinter {
    state: Mutex<MinterState>,
}

impl SimulatedMinter {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MinterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every mint of `post_id` fail.
    pub fn fail_post(&self, post_id: &str) {
        self.state().fail_posts.insert(post_id.to_string());
    }

    /// Make every call fail, as if the program were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.state().fail_all = failing;
    }

    /// (post_id, tier) of every successful mint, in order.
    pub fn minted(&self) -> Vec<(String, Tier)> {
        self.state().minted.clone()
    }

    pub fn upgrade_checks(&self) -> Vec<(String, EngagementMetrics)> {
        self.state().upgrade_checks.clone()
    }

    pub fn transfers(&self) -> Vec<(String, String)> {
        self.state().transfers.clone()
    }
}

pub fn simulated_address(post_id: &str, tier: Tier) -> String {
    let digest = Sha256::digest(format!("{post_id}:{}", tier.as_u8()).as_bytes());
    let mut address = hex::encode(digest);
    address.truncate(40);
    address
}

#[async_trait]
impl MintCollaborator for SimulatedMinter {
    async fn mint(&self, post: &ScoredPost, _metadata_uri: &str, tier: Tier) -> Result<String> {
        let mut state = self.state();
        if state.fail_all || state.fail_posts.contains(&post.post.id) {
            anyhow::bail!("simulated mint failure for post {}", post.post.id);
        }
        state.minted.push((post.post.id.clone(), tier));
        Ok(simulated_address(&post.post.id, tier))
    }

    async fn check_tier_upgrade(&self, asset_address: &str, metrics: &EngagementMetrics) -> Result<()> {
        let mut state = self.state();
        if state.fail_all {
            anyhow::bail!("simulated tier check failure for {asset_address}");
        }
        state
            .upgrade_checks
            .push((asset_address.to_string(), *metrics));
        Ok(())
    }

    async fn transfer(&self, asset_address: &str, recipient: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail_all {
            anyhow::bail!("simulated transfer failure for {asset_address}");
        }
        state
            .transfers
            .push((asset_address.to_string(), recipient.to_string()));
        Ok(())
    }
}
