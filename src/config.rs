use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::chain::metadata::DEFAULT_METADATA_BASE_URL;
use crate::detector::cache::DEFAULT_CACHE_SIZE;
use crate::notify::queue::DEFAULT_MAX_ATTEMPTS;
use crate::profile::Profile;
use crate::queue::retier::DEFAULT_HORIZON_HOURS;
use crate::social::client::DEFAULT_SOCIAL_API_URL;

pub const DEFAULT_CLAIM_BASE_URL: &str = "https://solspace.app";

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
pub struct Config {
    /// Operating profile (VIRALMINT_PROFILE). Read once at startup.
    pub profile: Profile,
    pub social_api_url: String,
    pub social_bearer_token: String,
    pub mint_service_url: String,
    pub mint_service_token: String,
    /// Where tier metadata documents are served from.
    pub metadata_base_url: String,
    /// Public site: claim pages, asset pages and tier badges.
    pub claim_base_url: String,
    pub db_path: String,
    pub retier_horizon_hours: i64,
    pub notify_max_attempts: u32,
    pub cache_size: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the collaborator credentials, which
    /// only the live profiles need (see `require_live`).
    pub fn load() -> Result<Self> {
        let profile = Profile::from_setting(env::var("VIRALMINT_PROFILE").ok().as_deref());

        Ok(Self {
            profile,
            social_api_url: env::var("SOCIAL_API_URL")
                .unwrap_or_else(|_| DEFAULT_SOCIAL_API_URL.to_string()),
            social_bearer_token: env::var("SOCIAL_BEARER_TOKEN").unwrap_or_default(),
            mint_service_url: env::var("MINT_SERVICE_URL").unwrap_or_default(),
            mint_service_token: env::var("MINT_SERVICE_TOKEN").unwrap_or_default(),
            metadata_base_url: env::var("METADATA_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_METADATA_BASE_URL.to_string()),
            claim_base_url: env::var("CLAIM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_CLAIM_BASE_URL.to_string()),
            db_path: env::var("VIRALMINT_DB_PATH").unwrap_or_else(|_| "./viralmint.db".to_string()),
            retier_horizon_hours: parse_var("VIRALMINT_RETIER_HORIZON_HOURS", DEFAULT_HORIZON_HOURS)?,
            notify_max_attempts: parse_var("VIRALMINT_NOTIFY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            cache_size: parse_var("VIRALMINT_CACHE_SIZE", DEFAULT_CACHE_SIZE)?,
        })
    }

    /// Check that the social platform token is configured.
    pub fn require_social(&self) -> Result<()> {
        if self.social_bearer_token.is_empty() {
            anyhow::bail!(
                "SOCIAL_BEARER_TOKEN not set. Add it to your .env file,\n\
                 or set VIRALMINT_PROFILE=simulated to run offline."
            );
        }
        Ok(())
    }

    /// Check that the mint service is configured.
    pub fn require_mint_service(&self) -> Result<()> {
        if self.mint_service_url.is_empty() || self.mint_service_token.is_empty() {
            anyhow::bail!(
                "MINT_SERVICE_URL and MINT_SERVICE_TOKEN must both be set. Add them to your .env file,\n\
                 or set VIRALMINT_PROFILE=simulated to run offline."
            );
        }
        Ok(())
    }

    /// Everything a non-simulated profile needs before it can start.
    pub fn require_live(&self) -> Result<()> {
        if self.profile == Profile::Simulated {
            return Ok(());
        }
        self.require_social()?;
        self.require_mint_service()
    }
}

/// Parse an optional numeric env var, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
