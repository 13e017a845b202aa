// Operating profiles and explicit runtime construction.
//
// The profile is resolved once from configuration. `build` then wires one
// detector, one notifier, the shared budget tracker and both queues, and
// hands them back in a Runtime the caller owns and passes around. There is
// no global accessor.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::budget::{endpoints, BudgetPolicy, BudgetTracker};
use crate::chain::{MetadataPublisher, MintCollaborator, SimulatedMinter, StaticUriPublisher};
use crate::clock::Clock;
use crate::config::{Config, DEFAULT_CLAIM_BASE_URL};
use crate::db::{MemoryStore, Store};
use crate::detector::{
    conservative, full_access, lightweight, ConservativeDetector, Detector, FullAccessDetector,
    LightweightDetector, SearchCore, SimulatedDetector,
};
use crate::notify::{LoggingNotifier, NotificationQueue, Notifier};
use crate::queue::{MintQueue, TierSweep, TierSweepParts};
use crate::scoring::TierThresholds;
use crate::social::simulated::SimulatedPlatform;
use crate::social::{SearchQuery, SocialPlatform};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    #[default]
    FullAccess,
    Lightweight,
    Conservative,
    Simulated,
}

impl Profile {
    pub const ALL: [Profile; 4] = [
        Profile::FullAccess,
        Profile::Lightweight,
        Profile::Conservative,
        Profile::Simulated,
    ];

    /// Parse a profile name. Accepts the legacy aliases too.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "full-access" | "enhanced" => Some(Profile::FullAccess),
            "lightweight" | "simple" => Some(Profile::Lightweight),
            "conservative" | "free" | "free-tier" => Some(Profile::Conservative),
            "simulated" | "mock" => Some(Profile::Simulated),
            _ => None,
        }
    }

    /// Resolve the configured value. Missing or unknown means full-access.
    pub fn from_setting(value: Option<&str>) -> Self {
        match value {
            None => Profile::default(),
            Some(raw) => Self::parse(raw).unwrap_or_else(|| {
                warn!(value = raw, "Unknown profile, falling back to full-access");
                Profile::default()
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::FullAccess => "full-access",
            Profile::Lightweight => "lightweight",
            Profile::Conservative => "conservative",
            Profile::Simulated => "simulated",
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every tunable that differs between profiles. Defaults come from
/// `for_profile`; tests and `from_config` override fields directly.
#[derive(Debug, Clone)]
pub struct ProfileSettings {
    pub profile: Profile,
    pub thresholds: TierThresholds,
    pub queries: Vec<SearchQuery>,
    pub budgets: Vec<(&'static str, BudgetPolicy)>,
    pub cache_size: usize,
    pub notify_interval: Duration,
    pub sweep_interval: Duration,
    pub retier_horizon: chrono::Duration,
    pub notify_max_attempts: u32,
    pub metadata_base_url: String,
    pub site_url: String,
}

impl ProfileSettings {
    pub fn for_profile(profile: Profile) -> Self {
        let (thresholds, queries, budgets, cache_size, notify_interval) = match profile {
            Profile::FullAccess => (
                TierThresholds::standard(),
                full_access::default_queries(),
                vec![
                    (endpoints::SEARCH, BudgetPolicy::window(1_000, DAY, 0.1)),
                    (endpoints::MINTING, BudgetPolicy::window(100, DAY, 0.1)),
                    (endpoints::DM, BudgetPolicy::window(500, DAY, 0.1)),
                ],
                crate::detector::cache::DEFAULT_CACHE_SIZE,
                Duration::from_secs(5 * 60),
            ),
            Profile::Lightweight => (
                TierThresholds::standard(),
                lightweight::default_queries(),
                vec![
                    (endpoints::SEARCH, BudgetPolicy::window(300, DAY, 0.1)),
                    (endpoints::MINTING, BudgetPolicy::window(20, DAY, 0.1)),
                    (endpoints::DM, BudgetPolicy::window(50, DAY, 0.1)),
                ],
                crate::detector::cache::DEFAULT_CACHE_SIZE,
                Duration::from_secs(5 * 60),
            ),
            Profile::Conservative => (
                TierThresholds::conservative(),
                conservative::default_queries(),
                vec![
                    (endpoints::SEARCH, BudgetPolicy::cooldown(FIFTEEN_MINUTES)),
                    (endpoints::LOOKUP, BudgetPolicy::cooldown(FIFTEEN_MINUTES)),
                    (endpoints::DM, BudgetPolicy::cooldown(FIFTEEN_MINUTES)),
                    (endpoints::MINTING, BudgetPolicy::window(15, DAY, 0.2)),
                ],
                conservative::CACHE_SIZE,
                FIFTEEN_MINUTES,
            ),
            Profile::Simulated => (
                TierThresholds::standard(),
                Vec::new(),
                Vec::new(),
                crate::detector::cache::DEFAULT_CACHE_SIZE,
                Duration::from_secs(60),
            ),
        };

        Self {
            profile,
            thresholds,
            queries,
            budgets,
            cache_size,
            notify_interval,
            sweep_interval: Duration::from_secs(60 * 60),
            retier_horizon: chrono::Duration::hours(crate::queue::retier::DEFAULT_HORIZON_HOURS),
            notify_max_attempts: crate::notify::queue::DEFAULT_MAX_ATTEMPTS,
            metadata_base_url: crate::chain::metadata::DEFAULT_METADATA_BASE_URL.to_string(),
            site_url: DEFAULT_CLAIM_BASE_URL.to_string(),
        }
    }

    /// Profile defaults with the configured overrides applied.
    pub fn from_config(config: &Config) -> Self {
        let mut settings = Self::for_profile(config.profile);
        settings.retier_horizon = chrono::Duration::hours(config.retier_horizon_hours.max(1));
        settings.notify_max_attempts = config.notify_max_attempts;
        settings.metadata_base_url = config.metadata_base_url.clone();
        settings.site_url = config.claim_base_url.clone();
        // The conservative cache stays small whatever the default says.
        if config.profile != Profile::Conservative {
            settings.cache_size = config.cache_size;
        }
        settings
    }

    pub fn budget_tracker(&self, clock: Arc<dyn Clock>) -> BudgetTracker {
        self.budgets
            .iter()
            .fold(BudgetTracker::new(clock), |tracker, (endpoint, policy)| {
                tracker.with_policy(endpoint, *policy)
            })
    }
}

/// The external collaborators a runtime is built from.
#[derive(Clone)]
pub struct Collaborators {
    pub social: Arc<dyn SocialPlatform>,
    pub minter: Arc<dyn MintCollaborator>,
    pub publisher: Arc<dyn MetadataPublisher>,
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Fully offline: simulated platform and minter, in-memory store.
    pub fn simulated(clock: Arc<dyn Clock>, metadata_base_url: &str) -> Self {
        Self {
            social: Arc::new(SimulatedPlatform::new()),
            minter: Arc::new(SimulatedMinter::new()),
            publisher: Arc::new(StaticUriPublisher::new(metadata_base_url)),
            store: Arc::new(MemoryStore::new()),
            clock,
        }
    }

    /// HTTP clients and the SQLite store, from configuration.
    #[cfg(feature = "sqlite")]
    pub fn live(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        use crate::chain::HttpMintClient;
        use crate::db::SqliteStore;
        use crate::social::client::HttpSocialClient;

        config.require_live()?;
        let conn = crate::db::initialize(&config.db_path)?;
        Ok(Self {
            social: Arc::new(HttpSocialClient::new(
                &config.social_api_url,
                &config.social_bearer_token,
            )?),
            minter: Arc::new(HttpMintClient::new(
                &config.mint_service_url,
                &config.mint_service_token,
            )?),
            publisher: Arc::new(StaticUriPublisher::new(&config.metadata_base_url)),
            store: Arc::new(SqliteStore::new(conn)),
            clock,
        })
    }
}

/// Everything one profile runs with.
pub struct Runtime {
    pub settings: ProfileSettings,
    pub detector: Arc<dyn Detector>,
    pub notifier: Arc<dyn Notifier>,
    pub budget: Arc<BudgetTracker>,
    pub mint_queue: Arc<MintQueue>,
    pub sweep: Arc<TierSweep>,
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
}

impl Runtime {
    pub fn profile(&self) -> Profile {
        self.settings.profile
    }
}

/// Wire the detector/notifier pair for `settings.profile` plus the queues
/// that connect them.
pub fn build(settings: ProfileSettings, collab: Collaborators) -> Runtime {
    let budget = Arc::new(settings.budget_tracker(collab.clock.clone()));

    let detector: Arc<dyn Detector> = match settings.profile {
        Profile::Simulated => Arc::new(SimulatedDetector::new(collab.clock.clone(), &settings.thresholds)),
        profile => {
            let core = SearchCore::new(
                collab.social.clone(),
                budget.clone(),
                collab.clock.clone(),
                settings.queries.clone(),
                settings.thresholds,
                settings.cache_size,
            );
            let live: Arc<dyn Detector> = match profile {
                Profile::Lightweight => Arc::new(LightweightDetector::new(core)),
                Profile::Conservative => Arc::new(ConservativeDetector::new(core)),
                _ => Arc::new(FullAccessDetector::new(core)),
            };
            live
        }
    };

    let notifier: Arc<dyn Notifier> = match settings.profile {
        Profile::Simulated => Arc::new(LoggingNotifier::new(collab.clock.clone(), &settings.site_url)),
        _ => Arc::new(NotificationQueue::new(
            collab.social.clone(),
            budget.clone(),
            collab.clock.clone(),
            &settings.site_url,
            settings.notify_max_attempts,
        )
        .with_store(collab.store.clone())),
    };

    let mint_queue = Arc::new(MintQueue::new(
        collab.store.clone(),
        collab.minter.clone(),
        collab.publisher.clone(),
        notifier.clone(),
        budget.clone(),
        collab.clock.clone(),
        &settings.site_url,
    ));

    let sweep = Arc::new(TierSweep::new(
        TierSweepParts {
            store: collab.store.clone(),
            social: collab.social.clone(),
            minter: collab.minter.clone(),
            publisher: collab.publisher.clone(),
            notifier: notifier.clone(),
            budget: budget.clone(),
            clock: collab.clock.clone(),
        },
        settings.thresholds,
        settings.retier_horizon,
        &settings.site_url,
    ));

    info!(profile = %settings.profile, detector = detector.name(), "Runtime built");

    Runtime {
        settings,
        detector,
        notifier,
        budget,
        mint_queue,
        sweep,
        store: collab.store,
        clock: collab.clock,
    }
}
