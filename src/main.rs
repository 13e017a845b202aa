use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use viralmint::clock::{Clock, SystemClock};
use viralmint::config::Config;
use viralmint::engine::ViralEngine;
use viralmint::output::terminal;
use viralmint::profile::{self, Collaborators, Profile, ProfileSettings};
use viralmint::scoring::{compute_tier, compute_viral_score};
use viralmint::social::EngagementMetrics;

/// viralmint: find viral posts, mint them, keep their tiers current.
#[derive(Parser)]
#[command(name = "viralmint", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Score ad-hoc engagement numbers with the active profile's thresholds
    Score {
        #[arg(long, default_value = "0")]
        likes: u64,
        #[arg(long, default_value = "0")]
        reshares: u64,
        #[arg(long, default_value = "0")]
        replies: u64,
        #[arg(long, default_value = "0")]
        quotes: u64,
        /// Post age in hours (values under 1 count as 1)
        #[arg(long, default_value = "1")]
        age_hours: f64,
    },

    /// Run one detector poll and queue what qualifies
    Poll {
        /// Also drain the mint queue afterwards
        #[arg(long)]
        mint: bool,
    },

    /// Process the mint queue once
    Drain,

    /// Run one re-tiering pass over recent mints
    Sweep,

    /// Deliver queued creator notifications once
    Notify,

    /// Start monitoring and keep running until Ctrl-C
    Run,

    /// Show queue, budget and database status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("viralmint=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Init => init(&config)?,

        Commands::Score {
            likes,
            reshares,
            replies,
            quotes,
            age_hours,
        } => {
            let settings = ProfileSettings::from_config(&config);
            let metrics = EngagementMetrics::new(likes, reshares, replies, quotes);
            let age = age_hours.max(1.0);
            let score = compute_viral_score(&metrics, age);
            let tier = compute_tier(&metrics, age, &settings.thresholds);

            println!("Profile: {}", settings.profile);
            println!("Viral score: {}", score.to_string().bold());
            println!("Tier: {} ({})", tier.as_u8(), tier.as_str());
            println!("Engagement: {}", metrics.total());
            if !tier.is_viral() {
                println!("{}", "Below the tier 1 thresholds, would not be queued.".dimmed());
            }
        }

        Commands::Poll { mint } => {
            let engine = build_engine(&config).await?;
            let spinner = spinner("Polling for viral posts...")?;
            let (outcome, enqueued) = engine.poll_once().await;
            spinner.finish_and_clear();

            if outcome.status.is_ok() {
                println!("Poll ok, {} new posts queued for minting", enqueued);
            } else {
                println!("Poll {}, showing cached posts", outcome.status.describe().yellow());
            }
            terminal::display_post_list(&outcome.posts);

            if mint {
                let results = engine.drain_mints().await;
                terminal::display_mint_results(&results);
            }
        }

        Commands::Drain => {
            let engine = build_engine(&config).await?;
            let spinner = spinner("Minting queued posts...")?;
            let results = engine.drain_mints().await;
            spinner.finish_and_clear();
            terminal::display_mint_results(&results);
            println!(
                "{} still pending",
                engine.runtime().mint_queue.pending_count()
            );
        }

        Commands::Sweep => {
            let engine = build_engine(&config).await?;
            let spinner = spinner("Re-checking recent mints...")?;
            let report = engine.sweep().await;
            spinner.finish_and_clear();
            terminal::display_sweep_report(&report?);
        }

        Commands::Notify => {
            let engine = build_engine(&config).await?;
            let delivered = engine.drain_notifications().await;
            let status = engine.runtime().notifier.status();
            println!(
                "Delivered {} notifications, {} pending, {} dead",
                delivered, status.pending, status.dead_letters
            );
        }

        Commands::Run => {
            let engine = build_engine(&config).await?;
            engine.start_monitoring();
            println!(
                "Monitoring with the {} profile. Press Ctrl-C to stop.",
                engine.profile().to_string().bold()
            );

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;

            engine.stop_monitoring();
            println!();
            terminal::display_queue_status(&engine.queue_status());
        }

        Commands::Status => {
            let engine = build_engine(&config).await?;
            terminal::display_queue_status(&engine.queue_status());
            if config.profile != Profile::Simulated {
                println!();
                viralmint::status::show(engine.runtime().store.as_ref(), &config.db_path).await?;
            }
        }
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
fn init(config: &Config) -> Result<()> {
    info!("Initializing viralmint database...");
    let conn = viralmint::db::initialize(&config.db_path)?;
    let table_count = viralmint::db::schema::table_count(&conn)?;
    println!("Database initialized at: {}", config.db_path);
    println!("Tables created: {table_count}");
    println!("\nviralmint is ready. Next step: set up your .env file");
    println!("  (SOCIAL_BEARER_TOKEN, MINT_SERVICE_URL, MINT_SERVICE_TOKEN)");
    println!("\nThen run: viralmint poll");
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn init(_config: &Config) -> Result<()> {
    anyhow::bail!("Built without the 'sqlite' feature; nothing to initialize")
}

/// Build the engine for the configured profile. Live profiles resume any
/// mints and notifications a previous run left pending.
async fn build_engine(config: &Config) -> Result<Arc<ViralEngine>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let settings = ProfileSettings::from_config(config);

    let collab = if config.profile == Profile::Simulated {
        Collaborators::simulated(clock, &settings.metadata_base_url)
    } else {
        live_collaborators(config, clock)?
    };

    let engine = ViralEngine::new(profile::build(settings, collab));
    if config.profile != Profile::Simulated {
        let (mints, notifications) = engine.resume().await?;
        if mints + notifications > 0 {
            info!(mints = mints, notifications = notifications, "Resumed work from the store");
        }
    }
    Ok(engine)
}

#[cfg(feature = "sqlite")]
fn live_collaborators(config: &Config, clock: Arc<dyn Clock>) -> Result<Collaborators> {
    Collaborators::live(config, clock)
}

#[cfg(not(feature = "sqlite"))]
fn live_collaborators(_config: &Config, _clock: Arc<dyn Clock>) -> Result<Collaborators> {
    anyhow::bail!(
        "Live profiles need the 'sqlite' feature.\n\
         Rebuild with default features, or set VIRALMINT_PROFILE=simulated."
    )
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("  {spinner} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}
