// Colored terminal output for scored posts, mint results and budgets.
//
// This module handles all terminal-specific formatting. The main.rs
// command handlers delegate here.

use colored::Colorize;

use crate::budget::BudgetStatus;
use crate::engine::QueueStatus;
use crate::queue::{MintResult, SweepReport};
use crate::scoring::{ScoredPost, Tier};

/// Display the tracked qualifying posts, highest score first.
pub fn display_post_list(posts: &[ScoredPost]) {
    if posts.is_empty() {
        println!("No qualifying posts yet. Run `viralmint poll` first.");
        return;
    }

    let mut ranked: Vec<&ScoredPost> = posts.iter().collect();
    ranked.sort_by(|a, b| b.viral_score.cmp(&a.viral_score));

    println!(
        "\n{}",
        format!("=== Viral Posts ({} tracked) ===", ranked.len()).bold()
    );
    println!();
    println!(
        "  {:>4}  {:<24} {:>6}  {:<10}  {:>8}  {:>8}",
        "Rank".dimmed(),
        "Author".dimmed(),
        "Score".dimmed(),
        "Tier".dimmed(),
        "Likes".dimmed(),
        "Reshares".dimmed(),
    );
    println!("  {}", "-".repeat(70).dimmed());

    for (i, scored) in ranked.iter().enumerate() {
        println!(
            "  {:>4}. {:<24} {:>6}  {:<10}  {:>8}  {:>8}",
            i + 1,
            super::truncate_chars(&scored.post.author_handle, 21),
            scored.viral_score,
            colorize_tier(scored.tier),
            scored.post.metrics.likes,
            scored.post.metrics.reshares,
        );
    }
    println!();
}

/// Display a single scored post.
pub fn display_post_detail(scored: &ScoredPost) {
    println!(
        "\n{}",
        format!("=== Post {} by {} ===", scored.id(), scored.post.author_handle).bold()
    );
    println!("  Tier: {}", colorize_tier(scored.tier));
    println!("  Viral score: {}", scored.viral_score);
    let m = &scored.post.metrics;
    println!(
        "  Likes: {}  Reshares: {}  Replies: {}  Quotes: {}",
        m.likes, m.reshares, m.replies, m.quotes
    );
    println!("  {}", super::truncate_chars(&scored.post.text, 140).dimmed());
}

pub fn display_mint_results(results: &[MintResult]) {
    if results.is_empty() {
        println!("Nothing to mint.");
        return;
    }
    for result in results {
        if result.success {
            println!(
                "  {} {:<20} {:<10} {}",
                "minted".green(),
                result.post_id,
                colorize_tier(result.tier),
                result.asset_address.as_deref().unwrap_or("?").dimmed(),
            );
        } else {
            println!(
                "  {} {:<20} {}",
                "failed".red(),
                result.post_id,
                result.error.as_deref().unwrap_or("unknown error"),
            );
        }
    }
}

pub fn display_sweep_report(report: &SweepReport) {
    println!(
        "Checked {} posts, {} already at top tier, {} failed",
        report.checked, report.skipped_max_tier, report.failed
    );
    for upgrade in &report.upgrades {
        println!(
            "  {} {:<20} {} -> {}",
            "upgraded".green(),
            upgrade.post_id,
            colorize_tier(upgrade.from),
            colorize_tier(upgrade.to),
        );
    }
    if report.budget_exhausted {
        println!("  {}", "Lookup budget exhausted, remaining posts wait for the next sweep".yellow());
    }
}

pub fn display_budgets(budgets: &[BudgetStatus]) {
    if budgets.is_empty() {
        println!("Budgets: none configured");
        return;
    }
    println!("Budgets:");
    for b in budgets {
        let usage = match (b.used, b.limit) {
            (Some(used), Some(limit)) => format!("{used}/{limit}"),
            _ => b.policy.to_string(),
        };
        let state = if b.available {
            "available".green().to_string()
        } else {
            format!("wait {}s", b.retry_after_secs).yellow().to_string()
        };
        println!("  {:<10} {:<12} {}", b.endpoint, usage, state);
    }
}

pub fn display_queue_status(status: &QueueStatus) {
    println!("{}", format!("=== viralmint ({}) ===", status.profile).bold());
    println!(
        "Monitoring: {}",
        if status.monitoring { "on".green() } else { "off".dimmed() }
    );
    println!(
        "Scanned: {}  Potential: {}  Minted today: {}  Pending mints: {}",
        status.scanned_count, status.potential_count, status.minted_today_count, status.pending_mints
    );
    let e = &status.engagement;
    println!(
        "Engagement: {} total, {:.0} avg likes, {:.0} avg reshares",
        e.total_engagement, e.average_likes, e.average_reshares
    );
    match &status.last_poll {
        Some(poll) if poll.is_ok() => println!("Last poll: {}", "ok".green()),
        Some(poll) => println!("Last poll: {}", poll.describe().yellow()),
        None => println!("Last poll: never"),
    }
    let n = &status.notifications;
    println!(
        "Notifications: {} pending, {} delivered, {} dead",
        n.pending, n.delivered, n.dead_letters
    );
    display_budgets(&status.budget_status);
}

fn colorize_tier(tier: Tier) -> colored::ColoredString {
    let label = tier.as_str();
    match tier {
        Tier::Viral => label.red().bold(),
        Tier::Trending => label.bright_magenta(),
        Tier::Rising => label.yellow(),
        Tier::NotViral => label.dimmed(),
    }
}
