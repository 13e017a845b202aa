// Persistent status display: database size, mint counts, recent mints.

use anyhow::Result;
use std::path::Path;

use crate::db::{MintStatus, PostRecord, Store};

/// Post counts by mint status plus the most recent completed mints.
#[derive(Debug, Default, PartialEq)]
pub struct StoreSummary {
    pub total: usize,
    pub pending: usize,
    pub minting: usize,
    pub completed: usize,
    pub failed: usize,
    pub recent_mints: Vec<PostRecord>,
}

impl StoreSummary {
    pub async fn collect(store: &dyn Store, recent: usize) -> Result<Self> {
        let posts = store.list_posts(None).await?;
        let mut summary = StoreSummary {
            total: posts.len(),
            ..Default::default()
        };
        for post in &posts {
            match post.mint_status {
                MintStatus::Pending => summary.pending += 1,
                MintStatus::Minting => summary.minting += 1,
                MintStatus::Completed => summary.completed += 1,
                MintStatus::Failed => summary.failed += 1,
            }
        }
        // list_posts is newest first
        summary.recent_mints = posts
            .into_iter()
            .filter(|p| p.mint_status == MintStatus::Completed)
            .take(recent)
            .collect();
        Ok(summary)
    }
}

/// Display persistent status to the terminal.
pub async fn show(store: &dyn Store, db_display_path: &str) -> Result<()> {
    if !Path::new(db_display_path).exists() {
        println!("Database: not initialized");
        println!("\nRun `viralmint init` to set up the database.");
        return Ok(());
    }

    let file_size = std::fs::metadata(db_display_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_display_path, file_size);

    let summary = StoreSummary::collect(store, 5).await?;
    println!(
        "Posts: {} total, {} pending, {} minting, {} completed, {} failed",
        summary.total, summary.pending, summary.minting, summary.completed, summary.failed
    );

    if summary.recent_mints.is_empty() {
        println!("Recent mints: none yet");
        println!("  Run `viralmint poll` then `viralmint drain`");
    } else {
        println!("Recent mints:");
        for post in &summary.recent_mints {
            println!(
                "  {} by {} ({}, {})",
                post.post_id,
                post.author_handle,
                post.tier.as_str(),
                post.asset_address.as_deref().unwrap_or("?")
            );
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::scoring::{ScoredPost, Tier};
    use crate::social::{EngagementMetrics, RawPost};
    use chrono::{Duration, TimeZone, Utc};

    fn record(id: &str, minutes: i64) -> PostRecord {
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        let scored = ScoredPost {
            post: RawPost {
                id: id.to_string(),
                author_id: "a".to_string(),
                author_handle: "@a".to_string(),
                text: String::new(),
                created_at: now,
                metrics: EngagementMetrics::new(1, 0, 0, 0),
            },
            viral_score: 1,
            tier: Tier::Rising,
        };
        PostRecord::pending(&scored, now)
    }

    #[tokio::test]
    async fn test_summary_counts_by_status() {
        let store = MemoryStore::new();
        store.create_post(&record("p1", 0)).await.unwrap();
        store.create_post(&record("p2", 1)).await.unwrap();
        store.create_post(&record("p3", 2)).await.unwrap();
        store.set_asset_address("p1", "A1", "uri").await.unwrap();
        store.set_asset_address("p3", "A3", "uri").await.unwrap();

        let summary = StoreSummary::collect(&store, 1).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.recent_mints.len(), 1);
        assert_eq!(summary.recent_mints[0].post_id, "p3");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
    }
}
