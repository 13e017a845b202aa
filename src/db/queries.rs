// Database queries: CRUD operations for post, claim and notification records.
//
// Every SQL statement lives here. SqliteStore locks its connection and
// delegates to these functions, so tests can run them against an in-memory
// Connection directly.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{ClaimRecord, ClaimState, MintStatus, NotificationRecord, PostRecord, PostUpdate};
use crate::scoring::Tier;
use crate::social::EngagementMetrics;

const POST_COLUMNS: &str = "post_id, author_id, author_handle, content, posted_at,
    likes, reshares, replies, quotes, viral_score, tier, mint_status, mint_progress,
    asset_address, metadata_uri, detected_at, updated_at";

// --- Posts ---

/// Insert or replace a post record.
pub fn upsert_post(conn: &Connection, record: &PostRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO viral_posts (post_id, author_id, author_handle, content, posted_at,
            likes, reshares, replies, quotes, viral_score, tier, mint_status, mint_progress,
            asset_address, metadata_uri, detected_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
         ON CONFLICT(post_id) DO UPDATE SET
            author_id = ?2, author_handle = ?3, content = ?4, posted_at = ?5,
            likes = ?6, reshares = ?7, replies = ?8, quotes = ?9,
            viral_score = ?10, tier = ?11, mint_status = ?12, mint_progress = ?13,
            asset_address = ?14, metadata_uri = ?15, detected_at = ?16, updated_at = ?17",
        params![
            record.post_id,
            record.author_id,
            record.author_handle,
            record.content,
            record.posted_at.to_rfc3339(),
            record.metrics.likes as i64,
            record.metrics.reshares as i64,
            record.metrics.replies as i64,
            record.metrics.quotes as i64,
            record.viral_score,
            record.tier.as_u8(),
            record.mint_status.as_str(),
            record.mint_progress,
            record.asset_address,
            record.metadata_uri,
            record.detected_at.to_rfc3339(),
            record.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Apply a partial update. Missing fields keep their stored values.
pub fn update_post(conn: &Connection, post_id: &str, update: &PostUpdate) -> Result<()> {
    let mut record = get_post(conn, post_id)?
        .with_context(|| format!("post {post_id} not found"))?;

    if let Some(tier) = update.tier {
        record.tier = tier;
    }
    if let Some(score) = update.viral_score {
        record.viral_score = score;
    }
    if let Some(metrics) = update.metrics {
        record.metrics = metrics;
    }
    if let Some(ref uri) = update.metadata_uri {
        record.metadata_uri = Some(uri.clone());
    }
    if let Some(status) = update.mint_status {
        record.mint_status = status;
    }
    record.updated_at = Utc::now();

    upsert_post(conn, &record)
}

pub fn get_post(conn: &Connection, post_id: &str) -> Result<Option<PostRecord>> {
    let sql = format!("SELECT {POST_COLUMNS} FROM viral_posts WHERE post_id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row(params![post_id], PostRow::read).optional()?;
    row.map(PostRow::into_record).transpose()
}

/// All posts (optionally filtered by status), newest detection first.
pub fn list_posts(conn: &Connection, status: Option<MintStatus>) -> Result<Vec<PostRecord>> {
    let rows = match status {
        Some(status) => {
            let sql = format!(
                "SELECT {POST_COLUMNS} FROM viral_posts WHERE mint_status = ?1
                 ORDER BY detected_at DESC, post_id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![status.as_str()], PostRow::read)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let sql = format!(
                "SELECT {POST_COLUMNS} FROM viral_posts ORDER BY detected_at DESC, post_id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], PostRow::read)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
    };
    rows.into_iter().map(PostRow::into_record).collect()
}

/// Posts detected strictly after `since`, newest first.
pub fn get_posts_since(conn: &Connection, since: DateTime<Utc>) -> Result<Vec<PostRecord>> {
    // RFC 3339 timestamps in UTC compare correctly as text only when they
    // share a format, so filter after parsing.
    Ok(list_posts(conn, None)?
        .into_iter()
        .filter(|r| r.detected_at > since)
        .collect())
}

/// Record a minted asset and mark the post completed.
pub fn set_asset_address(
    conn: &Connection,
    post_id: &str,
    asset_address: &str,
    metadata_uri: &str,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE viral_posts SET asset_address = ?2, metadata_uri = ?3,
            mint_status = 'completed', mint_progress = 100, updated_at = ?4
         WHERE post_id = ?1",
        params![post_id, asset_address, metadata_uri, Utc::now().to_rfc3339()],
    )?;
    if changed == 0 {
        anyhow::bail!("post {post_id} not found");
    }
    Ok(())
}

pub fn update_progress(conn: &Connection, post_id: &str, progress: u8) -> Result<()> {
    let changed = conn.execute(
        "UPDATE viral_posts SET mint_progress = ?2, updated_at = ?3 WHERE post_id = ?1",
        params![post_id, progress.min(100), Utc::now().to_rfc3339()],
    )?;
    if changed == 0 {
        anyhow::bail!("post {post_id} not found");
    }
    Ok(())
}

// --- Claims ---

pub fn insert_claim(conn: &Connection, claim: &ClaimRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO claims (asset_address, post_id, author_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(asset_address) DO UPDATE SET
            post_id = ?2, author_id = ?3, status = ?4, created_at = ?5",
        params![
            claim.asset_address,
            claim.post_id,
            claim.author_id,
            claim.status.as_str(),
            claim.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_claim(conn: &Connection, asset_address: &str) -> Result<Option<ClaimRecord>> {
    let mut stmt = conn.prepare(
        "SELECT asset_address, post_id, author_id, status, created_at
         FROM claims WHERE asset_address = ?1",
    )?;
    let row = stmt
        .query_row(params![asset_address], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })
        .optional()?;

    let Some((asset_address, post_id, author_id, status, created_at)) = row else {
        return Ok(None);
    };
    let status = match status.as_str() {
        "claimed" => ClaimState::Claimed,
        _ => ClaimState::Pending,
    };
    Ok(Some(ClaimRecord {
        asset_address,
        post_id,
        author_id,
        status,
        created_at: parse_timestamp(&created_at)?,
    }))
}

// --- Notifications ---

/// Insert or replace by key. The conflict path updates in place, so the row
/// keeps its rowid and therefore its queue position.
pub fn upsert_notification(conn: &Connection, record: &NotificationRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications (key, author_id, asset_address, tier, previous_tier,
            queued_at, attempts, dead_letter)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(key) DO UPDATE SET
            author_id = ?2, asset_address = ?3, tier = ?4, previous_tier = ?5,
            queued_at = ?6, attempts = ?7, dead_letter = ?8",
        params![
            record.key,
            record.author_id,
            record.asset_address,
            record.tier.as_u8(),
            record.previous_tier.map(|t| t.as_u8()),
            record.queued_at.to_rfc3339(),
            record.attempts,
            record.dead_letter,
        ],
    )?;
    Ok(())
}

pub fn delete_notification(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM notifications WHERE key = ?1", params![key])?;
    Ok(())
}

/// Every stored notification in insertion order.
pub fn list_notifications(conn: &Connection) -> Result<Vec<NotificationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT key, author_id, asset_address, tier, previous_tier, queued_at, attempts, dead_letter
         FROM notifications ORDER BY rowid ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<i64>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, bool>(7)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(
            |(key, author_id, asset_address, tier, previous_tier, queued_at, attempts, dead_letter)| {
                Ok(NotificationRecord {
                    key,
                    author_id,
                    asset_address,
                    tier: Tier::from_u8(tier.clamp(0, 3) as u8),
                    previous_tier: previous_tier.map(|t| Tier::from_u8(t.clamp(0, 3) as u8)),
                    queued_at: parse_timestamp(&queued_at)?,
                    attempts: attempts.max(0) as u32,
                    dead_letter,
                })
            },
        )
        .collect()
}

// --- Row mapping ---

/// Raw column values, converted to a PostRecord outside the rusqlite closure
/// so timestamp and enum parse errors surface as anyhow errors.
struct PostRow {
    post_id: String,
    author_id: String,
    author_handle: String,
    content: String,
    posted_at: String,
    likes: i64,
    reshares: i64,
    replies: i64,
    quotes: i64,
    viral_score: i64,
    tier: i64,
    mint_status: String,
    mint_progress: i64,
    asset_address: Option<String>,
    metadata_uri: Option<String>,
    detected_at: String,
    updated_at: String,
}

impl PostRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            post_id: row.get(0)?,
            author_id: row.get(1)?,
            author_handle: row.get(2)?,
            content: row.get(3)?,
            posted_at: row.get(4)?,
            likes: row.get(5)?,
            reshares: row.get(6)?,
            replies: row.get(7)?,
            quotes: row.get(8)?,
            viral_score: row.get(9)?,
            tier: row.get(10)?,
            mint_status: row.get(11)?,
            mint_progress: row.get(12)?,
            asset_address: row.get(13)?,
            metadata_uri: row.get(14)?,
            detected_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }

    fn into_record(self) -> Result<PostRecord> {
        let mint_status = MintStatus::parse(&self.mint_status)
            .with_context(|| format!("unknown mint status '{}'", self.mint_status))?;
        Ok(PostRecord {
            post_id: self.post_id,
            author_id: self.author_id,
            author_handle: self.author_handle,
            content: self.content,
            posted_at: parse_timestamp(&self.posted_at)?,
            metrics: EngagementMetrics::new(
                self.likes.max(0) as u64,
                self.reshares.max(0) as u64,
                self.replies.max(0) as u64,
                self.quotes.max(0) as u64,
            ),
            viral_score: self.viral_score.clamp(0, 100) as u8,
            tier: Tier::from_u8(self.tier.clamp(0, 3) as u8),
            mint_status,
            mint_progress: self.mint_progress.clamp(0, 100) as u8,
            asset_address: self.asset_address,
            metadata_uri: self.metadata_uri,
            detected_at: parse_timestamp(&self.detected_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid stored timestamp '{s}'"))?;
    Ok(parsed.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_tables;
    use crate::scoring::ScoredPost;
    use crate::social::RawPost;
    use chrono::{Duration, TimeZone};

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    fn record(id: &str, detected_at: DateTime<Utc>) -> PostRecord {
        let scored = ScoredPost {
            post: RawPost {
                id: id.to_string(),
                author_id: "u1".to_string(),
                author_handle: "@author".to_string(),
                text: "hello".to_string(),
                created_at: detected_at - Duration::hours(1),
                metrics: EngagementMetrics::new(6000, 100, 20, 3),
            },
            viral_score: 42,
            tier: Tier::Trending,
        };
        PostRecord::pending(&scored, detected_at)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_upsert_and_get_post() {
        let conn = conn();
        let rec = record("p1", t0());
        upsert_post(&conn, &rec).unwrap();

        let loaded = get_post(&conn, "p1").unwrap().unwrap();
        assert_eq!(loaded, rec);
        assert!(get_post(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_update_post_keeps_unset_fields() {
        let conn = conn();
        upsert_post(&conn, &record("p1", t0())).unwrap();

        let update = PostUpdate {
            tier: Some(Tier::Viral),
            ..Default::default()
        };
        update_post(&conn, "p1", &update).unwrap();

        let loaded = get_post(&conn, "p1").unwrap().unwrap();
        assert_eq!(loaded.tier, Tier::Viral);
        assert_eq!(loaded.viral_score, 42);
        assert_eq!(loaded.mint_status, MintStatus::Pending);
    }

    #[test]
    fn test_update_missing_post_errors() {
        let conn = conn();
        assert!(update_post(&conn, "nope", &PostUpdate::default()).is_err());
        assert!(update_progress(&conn, "nope", 10).is_err());
    }

    #[test]
    fn test_set_asset_address_completes_post() {
        let conn = conn();
        upsert_post(&conn, &record("p1", t0())).unwrap();
        set_asset_address(&conn, "p1", "asset1", "https://m/p1/tier2").unwrap();

        let loaded = get_post(&conn, "p1").unwrap().unwrap();
        assert_eq!(loaded.mint_status, MintStatus::Completed);
        assert_eq!(loaded.mint_progress, 100);
        assert_eq!(loaded.asset_address.as_deref(), Some("asset1"));
    }

    #[test]
    fn test_list_posts_filters_and_orders() {
        let conn = conn();
        upsert_post(&conn, &record("old", t0())).unwrap();
        upsert_post(&conn, &record("new", t0() + Duration::hours(1))).unwrap();
        update_post(&conn, "old", &PostUpdate::status(MintStatus::Completed)).unwrap();

        let all = list_posts(&conn, None).unwrap();
        assert_eq!(all[0].post_id, "new");
        assert_eq!(all[1].post_id, "old");

        let completed = list_posts(&conn, Some(MintStatus::Completed)).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].post_id, "old");
    }

    #[test]
    fn test_posts_since_is_strict() {
        let conn = conn();
        upsert_post(&conn, &record("at", t0())).unwrap();
        upsert_post(&conn, &record("after", t0() + Duration::seconds(1))).unwrap();

        let since = get_posts_since(&conn, t0()).unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].post_id, "after");
    }

    #[test]
    fn test_claim_roundtrip() {
        let conn = conn();
        let claim = ClaimRecord {
            asset_address: "asset1".to_string(),
            post_id: "p1".to_string(),
            author_id: "u1".to_string(),
            status: ClaimState::Pending,
            created_at: t0(),
        };
        insert_claim(&conn, &claim).unwrap();
        assert_eq!(get_claim(&conn, "asset1").unwrap(), Some(claim));
        assert!(get_claim(&conn, "asset2").unwrap().is_none());
    }

    fn notification(key: &str, attempts: u32) -> NotificationRecord {
        NotificationRecord {
            key: key.to_string(),
            author_id: "u1".to_string(),
            asset_address: "asset1".to_string(),
            tier: Tier::Trending,
            previous_tier: Some(Tier::Rising),
            queued_at: t0(),
            attempts,
            dead_letter: false,
        }
    }

    #[test]
    fn test_notifications_keep_queue_order_on_update() {
        let conn = conn();
        upsert_notification(&conn, &notification("a:tier2", 0)).unwrap();
        upsert_notification(&conn, &notification("b:tier2", 0)).unwrap();
        upsert_notification(&conn, &notification("a:tier2", 3)).unwrap();

        let listed = list_notifications(&conn).unwrap();
        let keys: Vec<&str> = listed.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(keys, vec!["a:tier2", "b:tier2"]);
        assert_eq!(listed[0].attempts, 3);
        assert_eq!(listed[0].previous_tier, Some(Tier::Rising));
        assert_eq!(listed[0].queued_at, t0());
    }

    #[test]
    fn test_delete_notification() {
        let conn = conn();
        upsert_notification(&conn, &notification("a:tier2", 0)).unwrap();
        delete_notification(&conn, "a:tier2").unwrap();
        delete_notification(&conn, "missing").unwrap();
        assert!(list_notifications(&conn).unwrap().is_empty());
    }
}
