// SqliteStore: rusqlite backend implementing the Store trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Send.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{ClaimRecord, MintStatus, NotificationRecord, PostRecord, PostUpdate};
use super::traits::Store;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_post(&self, record: &PostRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::upsert_post(&conn, record)
    }

    async fn update_post(&self, post_id: &str, update: &PostUpdate) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::update_post(&conn, post_id, update)
    }

    async fn get_post(&self, post_id: &str) -> Result<Option<PostRecord>> {
        let conn = self.conn.lock().await;
        super::queries::get_post(&conn, post_id)
    }

    async fn list_posts(&self, status: Option<MintStatus>) -> Result<Vec<PostRecord>> {
        let conn = self.conn.lock().await;
        super::queries::list_posts(&conn, status)
    }

    async fn set_asset_address(&self, post_id: &str, asset_address: &str, metadata_uri: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::set_asset_address(&conn, post_id, asset_address, metadata_uri)
    }

    async fn update_progress(&self, post_id: &str, progress: u8) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::update_progress(&conn, post_id, progress)
    }

    async fn get_posts_since(&self, since: DateTime<Utc>) -> Result<Vec<PostRecord>> {
        let conn = self.conn.lock().await;
        super::queries::get_posts_since(&conn, since)
    }

    async fn create_claim(&self, claim: &ClaimRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::insert_claim(&conn, claim)
    }

    async fn get_claim(&self, asset_address: &str) -> Result<Option<ClaimRecord>> {
        let conn = self.conn.lock().await;
        super::queries::get_claim(&conn, asset_address)
    }

    async fn save_notification(&self, record: &NotificationRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::upsert_notification(&conn, record)
    }

    async fn delete_notification(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::delete_notification(&conn, key)
    }

    async fn list_notifications(&self) -> Result<Vec<NotificationRecord>> {
        let conn = self.conn.lock().await;
        super::queries::list_notifications(&conn)
    }
}
