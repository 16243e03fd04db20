//! libSQL backend — async `ProfileStore` implementation.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! RFC 3339 text; the stage pointer and subscription status are stored as
//! their stable string tags.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::fsm::Stage;
use crate::store::traits::{HistoryMessage, ProfileFields, ProfileStore};
use crate::subscription::{Plan, SubscriptionRecord, SubscriptionStatus};

/// libSQL store.
///
/// Holds a single connection reused for all operations;
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("failed to create in-memory db: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS user_stages (
                    user_id TEXT PRIMARY KEY,
                    stage TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS profiles (
                    user_id TEXT PRIMARY KEY,
                    fields TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS registration_drafts (
                    user_id TEXT PRIMARY KEY,
                    fields TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS conversation_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_history_user
                    ON conversation_history(user_id);

                CREATE TABLE IF NOT EXISTS subscriptions (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    plan TEXT NOT NULL,
                    payment_id TEXT NOT NULL,
                    order_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    price_rub INTEGER NOT NULL,
                    start_date TEXT NOT NULL,
                    end_date TEXT,
                    cancelled_at TEXT,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_subscriptions_user
                    ON subscriptions(user_id);
                CREATE INDEX IF NOT EXISTS idx_subscriptions_payment
                    ON subscriptions(payment_id);",
            )
            .await
            .map_err(|e| StoreError::Query(format!("init_schema: {e}")))?;
        Ok(())
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Convert `Option<String>` to a libsql value.
fn opt_text(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn parse_fields(raw: &str) -> Result<ProfileFields, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn row_to_subscription(row: &libsql::Row) -> Result<SubscriptionRecord, StoreError> {
    let id: String = row
        .get(0)
        .map_err(|e| StoreError::Query(format!("subscription id: {e}")))?;
    let user_id: String = row
        .get(1)
        .map_err(|e| StoreError::Query(format!("subscription user: {e}")))?;
    let plan: String = row
        .get(2)
        .map_err(|e| StoreError::Query(format!("subscription plan: {e}")))?;
    let payment_id: String = row
        .get(3)
        .map_err(|e| StoreError::Query(format!("subscription payment: {e}")))?;
    let order_id: String = row
        .get(4)
        .map_err(|e| StoreError::Query(format!("subscription order: {e}")))?;
    let status: String = row
        .get(5)
        .map_err(|e| StoreError::Query(format!("subscription status: {e}")))?;
    let price_rub: i64 = row
        .get(6)
        .map_err(|e| StoreError::Query(format!("subscription price: {e}")))?;
    let start_date: String = row
        .get(7)
        .map_err(|e| StoreError::Query(format!("subscription start: {e}")))?;
    let end_date: Option<String> = row.get(8).ok();
    let cancelled_at: Option<String> = row.get(9).ok();
    let created_at: String = row
        .get(10)
        .map_err(|e| StoreError::Query(format!("subscription created: {e}")))?;

    Ok(SubscriptionRecord {
        id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil()),
        user_id,
        plan: Plan::parse(&plan).unwrap_or(Plan::Basic),
        payment_id,
        order_id,
        status: SubscriptionStatus::parse(&status).unwrap_or(SubscriptionStatus::Pending),
        price_rub: price_rub as u32,
        start_date: parse_datetime(&start_date),
        end_date: end_date.as_deref().map(parse_datetime),
        cancelled_at: cancelled_at.as_deref().map(parse_datetime),
        created_at: parse_datetime(&created_at),
    })
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan, payment_id, order_id, status, price_rub, \
     start_date, end_date, cancelled_at, created_at";

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl ProfileStore for LibSqlStore {
    async fn get_user_stage(&self, user_id: &str) -> Result<Option<Stage>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT stage FROM user_stages WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_user_stage: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let tag: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("get_user_stage: {e}")))?;
                // An unknown persisted tag reads as no stage; the router
                // falls back to the initial handler.
                match Stage::from_str(&tag) {
                    Ok(stage) => Ok(Some(stage)),
                    Err(e) => {
                        tracing::warn!(user_id, %e, "ignoring unknown persisted stage tag");
                        Ok(None)
                    }
                }
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("get_user_stage: {e}"))),
        }
    }

    async fn set_user_stage(&self, user_id: &str, stage: Stage) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO user_stages (user_id, stage, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET stage = ?2, updated_at = ?3",
                params![user_id, stage.as_str(), Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set_user_stage: {e}")))?;
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<ProfileFields>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT fields FROM profiles WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("get_profile: {e}")))?;
                Ok(Some(parse_fields(&raw)?))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("get_profile: {e}"))),
        }
    }

    async fn set_profile_fields(
        &self,
        user_id: &str,
        fields: ProfileFields,
    ) -> Result<(), StoreError> {
        let mut merged = self.get_profile(user_id).await?.unwrap_or_default();
        for (key, value) in fields {
            merged.insert(key, value);
        }
        let raw = serde_json::to_string(&merged)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "INSERT INTO profiles (user_id, fields, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET fields = ?2, updated_at = ?3",
                params![user_id, raw, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set_profile_fields: {e}")))?;
        Ok(())
    }

    async fn get_profile_field(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self
            .get_profile(user_id)
            .await?
            .and_then(|mut p| p.remove(name)))
    }

    async fn get_registration_draft(&self, user_id: &str) -> Result<ProfileFields, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT fields FROM registration_drafts WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_registration_draft: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("get_registration_draft: {e}")))?;
                parse_fields(&raw)
            }
            Ok(None) => Ok(ProfileFields::new()),
            Err(e) => Err(StoreError::Query(format!("get_registration_draft: {e}"))),
        }
    }

    async fn set_registration_draft(
        &self,
        user_id: &str,
        draft: &ProfileFields,
    ) -> Result<(), StoreError> {
        let raw =
            serde_json::to_string(draft).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                "INSERT INTO registration_drafts (user_id, fields, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET fields = ?2, updated_at = ?3",
                params![user_id, raw, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set_registration_draft: {e}")))?;
        Ok(())
    }

    async fn clear_registration_draft(&self, user_id: &str) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "DELETE FROM registration_drafts WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("clear_registration_draft: {e}")))?;
        Ok(())
    }

    async fn append_history(
        &self,
        user_id: &str,
        role: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO conversation_history (user_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, role, content, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("append_history: {e}")))?;
        Ok(())
    }

    async fn recent_history(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT role, content FROM conversation_history
                 WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
                params![user_id, limit as i64],
            )
            .await
            .map_err(|e| StoreError::Query(format!("recent_history: {e}")))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("recent_history: {e}")))?
        {
            let role: String = row
                .get(0)
                .map_err(|e| StoreError::Query(format!("recent_history: {e}")))?;
            let content: String = row
                .get(1)
                .map_err(|e| StoreError::Query(format!("recent_history: {e}")))?;
            messages.push(HistoryMessage::new(role, content));
        }
        // Query is newest-first; callers want chronological order.
        messages.reverse();
        Ok(messages)
    }

    async fn insert_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO subscriptions ({SUBSCRIPTION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    record.id.to_string(),
                    record.user_id.as_str(),
                    record.plan.as_str(),
                    record.payment_id.as_str(),
                    record.order_id.as_str(),
                    record.status.as_str(),
                    record.price_rub as i64,
                    record.start_date.to_rfc3339(),
                    opt_text(record.end_date.map(|d| d.to_rfc3339())),
                    opt_text(record.cancelled_at.map(|d| d.to_rfc3339())),
                    record.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("insert_subscription: {e}")))?;
        Ok(())
    }

    async fn latest_subscription(
        &self,
        user_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
                     WHERE user_id = ?1 ORDER BY created_at DESC LIMIT 1"
                ),
                params![user_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("latest_subscription: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_subscription(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("latest_subscription: {e}"))),
        }
    }

    async fn subscription_by_payment(
        &self,
        payment_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
                     WHERE payment_id = ?1 LIMIT 1"
                ),
                params![payment_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("subscription_by_payment: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_subscription(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("subscription_by_payment: {e}"))),
        }
    }

    async fn update_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE subscriptions SET status = ?1, start_date = ?2, end_date = ?3,
                     cancelled_at = ?4 WHERE id = ?5",
                params![
                    record.status.as_str(),
                    record.start_date.to_rfc3339(),
                    opt_text(record.end_date.map(|d| d.to_rfc3339())),
                    opt_text(record.cancelled_at.map(|d| d.to_rfc3339())),
                    record.id.to_string(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("update_subscription: {e}")))?;

        if affected == 0 {
            return Err(StoreError::NotFound {
                entity: "subscription".to_string(),
                user_id: record.user_id.clone(),
            });
        }
        Ok(())
    }
}
