//! `ProfileStore` trait — single async interface for all persistence the
//! state machine needs: the stage pointer, profile fields, the registration
//! draft, conversation history, and subscription rows.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::fsm::Stage;
use crate::subscription::SubscriptionRecord;

/// A profile is an open field map; handlers check presence, nothing enforces
/// a schema.
pub type ProfileFields = serde_json::Map<String, serde_json::Value>;

/// One line of conversation history, oldest first when listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

impl HistoryMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Backend-agnostic persistence trait.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    // ── Stage pointer ───────────────────────────────────────────────

    /// The user's persisted stage, if one has been recorded.
    async fn get_user_stage(&self, user_id: &str) -> Result<Option<Stage>, StoreError>;

    /// Overwrite the user's persisted stage.
    async fn set_user_stage(&self, user_id: &str, stage: Stage) -> Result<(), StoreError>;

    // ── Profile fields ──────────────────────────────────────────────

    /// The user's full profile field map.
    async fn get_profile(&self, user_id: &str) -> Result<Option<ProfileFields>, StoreError>;

    /// Create-or-merge: absent profile is created, existing fields are
    /// overwritten individually.
    async fn set_profile_fields(
        &self,
        user_id: &str,
        fields: ProfileFields,
    ) -> Result<(), StoreError>;

    /// A single profile field.
    async fn get_profile_field(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Option<serde_json::Value>, StoreError>;

    // ── Registration draft ──────────────────────────────────────────
    //
    // Sub-progress for the registration stage lives here, not in the
    // profile: it is flushed into the profile on completion and cleared.

    async fn get_registration_draft(&self, user_id: &str) -> Result<ProfileFields, StoreError>;

    async fn set_registration_draft(
        &self,
        user_id: &str,
        draft: &ProfileFields,
    ) -> Result<(), StoreError>;

    async fn clear_registration_draft(&self, user_id: &str) -> Result<(), StoreError>;

    // ── Conversation history ────────────────────────────────────────

    async fn append_history(
        &self,
        user_id: &str,
        role: &str,
        content: &str,
    ) -> Result<(), StoreError>;

    /// The most recent `limit` messages, in chronological order.
    async fn recent_history(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>, StoreError>;

    // ── Subscriptions ───────────────────────────────────────────────

    async fn insert_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError>;

    /// The most recently created subscription for a user.
    async fn latest_subscription(
        &self,
        user_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError>;

    async fn subscription_by_payment(
        &self,
        payment_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError>;

    /// Overwrite a subscription row by id.
    async fn update_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError>;
}
