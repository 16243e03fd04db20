//! In-memory `ProfileStore` — used by tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::fsm::Stage;
use crate::store::traits::{HistoryMessage, ProfileFields, ProfileStore};
use crate::subscription::SubscriptionRecord;

#[derive(Default)]
struct Inner {
    stages: HashMap<String, Stage>,
    profiles: HashMap<String, ProfileFields>,
    drafts: HashMap<String, ProfileFields>,
    history: HashMap<String, Vec<HistoryMessage>>,
    subscriptions: Vec<SubscriptionRecord>,
}

/// HashMap-backed store behind a single mutex. Lock scope is one operation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("MemoryStore mutex poisoned")
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_user_stage(&self, user_id: &str) -> Result<Option<Stage>, StoreError> {
        Ok(self.lock().stages.get(user_id).copied())
    }

    async fn set_user_stage(&self, user_id: &str, stage: Stage) -> Result<(), StoreError> {
        self.lock().stages.insert(user_id.to_string(), stage);
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<ProfileFields>, StoreError> {
        Ok(self.lock().profiles.get(user_id).cloned())
    }

    async fn set_profile_fields(
        &self,
        user_id: &str,
        fields: ProfileFields,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let profile = inner.profiles.entry(user_id.to_string()).or_default();
        for (key, value) in fields {
            profile.insert(key, value);
        }
        Ok(())
    }

    async fn get_profile_field(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self
            .lock()
            .profiles
            .get(user_id)
            .and_then(|p| p.get(name))
            .cloned())
    }

    async fn get_registration_draft(&self, user_id: &str) -> Result<ProfileFields, StoreError> {
        Ok(self.lock().drafts.get(user_id).cloned().unwrap_or_default())
    }

    async fn set_registration_draft(
        &self,
        user_id: &str,
        draft: &ProfileFields,
    ) -> Result<(), StoreError> {
        self.lock().drafts.insert(user_id.to_string(), draft.clone());
        Ok(())
    }

    async fn clear_registration_draft(&self, user_id: &str) -> Result<(), StoreError> {
        self.lock().drafts.remove(user_id);
        Ok(())
    }

    async fn append_history(
        &self,
        user_id: &str,
        role: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        self.lock()
            .history
            .entry(user_id.to_string())
            .or_default()
            .push(HistoryMessage::new(role, content));
        Ok(())
    }

    async fn recent_history(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>, StoreError> {
        let inner = self.lock();
        let Some(messages) = inner.history.get(user_id) else {
            return Ok(Vec::new());
        };
        let skip = messages.len().saturating_sub(limit);
        Ok(messages[skip..].to_vec())
    }

    async fn insert_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        self.lock().subscriptions.push(record.clone());
        Ok(())
    }

    async fn latest_subscription(
        &self,
        user_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        Ok(self
            .lock()
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn subscription_by_payment(
        &self,
        payment_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        Ok(self
            .lock()
            .subscriptions
            .iter()
            .find(|s| s.payment_id == payment_id)
            .cloned())
    }

    async fn update_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        match inner.subscriptions.iter_mut().find(|s| s.id == record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "subscription".to_string(),
                user_id: record.user_id.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_defaults_to_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get_user_stage("7").await.unwrap(), None);
        store.set_user_stage("7", Stage::Chat).await.unwrap();
        assert_eq!(store.get_user_stage("7").await.unwrap(), Some(Stage::Chat));
    }

    #[tokio::test]
    async fn profile_fields_merge() {
        let store = MemoryStore::new();
        let mut first = ProfileFields::new();
        first.insert("birth_date".into(), "15.03.1990".into());
        store.set_profile_fields("7", first).await.unwrap();

        let mut second = ProfileFields::new();
        second.insert("age".into(), 29.into());
        second.insert("birth_date".into(), "16.03.1990".into());
        store.set_profile_fields("7", second).await.unwrap();

        let profile = store.get_profile("7").await.unwrap().unwrap();
        assert_eq!(profile["birth_date"], "16.03.1990");
        assert_eq!(profile["age"], 29);
    }

    #[tokio::test]
    async fn draft_is_separate_from_profile() {
        let store = MemoryStore::new();
        let mut draft = ProfileFields::new();
        draft.insert("birth_date".into(), "15.03.1990".into());
        store.set_registration_draft("7", &draft).await.unwrap();

        assert!(store.get_profile("7").await.unwrap().is_none());
        assert_eq!(
            store.get_registration_draft("7").await.unwrap()["birth_date"],
            "15.03.1990"
        );

        store.clear_registration_draft("7").await.unwrap();
        assert!(store.get_registration_draft("7").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_history_keeps_order_and_limit() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .append_history("7", "user", &format!("msg {i}"))
                .await
                .unwrap();
        }
        let recent = store.recent_history("7", 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "msg 2");
        assert_eq!(recent[2].content, "msg 4");
    }
}
