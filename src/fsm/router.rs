use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::event::InboundEvent;
use crate::fsm::{Stage, StageRegistry};
use crate::store::ProfileStore;

/// Move a user to `to`, recording where the handler came from.
///
/// The write is unconditional; the edge table is advisory. An edge outside
/// `Stage::successors()` is logged and still taken, so a bad persisted state
/// can always be recovered by the next handler.
pub async fn transition(
    store: &dyn ProfileStore,
    user_id: &str,
    from: Stage,
    to: Stage,
) -> std::result::Result<(), StoreError> {
    if !from.successors().contains(&to) {
        tracing::warn!(user_id, %from, %to, "transition outside the edge table");
    }
    store.set_user_stage(user_id, to).await?;
    tracing::info!(user_id, %from, %to, "stage transition");
    Ok(())
}

/// Resolves a user's stage and dispatches the event to its handler.
pub struct DialogueRouter {
    store: Arc<dyn ProfileStore>,
    registry: StageRegistry,
}

impl DialogueRouter {
    pub fn new(store: Arc<dyn ProfileStore>, registry: StageRegistry) -> Self {
        Self { store, registry }
    }

    /// Route one event: read the stage (absent reads as `INITIAL`), look up
    /// the handler, invoke it. A stage with no registered handler falls back
    /// to the initial handler.
    pub async fn route(&self, event: &InboundEvent) -> Result<()> {
        let stage = self
            .store
            .get_user_stage(&event.user_id)
            .await?
            .unwrap_or_default();

        let handler = match self.registry.get(stage) {
            Some(handler) => handler,
            None => {
                tracing::warn!(user_id = %event.user_id, %stage,
                    "no handler registered for stage, falling back to initial");
                self.registry.get(Stage::Initial).ok_or_else(|| {
                    StoreError::Query("no initial handler registered".to_string())
                })?
            }
        };

        tracing::debug!(user_id = %event.user_id, %stage, "routing event");
        handler.handle(event, stage).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::fsm::StageHandler;
    use crate::store::MemoryStore;

    struct Recorder {
        seen: Mutex<Vec<Stage>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl StageHandler for Recorder {
        async fn handle(&self, _event: &InboundEvent, stage: Stage) -> Result<()> {
            self.seen.lock().unwrap().push(stage);
            Ok(())
        }
    }

    #[tokio::test]
    async fn absent_stage_routes_to_initial() {
        let store: Arc<dyn ProfileStore> = Arc::new(MemoryStore::new());
        let initial = Recorder::new();
        let mut registry = StageRegistry::new();
        registry.register(Stage::Initial, initial.clone());

        let router = DialogueRouter::new(store, registry);
        router.route(&InboundEvent::text("7", "hi")).await.unwrap();

        assert_eq!(*initial.seen.lock().unwrap(), vec![Stage::Initial]);
    }

    #[tokio::test]
    async fn routes_to_registered_stage_handler() {
        let store: Arc<dyn ProfileStore> = Arc::new(MemoryStore::new());
        store.set_user_stage("7", Stage::Chat).await.unwrap();

        let initial = Recorder::new();
        let chat = Recorder::new();
        let mut registry = StageRegistry::new();
        registry.register(Stage::Initial, initial.clone());
        registry.register(Stage::Chat, chat.clone());

        let router = DialogueRouter::new(store, registry);
        router.route(&InboundEvent::text("7", "hi")).await.unwrap();

        assert!(initial.seen.lock().unwrap().is_empty());
        assert_eq!(*chat.seen.lock().unwrap(), vec![Stage::Chat]);
    }

    #[tokio::test]
    async fn unregistered_stage_falls_back_to_initial() {
        let store: Arc<dyn ProfileStore> = Arc::new(MemoryStore::new());
        store
            .set_user_stage("7", Stage::Recommendation)
            .await
            .unwrap();

        let initial = Recorder::new();
        let mut registry = StageRegistry::new();
        registry.register(Stage::Initial, initial.clone());

        let router = DialogueRouter::new(store, registry);
        router.route(&InboundEvent::text("7", "hi")).await.unwrap();

        // The fallback handler still receives the resolved stage.
        assert_eq!(*initial.seen.lock().unwrap(), vec![Stage::Recommendation]);
    }

    #[tokio::test]
    async fn transition_overwrites_even_off_table() {
        let store = MemoryStore::new();
        store.set_user_stage("7", Stage::Chat).await.unwrap();

        // Chat has no successors; the write still happens.
        transition(&store, "7", Stage::Chat, Stage::Initial)
            .await
            .unwrap();
        assert_eq!(
            store.get_user_stage("7").await.unwrap(),
            Some(Stage::Initial)
        );
    }
}
