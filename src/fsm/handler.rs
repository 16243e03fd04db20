use async_trait::async_trait;

use crate::error::Result;
use crate::event::InboundEvent;
use crate::fsm::Stage;

/// One stage's event handler.
///
/// The router resolves the user's stage once and passes it in, so handlers
/// serving several sub-stages (registration) dispatch on `stage` without a
/// second store read. A handler transitions at most once per invocation.
#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn handle(&self, event: &InboundEvent, stage: Stage) -> Result<()>;
}
