use std::collections::HashMap;
use std::sync::Arc;

use crate::fsm::{Stage, StageHandler};

/// Maps each stage to its handler. Built once at startup.
#[derive(Default)]
pub struct StageRegistry {
    handlers: HashMap<Stage, Arc<dyn StageHandler>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, stage: Stage, handler: Arc<dyn StageHandler>) {
        self.handlers.insert(stage, handler);
    }

    /// Register one handler for several stages (the registration handler
    /// serves the whole registration family).
    pub fn register_many(&mut self, stages: &[Stage], handler: Arc<dyn StageHandler>) {
        for stage in stages {
            self.handlers.insert(*stage, Arc::clone(&handler));
        }
    }

    pub fn get(&self, stage: Stage) -> Option<Arc<dyn StageHandler>> {
        self.handlers.get(&stage).cloned()
    }
}
