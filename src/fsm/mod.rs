//! Dialogue state machine: stages, handlers, registry, router.

pub mod handler;
pub mod handlers;
pub mod registry;
pub mod router;
pub mod stage;

pub use handler::StageHandler;
pub use registry::StageRegistry;
pub use router::{DialogueRouter, transition};
pub use stage::{Stage, UnknownStage};
