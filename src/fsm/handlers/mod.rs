//! One handler per stage family.

pub mod awaiting_input;
pub mod chat;
pub mod initial;
pub mod menu;
pub mod psychology;
pub mod recommendation;
pub mod registration;
pub mod subscription;

pub use awaiting_input::AwaitingInputHandler;
pub use chat::ChatHandler;
pub use initial::InitialHandler;
pub use menu::MenuHandler;
pub use psychology::PsychologyHandler;
pub use recommendation::RecommendationHandler;
pub use registration::RegistrationHandler;
pub use subscription::SubscriptionHandler;
