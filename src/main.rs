use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use secrecy::ExposeSecret;

use mentora::bot::Bot;
use mentora::config::BotConfig;
use mentora::fsm::handlers::{
    AwaitingInputHandler, ChatHandler, InitialHandler, MenuHandler, PsychologyHandler,
    RecommendationHandler, RegistrationHandler, SubscriptionHandler,
};
use mentora::fsm::{DialogueRouter, Stage, StageRegistry};
use mentora::llm::{LlmProvider, OpenAiProvider};
use mentora::payments::{PaymentProvider, YooKassaProvider};
use mentora::recommend::RecommendationService;
use mentora::store::{LibSqlStore, ProfileStore};
use mentora::subscription::{SubscriptionGate, SubscriptionService};
use mentora::transport::{EventSource, TelegramTransport, Transport};
use mentora::tts::{ElevenLabsProvider, TtsProvider, VoiceParams};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;

    eprintln!("🌸 Mentora v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm_model);
    eprintln!("   Database: {}", config.db_path);
    eprintln!(
        "   Voice: {}",
        if config.tts_api_key.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );

    // ── Persistence ─────────────────────────────────────────────────
    let store: Arc<dyn ProfileStore> =
        Arc::new(LibSqlStore::new_local(Path::new(&config.db_path)).await?);

    // ── Providers ───────────────────────────────────────────────────
    let transport = Arc::new(TelegramTransport::new(
        config.telegram_token.expose_secret().to_string(),
    ));
    transport.health_check().await?;

    let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    ));
    let tts: Option<Arc<dyn TtsProvider>> = config
        .tts_api_key
        .clone()
        .map(|key| Arc::new(ElevenLabsProvider::new(key)) as Arc<dyn TtsProvider>);
    let payments: Arc<dyn PaymentProvider> = Arc::new(YooKassaProvider::new(
        config.payment_shop_id.clone(),
        config.payment_api_key.clone(),
        config.payment_return_url.clone(),
    ));

    // ── Services ────────────────────────────────────────────────────
    let subscriptions = Arc::new(SubscriptionService::new(
        Arc::clone(&store),
        Arc::clone(&payments),
    ));
    let gate: Arc<dyn SubscriptionGate> = subscriptions.clone();
    let recommend = Arc::new(RecommendationService::new(
        Arc::clone(&store),
        Arc::clone(&llm),
        tts,
        VoiceParams::narration(config.tts_voice_id.clone()),
    ));

    // ── Stage handlers ──────────────────────────────────────────────
    let transport_dyn: Arc<dyn Transport> = transport.clone();
    let mut registry = StageRegistry::new();
    registry.register(
        Stage::Initial,
        Arc::new(InitialHandler::new(
            Arc::clone(&store),
            Arc::clone(&transport_dyn),
        )),
    );
    registry.register(
        Stage::AwaitingInput,
        Arc::new(AwaitingInputHandler::new(Arc::clone(&transport_dyn))),
    );
    registry.register_many(
        &[
            Stage::RegistrationStart,
            Stage::RegistrationBirthDate,
            Stage::RegistrationBirthTime,
            Stage::RegistrationBirthPlace,
            Stage::RegistrationAge,
            Stage::RegistrationComplete,
        ],
        Arc::new(RegistrationHandler::new(
            Arc::clone(&store),
            Arc::clone(&transport_dyn),
        )),
    );
    registry.register(
        Stage::ProfilingPsychology,
        Arc::new(PsychologyHandler::new(
            Arc::clone(&store),
            Arc::clone(&transport_dyn),
            Arc::clone(&llm),
        )),
    );
    registry.register(
        Stage::ProfileReady,
        Arc::new(MenuHandler::new(Arc::clone(&transport_dyn))),
    );
    registry.register(
        Stage::Chat,
        Arc::new(ChatHandler::new(
            Arc::clone(&store),
            Arc::clone(&transport_dyn),
            Arc::clone(&llm),
            Arc::clone(&gate),
        )),
    );
    registry.register(
        Stage::Recommendation,
        Arc::new(RecommendationHandler::new(
            Arc::clone(&transport_dyn),
            Arc::clone(&recommend),
            Arc::clone(&gate),
        )),
    );
    registry.register(
        Stage::Subscription,
        Arc::new(SubscriptionHandler::new(
            Arc::clone(&transport_dyn),
            Arc::clone(&subscriptions),
        )),
    );

    let router = Arc::new(DialogueRouter::new(Arc::clone(&store), registry));
    let bot = Arc::new(Bot::new(
        Arc::clone(&store),
        Arc::clone(&transport_dyn),
        router,
    ));

    // ── Event loop ──────────────────────────────────────────────────
    tracing::info!("mentora started");
    let mut events = transport.start();
    while let Some(event) = events.next().await {
        let bot = Arc::clone(&bot);
        tokio::spawn(async move {
            bot.dispatch(event).await;
        });
    }

    Ok(())
}
