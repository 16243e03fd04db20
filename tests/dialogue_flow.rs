//! End-to-end dialogue tests: the full profiling funnel, questionnaire
//! completion, and subscription gating, driven through the dispatcher with
//! in-memory doubles for the transport, the generative provider, and
//! payments.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use mentora::bot::Bot;
use mentora::error::{LlmError, PaymentError, TransportError};
use mentora::event::{ButtonAction, ButtonMenu, InboundEvent};
use mentora::fsm::handlers::{
    AwaitingInputHandler, ChatHandler, InitialHandler, MenuHandler, PsychologyHandler,
    RecommendationHandler, RegistrationHandler, SubscriptionHandler,
};
use mentora::fsm::{DialogueRouter, Stage, StageRegistry};
use mentora::llm::{CompletionRequest, CompletionResponse, LlmProvider};
use mentora::payments::{CreatedPayment, PaymentProvider};
use mentora::questionnaire;
use mentora::recommend::RecommendationService;
use mentora::store::{MemoryStore, ProfileStore};
use mentora::subscription::{Plan, SubscriptionService};
use mentora::transport::Transport;
use mentora::tts::VoiceParams;

// ── Doubles ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Sent {
    Text(String),
    Menu(String, ButtonMenu),
    Voice(usize),
}

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingTransport {
    fn all(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn last_text(&self) -> Option<String> {
        self.all().into_iter().rev().find_map(|s| match s {
            Sent::Text(t) | Sent::Menu(t, _) => Some(t),
            Sent::Voice(_) => None,
        })
    }

    fn last_menu(&self) -> Option<ButtonMenu> {
        self.all().into_iter().rev().find_map(|s| match s {
            Sent::Menu(_, m) => Some(m),
            _ => None,
        })
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, _user_id: &str, text: &str) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent::Text(text.to_string()));
        Ok(())
    }

    async fn send_menu(
        &self,
        _user_id: &str,
        text: &str,
        menu: &ButtonMenu,
    ) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Menu(text.to_string(), menu.clone()));
        Ok(())
    }

    async fn send_voice(
        &self,
        _user_id: &str,
        audio: Vec<u8>,
        _caption: &str,
    ) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent::Voice(audio.len()));
        Ok(())
    }
}

struct CountingLlm {
    calls: AtomicUsize,
    reply: String,
}

impl CountingLlm {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: reply.to_string(),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for CountingLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CompletionResponse {
            content: self.reply.clone(),
        })
    }

    fn model_name(&self) -> &str {
        "counting-llm"
    }
}

struct FakePayments {
    confirmed: bool,
}

#[async_trait]
impl PaymentProvider for FakePayments {
    async fn create_payment(
        &self,
        _user_id: &str,
        plan: Plan,
    ) -> Result<CreatedPayment, PaymentError> {
        Ok(CreatedPayment {
            payment_id: format!("pay-{}", plan.as_str()),
            payment_url: format!("https://pay.example/{}", plan.as_str()),
            order_id: "order-1".to_string(),
        })
    }

    async fn check_payment(&self, _payment_id: &str) -> Result<bool, PaymentError> {
        Ok(self.confirmed)
    }
}

// ── Harness ─────────────────────────────────────────────────────────

struct Harness {
    store: Arc<MemoryStore>,
    transport: Arc<RecordingTransport>,
    llm: Arc<CountingLlm>,
    subscriptions: Arc<SubscriptionService>,
    bot: Bot,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let store_dyn: Arc<dyn ProfileStore> = store.clone();
        let transport = Arc::new(RecordingTransport::default());
        let transport_dyn: Arc<dyn Transport> = transport.clone();
        let llm = CountingLlm::new("сгенерированный текст");
        let llm_dyn: Arc<dyn LlmProvider> = llm.clone();

        let payments: Arc<dyn PaymentProvider> = Arc::new(FakePayments { confirmed: true });
        let subscriptions = Arc::new(SubscriptionService::new(
            Arc::clone(&store_dyn),
            Arc::clone(&payments),
        ));
        let recommend = Arc::new(RecommendationService::new(
            Arc::clone(&store_dyn),
            Arc::clone(&llm_dyn),
            None,
            VoiceParams::narration("voice"),
        ));

        let mut registry = StageRegistry::new();
        registry.register(
            Stage::Initial,
            Arc::new(InitialHandler::new(
                Arc::clone(&store_dyn),
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
                Arc::clone(&store_dyn),
                Arc::clone(&transport_dyn),
            )),
        );
        registry.register(
            Stage::ProfilingPsychology,
            Arc::new(PsychologyHandler::new(
                Arc::clone(&store_dyn),
                Arc::clone(&transport_dyn),
                Arc::clone(&llm_dyn),
            )),
        );
        registry.register(
            Stage::ProfileReady,
            Arc::new(MenuHandler::new(Arc::clone(&transport_dyn))),
        );
        registry.register(
            Stage::Chat,
            Arc::new(ChatHandler::new(
                Arc::clone(&store_dyn),
                Arc::clone(&transport_dyn),
                Arc::clone(&llm_dyn),
                subscriptions.clone(),
            )),
        );
        registry.register(
            Stage::Recommendation,
            Arc::new(RecommendationHandler::new(
                Arc::clone(&transport_dyn),
                Arc::clone(&recommend),
                subscriptions.clone(),
            )),
        );
        registry.register(
            Stage::Subscription,
            Arc::new(SubscriptionHandler::new(
                Arc::clone(&transport_dyn),
                Arc::clone(&subscriptions),
            )),
        );

        let router = Arc::new(DialogueRouter::new(Arc::clone(&store_dyn), registry));
        let bot = Bot::new(store_dyn, transport_dyn, router);

        Self {
            store,
            transport,
            llm,
            subscriptions,
            bot,
        }
    }

    async fn text(&self, text: &str) {
        self.bot.dispatch(InboundEvent::text("7", text)).await;
    }

    async fn button(&self, data: &str) {
        self.bot.dispatch(InboundEvent::button("7", data)).await;
    }

    async fn stage(&self) -> Option<Stage> {
        self.store.get_user_stage("7").await.unwrap()
    }

    async fn complete_registration(&self) {
        self.text("привет").await;
        self.button("start_profiling").await;
        self.text("15.03.1990").await;
        self.text("09:05").await;
        self.text("Москва").await;
        self.text("34").await;
    }

    async fn complete_questionnaire(&self) {
        self.button("continue_profiling").await;
        for index in 0..questionnaire::total() {
            self.button(&questionnaire::encode_answer(index, "a")).await;
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn greeting_offers_profiling_and_advances() {
    let h = Harness::new();
    h.text("привет").await;

    assert_eq!(h.stage().await, Some(Stage::AwaitingInput));
    let menu = h.transport.last_menu().unwrap();
    assert_eq!(
        menu.rows[0][0].action,
        ButtonAction::Callback("start_profiling".to_string())
    );
}

#[tokio::test]
async fn registration_funnel_collects_natal_data() {
    let h = Harness::new();
    h.text("привет").await;
    h.button("start_profiling").await;
    assert_eq!(h.stage().await, Some(Stage::RegistrationBirthDate));

    // Bad date keeps the stage
    h.text("32.13.1990").await;
    assert_eq!(h.stage().await, Some(Stage::RegistrationBirthDate));

    h.text("15.03.1990").await;
    assert_eq!(h.stage().await, Some(Stage::RegistrationBirthTime));

    // Single-digit minutes are rejected
    h.text("9:5").await;
    assert_eq!(h.stage().await, Some(Stage::RegistrationBirthTime));

    h.text("09:05").await;
    assert_eq!(h.stage().await, Some(Stage::RegistrationBirthPlace));

    // Too-short place re-prompts
    h.text("М").await;
    assert_eq!(h.stage().await, Some(Stage::RegistrationBirthPlace));

    h.text("Москва").await;
    assert_eq!(h.stage().await, Some(Stage::RegistrationAge));

    // "Other age" re-prompts without advancing
    h.button("age_other").await;
    assert_eq!(h.stage().await, Some(Stage::RegistrationAge));

    h.text("34").await;
    assert_eq!(h.stage().await, Some(Stage::RegistrationComplete));

    // Draft flushed into the profile and cleared
    let profile = h.store.get_profile("7").await.unwrap().unwrap();
    assert_eq!(profile["birth_date"], "15.03.1990");
    assert_eq!(profile["birth_time"], "09:05");
    assert_eq!(profile["birth_place"], "Москва");
    assert_eq!(profile["age"], 34);
    assert!(h.store.get_registration_draft("7").await.unwrap().is_empty());

    // Summary carries the continue button
    let menu = h.transport.last_menu().unwrap();
    assert_eq!(
        menu.rows[0][0].action,
        ButtonAction::Callback("continue_profiling".to_string())
    );
}

#[tokio::test]
async fn unknown_birth_time_stores_marker() {
    let h = Harness::new();
    h.text("привет").await;
    h.button("start_profiling").await;
    h.text("15.03.1990").await;
    h.button("birth_time_unknown").await;

    assert_eq!(h.stage().await, Some(Stage::RegistrationBirthPlace));
    let draft = h.store.get_registration_draft("7").await.unwrap();
    assert_eq!(draft["birth_time"], "unknown");
}

#[tokio::test]
async fn questionnaire_generates_profile_with_one_call() {
    let h = Harness::new();
    h.complete_registration().await;
    h.button("continue_profiling").await;
    assert_eq!(h.stage().await, Some(Stage::ProfilingPsychology));

    let total = questionnaire::total();
    for index in 0..total {
        assert_eq!(h.llm.call_count(), 0, "no call before the last answer");
        h.button(&questionnaire::encode_answer(index, "a")).await;
    }

    // Exactly one generative call, profile persisted, stage advanced
    assert_eq!(h.llm.call_count(), 1);
    assert_eq!(h.stage().await, Some(Stage::ProfileReady));

    let profile = h.store.get_profile("7").await.unwrap().unwrap();
    assert_eq!(profile["psychology_progress"], total);
    assert_eq!(
        profile["psychology_profile"]["generated_text"],
        "сгенерированный текст"
    );
    let answers = profile["psychology_answers"].as_object().unwrap();
    assert_eq!(answers.len(), total);
}

#[tokio::test]
async fn unknown_questionnaire_option_is_dropped() {
    let h = Harness::new();
    h.complete_registration().await;
    h.button("continue_profiling").await;

    let sent_before = h.transport.all().len();
    h.button("answer_0_zz").await;

    // Nothing persisted, nothing sent, stage unchanged
    assert_eq!(h.transport.all().len(), sent_before);
    assert_eq!(h.stage().await, Some(Stage::ProfilingPsychology));
    let profile = h.store.get_profile("7").await.unwrap().unwrap();
    assert!(profile.get("psychology_answers").is_none());
}

#[tokio::test]
async fn chat_requires_subscription() {
    let h = Harness::new();
    h.complete_registration().await;
    h.complete_questionnaire().await;
    h.button("open_chat").await;
    assert_eq!(h.stage().await, Some(Stage::Chat));

    h.text("мне грустно").await;

    // Gated: the subscribe prompt, not a generated reply
    let menu = h.transport.last_menu().unwrap();
    assert_eq!(
        menu.rows[0][0].action,
        ButtonAction::Callback("subscribe".to_string())
    );
    // Only the profile generation call happened
    assert_eq!(h.llm.call_count(), 1);
    assert!(h.store.recent_history("7", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn chat_replies_and_persists_history_when_subscribed() {
    let h = Harness::new();
    h.complete_registration().await;
    h.complete_questionnaire().await;

    // Buy and confirm a subscription
    h.button("subscribe").await;
    assert_eq!(h.stage().await, Some(Stage::Subscription));
    h.button("select_plan_basic").await;
    assert!(h.subscriptions.activate("pay-basic").await.unwrap());

    h.button("open_chat").await;
    h.text("мне грустно").await;

    assert_eq!(h.transport.last_text().unwrap(), "сгенерированный текст");
    let history = h.store.recent_history("7", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, "user");
    assert_eq!(history[0].content, "мне грустно");
    assert_eq!(history[1].role, "assistant");
}

#[tokio::test]
async fn plan_selection_sends_payment_link() {
    let h = Harness::new();
    h.complete_registration().await;
    h.complete_questionnaire().await;

    h.button("subscribe").await;
    let menu = h.transport.last_menu().unwrap();
    assert_eq!(
        menu.rows[0][0].action,
        ButtonAction::Callback("select_plan_basic".to_string())
    );
    assert_eq!(
        menu.rows[0][1].action,
        ButtonAction::Callback("select_plan_premium".to_string())
    );

    h.button("select_plan_premium").await;
    let menu = h.transport.last_menu().unwrap();
    assert_eq!(
        menu.rows[0][0].action,
        ButtonAction::Url("https://pay.example/premium".to_string())
    );
}

#[tokio::test]
async fn recommendation_stage_gates_and_generates() {
    let h = Harness::new();
    h.complete_registration().await;
    h.complete_questionnaire().await;
    h.button("open_recommendations").await;
    assert_eq!(h.stage().await, Some(Stage::Recommendation));

    // Without a subscription: gated
    h.text("/recommendation").await;
    let menu = h.transport.last_menu().unwrap();
    assert_eq!(
        menu.rows[0][0].action,
        ButtonAction::Callback("subscribe".to_string())
    );

    // Subscribe, then the daily recommendation generates
    h.button("subscribe").await;
    h.button("select_plan_basic").await;
    h.subscriptions.activate("pay-basic").await.unwrap();
    h.button("open_recommendations").await;

    let calls_before = h.llm.call_count();
    h.text("/recommendation").await;
    assert_eq!(h.llm.call_count(), calls_before + 1);
    assert_eq!(h.transport.last_text().unwrap(), "сгенерированный текст");

    // Practice menu lists the four practice types
    h.text("/practice").await;
    let menu = h.transport.last_menu().unwrap();
    let callbacks: Vec<_> = menu
        .rows
        .iter()
        .flatten()
        .map(|b| b.action.clone())
        .collect();
    assert!(callbacks.contains(&ButtonAction::Callback("practice_mindfulness".to_string())));
    assert!(callbacks.contains(&ButtonAction::Callback("practice_sleep".to_string())));
}

#[tokio::test]
async fn voice_messages_get_a_stub_reply() {
    let h = Harness::new();
    h.bot
        .dispatch(InboundEvent {
            user_id: "7".to_string(),
            user_name: None,
            kind: mentora::event::EventKind::Voice("file-1".to_string()),
        })
        .await;

    let text = h.transport.last_text().unwrap();
    assert!(text.contains("голосовое сообщение"));
    // Voice never routes into the state machine
    assert_eq!(h.stage().await, None);
}
