//! Subscription stage: plan menu and payment-link creation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::{Button, ButtonMenu, InboundEvent};
use crate::fsm::{Stage, StageHandler};
use crate::subscription::{Plan, SubscriptionService};
use crate::transport::Transport;

pub struct SubscriptionHandler {
    transport: Arc<dyn Transport>,
    subscriptions: Arc<SubscriptionService>,
}

impl SubscriptionHandler {
    pub fn new(transport: Arc<dyn Transport>, subscriptions: Arc<SubscriptionService>) -> Self {
        Self {
            transport,
            subscriptions,
        }
    }

    async fn show_plans(&self, user_id: &str) -> Result<()> {
        let plans_text = "Выбери план подписки:\n\n\
             🔹 Базовый (299 ₽/месяц):\n\
             • Доступ к базовым медитациям\n\
             • Ограниченное количество диалогов\n\
             • Базовая поддержка\n\n\
             🔸 Премиум (599 ₽/месяц):\n\
             • Все базовые функции\n\
             • Неограниченное количество диалогов\n\
             • Приоритетная поддержка\n\
             • Доступ к эксклюзивным медитациям\n\
             • Персональные рекомендации";

        let menu = ButtonMenu::rows(vec![vec![
            Button::callback("Базовый план", "select_plan_basic"),
            Button::callback("Премиум план", "select_plan_premium"),
        ]]);

        self.transport.send_menu(user_id, plans_text, &menu).await?;
        Ok(())
    }

    async fn process_plan_selection(&self, user_id: &str, plan: Plan) -> Result<()> {
        match self.subscriptions.create(user_id, plan).await {
            Ok(checkout) => {
                self.transport
                    .send_menu(
                        user_id,
                        &format!("Для оплаты подписки «{plan}» перейди по ссылке:"),
                        &ButtonMenu::single(Button::url("Оплатить", checkout.payment_url)),
                    )
                    .await?;
            }
            Err(e) => {
                tracing::error!(user_id, plan = plan.as_str(), error = %e,
                    "payment creation failed");
                self.transport
                    .send_text(
                        user_id,
                        "Извини, произошла ошибка при создании платежа. \
                         Пожалуйста, попробуй позже.",
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StageHandler for SubscriptionHandler {
    async fn handle(&self, event: &InboundEvent, _stage: Stage) -> Result<()> {
        if let Some(data) = event.button_data() {
            if let Some(plan_tag) = data.strip_prefix("select_plan_") {
                match Plan::parse(plan_tag) {
                    Ok(plan) => {
                        return self.process_plan_selection(&event.user_id, plan).await;
                    }
                    Err(e) => {
                        tracing::warn!(user_id = %event.user_id, %e, "unknown plan selected");
                        return self.show_plans(&event.user_id).await;
                    }
                }
            }
            // "subscribe" and anything else re-shows the plans.
            return self.show_plans(&event.user_id).await;
        }

        self.show_plans(&event.user_id).await
    }
}
