//! YooKassa payment client.
//!
//! Creates redirect-confirmation payments with a per-order idempotence key
//! and polls payment status.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::error::PaymentError;
use crate::payments::{CreatedPayment, PaymentProvider};
use crate::subscription::Plan;

const BASE_URL: &str = "https://api.yookassa.ru/v3";

/// HTTP client for the YooKassa API.
pub struct YooKassaProvider {
    client: reqwest::Client,
    shop_id: String,
    api_key: SecretString,
    return_url: String,
    base_url: String,
}

impl YooKassaProvider {
    pub fn new(shop_id: impl Into<String>, api_key: SecretString, return_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            shop_id: shop_id.into(),
            api_key,
            return_url: return_url.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PaymentProvider for YooKassaProvider {
    async fn create_payment(
        &self,
        user_id: &str,
        plan: Plan,
    ) -> Result<CreatedPayment, PaymentError> {
        let order_id = Uuid::new_v4().to_string();
        let body = serde_json::json!({
            "amount": {
                "value": plan.price_rub().to_string(),
                "currency": "RUB"
            },
            "capture": true,
            "confirmation": {
                "type": "redirect",
                "return_url": self.return_url,
            },
            "description": format!("Mentora subscription — {} plan", plan.as_str()),
            "metadata": {
                "user_id": user_id,
                "plan": plan.as_str(),
                "order_id": order_id,
            }
        });

        let resp = self
            .client
            .post(format!("{}/payments", self.base_url))
            .basic_auth(&self.shop_id, Some(self.api_key.expose_secret()))
            .header("Idempotence-Key", &order_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::CreateFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PaymentError::CreateFailed(format!(
                "status {status}: {text}"
            )));
        }

        let result: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PaymentError::CreateFailed(e.to_string()))?;

        let payment_id = result
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PaymentError::CreateFailed("response missing payment id".into()))?
            .to_string();
        let payment_url = result
            .get("confirmation")
            .and_then(|c| c.get("confirmation_url"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| PaymentError::CreateFailed("response missing confirmation url".into()))?
            .to_string();

        tracing::info!(user_id, plan = plan.as_str(), payment_id, "payment created");
        Ok(CreatedPayment {
            payment_id,
            payment_url,
            order_id,
        })
    }

    async fn check_payment(&self, payment_id: &str) -> Result<bool, PaymentError> {
        let resp = self
            .client
            .get(format!("{}/payments/{payment_id}", self.base_url))
            .basic_auth(&self.shop_id, Some(self.api_key.expose_secret()))
            .send()
            .await
            .map_err(|e| PaymentError::CheckFailed {
                payment_id: payment_id.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PaymentError::CheckFailed {
                payment_id: payment_id.to_string(),
                reason: format!("status {status}: {text}"),
            });
        }

        let result: serde_json::Value =
            resp.json().await.map_err(|e| PaymentError::CheckFailed {
                payment_id: payment_id.to_string(),
                reason: e.to_string(),
            })?;

        Ok(result.get("status").and_then(|v| v.as_str()) == Some("succeeded"))
    }
}
