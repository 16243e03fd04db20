//! Subscription plans, records, and the service that owns their lifecycle.
//!
//! `SubscriptionService` is the sole mutator of subscription rows: created
//! `pending` when a plan is selected, `active` with a computed expiry once
//! the payment is confirmed, lazily `expired` the first time an active row
//! is read past its end date, and `cancelled` only by explicit user action
//! while active. Handlers never write — they gate through
//! [`SubscriptionGate`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, PaymentError};
use crate::payments::PaymentProvider;
use crate::store::ProfileStore;

/// Available subscription plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Basic,
    Premium,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Basic => "basic",
            Plan::Premium => "premium",
        }
    }

    pub fn parse(s: &str) -> Result<Self, PaymentError> {
        match s {
            "basic" => Ok(Plan::Basic),
            "premium" => Ok(Plan::Premium),
            other => Err(PaymentError::UnknownPlan(other.to_string())),
        }
    }

    /// Monthly price in rubles.
    pub fn price_rub(&self) -> u32 {
        match self {
            Plan::Basic => 299,
            Plan::Premium => 599,
        }
    }

    /// Paid period length.
    pub fn duration_days(&self) -> i64 {
        30
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// One subscription row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub user_id: String,
    pub plan: Plan,
    pub payment_id: String,
    pub order_id: String,
    pub status: SubscriptionStatus,
    pub price_rub: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Whether an active row has outlived its end date.
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active
            && self.end_date.is_some_and(|end| end < now)
    }
}

/// The read-only predicate the stage handlers gate chat and recommendations
/// on.
#[async_trait]
pub trait SubscriptionGate: Send + Sync {
    async fn has_active_subscription(&self, user_id: &str) -> bool;
}

/// Owns subscription rows end to end.
pub struct SubscriptionService {
    store: Arc<dyn ProfileStore>,
    payments: Arc<dyn PaymentProvider>,
}

/// What the subscription handler needs to reply with after plan selection.
#[derive(Debug, Clone)]
pub struct PendingCheckout {
    pub payment_id: String,
    pub payment_url: String,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn ProfileStore>, payments: Arc<dyn PaymentProvider>) -> Self {
        Self { store, payments }
    }

    /// Create a payment and record a pending subscription for it.
    pub async fn create(&self, user_id: &str, plan: Plan) -> Result<PendingCheckout, Error> {
        let payment = self.payments.create_payment(user_id, plan).await?;

        let now = Utc::now();
        let record = SubscriptionRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            plan,
            payment_id: payment.payment_id.clone(),
            order_id: payment.order_id.clone(),
            status: SubscriptionStatus::Pending,
            price_rub: plan.price_rub(),
            start_date: now,
            end_date: None,
            cancelled_at: None,
            created_at: now,
        };
        self.store.insert_subscription(&record).await?;

        tracing::info!(user_id, plan = plan.as_str(), payment_id = %payment.payment_id,
            "pending subscription recorded");
        Ok(PendingCheckout {
            payment_id: payment.payment_id,
            payment_url: payment.payment_url,
        })
    }

    /// Activate the subscription tied to a confirmed payment.
    ///
    /// Called from the payment-provider callback path, not from the
    /// dialogue router. Returns false when the payment is not confirmed or
    /// no matching row exists.
    pub async fn activate(&self, payment_id: &str) -> Result<bool, Error> {
        if !self.payments.check_payment(payment_id).await? {
            tracing::warn!(payment_id, "payment not confirmed, skipping activation");
            return Ok(false);
        }

        let Some(mut record) = self.store.subscription_by_payment(payment_id).await? else {
            tracing::warn!(payment_id, "no subscription recorded for payment");
            return Ok(false);
        };

        let now = Utc::now();
        record.status = SubscriptionStatus::Active;
        record.start_date = now;
        record.end_date = Some(now + Duration::days(record.plan.duration_days()));
        self.store.update_subscription(&record).await?;

        tracing::info!(user_id = %record.user_id, payment_id, "subscription activated");
        Ok(true)
    }

    /// The user's most recent subscription, lazily expiring it if its end
    /// date has passed.
    pub async fn current(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, Error> {
        let Some(mut record) = self.store.latest_subscription(user_id).await? else {
            return Ok(None);
        };

        if record.is_past_expiry(Utc::now()) {
            record.status = SubscriptionStatus::Expired;
            self.store.update_subscription(&record).await?;
            tracing::info!(user_id, subscription = %record.id, "subscription expired");
        }

        Ok(Some(record))
    }

    /// Cancel the user's active subscription. Only a currently-active
    /// subscription can be cancelled.
    pub async fn cancel(&self, user_id: &str) -> Result<bool, Error> {
        let Some(mut record) = self.current(user_id).await? else {
            return Ok(false);
        };
        if record.status != SubscriptionStatus::Active {
            return Ok(false);
        }

        record.status = SubscriptionStatus::Cancelled;
        record.cancelled_at = Some(Utc::now());
        self.store.update_subscription(&record).await?;

        tracing::info!(user_id, subscription = %record.id, "subscription cancelled");
        Ok(true)
    }
}

#[async_trait]
impl SubscriptionGate for SubscriptionService {
    async fn has_active_subscription(&self, user_id: &str) -> bool {
        match self.current(user_id).await {
            Ok(Some(record)) => record.status == SubscriptionStatus::Active,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "subscription check failed, gating closed");
                false
            }
        }
    }
}
