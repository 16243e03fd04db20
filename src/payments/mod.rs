//! Payment provider abstraction — create a payment, check its status.

pub mod yookassa;

pub use yookassa::YooKassaProvider;

use async_trait::async_trait;

use crate::error::PaymentError;
use crate::subscription::Plan;

/// A freshly created payment: the id to poll and the link to send the user.
#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub payment_id: String,
    pub payment_url: String,
    pub order_id: String,
}

/// Single round-trip payment operations.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a payment for a plan; returns the checkout link.
    async fn create_payment(
        &self,
        user_id: &str,
        plan: Plan,
    ) -> Result<CreatedPayment, PaymentError>;

    /// Whether the payment has succeeded.
    async fn check_payment(&self, payment_id: &str) -> Result<bool, PaymentError>;
}
