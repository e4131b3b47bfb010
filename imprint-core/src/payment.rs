use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProviderError;
use imprint_shared::ShippingAddress;

/// Facts confirmed by the payment provider at checkout completion.
/// Shipping and tax are computed by the provider and unknown at
/// order-creation time.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentSessionFacts {
    pub session_id: String,
    pub amount_total_minor: i64,
    pub shipping_minor: Option<i64>,
    pub tax_minor: Option<i64>,
    pub currency: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    FulfillmentFailed,
    RequestedByCustomer,
    Duplicate,
}

/// Outbound refund request, tagged with the internal order identity so the
/// provider-side record can be traced back.
#[derive(Debug, Clone, Serialize)]
pub struct RefundRequest {
    pub payment_reference: String,
    pub reason_code: RefundReason,
    pub order_id: Uuid,
    pub order_number: String,
    pub note: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Refund {
    /// Provider's refund id (e.g. re_123)
    pub id: String,
    pub status: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Issue a refund against the original charge
    async fn refund(&self, request: &RefundRequest) -> Result<Refund, ProviderError>;
}
