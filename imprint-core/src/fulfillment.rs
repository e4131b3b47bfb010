use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProviderError;
use imprint_shared::ShippingAddress;

/// One line of an outbound fulfillment submission
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubmissionItem {
    pub provider_variant_id: String,
    pub quantity: i32,
    pub design_url: String,
}

/// The payload sent to the fulfillment partner for production
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub order_id: Uuid,
    pub order_number: String,
    pub recipient: ShippingAddress,
    pub items: Vec<SubmissionItem>,
}

/// The partner's acknowledgment of a submission
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionAck {
    pub partner_order_id: String,
    pub partner_status: String,
}

#[async_trait]
pub trait FulfillmentProvider: Send + Sync {
    /// Submit an order for production with the partner
    async fn submit_order(&self, submission: &Submission) -> Result<SubmissionAck, ProviderError>;
}
