use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;

use imprint_core::payment::PaymentSessionFacts;
use imprint_order::TransitionOutcome;
use imprint_shared::{Actor, OrderStatus, ShippingAddress};

use crate::error::{store_err, transition_err, AppError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: PaymentWebhookData,
}

#[derive(Debug, Deserialize)]
pub struct PaymentWebhookData {
    pub object: CheckoutSessionObject,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    pub amount_total: i64,
    pub currency: Option<String>,
    pub total_details: Option<TotalDetails>,
    pub shipping_details: Option<ShippingDetails>,
}

#[derive(Debug, Deserialize)]
pub struct TotalDetails {
    pub amount_shipping: Option<i64>,
    pub amount_tax: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ShippingDetails {
    pub name: String,
    pub address: CheckoutAddress,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub country: String,
    pub postal_code: String,
}

impl ShippingDetails {
    fn into_address(self) -> ShippingAddress {
        ShippingAddress {
            recipient_name: self.name,
            line1: self.address.line1,
            line2: self.address.line2,
            city: self.address.city,
            region: self.address.state,
            country_code: self.address.country,
            postal_code: self.address.postal_code,
        }
    }
}

/// POST /v1/webhooks/payments
/// Payment-confirmation events from the payment provider. Delivery is
/// at-least-once; the reconcile step and the PAID transition are both safe
/// to replay.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhook>,
) -> Result<StatusCode, AppError> {
    tracing::info!(
        event = %payload.id,
        kind = %payload.type_,
        session = %payload.data.object.id,
        "received payment webhook"
    );

    if payload.type_ != "checkout.session.completed" {
        return Ok(StatusCode::OK);
    }

    let session = payload.data.object;
    let order = state
        .reconciler
        .locate_order_by_session(&session.id)
        .await
        .map_err(store_err)?
        .ok_or_else(|| {
            AppError::NotFoundError(format!("no order for payment session {}", session.id))
        })?;

    let facts = PaymentSessionFacts {
        session_id: session.id,
        amount_total_minor: session.amount_total,
        shipping_minor: session
            .total_details
            .as_ref()
            .and_then(|d| d.amount_shipping),
        tax_minor: session.total_details.as_ref().and_then(|d| d.amount_tax),
        currency: session.currency,
        shipping_address: session.shipping_details.map(ShippingDetails::into_address),
    };

    state
        .reconciler
        .finalize_from_payment_session(order.id, &facts)
        .await
        .map_err(store_err)?;

    state
        .engine
        .transition(
            order.id,
            OrderStatus::Paid,
            Actor::Webhook("stripe".into()),
            None,
        )
        .await
        .map_err(transition_err)?;

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct FulfillmentWebhook {
    pub order_id: Uuid,
    /// Partner status string: in_production, shipped, delivered, or failed
    pub status: String,
    pub partner_order_id: Option<String>,
    pub reason: Option<String>,
    /// Monotonic event sequence assigned by the partner, used to drop
    /// out-of-order redeliveries
    pub event_seq: Option<i64>,
}

/// POST /v1/webhooks/fulfillment
/// Progress and failure events from the fulfillment partner.
pub async fn handle_fulfillment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<FulfillmentWebhook>,
) -> Result<StatusCode, AppError> {
    tracing::info!(
        order_id = %payload.order_id,
        status = %payload.status,
        "received fulfillment webhook"
    );

    if payload.status == "failed" {
        let reason = payload.reason.as_deref().unwrap_or("fulfillment failed");
        state
            .compensator
            .handle_fulfillment_failure(payload.order_id, reason)
            .await;
        return Ok(StatusCode::OK);
    }

    let target = match payload.status.as_str() {
        "in_production" => OrderStatus::InProduction,
        "shipped" => OrderStatus::Shipped,
        "delivered" => OrderStatus::Delivered,
        other => {
            return Err(AppError::ValidationError(format!(
                "unknown fulfillment status: {other}"
            )))
        }
    };

    let outcome = state
        .engine
        .transition_with_seq(
            payload.order_id,
            target,
            Actor::Webhook("pod".into()),
            payload.reason,
            payload.event_seq,
        )
        .await
        .map_err(transition_err)?;

    // The partner-status mirror follows the transition outcome: a stale or
    // duplicate redelivery must not overwrite the mirror either
    if let TransitionOutcome::Applied { .. } = outcome {
        if let Some(partner_order_id) = &payload.partner_order_id {
            state
                .store
                .record_fulfillment_ack(payload.order_id, partner_order_id, &payload.status)
                .await
                .map_err(store_err)?;
        }
    }

    Ok(StatusCode::OK)
}
