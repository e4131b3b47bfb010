use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::engine::StatusEngine;
use imprint_core::payment::{PaymentProvider, Refund, RefundReason, RefundRequest};
use imprint_core::repository::OrderStore;
use imprint_core::ProviderError;
use imprint_shared::{Actor, OrderStatus};

/// The compensation path for fulfillment failures: refund the charge if one
/// was captured, then drive the order to a terminal, explained status.
///
/// Runs best-effort. This code executes inside failure handling, where
/// raising a further error would mask the original problem, so every outcome
/// is logged and absorbed here. The refund is attempted exactly once; any
/// retrying belongs to the caller.
pub struct FailureCompensator {
    store: Arc<dyn OrderStore>,
    payments: Arc<dyn PaymentProvider>,
    engine: StatusEngine,
}

impl FailureCompensator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        payments: Arc<dyn PaymentProvider>,
        engine: StatusEngine,
    ) -> Self {
        Self {
            store,
            payments,
            engine,
        }
    }

    pub async fn handle_fulfillment_failure(&self, order_id: Uuid, reason: &str) {
        let order = match self.store.get_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                tracing::error!(%order_id, reason, "fulfillment failure for unknown order");
                return;
            }
            Err(e) => {
                tracing::error!(%order_id, error = %e, "could not load order for compensation");
                return;
            }
        };

        if order.status == OrderStatus::Paid {
            if let Some(reference) = order.payment_reference.clone() {
                let request = RefundRequest {
                    payment_reference: reference,
                    reason_code: RefundReason::FulfillmentFailed,
                    order_id: order.id,
                    order_number: order.order_number.clone(),
                    note: reason.to_string(),
                };
                match self.payments.refund(&request).await {
                    Ok(refund) => {
                        tracing::info!(
                            %order_id,
                            refund_id = %refund.id,
                            "refund issued after fulfillment failure"
                        );
                        self.finish(
                            order_id,
                            OrderStatus::Refunded,
                            format!("fulfillment failed: {reason}; refund {} issued", refund.id),
                        )
                        .await;
                    }
                    Err(e) => {
                        // The failed refund attempt must stay visible in the
                        // audit trail alongside the original failure
                        tracing::error!(%order_id, error = %e, "refund attempt failed");
                        self.finish(
                            order_id,
                            OrderStatus::Failed,
                            format!("fulfillment failed: {reason}; refund attempt failed: {e}"),
                        )
                        .await;
                    }
                }
                return;
            }
            tracing::error!(%order_id, "order is PAID but has no payment reference, skipping refund");
        }

        // Nothing was charged (or the order is past the point of refunding):
        // record the failure and stop
        self.finish(
            order_id,
            OrderStatus::Failed,
            format!("fulfillment failed: {reason}"),
        )
        .await;
    }

    async fn finish(&self, order_id: Uuid, target: OrderStatus, reason: String) {
        if let Err(e) = self
            .engine
            .transition(order_id, target, Actor::System, Some(reason))
            .await
        {
            tracing::error!(
                %order_id,
                error = %e,
                target = %target,
                "could not record terminal status after fulfillment failure"
            );
        }
    }
}

/// Records refund requests instead of calling a real provider; flip
/// `set_failing` to simulate a payment-provider outage.
pub struct MockPaymentProvider {
    pub refunds: Mutex<Vec<RefundRequest>>,
    failing: AtomicBool,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self {
            refunds: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn refund_count(&self) -> usize {
        self.refunds.lock().unwrap().len()
    }
}

impl Default for MockPaymentProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn refund(&self, request: &RefundRequest) -> Result<Refund, ProviderError> {
        self.refunds.lock().unwrap().push(request.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Call(
                "simulated payment provider outage".into(),
            ));
        }
        Ok(Refund {
            id: format!("re_mock_{}", request.order_number),
            status: "succeeded".to_string(),
        })
    }
}
