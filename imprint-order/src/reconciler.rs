use std::sync::Arc;
use uuid::Uuid;

use imprint_core::payment::PaymentSessionFacts;
use imprint_core::repository::{OrderStore, PaymentFacts};
use imprint_core::StoreError;
use imprint_shared::Order;

/// Folds payment-provider facts into an order. Records what the provider
/// confirmed (total, shipping, tax, checkout address) and nothing else;
/// declaring the order paid is a separate transition made by the caller.
#[derive(Clone)]
pub struct PaymentReconciler {
    store: Arc<dyn OrderStore>,
}

impl PaymentReconciler {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Resolve the order a provider checkout session belongs to
    pub async fn locate_order_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Order>, StoreError> {
        self.store.find_by_payment_reference(session_id).await
    }

    /// Overwrite the subtotal-derived total with the provider-confirmed
    /// amount and record the shipping and tax the provider computed at
    /// checkout. The checkout address is persisted only when the order has
    /// none recorded yet.
    pub async fn finalize_from_payment_session(
        &self,
        order_id: Uuid,
        facts: &PaymentSessionFacts,
    ) -> Result<Order, StoreError> {
        let mut order = self
            .store
            .record_payment_facts(
                order_id,
                &PaymentFacts {
                    total_minor: facts.amount_total_minor,
                    shipping_minor: facts.shipping_minor,
                    tax_minor: facts.tax_minor,
                    currency: facts.currency.clone(),
                },
            )
            .await?;

        if let Some(address) = &facts.shipping_address {
            if self
                .store
                .set_shipping_address_if_absent(order_id, address)
                .await?
            {
                order.shipping_address = Some(address.clone());
            }
        }

        tracing::info!(
            %order_id,
            session = %facts.session_id,
            total_minor = facts.amount_total_minor,
            "payment session reconciled"
        );
        Ok(order)
    }
}
