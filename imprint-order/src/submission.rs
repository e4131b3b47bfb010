use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::engine::{StatusEngine, TransitionError};
use crate::validator::{build_submission, SubmissionRejection};
use imprint_core::fulfillment::{FulfillmentProvider, Submission, SubmissionAck};
use imprint_core::repository::OrderStore;
use imprint_core::{ProviderError, StoreError};
use imprint_shared::{Actor, OrderStatus};

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Recoverable by completing the order; never worth retrying as-is
    #[error("order not eligible for submission: {0}")]
    Rejected(#[from] SubmissionRejection),

    /// The partner call failed; the caller owns the retry policy
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Drives the one transition with an external side effect: validate the
/// order, submit it to the fulfillment partner, record the partner's
/// acknowledgment, and mark the order SUBMITTED_TO_POD.
pub struct FulfillmentService {
    store: Arc<dyn OrderStore>,
    provider: Arc<dyn FulfillmentProvider>,
    engine: StatusEngine,
}

impl FulfillmentService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        provider: Arc<dyn FulfillmentProvider>,
        engine: StatusEngine,
    ) -> Self {
        Self {
            store,
            provider,
            engine,
        }
    }

    pub async fn submit(
        &self,
        order_id: Uuid,
        changed_by: Actor,
    ) -> Result<SubmissionAck, SubmitError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(StoreError::NotFound(order_id))?;

        let submission = build_submission(&order)?;
        let ack = self.provider.submit_order(&submission).await?;

        self.store
            .record_fulfillment_ack(order_id, &ack.partner_order_id, &ack.partner_status)
            .await?;
        self.engine
            .transition(
                order_id,
                OrderStatus::SubmittedToPod,
                changed_by,
                Some(format!(
                    "accepted by fulfillment partner as {}",
                    ack.partner_order_id
                )),
            )
            .await?;

        tracing::info!(
            %order_id,
            partner_order_id = %ack.partner_order_id,
            partner_status = %ack.partner_status,
            "order submitted for fulfillment"
        );
        Ok(ack)
    }
}

/// Captures submissions instead of calling a real partner. `fail_times(n)`
/// makes the next n calls fail, for exercising caller-side retry.
pub struct MockFulfillmentProvider {
    pub submissions: Mutex<Vec<Submission>>,
    remaining_failures: AtomicU32,
}

impl MockFulfillmentProvider {
    pub fn new() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            remaining_failures: AtomicU32::new(0),
        }
    }

    pub fn fail_times(&self, n: u32) {
        self.remaining_failures.store(n, Ordering::SeqCst);
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

impl Default for MockFulfillmentProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FulfillmentProvider for MockFulfillmentProvider {
    async fn submit_order(&self, submission: &Submission) -> Result<SubmissionAck, ProviderError> {
        self.submissions.lock().unwrap().push(submission.clone());
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::Call(
                "simulated fulfillment partner outage".into(),
            ));
        }
        Ok(SubmissionAck {
            partner_order_id: format!("pod_mock_{}", submission.order_number),
            partner_status: "draft".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imprint_shared::{Customization, Order, OrderItem, Placement, ShippingAddress};
    use imprint_store::MemoryOrderStore;

    async fn paid_order(store: &Arc<MemoryOrderStore>) -> Order {
        let mut order = Order::new("IMP-7001".into(), "usd".into(), Some("pi_sub_1".into()));
        let item = OrderItem::new(
            order.id,
            Uuid::new_v4(),
            Some("7101".into()),
            "Tote Bag".into(),
            1,
            2400,
            Customization::DirectPrint {
                placement: Placement::Front,
                design_url: Some("https://cdn/tote.png".into()),
                source_image_url: None,
            },
        );
        order.add_item(item);
        order.status = OrderStatus::Paid;
        order.shipping_address = Some(ShippingAddress {
            recipient_name: "Katherine Johnson".into(),
            line1: "10 Glenn Ave".into(),
            line2: None,
            city: "Newport News".into(),
            region: Some("VA".into()),
            country_code: "US".into(),
            postal_code: "23601".into(),
        });
        store.create_order(&order, &Actor::System).await.unwrap();
        order
    }

    fn service(
        store: Arc<MemoryOrderStore>,
        provider: Arc<MockFulfillmentProvider>,
    ) -> FulfillmentService {
        let engine = StatusEngine::new(store.clone());
        FulfillmentService::new(store, provider, engine)
    }

    #[tokio::test]
    async fn test_submit_records_ack_and_transitions() {
        let store = Arc::new(MemoryOrderStore::new());
        let provider = Arc::new(MockFulfillmentProvider::new());
        let order = paid_order(&store).await;
        let service = service(store.clone(), provider.clone());

        let ack = service
            .submit(order.id, Actor::Job("pod-submit".into()))
            .await
            .unwrap();
        assert_eq!(ack.partner_order_id, "pod_mock_IMP-7001");

        let reread = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(reread.status, OrderStatus::SubmittedToPod);
        assert_eq!(reread.fulfillment_reference.as_deref(), Some("pod_mock_IMP-7001"));
        assert_eq!(reread.fulfillment_status.as_deref(), Some("draft"));

        let submitted = provider.submissions.lock().unwrap()[0].clone();
        assert_eq!(submitted.items[0].design_url, "https://cdn/tote.png");
    }

    #[tokio::test]
    async fn test_ineligible_order_is_rejected_before_partner_call() {
        let store = Arc::new(MemoryOrderStore::new());
        let provider = Arc::new(MockFulfillmentProvider::new());
        let mut order = paid_order(&store).await;
        order.id = Uuid::new_v4();
        order.status = OrderStatus::PendingPayment;
        store.create_order(&order, &Actor::System).await.unwrap();
        let service = service(store, provider.clone());

        let err = service
            .submit(order.id, Actor::Job("pod-submit".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Rejected(_)));
        assert_eq!(provider.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_partner_failure_surfaces_and_leaves_status_untouched() {
        let store = Arc::new(MemoryOrderStore::new());
        let provider = Arc::new(MockFulfillmentProvider::new());
        provider.fail_times(1);
        let order = paid_order(&store).await;
        let service = service(store.clone(), provider);

        let err = service
            .submit(order.id, Actor::Job("pod-submit".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Provider(_)));

        let reread = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(reread.status, OrderStatus::Paid);
        assert!(reread.fulfillment_reference.is_none());
    }
}
