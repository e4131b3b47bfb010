use std::sync::Arc;
use uuid::Uuid;

use imprint_core::payment::PaymentSessionFacts;
use imprint_core::repository::OrderStore;
use imprint_order::{
    validate_for_submission, FulfillmentService, MockFulfillmentProvider, PaymentReconciler,
    StatusEngine,
};
use imprint_shared::{
    Actor, Customization, Order, OrderItem, OrderStatus, Placement, ShippingAddress,
};
use imprint_store::MemoryOrderStore;

fn checkout_address() -> ShippingAddress {
    ShippingAddress {
        recipient_name: "Dorothy Vaughan".into(),
        line1: "77 Machine Ln".into(),
        line2: Some("Apt 4".into()),
        city: "Hampton".into(),
        region: Some("VA".into()),
        country_code: "US".into(),
        postal_code: "23661".into(),
    }
}

/// The full happy path: checkout → payment event → submission → production →
/// shipped → delivered, with the audit trail replaying every step.
#[tokio::test]
async fn test_order_lifecycle_end_to_end() {
    let store: Arc<MemoryOrderStore> = Arc::new(MemoryOrderStore::new());
    let engine = StatusEngine::new(store.clone());
    let reconciler = PaymentReconciler::new(store.clone());
    let pod = Arc::new(MockFulfillmentProvider::new());
    let fulfillment = FulfillmentService::new(store.clone(), pod.clone(), engine.clone());

    // Checkout-session creation: order opens in PENDING_PAYMENT with its
    // first history entry
    let mut order = Order::new("IMP-9001".into(), "usd".into(), Some("cs_e2e_1".into()));
    let item = OrderItem::new(
        order.id,
        Uuid::new_v4(),
        Some("9101".into()),
        "Classic Tee".into(),
        1,
        4200,
        Customization::DirectPrint {
            placement: Placement::Front,
            design_url: Some("https://cdn/e2e.png".into()),
            source_image_url: None,
        },
    );
    order.add_item(item);
    store.create_order(&order, &Actor::System).await.unwrap();

    // Payment-confirmation event: provider-confirmed totals land first
    let located = reconciler
        .locate_order_by_session("cs_e2e_1")
        .await
        .unwrap()
        .expect("session maps to the order");
    assert_eq!(located.id, order.id);

    reconciler
        .finalize_from_payment_session(
            order.id,
            &PaymentSessionFacts {
                session_id: "cs_e2e_1".into(),
                amount_total_minor: 4500,
                shipping_minor: Some(0),
                tax_minor: Some(300),
                currency: None,
                shipping_address: Some(checkout_address()),
            },
        )
        .await
        .unwrap();

    // ...then the order is declared paid
    engine
        .transition(
            order.id,
            OrderStatus::Paid,
            Actor::Webhook("stripe".into()),
            None,
        )
        .await
        .unwrap();

    let paid = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(paid.total_minor, 4500);
    assert_eq!(paid.tax_minor, 300);
    assert!(paid.paid_at.is_some());
    assert!(validate_for_submission(&paid).is_ok());

    // Submission to the partner
    fulfillment
        .submit(order.id, Actor::Job("pod-submit".into()))
        .await
        .unwrap();
    assert_eq!(pod.submission_count(), 1);

    // Partner progress events
    for (target, via) in [
        (OrderStatus::InProduction, Actor::Webhook("pod".into())),
        (OrderStatus::Shipped, Actor::Webhook("pod".into())),
        (OrderStatus::Delivered, Actor::Webhook("pod".into())),
    ] {
        engine
            .transition(order.id, target, via, None)
            .await
            .unwrap();
    }

    let done = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(done.status, OrderStatus::Delivered);
    assert!(done.shipped_at.is_some());
    assert!(done.delivered_at.is_some());

    // History: the initial entry plus exactly five transitions, replaying
    // the exact status sequence, none of them irregular
    let history = store.history(order.id).await.unwrap();
    assert_eq!(history.len(), 6);
    assert_eq!(history[0].from_status, None);
    let replayed: Vec<OrderStatus> = history.iter().map(|e| e.to_status).collect();
    assert_eq!(
        replayed,
        vec![
            OrderStatus::PendingPayment,
            OrderStatus::Paid,
            OrderStatus::SubmittedToPod,
            OrderStatus::InProduction,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ]
    );
    assert!(history.iter().all(|e| !e.irregular));
    assert_eq!(history.last().unwrap().to_status, done.status);
}

/// Replayed webhook deliveries along the way never duplicate audit entries
#[tokio::test]
async fn test_lifecycle_with_redelivered_events() {
    let store: Arc<MemoryOrderStore> = Arc::new(MemoryOrderStore::new());
    let engine = StatusEngine::new(store.clone());

    let order = Order::new("IMP-9002".into(), "usd".into(), Some("cs_e2e_2".into()));
    store.create_order(&order, &Actor::System).await.unwrap();

    for target in [
        OrderStatus::Paid,
        OrderStatus::Paid, // duplicate delivery
        OrderStatus::SubmittedToPod,
        OrderStatus::InProduction,
        OrderStatus::InProduction, // duplicate delivery
        OrderStatus::Shipped,
    ] {
        engine
            .transition(order.id, target, Actor::Webhook("pod".into()), None)
            .await
            .unwrap();
    }

    let history = store.history(order.id).await.unwrap();
    assert_eq!(history.len(), 5); // initial + four distinct transitions
    assert_eq!(
        store.get_order(order.id).await.unwrap().unwrap().status,
        OrderStatus::Shipped
    );
}
