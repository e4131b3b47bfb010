use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use imprint_shared::{Actor, Order, OrderStatus, ShippingAddress, StatusHistoryEntry};

/// A fully-decided status change, applied by the store as one all-or-nothing
/// write: the order row update and the history insert either both land or
/// neither does.
#[derive(Debug, Clone)]
pub struct TransitionWrite {
    pub to_status: OrderStatus,
    pub changed_by: Actor,
    pub reason: Option<String>,
    pub irregular: bool,
    /// External event sequence number to record, if the triggering event
    /// carried one
    pub event_seq: Option<i64>,
    pub set_paid_at: bool,
    pub set_shipped_at: bool,
    pub set_delivered_at: bool,
}

/// Provider-confirmed money facts folded into an order at payment completion
#[derive(Debug, Clone)]
pub struct PaymentFacts {
    pub total_minor: i64,
    pub shipping_minor: Option<i64>,
    pub tax_minor: Option<i64>,
    pub currency: Option<String>,
}

/// Durable home of orders and their append-only status history. The only
/// mutable shared state in the system; every component re-reads through it
/// before acting.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order together with its initial history entry
    /// (`from_status = None`)
    async fn create_order(
        &self,
        order: &Order,
        opened_by: &Actor,
    ) -> Result<StatusHistoryEntry, StoreError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Look up an order by the payment provider's session/intent id
    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, StoreError>;

    /// Atomically update the order status (plus any lifecycle timestamps and
    /// the event sequence) and append the audit entry
    async fn apply_transition(
        &self,
        id: Uuid,
        write: &TransitionWrite,
    ) -> Result<(Order, StatusHistoryEntry), StoreError>;

    /// Overwrite totals with provider-confirmed amounts
    async fn record_payment_facts(
        &self,
        id: Uuid,
        facts: &PaymentFacts,
    ) -> Result<Order, StoreError>;

    /// Persist the checkout-supplied address unless one is already recorded.
    /// Returns whether the address was written.
    async fn set_shipping_address_if_absent(
        &self,
        id: Uuid,
        address: &ShippingAddress,
    ) -> Result<bool, StoreError>;

    /// Record the fulfillment partner's order id and status string
    async fn record_fulfillment_ack(
        &self,
        id: Uuid,
        partner_order_id: &str,
        partner_status: &str,
    ) -> Result<Order, StoreError>;

    /// Attach a print-ready asset to a line item post-preparation
    async fn attach_print_asset(
        &self,
        order_id: Uuid,
        item_id: Uuid,
        url: &str,
    ) -> Result<Order, StoreError>;

    /// Full audit trail for an order, oldest first
    async fn history(&self, id: Uuid) -> Result<Vec<StatusHistoryEntry>, StoreError>;
}
