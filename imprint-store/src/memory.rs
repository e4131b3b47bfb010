use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use imprint_core::repository::{OrderStore, PaymentFacts, TransitionWrite};
use imprint_core::StoreError;
use imprint_shared::{Actor, Order, ShippingAddress, StatusHistoryEntry};

/// Points at which a write can be made to fail, for exercising the
/// all-or-nothing guarantee at the storage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// Fail after the status update has been staged but before the history
    /// entry would be inserted
    BeforeHistoryInsert,
}

struct Inner {
    orders: HashMap<Uuid, Order>,
    history: HashMap<Uuid, Vec<StatusHistoryEntry>>,
}

/// In-memory order store. Writes are staged on clones and committed under
/// one lock, so a transition either lands completely or not at all.
pub struct MemoryOrderStore {
    inner: Mutex<Inner>,
    fault: Mutex<Option<FaultPoint>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                orders: HashMap::new(),
                history: HashMap::new(),
            }),
            fault: Mutex::new(None),
        }
    }

    /// Arm a one-shot fault at the given point; the next write that reaches
    /// it fails and commits nothing
    pub fn inject_fault(&self, point: FaultPoint) {
        *self.fault.lock().unwrap() = Some(point);
    }

    fn take_fault(&self) -> Option<FaultPoint> {
        self.fault.lock().unwrap().take()
    }
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create_order(
        &self,
        order: &Order,
        opened_by: &Actor,
    ) -> Result<StatusHistoryEntry, StoreError> {
        let entry = StatusHistoryEntry {
            id: Uuid::new_v4(),
            order_id: order.id,
            from_status: None,
            to_status: order.status,
            changed_by: opened_by.clone(),
            reason: None,
            irregular: false,
            created_at: Utc::now(),
        };

        let mut inner = self.inner.lock().unwrap();
        inner.orders.insert(order.id, order.clone());
        inner.history.entry(order.id).or_default().push(entry.clone());
        Ok(entry)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.orders.get(&id).cloned())
    }

    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .orders
            .values()
            .find(|o| o.payment_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        write: &TransitionWrite,
    ) -> Result<(Order, StatusHistoryEntry), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let current = inner.orders.get(&id).ok_or(StoreError::NotFound(id))?;

        // Stage both writes before touching the maps
        let now = Utc::now();
        let mut staged = current.clone();
        let from_status = staged.status;
        staged.status = write.to_status;
        staged.updated_at = now;
        if write.set_paid_at {
            staged.paid_at = Some(now);
        }
        if write.set_shipped_at {
            staged.shipped_at = Some(now);
        }
        if write.set_delivered_at {
            staged.delivered_at = Some(now);
        }
        if write.event_seq.is_some() {
            staged.last_event_seq = write.event_seq;
        }

        if self.take_fault() == Some(FaultPoint::BeforeHistoryInsert) {
            return Err(StoreError::Backend(
                "injected fault before history insert".into(),
            ));
        }

        let entry = StatusHistoryEntry {
            id: Uuid::new_v4(),
            order_id: id,
            from_status: Some(from_status),
            to_status: write.to_status,
            changed_by: write.changed_by.clone(),
            reason: write.reason.clone(),
            irregular: write.irregular,
            created_at: now,
        };

        inner.orders.insert(id, staged.clone());
        inner.history.entry(id).or_default().push(entry.clone());
        Ok((staged, entry))
    }

    async fn record_payment_facts(
        &self,
        id: Uuid,
        facts: &PaymentFacts,
    ) -> Result<Order, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner.orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        order.total_minor = facts.total_minor;
        if let Some(shipping) = facts.shipping_minor {
            order.shipping_minor = shipping;
        }
        if let Some(tax) = facts.tax_minor {
            order.tax_minor = tax;
        }
        if let Some(currency) = &facts.currency {
            order.currency = currency.clone();
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn set_shipping_address_if_absent(
        &self,
        id: Uuid,
        address: &ShippingAddress,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner.orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if order.shipping_address.is_some() {
            return Ok(false);
        }
        order.shipping_address = Some(address.clone());
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn record_fulfillment_ack(
        &self,
        id: Uuid,
        partner_order_id: &str,
        partner_status: &str,
    ) -> Result<Order, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner.orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        order.fulfillment_reference = Some(partner_order_id.to_string());
        order.fulfillment_status = Some(partner_status.to_string());
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn attach_print_asset(
        &self,
        order_id: Uuid,
        item_id: Uuid,
        url: &str,
    ) -> Result<Order, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::NotFound(order_id))?;
        let item = order
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| {
                StoreError::Backend(format!("item {item_id} not on order {order_id}"))
            })?;
        item.print_asset_url = Some(url.to_string());
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn history(&self, id: Uuid) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.history.get(&id).cloned().unwrap_or_default())
    }
}
