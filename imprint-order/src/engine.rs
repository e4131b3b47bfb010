use std::sync::Arc;
use uuid::Uuid;

use imprint_core::repository::{OrderStore, TransitionWrite};
use imprint_core::StoreError;
use imprint_shared::{Actor, Order, OrderStatus, StatusHistoryEntry};

/// Applies order status transitions. Every applied transition pairs the
/// status update with an audit entry in one atomic store write; re-applying
/// the current status is a no-op, which makes replayed webhook deliveries
/// safe.
#[derive(Clone)]
pub struct StatusEngine {
    store: Arc<dyn OrderStore>,
}

#[derive(Debug)]
pub enum TransitionOutcome {
    /// The status changed and an audit entry was written
    Applied {
        order: Order,
        entry: StatusHistoryEntry,
    },
    /// The order already held the target status; nothing was written
    NoOp { order: Order },
    /// The triggering event's sequence number was not newer than the last
    /// one applied; nothing was written
    Stale { order: Order },
}

impl TransitionOutcome {
    pub fn order(&self) -> &Order {
        match self {
            TransitionOutcome::Applied { order, .. }
            | TransitionOutcome::NoOp { order }
            | TransitionOutcome::Stale { order } => order,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StatusEngine {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Transition an order to `target`, recording who asked and why.
    ///
    /// The engine does not forbid unusual targets: whatever is requested is
    /// recorded, so the audit trail stays faithful even to odd operator
    /// actions. A target that is not adjacent to the current status is
    /// flagged `irregular` on the audit entry for later review.
    pub async fn transition(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        changed_by: Actor,
        reason: Option<String>,
    ) -> Result<TransitionOutcome, TransitionError> {
        self.transition_with_seq(order_id, target, changed_by, reason, None)
            .await
    }

    /// Like [`transition`](Self::transition), but guarded by an external
    /// event sequence number: events at or below the last applied sequence
    /// are dropped as stale instead of overwriting newer state.
    pub async fn transition_with_seq(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        changed_by: Actor,
        reason: Option<String>,
        event_seq: Option<i64>,
    ) -> Result<TransitionOutcome, TransitionError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(StoreError::NotFound(order_id))?;

        if let (Some(seq), Some(last)) = (event_seq, order.last_event_seq) {
            if seq <= last {
                tracing::warn!(
                    %order_id,
                    seq,
                    last,
                    target = %target,
                    "dropping stale transition event"
                );
                return Ok(TransitionOutcome::Stale { order });
            }
        }

        if order.status == target {
            return Ok(TransitionOutcome::NoOp { order });
        }

        let irregular = !order.status.is_adjacent(target);
        if irregular {
            tracing::warn!(
                %order_id,
                from = %order.status,
                to = %target,
                by = %changed_by,
                "non-adjacent transition requested, recording as irregular"
            );
        }

        let write = TransitionWrite {
            to_status: target,
            changed_by,
            reason,
            irregular,
            event_seq,
            // Lifecycle timestamps are set once, on the call that actually
            // enters the status
            set_paid_at: target == OrderStatus::Paid && order.paid_at.is_none(),
            set_shipped_at: target == OrderStatus::Shipped && order.shipped_at.is_none(),
            set_delivered_at: target == OrderStatus::Delivered && order.delivered_at.is_none(),
        };

        let (order, entry) = self.store.apply_transition(order_id, &write).await?;
        tracing::info!(
            %order_id,
            from = ?entry.from_status,
            to = %entry.to_status,
            by = %entry.changed_by,
            "order status transitioned"
        );
        Ok(TransitionOutcome::Applied { order, entry })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imprint_core::repository::OrderStore;
    use imprint_store::MemoryOrderStore;

    async fn engine_with_order() -> (StatusEngine, Arc<MemoryOrderStore>, Uuid) {
        let store = Arc::new(MemoryOrderStore::new());
        let order = Order::new("IMP-3001".into(), "usd".into(), Some("cs_eng_1".into()));
        store.create_order(&order, &Actor::System).await.unwrap();
        let engine = StatusEngine::new(store.clone());
        (engine, store, order.id)
    }

    #[tokio::test]
    async fn test_history_tail_always_matches_status() {
        let (engine, store, id) = engine_with_order().await;

        for target in [
            OrderStatus::Paid,
            OrderStatus::SubmittedToPod,
            OrderStatus::InProduction,
        ] {
            engine
                .transition(id, target, Actor::System, None)
                .await
                .unwrap();
            let order = store.get_order(id).await.unwrap().unwrap();
            let history = store.history(id).await.unwrap();
            assert_eq!(history.last().unwrap().to_status, order.status);
        }
    }

    #[tokio::test]
    async fn test_repeated_target_is_noop_with_single_entry() {
        let (engine, store, id) = engine_with_order().await;

        let first = engine
            .transition(id, OrderStatus::Paid, Actor::Webhook("stripe".into()), None)
            .await
            .unwrap();
        assert!(matches!(first, TransitionOutcome::Applied { .. }));

        let second = engine
            .transition(id, OrderStatus::Paid, Actor::Webhook("stripe".into()), None)
            .await
            .unwrap();
        assert!(matches!(second, TransitionOutcome::NoOp { .. }));

        let history = store.history(id).await.unwrap();
        let paid_entries = history
            .iter()
            .filter(|e| e.to_status == OrderStatus::Paid)
            .count();
        assert_eq!(paid_entries, 1);
    }

    #[tokio::test]
    async fn test_paid_at_set_once_and_not_on_replay() {
        let (engine, store, id) = engine_with_order().await;

        engine
            .transition(id, OrderStatus::Paid, Actor::System, None)
            .await
            .unwrap();
        let paid_at = store.get_order(id).await.unwrap().unwrap().paid_at;
        assert!(paid_at.is_some());

        engine
            .transition(id, OrderStatus::Paid, Actor::System, None)
            .await
            .unwrap();
        assert_eq!(store.get_order(id).await.unwrap().unwrap().paid_at, paid_at);
    }

    #[tokio::test]
    async fn test_backwards_transition_recorded_as_irregular() {
        let (engine, store, id) = engine_with_order().await;

        // Jump straight to DELIVERED, then back to PAID; both requests land
        // but both audit entries carry the irregular flag
        engine
            .transition(id, OrderStatus::Delivered, Actor::Admin("7".into()), None)
            .await
            .unwrap();
        engine
            .transition(
                id,
                OrderStatus::Paid,
                Actor::Admin("7".into()),
                Some("manual correction".into()),
            )
            .await
            .unwrap();

        let history = store.history(id).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[1].irregular);
        assert!(history[2].irregular);
        assert_eq!(
            store.get_order(id).await.unwrap().unwrap().status,
            OrderStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_stale_event_seq_is_dropped() {
        let (engine, store, id) = engine_with_order().await;

        engine
            .transition_with_seq(
                id,
                OrderStatus::Paid,
                Actor::Webhook("stripe".into()),
                None,
                Some(5),
            )
            .await
            .unwrap();

        // A redelivered earlier event must not move the order
        let outcome = engine
            .transition_with_seq(
                id,
                OrderStatus::Cancelled,
                Actor::Webhook("stripe".into()),
                None,
                Some(4),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, TransitionOutcome::Stale { .. }));

        let order = store.get_order(id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.last_event_seq, Some(5));
        assert_eq!(store.history(id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let store = Arc::new(MemoryOrderStore::new());
        let engine = StatusEngine::new(store);
        let err = engine
            .transition(Uuid::new_v4(), OrderStatus::Paid, Actor::System, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::Store(StoreError::NotFound(_))));
    }
}
