use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use imprint_core::repository::{OrderStore, PaymentFacts, TransitionWrite};
use imprint_core::StoreError;
use imprint_shared::{Actor, Customization, Order, OrderItem, ShippingAddress, StatusHistoryEntry};

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn codec_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Postgres-backed order store. `apply_transition` runs the status update
/// and the history insert in one transaction.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    status: String,
    subtotal_minor: i64,
    shipping_minor: i64,
    tax_minor: i64,
    total_minor: i64,
    currency: String,
    payment_reference: Option<String>,
    fulfillment_reference: Option<String>,
    fulfillment_status: Option<String>,
    shipping_address: Option<serde_json::Value>,
    last_event_seq: Option<i64>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    variant_id: Uuid,
    provider_variant_id: Option<String>,
    name: String,
    quantity: i32,
    price_minor: i64,
    customization: serde_json::Value,
    print_asset_url: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    order_id: Uuid,
    from_status: Option<String>,
    to_status: String,
    changed_by: String,
    reason: Option<String>,
    irregular: bool,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItemRow>) -> Result<Order, StoreError> {
        let shipping_address = self
            .shipping_address
            .map(serde_json::from_value::<ShippingAddress>)
            .transpose()
            .map_err(codec_err)?;

        let items = items
            .into_iter()
            .map(OrderItemRow::into_item)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            status: self.status.parse().map_err(codec_err)?,
            items,
            subtotal_minor: self.subtotal_minor,
            shipping_minor: self.shipping_minor,
            tax_minor: self.tax_minor,
            total_minor: self.total_minor,
            currency: self.currency,
            payment_reference: self.payment_reference,
            fulfillment_reference: self.fulfillment_reference,
            fulfillment_status: self.fulfillment_status,
            shipping_address,
            last_event_seq: self.last_event_seq,
            paid_at: self.paid_at,
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl OrderItemRow {
    fn into_item(self) -> Result<OrderItem, StoreError> {
        let customization: Customization =
            serde_json::from_value(self.customization).map_err(codec_err)?;
        Ok(OrderItem {
            id: self.id,
            order_id: self.order_id,
            variant_id: self.variant_id,
            provider_variant_id: self.provider_variant_id,
            name: self.name,
            quantity: self.quantity,
            price_minor: self.price_minor,
            customization,
            print_asset_url: self.print_asset_url,
            created_at: self.created_at,
        })
    }
}

impl HistoryRow {
    fn into_entry(self) -> Result<StatusHistoryEntry, StoreError> {
        Ok(StatusHistoryEntry {
            id: self.id,
            order_id: self.order_id,
            from_status: self
                .from_status
                .map(|s| s.parse())
                .transpose()
                .map_err(codec_err)?,
            to_status: self.to_status.parse().map_err(codec_err)?,
            changed_by: self.changed_by.parse().map_err(codec_err)?,
            reason: self.reason,
            irregular: self.irregular,
            created_at: self.created_at,
        })
    }
}

impl PgOrderStore {
    pub async fn connect(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    async fn load_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        row.into_order(items).map(Some)
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create_order(
        &self,
        order: &Order,
        opened_by: &Actor,
    ) -> Result<StatusHistoryEntry, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let shipping_address = order
            .shipping_address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(codec_err)?;

        sqlx::query(
            "INSERT INTO orders (id, order_number, status, subtotal_minor, shipping_minor, \
             tax_minor, total_minor, currency, payment_reference, shipping_address, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.status.as_str())
        .bind(order.subtotal_minor)
        .bind(order.shipping_minor)
        .bind(order.tax_minor)
        .bind(order.total_minor)
        .bind(&order.currency)
        .bind(&order.payment_reference)
        .bind(shipping_address)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for item in &order.items {
            let customization = serde_json::to_value(&item.customization).map_err(codec_err)?;
            sqlx::query(
                "INSERT INTO order_items (id, order_id, variant_id, provider_variant_id, name, \
                 quantity, price_minor, customization, print_asset_url, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(item.id)
            .bind(order.id)
            .bind(item.variant_id)
            .bind(&item.provider_variant_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.price_minor)
            .bind(customization)
            .bind(&item.print_asset_url)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

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

        sqlx::query(
            "INSERT INTO order_status_history (id, order_id, from_status, to_status, \
             changed_by, reason, irregular, created_at) \
             VALUES ($1, $2, NULL, $3, $4, NULL, FALSE, $5)",
        )
        .bind(entry.id)
        .bind(entry.order_id)
        .bind(entry.to_status.as_str())
        .bind(entry.changed_by.to_string())
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(entry)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        self.load_order(id).await
    }

    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, StoreError> {
        let id: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM orders WHERE payment_reference = $1")
                .bind(reference)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        match id {
            Some((id,)) => self.load_order(id).await,
            None => Ok(None),
        }
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        write: &TransitionWrite,
    ) -> Result<(Order, StatusHistoryEntry), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Lock the row so the audit entry records the status it replaces
        let current = sqlx::query("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::NotFound(id))?;
        let from_status: String = current.try_get("status").map_err(db_err)?;
        let from_status = from_status.parse().map_err(codec_err)?;

        let now = Utc::now();
        sqlx::query(
            "UPDATE orders SET status = $1, updated_at = $2, \
             paid_at = CASE WHEN $3 THEN $2 ELSE paid_at END, \
             shipped_at = CASE WHEN $4 THEN $2 ELSE shipped_at END, \
             delivered_at = CASE WHEN $5 THEN $2 ELSE delivered_at END, \
             last_event_seq = COALESCE($6, last_event_seq) \
             WHERE id = $7",
        )
        .bind(write.to_status.as_str())
        .bind(now)
        .bind(write.set_paid_at)
        .bind(write.set_shipped_at)
        .bind(write.set_delivered_at)
        .bind(write.event_seq)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

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

        sqlx::query(
            "INSERT INTO order_status_history (id, order_id, from_status, to_status, \
             changed_by, reason, irregular, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.id)
        .bind(entry.order_id)
        .bind(from_status.as_str())
        .bind(entry.to_status.as_str())
        .bind(entry.changed_by.to_string())
        .bind(&entry.reason)
        .bind(entry.irregular)
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        let order = self
            .load_order(id)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        Ok((order, entry))
    }

    async fn record_payment_facts(
        &self,
        id: Uuid,
        facts: &PaymentFacts,
    ) -> Result<Order, StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET total_minor = $1, \
             shipping_minor = COALESCE($2, shipping_minor), \
             tax_minor = COALESCE($3, tax_minor), \
             currency = COALESCE($4, currency), \
             updated_at = now() \
             WHERE id = $5",
        )
        .bind(facts.total_minor)
        .bind(facts.shipping_minor)
        .bind(facts.tax_minor)
        .bind(&facts.currency)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        self.load_order(id).await?.ok_or(StoreError::NotFound(id))
    }

    async fn set_shipping_address_if_absent(
        &self,
        id: Uuid,
        address: &ShippingAddress,
    ) -> Result<bool, StoreError> {
        let value = serde_json::to_value(address).map_err(codec_err)?;
        let result = sqlx::query(
            "UPDATE orders SET shipping_address = $1, updated_at = now() \
             WHERE id = $2 AND shipping_address IS NULL",
        )
        .bind(value)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Distinguish "already has an address" from "no such order"
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn record_fulfillment_ack(
        &self,
        id: Uuid,
        partner_order_id: &str,
        partner_status: &str,
    ) -> Result<Order, StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET fulfillment_reference = $1, fulfillment_status = $2, \
             updated_at = now() WHERE id = $3",
        )
        .bind(partner_order_id)
        .bind(partner_status)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        self.load_order(id).await?.ok_or(StoreError::NotFound(id))
    }

    async fn attach_print_asset(
        &self,
        order_id: Uuid,
        item_id: Uuid,
        url: &str,
    ) -> Result<Order, StoreError> {
        let result = sqlx::query(
            "UPDATE order_items SET print_asset_url = $1 WHERE id = $2 AND order_id = $3",
        )
        .bind(url)
        .bind(item_id)
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(format!(
                "item {item_id} not on order {order_id}"
            )));
        }
        self.load_order(order_id)
            .await?
            .ok_or(StoreError::NotFound(order_id))
    }

    async fn history(&self, id: Uuid) -> Result<Vec<StatusHistoryEntry>, StoreError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT * FROM order_status_history WHERE order_id = $1 ORDER BY created_at",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(HistoryRow::into_entry).collect()
    }
}
