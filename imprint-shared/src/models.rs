use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Order status in the fulfillment lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    SubmittedToPod,
    InProduction,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
    Failed,
}

impl OrderStatus {
    /// Terminal statuses are never left again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered
                | OrderStatus::Cancelled
                | OrderStatus::Refunded
                | OrderStatus::Failed
        )
    }

    /// Whether `next` is one step away in the lifecycle: the forward chain
    /// PENDING_PAYMENT → PAID → SUBMITTED_TO_POD → IN_PRODUCTION → SHIPPED →
    /// DELIVERED, plus the terminal side branches reachable from any
    /// non-terminal status.
    pub fn is_adjacent(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (*self, next) {
            (PendingPayment, Paid)
            | (Paid, SubmittedToPod)
            | (SubmittedToPod, InProduction)
            | (InProduction, Shipped)
            | (Shipped, Delivered) => true,
            (from, Cancelled | Refunded | Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "PENDING_PAYMENT",
            OrderStatus::Paid => "PAID",
            OrderStatus::SubmittedToPod => "SUBMITTED_TO_POD",
            OrderStatus::InProduction => "IN_PRODUCTION",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
            OrderStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_PAYMENT" => Ok(OrderStatus::PendingPayment),
            "PAID" => Ok(OrderStatus::Paid),
            "SUBMITTED_TO_POD" => Ok(OrderStatus::SubmittedToPod),
            "IN_PRODUCTION" => Ok(OrderStatus::InProduction),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "REFUNDED" => Ok(OrderStatus::Refunded),
            "FAILED" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// Who requested a status change. Persisted in the namespaced string form
/// `system`, `webhook:<provider>`, `job:<name>`, `admin:<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    System,
    Webhook(String),
    Job(String),
    Admin(String),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::System => f.write_str("system"),
            Actor::Webhook(provider) => write!(f, "webhook:{provider}"),
            Actor::Job(name) => write!(f, "job:{name}"),
            Actor::Admin(id) => write!(f, "admin:{id}"),
        }
    }
}

impl FromStr for Actor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "system" {
            return Ok(Actor::System);
        }
        if let Some(provider) = s.strip_prefix("webhook:") {
            return Ok(Actor::Webhook(provider.to_string()));
        }
        if let Some(name) = s.strip_prefix("job:") {
            return Ok(Actor::Job(name.to_string()));
        }
        if let Some(id) = s.strip_prefix("admin:") {
            return Ok(Actor::Admin(id.to_string()));
        }
        Err(format!("unknown actor tag: {s}"))
    }
}

impl Serialize for Actor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Actor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Where a design is applied on the garment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Front,
    Back,
    LeftSleeve,
    RightSleeve,
}

/// Per-technique customization payload. Tagged so each technique only
/// carries the fields it needs; invalid shapes are rejected at the
/// serde boundary instead of being cast at read time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "technique", rename_all = "snake_case")]
pub enum Customization {
    DirectPrint {
        placement: Placement,
        design_url: Option<String>,
        source_image_url: Option<String>,
    },
    Embroidery {
        placement: Placement,
        thread_colors: Vec<String>,
        digitized_design_url: Option<String>,
        source_image_url: Option<String>,
    },
    Sublimation {
        design_url: Option<String>,
        source_image_url: Option<String>,
    },
}

impl Customization {
    /// The technique's prepared design asset, if any
    pub fn design_url(&self) -> Option<&str> {
        match self {
            Customization::DirectPrint { design_url, .. }
            | Customization::Sublimation { design_url, .. } => design_url.as_deref(),
            Customization::Embroidery {
                digitized_design_url,
                ..
            } => digitized_design_url.as_deref(),
        }
    }

    /// The customer's original uploaded image, if any
    pub fn source_image_url(&self) -> Option<&str> {
        match self {
            Customization::DirectPrint {
                source_image_url, ..
            }
            | Customization::Embroidery {
                source_image_url, ..
            }
            | Customization::Sublimation {
                source_image_url, ..
            } => source_image_url.as_deref(),
        }
    }
}

/// Recipient address, typically supplied by the payment provider's
/// checkout session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShippingAddress {
    pub recipient_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub country_code: String,
    pub postal_code: String,
}

/// An individual product within an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub variant_id: Uuid,
    /// The fulfillment partner's variant key; required before submission
    pub provider_variant_id: Option<String>,
    pub name: String,
    pub quantity: i32,
    pub price_minor: i64,
    pub customization: Customization,
    /// Print-ready asset, attached post-preparation. The only item field
    /// that may change after the order is paid.
    pub print_asset_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn new(
        order_id: Uuid,
        variant_id: Uuid,
        provider_variant_id: Option<String>,
        name: String,
        quantity: i32,
        price_minor: i64,
        customization: Customization,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            variant_id,
            provider_variant_id,
            name,
            quantity,
            price_minor,
            customization,
            print_asset_url: None,
            created_at: Utc::now(),
        }
    }

    /// Resolve the design asset to send to the fulfillment partner:
    /// print-ready asset first, then the technique's design asset, then the
    /// original uploaded image. Empty strings count as missing.
    pub fn resolved_design_url(&self) -> Option<&str> {
        self.print_asset_url
            .as_deref()
            .into_iter()
            .chain(self.customization.design_url())
            .chain(self.customization.source_image_url())
            .find(|url| !url.is_empty())
    }
}

/// The single source of truth for a customer's purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Human-facing reference, used in refund metadata
    pub order_number: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub subtotal_minor: i64,
    pub shipping_minor: i64,
    pub tax_minor: i64,
    pub total_minor: i64,
    pub currency: String,
    /// Payment provider's checkout session / intent id, set at creation
    pub payment_reference: Option<String>,
    /// Fulfillment partner's order id, set on submission acknowledgment
    pub fulfillment_reference: Option<String>,
    /// Free-text mirror of the partner's own status string
    pub fulfillment_status: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
    /// Highest external event sequence number applied to this order
    pub last_event_seq: Option<i64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(order_number: String, currency: String, payment_reference: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_number,
            status: OrderStatus::PendingPayment,
            items: Vec::new(),
            subtotal_minor: 0,
            shipping_minor: 0,
            tax_minor: 0,
            total_minor: 0,
            currency,
            payment_reference,
            fulfillment_reference: None,
            fulfillment_status: None,
            shipping_address: None,
            last_event_seq: None,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add an item and fold its price into the running totals
    pub fn add_item(&mut self, item: OrderItem) {
        let line_total = item.price_minor * i64::from(item.quantity);
        self.subtotal_minor += line_total;
        self.total_minor += line_total;
        self.items.push(item);
        self.updated_at = Utc::now();
    }
}

/// Append-only audit ledger entry. Never updated or deleted; for a given
/// order, entries ordered by `created_at` replay the exact sequence of
/// statuses the order has held.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    /// None only for the entry recorded at order creation
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub changed_by: Actor,
    pub reason: Option<String>,
    /// Set when the requested target was not adjacent to the status the
    /// order held at the time; flagged for review, never blocked.
    pub irregular: bool,
    pub created_at: DateTime<Utc>,
}
