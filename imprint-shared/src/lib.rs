pub mod models;

pub use models::{
    Actor, Customization, Order, OrderItem, OrderStatus, Placement, ShippingAddress,
    StatusHistoryEntry,
};
