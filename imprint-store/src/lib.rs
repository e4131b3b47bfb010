pub mod app_config;
pub mod memory;
pub mod postgres;

pub use memory::{FaultPoint, MemoryOrderStore};
pub use postgres::PgOrderStore;
