pub mod audit_repo;
pub mod event_repo;
pub mod inventory_repo;
pub mod order_repo;
pub mod store;

pub use store::PgStore;
