pub mod cancellation;
pub mod inventory;
pub mod order_lifecycle;
pub mod order_placement;
pub mod payments;
pub mod reconciliation;
pub mod retry;
