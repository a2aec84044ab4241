pub mod audit;
pub mod caller;
pub mod error;
pub mod gateway;
pub mod id;
pub mod money;
pub mod order;
pub mod product;
pub mod store;
