/// Token tracking system: durable cache, mediator and derived views
pub mod database;
pub mod tracker;
pub mod types;

pub use database::TokenStore;
pub use tracker::TokenTracker;
pub use types::{PriceHistory, TokenRecord, TokenStats};
