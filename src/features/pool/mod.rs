mod collector;
mod models;

pub use collector::PoolCollector;
pub use models::{pool_schema, POOL_LISTING_COMMAND, POOL_LISTING_FORMAT};
