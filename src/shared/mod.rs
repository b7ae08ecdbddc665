pub mod coercion;
pub mod collector;
pub mod config;
pub mod error;
pub mod executor;
pub mod parser;
pub mod point;
pub mod storage;
pub mod testing;
pub mod traits;

pub use error::*;
pub use traits::*;
