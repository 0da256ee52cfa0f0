//! Dynamo Cache - A key-value cache over a partitioned table
//!
//! Maps `"<partition>+<sort>"` keys onto a table's partition and sort
//! attributes, with lazy TTL expiry, chunked batch operations that resend
//! unprocessed items, and prefix key listing.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod provider;
pub mod tasks;

pub use api::AppState;
pub use cache::TableCache;
pub use config::Config;
pub use tasks::spawn_sweep_task;
