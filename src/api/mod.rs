//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a key-value pair
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `POST /mget` - Retrieve several values
//! - `PUT /mset` - Store several key-value pairs
//! - `POST /mdel` - Delete several keys
//! - `GET /keys` - List keys, optionally by `?pattern=`
//! - `GET /ttl/:key` - Remaining lifetime of a key
//! - `POST /touch` - Reset the lifetime of a key
//! - `POST /reset` - Delete every key
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
