//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - TTL Sweep: Deletes records whose expiry instant has passed from the table

mod sweep;

pub use sweep::spawn_sweep_task;
