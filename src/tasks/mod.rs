//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: deletes expired entries that were never read again

mod sweep;

pub use sweep::{spawn_sweep_task, Sweep};
