//! Cacheguard - a pluggable TTL cache with attempt limiting and one-time codes
//!
//! Provides a uniform cache contract, file and memory engines, and a rate
//! limiter and verification-code issuer built only on that contract.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod guard;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheExt, FileCache, MemoryCache, Value};
pub use config::{Config, Driver};
pub use error::{CacheError, Result};
pub use guard::{RateLimiter, VerificationCode};
pub use tasks::{spawn_sweep_task, Sweep};
