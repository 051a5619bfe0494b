//! API Module
//!
//! HTTP handlers and routing that embed the cache, the rate limiter and
//! the verification-code issuer behind a REST API.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `/cache/:key` - Cache contract operations
//! - `/limits/:key` - Rate limiter operations
//! - `/codes/:key` - Verification code operations

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
