//! Guard Module
//!
//! Stateful primitives built purely on the [`Cache`](crate::cache::Cache)
//! contract: an attempt-budget rate limiter and a verification-code issuer.
//!
//! Both treat a missing entry as a hard `NotFound` failure. They never
//! recreate state behind the caller's back, so an expired window cannot
//! silently turn into a fresh budget.

mod rate_limiter;
mod verification_code;

pub use rate_limiter::RateLimiter;
pub use verification_code::{VerificationCode, CODE_CHARSET, DEFAULT_CODE_LENGTH};
