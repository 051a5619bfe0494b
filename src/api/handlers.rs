//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.
//!
//! Every core call touches storage synchronously, so handlers hop onto
//! tokio's blocking pool before calling into the cache.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;

use crate::cache::{Cache, MemoryCache};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::guard::{RateLimiter, VerificationCode};
use crate::models::{
    duration_ms, validate_key, CodeIssuedResponse, DeleteResponse, GetResponse, HealthResponse,
    IncrementRequest, IncrementResponse, LimitResponse, PutRequest, PutResponse, VerifyRequest,
    VerifyResponse,
};

/// Application state shared across all handlers.
///
/// `cache` serves the `/cache` routes. `guards` holds rate-limit and
/// verification-code state and must be a view no `/cache` key can reach,
/// such as the same engine under [`Config::guard_prefix`].
#[derive(Clone)]
pub struct AppState {
    /// Storage backend behind the contract
    pub cache: Arc<dyn Cache>,
    /// Backend view reserved for limiter and code entries
    pub guards: Arc<dyn Cache>,
    /// Rate-limit and verification-code policy
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates a new AppState with the given policy.
    pub fn new(cache: Arc<dyn Cache>, guards: Arc<dyn Cache>, config: Config) -> Self {
        Self {
            cache,
            guards,
            config: Arc::new(config),
        }
    }

    /// Memory-backed state with both views sharing one map.
    pub fn in_memory(config: Config) -> Self {
        let cache = MemoryCache::new(&config.prefix);
        let guards = cache.shared_with(config.guard_prefix());
        Self::new(Arc::new(cache), Arc::new(guards), config)
    }

    fn limiter(&self, key: String) -> Result<RateLimiter> {
        RateLimiter::new(
            Arc::clone(&self.guards),
            key,
            self.config.rate_limit_max,
            self.config.rate_limit_window(),
        )
    }
}

fn limit_key(key: &str) -> String {
    format!("limit:{}", key)
}

fn code_key(key: &str) -> String {
    format!("code:{}", key)
}

fn verify_key(key: &str) -> String {
    format!("verify:{}", key)
}

fn check_key(key: &str) -> Result<()> {
    match validate_key(key) {
        Some(msg) => Err(CacheError::InvalidRequest(msg)),
        None => Ok(()),
    }
}

/// Runs a storage call on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CacheError::Backend {
            backend: "runtime",
            message: e.to_string(),
        })?
}

fn limit_status(limiter: &RateLimiter, key: String) -> Result<LimitResponse> {
    Ok(LimitResponse {
        key,
        retries_left: limiter.retries_left()?,
        total_attempts: limiter.total_attempts()?,
        must_lock: limiter.must_lock()?,
        available_in_ms: duration_ms(limiter.available_in()?),
    })
}

// == Cache Handlers ==

/// Handler for PUT /cache/:key
///
/// Stores a value with an optional TTL; without one the entry never expires.
pub async fn put_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<PutRequest>,
) -> Result<Json<PutResponse>> {
    check_key(&key)?;
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let cache = Arc::clone(&state.cache);
    let k = key.clone();
    blocking(move || match req.ttl {
        Some(secs) => cache.put(&k, req.value, std::time::Duration::from_secs(secs)),
        None => cache.put_forever(&k, req.value),
    })
    .await?;

    Ok(Json(PutResponse::new(key)))
}

/// Handler for GET /cache/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    check_key(&key)?;

    let cache = Arc::clone(&state.cache);
    let k = key.clone();
    let (value, ttl) = blocking(move || {
        let value = cache
            .get(&k)?
            .ok_or_else(|| CacheError::not_found(cache.name(), &k))?;
        let ttl = cache.ttl(&k)?;
        Ok((value, ttl))
    })
    .await?;

    Ok(Json(GetResponse::new(key, value, ttl)))
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    check_key(&key)?;

    let cache = Arc::clone(&state.cache);
    let k = key.clone();
    blocking(move || cache.forget(&k)).await?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /cache/:key/increment
///
/// An absent key is a 404; the entry is never created here.
pub async fn increment_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Option<Json<IncrementRequest>>,
) -> Result<Json<IncrementResponse>> {
    check_key(&key)?;
    let req = body.map(|Json(req)| req).unwrap_or_default();
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let cache = Arc::clone(&state.cache);
    let k = key.clone();
    let value = blocking(move || cache.increment_by(&k, req.delta())).await?;

    Ok(Json(IncrementResponse { key, value }))
}

// == Rate Limit Handlers ==

/// Handler for POST /limits/:key/hit
///
/// Arms the limiter on first use. Answers 429 once the budget is spent.
pub async fn limit_hit_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<LimitResponse>> {
    check_key(&key)?;

    let status = blocking(move || {
        let limiter = state.limiter(limit_key(&key))?;
        limiter.hit()?;
        limit_status(&limiter, key)
    })
    .await?;

    Ok(Json(status))
}

/// Handler for GET /limits/:key
pub async fn limit_status_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<LimitResponse>> {
    check_key(&key)?;

    let status = blocking(move || {
        let limiter = state.limiter(limit_key(&key))?;
        limit_status(&limiter, key)
    })
    .await?;

    Ok(Json(status))
}

/// Handler for POST /limits/:key/reset
pub async fn limit_reset_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<LimitResponse>> {
    check_key(&key)?;

    let status = blocking(move || {
        let limiter = state.limiter(limit_key(&key))?;
        limiter.reset()?;
        limit_status(&limiter, key)
    })
    .await?;

    Ok(Json(status))
}

/// Handler for POST /limits/:key/lock
pub async fn limit_lock_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<LimitResponse>> {
    check_key(&key)?;

    let status = blocking(move || {
        let limiter = state.limiter(limit_key(&key))?;
        limiter.lock()?;
        limit_status(&limiter, key)
    })
    .await?;

    Ok(Json(status))
}

// == Verification Code Handlers ==

/// Handler for POST /codes/:key
///
/// Issues a fresh code with a full lifetime. The code is only written to
/// the debug log, standing in for an out-of-band delivery channel.
pub async fn issue_code_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<CodeIssuedResponse>> {
    check_key(&key)?;

    let cache = Arc::clone(&state.guards);
    let config = Arc::clone(&state.config);
    let k = key.clone();
    let (length, expires_in) = blocking(move || {
        let entry = code_key(&k);
        cache.forget(&entry)?;
        let issuer = VerificationCode::new(cache, entry, config.code_ttl())?;
        let code = issuer.generate_n(config.code_length)?;
        debug!(key = %k, code = %code, "Issued verification code");
        Ok((code.len(), issuer.expires_in()?))
    })
    .await?;

    Ok(Json(CodeIssuedResponse {
        key,
        length,
        expires_in_ms: duration_ms(expires_in),
    }))
}

/// Handler for POST /codes/:key/verify
///
/// A matching code is consumed. Unknown, expired or ungenerated codes
/// never match. Every attempt spends one unit of a per-key rate limit,
/// answered with 429 once spent; a match clears it.
pub async fn verify_code_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>> {
    check_key(&key)?;

    let k = key.clone();
    let valid = blocking(move || {
        let throttle = state.limiter(verify_key(&k))?;
        throttle.hit()?;

        let cache = Arc::clone(&state.guards);
        let config = Arc::clone(&state.config);
        let entry = code_key(&k);
        if !cache.exists(&entry)? {
            return Ok(false);
        }
        let issuer = VerificationCode::new(cache, entry, config.code_ttl())?;
        let stored = match issuer.get() {
            Ok(stored) => stored,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };
        let valid = !stored.is_empty() && stored == req.code;
        if valid {
            issuer.clear()?;
            throttle.clear()?;
        }
        Ok(valid)
    })
    .await?;

    Ok(Json(VerifyResponse { key, valid }))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.name()))
}
