//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, get_handler, health_handler, increment_handler, issue_code_handler,
    limit_hit_handler, limit_lock_handler, limit_reset_handler, limit_status_handler,
    put_handler, verify_code_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `PUT|GET|DELETE /cache/:key` - Store, read or forget a value
/// - `POST /cache/:key/increment` - Add to a numeric value
/// - `POST /limits/:key/hit` - Consume one attempt
/// - `GET /limits/:key` - Rate limiter status
/// - `POST /limits/:key/reset` - Restore the attempt budget
/// - `POST /limits/:key/lock` - Spend the attempt budget
/// - `POST /codes/:key` - Issue a verification code
/// - `POST /codes/:key/verify` - Check and consume a verification code
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/cache/:key",
            get(get_handler).put(put_handler).delete(delete_handler),
        )
        .route("/cache/:key/increment", post(increment_handler))
        .route("/limits/:key", get(limit_status_handler))
        .route("/limits/:key/hit", post(limit_hit_handler))
        .route("/limits/:key/reset", post(limit_reset_handler))
        .route("/limits/:key/lock", post(limit_lock_handler))
        .route("/codes/:key", post(issue_code_handler))
        .route("/codes/:key/verify", post(verify_code_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
