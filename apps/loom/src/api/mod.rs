//! # Loom HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Backend, counts and per-type node counts
//! - `POST /nodes` - Insert or replace a node
//! - `GET /nodes/{id}` - Get a node
//! - `PUT /nodes/{id}` - Insert or replace the node at `id`
//! - `GET /nodes/{id}/edges` - Outgoing and incoming edges of a node
//! - `GET /nodes/type/{*type_id}` - Nodes of one type (type ids contain `/`)
//! - `POST /edges` - Insert or replace an edge
//! - `GET /spec/modules/all` - Module nodes
//! - `GET /spec/routes/all` - Declared APIs read from api nodes
//! - `POST /spec/register` - Store a module spec as a node
//! - `GET /reflect/spec/{id}` - Reflect a stored spec into schema nodes
//! - `POST /ingest/spec` - Rebuild a spec from schema nodes
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `LOOM_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `LOOM_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `LOOM_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::get_api_key_from_env;
pub use middleware::{DEFAULT_RATE_LIMIT, create_rate_limiter, get_rate_limit_from_env};
#[allow(unused_imports)]
pub use handlers::{
    get_node_handler, health_handler, ingest_handler, modules_handler, node_edges_handler,
    nodes_by_type_handler, reflect_handler, register_spec_handler, replace_node_handler,
    routes_handler, status_handler, upsert_edge_handler, upsert_node_handler,
};
#[allow(unused_imports)]
pub use types::{
    ApiError, EdgesResponse, ErrorResponse, HealthResponse, IngestRequest, IngestResponse,
    ModulesResponse, NodeListResponse, ReflectParams, ReflectResponse, RoutesResponse,
    StatusResponse, WriteResponse,
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use loom_core::{LoomError, Session};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size (2 MiB).
pub const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the graph session.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Session>>,
}

impl AppState {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `LOOM_CORS_ORIGINS`.
///
/// - `"*"`: allows all origins
/// - unset: localhost only
/// - otherwise: comma-separated list of origins; invalid entries are skipped
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("LOOM_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (LOOM_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| match s.parse::<HeaderValue>() {
                    Ok(hv) => {
                        tracing::info!("CORS: Allowing origin: {}", s);
                        Some(hv)
                    }
                    Err(e) => {
                        tracing::warn!("CORS: Invalid origin '{}': {}", s, e);
                        None
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in LOOM_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                restricted_cors(allowed_origins)
            }
        }
        None => {
            tracing::info!("CORS: No LOOM_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    restricted_cors(origins)
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing
/// 2. CORS (answers preflight requests)
/// 3. Body limit
/// 4. Rate limiting (if enabled)
/// 5. Authentication (if configured)
pub fn create_router(state: AppState) -> Router {
    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set LOOM_API_KEY to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/nodes", post(handlers::upsert_node_handler))
        .route(
            "/nodes/{id}",
            get(handlers::get_node_handler).put(handlers::replace_node_handler),
        )
        .route("/nodes/{id}/edges", get(handlers::node_edges_handler))
        .route("/nodes/type/{*type_id}", get(handlers::nodes_by_type_handler))
        .route("/edges", post(handlers::upsert_edge_handler))
        .route("/spec/modules/all", get(handlers::modules_handler))
        .route("/spec/routes/all", get(handlers::routes_handler))
        .route("/spec/register", post(handlers::register_spec_handler))
        .route("/reflect/spec/{id}", get(handlers::reflect_handler))
        .route("/ingest/spec", post(handlers::ingest_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(DefaultBodyLimit::max(MAX_BODY_SIZE)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server. Returns after Ctrl-C once in-flight requests finish,
/// leaving the session in `state` for the caller to save.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), LoomError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| LoomError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!(event = "server_started", %addr, "Loom HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| LoomError::IoError(format!("Server error: {}", e)))?;

    tracing::info!(event = "server_stopped", "Loom HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
