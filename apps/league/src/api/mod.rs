//! # League HTTP API Module
//!
//! axum server exposing standings, admission and the live leaderboard.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - League metrics
//! - `GET /league/current` - Caller's standings (self-heals a missing placement)
//! - `POST /league/join` - Admit the caller once their entry counter allows it
//! - `GET /ws/leaderboard` - WebSocket with live leaderboard updates
//! - `POST /users` - Register a user
//! - `POST /users/{id}/experience` - Award experience and push an update
//! - `POST /admin/reset` - Run the weekly reset now
//!
//! Caller identity comes from the `x-user-id` header set by the gateway.
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `LEAGUE_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `LEAGUE_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `LEAGUE_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{Caller, USER_ID_HEADER, get_api_key_from_env};
pub use handlers::{error_response, status_for};
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    AwardRequest, AwardResponse, ErrorResponse, HealthResponse, JoinResponse, LeaderboardRow,
    LeagueJson, LiveUpdate, MAX_USERNAME_LENGTH, OutcomeJson, RegisterUserRequest,
    StandingsResponse, StatusResponse, UserResponse,
};

use crate::config::LeagueConfig;
use crate::live::LiveChannels;
use crate::scheduler;
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use league_core::{LeagueError, Session};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request body limit.
const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// The league session. Writers hold the lock for a whole operation.
    pub session: Arc<RwLock<Session>>,
    /// Live leaderboard connections.
    pub live: Arc<LiveChannels>,
}

impl AppState {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
            live: Arc::new(LiveChannels::new()),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

fn allowed_headers() -> [HeaderName; 3] {
    [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(USER_ID_HEADER),
    ]
}

/// CORS layer from `LEAGUE_CORS_ORIGINS`.
///
/// `*` allows every origin; unset or unparsable falls back to localhost.
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("LEAGUE_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins (LEAGUE_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!(origin = trimmed, "CORS: Allowing origin");
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!(origin = trimmed, error = %e, "CORS: Invalid origin");
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins in LEAGUE_CORS_ORIGINS, using localhost");
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers(allowed_headers())
            }
        }
        None => build_localhost_cors(),
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(allowed_headers())
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit, rate
/// limiting (if enabled), API key (if configured).
pub fn create_router(state: AppState) -> Router {
    let rate_limit = get_rate_limit_from_env();
    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!("API key authentication disabled; set LEAGUE_API_KEY to enable it");
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/league/current", get(handlers::current_league_handler))
        .route("/league/join", post(handlers::join_handler))
        .route("/ws/leaderboard", get(handlers::leaderboard_ws_handler))
        .route("/users", post(handlers::register_handler))
        .route("/users/{id}/experience", post(handlers::award_handler))
        .route("/admin/reset", post(handlers::reset_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if rate_limit > 0 {
        tracing::info!(requests_per_second = rate_limit, "Rate limiting enabled");
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(axum::extract::DefaultBodyLimit::max(BODY_LIMIT_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server, and the weekly scheduler if enabled.
pub async fn run_server(
    addr: &str,
    session: Session,
    config: &LeagueConfig,
) -> Result<(), LeagueError> {
    let state = AppState::new(session);

    if config.scheduler.enabled {
        scheduler::spawn(state.clone());
    } else {
        tracing::info!("Weekly scheduler disabled by configuration");
    }

    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| LeagueError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!(addr, "League HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| LeagueError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
