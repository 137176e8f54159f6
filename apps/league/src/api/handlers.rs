//! # API Endpoint Handlers
//!
//! Every mutating handler takes the session write lock, so at most one
//! operation touches the store at a time.

use super::{
    AppState,
    auth::Caller,
    types::{
        AwardRequest, AwardResponse, ErrorResponse, HealthResponse, JoinResponse,
        RegisterUserRequest, StandingsResponse, StatusResponse, UserResponse,
    },
};
use axum::{
    Json,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use league_core::{Admission, LeagueError, UserId};
use tokio::sync::broadcast::error::RecvError;

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// HTTP status for an engine error.
pub fn status_for(error: &LeagueError) -> StatusCode {
    match error {
        LeagueError::UserNotFound(_) => StatusCode::NOT_FOUND,
        LeagueError::UserExists(_) | LeagueError::AlreadyReset(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error response for an engine error. Server-side failures are logged.
pub fn error_response(error: &LeagueError) -> Response {
    let status = status_for(error);
    if status.is_server_error() {
        tracing::error!(error = %error, "Request failed");
    } else {
        tracing::debug!(error = %error, status = status.as_u16(), "Request rejected");
    }
    (status, Json(ErrorResponse::new(error.to_string()))).into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// League metrics.
pub async fn status_handler(State(state): State<AppState>) -> Response {
    let session = state.session.read().await;
    match session.metrics(Utc::now()) {
        Ok(metrics) => {
            let mut status = StatusResponse::from(&metrics);
            status.live_connections = Some(state.live.connected_users());
            (StatusCode::OK, Json(status)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// STANDINGS
// =============================================================================

/// `GET /league/current`: the caller's cohort, ranked.
pub async fn current_league_handler(
    State(state): State<AppState>,
    Caller(user): Caller,
) -> Response {
    let now = Utc::now();
    let mut session = state.session.write().await;
    match session.standings(user, now) {
        Ok(standings) => (
            StatusCode::OK,
            Json(StandingsResponse::new(&standings, now)),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// ADMISSION
// =============================================================================

/// `POST /league/join`: admit the caller if their entry counter allows it.
pub async fn join_handler(State(state): State<AppState>, Caller(user): Caller) -> Response {
    let mut session = state.session.write().await;

    match session.user(user) {
        Ok(Some(existing)) if !existing.is_locked_out() => {
            return (
                StatusCode::CONFLICT,
                Json(ErrorResponse::new(format!(
                    "user {} is already in {}",
                    user, existing.tier
                ))),
            )
                .into_response();
        }
        Ok(_) => {}
        Err(e) => return error_response(&e),
    }

    match session.admit(user, Utc::now()) {
        Ok(Admission::Placed { cohort, tier }) => (
            StatusCode::OK,
            Json(JoinResponse {
                placed: true,
                league: Some(tier),
                cohort_id: Some(cohort.0),
                entry_counter: 0,
                admitted_from: None,
            }),
        )
            .into_response(),
        Ok(Admission::Ineligible { entry_counter }) => (
            StatusCode::OK,
            Json(JoinResponse {
                placed: false,
                league: None,
                cohort_id: None,
                entry_counter,
                admitted_from: None,
            }),
        )
            .into_response(),
        Ok(Admission::Deferred {
            entry_counter,
            next_cycle,
        }) => (
            StatusCode::OK,
            Json(JoinResponse {
                placed: false,
                league: None,
                cohort_id: None,
                entry_counter,
                admitted_from: Some(next_cycle.to_string()),
            }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// USERS
// =============================================================================

/// `POST /users`: register a user. New users start locked out.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Response {
    let username = match request.validated_username() {
        Ok(name) => name,
        Err(message) => return bad_request(message),
    };

    let mut session = state.session.write().await;
    match session.register_user(UserId(request.user_id), username) {
        Ok(user) => (StatusCode::CREATED, Json(UserResponse::from(&user))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `POST /users/{id}/experience`: award experience, then push the user's
/// refreshed leaderboard to their live connection.
pub async fn award_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<AwardRequest>,
) -> Response {
    if request.amount == 0 {
        return bad_request("amount must be positive");
    }

    let user_id = UserId(id);
    let mut session = state.session.write().await;
    let user = match session.award_experience(user_id, request.amount) {
        Ok(user) => user,
        Err(e) => return error_response(&e),
    };

    let delivered = match session.publish(state.live.as_ref(), user_id, Utc::now()) {
        Ok(delivered) => delivered,
        Err(e) => {
            tracing::warn!(user_id = id, error = %e, "Leaderboard refresh failed after award");
            false
        }
    };

    (
        StatusCode::OK,
        Json(AwardResponse {
            user: UserResponse::from(&user),
            delivered,
        }),
    )
        .into_response()
}

// =============================================================================
// RESET
// =============================================================================

/// `POST /admin/reset`: run the weekly reset now.
pub async fn reset_handler(State(state): State<AppState>) -> Response {
    let mut session = state.session.write().await;
    match session.run_reset(Utc::now()) {
        Ok(report) => {
            tracing::info!(
                closing_cycle = %report.closing_cycle,
                members = report.members_processed,
                "Manual reset complete"
            );
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// LIVE LEADERBOARD
// =============================================================================

/// `GET /ws/leaderboard`: stream the caller's leaderboard updates.
///
/// Caller identity is checked before the upgrade.
pub async fn leaderboard_ws_handler(
    State(state): State<AppState>,
    Caller(user): Caller,
    ws: WebSocketUpgrade,
) -> Response {
    match state.session.read().await.user(user) {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(&LeagueError::UserNotFound(user)),
        Err(e) => return error_response(&e),
    }

    ws.on_upgrade(move |socket| live_session(socket, state, user))
}

async fn live_session(mut socket: WebSocket, state: AppState, user: UserId) {
    let mut rx = state.live.subscribe(user);
    tracing::info!(user_id = user.0, "Live leaderboard connected");

    // initial snapshot
    {
        let mut session = state.session.write().await;
        if let Err(e) = session.publish(state.live.as_ref(), user, Utc::now()) {
            tracing::warn!(user_id = user.0, error = %e, "Initial leaderboard failed");
        }
    }

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(text) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = user.0, skipped, "Live connection lagging");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    drop(rx);
    state.live.release(user);
    tracing::info!(user_id = user.0, "Live leaderboard disconnected");
}
