use super::AppState;
use crate::session::{ActivityKind, IdleState, LogoutOutcome, LogoutReason, MonitorState};
use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    /// DOM event name, e.g. "keydown"
    pub kind: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Forward a client activity signal to the guardian
pub async fn record_activity(
    State(state): State<AppState>,
    Json(payload): Json<ActivityRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let kind: ActivityKind = payload.kind.parse().map_err(|e: String| {
        warn!("Rejected activity signal: {}", e);
        (StatusCode::BAD_REQUEST, Json(json!({ "error": e })))
    })?;

    debug!("Activity signal: {}", kind.as_str());
    state.guardian.record_activity(kind);

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "kind": kind.as_str(),
            "resets_idle": kind.resets_idle()
        })),
    ))
}

/// Current state of both policies and the last redirect
pub async fn session_status(State(state): State<AppState>) -> Json<Value> {
    let idle = state.guardian.idle_state();
    let monitor = state.guardian.monitor_state();

    let idle_remaining_secs = match idle {
        IdleState::Armed { deadline, .. } => {
            Some(deadline.saturating_duration_since(Instant::now()).as_secs())
        }
        _ => None,
    };

    let poll_ticks = match monitor {
        MonitorState::Polling { ticks } => Some(ticks),
        _ => None,
    };

    Json(json!({
        "idle": idle.as_str(),
        "idle_remaining_secs": idle_remaining_secs,
        "monitor": monitor.as_str(),
        "poll_ticks": poll_ticks,
        "logged_out": state.guardian.is_logged_out(),
        "last_redirect": state.navigator.last().await,
    }))
}

/// User-initiated logout
pub async fn logout(
    State(state): State<AppState>,
    payload: Option<Json<LogoutRequest>>,
) -> Json<Value> {
    let reason = payload
        .and_then(|Json(request)| request.reason)
        .unwrap_or_default();

    match state.guardian.logout(LogoutReason::Manual(reason)).await {
        LogoutOutcome::Completed { location } => {
            info!("Manual logout, client redirected to {}", location);
            Json(json!({ "status": "logged_out", "location": location }))
        }
        LogoutOutcome::AlreadyLoggedOut => Json(json!({ "status": "already_logged_out" })),
    }
}
