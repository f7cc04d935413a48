pub mod health;
pub mod session;

use crate::session::{GuardianHandle, RecordingNavigator};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

/// State shared by the daemon's handlers
#[derive(Clone)]
pub struct AppState {
    pub guardian: GuardianHandle,
    pub navigator: Arc<RecordingNavigator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::health_check))
        .route("/health", get(health::health_check))
        .route("/api/v1/activity", post(session::record_activity))
        .route("/api/v1/session", get(session::session_status))
        .route("/api/v1/logout", post(session::logout))
        .with_state(state)
}
