// Client navigation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

/// Moves the client to another route
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, location: &str);
}

#[derive(Debug, Clone, Serialize)]
pub struct Navigation {
    pub location: String,
    pub at: DateTime<Utc>,
}

/// Navigator that keeps a history instead of driving a browser.
/// The daemon reports the latest entry to its client.
pub struct RecordingNavigator {
    history: RwLock<Vec<Navigation>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self {
            history: RwLock::new(Vec::new()),
        }
    }

    pub async fn history(&self) -> Vec<Navigation> {
        self.history.read().await.clone()
    }

    pub async fn last(&self) -> Option<Navigation> {
        self.history.read().await.last().cloned()
    }

    pub async fn count(&self) -> usize {
        self.history.read().await.len()
    }
}

impl Default for RecordingNavigator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn navigate(&self, location: &str) {
        info!("Redirecting client to {}", location);
        self.history.write().await.push(Navigation {
            location: location.to_string(),
            at: Utc::now(),
        });
    }
}
