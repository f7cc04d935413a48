// In-process auth provider
// Holds a single account record; used by tests and by the daemon when no
// backend is configured.

use super::provider::{AuthError, AuthProvider};
use crate::models::AuthUser;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

pub struct MemoryAuthProvider {
    user: RwLock<Option<AuthUser>>,
    get_user_failure: RwLock<Option<AuthError>>,
    sign_out_failure: RwLock<Option<AuthError>>,
    latency: RwLock<Duration>,
    get_user_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        Self {
            user: RwLock::new(None),
            get_user_failure: RwLock::new(None),
            sign_out_failure: RwLock::new(None),
            latency: RwLock::new(Duration::ZERO),
            get_user_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_user(user: AuthUser) -> Self {
        Self {
            user: RwLock::new(Some(user)),
            ..Self::new()
        }
    }

    /// Simulate a login elsewhere (or a logout) by rewriting the account token
    pub async fn set_session_token(&self, token: Option<&str>) {
        if let Some(user) = self.user.write().await.as_mut() {
            user.set_session_token(token.map(str::to_string));
        }
    }

    pub async fn set_user(&self, user: Option<AuthUser>) {
        *self.user.write().await = user;
    }

    /// Make every `get_user` call fail with `error` until cleared with `None`
    pub async fn fail_get_user(&self, error: Option<AuthError>) {
        *self.get_user_failure.write().await = error;
    }

    /// Make every `sign_out` call fail with `error` until cleared with `None`
    pub async fn fail_sign_out(&self, error: Option<AuthError>) {
        *self.sign_out_failure.write().await = error;
    }

    /// Delay applied to every call, to model a slow backend
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    pub fn get_user_calls(&self) -> usize {
        self.get_user_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if let Some(error) = self.sign_out_failure.read().await.clone() {
            return Err(error);
        }

        debug!("Signed out of in-memory auth provider");
        Ok(())
    }

    async fn get_user(&self) -> Result<AuthUser, AuthError> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if let Some(error) = self.get_user_failure.read().await.clone() {
            return Err(error);
        }

        self.user.read().await.clone().ok_or(AuthError::NoSession)
    }
}
