// Auth provider abstraction
// The guardian only needs two calls from the hosted auth service: revoke the
// current session and fetch the live account record.

use crate::models::AuthUser;
use async_trait::async_trait;

/// Trait for auth provider implementations
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Revoke the session this client is signed in with
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Fetch the currently authenticated user.
    /// Must hit the backend every time, cached records hide supersession.
    async fn get_user(&self) -> Result<AuthUser, AuthError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No authenticated session (missing or rejected access token)
    NoSession,
    /// Network failure or timeout
    Transport(String),
    /// Unexpected HTTP status
    Status(u16),
    /// Response body could not be understood
    InvalidResponse(String),
}

impl AuthError {
    /// Whether a later retry could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Transport(_) => true,
            AuthError::Status(code) => *code >= 500 || *code == 429,
            AuthError::NoSession | AuthError::InvalidResponse(_) => false,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::NoSession => write!(f, "No authenticated session"),
            AuthError::Transport(msg) => write!(f, "Transport error: {}", msg),
            AuthError::Status(code) => write!(f, "Auth backend returned status {}", code),
            AuthError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AuthError::Transport("reset".to_string()).is_transient());
        assert!(AuthError::Status(503).is_transient());
        assert!(AuthError::Status(429).is_transient());
        assert!(!AuthError::Status(400).is_transient());
        assert!(!AuthError::NoSession.is_transient());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            AuthError::Status(502).to_string(),
            "Auth backend returned status 502"
        );
    }
}
