// Logout action shared by every session-ending policy

use super::navigator::Navigator;
use super::storage::{CookieStore, CookieWrite};
use super::types::{LogoutOutcome, LogoutReason};
use crate::auth::AuthProvider;
use crate::models::LogoutConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Ends the session remotely and locally, then sends the client to login.
///
/// Only the first invocation after a (re)activation signs out and navigates;
/// later ones just re-expire the cookie and report `AlreadyLoggedOut`, so the
/// idle timer and the session monitor can race without a double redirect.
pub struct LogoutAction {
    provider: Arc<dyn AuthProvider>,
    cookies: Arc<dyn CookieStore>,
    navigator: Arc<dyn Navigator>,
    config: LogoutConfig,
    logged_out: AtomicBool,
}

impl LogoutAction {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        cookies: Arc<dyn CookieStore>,
        navigator: Arc<dyn Navigator>,
        config: LogoutConfig,
    ) -> Self {
        Self {
            provider,
            cookies,
            navigator,
            config,
            logged_out: AtomicBool::new(false),
        }
    }

    /// Human-readable message for a reason, never empty
    pub fn message_for(&self, reason: &LogoutReason) -> String {
        let messages = &self.config.messages;
        match reason {
            LogoutReason::Inactivity => messages.inactivity.clone(),
            LogoutReason::SessionElsewhere => messages.session_elsewhere.clone(),
            LogoutReason::Manual(message) if !message.trim().is_empty() => message.clone(),
            LogoutReason::Manual(_) => messages.generic.clone(),
        }
    }

    /// Login route with the encoded reason attached
    pub fn redirect_location(&self, reason: &LogoutReason) -> String {
        format!(
            "{}?{}={}",
            self.config.login_route,
            self.config.reason_param,
            urlencoding::encode(&self.message_for(reason))
        )
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }

    /// Re-arm after a fresh activation
    pub(crate) fn reset(&self) {
        self.logged_out.store(false, Ordering::SeqCst);
    }

    /// Run the logout. Never fails: a rejected or hung sign-out still clears
    /// the cookie and redirects.
    ///
    /// Once the latch is taken the teardown runs on its own task, so dropping
    /// or aborting the caller cannot leave the session half ended.
    pub async fn run(&self, reason: LogoutReason) -> LogoutOutcome {
        if self.logged_out.swap(true, Ordering::SeqCst) {
            debug!(
                "Logout ({}) requested after session already ended",
                reason.as_str()
            );
            self.clear_cookie().await;
            return LogoutOutcome::AlreadyLoggedOut;
        }

        info!("Ending session: {}", reason.as_str());

        let location = self.redirect_location(&reason);
        let teardown = Teardown {
            provider: self.provider.clone(),
            cookies: self.cookies.clone(),
            navigator: self.navigator.clone(),
            expiry: self.cookie_expiry(),
            sign_out_timeout: self.config.sign_out_timeout(),
            location: location.clone(),
        };

        if let Err(e) = tokio::spawn(teardown.run()).await {
            error!("Logout teardown task failed: {}", e);
        }

        LogoutOutcome::Completed { location }
    }

    fn cookie_expiry(&self) -> CookieWrite {
        CookieWrite::expire(&self.config.cookie_name, &self.config.cookie_path)
    }

    async fn clear_cookie(&self) {
        self.cookies.set(self.cookie_expiry()).await;
    }
}

/// Remote sign-out, cookie expiry and redirect for one logout
struct Teardown {
    provider: Arc<dyn AuthProvider>,
    cookies: Arc<dyn CookieStore>,
    navigator: Arc<dyn Navigator>,
    expiry: CookieWrite,
    sign_out_timeout: Duration,
    location: String,
}

impl Teardown {
    async fn run(self) {
        match timeout(self.sign_out_timeout, self.provider.sign_out()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Sign-out with auth provider failed, continuing locally: {}", e);
            }
            Err(_) => {
                warn!(
                    "Sign-out with auth provider timed out after {:?}, continuing locally",
                    self.sign_out_timeout
                );
            }
        }

        self.cookies.set(self.expiry).await;
        self.navigator.navigate(&self.location).await;
    }
}
