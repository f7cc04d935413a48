// Single-session monitor
// Polls the account record and ends this session when a newer login has
// replaced the token stored in our cookie.

use super::logout::LogoutAction;
use super::storage::CookieStore;
use super::types::{LogoutReason, MonitorState, PollOutcome};
use crate::auth::AuthProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, error, info, warn};

/// Compares the cookie token with the account's current session token
pub struct SessionProbe {
    provider: Arc<dyn AuthProvider>,
    cookies: Arc<dyn CookieStore>,
    cookie_name: String,
    request_timeout: Duration,
}

impl SessionProbe {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        cookies: Arc<dyn CookieStore>,
        cookie_name: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cookies,
            cookie_name: cookie_name.into(),
            request_timeout,
        }
    }

    /// One poll tick. Only a mismatch of two present tokens counts as
    /// supersession; missing values and failed lookups never do.
    pub async fn check(&self) -> PollOutcome {
        let Some(local_token) = self.cookies.get(&self.cookie_name).await else {
            debug!("No session cookie, skipping session check");
            return PollOutcome::NoLocalToken;
        };

        let user = match timeout(self.request_timeout, self.provider.get_user()).await {
            Ok(Ok(user)) => user,
            Ok(Err(e)) => {
                if e.is_transient() {
                    warn!("Session check could not fetch current user: {}", e);
                } else {
                    error!(
                        "Session check rejected by auth provider, will retry next tick: {}",
                        e
                    );
                }
                return PollOutcome::FetchFailed(e.to_string());
            }
            Err(_) => {
                warn!(
                    "Session check timed out after {:?}",
                    self.request_timeout
                );
                return PollOutcome::FetchFailed("timed out".to_string());
            }
        };

        match user.current_session_token() {
            None => PollOutcome::NoAccountToken,
            Some(current) if current == local_token => PollOutcome::Matched,
            Some(_) => {
                warn!(
                    "Session mismatch for user {}, another login detected",
                    user.id
                );
                PollOutcome::Superseded
            }
        }
    }
}

/// Recurring session check.
///
/// The first check runs one full interval after `start`. `stop` cancels the
/// recurring check, including a lookup that is still in flight, but not a
/// logout that was already triggered.
pub struct SingleSessionMonitor {
    poll_interval: Duration,
    probe: Arc<SessionProbe>,
    logout: Arc<LogoutAction>,
    state: Arc<watch::Sender<MonitorState>>,
    task: Option<JoinHandle<()>>,
}

impl SingleSessionMonitor {
    pub fn new(poll_interval: Duration, probe: Arc<SessionProbe>, logout: Arc<LogoutAction>) -> Self {
        let (state, _) = watch::channel(MonitorState::Inactive);
        Self {
            poll_interval,
            probe,
            logout,
            state: Arc::new(state),
            task: None,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn start(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        self.state.send_replace(MonitorState::Polling { ticks: 0 });
        debug!("Session monitor polling every {:?}", self.poll_interval);

        let first_tick = Instant::now() + self.poll_interval;
        self.task = Some(tokio::spawn(run_monitor(
            self.poll_interval,
            first_tick,
            self.probe.clone(),
            self.state.clone(),
            self.logout.clone(),
        )));
    }

    /// Cancel the recurring check. Once this returns no check can fire.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        self.state.send_replace(MonitorState::Inactive);
    }
}

impl Drop for SingleSessionMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_monitor(
    poll_interval: Duration,
    first_tick: Instant,
    probe: Arc<SessionProbe>,
    state: Arc<watch::Sender<MonitorState>>,
    logout: Arc<LogoutAction>,
) {
    let mut ticker = interval_at(first_tick, poll_interval);
    // A slow lookup must not cause a burst of catch-up checks.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut ticks = 0u64;
    loop {
        ticker.tick().await;
        ticks += 1;
        state.send_replace(MonitorState::Polling { ticks });

        if probe.check().await == PollOutcome::Superseded {
            break;
        }
    }

    info!("Session superseded by another login, ending local session");
    state.send_replace(MonitorState::Superseded);
    logout.run(LogoutReason::SessionElsewhere).await;
}
