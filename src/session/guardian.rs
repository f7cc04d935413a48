// Session guardian
// Owns the idle timer and the single-session monitor for one authenticated
// view and starts/stops them together.

use super::idle::IdleTimer;
use super::logout::LogoutAction;
use super::monitor::{SessionProbe, SingleSessionMonitor};
use super::navigator::Navigator;
use super::storage::CookieStore;
use super::types::{
    ActivityEvent, ActivityKind, IdleState, LogoutOutcome, LogoutReason, MonitorState,
};
use crate::auth::AuthProvider;
use crate::models::GuardianConfig;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

const ACTIVITY_CHANNEL_CAPACITY: usize = 64;

/// Session lifecycle enforcement for an authenticated view
pub struct SessionGuardian {
    activity: broadcast::Sender<ActivityEvent>,
    logout: Arc<LogoutAction>,
    idle: IdleTimer,
    monitor: SingleSessionMonitor,
    active: bool,
}

impl SessionGuardian {
    pub fn new(
        config: &GuardianConfig,
        provider: Arc<dyn AuthProvider>,
        cookies: Arc<dyn CookieStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (activity, _) = broadcast::channel(ACTIVITY_CHANNEL_CAPACITY);

        let logout = Arc::new(LogoutAction::new(
            provider.clone(),
            cookies.clone(),
            navigator,
            config.logout.clone(),
        ));

        let probe = Arc::new(SessionProbe::new(
            provider,
            cookies,
            config.logout.cookie_name.clone(),
            config.monitor.request_timeout(),
        ));

        Self {
            activity,
            idle: IdleTimer::new(config.idle.threshold(), logout.clone()),
            monitor: SingleSessionMonitor::new(
                config.monitor.poll_interval(),
                probe,
                logout.clone(),
            ),
            logout,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Activate both policies. Re-activating after `stop` (or after a
    /// logout followed by a new login) starts from a fresh deadline.
    pub fn start(&mut self) {
        if self.active {
            warn!("Session guardian already active, ignoring start");
            return;
        }

        self.logout.reset();
        self.idle.start(self.activity.subscribe());
        self.monitor.start();
        self.active = true;

        info!(
            "Session guardian active (idle threshold {:?}, poll interval {:?})",
            self.idle.threshold(),
            self.monitor.poll_interval()
        );
    }

    /// Deactivate both policies; nothing fires after this returns
    pub async fn stop(&mut self) {
        if !self.active {
            return;
        }

        self.idle.stop().await;
        self.monitor.stop().await;
        self.active = false;

        info!("Session guardian stopped");
    }

    /// Report an activity signal, stamped now
    pub fn record_activity(&self, kind: ActivityKind) {
        record(&self.activity, kind);
    }

    /// User-initiated logout through the shared logout action
    pub async fn logout(&self, reason: LogoutReason) -> LogoutOutcome {
        self.logout.run(reason).await
    }

    pub fn idle_state(&self) -> IdleState {
        self.idle.state()
    }

    pub fn monitor_state(&self) -> MonitorState {
        self.monitor.state()
    }

    /// Cloneable handle for code that reports activity or reads status
    pub fn handle(&self) -> GuardianHandle {
        GuardianHandle {
            activity: self.activity.clone(),
            idle: self.idle.subscribe(),
            monitor: self.monitor.subscribe(),
            logout: self.logout.clone(),
        }
    }
}

fn record(activity: &broadcast::Sender<ActivityEvent>, kind: ActivityKind) {
    // No receivers just means the guardian is stopped.
    if activity.send(ActivityEvent::now(kind)).is_err() {
        debug!("Activity {} dropped, guardian inactive", kind.as_str());
    }
}

/// Shared view of a running guardian
#[derive(Clone)]
pub struct GuardianHandle {
    activity: broadcast::Sender<ActivityEvent>,
    idle: watch::Receiver<IdleState>,
    monitor: watch::Receiver<MonitorState>,
    logout: Arc<LogoutAction>,
}

impl GuardianHandle {
    pub fn record_activity(&self, kind: ActivityKind) {
        record(&self.activity, kind);
    }

    pub fn idle_state(&self) -> IdleState {
        *self.idle.borrow()
    }

    pub fn monitor_state(&self) -> MonitorState {
        *self.monitor.borrow()
    }

    pub fn is_logged_out(&self) -> bool {
        self.logout.is_logged_out()
    }

    pub async fn logout(&self, reason: LogoutReason) -> LogoutOutcome {
        self.logout.run(reason).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryAuthProvider;
    use crate::models::AuthUser;
    use crate::session::navigator::RecordingNavigator;
    use crate::session::storage::MemoryCookieStore;
    use std::time::Duration;

    fn guardian() -> (SessionGuardian, Arc<MemoryAuthProvider>, Arc<RecordingNavigator>) {
        let provider = Arc::new(MemoryAuthProvider::with_user(
            AuthUser::new("user-1").with_session_token("abc"),
        ));
        let navigator = Arc::new(RecordingNavigator::new());
        let guardian = SessionGuardian::new(
            &GuardianConfig::default(),
            provider.clone(),
            Arc::new(MemoryCookieStore::from_header("roaster_session_token=abc")),
            navigator.clone(),
        );
        (guardian, provider, navigator)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_activates_both_policies() {
        let (mut guardian, _, _) = guardian();
        guardian.start();

        assert!(guardian.is_active());
        assert!(guardian.idle_state().is_armed());
        assert_eq!(guardian.monitor_state(), MonitorState::Polling { ticks: 0 });

        guardian.stop().await;
        assert!(!guardian.is_active());
        assert_eq!(guardian.idle_state(), IdleState::Inactive);
        assert_eq!(guardian.monitor_state(), MonitorState::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_keeps_original_deadline() {
        let (mut guardian, _, _) = guardian();
        guardian.start();
        let first = guardian.idle_state();

        tokio::time::sleep(Duration::from_secs(5)).await;
        guardian.start();
        assert_eq!(guardian.idle_state(), first);
        guardian.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_reports_activity() {
        let (mut guardian, _, _) = guardian();
        guardian.start();
        let handle = guardian.handle();

        tokio::time::sleep(Duration::from_secs(60)).await;
        handle.record_activity(ActivityKind::Scroll);
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        match handle.idle_state() {
            IdleState::Armed { resets, .. } => assert_eq!(resets, 1),
            other => panic!("expected armed, got {:?}", other),
        }
        guardian.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_while_stopped_is_dropped() {
        let (guardian, _, navigator) = guardian();
        guardian.record_activity(ActivityKind::KeyDown);
        assert_eq!(navigator.count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_logout_rearms() {
        let (mut guardian, _, navigator) = guardian();
        guardian.start();

        let outcome = guardian
            .logout(LogoutReason::Manual(String::new()))
            .await;
        assert_eq!(
            outcome,
            LogoutOutcome::Completed {
                location: "/login?error=Sesi%C3%B3n%20cerrada.".to_string()
            }
        );

        guardian.stop().await;
        guardian.start();
        assert!(guardian.idle_state().is_armed());
        assert!(!guardian.handle().is_logged_out());

        tokio::time::sleep(Duration::from_secs(20 * 60 + 1)).await;
        assert_eq!(navigator.count().await, 2);
        guardian.stop().await;
    }
}
