// Idle timer
// Ends the session once no activity signal has been seen for the threshold.

use super::logout::LogoutAction;
use super::types::{ActivityEvent, IdleState, LogoutReason};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

/// Debounced inactivity deadline.
///
/// While started, exactly one deadline is pending: every idle-resetting
/// activity moves it to `event time + threshold`. `stop` cancels the deadline
/// and drops the activity subscription.
pub struct IdleTimer {
    threshold: Duration,
    logout: Arc<LogoutAction>,
    state: Arc<watch::Sender<IdleState>>,
    task: Option<JoinHandle<()>>,
}

impl IdleTimer {
    pub fn new(threshold: Duration, logout: Arc<LogoutAction>) -> Self {
        let (state, _) = watch::channel(IdleState::Inactive);
        Self {
            threshold,
            logout,
            state: Arc::new(state),
            task: None,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn state(&self) -> IdleState {
        *self.state.borrow()
    }

    /// Receiver that follows state changes across restarts
    pub fn subscribe(&self) -> watch::Receiver<IdleState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Arm the deadline and start listening on `activity`.
    /// Restarting cancels whatever the previous run had pending.
    pub fn start(&mut self, activity: broadcast::Receiver<ActivityEvent>) {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        // Armed before the task is first polled, so leaving right after
        // login still times out.
        let deadline = Instant::now() + self.threshold;
        self.state
            .send_replace(IdleState::Armed { deadline, resets: 0 });

        debug!("Idle timer armed for {:?}", self.threshold);

        self.task = Some(tokio::spawn(run_idle_timer(
            self.threshold,
            deadline,
            activity,
            self.state.clone(),
            self.logout.clone(),
        )));
    }

    /// Cancel the pending deadline and unsubscribe.
    /// Once this returns no new idle logout can start until the next `start`;
    /// one that already fired runs to completion.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        self.state.send_replace(IdleState::Inactive);
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_idle_timer(
    threshold: Duration,
    deadline: Instant,
    mut activity: broadcast::Receiver<ActivityEvent>,
    state: Arc<watch::Sender<IdleState>>,
    logout: Arc<LogoutAction>,
) {
    let sleep = sleep_until(deadline);
    tokio::pin!(sleep);

    let mut resets = 0u64;
    let mut listening = true;

    loop {
        tokio::select! {
            biased;

            received = activity.recv(), if listening => {
                let at = match received {
                    Ok(event) if event.kind.resets_idle() => event.at,
                    Ok(_) => continue,
                    // Missed events were activity too
                    Err(broadcast::error::RecvError::Lagged(_)) => Instant::now(),
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Activity source closed, idle timer keeps its last deadline");
                        listening = false;
                        continue;
                    }
                };

                // Events queued before the current deadline was set cannot move it back.
                let deadline = (at + threshold).max(sleep.deadline());
                sleep.as_mut().reset(deadline);
                resets += 1;
                state.send_replace(IdleState::Armed { deadline, resets });
            }
            _ = &mut sleep => break,
        }
    }

    info!("No activity for {:?}, ending session", threshold);
    state.send_replace(IdleState::Fired);
    logout.run(LogoutReason::Inactivity).await;
}
