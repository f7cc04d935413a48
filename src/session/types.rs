// Session guardian types

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Kind of user interaction reported by the client
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    #[serde(rename = "mousemove")]
    PointerMove,
    KeyDown,
    #[serde(rename = "mousedown")]
    PointerDown,
    Scroll,
    TouchStart,
    Focus,
    Resize,
    VisibilityChange,
}

impl ActivityKind {
    /// Signals the idle timer subscribes to
    pub const IDLE_RESETTING: [ActivityKind; 5] = [
        ActivityKind::PointerMove,
        ActivityKind::KeyDown,
        ActivityKind::PointerDown,
        ActivityKind::Scroll,
        ActivityKind::TouchStart,
    ];

    pub fn resets_idle(&self) -> bool {
        Self::IDLE_RESETTING.contains(self)
    }

    /// DOM event name
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::PointerMove => "mousemove",
            ActivityKind::KeyDown => "keydown",
            ActivityKind::PointerDown => "mousedown",
            ActivityKind::Scroll => "scroll",
            ActivityKind::TouchStart => "touchstart",
            ActivityKind::Focus => "focus",
            ActivityKind::Resize => "resize",
            ActivityKind::VisibilityChange => "visibilitychange",
        }
    }
}

impl std::str::FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mousemove" | "pointermove" => Ok(ActivityKind::PointerMove),
            "keydown" => Ok(ActivityKind::KeyDown),
            "mousedown" | "pointerdown" => Ok(ActivityKind::PointerDown),
            "scroll" => Ok(ActivityKind::Scroll),
            "touchstart" => Ok(ActivityKind::TouchStart),
            "focus" => Ok(ActivityKind::Focus),
            "resize" => Ok(ActivityKind::Resize),
            "visibilitychange" => Ok(ActivityKind::VisibilityChange),
            other => Err(format!("Unknown activity kind: {}", other)),
        }
    }
}

/// One activity signal, stamped when it was observed
#[derive(Debug, Clone, Copy)]
pub struct ActivityEvent {
    pub kind: ActivityKind,
    pub at: Instant,
}

impl ActivityEvent {
    pub fn now(kind: ActivityKind) -> Self {
        Self {
            kind,
            at: Instant::now(),
        }
    }
}

/// Why a session is being ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutReason {
    /// Idle threshold elapsed without activity
    Inactivity,
    /// A newer login replaced this session
    SessionElsewhere,
    /// User-initiated logout, optionally with its own message
    Manual(String),
}

impl LogoutReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogoutReason::Inactivity => "inactivity",
            LogoutReason::SessionElsewhere => "session_elsewhere",
            LogoutReason::Manual(_) => "manual",
        }
    }
}

/// Result of invoking the logout action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// Session ended and the client was sent to `location`
    Completed { location: String },
    /// An earlier invocation already ended the session
    AlreadyLoggedOut,
}

/// Idle timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleState {
    /// Not started, or stopped
    Inactive,
    /// A single deadline is pending
    Armed { deadline: Instant, resets: u64 },
    /// Deadline elapsed and logout was triggered
    Fired,
}

impl IdleState {
    pub fn is_armed(&self) -> bool {
        matches!(self, IdleState::Armed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IdleState::Inactive => "inactive",
            IdleState::Armed { .. } => "armed",
            IdleState::Fired => "fired",
        }
    }
}

/// Single-session monitor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Inactive,
    Polling { ticks: u64 },
    /// Another login replaced this session
    Superseded,
}

impl MonitorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorState::Inactive => "inactive",
            MonitorState::Polling { .. } => "polling",
            MonitorState::Superseded => "superseded",
        }
    }
}

/// What a single poll tick concluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No session cookie, nothing to compare
    NoLocalToken,
    /// Account has no recorded session token
    NoAccountToken,
    /// Tokens agree
    Matched,
    /// User lookup failed or timed out, retried next tick
    FetchFailed(String),
    /// Account token differs from the cookie
    Superseded,
}
