// Session lifecycle enforcement
// Idle timeout and single-active-session detection, funnelled into one logout action

pub mod guardian;
pub mod idle;
pub mod logout;
pub mod monitor;
pub mod navigator;
pub mod storage;
pub mod types;

pub use guardian::{GuardianHandle, SessionGuardian};
pub use idle::IdleTimer;
pub use logout::LogoutAction;
pub use monitor::{SessionProbe, SingleSessionMonitor};
pub use navigator::{Navigation, Navigator, RecordingNavigator};
pub use storage::{CookieStore, CookieWrite, MemoryCookieStore, parse_cookie};
pub use types::{
    ActivityEvent, ActivityKind, IdleState, LogoutOutcome, LogoutReason, MonitorState, PollOutcome,
};
