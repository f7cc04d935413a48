pub mod guardian;
pub mod user;

pub use guardian::{
    BackendConfig, GuardianConfig, IdleConfig, LogoutConfig, MonitorConfig, ReasonMessages,
    ServerConfig,
};
pub use user::{AuthUser, CURRENT_SESSION_TOKEN_KEY};
