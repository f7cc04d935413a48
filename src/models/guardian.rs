use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the session guardian
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardianConfig {
    /// Inactivity timeout settings
    #[serde(default)]
    pub idle: IdleConfig,
    /// Single-session polling settings
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Cookie, redirect and message settings used when logging out
    #[serde(default)]
    pub logout: LogoutConfig,
    /// Hosted auth backend connection (optional, env vars take precedence)
    #[serde(default)]
    pub backend: Option<BackendConfig>,
    /// HTTP surface of the daemon
    #[serde(default)]
    pub server: ServerConfig,
}

impl GuardianConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.idle.threshold_secs == 0 {
            return Err("idle.threshold_secs must be greater than zero".to_string());
        }

        if self.monitor.poll_interval_secs == 0 {
            return Err("monitor.poll_interval_secs must be greater than zero".to_string());
        }

        if self.monitor.request_timeout_secs == 0 {
            return Err("monitor.request_timeout_secs must be greater than zero".to_string());
        }

        self.logout.validate()?;

        if let Some(backend) = &self.backend {
            if backend.url.trim().is_empty() {
                return Err("backend.url must not be empty".to_string());
            }
            if backend.request_timeout_secs == 0 {
                return Err("backend.request_timeout_secs must be greater than zero".to_string());
            }
        }

        Ok(())
    }
}

/// Idle timer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleConfig {
    /// Inactivity period after which the session is ended (default: 1200 = 20 minutes)
    #[serde(default = "default_idle_threshold")]
    pub threshold_secs: u64,
}

impl IdleConfig {
    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.threshold_secs)
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            threshold_secs: default_idle_threshold(),
        }
    }
}

fn default_idle_threshold() -> u64 {
    20 * 60
}

/// Single-session monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Interval between session checks (default: 30)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Upper bound for a single user lookup (default: 10)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_poll_interval() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    10
}

/// Logout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutConfig {
    /// Name of the cookie holding the session token
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Path the session cookie is scoped to
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,
    /// Route of the login surface
    #[serde(default = "default_login_route")]
    pub login_route: String,
    /// Query parameter carrying the logout reason
    #[serde(default = "default_reason_param")]
    pub reason_param: String,
    /// Upper bound for the remote sign-out before local cleanup goes ahead (default: 10)
    #[serde(default = "default_sign_out_timeout")]
    pub sign_out_timeout_secs: u64,
    /// Human-readable reasons shown on the login surface
    #[serde(default)]
    pub messages: ReasonMessages,
}

impl LogoutConfig {
    pub fn sign_out_timeout(&self) -> Duration {
        Duration::from_secs(self.sign_out_timeout_secs)
    }

    fn validate(&self) -> Result<(), String> {
        if self.sign_out_timeout_secs == 0 {
            return Err("logout.sign_out_timeout_secs must be greater than zero".to_string());
        }

        if self.cookie_name.trim().is_empty() {
            return Err("logout.cookie_name must not be empty".to_string());
        }

        if self.cookie_name.contains(['=', ';', ' ']) {
            return Err(format!(
                "logout.cookie_name '{}' contains reserved characters",
                self.cookie_name
            ));
        }

        if !self.login_route.starts_with('/') {
            return Err(format!(
                "logout.login_route '{}' must start with '/'",
                self.login_route
            ));
        }

        if self.reason_param.trim().is_empty() {
            return Err("logout.reason_param must not be empty".to_string());
        }

        self.messages.validate()
    }
}

impl Default for LogoutConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            cookie_path: default_cookie_path(),
            login_route: default_login_route(),
            reason_param: default_reason_param(),
            sign_out_timeout_secs: default_sign_out_timeout(),
            messages: ReasonMessages::default(),
        }
    }
}

fn default_sign_out_timeout() -> u64 {
    10
}

fn default_cookie_name() -> String {
    "roaster_session_token".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_login_route() -> String {
    "/login".to_string()
}

fn default_reason_param() -> String {
    "error".to_string()
}

/// Messages attached to the login redirect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonMessages {
    #[serde(default = "default_inactivity_message")]
    pub inactivity: String,
    #[serde(default = "default_session_elsewhere_message")]
    pub session_elsewhere: String,
    /// Used for manual logouts that carry no message of their own
    #[serde(default = "default_generic_message")]
    pub generic: String,
}

impl ReasonMessages {
    fn validate(&self) -> Result<(), String> {
        for (key, message) in [
            ("inactivity", &self.inactivity),
            ("session_elsewhere", &self.session_elsewhere),
            ("generic", &self.generic),
        ] {
            if message.trim().is_empty() {
                return Err(format!("logout.messages.{} must not be empty", key));
            }
        }
        Ok(())
    }
}

impl Default for ReasonMessages {
    fn default() -> Self {
        Self {
            inactivity: default_inactivity_message(),
            session_elsewhere: default_session_elsewhere_message(),
            generic: default_generic_message(),
        }
    }
}

fn default_inactivity_message() -> String {
    "Sesión expirada por inactividad. Por favor, vuelve a ingresar.".to_string()
}

fn default_session_elsewhere_message() -> String {
    "Se ha iniciado sesión en otro dispositivo. Tu sesión actual ha sido cerrada.".to_string()
}

fn default_generic_message() -> String {
    "Sesión cerrada.".to_string()
}

/// Connection to the hosted auth backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL, e.g. https://xyz.supabase.co
    pub url: String,
    /// Public (anon) API key sent as the `apikey` header
    #[serde(default)]
    pub anon_key: String,
    /// Per-request timeout for every backend call (default: 10)
    #[serde(default = "default_backend_timeout")]
    pub request_timeout_secs: u64,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            request_timeout_secs: default_backend_timeout(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_backend_timeout() -> u64 {
    10
}

/// Daemon HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:3000".to_string()
}
