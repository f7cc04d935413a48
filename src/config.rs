use crate::models::{BackendConfig, GuardianConfig};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable pointing at the configuration file
pub const CONFIG_PATH_ENV: &str = "GUARDIAN_CONFIG_PATH";

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GuardianConfig, String> {
    let path = path.as_ref();
    info!("Loading configuration from: {}", path.display());

    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

    let config = parse_config(&contents)?;

    info!(
        "Configuration loaded: idle threshold {}s, poll interval {}s, login route {}",
        config.idle.threshold_secs, config.monitor.poll_interval_secs, config.logout.login_route
    );

    Ok(config)
}

/// Parse and validate a YAML document. An empty document yields the defaults.
pub fn parse_config(contents: &str) -> Result<GuardianConfig, String> {
    let config: GuardianConfig = if contents.trim().is_empty() {
        GuardianConfig::default()
    } else {
        serde_yaml::from_str(contents)
            .map_err(|e| format!("Failed to parse YAML config: {}", e))?
    };

    config.validate()?;
    Ok(config)
}

/// Well-known configuration filenames, tried in order
pub const DEFAULT_CONFIG_PATHS: [&str; 4] =
    ["guardian.yaml", "guardian.yml", "config.yaml", "config.yml"];

/// Load configuration with fallback options.
///
/// `Ok(None)` means no configuration file exists. A file that exists but
/// cannot be read, parsed or validated is an error, never a silent fallback.
pub fn load_config_with_fallback() -> Result<Option<GuardianConfig>, String> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        return load_config(&config_path)
            .map(Some)
            .map_err(|e| format!("{} ({}): {}", CONFIG_PATH_ENV, config_path, e));
    }

    load_first_existing(&DEFAULT_CONFIG_PATHS)
}

/// Load the first of `paths` that exists
pub fn load_first_existing<P: AsRef<Path>>(paths: &[P]) -> Result<Option<GuardianConfig>, String> {
    for path in paths {
        let path = path.as_ref();
        if path.exists() {
            return load_config(path).map(Some);
        }
        debug!("No config file at '{}'", path.display());
    }

    Ok(None)
}

/// Overlay backend settings from `SUPABASE_URL` / `SUPABASE_ANON_KEY`
pub fn apply_env_overrides(config: &mut GuardianConfig) {
    apply_backend_overrides(
        config,
        std::env::var("SUPABASE_URL").ok(),
        std::env::var("SUPABASE_ANON_KEY").ok(),
    );
}

fn apply_backend_overrides(
    config: &mut GuardianConfig,
    url: Option<String>,
    anon_key: Option<String>,
) {
    let url = url.filter(|u| !u.trim().is_empty());
    let anon_key = anon_key.filter(|k| !k.trim().is_empty());

    if let Some(backend) = config.backend.as_mut() {
        if let Some(url) = url {
            backend.url = url;
        }
        if let Some(anon_key) = anon_key {
            backend.anon_key = anon_key;
        }
    } else if let Some(url) = url {
        config.backend = Some(BackendConfig::new(url, anon_key.unwrap_or_default()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
idle:
  threshold_secs: 600
monitor:
  poll_interval_secs: 15
  request_timeout_secs: 5
logout:
  cookie_name: club_session
  login_route: /ingresar
  messages:
    inactivity: "Session expired"
backend:
  url: https://project.supabase.co
  anon_key: public-anon
server:
  bind_address: 0.0.0.0:8080
"#;

        let config = parse_config(yaml).unwrap();
        assert_eq!(config.idle.threshold_secs, 600);
        assert_eq!(config.monitor.poll_interval_secs, 15);
        assert_eq!(config.logout.cookie_name, "club_session");
        assert_eq!(config.logout.cookie_path, "/");
        assert_eq!(config.logout.login_route, "/ingresar");
        assert_eq!(config.logout.messages.inactivity, "Session expired");
        assert!(
            config
                .logout
                .messages
                .session_elsewhere
                .starts_with("Se ha iniciado")
        );
        assert_eq!(config.backend.unwrap().anon_key, "public-anon");
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.idle.threshold_secs, 1200);
        assert_eq!(config.monitor.poll_interval_secs, 30);
        assert!(config.backend.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = parse_config("idle:\n  threshold_secs: 0\n").unwrap_err();
        assert!(err.contains("threshold_secs"));

        let err = parse_config("idle: [1, 2]").unwrap_err();
        assert!(err.contains("Failed to parse YAML"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config("/nonexistent/guardian.yaml").unwrap_err();
        assert!(err.contains("Failed to read config file"));
    }

    #[test]
    fn test_backend_overrides() {
        let mut config = GuardianConfig::default();
        apply_backend_overrides(&mut config, None, Some("ignored".to_string()));
        assert!(config.backend.is_none());

        apply_backend_overrides(
            &mut config,
            Some("https://a.supabase.co".to_string()),
            Some("key-a".to_string()),
        );
        let backend = config.backend.clone().unwrap();
        assert_eq!(backend.url, "https://a.supabase.co");
        assert_eq!(backend.anon_key, "key-a");

        apply_backend_overrides(&mut config, None, Some("key-b".to_string()));
        let backend = config.backend.unwrap();
        assert_eq!(backend.url, "https://a.supabase.co");
        assert_eq!(backend.anon_key, "key-b");
    }

    fn scratch_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "session-guardian-{}-{}",
            std::process::id(),
            name
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_no_config_file_is_none() {
        let missing = std::env::temp_dir().join("session-guardian-missing/guardian.yaml");
        assert!(load_first_existing(&[missing]).unwrap().is_none());
    }

    #[test]
    fn test_invalid_config_file_is_an_error() {
        let broken = scratch_file("broken.yaml", "idle:\n  threshold_secs: 0\n");
        let valid = scratch_file("valid.yaml", "idle:\n  threshold_secs: 60\n");

        let err = load_first_existing(&[&broken, &valid]).unwrap_err();
        assert!(err.contains("threshold_secs"));

        let config = load_first_existing(&[&valid]).unwrap().unwrap();
        assert_eq!(config.idle.threshold_secs, 60);

        fs::remove_file(broken).unwrap();
        fs::remove_file(valid).unwrap();
    }
}
