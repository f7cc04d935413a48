use roster_session_guardian::auth::{AuthProvider, HttpAuthProvider, MemoryAuthProvider};
use roster_session_guardian::config;
use roster_session_guardian::handlers::{self, AppState};
use roster_session_guardian::models::{AuthUser, GuardianConfig};
use roster_session_guardian::session::{
    CookieStore, CookieWrite, MemoryCookieStore, RecordingNavigator, SessionGuardian,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roster_session_guardian=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let mut guardian_config = match config::load_config_with_fallback() {
        Ok(Some(config)) => config,
        Ok(None) => {
            tracing::warn!(
                "No configuration file found (set {} or create guardian.yaml). Using built-in defaults.",
                config::CONFIG_PATH_ENV
            );
            GuardianConfig::default()
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    config::apply_env_overrides(&mut guardian_config);

    if let Err(e) = guardian_config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let session_token = std::env::var("SESSION_TOKEN").ok().filter(|t| !t.is_empty());

    let provider: Arc<dyn AuthProvider> = match &guardian_config.backend {
        Some(backend) => {
            let access_token = std::env::var("SUPABASE_ACCESS_TOKEN").ok();
            let refresh_token = std::env::var("SUPABASE_REFRESH_TOKEN").ok();
            match HttpAuthProvider::new(backend, access_token, refresh_token) {
                Ok(provider) => {
                    tracing::info!("Using auth backend at {}", backend.url);
                    Arc::new(provider)
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    std::process::exit(1);
                }
            }
        }
        None => {
            tracing::warn!("No auth backend configured, running with an in-memory account");
            let mut user = AuthUser::new("local-user");
            user.set_session_token(session_token.clone());
            Arc::new(MemoryAuthProvider::with_user(user))
        }
    };

    let cookies = Arc::new(MemoryCookieStore::new());
    if let Some(token) = &session_token {
        cookies
            .set(CookieWrite {
                name: guardian_config.logout.cookie_name.clone(),
                value: token.clone(),
                path: guardian_config.logout.cookie_path.clone(),
                max_age: None,
            })
            .await;
    } else {
        tracing::warn!("SESSION_TOKEN not set, single-session checks will be skipped");
    }

    let navigator = Arc::new(RecordingNavigator::new());

    let mut guardian = SessionGuardian::new(&guardian_config, provider, cookies, navigator.clone());
    guardian.start();

    let app = handlers::router(AppState {
        guardian: guardian.handle(),
        navigator,
    })
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = match guardian_config.server.bind_address.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(
                "Invalid bind address '{}': {}",
                guardian_config.server.bind_address,
                e
            );
            std::process::exit(1);
        }
    };

    tracing::info!("Starting session guardian on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
        })
        .await
        .unwrap();

    guardian.stop().await;
}
