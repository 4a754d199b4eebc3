use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    admin::AdminRouter,
    handlers::{health, telegram_webhook, validate_key},
    telegram::{TelegramClient, DEFAULT_API_BASE},
    AppState,
};

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Telegram bot credential. Required to start.
    pub bot_token: Option<String>,
    /// The single authorized administrator identity. Required to start.
    pub admin_id: Option<i64>,
    pub data_dir: Option<PathBuf>,
    /// Override for the Telegram API origin (tests point this at a mock).
    pub telegram_api_base: String,
    pub cors_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("KEYMINT_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("KEYMINT_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            bot_token: std::env::var("KEYMINT_BOT_TOKEN").ok(),
            admin_id: std::env::var("KEYMINT_ADMIN_ID")
                .ok()
                .and_then(|v| v.parse().ok()),
            data_dir: std::env::var("KEYMINT_DATA_DIR").ok().map(PathBuf::from),
            telegram_api_base: DEFAULT_API_BASE.into(),
            cors_origins: std::env::var("KEYMINT_CORS_ORIGINS").ok(),
        }
    }
}

/// Build the application router. Separate from [`run`] so tests can drive
/// it in-process.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/validate", post(validate_key))
        .route("/telegram-webhook", post(telegram_webhook))
        .with_state(state)
}

pub async fn run(cfg: ServerConfig) -> Result<()> {
    // Resolve data directory.
    let data_dir = match cfg.data_dir {
        Some(d) => {
            std::fs::create_dir_all(&d).context("create data dir")?;
            d
        }
        None => crate::dirs::data_dir()?,
    };

    info!(data_dir = %data_dir.display(), "using data directory");

    let bot_token = cfg
        .bot_token
        .context("KEYMINT_BOT_TOKEN must be set — the admin channel cannot start without it")?;
    let admin_id = cfg
        .admin_id
        .context("KEYMINT_ADMIN_ID must be set to the numeric administrator identity")?;

    let store = crate::store::Store::open(data_dir.join("keys.json"));
    let telegram = TelegramClient::new(bot_token, cfg.telegram_api_base);
    let admin = AdminRouter::new(store.clone(), admin_id);

    let state = AppState {
        store,
        telegram,
        admin,
    };

    let cors = build_cors(cfg.cors_origins.as_deref());

    let app = router(state).layer(cors).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;

    info!(%addr, "keymint server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;

    axum::serve(listener, app).await.context("server error")
}

fn build_cors(origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(Any);

    match origins {
        Some(o) => {
            let origins: Vec<_> = o
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            cors.allow_origin(origins)
        }
        None => cors.allow_origin(Any),
    }
}
