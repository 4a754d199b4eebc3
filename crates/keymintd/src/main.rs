use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "keymintd",
    about = "Keymintd — license key issuance and validation server daemon",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Keymint HTTP server
    Serve {
        /// Port to listen on (default: $KEYMINT_PORT or 8080)
        #[arg(long, env = "KEYMINT_PORT", default_value = "8080")]
        port: u16,
        /// Host to bind (default: $KEYMINT_HOST or 0.0.0.0)
        #[arg(long, env = "KEYMINT_HOST", default_value = "0.0.0.0")]
        host: String,
        /// Log level: error, warn, info, debug, verbose (default: $KEYMINT_LOG_LEVEL or warn)
        #[arg(long, env = "KEYMINT_LOG_LEVEL")]
        log_level: Option<String>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Commands::Serve {
        ref host,
        port,
        ref log_level,
    } = cli.command;

    let raw = log_level
        .clone()
        .or_else(|| std::env::var("KEYMINT_LOG_LEVEL").ok())
        .unwrap_or_else(|| "warn".into());
    let effective_log_level = if raw.eq_ignore_ascii_case("verbose") {
        "debug".to_owned()
    } else {
        raw
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&effective_log_level))
        .init();

    cmd_serve(host.clone(), port).await
}

// ── Command implementations ───────────────────────────────────────────────────

async fn cmd_serve(host: String, port: u16) -> Result<()> {
    let cfg = keymint_server::ServerConfig {
        host,
        port,
        bot_token: std::env::var("KEYMINT_BOT_TOKEN").ok(),
        admin_id: std::env::var("KEYMINT_ADMIN_ID")
            .ok()
            .map(|v| {
                v.parse()
                    .context("KEYMINT_ADMIN_ID must be a numeric Telegram user id")
            })
            .transpose()?,
        data_dir: std::env::var("KEYMINT_DATA_DIR").ok().map(Into::into),
        ..Default::default()
    };

    keymint_server::run(cfg).await
}
