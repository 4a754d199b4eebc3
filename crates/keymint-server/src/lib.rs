pub mod admin;
pub mod dirs;
pub mod handlers;
pub mod server;
pub mod store;
pub mod telegram;
pub mod validate;

/// Shared application state threaded through axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: store::Store,
    /// Outbound Telegram transport for admin replies and callback acks.
    pub telegram: telegram::TelegramClient,
    /// Admin command router bound to the configured administrator identity.
    pub admin: admin::AdminRouter,
}

pub use server::{router, run, ServerConfig};
