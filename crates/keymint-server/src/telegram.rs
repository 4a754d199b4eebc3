use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

// ── Inbound update envelope ──────────────────────────────────────────────────

/// One Telegram webhook update. Exactly one of `message` /
/// `callback_query` is expected to be present.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
}

// ── Outbound reply markup ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<Button>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub callback_data: String,
}

impl Button {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

// ── Client ───────────────────────────────────────────────────────────────────

/// Outbound Telegram Bot API client. Delivery failures are logged and
/// swallowed — the core never retries or observes transport outcomes.
#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    token: String,
    api_base: String,
}

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

impl TelegramClient {
    pub fn new(token: String, api_base: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("build telegram reqwest client");

        Self {
            client,
            token,
            api_base,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Send an HTML-formatted message, optionally with an inline keyboard.
    pub async fn send_message(&self, chat_id: i64, text: &str, keyboard: Option<&InlineKeyboard>) {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = json!(kb);
        }
        self.post("sendMessage", body).await;
    }

    /// Acknowledge a callback query so the originating button stops
    /// spinning, regardless of what the command did.
    pub async fn answer_callback(&self, callback_id: &str) {
        self.post(
            "answerCallbackQuery",
            json!({ "callback_query_id": callback_id }),
        )
        .await;
    }

    async fn post(&self, method: &str, body: serde_json::Value) {
        let result = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await;

        match result {
            Ok(resp) => {
                debug!(method, status = %resp.status(), "telegram call delivered");
            }
            Err(e) => {
                warn!(method, error = %e, "telegram call failed");
            }
        }
    }
}
