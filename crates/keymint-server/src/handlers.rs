use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{telegram::Update, validate, AppState};

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok", "service": "keymint"}))
}

// ── Validate ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub hwid: String,
}

/// An undecodable body is treated as an empty payload, which falls out of
/// the rule chain as a "Missing input" rejection rather than a 4xx.
pub async fn validate_key(State(state): State<AppState>, body: axum::body::Bytes) -> Response {
    let body: ValidateRequest = serde_json::from_slice(&body).unwrap_or_default();
    match validate::validate(&state.store, &body.key, &body.hwid, Utc::now()) {
        Ok(verdict) => {
            info!(valid = verdict.valid, message = verdict.message, "audit: key.validate");
            let status = if verdict.server_disabled() {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::OK
            };
            (status, Json(verdict)).into_response()
        }
        Err(e) => internal_error(e),
    }
}

// ── Telegram webhook ──────────────────────────────────────────────────────────

/// Telegram redelivers on non-200, so this endpoint acknowledges every
/// update it can decode, whatever the command did.
pub async fn telegram_webhook(State(state): State<AppState>, Json(update): Json<Update>) -> Response {
    if let Some(callback) = update.callback_query {
        let sender = callback.from.id;
        let chat_id = callback
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(sender);
        let data = callback.data.unwrap_or_default();

        match state.admin.handle_callback(sender, &data) {
            Ok(Some(reply)) => {
                state
                    .telegram
                    .send_message(chat_id, &reply.text, reply.keyboard.as_ref())
                    .await;
            }
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "callback handling failed"),
        }
        // Clear the pending button state no matter what happened above.
        state.telegram.answer_callback(&callback.id).await;
        return ok_ack();
    }

    if let Some(message) = update.message {
        let Some(sender) = message.from.map(|u| u.id) else {
            return ok_ack();
        };
        let text = message.text.unwrap_or_default();

        match state.admin.handle_text(sender, &text) {
            Ok(Some(reply)) => {
                state
                    .telegram
                    .send_message(message.chat.id, &reply.text, reply.keyboard.as_ref())
                    .await;
            }
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "command handling failed"),
        }
    }

    ok_ack()
}

fn ok_ack() -> Response {
    (StatusCode::OK, "OK").into_response()
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn internal_error(e: anyhow::Error) -> Response {
    tracing::error!(error = %e, "internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "internal server error"})),
    )
        .into_response()
}
