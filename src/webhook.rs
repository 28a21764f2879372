//! HTTP endpoints: Telegram webhook receiver, webhook admin, health.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::channels::{TelegramChannel, Update};
use crate::error::Error;
use crate::survey::SurveyManager;

const SERVICE_NAME: &str = "remodel-intake";

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    pub manager: Arc<SurveyManager>,
    pub telegram: TelegramChannel,
    /// Public URL to register with `/api/set-webhook`.
    pub webhook_url: Option<String>,
}

fn error_response(message: impl Into<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message.into() })),
    )
        .into_response()
}

/// POST /api/webhook
///
/// Dispatches one update and acknowledges it once handled. Conversational
/// failures are the bot's problem, not Telegram's, so they still get a 200;
/// only unreadable bodies and panics produce a 500.
async fn receive_update(State(state): State<WebhookState>, body: Bytes) -> Response {
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed webhook body");
            return error_response("Failed to process webhook");
        }
    };

    let update_id = update.update_id;
    match state.manager.dispatch(update).await {
        Ok(outcome) => {
            tracing::debug!(update_id, ?outcome, "Webhook update handled");
        }
        Err(e @ Error::Dispatch(_)) => {
            tracing::error!(update_id, error = %e, "Webhook dispatch panicked");
            return error_response("Failed to process webhook");
        }
        Err(e) => {
            tracing::error!(update_id, error = %e, "Failed to handle webhook update");
        }
    }

    Json(json!({ "ok": true })).into_response()
}

/// Any other method on /api/webhook.
async fn describe_webhook() -> impl IntoResponse {
    Json(json!({ "message": "This endpoint handles Telegram webhook events" }))
}

/// GET /api/webhook-info
async fn webhook_info(State(state): State<WebhookState>) -> Response {
    match state.telegram.webhook_info().await {
        Ok(info) => Json(info).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "getWebhookInfo failed");
            error_response(e.to_string())
        }
    }
}

/// GET /api/set-webhook
async fn set_webhook(State(state): State<WebhookState>) -> Response {
    let Some(url) = state.webhook_url.as_deref() else {
        return error_response("WEBHOOK_URL is not configured");
    };
    match state.telegram.set_webhook(url).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "setWebhook failed");
            error_response(e.to_string())
        }
    }
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": SERVICE_NAME }))
}

/// Build the HTTP routes.
pub fn webhook_routes(state: WebhookState) -> Router {
    Router::new()
        .route(
            "/api/webhook",
            post(receive_update).fallback(describe_webhook),
        )
        .route("/api/webhook-info", get(webhook_info))
        .route("/api/set-webhook", get(set_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
