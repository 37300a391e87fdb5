use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use maxbot_security::{SIGNATURE_HEADER, WebhookVerifier};
use metrics::counter;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::config::IngressConfig;
use crate::sink::SharedEventSink;

#[derive(Clone)]
pub struct AppState {
    verifier: Arc<WebhookVerifier>,
    sink: SharedEventSink,
}

impl AppState {
    pub fn new(verifier: WebhookVerifier, sink: SharedEventSink) -> Self {
        Self {
            verifier: Arc::new(verifier),
            sink,
        }
    }
}

pub fn build_router(config: &IngressConfig, state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route(&config.path, any(handle_webhook))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .with_state(state)
}

async fn handle_webhook(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let event = match state.verifier.handle(&method, signature, &body) {
        Ok(event) => event,
        Err(err) => {
            warn!(%method, error = %err, "webhook rejected");
            counter!("maxbot_webhook_requests_total", "outcome" => "rejected").increment(1);
            return (err.status(), err.to_string()).into_response();
        }
    };

    let update_id = event.update_id;
    if let Err(err) = state.sink.deliver(event).await {
        error!(update_id, error = %err, "webhook event not delivered");
        counter!("maxbot_webhook_requests_total", "outcome" => "unavailable").increment(1);
        return (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response();
    }

    debug!(update_id, "webhook event handed off");
    counter!("maxbot_webhook_requests_total", "outcome" => "accepted").increment(1);
    (
        StatusCode::ACCEPTED,
        Json(json!({ "ok": true, "update_id": update_id })),
    )
        .into_response()
}
