//! The HTTP surface: gateway event ingestion plus a health endpoint.
//!
//! The gateway service forwards platform events as JSON POSTs signed with
//! HMAC-SHA256 over the raw body. Verified events are queued for the
//! worker and the handler returns immediately.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::dispatch::{Inbound, PlatformEvent};

pub const SIGNATURE_HEADER: &str = "x-signature-256";

pub struct IngestState {
    pub signing_secret: String,
    pub inbound_tx: mpsc::UnboundedSender<Inbound>,
}

#[derive(Serialize)]
pub struct EventResponse {
    pub message: String,
}

type HmacSha256 = Hmac<Sha256>;

fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    if !signature.starts_with("sha256=") {
        return false;
    }

    let signature_hex = &signature[7..];

    let signature_bytes = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };

    mac.update(payload);

    // Constant-time comparison.
    mac.verify_slice(&signature_bytes).is_ok()
}

async fn verify_event_signature(
    State(state): State<Arc<IngestState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let signature = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !verify_signature(&state.signing_secret, &bytes, signature) {
        error!("Invalid event signature");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let request = Request::from_parts(parts, axum::body::Body::from(bytes));
    Ok(next.run(request).await)
}

async fn events_handler(
    State(state): State<Arc<IngestState>>,
    request: Request,
) -> Result<Json<EventResponse>, StatusCode> {
    let (_parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let event: PlatformEvent =
        serde_json::from_slice(&bytes).map_err(|_| StatusCode::BAD_REQUEST)?;

    if state.inbound_tx.send(Inbound::Platform(event)).is_err() {
        error!("Worker queue is closed, dropping event");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(EventResponse {
        message: "Event accepted".to_string(),
    }))
}

async fn health_handler() -> &'static str {
    "ok"
}

pub fn router(state: Arc<IngestState>) -> Router {
    Router::new()
        .route("/events", post(events_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            verify_event_signature,
        ))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    fn sign(body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body.as_bytes());
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn setup() -> (Router, mpsc::UnboundedReceiver<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(IngestState {
            signing_secret: SECRET.to_string(),
            inbound_tx: tx,
        });
        (router(state), rx)
    }

    fn event_json() -> String {
        serde_json::json!({
            "type": "message_create",
            "guild_id": "g",
            "channel_id": "c",
            "author_id": "u",
            "content": "hello"
        })
        .to_string()
    }

    #[test]
    fn test_verify_signature() {
        let body = b"payload";
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        let good = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

        assert!(verify_signature(SECRET, body, &good));
        assert!(!verify_signature(SECRET, b"other payload", &good));
        assert!(!verify_signature(SECRET, body, "sha256=deadbeef"));
        assert!(!verify_signature(SECRET, body, "sha256=not hex"));
        assert!(!verify_signature(SECRET, body, "md5=abc"));
    }

    #[tokio::test]
    async fn test_signed_event_is_queued() {
        let (app, mut rx) = setup();
        let body = event_json();
        let response = app
            .oneshot(
                HttpRequest::post("/events")
                    .header(SIGNATURE_HEADER, sign(&body))
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let queued = rx.try_recv().expect("event should be queued");
        assert!(matches!(
            queued,
            Inbound::Platform(PlatformEvent::MessageCreate(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_signature_is_rejected() {
        let (app, mut rx) = setup();
        let body = event_json();
        let response = app
            .oneshot(
                HttpRequest::post("/events")
                    .header(SIGNATURE_HEADER, "sha256=0000")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_signature_is_rejected() {
        let (app, _rx) = setup();
        let response = app
            .oneshot(
                HttpRequest::post("/events")
                    .body(Body::from(event_json()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_rejected() {
        let (app, _rx) = setup();
        let body = "{\"type\": \"mystery\"}".to_string();
        let response = app
            .oneshot(
                HttpRequest::post("/events")
                    .header(SIGNATURE_HEADER, sign(&body))
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_needs_no_signature() {
        let (app, _rx) = setup();
        let response = app
            .oneshot(HttpRequest::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
