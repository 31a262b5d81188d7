use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{OriginalUri, State},
    http::{HeaderMap, StatusCode, Uri, header},
    response::IntoResponse,
    routing::{get, post},
};
use famtree_types::api::{InboundMessage, StatusResponse};
use tracing::{debug, error, warn};

use crate::dialog::Engine;
use crate::signature::{SIGNATURE_HEADER, verify_signature};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub engine: Engine,
    /// `None` leaves the webhook unauthenticated.
    pub signature: Option<SignatureCheck>,
}

pub struct SignatureCheck {
    pub auth_token: String,
    /// Overrides the URL rebuilt from the request, for use behind proxies.
    pub public_url: Option<String>,
    /// Reject mismatches with 403 instead of only logging them.
    pub enforce: bool,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/webhook", post(receive_message))
        .with_state(state)
}

async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "Family Tree Bot API is running".into(),
    })
}

async fn health() -> &'static str {
    "ok"
}

/// Best guess at the URL the provider signed.
fn request_url(headers: &HeaderMap, uri: &Uri) -> String {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let scheme = header_str("x-forwarded-proto").unwrap_or("http");
    let host = header_str("x-forwarded-host")
        .or_else(|| header_str(header::HOST.as_str()))
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    format!("{}://{}{}", scheme, host, path)
}

pub async fn receive_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    Form(form): Form<BTreeMap<String, String>>,
) -> Result<impl IntoResponse, StatusCode> {
    if let Some(check) = &state.signature {
        let url = check
            .public_url
            .clone()
            .unwrap_or_else(|| request_url(&headers, &uri));
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(&check.auth_token, &url, &form, provided) {
            if check.enforce {
                warn!(%url, "Rejected webhook with bad signature");
                return Err(StatusCode::FORBIDDEN);
            }
            warn!(%url, "Webhook signature mismatch, processing anyway");
        }
    }

    let inbound = InboundMessage::from_form(&form).ok_or(StatusCode::BAD_REQUEST)?;
    debug!(sender = %inbound.sender, "Inbound message");

    // Store access is synchronous.
    let app = state.clone();
    let reply = tokio::task::spawn_blocking(move || {
        app.engine.handle_message(&inbound.sender, &inbound.body)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(([(header::CONTENT_TYPE, "application/xml")], reply.to_twiml()))
}
