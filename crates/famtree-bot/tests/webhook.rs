use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use famtree_bot::signature::{SIGNATURE_HEADER, compute_signature};
use famtree_bot::webhook::{AppStateInner, SignatureCheck, routes};
use famtree_bot::{Engine, LockManager};
use famtree_db::Database;
use tower::ServiceExt;

const PUBLIC_URL: &str = "https://bot.example.com/webhook";
const TOKEN: &str = "test-auth-token";

fn app(signature: Option<SignatureCheck>) -> axum::Router {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let engine = Engine::new(db, LockManager::default(), 4);
    routes(Arc::new(AppStateInner { engine, signature }))
}

fn checked(enforce: bool) -> Option<SignatureCheck> {
    Some(SignatureCheck {
        auth_token: TOKEN.into(),
        public_url: Some(PUBLIC_URL.into()),
        enforce,
    })
}

fn webhook_request(form_body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(sig) = signature {
        builder = builder.header(SIGNATURE_HEADER, sig);
    }
    builder.body(Body::from(form_body.to_string())).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

const HI_FORM: &str = "From=whatsapp%3A%2B15550001&Body=Hi";

fn hi_params() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Body".to_string(), "Hi".to_string()),
        ("From".to_string(), "whatsapp:+15550001".to_string()),
    ])
}

#[tokio::test]
async fn root_reports_running() {
    let response = app(None)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["message"], "Family Tree Bot API is running");
}

#[tokio::test]
async fn health_is_ok() {
    let response = app(None)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn greeting_returns_twiml_menu() {
    let response = app(None).oneshot(webhook_request(HI_FORM, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/xml");

    let xml = body_text(response).await;
    assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?><Response><Message>"#), "{xml}");
    assert!(xml.contains("Family Tree Bot"), "{xml}");
    assert!(xml.ends_with("</Message></Response>"), "{xml}");
}

#[tokio::test]
async fn sender_prefix_is_stripped() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let engine = Engine::new(db.clone(), LockManager::default(), 4);
    let router = routes(Arc::new(AppStateInner { engine, signature: None }));

    router.oneshot(webhook_request(HI_FORM, None)).await.unwrap();
    assert!(db.get_user_by_phone("+15550001").unwrap().is_some());
    assert!(db.get_user_by_phone("whatsapp:+15550001").unwrap().is_none());
}

#[tokio::test]
async fn missing_fields_are_bad_requests() {
    let response = app(None)
        .oneshot(webhook_request("From=whatsapp%3A%2B15550001", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn enforced_signature_rejects_unsigned_requests() {
    let response = app(checked(true)).oneshot(webhook_request(HI_FORM, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(checked(true))
        .oneshot(webhook_request(HI_FORM, Some("bm9wZQ==")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn enforced_signature_accepts_valid_requests() {
    let sig = compute_signature(TOKEN, PUBLIC_URL, &hi_params()).unwrap();
    let response = app(checked(true))
        .oneshot(webhook_request(HI_FORM, Some(&sig)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unenforced_signature_only_warns() {
    let response = app(checked(false)).oneshot(webhook_request(HI_FORM, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
