//! Integration tests for service-account auth against a fake token endpoint.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use remodel_intake::error::SinkError;
use remodel_intake::sink::{ServiceAccountAuth, TokenSource};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const CLIENT_EMAIL: &str = "intake@remodel.iam.gserviceaccount.com";
const JWT_BEARER: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const PRIVATE_KEY: &str = include_str!("fixtures/service_account_key.pem");

/// Fake OAuth token endpoint.
struct FakeTokenEndpoint {
    hits: AtomicUsize,
    /// Reject every request with 401.
    reject: bool,
    expires_in: u64,
    forms: Mutex<Vec<HashMap<String, String>>>,
}

type Shared = Arc<FakeTokenEndpoint>;

async fn issue_token(
    State(endpoint): State<Shared>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let n = endpoint.hits.fetch_add(1, Ordering::SeqCst) + 1;
    endpoint.forms.lock().unwrap().push(form);
    if endpoint.reject {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid_grant", "error_description": "Invalid JWT Signature."})),
        )
            .into_response();
    }
    Json(json!({
        "access_token": format!("ya29.token-{n}"),
        "expires_in": endpoint.expires_in,
        "token_type": "Bearer",
    }))
    .into_response()
}

async fn start_fake(reject: bool, expires_in: u64) -> (String, Shared) {
    let shared: Shared = Arc::new(FakeTokenEndpoint {
        hits: AtomicUsize::new(0),
        reject,
        expires_in,
        forms: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/token", post(issue_token))
        .with_state(Arc::clone(&shared));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}/token"), shared)
}

fn auth(token_uri: &str) -> ServiceAccountAuth {
    let key = json!({
        "type": "service_account",
        "client_email": CLIENT_EMAIL,
        "private_key": PRIVATE_KEY,
        "token_uri": token_uri,
    });
    ServiceAccountAuth::from_json(&SecretString::from(key.to_string())).unwrap()
}

fn decode_segment(segment: &str) -> Vec<u8> {
    URL_SAFE_NO_PAD.decode(segment).unwrap()
}

#[tokio::test]
async fn token_is_fetched_once_and_cached() {
    timeout(TEST_TIMEOUT, async {
        let (uri, fake) = start_fake(false, 3600).await;
        let auth = auth(&uri);

        assert_eq!(auth.token().await.unwrap(), "ya29.token-1");
        assert_eq!(auth.token().await.unwrap(), "ya29.token-1");
        assert_eq!(fake.hits.load(Ordering::SeqCst), 1);

        let forms = fake.forms.lock().unwrap();
        assert_eq!(forms[0]["grant_type"], JWT_BEARER);

        let segments: Vec<&str> = forms[0]["assertion"].split('.').collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(decode_segment(segments[0]), br#"{"alg":"RS256","typ":"JWT"}"#);

        let claims: Value = serde_json::from_slice(&decode_segment(segments[1])).unwrap();
        assert_eq!(claims["iss"], CLIENT_EMAIL);
        assert_eq!(claims["aud"], uri.as_str());
        assert_eq!(claims["scope"], "https://www.googleapis.com/auth/spreadsheets");
        assert_eq!(
            claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(),
            3600
        );
        assert_eq!(decode_segment(segments[2]).len(), 256);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn token_near_expiry_is_refreshed() {
    timeout(TEST_TIMEOUT, async {
        // Inside the refresh margin from the moment it is issued.
        let (uri, fake) = start_fake(false, 30).await;
        let auth = auth(&uri);

        assert_eq!(auth.token().await.unwrap(), "ya29.token-1");
        assert_eq!(auth.token().await.unwrap(), "ya29.token-2");
        assert_eq!(fake.hits.load(Ordering::SeqCst), 2);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rejected_assertion_is_an_auth_failure() {
    timeout(TEST_TIMEOUT, async {
        let (uri, fake) = start_fake(true, 3600).await;
        let auth = auth(&uri);

        let err = auth.token().await.unwrap_err();
        assert!(
            matches!(err, SinkError::AuthFailed(ref m) if m.contains("401")),
            "got {err:?}"
        );

        // Failures are not cached.
        assert!(auth.token().await.is_err());
        assert_eq!(fake.hits.load(Ordering::SeqCst), 2);
    })
    .await
    .expect("test timed out");
}
