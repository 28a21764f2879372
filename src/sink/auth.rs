//! OAuth access tokens for the Sheets API.
//!
//! A service account authenticates by signing a short-lived JWT with its
//! private key (RS256) and exchanging it at the key's `token_uri` for a bearer
//! token. Tokens are cached until shortly before they expire.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::rand::SystemRandom;
use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
use rustls_pki_types::PrivatePkcs8KeyDer;
use rustls_pki_types::pem::PemObject;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::SinkError;

/// OAuth scope for reading and writing spreadsheets.
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Lifetime requested for the signed assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh this long before the cached token expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Source of bearer tokens for the Sheets API.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String, SinkError>;
}

/// A fixed token, for tests and pre-authorized proxies.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String, SinkError> {
        Ok(self.0.clone())
    }
}

/// The fields of a service account key file that matter here.
#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Service-account token source.
pub struct ServiceAccountAuth {
    client_email: String,
    token_uri: String,
    key_pair: RsaKeyPair,
    rng: SystemRandom,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    /// Parse a service account key JSON document.
    pub fn from_json(key_json: &SecretString) -> Result<Self, SinkError> {
        let key: ServiceAccountKey = serde_json::from_str(key_json.expose_secret())
            .map_err(|e| SinkError::Credentials(format!("invalid key JSON: {e}")))?;

        let der = PrivatePkcs8KeyDer::from_pem_slice(key.private_key.as_bytes())
            .map_err(|e| SinkError::Credentials(format!("invalid private key PEM: {e}")))?;
        let key_pair = RsaKeyPair::from_pkcs8(der.secret_pkcs8_der())
            .map_err(|e| SinkError::Credentials(format!("unusable RSA key: {e}")))?;

        Ok(Self {
            client_email: key.client_email,
            token_uri: key.token_uri,
            key_pair,
            rng: SystemRandom::new(),
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Build and sign the JWT bearer assertion.
    fn assertion(&self, now: i64) -> Result<String, SinkError> {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let claims = jwt_claims(&self.client_email, &self.token_uri, now);
        let claims = URL_SAFE_NO_PAD.encode(claims.to_string());
        let signing_input = format!("{header}.{claims}");

        let mut signature = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(
                &RSA_PKCS1_SHA256,
                &self.rng,
                signing_input.as_bytes(),
                &mut signature,
            )
            .map_err(|_| SinkError::Credentials("failed to sign JWT assertion".to_string()))?;

        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    async fn fetch_token(&self) -> Result<CachedToken, SinkError> {
        let assertion = self.assertion(chrono::Utc::now().timestamp())?;
        let resp = self
            .client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::AuthFailed(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SinkError::AuthFailed(format!("invalid token response: {e}")))?;

        tracing::debug!(
            client_email = %self.client_email,
            expires_in = token.expires_in,
            "Obtained Sheets access token"
        );

        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountAuth {
    async fn token(&self) -> Result<String, SinkError> {
        let mut cached = self.cached.lock().await;
        if let Some(ref token) = *cached {
            if Instant::now() + REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}

/// JWT claim set for the service-account grant.
fn jwt_claims(client_email: &str, token_uri: &str, now: i64) -> serde_json::Value {
    serde_json::json!({
        "iss": client_email,
        "scope": SHEETS_SCOPE,
        "aud": token_uri,
        "iat": now,
        "exp": now + ASSERTION_LIFETIME_SECS,
    })
}
