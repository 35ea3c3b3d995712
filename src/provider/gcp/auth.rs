//! Service-account authentication for Google APIs.
//!
//! A short-lived RS256 assertion signed with the service-account key is
//! exchanged at the key's token endpoint for an OAuth2 access token.

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

use crate::error::{ComputeError, Result};
use crate::provider::http;

use super::types::{ServiceAccountKey, TokenResponse};
use super::PROVIDER;

/// Scope granting read/write access to Compute Engine.
pub const COMPUTE_SCOPE: &str = "https://www.googleapis.com/auth/compute";

/// Lifetime of the signed assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Reads a service-account key file.
///
/// # Errors
///
/// Returns a local I/O error if the file cannot be read and a credential
/// error if it is not a service-account key.
pub async fn load_service_account(path: &Path) -> Result<ServiceAccountKey> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ComputeError::local_io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        ComputeError::credential(
            PROVIDER,
            format!("{} is not a service-account key: {e}", path.display()),
        )
    })
}

/// Signs the token-request assertion for `key`, issued at `now` (unix seconds).
///
/// # Errors
///
/// Returns a credential error if the private key cannot be used.
pub fn sign_assertion(key: &ServiceAccountKey, now: i64) -> Result<String> {
    let claims = Claims {
        iss: &key.client_email,
        scope: COMPUTE_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
        ComputeError::credential(PROVIDER, format!("invalid service-account private key: {e}"))
    })?;
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key).map_err(|e| {
        ComputeError::credential(PROVIDER, format!("failed to sign token assertion: {e}"))
    })
}

/// Exchanges a signed assertion for an access token.
///
/// # Errors
///
/// Returns a credential error if the endpoint rejects the assertion.
pub async fn exchange_assertion(http: &Client, token_uri: &str, assertion: &str) -> Result<String> {
    debug!("Requesting access token from {token_uri}");
    let response = http
        .post(token_uri)
        .form(&[
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion),
        ])
        .send()
        .await
        .map_err(|e| http::network_error(PROVIDER, &e))?;

    if response.status().is_client_error() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(match http::error_from_body(PROVIDER, status, &body) {
            credential @ ComputeError::Credential { .. } => credential,
            other => ComputeError::credential(PROVIDER, other.to_string()),
        });
    }

    let token: TokenResponse = http::read_json(PROVIDER, response).await?;
    Ok(token.access_token)
}

/// Authenticates with the key file at `path`.
///
/// # Errors
///
/// Returns an error if the key cannot be read, signed or exchanged.
pub async fn fetch_access_token(http: &Client, path: &Path) -> Result<String> {
    let key = load_service_account(path).await?;
    let assertion = sign_assertion(&key, chrono::Utc::now().timestamp())?;
    exchange_assertion(http, &key.token_uri, &assertion).await
}
