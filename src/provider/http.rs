//! Shared plumbing for the REST providers.

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

use crate::error::{ComputeError, ProviderError, Result};

/// Default timeout for a single API request.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Builds the HTTP client used by the REST providers.
pub(crate) fn build_client(provider: &'static str) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| {
            ProviderError::network(provider, format!("Failed to create HTTP client: {e}")).into()
        })
}

/// Maps a transport failure.
pub(crate) fn network_error(provider: &'static str, err: &reqwest::Error) -> ComputeError {
    ProviderError::network(provider, format!("Request failed: {err}")).into()
}

/// Reads a JSON body from a successful response, or maps the error response.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: &'static str,
    response: Response,
) -> Result<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| network_error(provider, &e))?;

    if !status.is_success() {
        return Err(error_from_body(provider, status, &text));
    }

    serde_json::from_str(&text).map_err(|e| {
        warn!(error = %e, "Failed to parse {provider} response");
        ProviderError::invalid_response(provider, format!("Failed to parse response: {e}")).into()
    })
}

/// Maps an error response to a credential or API error.
///
/// Only a 401 means the credentials were rejected. A 403 is a permission
/// failure of valid credentials and stays an API error with its code.
///
/// Understands the `{"error": {"code", "message", "status"}}` shape used by
/// both GCP and ARM, and the `{"error", "error_description"}` shape used by
/// OAuth token endpoints. Anything else is passed through verbatim.
pub(crate) fn error_from_body(provider: &'static str, status: StatusCode, body: &str) -> ComputeError {
    let (code, message) = parse_error_body(body);
    let message = message.unwrap_or_else(|| {
        if body.is_empty() {
            status.to_string()
        } else {
            body.to_string()
        }
    });

    if status == StatusCode::UNAUTHORIZED {
        return ComputeError::credential(provider, message);
    }
    ProviderError::api(provider, Some(status.as_u16()), code, message).into()
}

fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return (None, None);
    };
    match json.get("error") {
        Some(serde_json::Value::Object(error)) => {
            let code = error
                .get("status")
                .or_else(|| error.get("code"))
                .and_then(|c| match c {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });
            let message = error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(String::from);
            (code, message)
        }
        Some(serde_json::Value::String(code)) => {
            let message = json
                .get("error_description")
                .and_then(serde_json::Value::as_str)
                .map(String::from);
            (Some(code.clone()), message)
        }
        _ => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcp_error_shape() {
        let body = r#"{"error":{"code":400,"message":"Invalid value for field 'resource.name'","status":"INVALID_ARGUMENT"}}"#;
        let err = error_from_body("gcp", StatusCode::BAD_REQUEST, body);
        match err {
            ComputeError::Provider(ProviderError::Api {
                status,
                code,
                message,
                ..
            }) => {
                assert_eq!(status, Some(400));
                assert_eq!(code.as_deref(), Some("INVALID_ARGUMENT"));
                assert_eq!(message, "Invalid value for field 'resource.name'");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_oauth_rejection_is_credential_error() {
        let body = r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret provided."}"#;
        let err = error_from_body("azure", StatusCode::UNAUTHORIZED, body);
        assert!(matches!(err, ComputeError::Credential { provider: "azure", .. }));
        assert!(err.to_string().contains("AADSTS7000215"));
    }

    #[test]
    fn test_forbidden_keeps_permission_code() {
        let body = r#"{"error":{"code":"AuthorizationFailed","message":"The client does not have authorization to perform action 'Microsoft.Compute/virtualMachines/write'"}}"#;
        let err = error_from_body("azure", StatusCode::FORBIDDEN, body);
        match &err {
            ComputeError::Provider(ProviderError::Api { status, code, .. }) => {
                assert_eq!(*status, Some(403));
                assert_eq!(code.as_deref(), Some("AuthorizationFailed"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_unstructured_body_passes_through() {
        let err = error_from_body("gcp", StatusCode::BAD_GATEWAY, "upstream unavailable");
        assert!(err.to_string().contains("upstream unavailable"));
    }
}
