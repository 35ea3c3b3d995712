//! Compute Engine v1 REST client.

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use crate::config::GcpAccessKey;
use crate::error::Result;
use crate::provider::http;

use super::auth;
use super::types::{InstanceInsert, Operation};
use super::{GceApi, PROVIDER};

/// Compute Engine API base URL.
pub const COMPUTE_BASE_URL: &str = "https://compute.googleapis.com/compute/v1";

/// Authenticated Compute Engine client.
#[derive(Clone)]
pub struct GceRestClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl GceRestClient {
    /// Authenticates with the service-account key and targets the public API.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be read or the token exchange fails.
    pub async fn connect(auth: &GcpAccessKey) -> Result<Self> {
        let http = http::build_client(PROVIDER)?;
        let access_token = auth::fetch_access_token(&http, &auth.credentials_path).await?;
        debug!("Authenticated to GCP project {}", auth.project_id);
        Ok(Self {
            http,
            base_url: String::from(COMPUTE_BASE_URL),
            access_token,
        })
    }

    /// Creates a client with an existing token against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_token(base_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: http::build_client(PROVIDER)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }
}

impl std::fmt::Debug for GceRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GceRestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GceApi for GceRestClient {
    async fn insert_instance(
        &self,
        project: &str,
        zone: &str,
        body: &InstanceInsert,
    ) -> Result<Operation> {
        let url = format!("{}/projects/{project}/zones/{zone}/instances", self.base_url);
        debug!(url = %url, "POST request");

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.access_token))
            .json(body)
            .send()
            .await
            .map_err(|e| http::network_error(PROVIDER, &e))?;

        http::read_json(PROVIDER, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GceConfig, GceMachineType};
    use crate::error::{ComputeError, ProviderError};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn insert_body() -> InstanceInsert {
        InstanceInsert::from_config(&GceConfig {
            project: String::from("my-proj"),
            zone: String::from("us-central1-a"),
            name: String::from("worker-1"),
            machine_type: GceMachineType::N1Standard1,
            disk_type: String::from("pd-standard"),
            disk_size: String::from("100GB"),
            source_image: String::from("projects/debian-cloud/global/images/family/debian-12"),
            network: String::from("default"),
        })
    }

    #[tokio::test]
    async fn test_insert_posts_body_and_returns_operation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/projects/my-proj/zones/us-central1-a/instances"))
            .and(header("authorization", "Bearer ya29.token"))
            .and(body_partial_json(serde_json::json!({
                "name": "worker-1",
                "machineType": "zones/us-central1-a/machineTypes/n1-standard-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "compute#operation",
                "name": "operation-1700000000000-abc",
                "status": "RUNNING",
                "targetLink": "https://compute.googleapis.com/compute/v1/projects/my-proj/zones/us-central1-a/instances/worker-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GceRestClient::with_token(server.uri(), "ya29.token").unwrap();
        let operation = client
            .insert_instance("my-proj", "us-central1-a", &insert_body())
            .await
            .unwrap();
        assert_eq!(operation.name, "operation-1700000000000-abc");
        assert_eq!(operation.status.as_deref(), Some("RUNNING"));
    }

    #[tokio::test]
    async fn test_api_error_detail_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error": {
                    "code": 409,
                    "message": "The resource 'projects/my-proj/zones/us-central1-a/instances/worker-1' already exists",
                    "status": "ALREADY_EXISTS"
                }
            })))
            .mount(&server)
            .await;

        let client = GceRestClient::with_token(server.uri(), "ya29.token").unwrap();
        let err = client
            .insert_instance("my-proj", "us-central1-a", &insert_body())
            .await
            .unwrap_err();
        match err {
            ComputeError::Provider(ProviderError::Api { status, code, message, .. }) => {
                assert_eq!(status, Some(409));
                assert_eq!(code.as_deref(), Some("ALREADY_EXISTS"));
                assert!(message.contains("already exists"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_permission_denied_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"code": 403, "message": "Required 'compute.instances.create' permission", "status": "PERMISSION_DENIED"}
            })))
            .mount(&server)
            .await;

        let client = GceRestClient::with_token(server.uri(), "ya29.token").unwrap();
        let err = client
            .insert_instance("my-proj", "us-central1-a", &insert_body())
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            ComputeError::Provider(ProviderError::Api { status: Some(403), code: Some(code), .. })
                if code == "PERMISSION_DENIED"
        ));
        assert_eq!(err.exit_code(), 5);
    }

    #[tokio::test]
    async fn test_unauthorized_is_credential_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"code": 401, "message": "Request had invalid authentication credentials.", "status": "UNAUTHENTICATED"}
            })))
            .mount(&server)
            .await;

        let client = GceRestClient::with_token(server.uri(), "ya29.expired").unwrap();
        let err = client
            .insert_instance("my-proj", "us-central1-a", &insert_body())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
