//! Azure Resource Manager REST client for virtual machines.

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::AzureAccessKey;
use crate::error::{ComputeError, ProviderError, Result};
use crate::provider::http;

use super::types::{AsyncOperationStatus, TokenResponse, VirtualMachine, VmResource};
use super::{AzureVmApi, PendingVm, PollHandle, PROVIDER};

/// Azure Resource Manager base URL.
pub const ARM_BASE_URL: &str = "https://management.azure.com";

/// Microsoft identity platform base URL.
pub const LOGIN_BASE_URL: &str = "https://login.microsoftonline.com";

/// Azure API version for Compute.
pub const COMPUTE_API_VERSION: &str = "2023-09-01";

/// Scope requested for Resource Manager tokens.
const ARM_SCOPE: &str = "https://management.azure.com/.default";

/// Polling interval when the provider gives no `Retry-After`.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Client-side limit on waiting for a long-running operation.
const DEFAULT_TIMEOUT_SECS: u64 = 30 * 60;

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";

/// Authenticated Resource Manager client.
#[derive(Clone)]
pub struct AzureRestClient {
    http: Client,
    arm_base_url: String,
    subscription_id: String,
    access_token: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl AzureRestClient {
    /// Authenticates the service principal against the public endpoints.
    ///
    /// # Errors
    ///
    /// Returns a credential error if the token request is rejected.
    pub async fn connect(auth: &AzureAccessKey) -> Result<Self> {
        Self::connect_with(auth, LOGIN_BASE_URL, ARM_BASE_URL).await
    }

    /// Authenticates against the given login and Resource Manager endpoints.
    ///
    /// # Errors
    ///
    /// Returns a credential error if the token request is rejected.
    pub async fn connect_with(
        auth: &AzureAccessKey,
        login_base_url: &str,
        arm_base_url: &str,
    ) -> Result<Self> {
        let http = http::build_client(PROVIDER)?;
        let access_token = request_token(&http, login_base_url, auth).await?;
        debug!("Authenticated to Azure subscription {}", auth.subscription_id);
        Ok(Self {
            http,
            arm_base_url: arm_base_url.trim_end_matches('/').to_string(),
            subscription_id: auth.subscription_id.clone(),
            access_token,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Creates a client with an existing token.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_token(
        arm_base_url: impl Into<String>,
        subscription_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            http: http::build_client(PROVIDER)?,
            arm_base_url: arm_base_url.into().trim_end_matches('/').to_string(),
            subscription_id: subscription_id.into(),
            access_token: access_token.into(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Sets the interval used when a poll response carries no `Retry-After`.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the client-side limit on waiting for completion.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn resource_id(&self, resource_group: &str, vm_name: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{resource_group}/providers/Microsoft.Compute/virtualMachines/{vm_name}",
            self.subscription_id
        )
    }

    fn resource_url(&self, resource_id: &str) -> String {
        format!(
            "{}{resource_id}?api-version={COMPUTE_API_VERSION}",
            self.arm_base_url
        )
    }

    async fn get(&self, url: &str) -> Result<Response> {
        debug!(url = %url, "GET request");
        self.http
            .get(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.access_token))
            .send()
            .await
            .map_err(|e| http::network_error(PROVIDER, &e))
    }

    /// Polls `handle` once. Returns `None` while the operation is still running.
    async fn poll_once(
        &self,
        pending: &PendingVm,
        handle: &PollHandle,
    ) -> Result<(Option<String>, Option<Duration>)> {
        let url = match handle {
            PollHandle::AsyncOperation(url) | PollHandle::Location(url) => url.clone(),
            PollHandle::Resource => self.resource_url(&pending.resource_id),
        };
        let response = self.get(&url).await?;
        let retry_after = retry_after(&response);

        let state = match handle {
            PollHandle::AsyncOperation(_) => {
                let status: AsyncOperationStatus = http::read_json(PROVIDER, response).await?;
                terminal_state(pending, &status.status, status.error.map(|e| e.to_string()))?
            }
            PollHandle::Location(_) => {
                let status = response.status();
                if status == StatusCode::ACCEPTED {
                    None
                } else if status.is_success() {
                    Some(pending.resource_id.clone())
                } else {
                    let body = response.text().await.unwrap_or_default();
                    return Err(http::error_from_body(PROVIDER, status, &body));
                }
            }
            PollHandle::Resource => {
                let vm: VmResource = http::read_json(PROVIDER, response).await?;
                match vm.provisioning_state() {
                    Some(state) => terminal_state(pending, state, None)?,
                    None => None,
                }
            }
        };
        Ok((state, retry_after))
    }
}

impl std::fmt::Debug for AzureRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureRestClient")
            .field("arm_base_url", &self.arm_base_url)
            .field("subscription_id", &self.subscription_id)
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AzureVmApi for AzureRestClient {
    async fn begin_create_or_update(
        &self,
        resource_group: &str,
        vm_name: &str,
        params: &VirtualMachine,
    ) -> Result<PendingVm> {
        let resource_id = self.resource_id(resource_group, vm_name);
        let url = self.resource_url(&resource_id);
        debug!(url = %url, "PUT request");

        let response = self
            .http
            .put(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.access_token))
            .json(params)
            .send()
            .await
            .map_err(|e| http::network_error(PROVIDER, &e))?;

        let poll = header_value(&response, ASYNC_OPERATION_HEADER)
            .map(PollHandle::AsyncOperation)
            .or_else(|| {
                header_value(&response, header::LOCATION.as_str()).map(PollHandle::Location)
            })
            .unwrap_or(PollHandle::Resource);
        let retry_after = retry_after(&response);

        let vm: VmResource = http::read_json(PROVIDER, response).await?;
        let provisioning_state = vm.provisioning_state().map(String::from);

        Ok(PendingVm {
            resource_id: vm.id.unwrap_or(resource_id),
            poll,
            retry_after,
            provisioning_state,
        })
    }

    async fn wait(&self, pending: &PendingVm) -> Result<String> {
        if let Some(state) = pending.provisioning_state.as_deref() {
            if let Some(done) = terminal_state(pending, state, None)? {
                return Ok(done);
            }
        }

        let started = Instant::now();
        let mut delay = pending.retry_after.unwrap_or(self.poll_interval);
        loop {
            let remaining = self.timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(ProviderError::Timeout {
                    provider: PROVIDER,
                    operation: pending.resource_id.clone(),
                    waited_secs: started.elapsed().as_secs(),
                }
                .into());
            }
            tokio::time::sleep(delay.min(remaining)).await;

            let (state, retry) = self.poll_once(pending, &pending.poll).await?;
            if let Some(resource_id) = state {
                info!("Operation on {resource_id} succeeded");
                return Ok(resource_id);
            }
            debug!("Operation on {} still running", pending.resource_id);
            delay = retry.unwrap_or(self.poll_interval);
        }
    }
}

/// Requests a Resource Manager token with the client-credentials grant.
///
/// # Errors
///
/// Returns a credential error if the identity platform rejects the request.
pub async fn request_token(
    http: &Client,
    login_base_url: &str,
    auth: &AzureAccessKey,
) -> Result<String> {
    let url = format!(
        "{}/{}/oauth2/v2.0/token",
        login_base_url.trim_end_matches('/'),
        auth.tenant
    );
    debug!(url = %url, "Requesting access token");

    let response = http
        .post(&url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", auth.client_id.as_str()),
            ("client_secret", auth.secret.as_str()),
            ("scope", ARM_SCOPE),
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

/// Maps a provisioning state: `Some(id)` on success, an error on failure,
/// `None` while still running.
fn terminal_state(pending: &PendingVm, state: &str, detail: Option<String>) -> Result<Option<String>> {
    match state {
        "Succeeded" => Ok(Some(pending.resource_id.clone())),
        "Failed" | "Canceled" => Err(ProviderError::OperationFailed {
            provider: PROVIDER,
            operation: pending.resource_id.clone(),
            status: state.to_string(),
            message: detail.unwrap_or_else(|| String::from("no detail")),
        }
        .into()),
        _ => Ok(None),
    }
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn retry_after(response: &Response) -> Option<Duration> {
    header_value(response, header::RETRY_AFTER.as_str())
        .and_then(|s| s.trim().parse().ok())
        .map(Duration::from_secs)
}
