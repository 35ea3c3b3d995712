//! Azure Virtual Machines provider.
//!
//! Creation is a Resource Manager long-running operation. Unlike the other
//! providers the adapter blocks until the operation reaches a terminal state.

mod client;
pub mod types;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::{AvmConfig, AzureAccessKey};
use crate::error::{ComputeError, Result};

use super::{ComputeClient, ProvisionOutcome};

pub use client::{request_token, AzureRestClient, ARM_BASE_URL, COMPUTE_API_VERSION, LOGIN_BASE_URL};
pub use types::VirtualMachine;

/// Provider name used in errors and logs.
pub const PROVIDER: &str = "azure";

/// Where to poll a started operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollHandle {
    /// `Azure-AsyncOperation` URL returning a status document.
    AsyncOperation(String),
    /// `Location` URL answering 202 until done.
    Location(String),
    /// No polling URL; read the resource's provisioning state.
    Resource,
}

/// A create-or-update that has been accepted but may not be finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVm {
    /// Full ARM resource id of the VM.
    pub resource_id: String,
    /// How to follow the operation.
    pub poll: PollHandle,
    /// Provider-suggested delay before the first poll.
    pub retry_after: Option<Duration>,
    /// Provisioning state in the initial response.
    pub provisioning_state: Option<String>,
}

/// The Resource Manager calls the adapter needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AzureVmApi: Send + Sync {
    /// Starts creating or updating `vm_name` in `resource_group`.
    async fn begin_create_or_update(
        &self,
        resource_group: &str,
        vm_name: &str,
        params: &VirtualMachine,
    ) -> Result<PendingVm>;

    /// Waits for `pending` to finish and returns the resource id.
    async fn wait(&self, pending: &PendingVm) -> Result<String>;
}

/// Azure VM adapter.
pub struct AzureAdapter {
    config: AvmConfig,
    auth: AzureAccessKey,
    api: OnceCell<Arc<dyn AzureVmApi>>,
}

impl AzureAdapter {
    /// Creates an adapter that authenticates on first use.
    #[must_use]
    pub fn new(config: AvmConfig, auth: AzureAccessKey) -> Self {
        Self {
            config,
            auth,
            api: OnceCell::new(),
        }
    }

    /// Creates an adapter that uses `api` instead of authenticating.
    #[must_use]
    pub fn with_api(config: AvmConfig, auth: AzureAccessKey, api: Arc<dyn AzureVmApi>) -> Self {
        Self {
            config,
            auth,
            api: OnceCell::from(api),
        }
    }

    /// Returns the authenticated provider handle.
    ///
    /// # Errors
    ///
    /// Returns a credential error if the service principal is rejected.
    pub async fn connect(&self) -> Result<&Arc<dyn AzureVmApi>> {
        self.api
            .get_or_try_init(|| async {
                let client = AzureRestClient::connect(&self.auth).await?;
                Ok::<_, ComputeError>(Arc::new(client) as Arc<dyn AzureVmApi>)
            })
            .await
    }
}

impl std::fmt::Debug for AzureAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureAdapter")
            .field("config", &self.config)
            .field("auth", &self.auth)
            .field("connected", &self.api.initialized())
            .finish()
    }
}

#[async_trait]
impl ComputeClient for AzureAdapter {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn build_compute_instance(&self) -> Result<ProvisionOutcome> {
        let api = self.connect().await?;
        let params = VirtualMachine::from_config(&self.config);

        info!(
            "Creating VM {} ({}) in {}",
            self.config.vm_name, self.config.size, self.config.resource_group_name
        );
        let pending = api
            .begin_create_or_update(&self.config.resource_group_name, &self.config.vm_name, &params)
            .await?;

        info!("Waiting for {}", pending.resource_id);
        let resource_id = api.wait(&pending).await?;
        info!("VM {} provisioned", self.config.vm_name);

        Ok(ProvisionOutcome::Completed { resource_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AvmSize;
    use crate::error::ProviderError;
    use mockall::predicate::{always, eq};

    const RESOURCE_ID: &str =
        "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/vm1";

    fn avm_config() -> AvmConfig {
        AvmConfig {
            resource_group_name: String::from("rg1"),
            vm_name: String::from("vm1"),
            admin_username: String::from("azureuser"),
            size: AvmSize::StandardB1s,
            location: String::from("West US"),
        }
    }

    fn access_key() -> AzureAccessKey {
        AzureAccessKey {
            subscription_id: String::from("sub"),
            client_id: String::from("client"),
            secret: String::from("secret"),
            tenant: String::from("tenant"),
        }
    }

    fn pending() -> PendingVm {
        PendingVm {
            resource_id: String::from(RESOURCE_ID),
            poll: PollHandle::Resource,
            retry_after: None,
            provisioning_state: Some(String::from("Creating")),
        }
    }

    #[tokio::test]
    async fn test_blocks_until_completed() {
        let mut api = MockAzureVmApi::new();
        let mut seq = mockall::Sequence::new();
        api.expect_begin_create_or_update()
            .with(eq("rg1"), eq("vm1"), always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, params| {
                assert_eq!(params.location, "westus");
                assert_eq!(params.properties.hardware_profile.vm_size, "Standard_B1s");
                Ok(pending())
            });
        api.expect_wait()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|p| Ok(p.resource_id.clone()));

        let adapter = AzureAdapter::with_api(avm_config(), access_key(), Arc::new(api));
        let outcome = adapter.build_compute_instance().await.unwrap();
        assert_eq!(
            outcome,
            ProvisionOutcome::Completed {
                resource_id: String::from(RESOURCE_ID)
            }
        );
        assert!(outcome.guarantees_provisioned());
    }

    #[tokio::test]
    async fn test_failed_wait_propagates() {
        let mut api = MockAzureVmApi::new();
        api.expect_begin_create_or_update()
            .returning(|_, _, _| Ok(pending()));
        api.expect_wait().returning(|p| {
            Err(ProviderError::OperationFailed {
                provider: PROVIDER,
                operation: p.resource_id.clone(),
                status: String::from("Failed"),
                message: String::from("SkuNotAvailable"),
            }
            .into())
        });

        let adapter = AzureAdapter::with_api(avm_config(), access_key(), Arc::new(api));
        let err = adapter.build_compute_instance().await.unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().contains("SkuNotAvailable"));
    }

    #[tokio::test]
    async fn test_rejected_start_skips_wait() {
        let mut api = MockAzureVmApi::new();
        api.expect_begin_create_or_update()
            .returning(|_, _, _| Err(ComputeError::credential(PROVIDER, "InvalidAuthenticationToken")));
        api.expect_wait().never();

        let adapter = AzureAdapter::with_api(avm_config(), access_key(), Arc::new(api));
        let err = adapter.build_compute_instance().await.unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
