//! GCP Compute Engine provider.
//!
//! Instance creation is a zonal long-running operation. The adapter starts it
//! and returns the operation name without waiting for it to finish.

pub mod auth;
mod client;
pub mod types;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::{GceConfig, GcpAccessKey};
use crate::error::{ComputeError, ProviderError, Result};

use super::{ComputeClient, ProvisionOutcome};

pub use client::{GceRestClient, COMPUTE_BASE_URL};
pub use types::{InstanceInsert, Operation};

/// Provider name used in errors and logs.
pub const PROVIDER: &str = "gcp";

/// The Compute Engine calls the adapter needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GceApi: Send + Sync {
    /// Starts `instances.insert` and returns the operation.
    async fn insert_instance(
        &self,
        project: &str,
        zone: &str,
        body: &InstanceInsert,
    ) -> Result<Operation>;
}

/// Compute Engine adapter.
pub struct GcpAdapter {
    config: GceConfig,
    auth: GcpAccessKey,
    api: OnceCell<Arc<dyn GceApi>>,
}

impl GcpAdapter {
    /// Creates an adapter that authenticates on first use.
    #[must_use]
    pub fn new(config: GceConfig, auth: GcpAccessKey) -> Self {
        Self {
            config,
            auth,
            api: OnceCell::new(),
        }
    }

    /// Creates an adapter that uses `api` instead of authenticating.
    #[must_use]
    pub fn with_api(config: GceConfig, auth: GcpAccessKey, api: Arc<dyn GceApi>) -> Self {
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
    /// Returns an error if the service-account key cannot be used.
    pub async fn connect(&self) -> Result<&Arc<dyn GceApi>> {
        self.api
            .get_or_try_init(|| async {
                let client = GceRestClient::connect(&self.auth).await?;
                Ok::<_, ComputeError>(Arc::new(client) as Arc<dyn GceApi>)
            })
            .await
    }
}

impl std::fmt::Debug for GcpAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpAdapter")
            .field("config", &self.config)
            .field("auth", &self.auth)
            .field("connected", &self.api.initialized())
            .finish()
    }
}

#[async_trait]
impl ComputeClient for GcpAdapter {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn build_compute_instance(&self) -> Result<ProvisionOutcome> {
        let api = self.connect().await?;
        let body = InstanceInsert::from_config(&self.config);

        info!(
            "Inserting {} ({}) in {}/{}",
            self.config.name, self.config.machine_type, self.config.project, self.config.zone
        );
        let operation = api
            .insert_instance(&self.config.project, &self.config.zone, &body)
            .await?;

        if operation.name.is_empty() {
            return Err(ProviderError::invalid_response(PROVIDER, "insert returned an unnamed operation").into());
        }
        info!("Operation {} submitted", operation.name);

        Ok(ProvisionOutcome::Submitted {
            operation: operation.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        GceMachineType, DEFAULT_GCE_DISK_SIZE, DEFAULT_GCE_DISK_TYPE, DEFAULT_GCE_NETWORK,
        DEFAULT_GCE_SOURCE_IMAGE,
    };
    use mockall::predicate::eq;

    fn gce_config() -> GceConfig {
        GceConfig {
            project: String::from("my-proj"),
            zone: String::from("us-central1-a"),
            name: String::from("worker-1"),
            machine_type: GceMachineType::N1Standard2,
            disk_type: String::from(DEFAULT_GCE_DISK_TYPE),
            disk_size: String::from(DEFAULT_GCE_DISK_SIZE),
            source_image: String::from(DEFAULT_GCE_SOURCE_IMAGE),
            network: String::from(DEFAULT_GCE_NETWORK),
        }
    }

    fn access_key() -> GcpAccessKey {
        GcpAccessKey {
            project_id: String::from("my-proj"),
            credentials_path: std::path::PathBuf::from("/nonexistent/sa.json"),
        }
    }

    #[tokio::test]
    async fn test_returns_operation_without_waiting() {
        let mut api = MockGceApi::new();
        api.expect_insert_instance()
            .with(eq("my-proj"), eq("us-central1-a"), mockall::predicate::always())
            .times(1)
            .returning(|_, _, body| {
                assert_eq!(body.machine_type, "zones/us-central1-a/machineTypes/n1-standard-2");
                Ok(Operation {
                    name: String::from("operation-123"),
                    status: Some(String::from("PENDING")),
                    target_link: None,
                })
            });

        let adapter = GcpAdapter::with_api(gce_config(), access_key(), Arc::new(api));
        let outcome = adapter.build_compute_instance().await.unwrap();
        assert_eq!(
            outcome,
            ProvisionOutcome::Submitted {
                operation: String::from("operation-123")
            }
        );
        assert!(!outcome.guarantees_provisioned());
    }

    #[tokio::test]
    async fn test_unreadable_key_file_fails_on_first_use() {
        let adapter = GcpAdapter::new(gce_config(), access_key());
        let err = adapter.build_compute_instance().await.unwrap_err();
        assert!(matches!(err, ComputeError::LocalIo { .. }));
    }
}
