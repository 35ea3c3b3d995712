//! Provider clients.
//!
//! Each provider is reached through an adapter implementing [`ComputeClient`].
//! Adapters are built from the validated configuration without touching the
//! network; the provider handle behind them is connected on first use. Tests
//! replace that handle through [`Backends`].

pub mod aws;
pub mod azure;
pub mod gcp;
mod http;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

pub use aws::{AwsAdapter, Ec2Api, RunInstancesSpec, SdkEc2Client};
pub use azure::{AzureAdapter, AzureRestClient, AzureVmApi, PendingVm, PollHandle};
pub use gcp::{GceApi, GceRestClient, GcpAdapter};

/// What a provider reported once the build call returned.
///
/// The three providers give different guarantees, so callers must match on
/// the variant rather than treat every outcome as a running machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The launch request was acknowledged; the instance may still be pending.
    Created {
        /// First instance id returned by the provider.
        instance_id: String,
    },
    /// A long-running operation was started and not awaited.
    Submitted {
        /// Operation name to poll.
        operation: String,
    },
    /// A long-running operation was awaited and succeeded.
    Completed {
        /// Full resource id of the created machine.
        resource_id: String,
    },
}

impl ProvisionOutcome {
    /// Returns the provider-native identifier.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        match self {
            Self::Created { instance_id } => instance_id,
            Self::Submitted { operation } => operation,
            Self::Completed { resource_id } => resource_id,
        }
    }

    /// Returns true only when the provider confirmed the machine exists.
    #[must_use]
    pub const fn guarantees_provisioned(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

impl std::fmt::Display for ProvisionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created { instance_id } => write!(f, "instance {instance_id} launched"),
            Self::Submitted { operation } => write!(f, "operation {operation} submitted"),
            Self::Completed { resource_id } => write!(f, "{resource_id} provisioned"),
        }
    }
}

/// A client able to create one compute instance.
#[async_trait]
pub trait ComputeClient: Send + Sync {
    /// Provider name used in logs.
    fn provider(&self) -> &'static str;

    /// Creates the configured instance.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication, a provider call or a local file
    /// operation fails.
    async fn build_compute_instance(&self) -> Result<ProvisionOutcome>;
}

/// Pre-built provider handles, used instead of connecting.
#[derive(Clone, Default)]
pub struct Backends {
    /// EC2 and SSM handle.
    pub ec2: Option<Arc<dyn Ec2Api>>,
    /// Compute Engine handle.
    pub gce: Option<Arc<dyn GceApi>>,
    /// Azure Resource Manager handle.
    pub azure: Option<Arc<dyn AzureVmApi>>,
}

impl Backends {
    /// Uses `api` for EC2.
    #[must_use]
    pub fn with_ec2(mut self, api: Arc<dyn Ec2Api>) -> Self {
        self.ec2 = Some(api);
        self
    }

    /// Uses `api` for Compute Engine.
    #[must_use]
    pub fn with_gce(mut self, api: Arc<dyn GceApi>) -> Self {
        self.gce = Some(api);
        self
    }

    /// Uses `api` for Azure.
    #[must_use]
    pub fn with_azure(mut self, api: Arc<dyn AzureVmApi>) -> Self {
        self.azure = Some(api);
        self
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("ec2", &self.ec2.is_some())
            .field("gce", &self.gce.is_some())
            .field("azure", &self.azure.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_completed_guarantees_provisioning() {
        let created = ProvisionOutcome::Created {
            instance_id: String::from("i-0abc"),
        };
        let submitted = ProvisionOutcome::Submitted {
            operation: String::from("operation-123"),
        };
        let completed = ProvisionOutcome::Completed {
            resource_id: String::from("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm1"),
        };

        assert!(!created.guarantees_provisioned());
        assert!(!submitted.guarantees_provisioned());
        assert!(completed.guarantees_provisioned());
        assert_eq!(submitted.resource_id(), "operation-123");
    }
}
