//! Routing from a provider tag to its adapter.

use async_trait::async_trait;
use tracing::debug;

use crate::config::{AuthConfig, ComputeType, ProviderConfig};
use crate::error::{DispatchError, Result};
use crate::provider::{
    AwsAdapter, AzureAdapter, Backends, ComputeClient, GcpAdapter, ProvisionOutcome,
};

/// The supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// AWS EC2.
    Aws,
    /// GCP Compute Engine.
    Gcp,
    /// Azure Virtual Machines.
    Azure,
}

impl ProviderKind {
    /// Resolves a provider tag such as `ec2`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnsupportedProvider`] for any other tag.
    pub fn resolve(tag: &str) -> std::result::Result<Self, DispatchError> {
        tag.parse::<ComputeType>()
            .map(Self::from)
            .map_err(|_| DispatchError::UnsupportedProvider {
                tag: tag.to_string(),
            })
    }

    /// Provider name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Gcp => "gcp",
            Self::Azure => "azure",
        }
    }
}

impl From<ComputeType> for ProviderKind {
    fn from(value: ComputeType) -> Self {
        match value {
            ComputeType::Ec2 => Self::Aws,
            ComputeType::Gce => Self::Gcp,
            ComputeType::Avm => Self::Azure,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A constructed adapter for one provider.
#[derive(Debug)]
pub enum ProviderClient {
    /// EC2 adapter.
    Aws(AwsAdapter),
    /// Compute Engine adapter.
    Gcp(GcpAdapter),
    /// Azure adapter.
    Azure(AzureAdapter),
}

impl ProviderClient {
    /// Builds the adapter for `kind` from its configuration and credentials.
    ///
    /// Handles present in `backends` are used instead of connecting. Nothing
    /// touches the network here.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::VariantMismatch`] if either section belongs to
    /// another provider.
    pub fn construct(
        kind: ProviderKind,
        config: ProviderConfig,
        auth: AuthConfig,
        backends: Backends,
    ) -> std::result::Result<Self, DispatchError> {
        debug!("Constructing {kind} adapter");
        match (kind, config, auth) {
            (ProviderKind::Aws, ProviderConfig::Ec2(config), AuthConfig::Aws(auth)) => {
                Ok(Self::Aws(match backends.ec2 {
                    Some(api) => AwsAdapter::with_api(config, auth, api),
                    None => AwsAdapter::new(config, auth),
                }))
            }
            (ProviderKind::Gcp, ProviderConfig::Gce(config), AuthConfig::Gcp(auth)) => {
                Ok(Self::Gcp(match backends.gce {
                    Some(api) => GcpAdapter::with_api(config, auth, api),
                    None => GcpAdapter::new(config, auth),
                }))
            }
            (ProviderKind::Azure, ProviderConfig::Avm(config), AuthConfig::Azure(auth)) => {
                Ok(Self::Azure(match backends.azure {
                    Some(api) => AzureAdapter::with_api(config, auth, api),
                    None => AzureAdapter::new(config, auth),
                }))
            }
            (kind, config, auth) => {
                let (component, found) = if ProviderKind::from(config.compute_type()) == kind {
                    ("auth_config", auth.variant_name())
                } else {
                    ("compute_config", config.variant_name())
                };
                Err(DispatchError::VariantMismatch {
                    provider: kind.name(),
                    component,
                    found,
                })
            }
        }
    }

    /// Returns which provider this adapter talks to.
    #[must_use]
    pub const fn kind(&self) -> ProviderKind {
        match self {
            Self::Aws(_) => ProviderKind::Aws,
            Self::Gcp(_) => ProviderKind::Gcp,
            Self::Azure(_) => ProviderKind::Azure,
        }
    }
}

#[async_trait]
impl ComputeClient for ProviderClient {
    fn provider(&self) -> &'static str {
        self.kind().name()
    }

    async fn build_compute_instance(&self) -> Result<ProvisionOutcome> {
        match self {
            Self::Aws(adapter) => adapter.build_compute_instance().await,
            Self::Gcp(adapter) => adapter.build_compute_instance().await,
            Self::Azure(adapter) => adapter.build_compute_instance().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AvmConfig, AvmSize, AwsAccessKey, AzureAccessKey, Ec2Ami, Ec2Config, Ec2InstanceType,
        GceConfig, GceMachineType, GcpAccessKey, DEFAULT_AWS_REGION,
    };
    use crate::provider::gcp::MockGceApi;
    use crate::provider::gcp::Operation;
    use std::sync::Arc;

    fn ec2() -> ProviderConfig {
        ProviderConfig::Ec2(Ec2Config {
            image_id: Ec2Ami::AmazonLinux2,
            instance_type: Ec2InstanceType::T3Micro,
            key_name: String::from("k1"),
            min_instance_count: 1,
            max_instance_count: 1,
            region_name: String::from(DEFAULT_AWS_REGION),
            security_group_ids: Vec::new(),
            create_key_pair: false,
            key_pair_dir: None,
            launch_options: None,
        })
    }

    fn aws_auth() -> AuthConfig {
        AuthConfig::Aws(AwsAccessKey {
            aws_access_key_id: String::from("AKIAEXAMPLE"),
            aws_secret_access_key: String::from("secret"),
            region_name: String::from(DEFAULT_AWS_REGION),
        })
    }

    fn gce() -> ProviderConfig {
        ProviderConfig::Gce(GceConfig {
            project: String::from("my-proj"),
            zone: String::from("us-central1-a"),
            name: String::from("worker-1"),
            machine_type: GceMachineType::E2Medium,
            disk_type: String::from("pd-standard"),
            disk_size: String::from("100GB"),
            source_image: String::from("projects/debian-cloud/global/images/family/debian-12"),
            network: String::from("default"),
        })
    }

    fn gcp_auth() -> AuthConfig {
        AuthConfig::Gcp(GcpAccessKey {
            project_id: String::from("my-proj"),
            credentials_path: std::path::PathBuf::from("/secrets/sa.json"),
        })
    }

    fn azure_auth() -> AuthConfig {
        AuthConfig::Azure(AzureAccessKey {
            subscription_id: String::from("sub"),
            client_id: String::from("client"),
            secret: String::from("secret"),
            tenant: String::from("tenant"),
        })
    }

    #[test]
    fn test_resolve_known_tags() {
        assert_eq!(ProviderKind::resolve("ec2").unwrap(), ProviderKind::Aws);
        assert_eq!(ProviderKind::resolve("gce").unwrap(), ProviderKind::Gcp);
        assert_eq!(ProviderKind::resolve("avm").unwrap(), ProviderKind::Azure);
    }

    #[test]
    fn test_resolve_unknown_tag() {
        for tag in ["lightsail", "EC2", "", "aws"] {
            let err = ProviderKind::resolve(tag).unwrap_err();
            assert!(
                matches!(&err, DispatchError::UnsupportedProvider { tag: t } if t == tag),
                "{tag}: {err}"
            );
        }
    }

    #[test]
    fn test_construct_matching_pairs() {
        let client =
            ProviderClient::construct(ProviderKind::Aws, ec2(), aws_auth(), Backends::default())
                .unwrap();
        assert_eq!(client.kind(), ProviderKind::Aws);

        let client =
            ProviderClient::construct(ProviderKind::Gcp, gce(), gcp_auth(), Backends::default())
                .unwrap();
        assert_eq!(client.provider(), "gcp");

        let avm = ProviderConfig::Avm(AvmConfig {
            resource_group_name: String::from("rg1"),
            vm_name: String::from("vm1"),
            admin_username: String::from("azureuser"),
            size: AvmSize::StandardB2s,
            location: String::from("West US"),
        });
        let client =
            ProviderClient::construct(ProviderKind::Azure, avm, azure_auth(), Backends::default())
                .unwrap();
        assert_eq!(client.kind(), ProviderKind::Azure);
    }

    #[test]
    fn test_construct_rejects_wrong_config_variant() {
        let err =
            ProviderClient::construct(ProviderKind::Aws, gce(), aws_auth(), Backends::default())
                .unwrap_err();
        match err {
            DispatchError::VariantMismatch {
                provider,
                component,
                found,
            } => {
                assert_eq!(provider, "aws");
                assert_eq!(component, "compute_config");
                assert_eq!(found, "gce");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_construct_rejects_wrong_auth_variant() {
        let err =
            ProviderClient::construct(ProviderKind::Gcp, gce(), azure_auth(), Backends::default())
                .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::VariantMismatch {
                component: "auth_config",
                found: "azure",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_constructed_client_uses_injected_backend() {
        let mut api = MockGceApi::new();
        api.expect_insert_instance().times(1).returning(|_, _, _| {
            Ok(Operation {
                name: String::from("operation-9"),
                status: None,
                target_link: None,
            })
        });
        let backends = Backends::default().with_gce(Arc::new(api));

        let client =
            ProviderClient::construct(ProviderKind::Gcp, gce(), gcp_auth(), backends).unwrap();
        let outcome = client.build_compute_instance().await.unwrap();
        assert_eq!(outcome.resource_id(), "operation-9");
    }
}
