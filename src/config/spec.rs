//! Top-level request document.
//!
//! A request names the instance, picks a provider and carries exactly one
//! provider section and one credential section. The provider and credential
//! enums are serialized untagged so a request round-trips through the same
//! YAML shape it was read from.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{ComputeError, Result};

use super::aws::{AwsAccessKey, Ec2Config};
use super::azure::{AvmConfig, AzureAccessKey};
use super::gcp::{GceConfig, GcpAccessKey};

string_enum! {
    /// Provider tag carried in `compute_type`.
    pub enum ComputeType {
        /// AWS EC2.
        Ec2 => "ec2",
        /// GCP Compute Engine.
        Gce => "gce",
        /// Azure Virtual Machines.
        Avm => "avm",
    }
}

impl ComputeType {
    /// Provider name used in logs and error messages.
    #[must_use]
    pub const fn provider_name(self) -> &'static str {
        match self {
            Self::Ec2 => "aws",
            Self::Gce => "gcp",
            Self::Avm => "azure",
        }
    }
}

/// A validated provisioning request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputeRequest {
    /// Logical name of the request.
    pub compute_name: String,
    /// Provider tag.
    pub compute_type: ComputeType,
    /// Provider-specific instance parameters.
    pub compute_config: ProviderConfig,
    /// Provider-specific credentials.
    pub auth_config: AuthConfig,
}

impl ComputeRequest {
    /// Renders the request as a configuration document.
    ///
    /// Every `$` in a string value is written as `$$`, so validating the
    /// document again yields this request unchanged.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the request cannot be serialized.
    pub fn to_document(&self) -> Result<Value> {
        let mut doc = serde_yaml::to_value(self)
            .map_err(|e| ComputeError::internal(format!("failed to serialize request: {e}")))?;
        super::interpolate::escape_placeholders(&mut doc);
        Ok(doc)
    }
}

/// Provider-specific instance parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    /// EC2 parameters.
    Ec2(Ec2Config),
    /// Compute Engine parameters.
    Gce(GceConfig),
    /// Azure VM parameters.
    Avm(AvmConfig),
}

impl ProviderConfig {
    /// Provider tag this section belongs to.
    #[must_use]
    pub const fn compute_type(&self) -> ComputeType {
        match self {
            Self::Ec2(_) => ComputeType::Ec2,
            Self::Gce(_) => ComputeType::Gce,
            Self::Avm(_) => ComputeType::Avm,
        }
    }

    /// Variant name used in mismatch errors.
    #[must_use]
    pub const fn variant_name(&self) -> &'static str {
        match self {
            Self::Ec2(_) => "ec2",
            Self::Gce(_) => "gce",
            Self::Avm(_) => "avm",
        }
    }
}

/// Provider-specific credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AuthConfig {
    /// AWS static access key.
    Aws(AwsAccessKey),
    /// GCP service account.
    Gcp(GcpAccessKey),
    /// Azure service principal.
    Azure(AzureAccessKey),
}

impl AuthConfig {
    /// Provider tag these credentials belong to.
    #[must_use]
    pub const fn compute_type(&self) -> ComputeType {
        match self {
            Self::Aws(_) => ComputeType::Ec2,
            Self::Gcp(_) => ComputeType::Gce,
            Self::Azure(_) => ComputeType::Avm,
        }
    }

    /// Variant name used in mismatch errors.
    #[must_use]
    pub const fn variant_name(&self) -> &'static str {
        match self {
            Self::Aws(_) => "aws",
            Self::Gcp(_) => "gcp",
            Self::Azure(_) => "azure",
        }
    }
}
