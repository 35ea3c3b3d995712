//! Compute Engine and OAuth request and response models.

use serde::{Deserialize, Serialize};

use crate::config::GceConfig;

/// Body of `instances.insert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInsert {
    /// Instance name.
    pub name: String,
    /// Partial URL of the machine type.
    pub machine_type: String,
    /// Attached disks.
    pub disks: Vec<AttachedDisk>,
    /// Network interfaces.
    pub network_interfaces: Vec<NetworkInterface>,
}

/// An attached disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDisk {
    /// Boot disk.
    pub boot: bool,
    /// Delete with the instance.
    pub auto_delete: bool,
    /// Disk creation parameters.
    pub initialize_params: InitializeParams,
}

/// Disk creation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Size in GB (int64 is carried as a string in the JSON API).
    pub disk_size_gb: String,
    /// Partial URL of the disk type.
    pub disk_type: String,
    /// Boot image.
    pub source_image: String,
}

/// A network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    /// Partial URL of the network.
    pub network: String,
    /// External access.
    pub access_configs: Vec<AccessConfig>,
}

/// External access configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessConfig {
    /// Config name.
    pub name: String,
    /// Access type.
    #[serde(rename = "type")]
    pub kind: String,
}

impl InstanceInsert {
    /// Builds the insert body for `config`.
    #[must_use]
    pub fn from_config(config: &GceConfig) -> Self {
        let disk_size_gb = config
            .disk_size_gb()
            .map_or_else(|| config.disk_size.trim_end_matches("GB").to_string(), |gb| gb.to_string());
        Self {
            name: config.name.clone(),
            machine_type: format!("zones/{}/machineTypes/{}", config.zone, config.machine_type),
            disks: vec![AttachedDisk {
                boot: true,
                auto_delete: true,
                initialize_params: InitializeParams {
                    disk_size_gb,
                    disk_type: format!("zones/{}/diskTypes/{}", config.zone, config.disk_type),
                    source_image: config.source_image.clone(),
                },
            }],
            network_interfaces: vec![NetworkInterface {
                network: network_url(&config.network),
                access_configs: vec![AccessConfig {
                    name: String::from("External NAT"),
                    kind: String::from("ONE_TO_ONE_NAT"),
                }],
            }],
        }
    }
}

fn network_url(network: &str) -> String {
    if network.contains('/') {
        network.to_string()
    } else {
        format!("global/networks/{network}")
    }
}

/// A zonal operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Operation name.
    pub name: String,
    /// `PENDING`, `RUNNING` or `DONE`.
    #[serde(default)]
    pub status: Option<String>,
    /// Resource the operation acts on.
    #[serde(default)]
    pub target_link: Option<String>,
}

/// The fields of a service-account key file that are needed to authenticate.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service account email.
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    /// Token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    String::from("https://oauth2.googleapis.com/token")
}

/// OAuth token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token.
    pub access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}
