//! Azure Resource Manager request and response models.

use serde::{Deserialize, Serialize};

use crate::config::AvmConfig;

/// Body of a virtual machine PUT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualMachine {
    /// ARM location.
    pub location: String,
    /// VM properties.
    pub properties: VmProperties,
}

/// Virtual machine properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmProperties {
    /// Hardware profile.
    pub hardware_profile: HardwareProfile,
    /// OS profile.
    pub os_profile: OsProfile,
}

/// Hardware profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    /// VM size.
    pub vm_size: String,
}

/// OS profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OsProfile {
    /// Host name.
    pub computer_name: String,
    /// Administrator account.
    pub admin_username: String,
}

impl VirtualMachine {
    /// Builds the PUT body for `config`.
    #[must_use]
    pub fn from_config(config: &AvmConfig) -> Self {
        Self {
            location: config.arm_location(),
            properties: VmProperties {
                hardware_profile: HardwareProfile {
                    vm_size: config.size.to_string(),
                },
                os_profile: OsProfile {
                    computer_name: config.vm_name.clone(),
                    admin_username: config.admin_username.clone(),
                },
            },
        }
    }
}

/// The parts of a VM resource read back from ARM.
#[derive(Debug, Clone, Deserialize)]
pub struct VmResource {
    /// Full resource id.
    #[serde(default)]
    pub id: Option<String>,
    /// Resource properties.
    #[serde(default)]
    pub properties: Option<VmResourceProperties>,
}

/// VM resource properties.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmResourceProperties {
    /// `Creating`, `Updating`, `Succeeded`, `Failed` or `Canceled`.
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

impl VmResource {
    /// Returns the provisioning state, if reported.
    #[must_use]
    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.provisioning_state.as_deref())
    }
}

/// Body returned by an `Azure-AsyncOperation` URL.
#[derive(Debug, Clone, Deserialize)]
pub struct AsyncOperationStatus {
    /// `InProgress`, `Succeeded`, `Failed` or `Canceled`.
    pub status: String,
    /// Failure detail.
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

/// ARM error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Error message.
    #[serde(default)]
    pub message: Option<String>,
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{code}: {message}"),
            (Some(text), None) | (None, Some(text)) => f.write_str(text),
            (None, None) => f.write_str("no detail"),
        }
    }
}

/// OAuth token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token.
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AvmSize;

    #[test]
    fn test_vm_body_shape() {
        let config = AvmConfig {
            resource_group_name: String::from("rg1"),
            vm_name: String::from("vm1"),
            admin_username: String::from("azureuser"),
            size: AvmSize::StandardD2sV3,
            location: String::from("West US"),
        };
        let body = serde_json::to_value(VirtualMachine::from_config(&config)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "location": "westus",
                "properties": {
                    "hardwareProfile": {"vmSize": "Standard_D2s_v3"},
                    "osProfile": {"computerName": "vm1", "adminUsername": "azureuser"}
                }
            })
        );
    }
}
