//! Azure virtual machine parameters and service-principal credentials.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::schema::{FieldKind, FieldSpec, Schema};

/// Location used when `location` is omitted.
pub const DEFAULT_AZURE_LOCATION: &str = "West US";

/// Usernames Azure refuses for the VM administrator.
const RESERVED_ADMIN_USERNAMES: &[&str] = &[
    "1",
    "123",
    "a",
    "actuser",
    "adm",
    "admin",
    "admin1",
    "admin2",
    "administrator",
    "aspnet",
    "backup",
    "console",
    "david",
    "guest",
    "john",
    "owner",
    "root",
    "server",
    "sql",
    "support",
    "support_388945a0",
    "sys",
    "test",
    "test1",
    "test2",
    "test3",
    "user",
    "user1",
    "user2",
    "user3",
    "user4",
    "user5",
];

string_enum! {
    /// Azure VM sizes accepted by the launcher.
    pub enum AvmSize {
        /// 1 vCPU, 1 GiB, burstable.
        StandardB1s => "Standard_B1s",
        /// 2 vCPU, 4 GiB, burstable.
        StandardB2s => "Standard_B2s",
        /// 2 vCPU, 8 GiB.
        StandardD2sV3 => "Standard_D2s_v3",
        /// 4 vCPU, 16 GiB.
        StandardD4sV3 => "Standard_D4s_v3",
        /// 8 vCPU, 32 GiB.
        StandardD8sV3 => "Standard_D8s_v3",
        /// 2 vCPU, 8 GiB.
        StandardD2sV5 => "Standard_D2s_v5",
        /// 4 vCPU, 16 GiB.
        StandardD4sV5 => "Standard_D4s_v5",
    }
}

/// Azure virtual machine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AvmConfig {
    /// Resource group that receives the VM.
    #[validate(custom(function = "validate_resource_group"))]
    pub resource_group_name: String,
    /// VM name, also used as the computer name.
    #[validate(custom(function = "validate_vm_name"))]
    pub vm_name: String,
    /// Administrator account name.
    #[validate(custom(function = "validate_admin_username"))]
    pub admin_username: String,
    /// VM size.
    pub size: AvmSize,
    /// Azure region, display name or short form.
    #[serde(default = "default_location")]
    #[validate(length(min = 1, message = "location cannot be empty"))]
    pub location: String,
}

impl AvmConfig {
    /// Location in the short form ARM expects (`West US` becomes `westus`).
    #[must_use]
    pub fn arm_location(&self) -> String {
        self.location
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect()
    }
}

/// Azure service-principal credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AzureAccessKey {
    /// Subscription that is billed.
    #[validate(length(min = 1, message = "subscription_id cannot be empty"))]
    pub subscription_id: String,
    /// Application (client) id.
    #[validate(length(min = 1, message = "client_id cannot be empty"))]
    pub client_id: String,
    /// Client secret.
    #[validate(length(min = 1, message = "secret cannot be empty"))]
    pub secret: String,
    /// Directory (tenant) id.
    #[validate(length(min = 1, message = "tenant cannot be empty"))]
    pub tenant: String,
}

impl std::fmt::Debug for AzureAccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureAccessKey")
            .field("subscription_id", &self.subscription_id)
            .field("client_id", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("tenant", &self.tenant)
            .finish()
    }
}

impl Schema for AvmConfig {
    const VARIANT: &'static str = "avm";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("resource_group_name", FieldKind::Text),
        FieldSpec::required("vm_name", FieldKind::Text),
        FieldSpec::required("admin_username", FieldKind::Text),
        FieldSpec::required(
            "size",
            FieldKind::Choice {
                accepts: AvmSize::is_known,
                expected: AvmSize::VARIANTS,
            },
        ),
        FieldSpec::optional("location", FieldKind::Text),
    ];
    const MARKERS: &'static [&'static str] = &["resource_group_name", "vm_name", "admin_username"];
}

impl Schema for AzureAccessKey {
    const VARIANT: &'static str = "Azure access key";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("subscription_id", FieldKind::Text),
        FieldSpec::required("client_id", FieldKind::Text),
        FieldSpec::required("secret", FieldKind::Text),
        FieldSpec::required("tenant", FieldKind::Text),
    ];
    const MARKERS: &'static [&'static str] = &["subscription_id", "tenant", "client_id", "secret"];
}

fn default_location() -> String {
    String::from(DEFAULT_AZURE_LOCATION)
}

fn rule_error(code: &'static str, message: String) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

/// 1-64 letters, digits, hyphens or periods; no trailing hyphen or period.
fn validate_vm_name(name: &str) -> Result<(), ValidationError> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && !name.ends_with(['-', '.']);
    if valid {
        Ok(())
    } else {
        Err(rule_error(
            "vm_name",
            format!(
                "'{name}' must be 1-64 letters, digits, hyphens or periods and not end with a hyphen or period"
            ),
        ))
    }
}

/// 1-90 letters, digits, underscores, hyphens, periods or parentheses; no trailing period.
fn validate_resource_group(name: &str) -> Result<(), ValidationError> {
    let valid = !name.is_empty()
        && name.len() <= 90
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '(' | ')'))
        && !name.ends_with('.');
    if valid {
        Ok(())
    } else {
        Err(rule_error(
            "resource_group_name",
            format!(
                "'{name}' must be 1-90 letters, digits, underscores, hyphens, periods or parentheses and not end with a period"
            ),
        ))
    }
}

fn validate_admin_username(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || name.len() > 64 {
        return Err(rule_error(
            "admin_username",
            String::from("admin_username must be 1-64 characters"),
        ));
    }
    if name.ends_with('.') {
        return Err(rule_error(
            "admin_username",
            format!("'{name}' cannot end with a period"),
        ));
    }
    if RESERVED_ADMIN_USERNAMES.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(rule_error(
            "admin_username",
            format!("'{name}' is reserved by Azure"),
        ));
    }
    Ok(())
}
