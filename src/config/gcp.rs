//! GCP Compute Engine instance parameters and service-account credentials.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::{Validate, ValidationError};

use super::schema::{FieldKind, FieldSpec, Schema};

/// Disk type used when `disk_type` is omitted.
pub const DEFAULT_GCE_DISK_TYPE: &str = "pd-standard";

/// Boot disk size used when `disk_size` is omitted.
pub const DEFAULT_GCE_DISK_SIZE: &str = "100GB";

/// Boot image used when `source_image` is omitted.
pub const DEFAULT_GCE_SOURCE_IMAGE: &str = "projects/debian-cloud/global/images/family/debian-12";

/// Network used when `network` is omitted.
pub const DEFAULT_GCE_NETWORK: &str = "default";

const DISK_TYPES: &[&str] = &["pd-standard", "pd-balanced", "pd-ssd", "pd-extreme"];

string_enum! {
    /// Compute Engine machine types accepted by the launcher.
    pub enum GceMachineType {
        /// 1 vCPU, 3.75 GB.
        N1Standard1 => "n1-standard-1",
        /// 2 vCPU, 7.5 GB.
        N1Standard2 => "n1-standard-2",
        /// 4 vCPU, 15 GB.
        N1Standard4 => "n1-standard-4",
        /// 8 vCPU, 30 GB.
        N1Standard8 => "n1-standard-8",
        /// Shared core, 1 GB.
        E2Micro => "e2-micro",
        /// Shared core, 2 GB.
        E2Small => "e2-small",
        /// Shared core, 4 GB.
        E2Medium => "e2-medium",
        /// 2 vCPU, 8 GB.
        E2Standard2 => "e2-standard-2",
        /// 4 vCPU, 16 GB.
        E2Standard4 => "e2-standard-4",
        /// 2 vCPU, 8 GB.
        N2Standard2 => "n2-standard-2",
        /// 4 vCPU, 16 GB.
        N2Standard4 => "n2-standard-4",
    }
}

/// Compute Engine instance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GceConfig {
    /// Project hosting the instance.
    #[validate(custom(function = "validate_project_id"))]
    pub project: String,
    /// Zone, e.g. `us-central1-a`.
    #[validate(length(min = 1, message = "zone cannot be empty"))]
    pub zone: String,
    /// Instance name.
    #[validate(custom(function = "validate_instance_name"))]
    pub name: String,
    /// Machine type.
    pub machine_type: GceMachineType,
    /// Boot disk type.
    #[serde(default = "default_disk_type")]
    #[validate(custom(function = "validate_disk_type"))]
    pub disk_type: String,
    /// Boot disk size, `<N>GB`.
    #[serde(default = "default_disk_size")]
    #[validate(custom(function = "validate_disk_size"))]
    pub disk_size: String,
    /// Boot image.
    #[serde(default = "default_source_image")]
    #[validate(length(min = 1, message = "source_image cannot be empty"))]
    pub source_image: String,
    /// VPC network.
    #[serde(default = "default_network")]
    #[validate(length(min = 1, message = "network cannot be empty"))]
    pub network: String,
}

impl GceConfig {
    /// Boot disk size in GB.
    #[must_use]
    pub fn disk_size_gb(&self) -> Option<u64> {
        parse_disk_size(&self.disk_size)
    }
}

/// GCP service-account credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GcpAccessKey {
    /// Project the service account belongs to.
    #[validate(custom(function = "validate_project_id"))]
    pub project_id: String,
    /// Path to the service-account JSON key file.
    #[serde(alias = "credentials")]
    pub credentials_path: PathBuf,
}

impl std::fmt::Debug for GcpAccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpAccessKey")
            .field("project_id", &self.project_id)
            .field("credentials_path", &"<redacted>")
            .finish()
    }
}

impl Schema for GceConfig {
    const VARIANT: &'static str = "gce";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("project", FieldKind::Text),
        FieldSpec::required("zone", FieldKind::Text),
        FieldSpec::required("name", FieldKind::Text),
        FieldSpec::required(
            "machine_type",
            FieldKind::Choice {
                accepts: GceMachineType::is_known,
                expected: GceMachineType::VARIANTS,
            },
        ),
        FieldSpec::optional("disk_type", FieldKind::Text),
        FieldSpec::optional("disk_size", FieldKind::Text),
        FieldSpec::optional("source_image", FieldKind::Text),
        FieldSpec::optional("network", FieldKind::Text),
    ];
    const MARKERS: &'static [&'static str] = &["project", "zone", "machine_type"];
}

impl Schema for GcpAccessKey {
    const VARIANT: &'static str = "GCP access key";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("project_id", FieldKind::Text),
        FieldSpec::required("credentials_path", FieldKind::Text),
    ];
    const MARKERS: &'static [&'static str] = &["project_id", "credentials_path", "credentials"];
    const ALIASES: &'static [(&'static str, &'static str)] = &[("credentials", "credentials_path")];
}

fn default_disk_type() -> String {
    String::from(DEFAULT_GCE_DISK_TYPE)
}

fn default_disk_size() -> String {
    String::from(DEFAULT_GCE_DISK_SIZE)
}

fn default_source_image() -> String {
    String::from(DEFAULT_GCE_SOURCE_IMAGE)
}

fn default_network() -> String {
    String::from(DEFAULT_GCE_NETWORK)
}

fn parse_disk_size(value: &str) -> Option<u64> {
    value
        .strip_suffix("GB")
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
        .filter(|size| *size > 0)
}

fn rule_error(code: &'static str, message: String) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

/// Instance names: 1-63 chars, lowercase letters, digits and hyphens,
/// starting with a letter and not ending with a hyphen.
fn is_gce_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= 63
        && bytes[0].is_ascii_lowercase()
        && !name.ends_with('-')
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

fn validate_instance_name(name: &str) -> Result<(), ValidationError> {
    if is_gce_name(name) {
        Ok(())
    } else {
        Err(rule_error(
            "gce_name",
            format!(
                "'{name}' must be 1-63 lowercase letters, digits or hyphens, start with a letter and not end with a hyphen"
            ),
        ))
    }
}

/// Project ids: 6-30 chars, otherwise the same alphabet as instance names.
fn validate_project_id(project: &str) -> Result<(), ValidationError> {
    if (6..=30).contains(&project.len()) && is_gce_name(project) {
        Ok(())
    } else {
        Err(rule_error(
            "project_id",
            format!(
                "'{project}' must be 6-30 lowercase letters, digits or hyphens, start with a letter and not end with a hyphen"
            ),
        ))
    }
}

fn validate_disk_size(size: &str) -> Result<(), ValidationError> {
    match parse_disk_size(size) {
        Some(_) => Ok(()),
        None => Err(rule_error(
            "disk_size",
            format!("'{size}' must be a positive size in the form <N>GB"),
        )),
    }
}

fn validate_disk_type(disk_type: &str) -> Result<(), ValidationError> {
    if DISK_TYPES.contains(&disk_type) {
        Ok(())
    } else {
        Err(rule_error(
            "disk_type",
            format!(
                "'{disk_type}' is not a disk type (expected one of: {})",
                DISK_TYPES.join(", ")
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gce_name_rule() {
        assert!(is_gce_name("web-1"));
        assert!(is_gce_name("a"));
        assert!(!is_gce_name("Web-1"));
        assert!(!is_gce_name("1web"));
        assert!(!is_gce_name("web-"));
        assert!(!is_gce_name("web_1"));
        assert!(!is_gce_name(&"a".repeat(64)));
    }

    #[test]
    fn test_project_id_length() {
        assert!(validate_project_id("my-proj").is_ok());
        assert!(validate_project_id("short").is_err());
        assert!(validate_project_id(&"p".repeat(31)).is_err());
    }

    #[test]
    fn test_disk_size_format() {
        assert_eq!(parse_disk_size("100GB"), Some(100));
        assert_eq!(parse_disk_size("10GB"), Some(10));
        assert_eq!(parse_disk_size("0GB"), None);
        assert_eq!(parse_disk_size("100"), None);
        assert_eq!(parse_disk_size("GB"), None);
        assert_eq!(parse_disk_size("1.5GB"), None);
    }

    #[test]
    fn test_credentials_alias_deserializes() {
        let key: GcpAccessKey =
            serde_yaml::from_str("project_id: my-proj\ncredentials: /tmp/sa.json\n").unwrap();
        assert_eq!(key.credentials_path, PathBuf::from("/tmp/sa.json"));
        assert!(!format!("{key:?}").contains("/tmp/sa.json"));
    }
}
