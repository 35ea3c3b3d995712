//! AWS EC2 instance parameters and credentials.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};

use super::schema::{FieldKind, FieldSpec, Schema};

/// Region used when `region_name` is omitted.
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Known machine images, resolved through public SSM parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Ec2Ami {
    /// Amazon Linux (first generation).
    AmazonLinux,
    /// Amazon Linux 2.
    AmazonLinux2,
    /// Amazon Linux 2023.
    AmazonLinux2023,
    /// Ubuntu 16.04 LTS.
    Ubuntu1604Lts,
    /// Ubuntu 18.04 LTS.
    Ubuntu1804Lts,
    /// Ubuntu 20.04 LTS.
    Ubuntu2004Lts,
    /// Ubuntu 22.04 LTS.
    Ubuntu2204Lts,
    /// Debian 10.
    Debian10,
    /// Debian 11.
    Debian11,
    /// Debian 12.
    Debian12,
    /// Windows Server 2016, full desktop.
    WindowsServer2016,
    /// Windows Server 2019, full desktop.
    WindowsServer2019,
    /// Windows Server 2019, core.
    WindowsServerCore2019,
    /// Windows Server 2022, full desktop.
    WindowsServer2022,
}

/// `(image, alias, SSM parameter path)`.
const AMI_TABLE: &[(Ec2Ami, &str, &str)] = &[
    (
        Ec2Ami::AmazonLinux,
        "AMAZON_LINUX_AMI",
        "/aws/service/ami-amazon-linux-latest/amzn-ami-hvm-x86_64-gp2",
    ),
    (
        Ec2Ami::AmazonLinux2,
        "AMAZON_LINUX_2_AMI",
        "/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2",
    ),
    (
        Ec2Ami::AmazonLinux2023,
        "AMAZON_LINUX_2023_AMI",
        "/aws/service/ami-amazon-linux-latest/al2023-ami-kernel-default-x86_64",
    ),
    (
        Ec2Ami::Ubuntu1604Lts,
        "UBUNTU_16_04_LTS",
        "/aws/service/canonical/ubuntu/server/16.04/stable/current/amd64/hvm/ebs-gp2/ami-id",
    ),
    (
        Ec2Ami::Ubuntu1804Lts,
        "UBUNTU_18_04_LTS",
        "/aws/service/canonical/ubuntu/server/18.04/stable/current/amd64/hvm/ebs-gp2/ami-id",
    ),
    (
        Ec2Ami::Ubuntu2004Lts,
        "UBUNTU_20_04_LTS",
        "/aws/service/canonical/ubuntu/server/20.04/stable/current/amd64/hvm/ebs-gp2/ami-id",
    ),
    (
        Ec2Ami::Ubuntu2204Lts,
        "UBUNTU_22_04_LTS",
        "/aws/service/canonical/ubuntu/server/22.04/stable/current/amd64/hvm/ebs-gp2/ami-id",
    ),
    (
        Ec2Ami::Debian10,
        "DEBIAN_10",
        "/aws/service/debian/release/10/latest/amd64",
    ),
    (
        Ec2Ami::Debian11,
        "DEBIAN_11",
        "/aws/service/debian/release/11/latest/amd64",
    ),
    (
        Ec2Ami::Debian12,
        "DEBIAN_12",
        "/aws/service/debian/release/12/latest/amd64",
    ),
    (
        Ec2Ami::WindowsServer2016,
        "WINDOWS_SERVER_2016",
        "/aws/service/ami-windows-latest/Windows_Server-2016-English-Full-Base",
    ),
    (
        Ec2Ami::WindowsServer2019,
        "WINDOWS_SERVER_2019",
        "/aws/service/ami-windows-latest/Windows_Server-2019-English-Full-Base",
    ),
    (
        Ec2Ami::WindowsServerCore2019,
        "WINDOWS_SERVER_CORE_2019",
        "/aws/service/ami-windows-latest/Windows_Server-2019-English-Core-Base",
    ),
    (
        Ec2Ami::WindowsServer2022,
        "WINDOWS_SERVER_2022",
        "/aws/service/ami-windows-latest/Windows_Server-2022-English-Full-Base",
    ),
];

impl Ec2Ami {
    /// Every accepted alias.
    pub const ALIASES: &'static [&'static str] = &[
        "AMAZON_LINUX_AMI",
        "AMAZON_LINUX_2_AMI",
        "AMAZON_LINUX_2023_AMI",
        "UBUNTU_16_04_LTS",
        "UBUNTU_18_04_LTS",
        "UBUNTU_20_04_LTS",
        "UBUNTU_22_04_LTS",
        "DEBIAN_10",
        "DEBIAN_11",
        "DEBIAN_12",
        "WINDOWS_SERVER_2016",
        "WINDOWS_SERVER_2019",
        "WINDOWS_SERVER_CORE_2019",
        "WINDOWS_SERVER_2022",
    ];

    fn entry(self) -> (&'static str, &'static str) {
        AMI_TABLE
            .iter()
            .find(|(ami, _, _)| *ami == self)
            .map_or(("", ""), |(_, alias, path)| (*alias, *path))
    }

    /// Returns the alias used in configuration documents.
    #[must_use]
    pub fn alias(self) -> &'static str {
        self.entry().0
    }

    /// Returns the SSM parameter that holds the latest image id.
    #[must_use]
    pub fn parameter_path(self) -> &'static str {
        self.entry().1
    }

    /// Parses either an alias or an SSM parameter path.
    #[must_use]
    pub fn lookup(value: &str) -> Option<Self> {
        AMI_TABLE
            .iter()
            .find(|(_, alias, path)| *alias == value || *path == value)
            .map(|(ami, _, _)| *ami)
    }

    /// Returns true if `value` names a known image.
    #[must_use]
    pub fn is_known(value: &str) -> bool {
        Self::lookup(value).is_some()
    }
}

impl TryFrom<String> for Ec2Ami {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::lookup(&s).ok_or_else(|| format!("unknown image_id '{s}'"))
    }
}

impl From<Ec2Ami> for String {
    fn from(ami: Ec2Ami) -> Self {
        ami.alias().to_string()
    }
}

impl std::fmt::Display for Ec2Ami {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.alias())
    }
}

string_enum! {
    /// EC2 instance types accepted by the launcher.
    pub enum Ec2InstanceType {
        /// t2.nano
        T2Nano => "t2.nano",
        /// t2.micro
        T2Micro => "t2.micro",
        /// t2.small
        T2Small => "t2.small",
        /// t2.medium
        T2Medium => "t2.medium",
        /// t2.large
        T2Large => "t2.large",
        /// t2.xlarge
        T2Xlarge => "t2.xlarge",
        /// t2.2xlarge
        T22xlarge => "t2.2xlarge",
        /// t3.nano
        T3Nano => "t3.nano",
        /// t3.micro
        T3Micro => "t3.micro",
        /// t3.small
        T3Small => "t3.small",
        /// t3.medium
        T3Medium => "t3.medium",
        /// t3.large
        T3Large => "t3.large",
        /// t3.xlarge
        T3Xlarge => "t3.xlarge",
        /// t3.2xlarge
        T32xlarge => "t3.2xlarge",
        /// m5.large
        M5Large => "m5.large",
        /// m5.xlarge
        M5Xlarge => "m5.xlarge",
        /// m5.2xlarge
        M52xlarge => "m5.2xlarge",
        /// m5.4xlarge
        M54xlarge => "m5.4xlarge",
        /// a1.medium
        A1Medium => "a1.medium",
        /// a1.large
        A1Large => "a1.large",
        /// a1.xlarge
        A1Xlarge => "a1.xlarge",
        /// a1.2xlarge
        A12xlarge => "a1.2xlarge",
        /// a1.4xlarge
        A14xlarge => "a1.4xlarge",
        /// a1.metal
        A1Metal => "a1.metal",
        /// c1.medium
        C1Medium => "c1.medium",
        /// c1.xlarge
        C1Xlarge => "c1.xlarge",
        /// c3.large
        C3Large => "c3.large",
        /// c3.xlarge
        C3Xlarge => "c3.xlarge",
        /// c3.2xlarge
        C32xlarge => "c3.2xlarge",
        /// c3.4xlarge
        C34xlarge => "c3.4xlarge",
        /// c3.8xlarge
        C38xlarge => "c3.8xlarge",
        /// c4.large
        C4Large => "c4.large",
        /// c4.xlarge
        C4Xlarge => "c4.xlarge",
        /// c4.2xlarge
        C42xlarge => "c4.2xlarge",
        /// c4.4xlarge
        C44xlarge => "c4.4xlarge",
        /// c4.8xlarge
        C48xlarge => "c4.8xlarge",
        /// c5.large
        C5Large => "c5.large",
        /// c5.xlarge
        C5Xlarge => "c5.xlarge",
        /// c5.2xlarge
        C52xlarge => "c5.2xlarge",
        /// c5.4xlarge
        C54xlarge => "c5.4xlarge",
        /// c5.9xlarge
        C59xlarge => "c5.9xlarge",
        /// c5.12xlarge
        C512xlarge => "c5.12xlarge",
        /// c5.18xlarge
        C518xlarge => "c5.18xlarge",
        /// c5.24xlarge
        C524xlarge => "c5.24xlarge",
    }
}

string_enum! {
    /// EBS volume types.
    pub enum VolumeType {
        /// Magnetic.
        Standard => "standard",
        /// Provisioned IOPS SSD.
        Io1 => "io1",
        /// Provisioned IOPS SSD, second generation.
        Io2 => "io2",
        /// General purpose SSD.
        Gp2 => "gp2",
        /// General purpose SSD, third generation.
        Gp3 => "gp3",
        /// Cold HDD.
        Sc1 => "sc1",
        /// Throughput optimized HDD.
        St1 => "st1",
    }
}

string_enum! {
    /// Placement tenancy.
    pub enum Tenancy {
        /// Shared hardware.
        Default => "default",
        /// Dedicated instance.
        Dedicated => "dedicated",
        /// Dedicated host.
        Host => "host",
    }
}

string_enum! {
    /// Spot request persistence.
    pub enum SpotInstanceType {
        /// Request closes once fulfilled.
        OneTime => "one-time",
        /// Request reopens after interruption.
        Persistent => "persistent",
    }
}

string_enum! {
    /// What happens to a spot instance on interruption.
    pub enum InterruptionBehavior {
        /// Hibernate the instance.
        Hibernate => "hibernate",
        /// Stop the instance.
        Stop => "stop",
        /// Terminate the instance.
        Terminate => "terminate",
    }
}

string_enum! {
    /// Instance metadata token requirement.
    pub enum HttpTokens {
        /// IMDSv1 and IMDSv2 allowed.
        Optional => "optional",
        /// IMDSv2 only.
        Required => "required",
    }
}

string_enum! {
    /// Instance metadata endpoint state.
    pub enum EndpointState {
        /// Endpoint reachable.
        Enabled => "enabled",
        /// Endpoint disabled.
        Disabled => "disabled",
    }
}

string_enum! {
    /// What an OS-initiated shutdown does.
    pub enum ShutdownBehavior {
        /// Stop the instance.
        Stop => "stop",
        /// Terminate the instance.
        Terminate => "terminate",
    }
}

/// EC2 instance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_instance_counts"))]
pub struct Ec2Config {
    /// Machine image alias.
    pub image_id: Ec2Ami,
    /// Instance type.
    pub instance_type: Ec2InstanceType,
    /// Key pair name used for SSH access.
    #[validate(
        length(min = 1, max = 255, message = "key_name must be 1-255 characters"),
        custom(function = "validate_key_name")
    )]
    pub key_name: String,
    /// Minimum number of instances to launch.
    #[validate(range(min = 1, message = "min_instance_count must be at least 1"))]
    pub min_instance_count: u32,
    /// Maximum number of instances to launch.
    #[validate(range(min = 1, message = "max_instance_count must be at least 1"))]
    pub max_instance_count: u32,
    /// Region to launch into.
    #[serde(default = "default_region")]
    #[validate(length(min = 1, message = "region_name cannot be empty"))]
    pub region_name: String,
    /// Security groups attached to the instance.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(custom(function = "validate_security_group_ids"))]
    pub security_group_ids: Vec<String>,
    /// Whether to create the key pair and store its private key locally.
    #[serde(default)]
    pub create_key_pair: bool,
    /// Directory receiving `<key_name>.pem` (defaults to the working directory).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_pair_dir: Option<PathBuf>,
    /// Low-level launch parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub launch_options: Option<LaunchOptions>,
}

/// Optional low-level launch parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LaunchOptions {
    /// Block devices attached at launch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub block_device_mappings: Vec<BlockDeviceMapping>,
    /// Subnet to launch into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    /// Primary private IPv4 address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<String>,
    /// User data script, plain text (encoded on the wire).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    /// IAM instance profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub iam_instance_profile: Option<IamInstanceProfile>,
    /// Placement constraints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
    /// Tags applied to the instance.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Launch as a spot instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot: Option<SpotOptions>,
    /// Instance metadata service options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub metadata_options: Option<MetadataOptions>,
    /// EBS-optimized instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebs_optimized: Option<bool>,
    /// Termination protection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_api_termination: Option<bool>,
    /// Behavior on OS-initiated shutdown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown_behavior: Option<ShutdownBehavior>,
}

/// A block device attached at launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct BlockDeviceMapping {
    /// Device name, e.g. `/dev/xvda`.
    #[validate(length(min = 1, message = "device_name cannot be empty"))]
    pub device_name: String,
    /// EBS volume parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub ebs: Option<EbsVolume>,
}

/// EBS volume parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EbsVolume {
    /// Size in GiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 65536, message = "volume_size must be 1-65536 GiB"))]
    pub volume_size: Option<u32>,
    /// Volume type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<VolumeType>,
    /// Provisioned IOPS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iops: Option<u32>,
    /// Throughput in MiB/s (gp3 only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput: Option<u32>,
    /// Encrypt the volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
    /// Snapshot to restore from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    /// KMS key for encryption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    /// Delete the volume when the instance terminates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_on_termination: Option<bool>,
}

/// IAM instance profile, by name or ARN.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_instance_profile"))]
pub struct IamInstanceProfile {
    /// Profile name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Profile ARN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
}

/// Placement constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Placement {
    /// Availability zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    /// Tenancy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenancy: Option<Tenancy>,
    /// Placement group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

/// Spot market options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpotOptions {
    /// Maximum hourly price, as a decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<String>,
    /// Request persistence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot_instance_type: Option<SpotInstanceType>,
    /// Interruption behavior.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interruption_behavior: Option<InterruptionBehavior>,
}

/// Instance metadata service options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MetadataOptions {
    /// Token requirement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_tokens: Option<HttpTokens>,
    /// Endpoint state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_endpoint: Option<EndpointState>,
    /// Hop limit for PUT responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 64, message = "http_put_response_hop_limit must be 1-64"))]
    pub http_put_response_hop_limit: Option<u32>,
}

/// AWS static access key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AwsAccessKey {
    /// Access key id.
    #[validate(length(min = 1, message = "aws_access_key_id cannot be empty"))]
    pub aws_access_key_id: String,
    /// Secret access key.
    #[validate(length(min = 1, message = "aws_secret_access_key cannot be empty"))]
    pub aws_secret_access_key: String,
    /// Region the key is scoped to.
    #[validate(length(min = 1, message = "region_name cannot be empty"))]
    pub region_name: String,
}

impl std::fmt::Debug for AwsAccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsAccessKey")
            .field("aws_access_key_id", &"<redacted>")
            .field("aws_secret_access_key", &"<redacted>")
            .field("region_name", &self.region_name)
            .finish()
    }
}

impl Schema for Ec2Config {
    const VARIANT: &'static str = "ec2";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required(
            "image_id",
            FieldKind::Choice {
                accepts: Ec2Ami::is_known,
                expected: Ec2Ami::ALIASES,
            },
        ),
        FieldSpec::required(
            "instance_type",
            FieldKind::Choice {
                accepts: Ec2InstanceType::is_known,
                expected: Ec2InstanceType::VARIANTS,
            },
        ),
        FieldSpec::required("key_name", FieldKind::Text),
        FieldSpec::required("min_instance_count", FieldKind::Count),
        FieldSpec::required("max_instance_count", FieldKind::Count),
        FieldSpec::optional("region_name", FieldKind::Text),
        FieldSpec::optional("security_group_ids", FieldKind::TextList),
        FieldSpec::optional("create_key_pair", FieldKind::Flag),
        FieldSpec::optional("key_pair_dir", FieldKind::Text),
        FieldSpec::optional("launch_options", FieldKind::Table),
    ];
    const MARKERS: &'static [&'static str] = &[
        "image_id",
        "instance_type",
        "key_name",
        "min_instance_count",
        "max_instance_count",
    ];
}

impl Schema for AwsAccessKey {
    const VARIANT: &'static str = "AWS access key";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::required("aws_access_key_id", FieldKind::Text),
        FieldSpec::required("aws_secret_access_key", FieldKind::Text),
        FieldSpec::required("region_name", FieldKind::Text),
    ];
    const MARKERS: &'static [&'static str] = &["aws_access_key_id", "aws_secret_access_key"];
}

fn default_region() -> String {
    String::from(DEFAULT_AWS_REGION)
}

fn validate_instance_counts(config: &Ec2Config) -> Result<(), ValidationError> {
    if config.min_instance_count > config.max_instance_count {
        let mut error = ValidationError::new("instance_count_order");
        error.message = Some(
            format!(
                "min_instance_count ({}) exceeds max_instance_count ({})",
                config.min_instance_count, config.max_instance_count
            )
            .into(),
        );
        return Err(error);
    }
    Ok(())
}

#[allow(clippy::ptr_arg)]
/// Returns true if `key_name` names a file directly inside the key directory.
#[must_use]
pub fn is_plain_key_name(key_name: &str) -> bool {
    let file_name = format!("{key_name}.pem");
    !key_name.is_empty()
        && !key_name.contains(['/', '\\', '\0'])
        && key_name != "."
        && key_name != ".."
        && Path::new(&file_name).file_name() == Some(OsStr::new(&file_name))
}

fn validate_key_name(key_name: &str) -> Result<(), ValidationError> {
    if !is_plain_key_name(key_name) {
        let mut error = ValidationError::new("key_name");
        error.message =
            Some(format!("'{key_name}' must be a plain file name (no path separators or '..')").into());
        return Err(error);
    }
    Ok(())
}

fn validate_security_group_ids(ids: &Vec<String>) -> Result<(), ValidationError> {
    if let Some(bad) = ids.iter().find(|id| !id.starts_with("sg-") || id.len() <= 3) {
        let mut error = ValidationError::new("security_group_id");
        error.message = Some(format!("'{bad}' is not a security group id (sg-...)").into());
        return Err(error);
    }
    Ok(())
}

fn validate_instance_profile(profile: &IamInstanceProfile) -> Result<(), ValidationError> {
    if profile.name.is_none() && profile.arn.is_none() {
        let mut error = ValidationError::new("instance_profile");
        error.message = Some("iam_instance_profile needs a name or an arn".into());
        return Err(error);
    }
    Ok(())
}
