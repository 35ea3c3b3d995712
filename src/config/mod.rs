//! Configuration module for the compute creator.
//!
//! This module handles all configuration-related functionality:
//! - Loading the YAML document and its `.env` companion
//! - Environment-variable interpolation over string values
//! - Typed schemas for the three providers and their credentials
//! - Validation that aggregates every violation into one report

/// Declares a closed set of string values accepted by a provider API.
///
/// Generates the enum with serde renames, `as_str`, `Display`, `FromStr`,
/// `is_known` and the `VARIANTS` list used in validation messages.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $value)] $variant ),+
        }

        impl $name {
            /// Every accepted value, in declaration order.
            pub const VARIANTS: &'static [&'static str] = &[$($value),+];

            /// Returns the value as the provider API spells it.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $value ),+
                }
            }

            /// Returns true if `value` is one of the accepted values.
            #[must_use]
            pub fn is_known(value: &str) -> bool {
                Self::VARIANTS.contains(&value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $value => Ok(Self::$variant), )+
                    other => Err(format!(
                        "unknown {} '{other}'",
                        stringify!($name)
                    )),
                }
            }
        }
    };
}

mod aws;
mod azure;
mod gcp;
mod interpolate;
mod parser;
mod schema;
mod spec;
mod validator;

pub use aws::{
    AwsAccessKey, BlockDeviceMapping, EbsVolume, Ec2Ami, Ec2Config, Ec2InstanceType,
    EndpointState, HttpTokens, IamInstanceProfile, InterruptionBehavior, LaunchOptions,
    MetadataOptions, Placement, ShutdownBehavior, SpotInstanceType, SpotOptions, Tenancy,
    VolumeType, DEFAULT_AWS_REGION, is_plain_key_name,
};
pub use azure::{AvmConfig, AvmSize, AzureAccessKey, DEFAULT_AZURE_LOCATION};
pub use gcp::{
    GceConfig, GceMachineType, GcpAccessKey, DEFAULT_GCE_DISK_SIZE, DEFAULT_GCE_DISK_TYPE,
    DEFAULT_GCE_NETWORK, DEFAULT_GCE_SOURCE_IMAGE,
};
pub use interpolate::{escape_placeholders, interpolate, EnvLookup, Interpolation};
pub use parser::{default_config_location, ConfigParser, CONFIG_LOCATION_ENV, DEFAULT_CONFIG_PATH};
pub use spec::{AuthConfig, ComputeRequest, ComputeType, ProviderConfig};
pub use self::validator::{ConfigValidator, ValidationIssue, ValidationReport};
