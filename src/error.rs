//! Error types for the compute creator.
//!
//! Every failure in the build pipeline ends up as a [`ComputeError`]:
//! configuration problems are reported before any provider call, dispatch
//! problems before any credential is used, and provider failures carry the
//! provider's own error detail verbatim.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ValidationReport;

/// The main error type for the compute creator.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The provider tag could not be dispatched to an adapter.
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// The provider rejected the supplied credentials.
    #[error("{provider} rejected the supplied credentials: {message}")]
    Credential {
        /// Provider that rejected the credentials.
        provider: &'static str,
        /// Provider-supplied detail.
        message: String,
    },

    /// A provider API call failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A local file operation failed.
    #[error("Local I/O error at {}: {source}", path.display())]
    LocalIo {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {}", path.display())]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be read or parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// The document violated the schema. Lists every issue found.
    #[error("{0}")]
    Validation(ValidationReport),
}

/// Errors raised while routing a request to a provider adapter.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The provider tag is not one of the supported providers.
    #[error("Unsupported provider '{tag}' (expected one of: ec2, gce, avm)")]
    UnsupportedProvider {
        /// The tag as it appeared in the configuration.
        tag: String,
    },

    /// A configuration or credential variant does not belong to the provider.
    #[error("{component} for {provider} received a {found} variant")]
    VariantMismatch {
        /// Provider being constructed.
        provider: &'static str,
        /// Which half of the request was wrong (`compute_config` or `auth_config`).
        component: &'static str,
        /// Variant that was actually supplied.
        found: &'static str,
    },
}

/// Provider API errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned an error response.
    #[error("{provider} API request failed{}: {message}", fmt_code(*status, code.as_deref()))]
    Api {
        /// Provider name.
        provider: &'static str,
        /// HTTP status, when known.
        status: Option<u16>,
        /// Provider error code, when known.
        code: Option<String>,
        /// Provider error message, verbatim.
        message: String,
    },

    /// The request never reached the provider.
    #[error("Network error communicating with {provider}: {message}")]
    Network {
        /// Provider name.
        provider: &'static str,
        /// Description of the network error.
        message: String,
    },

    /// The provider answered with something we could not interpret.
    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        /// Provider name.
        provider: &'static str,
        /// Description of the response issue.
        message: String,
    },

    /// A long-running operation finished unsuccessfully.
    #[error("{provider} operation {operation} ended with status {status}: {message}")]
    OperationFailed {
        /// Provider name.
        provider: &'static str,
        /// Operation handle.
        operation: String,
        /// Terminal status reported by the provider.
        status: String,
        /// Provider error detail.
        message: String,
    },

    /// Waiting for a long-running operation exceeded the client-side limit.
    #[error("Timed out after {waited_secs}s waiting for {provider} operation {operation}")]
    Timeout {
        /// Provider name.
        provider: &'static str,
        /// Operation handle.
        operation: String,
        /// Seconds waited before giving up.
        waited_secs: u64,
    },
}

fn fmt_code(status: Option<u16>, code: Option<&str>) -> String {
    match (status, code) {
        (Some(status), Some(code)) => format!(" ({status} {code})"),
        (Some(status), None) => format!(" ({status})"),
        (None, Some(code)) => format!(" ({code})"),
        (None, None) => String::new(),
    }
}

/// Result type alias for compute creator operations.
pub type Result<T> = std::result::Result<T, ComputeError>;

impl ComputeError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a credential error for the given provider.
    #[must_use]
    pub fn credential(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Credential {
            provider,
            message: message.into(),
        }
    }

    /// Creates a local I/O error for the given path.
    #[must_use]
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Returns the process exit code for this error class.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Dispatch(_) => 3,
            Self::Credential { .. } => 4,
            Self::Provider(_) => 5,
            Self::LocalIo { .. } => 6,
            Self::Internal(_) => 1,
        }
    }

    /// Returns the validation report if this is a validation failure.
    #[must_use]
    pub const fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Config(ConfigError::Validation(report)) => Some(report),
            _ => None,
        }
    }
}

impl ProviderError {
    /// Creates an API error.
    #[must_use]
    pub fn api(
        provider: &'static str,
        status: Option<u16>,
        code: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Api {
            provider,
            status,
            code,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Network {
            provider,
            message: message.into(),
        }
    }

    /// Creates an invalid-response error.
    #[must_use]
    pub fn invalid_response(provider: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_keeps_native_detail() {
        let err = ProviderError::api(
            "aws",
            Some(400),
            Some(String::from("InvalidAMIID.NotFound")),
            "The image id '[ami-123]' does not exist",
        );
        assert_eq!(
            err.to_string(),
            "aws API request failed (400 InvalidAMIID.NotFound): The image id '[ami-123]' does not exist"
        );
    }

    #[test]
    fn test_exit_codes_are_distinct_per_class() {
        let unsupported = ComputeError::from(DispatchError::UnsupportedProvider {
            tag: String::from("lightsail"),
        });
        let credential = ComputeError::credential("azure", "invalid client secret");
        let io = ComputeError::local_io(
            "k1.pem",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );

        assert_eq!(unsupported.exit_code(), 3);
        assert_eq!(credential.exit_code(), 4);
        assert_eq!(io.exit_code(), 6);
        assert_eq!(ComputeError::internal("boom").exit_code(), 1);
    }
}
