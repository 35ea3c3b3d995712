//! The single build entry point.
//!
//! [`ComputeCreator`] ties the pipeline together: the document is loaded and
//! validated when the creator is constructed, and
//! [`ComputeCreator::build_compute_instance`] dispatches the validated request
//! to its provider adapter. Nothing is retried and nothing is rolled back; a
//! key file written before a failed launch stays on disk.

use std::path::Path;
use tracing::{debug, info};

use crate::config::{default_config_location, ComputeRequest, ConfigParser, ConfigValidator};
use crate::dispatch::{ProviderClient, ProviderKind};
use crate::error::Result;
use crate::provider::{Backends, ComputeClient, ProvisionOutcome};

/// Builds one compute instance from a validated request.
#[derive(Debug)]
pub struct ComputeCreator {
    request: ComputeRequest,
    backends: Backends,
}

impl ComputeCreator {
    /// Loads and validates the document at `path`.
    ///
    /// A `.env` file next to the document is loaded first; variables already
    /// set in the process environment win.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is missing, malformed or invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(path.as_ref(), &ConfigValidator::new())
    }

    /// Loads the document named by `COMPUTE_CONFIG_LOCATION`, or
    /// `config/compute_config.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is missing, malformed or invalid.
    pub fn from_default_location() -> Result<Self> {
        Self::from_path(default_config_location())
    }

    /// Loads the document at `path` with a specific validator.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is missing, malformed or invalid.
    pub fn load(path: &Path, validator: &ConfigValidator) -> Result<Self> {
        let parser = ConfigParser::for_document(path);
        parser.load_dotenv()?;
        let raw = parser.load_file(path)?;
        let request = validator.validate(&raw)?;
        debug!(
            "Validated request '{}' for {}",
            request.compute_name, request.compute_type
        );
        Ok(Self::from_request(request))
    }

    /// Wraps an already validated request.
    #[must_use]
    pub fn from_request(request: ComputeRequest) -> Self {
        Self {
            request,
            backends: Backends::default(),
        }
    }

    /// Uses pre-built provider handles instead of connecting.
    #[must_use]
    pub fn with_backends(mut self, backends: Backends) -> Self {
        self.backends = backends;
        self
    }

    /// Returns the validated request.
    #[must_use]
    pub const fn request(&self) -> &ComputeRequest {
        &self.request
    }

    /// Creates the configured instance.
    ///
    /// # Errors
    ///
    /// Returns a dispatch error if the request pairs sections of different
    /// providers, otherwise whatever the adapter reports.
    pub async fn build_compute_instance(&self) -> Result<ProvisionOutcome> {
        let kind = ProviderKind::from(self.request.compute_type);
        let client = ProviderClient::construct(
            kind,
            self.request.compute_config.clone(),
            self.request.auth_config.clone(),
            self.backends.clone(),
        )?;

        info!("Building '{}' on {kind}", self.request.compute_name);
        let outcome = client.build_compute_instance().await?;
        info!("{}: {outcome}", self.request.compute_name);
        Ok(outcome)
    }
}
