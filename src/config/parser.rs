//! Configuration parser for loading the request document.
//!
//! This module reads the YAML document into an untyped tree. Interpolation
//! and schema checks happen afterwards in the validator, so that every
//! problem in the document can be reported together.

use crate::error::{ComputeError, ConfigError, Result};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the configuration document.
pub const CONFIG_LOCATION_ENV: &str = "COMPUTE_CONFIG_LOCATION";

/// Document location used when nothing else is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/compute_config.yaml";

/// Returns the document location from the environment or the default path.
#[must_use]
pub fn default_config_location() -> PathBuf {
    std::env::var_os(CONFIG_LOCATION_ENV)
        .filter(|value| !value.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Configuration parser for loading request documents.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Directory searched for a `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory searched for a `.env` file.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Creates a parser whose `.env` lookup sits next to `document`.
    #[must_use]
    pub fn for_document(document: &Path) -> Self {
        match document.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => Self::new().with_base_path(dir),
            _ => Self::new(),
        }
    }

    /// Loads a YAML document from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be read or is not valid YAML.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ComputeError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ComputeError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a YAML document from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<Value> {
        debug!("Parsing YAML configuration");

        serde_yaml::from_str(content).map_err(|e| {
            let location = match (source, e.location()) {
                (Some(path), Some(mark)) => Some(format!(
                    "{}:{}:{}",
                    path.display(),
                    mark.line(),
                    mark.column()
                )),
                (Some(path), None) => Some(path.display().to_string()),
                (None, Some(mark)) => Some(format!("line {}, column {}", mark.line(), mark.column())),
                (None, None) => None,
            };
            ComputeError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })
    }

    /// Loads the .env file if present.
    ///
    /// Variables already set in the process environment are not overridden.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ComputeError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_request_document() {
        let yaml = r"
compute_name: web
compute_type: ec2
compute_config:
  image_id: UBUNTU_18_04_LTS
  instance_type: t2.micro
";
        let value = ConfigParser::new().parse_yaml(yaml, None).unwrap();
        assert_eq!(value["compute_type"], Value::from("ec2"));
        assert_eq!(value["compute_config"]["instance_type"], Value::from("t2.micro"));
    }

    #[test]
    fn test_syntax_error_is_config_error() {
        let err = ConfigParser::new()
            .parse_yaml("compute_name: [unclosed\n", None)
            .unwrap_err();
        assert!(matches!(
            err,
            ComputeError::Config(ConfigError::ParseError { .. })
        ));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        let err = ConfigParser::new().load_file(&missing).unwrap_err();
        assert!(matches!(
            err,
            ComputeError::Config(ConfigError::FileNotFound { ref path }) if *path == missing
        ));
    }

    #[test]
    fn test_load_file_reads_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "compute_name: from-file").unwrap();
        let value = ConfigParser::new().load_file(file.path()).unwrap();
        assert_eq!(value["compute_name"], Value::from("from-file"));
    }

    #[test]
    fn test_for_document_uses_parent_dir() {
        let parser = ConfigParser::for_document(Path::new("config/compute_config.yaml"));
        assert_eq!(parser.base_path, Some(PathBuf::from("config")));
        let bare = ConfigParser::for_document(Path::new("compute_config.yaml"));
        assert_eq!(bare.base_path, None);
    }
}
