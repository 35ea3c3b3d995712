// ============================================================================
// Linting
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items should be documented
#![warn(dead_code)]                   // Unused code
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

#![warn(unused_imports)]              // Unused imports
#![warn(unused_variables)]            // Unused variables
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// Test code may unwrap and panic freely.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Compute Creator
//!
//! Provisions a single virtual machine on AWS EC2, GCP Compute Engine or
//! Azure Virtual Machines from one declarative YAML document.
//!
//! ## Pipeline
//!
//! 1. **Load**: the document (and a `.env` next to it) is read and
//!    `${VAR}` placeholders are resolved.
//! 2. **Validate**: every violation is collected into one report before any
//!    provider is contacted.
//! 3. **Dispatch**: the `compute_type` tag selects the provider adapter.
//! 4. **Build**: the adapter authenticates on first use and creates the
//!    instance.
//!
//! The providers give different guarantees when the build returns: EC2
//! acknowledges the launch, Compute Engine returns a pending operation and
//! Azure waits for completion. [`ProvisionOutcome`] keeps them apart.
//!
//! ## Modules
//!
//! - [`config`]: Document loading, schema and validation
//! - [`provider`]: Provider adapters and their API clients
//! - [`dispatch`]: Provider tag to adapter routing
//! - [`creator`]: The build entry point
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! compute_name: web
//! compute_type: ec2
//! compute_config:
//!   image_id: UBUNTU_22_04_LTS
//!   instance_type: t3.micro
//!   key_name: web-key
//!   min_instance_count: 1
//!   max_instance_count: 1
//!   create_key_pair: true
//! auth_config:
//!   aws_access_key_id: ${AWS_ACCESS_KEY_ID}
//!   aws_secret_access_key: ${AWS_SECRET_ACCESS_KEY}
//!   region_name: us-east-1
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod creator;
pub mod dispatch;
pub mod error;
pub mod provider;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, OutputFormat, OutputFormatter};
pub use config::{ComputeRequest, ComputeType, ConfigParser, ConfigValidator, ValidationReport};
pub use creator::ComputeCreator;
pub use dispatch::{ProviderClient, ProviderKind};
pub use error::{ComputeError, Result};
pub use provider::{Backends, ComputeClient, ProvisionOutcome};
