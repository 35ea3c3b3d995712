//! Output formatting for CLI results.
//!
//! Formatting is kept separate from printing so the binary decides which
//! stream each message goes to.

use colored::Colorize;
use std::fmt::Write;

use crate::config::ComputeRequest;
use crate::error::ComputeError;
use crate::provider::ProvisionOutcome;

use super::args::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a successful build.
    #[must_use]
    pub fn format_outcome(&self, request: &ComputeRequest, outcome: &ProvisionOutcome) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "status": "success",
                    "compute_name": request.compute_name,
                    "compute_type": request.compute_type.as_str(),
                    "outcome": outcome_kind(outcome),
                    "id": outcome.resource_id(),
                    "provisioned": outcome.guarantees_provisioned(),
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_outcome_text(request, outcome),
        }
    }

    fn format_outcome_text(request: &ComputeRequest, outcome: &ProvisionOutcome) -> String {
        let mut output = String::new();
        let _ = writeln!(
            output,
            "{} {} ({}): {}",
            "✓".green(),
            request.compute_name.bold(),
            request.compute_type.provider_name(),
            outcome
        );
        let note = match outcome {
            ProvisionOutcome::Created { .. } => {
                "The launch was acknowledged; the instance may still be pending."
            }
            ProvisionOutcome::Submitted { .. } => {
                "Provisioning continues in the background; poll the operation for completion."
            }
            ProvisionOutcome::Completed { .. } => "The provider reports the machine as provisioned.",
        };
        let _ = writeln!(output, "  {}", note.dimmed());
        output
    }

    /// Formats a failed build.
    #[must_use]
    pub fn format_error(&self, error: &ComputeError) -> String {
        match self.format {
            OutputFormat::Json => {
                let issues: Vec<_> = error
                    .validation_report()
                    .map(|report| {
                        report
                            .issues
                            .iter()
                            .map(|i| serde_json::json!({ "field": i.field, "message": i.message }))
                            .collect()
                    })
                    .unwrap_or_default();
                let json = serde_json::json!({
                    "status": "error",
                    "exit_code": error.exit_code(),
                    "message": error.to_string(),
                    "issues": issues,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {error}\n", "✗ Error:".red().bold()),
        }
    }
}

const fn outcome_kind(outcome: &ProvisionOutcome) -> &'static str {
    match outcome {
        ProvisionOutcome::Created { .. } => "created",
        ProvisionOutcome::Submitted { .. } => "submitted",
        ProvisionOutcome::Completed { .. } => "completed",
    }
}
