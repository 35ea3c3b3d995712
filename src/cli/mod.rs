//! CLI module for the compute creator.
//!
//! There are no subcommands: one invocation builds one instance.

mod args;
mod output;

pub use args::{Cli, OutputFormat};
pub use output::OutputFormatter;
