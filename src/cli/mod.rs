//! Command-line interface definitions for the `apprunner` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `apprunner` binary.
#[derive(Debug, Parser)]
#[command(
    name = "apprunner",
    about = "Provision a demo data pipeline, deploy its code, and verify it end to end",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Log debug detail from every stage, including each poll check.
    #[arg(long, short, global = true)]
    pub(crate) verbose: bool,
    /// Stage to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands of the `apprunner` binary.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Provision the stack, deploy the code, and verify the pipeline.
    #[command(name = "run", about = "Provision, deploy, and verify in one pass")]
    Run,
    /// Provision the stack and print its outputs as JSON.
    #[command(name = "provision", about = "Create the stack and print its outputs")]
    Provision,
    /// Package the code sources and point the function at them.
    #[command(name = "deploy", about = "Upload the code bundle and repoint the function")]
    Deploy(DeployCommand),
    /// Upload a synthetic input and wait for the pipeline's verdict.
    #[command(name = "verify", about = "Trigger the pipeline and wait for its result")]
    Verify(VerifyCommand),
}

/// Arguments for the `apprunner deploy` subcommand.
#[derive(Debug, Args)]
pub(crate) struct DeployCommand {
    /// Bucket receiving the code artifact; overrides `bucket_name`.
    #[arg(long, value_name = "BUCKET")]
    pub(crate) bucket: Option<String>,
    /// Function to repoint; overrides `function_name`.
    #[arg(long, value_name = "FUNCTION")]
    pub(crate) function: Option<String>,
}

/// Arguments for the `apprunner verify` subcommand.
#[derive(Debug, Args)]
pub(crate) struct VerifyCommand {
    /// Bucket watched by the pipeline; overrides `bucket_name`.
    #[arg(long, value_name = "BUCKET")]
    pub(crate) bucket: Option<String>,
}
