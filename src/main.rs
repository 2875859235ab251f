//! Binary entry point for the `apprunner` CLI.

mod cli;

use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use apprunner::{
    AwsSession, ConfigError, DeploymentTarget, ErrorKind, RunError, RunOrchestrator, RunRequest,
    RunnerConfig, StackDescriptor,
};
use cli::{Cli, Command};

const DEFAULT_FILTER: &str = "apprunner=info";
const VERBOSE_FILTER: &str = "apprunner=debug";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Run(#[from] RunError),
    #[error("failed to write output: {0}")]
    Output(String),
    #[cfg(feature = "test-backdoors")]
    #[error("simulated {0} failure")]
    Simulated(ErrorKind),
}

impl CliError {
    const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Run(err) => err.kind(),
            Self::Output(_) => ErrorKind::Other,
            #[cfg(feature = "test-backdoors")]
            Self::Simulated(kind) => *kind,
        }
    }
}

/// Work resolved from configuration before any remote call is made.
#[derive(Debug)]
enum Plan {
    Run(RunRequest),
    Provision(StackDescriptor),
    Deploy {
        sources: Vec<(String, Utf8PathBuf)>,
        target: DeploymentTarget,
    },
    Verify {
        bucket: String,
    },
}

#[derive(Debug, Serialize)]
struct DeploySummary<'a> {
    function_name: &'a str,
    bucket_name: &'a str,
    code_key: &'a str,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match dispatch(&cli.command).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            err.kind().exit_code()
        }
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(command: &Command) -> Result<(), CliError> {
    #[cfg(feature = "test-backdoors")]
    if let Some(result) = fake_outcome_from_env() {
        return result;
    }

    let config = RunnerConfig::load_without_cli_args()?;
    config.validate()?;
    let plan = plan(command, &config)?;

    let session = AwsSession::load(config.profile.as_deref(), config.region.as_deref()).await;
    let orchestrator = RunOrchestrator::new(
        session.stacks(),
        session.store(),
        session.functions(),
        config.layout(),
        config.stack_policy()?,
        config.verify_policy()?,
    )
    .with_output_keys(config.output_keys());

    match plan {
        Plan::Run(request) => {
            let report = orchestrator.execute(&request).await?;
            write_json(io::stdout(), &report)
        }
        Plan::Provision(descriptor) => {
            let outputs = orchestrator.provision(&descriptor).await?;
            write_json(io::stdout(), &outputs)
        }
        Plan::Deploy { sources, target } => {
            let locator = orchestrator.deploy(&sources, &target).await?;
            write_json(
                io::stdout(),
                &DeploySummary {
                    function_name: &target.function_name,
                    bucket_name: &locator.container,
                    code_key: &locator.key,
                },
            )
        }
        Plan::Verify { bucket } => {
            let report = orchestrator.verify(&bucket).await?;
            write_json(io::stdout(), &report)
        }
    }
}

fn plan(command: &Command, config: &RunnerConfig) -> Result<Plan, CliError> {
    Ok(match command {
        Command::Run => Plan::Run(RunRequest {
            descriptor: config.descriptor()?,
            code_sources: config.code_entries()?,
        }),
        Command::Provision => Plan::Provision(config.descriptor()?),
        Command::Deploy(args) => Plan::Deploy {
            sources: config.code_entries()?,
            target: config.deployment_target(args.bucket.as_deref(), args.function.as_deref())?,
        },
        Command::Verify(args) => Plan::Verify {
            bucket: config.bucket(args.bucket.as_deref())?,
        },
    })
}

fn write_json<T: Serialize>(mut target: impl Write, value: &T) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(target, "{rendered}").map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "error [{}]: {err}", err.kind()).ok();
}

#[cfg(feature = "test-backdoors")]
const FAKE_OUTCOME_ENV: &str = "APP_RUNNER_FAKE_OUTCOME";

/// Short-circuits dispatch with a canned outcome so CLI tests can observe
/// exit codes without cloud access.
#[cfg(feature = "test-backdoors")]
fn fake_outcome_from_env() -> Option<Result<(), CliError>> {
    const KINDS: [ErrorKind; 10] = [
        ErrorKind::Config,
        ErrorKind::SourceMissing,
        ErrorKind::TransferError,
        ErrorKind::ProvisioningFailed,
        ErrorKind::ProvisioningTimedOut,
        ErrorKind::OutputMissing,
        ErrorKind::UpdateRejected,
        ErrorKind::FailedWithPartialSignal,
        ErrorKind::TimedOut,
        ErrorKind::Other,
    ];

    let mode = std::env::var(FAKE_OUTCOME_ENV).ok()?;
    if mode == "ok" {
        return Some(write_json(io::stdout(), &serde_json::json!({})));
    }
    KINDS
        .into_iter()
        .find(|kind| kind.as_str() == mode)
        .map(|kind| Err(CliError::Simulated(kind)))
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
