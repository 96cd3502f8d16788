//! `steward` binary entry point
//!
//! Wires configuration, credentials, and the call executor together, then
//! dispatches into the command registry. Batch mode re-invokes this same
//! binary per line, so a worker process and an interactive command share
//! one code path.

mod batch_file;
mod commands;
mod registry;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use steward_core::api::ApiCallExecutor;
use steward_core::auth::{CredentialProvider, ScopedCredentials, Signer};
use steward_core::batch::BatchScheduler;
use steward_domain::{Config, KeySource, Result, StewardError, EXIT_CODE_SOFT};
use steward_infra::auth::piv::PivSigner;
use steward_infra::{FileTokenStore, HttpTokenEndpoint, ProcessRunner, RestTransport, SoftwareSigner};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{CommandContext, CommandStatus, DIRECTORY_SCOPES};

#[derive(Parser)]
#[command(name = "steward", version, about = "Workspace administration from the command line")]
struct Cli {
    /// Path of the configuration file (default: probe standard locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a batch file of invocations through the worker pool
    Batch {
        /// Batch file: one invocation per line, `commit-batch` as barrier
        file: PathBuf,
    },
    /// Factory-reset the PIV device and generate a fresh signing key
    ProvisionKey {
        /// Skip the interactive confirmation
        #[arg(long)]
        yes: bool,
        /// Subject name of the self-signed certificate
        #[arg(long, default_value = "CN=Steward Signing Key")]
        subject: String,
    },
    /// Any registry command, e.g. `steward user get alice@example.com`
    #[command(external_subcommand)]
    Invoke(Vec<String>),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("steward: {e}");
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Batch { file } => run_batch(&config, &file).await,
        Command::ProvisionKey { yes, subject } => provision_key(&config, yes, &subject),
        Command::Invoke(tokens) => {
            let ctx = build_context(config)?;
            match registry::dispatch(&ctx, &tokens).await? {
                CommandStatus::Clean => Ok(0),
                CommandStatus::SoftErrors => Ok(EXIT_CODE_SOFT),
            }
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => steward_infra::config::load_from_file(Some(path)),
        None => steward_infra::config::load(),
    }
}

/// Wire the full credential and executor stack for one process.
fn build_context(config: Config) -> Result<CommandContext> {
    let endpoint = Arc::new(HttpTokenEndpoint::new(config.auth.token_uri.clone())?);

    let store = config
        .auth
        .token_store_path
        .as_ref()
        .map(|path| Arc::new(FileTokenStore::new(path)) as Arc<dyn steward_core::auth::TokenStore>);

    let signer: Option<Arc<dyn Signer>> = match &config.auth.key_source {
        Some(KeySource::Pem { path }) => {
            Some(Arc::new(SoftwareSigner::from_pem_file(path, "software")?))
        }
        Some(KeySource::Piv { serial, pin }) => {
            Some(Arc::new(build_piv_signer(*serial, pin.clone())?))
        }
        None => None,
    };

    let provider =
        Arc::new(CredentialProvider::new(endpoint, store, signer, config.auth.clone()));
    let credentials = Arc::new(ScopedCredentials::new(
        provider,
        DIRECTORY_SCOPES.iter().map(ToString::to_string).collect(),
        None,
        None,
    ));

    let transport = Arc::new(RestTransport::new(&config.api)?);
    let executor = ApiCallExecutor::new(transport, credentials, config.api.max_retries);

    Ok(CommandContext { config, executor })
}

async fn run_batch(config: &Config, file: &std::path::Path) -> Result<i32> {
    let invocations = batch_file::parse_file(file)?;

    let runner = Arc::new(ProcessRunner::current_exe()?);
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, draining in-flight work");
            interrupt.cancel();
        }
    });

    let scheduler = BatchScheduler::new(
        runner,
        config.batch.max_workers,
        config.batch.progress_interval,
        cancel,
    );
    let report = scheduler.run(invocations).await;

    for outcome in &report.outcomes {
        if let Some(detail) = &outcome.detail {
            eprintln!("{}: {detail}", outcome.invocation);
        }
    }
    eprintln!(
        "batch complete: {} ok, {} skipped, {} failed of {}",
        report.succeeded(),
        report.soft_errors(),
        report.failed(),
        report.total()
    );

    Ok(if report.failed() > 0 { 1 } else { 0 })
}

fn provision_key(config: &Config, yes: bool, subject: &str) -> Result<i32> {
    let Some(KeySource::Piv { serial, pin }) = &config.auth.key_source else {
        return Err(StewardError::Config(
            "provision-key requires a piv key_source in the configuration".to_string(),
        ));
    };

    if !yes && !confirm_destruction()? {
        eprintln!("aborted; device unchanged");
        return Ok(1);
    }

    let signer = build_piv_signer(*serial, pin.clone())?;
    let report = signer.provision(subject)?;

    // Shown once; recorded nowhere else.
    print_provision_report(&report);
    Ok(0)
}

fn confirm_destruction() -> Result<bool> {
    eprintln!("This DESTROYS every key and credential on the PIV device.");
    eprint!("Type 'yes' to continue: ");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|e| StewardError::Config(format!("cannot read confirmation: {e}")))?;
    Ok(line.trim() == "yes")
}

#[allow(clippy::print_stdout)]
fn print_provision_report(report: &steward_infra::auth::ProvisionReport) {
    println!("device serial:           {}", report.serial);
    println!("new PIN:                 {}", report.pin);
    println!("new PUK:                 {}", report.puk);
    println!("certificate fingerprint: {}", report.certificate_fingerprint);
    println!("Record the PIN and PUK now; they cannot be recovered.");
}

#[cfg(feature = "piv-hardware")]
fn build_piv_signer(serial: Option<u32>, pin: Option<String>) -> Result<PivSigner> {
    use steward_infra::auth::piv::hardware::PcscConnector;
    Ok(PivSigner::new(Box::new(PcscConnector), serial, pin, std::env::temp_dir()))
}

#[cfg(not(feature = "piv-hardware"))]
fn build_piv_signer(serial: Option<u32>, pin: Option<String>) -> Result<PivSigner> {
    let _ = (serial, pin);
    Err(StewardError::Config(
        "this build has no PIV hardware support; rebuild with the piv-hardware feature"
            .to_string(),
    ))
}
