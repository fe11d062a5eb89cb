//! authgate CLI entry point.
//!
//! Provides `validate`, `check`, and `decide` subcommands for verifying a
//! policy file, deciding a single request given on the command line, or
//! deciding a plugin-wire JSON request read from stdin.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use authgate::audit::{AuditDestination, AuditSink};
use authgate::authz::{Decision, PolicyStore, Request};
use authgate::config::GatekeeperConfig;
use authgate::gatekeeper::Gatekeeper;
use authgate::logging::{self, LoggingGuard};

/// authgate — policy-based authorization and audit for daemon API calls.
#[derive(Parser)]
#[command(name = "authgate", version, about)]
struct Cli {
    /// Config file (defaults to `$AUTHGATE_CONFIG` or `./authgate.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Policy file, overriding config and environment.
    #[arg(long, global = true)]
    policy_file: Option<PathBuf>,

    /// Audit destination: "", "stdout", "file" or "syslog".
    #[arg(long, global = true)]
    auditor_hook: Option<String>,

    /// Audit file path for the file destination.
    #[arg(long, global = true)]
    audit_log: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Load the policy file and report what it contains.
    Validate,
    /// Decide one request and audit it. Exits non-zero on deny.
    Check {
        /// Caller identity.
        #[arg(long, default_value = "")]
        user: String,
        /// HTTP method.
        #[arg(long)]
        method: String,
        /// Request URI.
        #[arg(long)]
        uri: String,
    },
    /// Read a plugin-wire JSON request from stdin and print the decision.
    Decide {
        /// Treat the input as a daemon response instead of a request.
        #[arg(long)]
        response: bool,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let _logging_guard = init_logging(&config, cli.debug)?;

    match cli.command {
        Command::Validate => handle_validate(&config),
        Command::Check { user, method, uri } => {
            handle_check(&config, &Request::new(method, uri, user))
        }
        Command::Decide { response } => handle_decide(&config, response),
    }
}

/// Load config, then apply command-line overrides on top.
fn resolve_config(cli: &Cli) -> anyhow::Result<GatekeeperConfig> {
    let mut config = match &cli.config {
        Some(path) => GatekeeperConfig::load_from(path)?,
        None => GatekeeperConfig::load()?,
    };
    if let Some(path) = &cli.policy_file {
        config.policy.path = path.clone();
    }
    if let Some(hook) = &cli.auditor_hook {
        config.audit.destination = hook
            .parse::<AuditDestination>()
            .map_err(|e| anyhow::anyhow!(e))
            .context("invalid --auditor-hook")?;
    }
    if let Some(path) = &cli.audit_log {
        config.audit.file_path = Some(path.clone());
    }
    if cli.debug {
        config.logging.level = "debug".to_owned();
    }
    Ok(config)
}

fn init_logging(config: &GatekeeperConfig, debug: bool) -> anyhow::Result<Option<LoggingGuard>> {
    let level = if debug { "debug" } else { config.logging.level.as_str() };
    match &config.logging.logs_dir {
        Some(dir) => logging::init_production(dir, level).map(Some),
        None => {
            logging::init_cli(level);
            Ok(None)
        }
    }
}

/// Load the policy set and print a summary.
fn handle_validate(config: &GatekeeperConfig) -> anyhow::Result<ExitCode> {
    let store = PolicyStore::load_file(&config.policy.path, config.policy.strict)
        .with_context(|| format!("invalid policy file {}", config.policy.path.display()))?;

    info!(path = %config.policy.path.display(), policies = store.len(), "policy file is valid");
    for policy in store.policies() {
        println!(
            "{}\tusers={}\treadonly={}",
            policy.name(),
            policy.users().join(","),
            policy.is_readonly()
        );
    }
    Ok(ExitCode::SUCCESS)
}

/// Build the gatekeeper for a one-shot command.
///
/// Stdout carries the decision JSON, so a stdout audit destination is
/// written to stderr instead.
fn build_gatekeeper(config: &GatekeeperConfig) -> anyhow::Result<Gatekeeper> {
    if config.audit.destination != AuditDestination::Stdout {
        return Gatekeeper::from_config(config);
    }
    info!("stdout audit destination redirected to stderr");
    let sink = AuditSink::from_writer(Box::new(std::io::stderr()));
    Gatekeeper::from_config_with_auditor(config, Arc::new(sink))
}

/// Decide a single request through the full gatekeeper.
fn handle_check(config: &GatekeeperConfig, request: &Request) -> anyhow::Result<ExitCode> {
    let gatekeeper = build_gatekeeper(config)?;
    let decision = gatekeeper.handle_request(request);
    println!("{}", serde_json::to_string(&decision)?);
    Ok(if decision.allow {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Decide a wire-format request read from stdin.
fn handle_decide(config: &GatekeeperConfig, response: bool) -> anyhow::Result<ExitCode> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read request from stdin")?;
    let request: Request = match serde_json::from_str(&input) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "stdin is not a valid authorization request");
            let decision = Decision::failure(e.to_string());
            println!("{}", serde_json::to_string(&decision)?);
            return Ok(ExitCode::FAILURE);
        }
    };
    debug!(user = %request.user, uri = %request.uri, response, "decoded request");

    let gatekeeper = build_gatekeeper(config)?;
    let decision = if response {
        gatekeeper.handle_response(&request)
    } else {
        gatekeeper.handle_request(&request)
    };
    println!("{}", serde_json::to_string(&decision)?);
    Ok(if decision.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
