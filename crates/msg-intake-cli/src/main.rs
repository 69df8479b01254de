// msg-intake-cli/src/main.rs
// ============================================================================
// Module: Msg Intake CLI Entry Point
// Description: Command dispatcher for the Msg Intake HTTP service.
// Purpose: Wire configuration, store backend, and server together at startup.
// Dependencies: clap, msg-intake-config, msg-intake-server, msg-intake-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! The CLI loads twelve-factor configuration from the environment, selects
//! the store backend from the database URL, and starts the intake HTTP
//! server. A missing webhook secret is a warning at startup, not a fatal
//! error: readiness probing gates traffic until the secret is configured.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use msg_intake_config::IntakeConfig;
use msg_intake_config::StoreBackend;
use msg_intake_core::InMemoryMessageStore;
use msg_intake_core::SharedMessageStore;
use msg_intake_server::IntakeServer;
use msg_intake_server::LogSink;
use msg_intake_server::MetricsRegistry;
use msg_intake_server::RequestLogEvent;
use msg_intake_server::ServerState;
use msg_intake_server::SignatureVerifier;
use msg_intake_server::StderrLogSink;
use msg_intake_store_sqlite::SqliteMessageStore;
use msg_intake_store_sqlite::SqliteStoreConfig;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "msg-intake", version, about = "Signed webhook message intake service")]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the intake HTTP server.
    Serve(ServeCommand),
}

/// Arguments for the serve subcommand.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Bind address override, e.g. 127.0.0.1:8000 (defaults to BIND_ADDR).
    #[arg(long, value_name = "ADDR")]
    bind: Option<SocketAddr>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI runtime errors.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration loading or validation failed.
    #[error("{0}")]
    Config(String),
    /// Store initialization failed.
    #[error("store init failed: {0}")]
    Store(String),
    /// Runtime or server failure.
    #[error("{0}")]
    Runtime(String),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[allow(clippy::print_stderr, reason = "Fatal startup errors are reported on stderr.")]
fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Serve(command) => run_serve(&command),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("msg-intake: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Runs the serve subcommand until the process terminates.
fn run_serve(command: &ServeCommand) -> Result<(), CliError> {
    let config = IntakeConfig::from_env().map_err(|err| CliError::Config(err.to_string()))?;
    let bind = command.bind.unwrap_or(config.bind);

    let log: Arc<dyn LogSink> = Arc::new(StderrLogSink::new(config.log_level));
    if config.webhook_secret.is_none() {
        log.record(&RequestLogEvent::warning(
            "WEBHOOK_SECRET not set - readiness check will fail",
        ));
    }

    let store = build_store(&config)?;
    let state = Arc::new(ServerState::new(
        SignatureVerifier::from_secret(config.webhook_secret.clone()),
        store,
        Arc::new(MetricsRegistry::new()),
        log,
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::Runtime(format!("runtime init failed: {err}")))?;
    runtime
        .block_on(IntakeServer::new(bind, state).serve())
        .map_err(|err| CliError::Runtime(err.to_string()))
}

/// Builds the message store selected by the database URL.
fn build_store(config: &IntakeConfig) -> Result<SharedMessageStore, CliError> {
    let backend = config.store_backend().map_err(|err| CliError::Config(err.to_string()))?;
    match backend {
        StoreBackend::Memory => Ok(SharedMessageStore::from_store(InMemoryMessageStore::new())),
        StoreBackend::Sqlite(path) => {
            let store = SqliteMessageStore::new(SqliteStoreConfig::for_path(path))
                .map_err(|err| CliError::Store(err.to_string()))?;
            Ok(SharedMessageStore::from_store(store))
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only CLI assertions.")]

    use super::*;

    #[test]
    fn serve_command_parses_bind_override() {
        let cli = Cli::try_parse_from(["msg-intake", "serve", "--bind", "127.0.0.1:9100"]).unwrap();
        let Commands::Serve(command) = cli.command;
        assert_eq!(command.bind.unwrap().to_string(), "127.0.0.1:9100");
    }

    #[test]
    fn serve_command_rejects_malformed_bind() {
        let result = Cli::try_parse_from(["msg-intake", "serve", "--bind", "nonsense"]);
        assert!(result.is_err());
    }

    #[test]
    fn memory_backend_is_selected_from_url() {
        let config = IntakeConfig::from_lookup(|name| {
            (name == "DATABASE_URL").then(|| "memory://".to_string())
        })
        .unwrap();
        let store = build_store(&config).unwrap();
        assert!(msg_intake_core::MessageStore::is_ready(&store));
    }
}
