// SPDX-FileCopyrightText: 2026 Litesafe Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Litesafe - safe access to SQLite stores shared between processes.
//!
//! This is the binary entry point for the `litesafe` tool.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
mod create;
mod lock;
mod migrate;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use litesafe_config::LitesafeConfig;
use litesafe_core::LitesafeError;
use litesafe_sqlite::{registry, SqliteProvider, SqliteStore};
use tokio_util::sync::CancellationToken;

/// Litesafe - safe access to SQLite stores shared between processes.
#[derive(Parser, Debug)]
#[command(name = "litesafe", version, about, long_about = None)]
struct Cli {
    /// Read configuration from FILE instead of the standard locations.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override `database.connection_string`.
    #[arg(long, global = true, value_name = "CONNECTION_STRING")]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new store with the lock table in place.
    Create {
        /// Path of the store file to create.
        path: PathBuf,
    },
    /// Run diagnostic checks against the configured store.
    Check,
    /// Apply pending schema migrations under the migration lock.
    Migrate,
    /// Print the effective configuration as TOML.
    Config,
    /// Inspect and manage named locks.
    Lock {
        #[command(subcommand)]
        action: LockCommand,
    },
}

#[derive(Subcommand, Debug)]
enum LockCommand {
    /// List held locks.
    List,
    /// Acquire a lock and hold it until Ctrl+C (or for --seconds).
    Hold {
        name: String,
        /// Release after this many seconds instead of waiting for a signal.
        #[arg(long)]
        seconds: Option<u64>,
        /// How long to wait for the lock, in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Remove a lock regardless of owner.
    Break { name: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => litesafe_config::load_and_validate_path(path),
        None => litesafe_config::load_and_validate(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            litesafe_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    if let Some(conn_str) = cli.database.clone() {
        config.database.connection_string = conn_str;
    }

    init_tracing(&config.log.level);

    if let Err(e) = run(cli.command, &config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &LitesafeConfig) -> Result<(), LitesafeError> {
    let cancel = shutdown::install_signal_handler();
    let provider = provider_for(config, cancel.clone());

    match command {
        Commands::Config => {
            let rendered = config
                .to_toml()
                .map_err(|e| LitesafeError::Internal(format!("failed to render config: {e}")))?;
            print!("{rendered}");
            Ok(())
        }
        Commands::Create { path } => create::run_create(&provider, &path).await,
        Commands::Check => {
            let store = open_store(config, &provider);
            let healthy = check::run_check(config, &store).await;
            store.close().await?;
            if healthy {
                Ok(())
            } else {
                Err(LitesafeError::Internal("one or more checks failed".to_string()))
            }
        }
        Commands::Migrate => {
            let store = open_store(config, &provider);
            migrate::run_migrate(&store).await?;
            store.close().await
        }
        Commands::Lock { action } => {
            let store = open_store(config, &provider);
            let result = match action {
                LockCommand::List => lock::run_list(&store).await,
                LockCommand::Hold {
                    name,
                    seconds,
                    timeout_ms,
                } => {
                    let timeout = timeout_ms.map(std::time::Duration::from_millis);
                    let hold_for = seconds.map(std::time::Duration::from_secs);
                    lock::run_hold(&store, &name, timeout, hold_for, cancel).await
                }
                LockCommand::Break { name } => lock::run_break(&store, &name).await,
            };
            store.close().await?;
            result
        }
    }
}

/// Build the provider from configuration and register it process-wide.
///
/// A provider already registered (for example by an embedding host) is
/// kept and returned instead.
fn provider_for(config: &LitesafeConfig, cancel: CancellationToken) -> Arc<SqliteProvider> {
    let provider = Arc::new(
        SqliteProvider::builder_from_config(config)
            .cancellation(cancel)
            .build(),
    );
    if registry::register(Arc::clone(&provider)) {
        provider
    } else {
        registry::lookup(provider.name()).unwrap_or(provider)
    }
}

fn open_store(config: &LitesafeConfig, provider: &Arc<SqliteProvider>) -> SqliteStore {
    SqliteStore::new(Arc::clone(provider), config.database.connection_string.clone())
}

/// Initialize tracing subscriber with the configured log level.
///
/// `RUST_LOG` takes precedence when set.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("litesafe={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_lock_hold_with_options() {
        let cli = Cli::try_parse_from([
            "litesafe",
            "--config",
            "/tmp/litesafe.toml",
            "lock",
            "hold",
            "schema-migration",
            "--seconds",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/litesafe.toml")));
        match cli.command {
            Commands::Lock {
                action:
                    LockCommand::Hold {
                        name,
                        seconds,
                        timeout_ms,
                    },
            } => {
                assert_eq!(name, "schema-migration");
                assert_eq!(seconds, Some(3));
                assert_eq!(timeout_ms, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn database_override_is_global() {
        let cli = Cli::try_parse_from(["litesafe", "check", "--database", "Data Source=x.db"])
            .unwrap();
        assert_eq!(cli.database.as_deref(), Some("Data Source=x.db"));
        assert!(matches!(cli.command, Commands::Check));
    }

    #[test]
    fn parses_config_subcommand() {
        let cli = Cli::try_parse_from(["litesafe", "config"]).unwrap();
        assert!(matches!(cli.command, Commands::Config));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["litesafe"]).is_err());
    }
}
