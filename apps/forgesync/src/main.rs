//! forgesync - reconcile forge identity state with an LDAP directory.
//!
//! One subcommand: `sync`. Each invocation is a full reconciliation;
//! nothing is persisted between runs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use forgesync_config::Config;
use forgesync_reconcile::{Dispatcher, RunFlags};

mod error;

use error::CliResult;

/// forgesync - LDAP to forge identity synchronization
#[derive(Parser)]
#[command(name = "forgesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the configured forge instances with the directory
    Sync(SyncArgs),
}

#[derive(Args)]
struct SyncArgs {
    /// Perform all reads and computations but issue no mutations
    #[arg(short = 'd', long = "dryrun")]
    dryrun: bool,

    /// Log and skip entities whose forge mutations fail instead of
    /// aborting the run
    #[arg(long = "continue-on-fail", alias = "continueOnFail")]
    continue_on_fail: bool,

    /// Path to the configuration file
    #[arg(long = "config", default_value = forgesync_config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Name of a single configured instance to process (all instances
    /// when omitted)
    instance: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Sync(args) => sync(args).await,
    }
}

async fn sync(args: SyncArgs) -> CliResult<()> {
    let config = Config::load(&args.config)?;
    init_tracing(&config);

    let flags = RunFlags {
        dry_run: args.dryrun,
        continue_on_fail: args.continue_on_fail,
    };

    let reports = Dispatcher::new(&config, flags)
        .run(args.instance.as_deref())
        .await?;

    info!(instances = reports.len(), dry_run = flags.dry_run, "sync finished");
    Ok(())
}

/// Initialize the log subscriber. `RUST_LOG` wins; otherwise the
/// config debug switches select `debug` over `info`.
fn init_tracing(config: &Config) {
    let default_level = if config.ldap.debug || config.gitlab.debug {
        "debug"
    } else {
        "info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .init();
}
