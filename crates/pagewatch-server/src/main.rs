//! pagewatch entry point.

use clap::{Parser, Subcommand};

use pagewatch_server::config::{Config, WatchArgs};
use pagewatch_server::CycleOutcome;

#[derive(Parser)]
#[command(
    name = "pagewatch",
    about = "Periodically fetch a page, keep its <title>, and serve the latest snapshot over HTTP",
    version
)]
struct Cli {
    #[command(flatten)]
    watch: WatchArgs,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and the query server (default).
    Serve,

    /// Run a single cycle, print the structured snapshot, and exit.
    Once,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::from_args(&cli.watch) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("invalid configuration: {e:#}");
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            if let Err(e) = pagewatch_server::run(config).await {
                tracing::error!("startup failed: {e:#}");
                std::process::exit(1);
            }
        }

        Commands::Once => {
            let (outcome, store) = pagewatch_server::run_once(&config).await?;
            let snap = store.read();
            println!("{}", snap.document().to_pretty_json()?);
            if !matches!(outcome, CycleOutcome::Updated { .. }) {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
