//! Command-line interface for payload-sender
//!
//! # Usage Examples
//!
//! ```bash
//! # Publish every payload in the definition (build with --features amqp)
//! payload-sender --def definitions/orders.json
//!
//! # Render and export without connecting, using 4 workers
//! payload-sender --def definitions/orders.yaml --validate --threads 4
//!
//! # Write run metrics next to the definition
//! payload-sender --def definitions/orders.json --emit-metrics metrics.json
//! ```
//!
//! `RUST_LOG` overrides the log level; `--debug` raises the default to `debug`.

use clap::Parser;
use payload_publish::SendArgs;
use payload_sender::RunOutcome;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "payload-sender")]
#[command(about = "Generate templated message payloads and publish them to AMQP or MQTT brokers")]
#[command(long_about = None)]
struct Cli {
    #[command(flatten)]
    args: SendArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --debug
    let default_level = if cli.args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, stopping after in-flight messages...");
            signal_token.cancel();
        }
    });

    match payload_sender::run(&cli.args, cancel).await? {
        RunOutcome::Completed(metrics) => {
            tracing::debug!(
                "Run finished: {} succeeded, {} failed",
                metrics.succeeded,
                metrics.failed
            );
        }
        RunOutcome::NothingScheduled | RunOutcome::Cancelled => {}
    }
    Ok(())
}
