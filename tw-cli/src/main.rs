//! TetherWave CLI Entry Point
//!
//! Configuration is loaded from environment variables (via .env file).
//! Command-line arguments override environment variables.
//!
//! Usage:
//!   tw royalty <ADDRESS>     - Royalty tier status and leg progress
//!   tw income <ADDRESS>      - Income history
//!   tw downline <ADDRESS>    - Matrix downline at a depth
//!   tw register <ADDRESS>    - Register a participant
//!   tw run <ADDRESS>         - Run the schedulers until Ctrl-C

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tw_cli::{handler, Cli};

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.verbose {
        init_logging();
    }

    if let Err(e) = handler::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tw_cli=info,tw_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
