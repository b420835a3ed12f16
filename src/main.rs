//! de-a-mentis binary entrypoint.
//! Parses the CLI, installs tracing and runs one pipeline command to completion.

use clap::Parser;
use de_a_mentis::cli::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("de_a_mentis=info,warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(false)).init();
    } else {
        registry.with(fmt::layer().compact().with_target(false)).init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Err(e) = cli.run().await {
        tracing::error!(error = ?e, "command failed");
        return Err(e);
    }
    Ok(())
}
