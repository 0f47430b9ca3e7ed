//! Opsgraph CLI binary.

use anyhow::Result;
use opsgraph::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Main entry point for the opsgraph CLI.
///
/// Uses tokio's current_thread runtime; commands are sequential and
/// I/O-bound, so a multi-threaded runtime would add nothing.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Controlled via RUST_LOG, e.g. RUST_LOG=opsgraph=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("opsgraph=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse_args();
    cli.execute().await
}
