use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};

mod cli;

use cli::Cli;
use routelens::Engine;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG directives override the default level
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting RouteLens v{}", env!("CARGO_PKG_VERSION"));

    // Create the core engine with configuration
    let engine = Engine::new(cli.config.as_deref())?;

    // Execute the requested command
    cli.execute(engine)
}
