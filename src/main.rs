//! indovest-kg CLI entry point

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    // Pick up OPENAI_API_KEY and friends from a local .env, if present.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = indovest_kg::cli::Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(indovest_kg::cli::run(cli))
}
