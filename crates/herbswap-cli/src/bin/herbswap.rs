//! herbswap binary entry point

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    herbswap_cli::Cli::parse().run().await
}
