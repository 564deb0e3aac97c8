//! Shim binary that calls into the `kubegate_broker` library's `inner_main`.
use clap::Parser as _;
use eyre::Result;

use kubegate_broker::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    kubegate_broker::inner_main(Cli::parse()).await
}
