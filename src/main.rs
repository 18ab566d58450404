use anyhow::Result;
use pushd::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
