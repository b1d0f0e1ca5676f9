use anyhow::Result;
use casecrux::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
