use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    robotkernel_cli::run().await
}
