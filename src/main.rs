#[tokio::main]
async fn main() -> anyhow::Result<()> {
    caseforge_cli::cli::app::run().await
}
