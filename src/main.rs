#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stepsync_lib::run().await
}
