#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = mocktest_rust::run().await {
        eprintln!("mocktest-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
