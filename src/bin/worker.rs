#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = autograde_rust::run_worker().await {
        eprintln!("autograde-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
