#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = certportal_rust::run().await {
        eprintln!("certportal-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
