#[tokio::main]
async fn main() {
    if let Err(e) = droidclaw_lib::run().await {
        eprintln!("droidclaw: {e}");
        std::process::exit(1);
    }
}
