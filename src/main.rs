#[tokio::main]
async fn main() {
    if let Err(e) = sidegig::api::run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
