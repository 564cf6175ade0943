#[tokio::main]
async fn main() {
    if let Err(e) = petvision_proxy_lib::run().await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}
