#[tokio::main]
async fn main() {
    nidhi_server::start_server().await;
}
