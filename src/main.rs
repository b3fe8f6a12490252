//! natter: messaging server binary.

#[tokio::main]
async fn main() {
    natter::server::run().await;
}
