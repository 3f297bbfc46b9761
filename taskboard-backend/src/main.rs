#[tokio::main]
async fn main() {
    if let Err(e) = taskboard_backend::run().await {
        log::error!("[taskboard.startup] {}", e);
        eprintln!("taskboard-backend: {}", e);
        std::process::exit(1);
    }
}
