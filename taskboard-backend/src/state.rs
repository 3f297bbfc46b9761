/// Shared application state passed to axum handlers.

use std::sync::Arc;
use taskboard_core::service::BoardService;
use taskboard_core::storage::local::LocalFs;
use taskboard_core::watcher::types::BoardChangeEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BoardService<LocalFs>>,
    /// File changes that reached the board, forwarded to SSE clients.
    pub event_tx: broadcast::Sender<BoardChangeEvent>,
    pub port: u16,
    pub bind_address: String,
}

impl AppState {
    pub fn new(service: Arc<BoardService<LocalFs>>, port: u16, bind_address: String) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            service,
            event_tx,
            port,
            bind_address,
        }
    }
}
