/// Taskboard backend: config loading, store and service init, file watcher,
/// HTTP board view.
pub mod api;
pub mod config;
mod log_bridge;
pub mod server;
pub mod state;

use std::future::Future;
use std::sync::Arc;

use taskboard_core::board::BoardViewModel;
use taskboard_core::refresh::ModelReceiver;
use taskboard_core::service::{BoardService, ServiceError};
use taskboard_core::storage::local::LocalFs;
use taskboard_core::store::{JsonFilePersistence, PluginDataStore};
use taskboard_core::watcher::file_watcher::FileWatcher;
use taskboard_core::watcher::types::BoardChangeEvent;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("HTTP server failed: {0}")]
    Server(#[from] std::io::Error),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub async fn run() -> Result<(), RunError> {
    if let Err(e) = log_bridge::init() {
        log_bridge::write_fallback_line(&format!("failed to initialize backend logger: {}", e));
    }

    let config_path = config::default_config_path();
    let config = config::load_config(&config_path).with_overrides(|key| std::env::var(key).ok());
    let vault_root = config.vault_path();
    log::info!(
        "[taskboard.startup] Vault {} with data file {}",
        vault_root.display(),
        config.data_path().display()
    );

    let store = PluginDataStore::load(Box::new(JsonFilePersistence::new(config.data_path())));
    let service = Arc::new(BoardService::new(LocalFs::new(&vault_root), store));

    if let Err(e) = service.ensure_board_root() {
        log::warn!("[taskboard.startup] Could not create board root: {}", e);
    }
    service.refresh(None)?;

    let state = AppState::new(service.clone(), config.port, config.bind_address.clone());
    let event_tx = state.event_tx.clone();
    server::spawn_server(state).await?;

    let watcher = match FileWatcher::new(&vault_root, &service.board_root()) {
        Ok((watcher, rx)) => Some((watcher, rx)),
        Err(e) => {
            log::warn!("[taskboard.watcher] Failed to create file watcher: {}", e);
            None
        }
    };

    match watcher {
        Some((watcher, rx)) => {
            watch_loop(service, watcher, rx, event_tx, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
        }
        None => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
    log::info!("[taskboard.shutdown] Shutdown signal received");
    Ok(())
}

/// Refresh on every file change until `shutdown` completes. Also follows
/// board root changes made through the settings.
async fn watch_loop(
    service: Arc<BoardService<LocalFs>>,
    mut watcher: FileWatcher,
    mut rx: broadcast::Receiver<BoardChangeEvent>,
    event_tx: broadcast::Sender<BoardChangeEvent>,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);
    let mut models: ModelReceiver = service.state().subscribe();
    let mut watched_root = service.board_root();

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        log::debug!("[taskboard.events] {:?}", event);
                        if let Err(e) = service.refresh(None) {
                            log::warn!("[taskboard.events] Refresh after {} failed: {}", event.path(), e);
                        }
                        // Forward event to SSE clients
                        let _ = event_tx.send(event);
                    }
                    Err(RecvError::Lagged(n)) => {
                        log::warn!("[taskboard.events] Lagged by {} events", n);
                        if let Err(e) = service.refresh(None) {
                            log::warn!("[taskboard.events] Refresh failed: {}", e);
                        }
                    }
                    Err(RecvError::Closed) => {
                        log::info!("[taskboard.events] Event channel closed");
                        break;
                    }
                }
            }
            changed = models.changed() => {
                if changed.is_err() {
                    break;
                }
                let model = models.borrow_and_update().clone();
                if let Some(root) = board_root_change(model.as_deref(), &watched_root) {
                    follow_board_root(&service, &mut watcher, &root);
                    watched_root = root;
                }
            }
            _ = &mut shutdown => break,
        }
    }
}

fn board_root_change(model: Option<&BoardViewModel>, watched: &str) -> Option<String> {
    model
        .map(|m| m.board_path.as_str())
        .filter(|root| *root != watched)
        .map(str::to_string)
}

fn follow_board_root(service: &BoardService<LocalFs>, watcher: &mut FileWatcher, root: &str) {
    if let Err(e) = service.ensure_board_root() {
        log::warn!("[taskboard.watcher] Could not create board root {}: {}", root, e);
    }
    match watcher.set_board_root(root) {
        Ok(()) => {
            if let Err(e) = service.refresh(None) {
                log::warn!("[taskboard.events] Refresh of {} failed: {}", root, e);
            }
        }
        Err(e) => log::warn!("[taskboard.watcher] Failed to watch {}: {}", root, e),
    }
}
