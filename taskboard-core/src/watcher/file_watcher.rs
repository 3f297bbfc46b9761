/// File watcher using notify-debouncer-full.
///
/// Watches the board root recursively and emits BoardChangeEvent via a
/// broadcast channel. The short debounce window only coalesces editor save
/// bursts; stale refreshes are handled by refresh generations.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use tokio::sync::broadcast;

use super::types::{classify, vault_relative, BoardChangeEvent, ChangeKind};

const DEBOUNCE_DURATION: Duration = Duration::from_millis(200);

/// What the event handler needs to turn disk paths into board events.
#[derive(Debug)]
struct WatchTarget {
    vault_root: PathBuf,
    board_root: String,
}

/// File watcher that monitors one board root for lane and card changes.
pub struct FileWatcher {
    debouncer: Debouncer<notify::RecommendedWatcher, RecommendedCache>,
    target: Arc<RwLock<WatchTarget>>,
    watched: Option<PathBuf>,
}

impl FileWatcher {
    /// Create a watcher for `board_root` (vault-relative) inside `vault_root`.
    /// Returns the watcher and a broadcast receiver for events.
    pub fn new(
        vault_root: &Path,
        board_root: &str,
    ) -> Result<(Self, broadcast::Receiver<BoardChangeEvent>), notify::Error> {
        let (event_tx, event_rx) = broadcast::channel(256);
        let vault_root = std::fs::canonicalize(vault_root).unwrap_or_else(|_| vault_root.to_path_buf());
        let target = Arc::new(RwLock::new(WatchTarget {
            vault_root,
            board_root: board_root.to_string(),
        }));

        let target_clone = target.clone();

        let debouncer = new_debouncer(
            DEBOUNCE_DURATION,
            None,
            move |result: Result<Vec<DebouncedEvent>, Vec<notify::Error>>| match result {
                Ok(events) => {
                    for event in events {
                        handle_debounced_event(&event, &target_clone, &event_tx);
                    }
                }
                Err(errors) => {
                    for e in errors {
                        log::error!("[taskboard.watcher.error] Watch error: {}", e);
                    }
                }
            },
        )?;

        let mut watcher = Self {
            debouncer,
            target,
            watched: None,
        };
        watcher.watch_board_root()?;
        Ok((watcher, event_rx))
    }

    /// Point the watcher at a different board root (after a settings change).
    pub fn set_board_root(&mut self, board_root: &str) -> Result<(), notify::Error> {
        if let Some(old) = self.watched.take() {
            if let Err(e) = self.debouncer.unwatch(&old) {
                log::warn!("[taskboard.watcher.board] Failed to unwatch {:?}: {}", old, e);
            }
        }
        self.target
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .board_root = board_root.to_string();
        self.watch_board_root()
    }

    fn watch_board_root(&mut self) -> Result<(), notify::Error> {
        let path = {
            let target = self.target.read().unwrap_or_else(PoisonError::into_inner);
            target.vault_root.join(&target.board_root)
        };
        self.debouncer.watch(&path, RecursiveMode::Recursive)?;
        log::info!("[taskboard.watcher.board] Watching board root {:?}", path);
        self.watched = Some(path);
        Ok(())
    }
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    use notify::event::{ModifyKind, RenameMode};
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        _ => None,
    }
}

/// Handle a single debounced event.
fn handle_debounced_event(
    event: &DebouncedEvent,
    target: &Arc<RwLock<WatchTarget>>,
    tx: &broadcast::Sender<BoardChangeEvent>,
) {
    let Some(kind) = change_kind(&event.kind) else {
        return;
    };
    let target = target.read().unwrap_or_else(PoisonError::into_inner);

    for path in &event.paths {
        let Some(relative) = vault_relative(&target.vault_root, path) else {
            continue;
        };
        let is_dir = path.is_dir();
        if let Some(change_event) = classify(&target.board_root, &relative, kind, is_dir) {
            log::debug!("[taskboard.watcher.event] {:?}", change_event);
            if let Err(e) = tx.send(change_event) {
                log::warn!("[taskboard.watcher.send] No receivers: {}", e);
            }
        }
    }
}
