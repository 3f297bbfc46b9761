/// Event types emitted by the file watcher, plus the rules deciding which
/// filesystem changes matter to the board.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::types::CARD_EXTENSION;

/// A change under the board root. Paths are vault-relative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BoardChangeEvent {
    CardChanged { path: String },
    CardCreated { path: String },
    CardRemoved { path: String },
    LaneChanged { path: String },
}

impl BoardChangeEvent {
    pub fn path(&self) -> &str {
        match self {
            BoardChangeEvent::CardChanged { path }
            | BoardChangeEvent::CardCreated { path }
            | BoardChangeEvent::CardRemoved { path }
            | BoardChangeEvent::LaneChanged { path } => path,
        }
    }
}

/// What happened to a path, reduced from the platform watcher's event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// Vault-relative `/`-separated form of `path`, or `None` when it lies outside
/// `vault_root` or passes through a hidden (dot) directory.
pub fn vault_relative(vault_root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(vault_root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_string_lossy();
                if part.starts_with('.') {
                    return None;
                }
                parts.push(part.to_string());
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Map one filesystem change to a board event.
///
/// Markdown files anywhere under `board_root` are cards; anything else without
/// an extension (or known to be a directory) is treated as a lane.
pub fn classify(
    board_root: &str,
    relative: &str,
    kind: ChangeKind,
    is_dir: bool,
) -> Option<BoardChangeEvent> {
    let inside = relative
        .strip_prefix(board_root)
        .map_or(false, |rest| rest.starts_with('/'));
    if !inside {
        return None;
    }
    let path = relative.to_string();
    let name = crate::types::file_name(relative);
    let is_card = !is_dir
        && Path::new(name)
            .extension()
            .map_or(false, |ext| ext == CARD_EXTENSION);

    if is_card {
        return Some(match kind {
            ChangeKind::Created => BoardChangeEvent::CardCreated { path },
            ChangeKind::Modified => BoardChangeEvent::CardChanged { path },
            ChangeKind::Removed => BoardChangeEvent::CardRemoved { path },
        });
    }
    if is_dir || Path::new(name).extension().is_none() {
        return Some(BoardChangeEvent::LaneChanged { path });
    }
    None
}
