pub mod local;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::parser;
use crate::tag_color;
use crate::types::{file_name, join_path, parent_path, Card, CardTag, Lane, CARD_EXTENSION};

/// Kind of a vault entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// One child returned by `BoardFs::list_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// Filesystem primitives the board needs from its host.
/// Paths are vault-relative and `/`-separated.
/// Implementations: LocalFs (directory on disk).
pub trait BoardFs: Send + Sync {
    /// `None` when nothing exists at `path`.
    fn entry_kind(&self, path: &str) -> Option<EntryKind>;

    /// Immediate children of a directory.
    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, StorageError>;

    fn read_to_string(&self, path: &str) -> Result<String, StorageError>;

    fn stat(&self, path: &str) -> Result<FileStat, StorageError>;

    /// Create a directory (and missing parents).
    fn create_dir(&self, path: &str) -> Result<(), StorageError>;

    /// Create a file that must not exist yet.
    fn write_new(&self, path: &str, content: &str) -> Result<(), StorageError>;

    /// Replace the content of an existing file.
    fn write(&self, path: &str, content: &str) -> Result<(), StorageError>;

    fn rename(&self, from: &str, to: &str) -> Result<(), StorageError>;

    fn remove_file(&self, path: &str) -> Result<(), StorageError>;

    fn remove_dir_all(&self, path: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path escapes the vault: {0}")]
    OutsideVault(String),
}

/// Why a mutation left the vault untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoEffectReason {
    /// The target (or the directory it should go into) does not exist.
    Missing,
    /// The target exists but is a file where a directory was expected, or vice versa.
    WrongKind,
    /// The destination is already taken.
    AlreadyExists,
    /// The new name is empty or contains path separators.
    InvalidName,
    /// The target is not inside the current board root.
    OutsideBoard,
}

impl std::fmt::Display for NoEffectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            NoEffectReason::Missing => "target does not exist",
            NoEffectReason::WrongKind => "target is of the wrong kind",
            NoEffectReason::AlreadyExists => "destination already exists",
            NoEffectReason::InvalidName => "invalid name",
            NoEffectReason::OutsideBoard => "target is outside the board",
        };
        f.write_str(text)
    }
}

/// Result of a mutating operation that did not fail with an I/O error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum MutationOutcome {
    /// The change happened; `path` is the resulting vault path.
    Applied { path: String },
    NoEffect { reason: NoEffectReason },
}

impl MutationOutcome {
    pub fn applied(path: impl Into<String>) -> Self {
        MutationOutcome::Applied { path: path.into() }
    }

    pub fn no_effect(reason: NoEffectReason) -> Self {
        MutationOutcome::NoEffect { reason }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied { .. })
    }
}

/// Reject names that would leave their parent directory, and dot names that
/// listings skip.
fn valid_name(name: &str) -> Option<&str> {
    let name = name.trim();
    if name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
    {
        None
    } else {
        Some(name)
    }
}

/// Card name as typed by the user, without a trailing `.md` if one was given.
fn valid_card_name(name: &str) -> Option<&str> {
    let name = valid_name(name)?;
    match card_stem(name) {
        Some(stem) => valid_name(stem),
        None => Some(name),
    }
}

fn card_file_name(name: &str) -> String {
    format!("{}.{}", name, CARD_EXTENSION)
}

fn card_stem(file: &str) -> Option<&str> {
    file.strip_suffix(CARD_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
        .filter(|s| !s.is_empty())
}

/// Lanes and cards on top of a `BoardFs`.
///
/// Mutations check the kind and existence of their targets first and report
/// `MutationOutcome::NoEffect` instead of failing when the check does not pass.
pub struct TaskFiles<F: BoardFs> {
    fs: F,
}

impl<F: BoardFs> TaskFiles<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn path_exists(&self, path: &str) -> bool {
        self.fs.entry_kind(path).is_some()
    }

    fn is_dir(&self, path: &str) -> bool {
        self.fs.entry_kind(path) == Some(EntryKind::Dir)
    }

    /// Every immediate subdirectory of `root`. Empty when `root` is missing or a file.
    pub fn list_lanes(&self, root: &str) -> Result<Vec<Lane>, StorageError> {
        if !self.is_dir(root) {
            return Ok(Vec::new());
        }
        let lanes = self
            .fs
            .list_dir(root)?
            .into_iter()
            .filter(|e| e.kind == EntryKind::Dir)
            .map(|e| Lane {
                path: join_path(root, &e.name),
                name: e.name,
            })
            .collect();
        Ok(lanes)
    }

    /// Every markdown file directly inside `lane_path`.
    pub fn list_cards(&self, lane_path: &str) -> Result<Vec<Card>, StorageError> {
        if !self.is_dir(lane_path) {
            return Ok(Vec::new());
        }
        let lane_name = file_name(lane_path).to_string();
        let mut cards = Vec::new();

        for entry in self.fs.list_dir(lane_path)? {
            if entry.kind != EntryKind::File {
                continue;
            }
            let Some(stem) = card_stem(&entry.name) else {
                continue;
            };
            let path = join_path(lane_path, &entry.name);
            let content = self.fs.read_to_string(&path)?;
            let stat = self.fs.stat(&path)?;
            let parsed = parser::parse_content(&content);

            cards.push(Card {
                name: stem.to_string(),
                lane: lane_name.clone(),
                path,
                tags: parsed
                    .tags
                    .into_iter()
                    .map(|name| CardTag {
                        background_color: tag_color::default_color(&name),
                        name,
                    })
                    .collect(),
                due_date: parsed.due_date,
                content,
                created_at: stat.created,
                last_updated: stat.modified,
            });
        }
        Ok(cards)
    }

    /// Cards of every lane, lane by lane.
    pub fn list_all_cards(&self, root: &str) -> Result<Vec<Card>, StorageError> {
        let mut all = Vec::new();
        for lane in self.list_lanes(root)? {
            all.extend(self.list_cards(&lane.path)?);
        }
        Ok(all)
    }

    pub fn create_lane(&self, root: &str, lane_name: &str) -> Result<MutationOutcome, StorageError> {
        let Some(lane_name) = valid_name(lane_name) else {
            return Ok(MutationOutcome::no_effect(NoEffectReason::InvalidName));
        };
        match self.fs.entry_kind(root) {
            Some(EntryKind::Dir) => {}
            Some(EntryKind::File) => return Ok(MutationOutcome::no_effect(NoEffectReason::WrongKind)),
            None => return Ok(MutationOutcome::no_effect(NoEffectReason::Missing)),
        }
        let lane_path = join_path(root, lane_name);
        if self.path_exists(&lane_path) {
            return Ok(MutationOutcome::no_effect(NoEffectReason::AlreadyExists));
        }
        self.fs.create_dir(&lane_path)?;
        log::info!("[taskboard.storage.lane] Created lane {}", lane_path);
        Ok(MutationOutcome::applied(lane_path))
    }

    pub fn rename_lane(&self, lane_path: &str, new_name: &str) -> Result<MutationOutcome, StorageError> {
        let Some(new_name) = valid_name(new_name) else {
            return Ok(MutationOutcome::no_effect(NoEffectReason::InvalidName));
        };
        if let Some(outcome) = self.expect_kind(lane_path, EntryKind::Dir) {
            return Ok(outcome);
        }
        let new_path = join_path(parent_path(lane_path), new_name);
        if new_path == lane_path {
            return Ok(MutationOutcome::applied(new_path));
        }
        if self.path_exists(&new_path) {
            return Ok(MutationOutcome::no_effect(NoEffectReason::AlreadyExists));
        }
        self.fs.rename(lane_path, &new_path)?;
        log::info!("[taskboard.storage.lane] Renamed lane {} -> {}", lane_path, new_path);
        Ok(MutationOutcome::applied(new_path))
    }

    /// Delete a lane directory and everything in it.
    pub fn delete_lane(&self, lane_path: &str) -> Result<MutationOutcome, StorageError> {
        if let Some(outcome) = self.expect_kind(lane_path, EntryKind::Dir) {
            return Ok(outcome);
        }
        self.fs.remove_dir_all(lane_path)?;
        log::info!("[taskboard.storage.lane] Deleted lane {}", lane_path);
        Ok(MutationOutcome::applied(lane_path))
    }

    pub fn create_card(
        &self,
        lane_path: &str,
        card_name: &str,
        content: &str,
    ) -> Result<MutationOutcome, StorageError> {
        let Some(card_name) = valid_card_name(card_name) else {
            return Ok(MutationOutcome::no_effect(NoEffectReason::InvalidName));
        };
        if let Some(outcome) = self.expect_kind(lane_path, EntryKind::Dir) {
            return Ok(outcome);
        }
        let card_path = join_path(lane_path, &card_file_name(card_name));
        if self.path_exists(&card_path) {
            return Ok(MutationOutcome::no_effect(NoEffectReason::AlreadyExists));
        }
        self.fs.write_new(&card_path, content)?;
        log::info!("[taskboard.storage.card] Created card {}", card_path);
        Ok(MutationOutcome::applied(card_path))
    }

    pub fn update_card_content(&self, card_path: &str, content: &str) -> Result<MutationOutcome, StorageError> {
        if let Some(outcome) = self.expect_kind(card_path, EntryKind::File) {
            return Ok(outcome);
        }
        self.fs.write(card_path, content)?;
        log::debug!("[taskboard.storage.card] Updated card {}", card_path);
        Ok(MutationOutcome::applied(card_path))
    }

    pub fn rename_card(&self, card_path: &str, new_name: &str) -> Result<MutationOutcome, StorageError> {
        let Some(new_name) = valid_card_name(new_name) else {
            return Ok(MutationOutcome::no_effect(NoEffectReason::InvalidName));
        };
        if let Some(outcome) = self.expect_kind(card_path, EntryKind::File) {
            return Ok(outcome);
        }
        let new_path = join_path(parent_path(card_path), &card_file_name(new_name));
        if new_path == card_path {
            return Ok(MutationOutcome::applied(new_path));
        }
        if self.path_exists(&new_path) {
            return Ok(MutationOutcome::no_effect(NoEffectReason::AlreadyExists));
        }
        self.fs.rename(card_path, &new_path)?;
        log::info!("[taskboard.storage.card] Renamed card {} -> {}", card_path, new_path);
        Ok(MutationOutcome::applied(new_path))
    }

    /// Move a card file into another lane directory, keeping its file name.
    pub fn move_card(&self, card_path: &str, new_lane_path: &str) -> Result<MutationOutcome, StorageError> {
        if let Some(outcome) = self.expect_kind(card_path, EntryKind::File) {
            return Ok(outcome);
        }
        if let Some(outcome) = self.expect_kind(new_lane_path, EntryKind::Dir) {
            return Ok(outcome);
        }
        let new_path = join_path(new_lane_path, file_name(card_path));
        if new_path == card_path {
            return Ok(MutationOutcome::applied(new_path));
        }
        if self.path_exists(&new_path) {
            return Ok(MutationOutcome::no_effect(NoEffectReason::AlreadyExists));
        }
        self.fs.rename(card_path, &new_path)?;
        log::info!("[taskboard.storage.card] Moved card {} -> {}", card_path, new_path);
        Ok(MutationOutcome::applied(new_path))
    }

    pub fn delete_card(&self, card_path: &str) -> Result<MutationOutcome, StorageError> {
        if let Some(outcome) = self.expect_kind(card_path, EntryKind::File) {
            return Ok(outcome);
        }
        self.fs.remove_file(card_path)?;
        log::info!("[taskboard.storage.card] Deleted card {}", card_path);
        Ok(MutationOutcome::applied(card_path))
    }

    /// Create the board root directory if nothing exists at `root` yet.
    pub fn ensure_dir(&self, root: &str) -> Result<MutationOutcome, StorageError> {
        match self.fs.entry_kind(root) {
            Some(EntryKind::Dir) => Ok(MutationOutcome::no_effect(NoEffectReason::AlreadyExists)),
            Some(EntryKind::File) => Ok(MutationOutcome::no_effect(NoEffectReason::WrongKind)),
            None => {
                self.fs.create_dir(root)?;
                Ok(MutationOutcome::applied(root))
            }
        }
    }

    /// `Some(NoEffect)` when `path` is missing or not of kind `expected`.
    fn expect_kind(&self, path: &str, expected: EntryKind) -> Option<MutationOutcome> {
        match self.fs.entry_kind(path) {
            Some(kind) if kind == expected => None,
            Some(_) => Some(MutationOutcome::no_effect(NoEffectReason::WrongKind)),
            None => Some(MutationOutcome::no_effect(NoEffectReason::Missing)),
        }
    }
}
