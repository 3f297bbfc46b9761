/// Plugin data store.
///
/// Settings, tag colour overrides and manual lane orders live together in
/// one JSON blob. The blob is always loaded and saved whole; every mutation
/// is a point update in memory followed by a save of the entire blob.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::config::PluginSettings;
use crate::storage::local::atomic_write;
use crate::types::{SortOrderMapping, TagColorMapping};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginData {
    #[serde(default)]
    pub settings: PluginSettings,
    #[serde(default)]
    pub tag_colors: TagColorMapping,
    #[serde(default)]
    pub sort_order: SortOrderMapping,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Get-whole / set-whole persistence for the plugin data blob.
pub trait DataPersistence: Send + Sync {
    /// Load the stored blob, `Ok(None)` when nothing was saved yet.
    fn load(&self) -> Result<Option<PluginData>, StoreError>;

    fn save(&self, data: &PluginData) -> Result<(), StoreError>;
}

/// Stores the blob as pretty-printed JSON in a single file.
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

}

impl DataPersistence for JsonFilePersistence {
    fn load(&self) -> Result<Option<PluginData>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, data: &PluginData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(data)?;
        atomic_write(&self.path, &json)?;
        Ok(())
    }
}

/// In-memory persistence, used by tests and throwaway boards.
#[derive(Default)]
pub struct MemoryPersistence {
    saved: Mutex<Option<PluginData>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last blob handed to `save`.
    pub fn saved(&self) -> Option<PluginData> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DataPersistence for MemoryPersistence {
    fn load(&self) -> Result<Option<PluginData>, StoreError> {
        Ok(self.saved())
    }

    fn save(&self, data: &PluginData) -> Result<(), StoreError> {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(data.clone());
        Ok(())
    }
}

/// In-memory view of the plugin data with write-through persistence.
pub struct PluginDataStore {
    data: RwLock<PluginData>,
    persistence: Box<dyn DataPersistence>,
}

impl PluginDataStore {
    /// Load the blob. A missing blob yields defaults; an unreadable one is
    /// logged and replaced by defaults on the next save.
    pub fn load(persistence: Box<dyn DataPersistence>) -> Self {
        let data = match persistence.load() {
            Ok(Some(mut data)) => {
                data.settings = data.settings.normalized();
                data
            }
            Ok(None) => {
                log::info!("[taskboard.store.load] No plugin data yet, using defaults");
                PluginData::default()
            }
            Err(e) => {
                log::warn!("[taskboard.store.load] Failed to load plugin data: {}", e);
                PluginData::default()
            }
        };
        Self {
            data: RwLock::new(data),
            persistence,
        }
    }

    pub fn snapshot(&self) -> PluginData {
        self.read().clone()
    }

    pub fn settings(&self) -> PluginSettings {
        self.read().settings.clone()
    }

    pub fn update_settings(&self, settings: PluginSettings) -> Result<PluginSettings, StoreError> {
        let settings = settings.normalized();
        self.mutate(|data| data.settings = settings.clone())?;
        Ok(settings)
    }

    /// Colour overrides for one board path (empty when none were set).
    pub fn tag_colors(&self, board_path: &str) -> HashMap<String, String> {
        self.read()
            .tag_colors
            .get(board_path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn tag_color_mapping(&self) -> TagColorMapping {
        self.read().tag_colors.clone()
    }

    pub fn set_tag_color(&self, board_path: &str, tag: &str, color: &str) -> Result<(), StoreError> {
        self.mutate(|data| {
            data.tag_colors
                .entry(board_path.to_string())
                .or_default()
                .insert(tag.to_string(), color.to_string());
        })
    }

    /// Drop an override. Returns `false` (and skips the save) when there was none.
    pub fn remove_tag_color(&self, board_path: &str, tag: &str) -> Result<bool, StoreError> {
        let present = self
            .read()
            .tag_colors
            .get(board_path)
            .map_or(false, |m| m.contains_key(tag));
        if !present {
            return Ok(false);
        }
        self.mutate(|data| {
            if let Some(colors) = data.tag_colors.get_mut(board_path) {
                colors.remove(tag);
                if colors.is_empty() {
                    data.tag_colors.remove(board_path);
                }
            }
        })?;
        Ok(true)
    }

    pub fn sort_order(&self, board_path: &str) -> HashMap<String, Vec<String>> {
        self.read()
            .sort_order
            .get(board_path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_sort_order(
        &self,
        board_path: &str,
        lane_name: &str,
        card_names: Vec<String>,
    ) -> Result<(), StoreError> {
        self.mutate(|data| {
            data.sort_order
                .entry(board_path.to_string())
                .or_default()
                .insert(lane_name.to_string(), card_names);
        })
    }

    pub fn clear_sort_order(&self, board_path: &str, lane_name: &str) -> Result<bool, StoreError> {
        let present = self
            .read()
            .sort_order
            .get(board_path)
            .map_or(false, |m| m.contains_key(lane_name));
        if !present {
            return Ok(false);
        }
        self.mutate(|data| {
            if let Some(lanes) = data.sort_order.get_mut(board_path) {
                lanes.remove(lane_name);
                if lanes.is_empty() {
                    data.sort_order.remove(board_path);
                }
            }
        })?;
        Ok(true)
    }

    /// Move a lane's manual order to its new name after a lane rename.
    pub fn rename_sort_lane(&self, board_path: &str, old: &str, new: &str) -> Result<(), StoreError> {
        let present = self
            .read()
            .sort_order
            .get(board_path)
            .map_or(false, |m| m.contains_key(old));
        if !present {
            return Ok(());
        }
        self.mutate(|data| {
            if let Some(lanes) = data.sort_order.get_mut(board_path) {
                if let Some(order) = lanes.remove(old) {
                    lanes.insert(new.to_string(), order);
                }
            }
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, PluginData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to a copy and save the whole blob. The copy replaces the
    /// in-memory data only once the save succeeded.
    fn mutate(&self, f: impl FnOnce(&mut PluginData)) -> Result<(), StoreError> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = data.clone();
        f(&mut next);
        self.persistence.save(&next)?;
        *data = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewMode;
    use std::sync::Arc;

    struct SharedMemory(Arc<MemoryPersistence>);

    impl DataPersistence for SharedMemory {
        fn load(&self) -> Result<Option<PluginData>, StoreError> {
            self.0.load()
        }
        fn save(&self, data: &PluginData) -> Result<(), StoreError> {
            self.0.save(data)
        }
    }

    fn memory_store() -> (PluginDataStore, Arc<MemoryPersistence>) {
        let mem = Arc::new(MemoryPersistence::new());
        let store = PluginDataStore::load(Box::new(SharedMemory(mem.clone())));
        (store, mem)
    }

    #[test]
    fn test_set_tag_color_saves_whole_blob() {
        let (store, mem) = memory_store();
        store.set_tag_color("tasks", "urgent", "red").unwrap();

        assert_eq!(store.tag_colors("tasks").get("urgent").map(String::as_str), Some("red"));
        assert!(store.tag_colors("other-board").is_empty());

        let saved = mem.saved().unwrap();
        assert_eq!(saved.tag_colors["tasks"]["urgent"], "red");
        assert_eq!(saved.settings, PluginSettings::default());
    }

    #[test]
    fn test_remove_tag_color() {
        let (store, _) = memory_store();
        store.set_tag_color("tasks", "urgent", "red").unwrap();
        store.set_tag_color("other-board", "urgent", "blue").unwrap();

        assert!(store.remove_tag_color("tasks", "urgent").unwrap());
        assert!(!store.remove_tag_color("tasks", "urgent").unwrap());
        assert!(store.tag_colors("tasks").is_empty());
        assert_eq!(store.tag_colors("other-board")["urgent"], "blue");
    }

    #[test]
    fn test_sort_order_roundtrip_and_clear() {
        let (store, _) = memory_store();
        store
            .set_sort_order("tasks", "Todo", vec!["b".into(), "a".into()])
            .unwrap();
        assert_eq!(store.sort_order("tasks")["Todo"], vec!["b", "a"]);

        store.rename_sort_lane("tasks", "Todo", "Backlog").unwrap();
        assert!(store.sort_order("tasks").get("Todo").is_none());
        assert_eq!(store.sort_order("tasks")["Backlog"], vec!["b", "a"]);

        assert!(store.clear_sort_order("tasks", "Backlog").unwrap());
        assert!(store.sort_order("tasks").is_empty());
    }

    #[test]
    fn test_settings_save_keeps_overrides() {
        let (store, mem) = memory_store();
        store.set_tag_color("tasks", "urgent", "red").unwrap();
        store
            .update_settings(PluginSettings {
                default_view_mode: ViewMode::Compact,
                ..Default::default()
            })
            .unwrap();

        let saved = mem.saved().unwrap();
        assert_eq!(saved.settings.default_view_mode, ViewMode::Compact);
        assert_eq!(saved.tag_colors["tasks"]["urgent"], "red");
    }

    struct FailingSave;

    impl DataPersistence for FailingSave {
        fn load(&self) -> Result<Option<PluginData>, StoreError> {
            Ok(None)
        }
        fn save(&self, _data: &PluginData) -> Result<(), StoreError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    #[test]
    fn test_failed_save_keeps_previous_data() {
        let store = PluginDataStore::load(Box::new(FailingSave));
        assert!(store.set_tag_color("tasks", "urgent", "red").is_err());
        assert!(store.tag_colors("tasks").is_empty());

        let moved = PluginSettings {
            tasks_folder_path: "elsewhere".into(),
            ..Default::default()
        };
        assert!(store.update_settings(moved).is_err());
        assert_eq!(store.settings().board_root(), "tasks");

        assert!(store.set_sort_order("tasks", "Todo", vec!["a".into()]).is_err());
        assert!(store.sort_order("tasks").is_empty());
        assert_eq!(store.snapshot(), PluginData::default());
    }

    #[test]
    fn test_json_file_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");

        let store = PluginDataStore::load(Box::new(JsonFilePersistence::new(&path)));
        store.set_tag_color("tasks", "urgent", "red").unwrap();
        store
            .set_sort_order("tasks", "Todo", vec!["first".into()])
            .unwrap();

        let reloaded = PluginDataStore::load(Box::new(JsonFilePersistence::new(&path)));
        assert_eq!(reloaded.tag_colors("tasks")["urgent"], "red");
        assert_eq!(reloaded.sort_order("tasks")["Todo"], vec!["first"]);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"tagColors\""));
        assert!(raw.contains("\"sortOrder\""));
    }

    #[test]
    fn test_corrupt_blob_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "{ not json").unwrap();

        let store = PluginDataStore::load(Box::new(JsonFilePersistence::new(&path)));
        assert_eq!(store.snapshot(), PluginData::default());
    }

    #[test]
    fn test_legacy_flat_blob_loads() {
        let data: PluginData =
            serde_json::from_str(r#"{"tagColors":{"tasks":{"a":"green"}}}"#).unwrap();
        assert_eq!(data.tag_colors["tasks"]["a"], "green");
        assert!(data.sort_order.is_empty());
        assert_eq!(data.settings.tasks_folder_path, "tasks");
    }
}
