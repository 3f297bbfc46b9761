/// Board service: the application context.
///
/// Created once at startup and handed to whoever renders the board. Owns the
/// file layer, the plugin data store and the refresh state. Every user action
/// goes through here: perform the change, announce the outcome as a notice,
/// then re-derive the whole board.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{Local, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::board::{aggregate, apply_manual_order, BoardInput, BoardQuery, BoardViewModel};
use crate::config::PluginSettings;
use crate::refresh::BoardState;
use crate::storage::{BoardFs, MutationOutcome, NoEffectReason, StorageError, TaskFiles};
use crate::store::{PluginDataStore, StoreError};
use crate::types::{file_name, join_path, parent_path, CARD_EXTENSION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-visible status message. Fire-and-forget: nothing reads it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct BoardService<F: BoardFs> {
    files: TaskFiles<F>,
    store: PluginDataStore,
    state: BoardState,
    /// Search and sort of the most recent render, reused by refreshes that
    /// follow a mutation or a file change.
    query: RwLock<BoardQuery>,
    notice_tx: broadcast::Sender<Notice>,
}

impl<F: BoardFs> BoardService<F> {
    pub fn new(fs: F, store: PluginDataStore) -> Self {
        let (notice_tx, _) = broadcast::channel(64);
        Self {
            files: TaskFiles::new(fs),
            store,
            state: BoardState::new(),
            query: RwLock::new(BoardQuery::default()),
            notice_tx,
        }
    }

    pub fn files(&self) -> &TaskFiles<F> {
        &self.files
    }

    pub fn store(&self) -> &PluginDataStore {
        &self.store
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn settings(&self) -> PluginSettings {
        self.store.settings()
    }

    /// Vault-relative path of the configured board root.
    pub fn board_root(&self) -> String {
        self.store.settings().board_root().to_string()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }

    pub fn current_query(&self) -> BoardQuery {
        self.query.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Create the board root when it is missing. A concurrent creation by
    /// someone else is not an error.
    pub fn ensure_board_root(&self) -> Result<MutationOutcome, ServiceError> {
        let root = self.board_root();
        let outcome = self.files.ensure_dir(&root)?;
        if outcome.is_applied() {
            self.notify(NoticeLevel::Info, format!("Created \"{}\" folder", root));
        } else {
            log::debug!("[taskboard.service.root] Board root {} left as is", root);
        }
        Ok(outcome)
    }

    /// Re-read every lane and card and publish a fresh view model.
    ///
    /// `query` replaces the remembered search/sort; `None` keeps it. When a
    /// newer refresh finished first, its model is returned instead.
    pub fn refresh(&self, query: Option<BoardQuery>) -> Result<Arc<BoardViewModel>, ServiceError> {
        if let Some(query) = query {
            *self.query.write().unwrap_or_else(PoisonError::into_inner) = query;
        }
        let query = self.current_query();
        let ticket = self.state.begin();

        let settings = self.store.settings();
        let root = settings.board_root().to_string();
        let lanes = self.files.list_lanes(&root)?;
        let mut cards = Vec::new();
        for lane in &lanes {
            cards.extend(self.files.list_cards(&lane.path)?);
        }
        let tag_colors = self.store.tag_color_mapping();
        let lane_orders = self.store.sort_order(&root);

        let model = aggregate(
            BoardInput {
                board_path: &root,
                lanes,
                cards,
                tag_colors: &tag_colors,
                lane_orders: &lane_orders,
                settings: &settings,
            },
            &query,
            Local::now().date_naive(),
        );

        match self.state.publish(ticket, model) {
            Ok(model) => {
                log::debug!(
                    "[taskboard.service.refresh] Published generation {} ({} cards)",
                    model.generation,
                    model.card_count()
                );
                Ok(model)
            }
            Err(stale) => Ok(self.state.current().unwrap_or_else(|| Arc::new(stale))),
        }
    }

    /// Refresh after a change, reporting failures instead of returning them.
    fn refresh_after(&self, action: &str) {
        if let Err(e) = self.refresh(None) {
            log::warn!("[taskboard.service.refresh] Refresh after {} failed: {}", action, e);
            self.notify(NoticeLevel::Error, format!("Failed to refresh board: {}", e));
        }
    }

    fn notify(&self, level: NoticeLevel, message: String) {
        // Nobody listening is fine.
        let _ = self.notice_tx.send(Notice { level, message });
    }

    /// Announce the outcome of a file operation and refresh on success.
    fn finish(
        &self,
        action: &str,
        subject: &str,
        result: Result<MutationOutcome, StorageError>,
    ) -> Result<MutationOutcome, ServiceError> {
        match result {
            Ok(outcome @ MutationOutcome::Applied { .. }) => {
                self.notify(NoticeLevel::Info, format!("{}: {}", action, subject));
                self.refresh_after(action);
                Ok(outcome)
            }
            Ok(MutationOutcome::NoEffect { reason }) => {
                log::info!(
                    "[taskboard.service.no_effect] {} {} had no effect: {}",
                    action,
                    subject,
                    reason
                );
                self.notify(
                    NoticeLevel::Warning,
                    format!("{} had no effect ({}): {}", action, reason, subject),
                );
                Ok(MutationOutcome::no_effect(reason))
            }
            Err(e) => {
                log::error!("[taskboard.service.error] {} {} failed: {}", action, subject, e);
                self.notify(NoticeLevel::Error, format!("{} failed: {}", action, e));
                Err(e.into())
            }
        }
    }

    fn store_result<T>(&self, action: &str, result: Result<T, StoreError>) -> Result<T, ServiceError> {
        match result {
            Ok(value) => {
                self.notify(NoticeLevel::Info, action.to_string());
                self.refresh_after(action);
                Ok(value)
            }
            Err(e) => {
                log::error!("[taskboard.service.error] {} failed: {}", action, e);
                self.notify(NoticeLevel::Error, format!("{} failed: {}", action, e));
                Err(e.into())
            }
        }
    }

    /// Path of the lane called `lane`, or `None` when `lane` is not a single
    /// directory name.
    fn lane_path(&self, root: &str, lane: &str) -> Option<String> {
        let lane = lane.trim();
        if lane.is_empty() || lane == "." || lane == ".." || lane.contains(['/', '\\']) {
            return None;
        }
        Some(join_path(root, lane))
    }

    /// `true` when `path` is strictly inside the board root.
    fn in_board(&self, root: &str, path: &str) -> bool {
        if path.split('/').any(|seg| seg == ".." || seg == ".") {
            return false;
        }
        path.trim_matches('/')
            .strip_prefix(root)
            .map_or(false, |rest| rest.starts_with('/') && rest.len() > 1)
    }

    pub fn create_lane(&self, name: Option<&str>) -> Result<MutationOutcome, ServiceError> {
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("Lane {}", Utc::now().timestamp_millis()));
        let root = self.board_root();
        let result = self.files.create_lane(&root, &name);
        self.finish("Created lane", &name, result)
    }

    pub fn rename_lane(&self, lane: &str, new_name: &str) -> Result<MutationOutcome, ServiceError> {
        let root = self.board_root();
        let Some(lane_path) = self.lane_path(&root, lane) else {
            return self.finish("Renamed lane", lane, Ok(MutationOutcome::no_effect(NoEffectReason::InvalidName)));
        };
        let result = self.files.rename_lane(&lane_path, new_name);
        if let Ok(MutationOutcome::Applied { path }) = &result {
            let new_lane = file_name(path).to_string();
            if let Err(e) = self.store.rename_sort_lane(&root, lane, &new_lane) {
                log::warn!("[taskboard.service.lane] Failed to carry lane order to {}: {}", new_lane, e);
            }
        }
        self.finish("Renamed lane", lane, result)
    }

    pub fn delete_lane(&self, lane: &str) -> Result<MutationOutcome, ServiceError> {
        let root = self.board_root();
        let Some(lane_path) = self.lane_path(&root, lane) else {
            return self.finish("Deleted lane", lane, Ok(MutationOutcome::no_effect(NoEffectReason::InvalidName)));
        };
        let result = self.files.delete_lane(&lane_path);
        if matches!(result, Ok(MutationOutcome::Applied { .. })) {
            if let Err(e) = self.store.clear_sort_order(&root, lane) {
                log::warn!("[taskboard.service.lane] Failed to drop lane order for {}: {}", lane, e);
            }
        }
        self.finish("Deleted lane", lane, result)
    }

    /// Create a card. Without a name the card is called `New Card <millis>`;
    /// without content it starts with a heading of its name.
    pub fn create_card(
        &self,
        lane: &str,
        name: Option<&str>,
        content: Option<&str>,
    ) -> Result<MutationOutcome, ServiceError> {
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("New Card {}", Utc::now().timestamp_millis()));
        let content = content
            .map(str::to_string)
            .unwrap_or_else(|| format!("# {}\n\n", name.trim()));
        let Some(lane_path) = self.lane_path(&self.board_root(), lane) else {
            return self.finish("Created card", &name, Ok(MutationOutcome::no_effect(NoEffectReason::InvalidName)));
        };
        let result = self.files.create_card(&lane_path, &name, &content);
        self.finish("Created card", &name, result)
    }

    pub fn update_card(&self, path: &str, content: &str) -> Result<MutationOutcome, ServiceError> {
        if !self.in_board(&self.board_root(), path) {
            return self.finish("Updated card", path, Ok(MutationOutcome::no_effect(NoEffectReason::OutsideBoard)));
        }
        let result = self.files.update_card_content(path, content);
        self.finish("Updated card", path, result)
    }

    pub fn rename_card(&self, path: &str, new_name: &str) -> Result<MutationOutcome, ServiceError> {
        let root = self.board_root();
        if !self.in_board(&root, path) {
            return self.finish("Renamed card", path, Ok(MutationOutcome::no_effect(NoEffectReason::OutsideBoard)));
        }
        let result = self.files.rename_card(path, new_name);
        if let Ok(MutationOutcome::Applied { path: new_path }) = &result {
            self.rename_in_lane_order(&root, path, new_path);
        }
        self.finish("Renamed card", path, result)
    }

    /// Move a card into `lane`. With `position`, the card is also placed at
    /// that index of the lane's manual order.
    pub fn move_card(
        &self,
        path: &str,
        lane: &str,
        position: Option<usize>,
    ) -> Result<MutationOutcome, ServiceError> {
        let root = self.board_root();
        if !self.in_board(&root, path) {
            return self.finish("Moved card", path, Ok(MutationOutcome::no_effect(NoEffectReason::OutsideBoard)));
        }
        let Some(lane_path) = self.lane_path(&root, lane) else {
            return self.finish("Moved card", path, Ok(MutationOutcome::no_effect(NoEffectReason::InvalidName)));
        };
        let result = self.files.move_card(path, &lane_path);
        if let (Ok(MutationOutcome::Applied { path: new_path }), Some(position)) = (&result, position) {
            if let Err(e) = self.place_in_lane(&root, lane, new_path, position) {
                log::warn!("[taskboard.service.order] Failed to place card in {}: {}", lane, e);
            }
        }
        self.finish("Moved card", path, result)
    }

    pub fn delete_card(&self, path: &str) -> Result<MutationOutcome, ServiceError> {
        if !self.in_board(&self.board_root(), path) {
            return self.finish("Deleted card", path, Ok(MutationOutcome::no_effect(NoEffectReason::OutsideBoard)));
        }
        let result = self.files.delete_card(path);
        self.finish("Deleted card", path, result)
    }

    pub fn set_tag_color(&self, tag: &str, color: &str) -> Result<(), ServiceError> {
        let root = self.board_root();
        let result = self.store.set_tag_color(&root, tag, color);
        self.store_result(&format!("Set colour of #{}", tag), result)
    }

    /// Drop a colour override. `Ok(false)` when there was none.
    pub fn clear_tag_color(&self, tag: &str) -> Result<bool, ServiceError> {
        let root = self.board_root();
        let result = self.store.remove_tag_color(&root, tag);
        self.store_result(&format!("Reset colour of #{}", tag), result)
    }

    pub fn set_lane_order(&self, lane: &str, card_names: Vec<String>) -> Result<(), ServiceError> {
        let root = self.board_root();
        let result = self.store.set_sort_order(&root, lane, card_names);
        self.store_result(&format!("Saved order of {}", lane), result)
    }

    pub fn clear_lane_order(&self, lane: &str) -> Result<bool, ServiceError> {
        let root = self.board_root();
        let result = self.store.clear_sort_order(&root, lane);
        self.store_result(&format!("Reset order of {}", lane), result)
    }

    pub fn update_settings(&self, settings: PluginSettings) -> Result<PluginSettings, ServiceError> {
        let result = self.store.update_settings(settings);
        self.store_result("Saved settings", result)
    }

    fn rename_in_lane_order(&self, root: &str, old_path: &str, new_path: &str) {
        let lane = file_name(parent_path(old_path));
        let Some(order) = self.store.sort_order(root).remove(lane) else {
            return;
        };
        let old_name = card_name(old_path);
        let new_name = card_name(new_path);
        let renamed = order
            .into_iter()
            .map(|n| if n == old_name { new_name.to_string() } else { n })
            .collect();
        if let Err(e) = self.store.set_sort_order(root, lane, renamed) {
            log::warn!("[taskboard.service.order] Failed to update order of {}: {}", lane, e);
        }
    }

    fn place_in_lane(&self, root: &str, lane: &str, card_path: &str, position: usize) -> Result<(), ServiceError> {
        let moved = card_name(card_path).to_string();
        let existing = self.store.sort_order(root).remove(lane).unwrap_or_default();
        let cards = self.files.list_cards(&join_path(root, lane))?;
        let mut names: Vec<String> = apply_manual_order(cards, &existing, |c| c.name.as_str())
            .into_iter()
            .map(|c| c.name)
            .filter(|n| *n != moved)
            .collect();
        names.insert(position.min(names.len()), moved);
        self.store.set_sort_order(root, lane, names)?;
        Ok(())
    }
}

fn card_name(path: &str) -> &str {
    let file = file_name(path);
    file.strip_suffix(CARD_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::local::LocalFs;
    use crate::store::MemoryPersistence;
    use crate::types::SortMode;
    use std::fs;
    use tempfile::TempDir;

    fn service() -> (TempDir, BoardService<LocalFs>) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tasks");
        fs::create_dir_all(root.join("Todo")).unwrap();
        fs::create_dir_all(root.join("Done")).unwrap();
        fs::write(root.join("Todo").join("a.md"), "#urgent first").unwrap();
        fs::write(root.join("Todo").join("b.md"), "second").unwrap();
        let store = PluginDataStore::load(Box::new(MemoryPersistence::new()));
        let svc = BoardService::new(LocalFs::new(dir.path()), store);
        (dir, svc)
    }

    fn lane_cards(model: &BoardViewModel, lane: &str) -> Vec<String> {
        model
            .lane(lane)
            .map(|l| l.cards.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_refresh_builds_model() {
        let (_dir, svc) = service();
        let model = svc.refresh(None).unwrap();
        assert_eq!(model.board_path, "tasks");
        assert_eq!(lane_cards(&model, "Todo"), vec!["a", "b"]);
        assert!(model.generation > 0);
        assert_eq!(svc.state().current().unwrap().generation, model.generation);
    }

    #[test]
    fn test_refresh_remembers_query() {
        let (_dir, svc) = service();
        let query = BoardQuery {
            search: "second".into(),
            sort: SortMode::Name,
        };
        svc.refresh(Some(query.clone())).unwrap();
        let model = svc.refresh(None).unwrap();
        assert_eq!(lane_cards(&model, "Todo"), vec!["b"]);
        assert_eq!(svc.current_query(), query);
    }

    #[test]
    fn test_mutations_notify_and_refresh() {
        let (_dir, svc) = service();
        let mut notices = svc.subscribe_notices();

        let outcome = svc.create_card("Done", Some("c"), None).unwrap();
        assert_eq!(outcome, MutationOutcome::applied("tasks/Done/c.md"));
        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Info);

        let model = svc.state().current().unwrap();
        assert_eq!(lane_cards(&model, "Done"), vec!["c"]);
        let card = &model.lane("Done").unwrap().cards[0];
        assert_eq!(card.content, "# c\n\n");
    }

    #[test]
    fn test_no_effect_is_reported() {
        let (_dir, svc) = service();
        let mut notices = svc.subscribe_notices();
        let outcome = svc.create_card("Nope", Some("ghost"), None).unwrap();
        assert_eq!(outcome, MutationOutcome::no_effect(NoEffectReason::Missing));
        assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Warning);
        assert!(svc.state().current().is_none());
    }

    #[test]
    fn test_paths_outside_board_are_refused() {
        let (dir, svc) = service();
        fs::write(dir.path().join("outside.md"), "keep").unwrap();
        assert_eq!(
            svc.delete_card("outside.md").unwrap(),
            MutationOutcome::no_effect(NoEffectReason::OutsideBoard)
        );
        assert_eq!(
            svc.update_card("tasks", "x").unwrap(),
            MutationOutcome::no_effect(NoEffectReason::OutsideBoard)
        );
        assert_eq!(
            svc.delete_card("tasks/../outside.md").unwrap(),
            MutationOutcome::no_effect(NoEffectReason::OutsideBoard)
        );
        assert!(dir.path().join("outside.md").exists());
    }

    #[test]
    fn test_lane_names_must_be_single_segments() {
        let (dir, svc) = service();
        assert_eq!(
            svc.delete_lane("..").unwrap(),
            MutationOutcome::no_effect(NoEffectReason::InvalidName)
        );
        assert_eq!(
            svc.move_card("tasks/Todo/a.md", "Done/../..", None).unwrap(),
            MutationOutcome::no_effect(NoEffectReason::InvalidName)
        );
        assert!(dir.path().join("tasks").join("Todo").join("a.md").exists());
    }

    #[test]
    fn test_default_names() {
        let (_dir, svc) = service();
        let lane = svc.create_lane(None).unwrap();
        match lane {
            MutationOutcome::Applied { path } => assert!(path.starts_with("tasks/Lane ")),
            other => panic!("unexpected {:?}", other),
        }
        let card = svc.create_card("Todo", None, None).unwrap();
        match card {
            MutationOutcome::Applied { path } => assert!(path.starts_with("tasks/Todo/New Card ")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_move_card_with_position_updates_order() {
        let (_dir, svc) = service();
        svc.create_card("Done", Some("x"), Some("")).unwrap();
        svc.create_card("Done", Some("y"), Some("")).unwrap();

        let outcome = svc.move_card("tasks/Todo/b.md", "Done", Some(1)).unwrap();
        assert_eq!(outcome, MutationOutcome::applied("tasks/Done/b.md"));
        assert_eq!(svc.store().sort_order("tasks")["Done"], vec!["x", "b", "y"]);

        let model = svc.state().current().unwrap();
        assert_eq!(lane_cards(&model, "Done"), vec!["x", "b", "y"]);
        assert_eq!(lane_cards(&model, "Todo"), vec!["a"]);
    }

    #[test]
    fn test_rename_card_keeps_manual_order() {
        let (_dir, svc) = service();
        svc.set_lane_order("Todo", vec!["b".into(), "a".into()]).unwrap();
        svc.rename_card("tasks/Todo/a.md", "z").unwrap();
        assert_eq!(svc.store().sort_order("tasks")["Todo"], vec!["b", "z"]);
        let model = svc.state().current().unwrap();
        assert_eq!(lane_cards(&model, "Todo"), vec!["b", "z"]);
    }

    #[test]
    fn test_rename_and_delete_lane_follow_order() {
        let (_dir, svc) = service();
        svc.set_lane_order("Todo", vec!["b".into()]).unwrap();
        svc.rename_lane("Todo", "Backlog").unwrap();
        assert!(svc.store().sort_order("tasks").contains_key("Backlog"));

        svc.delete_lane("Backlog").unwrap();
        assert!(svc.store().sort_order("tasks").is_empty());
        let model = svc.state().current().unwrap();
        assert!(model.lane("Backlog").is_none());
        assert_eq!(model.card_count(), 0);
    }

    #[test]
    fn test_tag_color_override_in_model() {
        let (_dir, svc) = service();
        svc.set_tag_color("urgent", "red").unwrap();
        let model = svc.state().current().unwrap();
        assert_eq!(model.tag_options[0].background_color, "red");
        assert!(svc.clear_tag_color("urgent").unwrap());
        assert!(!svc.clear_tag_color("urgent").unwrap());
    }

    #[test]
    fn test_settings_change_moves_board_root() {
        let (dir, svc) = service();
        fs::create_dir_all(dir.path().join("work").join("Inbox")).unwrap();
        let settings = PluginSettings {
            tasks_folder_path: "work".into(),
            ..Default::default()
        };
        svc.update_settings(settings).unwrap();
        let model = svc.state().current().unwrap();
        assert_eq!(model.board_path, "work");
        assert!(model.lane("Inbox").is_some());
    }

    struct ReadOnlyData;

    impl crate::store::DataPersistence for ReadOnlyData {
        fn load(&self) -> Result<Option<crate::store::PluginData>, StoreError> {
            Ok(None)
        }
        fn save(&self, _data: &crate::store::PluginData) -> Result<(), StoreError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    #[test]
    fn test_failed_save_leaves_board_unchanged() {
        let (dir, _) = service();
        let store = PluginDataStore::load(Box::new(ReadOnlyData));
        let svc = BoardService::new(LocalFs::new(dir.path()), store);
        let before = svc.refresh(None).unwrap();
        let mut notices = svc.subscribe_notices();

        assert!(svc.set_tag_color("urgent", "red").is_err());
        assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Error);
        let after = svc.refresh(None).unwrap();
        assert_eq!(after.tag_options, before.tag_options);
        assert_ne!(after.tag_options[0].background_color, "red");

        let moved = PluginSettings {
            tasks_folder_path: "elsewhere".into(),
            ..Default::default()
        };
        assert!(svc.update_settings(moved).is_err());
        assert_eq!(svc.board_root(), "tasks");
        assert_eq!(svc.refresh(None).unwrap().board_path, "tasks");
    }

    #[test]
    fn test_ensure_board_root() {
        let (dir, svc) = service();
        assert!(!svc.ensure_board_root().unwrap().is_applied());
        svc.update_settings(PluginSettings {
            tasks_folder_path: "fresh".into(),
            ..Default::default()
        })
        .unwrap();
        assert!(svc.ensure_board_root().unwrap().is_applied());
        assert!(dir.path().join("fresh").is_dir());
    }
}
