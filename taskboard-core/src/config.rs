/// User-facing plugin settings, persisted inside the plugin data blob.
use serde::{Deserialize, Serialize};

pub const DEFAULT_TASKS_FOLDER: &str = "tasks";

/// Card display density.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Extended,
    #[default]
    Regular,
    Compact,
    Tight,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Adwaita,
    Nord,
    Catppuccin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSettings {
    #[serde(default = "default_tasks_folder")]
    pub tasks_folder_path: String,
    #[serde(default = "default_true")]
    pub enable_keyboard_shortcuts: bool,
    #[serde(default)]
    pub default_view_mode: ViewMode,
    #[serde(default)]
    pub theme: Theme,
}

fn default_tasks_folder() -> String {
    DEFAULT_TASKS_FOLDER.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            tasks_folder_path: default_tasks_folder(),
            enable_keyboard_shortcuts: true,
            default_view_mode: ViewMode::default(),
            theme: Theme::default(),
        }
    }
}

impl PluginSettings {
    /// Board root as a vault-relative path. Blank values fall back to the default folder.
    pub fn board_root(&self) -> &str {
        let trimmed = self.tasks_folder_path.trim().trim_matches('/');
        if trimmed.is_empty() {
            DEFAULT_TASKS_FOLDER
        } else {
            trimmed
        }
    }

    /// Normalize user input before it is stored.
    pub fn normalized(mut self) -> Self {
        self.tasks_folder_path = self.board_root().to_string();
        self
    }
}
