use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// File extension a lane entry must carry to be listed as a card.
pub const CARD_EXTENSION: &str = "md";

/// Board-root path -> tag name -> colour.
pub type TagColorMapping = HashMap<String, HashMap<String, String>>;

/// Board-root path -> lane name -> card names in manual order.
pub type SortOrderMapping = HashMap<String, HashMap<String, Vec<String>>>;

/// One kanban column, backed by a directory directly under the board root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lane {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardTag {
    pub name: String,
    pub background_color: String,
}

/// One task, backed by a markdown file inside a lane directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// File name without the `.md` extension.
    pub name: String,
    /// Name of the parent lane directory.
    pub lane: String,
    pub path: String,
    pub content: String,
    pub tags: Vec<CardTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Card {
    /// Bare tag names in the order they appear on the card.
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|t| t.name.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortMode {
    #[default]
    None,
    Name,
    LastUpdated,
}

impl SortMode {
    /// Parse the query-string spelling used by the board view.
    pub fn from_query(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Some(SortMode::None),
            "name" => Some(SortMode::Name),
            "lastupdated" | "last-updated" | "last_updated" | "updated" => {
                Some(SortMode::LastUpdated)
            }
            _ => None,
        }
    }
}

/// Join vault-relative path segments with `/`, ignoring empty segments.
pub fn join_path(parent: &str, child: &str) -> String {
    let parent = parent.trim_matches('/');
    let child = child.trim_matches('/');
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (false, true) => parent.to_string(),
        (false, false) => format!("{}/{}", parent, child),
    }
}

/// Parent of a vault-relative path ("" for top-level entries).
pub fn parent_path(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Last segment of a vault-relative path.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}
