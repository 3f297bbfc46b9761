/// Tag colour assignment.
///
/// Every tag gets a default colour from a fixed palette of theme-provided
/// slots, picked by a hash of the tag name. Per-board overrides from the
/// plugin data store take precedence.

use std::collections::HashMap;

use crate::types::TagColorMapping;

/// Number of alternate colour slots every theme provides.
pub const PALETTE_SIZE: i32 = 7;

/// Palette slot for a tag name.
///
/// 32-bit `h = c + (h << 5) - h` over UTF-16 code units, the same hash the
/// board stylesheets were designed against, so colours stay stable across
/// implementations.
pub fn palette_index(tag: &str) -> usize {
    let mut hash: i32 = 0;
    for unit in tag.encode_utf16() {
        hash = (unit as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash));
    }
    (hash % PALETTE_SIZE).unsigned_abs() as usize
}

/// Colour string for a palette slot.
pub fn palette_color(index: usize) -> String {
    format!("var(--color-alt-{})", index)
}

/// Hash-derived colour, ignoring overrides.
pub fn default_color(tag: &str) -> String {
    palette_color(palette_index(tag))
}

/// Resolves tag colours for one board path against an override mapping.
pub struct TagColorAssigner<'a> {
    overrides: Option<&'a HashMap<String, String>>,
}

impl<'a> TagColorAssigner<'a> {
    pub fn new(board_path: &'a str, mapping: &'a TagColorMapping) -> Self {
        Self {
            overrides: mapping.get(board_path),
        }
    }

    pub fn color_for(&self, tag: &str) -> String {
        self.overrides
            .and_then(|o| o.get(tag))
            .cloned()
            .unwrap_or_else(|| default_color(tag))
    }

    pub fn has_override(&self, tag: &str) -> bool {
        self.overrides.map_or(false, |o| o.contains_key(tag))
    }
}
