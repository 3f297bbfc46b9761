use unicode_normalization::UnicodeNormalization;

use crate::types::Card;

/// Unicode-aware normalization for search: lowercases, NFD-decomposes, and
/// strips combining marks (accents), so "resume" also finds "Résumé".
pub fn normalize_for_search(value: &str) -> String {
    value
        .to_lowercase()
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect()
}

/// Board search box: a case-insensitive substring match on card name or content.
#[derive(Debug, Clone, Default)]
pub struct CardFilter {
    needle: Option<String>,
}

impl CardFilter {
    pub fn new(search: &str) -> Self {
        let trimmed = search.trim();
        Self {
            needle: (!trimmed.is_empty()).then(|| normalize_for_search(trimmed)),
        }
    }

    /// An empty filter matches every card.
    pub fn is_empty(&self) -> bool {
        self.needle.is_none()
    }

    pub fn matches(&self, card: &Card) -> bool {
        match &self.needle {
            None => true,
            Some(needle) => {
                normalize_for_search(&card.name).contains(needle.as_str())
                    || normalize_for_search(&card.content).contains(needle.as_str())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn card(name: &str, content: &str) -> Card {
        Card {
            name: name.into(),
            lane: "Todo".into(),
            path: format!("tasks/Todo/{}.md", name),
            content: content.into(),
            tags: Vec::new(),
            due_date: None,
            created_at: Utc::now(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_filter_name_or_content_case_insensitive() {
        let cards = vec![
            card("Foobar", ""),
            card("baz", "contains foo"),
            card("qux", ""),
        ];
        let filter = CardFilter::new("foo");
        let hits: Vec<_> = cards
            .iter()
            .filter(|c| filter.matches(c))
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(hits, vec!["Foobar", "baz"]);

        let upper = CardFilter::new("FOO");
        assert_eq!(cards.iter().filter(|c| upper.matches(c)).count(), 2);
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = CardFilter::new("   ");
        assert!(filter.is_empty());
        assert!(filter.matches(&card("anything", "")));
    }

    #[test]
    fn test_accents_ignored() {
        let filter = CardFilter::new("resume");
        assert!(filter.matches(&card("Update Résumé", "")));
    }
}
