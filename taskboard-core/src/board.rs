/// Board aggregation: lanes + cards + overrides -> render-ready view model.
///
/// Stateless. Every call derives the whole model again from its inputs.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::config::{PluginSettings, Theme, ViewMode};
use crate::parser::due_date_to_naive;
use crate::search::CardFilter;
use crate::tag_color::TagColorAssigner;
use crate::types::{Card, CardTag, Lane, SortMode, TagColorMapping};

/// What the user currently asked the board to show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardQuery {
    pub search: String,
    pub sort: SortMode,
}

/// Raw material for one aggregation pass.
pub struct BoardInput<'a> {
    pub board_path: &'a str,
    pub lanes: Vec<Lane>,
    pub cards: Vec<Card>,
    pub tag_colors: &'a TagColorMapping,
    /// Lane name -> card names in manual order, for this board.
    pub lane_orders: &'a HashMap<String, Vec<String>>,
    pub settings: &'a PluginSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub name: String,
    pub lane: String,
    pub path: String,
    pub content: String,
    pub tags: Vec<CardTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub overdue: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneView {
    pub name: String,
    pub path: String,
    pub count: usize,
    pub cards: Vec<CardView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardViewModel {
    pub board_path: String,
    /// Refresh generation that produced this model (0 until published).
    pub generation: u64,
    pub view_mode: ViewMode,
    pub keyboard_shortcuts: bool,
    pub theme: Theme,
    pub sort: SortMode,
    pub search: String,
    pub lanes: Vec<LaneView>,
    /// Every tag on the board with its resolved colour, in first-seen order.
    pub tag_options: Vec<CardTag>,
    /// Matching cards whose lane is not among the listed lanes.
    pub orphaned_cards: usize,
}

impl BoardViewModel {
    pub fn lane(&self, name: &str) -> Option<&LaneView> {
        self.lanes.iter().find(|l| l.name == name)
    }

    pub fn card_count(&self) -> usize {
        self.lanes.iter().map(|l| l.count).sum()
    }
}

/// Resolve one colour per tag name for the whole board.
pub fn resolve_tag_options(cards: &[Card], assigner: &TagColorAssigner<'_>) -> Vec<CardTag> {
    let mut options: Vec<CardTag> = Vec::new();
    for card in cards {
        for name in card.tag_names() {
            if !options.iter().any(|t| t.name == name) {
                options.push(CardTag {
                    name: name.to_string(),
                    background_color: assigner.color_for(name),
                });
            }
        }
    }
    options
}

/// Sort in place. Sorting is stable, so ties keep source order.
pub fn sort_cards(cards: &mut [Card], mode: SortMode) {
    match mode {
        SortMode::None => {}
        SortMode::Name => cards.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        }),
        SortMode::LastUpdated => cards.sort_by(|a, b| b.last_updated.cmp(&a.last_updated)),
    }
}

/// Put cards named in `order` first, in that order; the rest follow in
/// their current order. Names that no longer exist are skipped.
pub fn apply_manual_order<T>(cards: Vec<T>, order: &[String], name_of: impl Fn(&T) -> &str) -> Vec<T> {
    if order.is_empty() {
        return cards;
    }
    let mut slots: Vec<Option<T>> = cards.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(slots.len());
    for wanted in order {
        if let Some(slot) = slots
            .iter_mut()
            .find(|s| s.as_ref().map_or(false, |c| name_of(c) == wanted))
        {
            if let Some(card) = slot.take() {
                ordered.push(card);
            }
        }
    }
    ordered.extend(slots.into_iter().flatten());
    ordered
}

fn to_view(card: Card, colors: &HashMap<&str, &str>, today: NaiveDate) -> CardView {
    let tags = card
        .tags
        .into_iter()
        .map(|t| CardTag {
            background_color: colors
                .get(t.name.as_str())
                .map(|c| c.to_string())
                .unwrap_or(t.background_color),
            name: t.name,
        })
        .collect();
    let overdue = card
        .due_date
        .as_deref()
        .and_then(due_date_to_naive)
        .map_or(false, |d| d < today);
    CardView {
        name: card.name,
        lane: card.lane,
        path: card.path,
        content: card.content,
        tags,
        due_date: card.due_date,
        overdue,
        created_at: card.created_at,
        last_updated: card.last_updated,
    }
}

/// Build the view model for one render.
pub fn aggregate(input: BoardInput<'_>, query: &BoardQuery, today: NaiveDate) -> BoardViewModel {
    let BoardInput {
        board_path,
        lanes,
        mut cards,
        tag_colors,
        lane_orders,
        settings,
    } = input;

    let assigner = TagColorAssigner::new(board_path, tag_colors);
    let tag_options = resolve_tag_options(&cards, &assigner);

    sort_cards(&mut cards, query.sort);
    let filter = CardFilter::new(&query.search);
    cards.retain(|c| filter.matches(c));

    let colors: HashMap<&str, &str> = tag_options
        .iter()
        .map(|t| (t.name.as_str(), t.background_color.as_str()))
        .collect();

    let mut by_lane: HashMap<String, Vec<CardView>> = HashMap::new();
    let mut orphaned_cards = 0;
    for card in cards {
        if lanes.iter().any(|l| l.name == card.lane) {
            let view = to_view(card, &colors, today);
            by_lane.entry(view.lane.clone()).or_default().push(view);
        } else {
            orphaned_cards += 1;
        }
    }
    if orphaned_cards > 0 {
        log::debug!(
            "[taskboard.board.aggregate] {} card(s) without a matching lane in {}",
            orphaned_cards,
            board_path
        );
    }

    let lanes = lanes
        .into_iter()
        .map(|lane| {
            let mut cards = by_lane.remove(&lane.name).unwrap_or_default();
            if query.sort == SortMode::None {
                if let Some(order) = lane_orders.get(&lane.name) {
                    cards = apply_manual_order(cards, order, |c| c.name.as_str());
                }
            }
            LaneView {
                count: cards.len(),
                name: lane.name,
                path: lane.path,
                cards,
            }
        })
        .collect();

    BoardViewModel {
        board_path: board_path.to_string(),
        generation: 0,
        view_mode: settings.default_view_mode,
        keyboard_shortcuts: settings.enable_keyboard_shortcuts,
        theme: settings.theme,
        sort: query.sort,
        search: query.search.clone(),
        lanes,
        tag_options,
        orphaned_cards,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag_color::default_color;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn card(lane: &str, name: &str, content: &str, updated: i64) -> Card {
        let parsed = crate::parser::parse_content(content);
        Card {
            name: name.into(),
            lane: lane.into(),
            path: format!("tasks/{}/{}.md", lane, name),
            content: content.into(),
            tags: parsed
                .tags
                .into_iter()
                .map(|n| CardTag {
                    background_color: default_color(&n),
                    name: n,
                })
                .collect(),
            due_date: parsed.due_date,
            created_at: ts(0),
            last_updated: ts(updated),
        }
    }

    fn lane(name: &str) -> Lane {
        Lane {
            name: name.into(),
            path: format!("tasks/{}", name),
        }
    }

    fn names(cards: &[CardView]) -> Vec<&str> {
        cards.iter().map(|c| c.name.as_str()).collect()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    struct Fixture {
        colors: TagColorMapping,
        orders: HashMap<String, Vec<String>>,
        settings: PluginSettings,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                colors: TagColorMapping::new(),
                orders: HashMap::new(),
                settings: PluginSettings::default(),
            }
        }

        fn run(&self, lanes: Vec<Lane>, cards: Vec<Card>, query: &BoardQuery) -> BoardViewModel {
            aggregate(
                BoardInput {
                    board_path: "tasks",
                    lanes,
                    cards,
                    tag_colors: &self.colors,
                    lane_orders: &self.orders,
                    settings: &self.settings,
                },
                query,
                today(),
            )
        }
    }

    #[test]
    fn test_sort_by_name() {
        let mut cards = vec![card("T", "b", "", 0), card("T", "a", "", 0), card("T", "c", "", 0)];
        sort_cards(&mut cards, SortMode::Name);
        let got: Vec<_> = cards.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(got, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sort_by_name_ignores_case() {
        let mut cards = vec![card("T", "beta", "", 0), card("T", "Alpha", "", 0), card("T", "alpha", "", 0)];
        sort_cards(&mut cards, SortMode::Name);
        let got: Vec<_> = cards.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(got, vec!["Alpha", "alpha", "beta"]);
    }

    #[test]
    fn test_sort_by_last_updated_descending() {
        let mut cards = vec![card("T", "t2", "", 20), card("T", "t1", "", 10), card("T", "t3", "", 30)];
        sort_cards(&mut cards, SortMode::LastUpdated);
        let got: Vec<_> = cards.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(got, vec!["t3", "t2", "t1"]);
    }

    #[test]
    fn test_no_sort_preserves_source_order() {
        let fx = Fixture::new();
        let cards = vec![card("T", "b", "", 0), card("T", "a", "", 0), card("T", "c", "", 0)];
        let model = fx.run(vec![lane("T")], cards, &BoardQuery::default());
        assert_eq!(names(&model.lanes[0].cards), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_search_filters_name_or_content() {
        let fx = Fixture::new();
        let cards = vec![
            card("T", "Foobar", "", 0),
            card("T", "baz", "contains foo", 0),
            card("T", "qux", "", 0),
        ];
        let query = BoardQuery {
            search: "foo".into(),
            sort: SortMode::None,
        };
        let model = fx.run(vec![lane("T")], cards, &query);
        assert_eq!(names(&model.lanes[0].cards), vec!["Foobar", "baz"]);
        assert_eq!(model.lanes[0].count, 2);
    }

    #[test]
    fn test_cards_partitioned_by_lane_and_orphans_counted() {
        let fx = Fixture::new();
        let cards = vec![
            card("Todo", "a", "", 0),
            card("Done", "b", "", 0),
            card("Gone", "c", "", 0),
        ];
        let model = fx.run(vec![lane("Todo"), lane("Done")], cards, &BoardQuery::default());
        assert_eq!(names(&model.lane("Todo").unwrap().cards), vec!["a"]);
        assert_eq!(names(&model.lane("Done").unwrap().cards), vec!["b"]);
        assert_eq!(model.orphaned_cards, 1);
        assert_eq!(model.card_count(), 2);
    }

    #[test]
    fn test_empty_lane_still_rendered() {
        let fx = Fixture::new();
        let model = fx.run(vec![lane("Empty")], Vec::new(), &BoardQuery::default());
        assert_eq!(model.lanes.len(), 1);
        assert_eq!(model.lanes[0].count, 0);
    }

    #[test]
    fn test_shared_tag_colors_use_overrides() {
        let mut fx = Fixture::new();
        fx.colors
            .entry("tasks".into())
            .or_default()
            .insert("urgent".into(), "red".into());
        let cards = vec![
            card("T", "a", "#urgent #ops", 0),
            card("T", "b", "#ops #urgent", 0),
        ];
        let model = fx.run(vec![lane("T")], cards, &BoardQuery::default());

        let options: Vec<_> = model.tag_options.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(options, vec!["urgent", "ops"]);
        for c in &model.lanes[0].cards {
            for tag in &c.tags {
                let expected = if tag.name == "urgent" {
                    "red".to_string()
                } else {
                    default_color("ops")
                };
                assert_eq!(tag.background_color, expected);
            }
        }
        assert_eq!(model.lanes[0].cards[1].tags[0].name, "ops");
    }

    #[test]
    fn test_tag_options_include_filtered_out_cards() {
        let fx = Fixture::new();
        let cards = vec![card("T", "a", "#hidden", 0), card("T", "match", "", 0)];
        let query = BoardQuery {
            search: "match".into(),
            sort: SortMode::None,
        };
        let model = fx.run(vec![lane("T")], cards, &query);
        assert_eq!(model.tag_options.len(), 1);
        assert_eq!(model.lanes[0].count, 1);
    }

    #[test]
    fn test_manual_order_applies_without_sort() {
        let mut fx = Fixture::new();
        fx.orders.insert(
            "T".into(),
            vec!["c".into(), "stale".into(), "a".into()],
        );
        let cards = vec![card("T", "a", "", 0), card("T", "b", "", 0), card("T", "c", "", 0)];
        let model = fx.run(vec![lane("T")], cards.clone(), &BoardQuery::default());
        assert_eq!(names(&model.lanes[0].cards), vec!["c", "a", "b"]);

        let by_name = BoardQuery {
            search: String::new(),
            sort: SortMode::Name,
        };
        let model = fx.run(vec![lane("T")], cards, &by_name);
        assert_eq!(names(&model.lanes[0].cards), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_overdue_flag() {
        let fx = Fixture::new();
        let cards = vec![
            card("T", "late", "[due:2024-05-31]", 0),
            card("T", "today", "[due:2024-06-01]", 0),
            card("T", "vague", "[due:someday]", 0),
        ];
        let model = fx.run(vec![lane("T")], cards, &BoardQuery::default());
        let flags: Vec<_> = model.lanes[0].cards.iter().map(|c| c.overdue).collect();
        assert_eq!(flags, vec![true, false, false]);
        assert_eq!(model.lanes[0].cards[2].due_date.as_deref(), Some("someday"));
    }

    #[test]
    fn test_settings_surface_in_model() {
        let mut fx = Fixture::new();
        fx.settings.default_view_mode = ViewMode::Tight;
        fx.settings.enable_keyboard_shortcuts = false;
        let model = fx.run(Vec::new(), Vec::new(), &BoardQuery::default());
        assert_eq!(model.view_mode, ViewMode::Tight);
        assert!(!model.keyboard_shortcuts);
        assert_eq!(model.generation, 0);
    }
}
