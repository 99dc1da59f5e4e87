//! Section ordering engine.
//!
//! Turns the current item snapshot of a list plus its store layout into the
//! display order shown to shoppers. Rendering is a pure function of its input
//! and is recomputed from scratch on every change.

mod sections;

pub use sections::*;

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Item, Store};

/// Header for items whose section matches nothing in the store.
pub const UNSORTED_LABEL: &str = "Unsorted";

/// Rank given to unmatched items; greater than any real section position.
const UNSORTED_RANK: usize = usize::MAX;

/// A run of items displayed under one section header.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SectionGroup {
    /// `None` for the single header-less group of an unordered list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub items: Vec<Item>,
}

/// Display-ready view of a list.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderedList {
    /// Store actually used for ordering, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    pub grouped: bool,
    pub groups: Vec<SectionGroup>,
}

impl RenderedList {
    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }
}

/// Order and group `items` for display.
///
/// Items are first put in creation order (`created_at`, then `id`). With no
/// store, or a store without sections, the result is one header-less group.
/// Otherwise items are stably sorted by the position of their section in
/// `store.sections` (case-insensitive; a name listed twice takes its last
/// position). Unmatched, blank and literal "Unsorted" sections form a trailing
/// "Unsorted" group.
///
/// Group labels use the store's spelling of a section rather than each item's
/// own text, so "dairy" and "DAIRY" items share one "Dairy" header instead of
/// splitting by case.
///
/// `search` keeps only items whose text contains it, ignoring case.
pub fn render(items: &[Item], store: Option<&Store>, search: Option<&str>) -> RenderedList {
    let needle = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut visible: Vec<&Item> = items
        .iter()
        .filter(|item| match &needle {
            Some(n) => item.text.to_lowercase().contains(n.as_str()),
            None => true,
        })
        .collect();
    visible.sort_by(|a, b| creation_order(a, b));

    let store = match store {
        Some(s) if !s.sections.is_empty() => s,
        _ => {
            return RenderedList {
                store_id: None,
                grouped: false,
                groups: vec![SectionGroup {
                    label: None,
                    items: visible.into_iter().cloned().collect(),
                }],
            }
        }
    };

    let ranks = rank_map(&store.sections);
    let mut ranked: Vec<(usize, &Item)> = visible
        .into_iter()
        .map(|item| (section_rank(&ranks, item.section.as_deref()), item))
        .collect();
    // Stable: equal ranks keep creation order.
    ranked.sort_by_key(|(rank, _)| *rank);

    let mut groups: Vec<SectionGroup> = Vec::new();
    let mut current_rank: Option<usize> = None;
    for (rank, item) in ranked {
        if current_rank != Some(rank) {
            let label = if rank == UNSORTED_RANK {
                UNSORTED_LABEL.to_string()
            } else {
                store.sections[rank].clone()
            };
            groups.push(SectionGroup {
                label: Some(label),
                items: Vec::new(),
            });
            current_rank = Some(rank);
        }
        if let Some(group) = groups.last_mut() {
            group.items.push(item.clone());
        }
    }

    RenderedList {
        store_id: Some(store.id.clone()),
        grouped: true,
        groups,
    }
}

/// Lower-cased section name to its position in the layout; later duplicates win.
fn rank_map(sections: &[String]) -> HashMap<String, usize> {
    let mut ranks = HashMap::with_capacity(sections.len());
    for (position, name) in sections.iter().enumerate() {
        ranks.insert(name.trim().to_lowercase(), position);
    }
    ranks
}

fn section_rank(ranks: &HashMap<String, usize>, section: Option<&str>) -> usize {
    let key = match section.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_lowercase(),
        _ => return UNSORTED_RANK,
    };
    if key == UNSORTED_LABEL.to_lowercase() {
        return UNSORTED_RANK;
    }
    ranks.get(&key).copied().unwrap_or(UNSORTED_RANK)
}

fn creation_order(a: &Item, b: &Item) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, text: &str, section: &str, created_at: &str) -> Item {
        Item {
            id: id.to_string(),
            list_id: "list-1".to_string(),
            text: text.to_string(),
            section: if section.is_empty() {
                None
            } else {
                Some(section.to_string())
            },
            checked: false,
            checked_at: None,
            note: None,
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
        }
    }

    fn store(sections: &[&str]) -> Store {
        Store {
            id: "store-1".to_string(),
            name: "Mart".to_string(),
            sections: sections.iter().map(|s| s.to_string()).collect(),
            created_at: "2026-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000000Z".to_string(),
        }
    }

    fn labels(rendered: &RenderedList) -> Vec<Option<String>> {
        rendered.groups.iter().map(|g| g.label.clone()).collect()
    }

    fn texts(group: &SectionGroup) -> Vec<&str> {
        group.items.iter().map(|i| i.text.as_str()).collect()
    }

    #[test]
    fn test_mart_scenario_groups_by_store_order() {
        let items = vec![
            item("a", "Milk", "Dairy", "2026-01-01T10:00:00.000001Z"),
            item("b", "Apple", "Produce", "2026-01-01T10:00:00.000002Z"),
            item("c", "Soap", "", "2026-01-01T10:00:00.000003Z"),
        ];
        let mart = store(&["Produce", "Dairy"]);

        let rendered = render(&items, Some(&mart), None);

        assert!(rendered.grouped);
        assert_eq!(
            labels(&rendered),
            vec![
                Some("Produce".to_string()),
                Some("Dairy".to_string()),
                Some("Unsorted".to_string())
            ]
        );
        assert_eq!(texts(&rendered.groups[0]), vec!["Apple"]);
        assert_eq!(texts(&rendered.groups[1]), vec!["Milk"]);
        assert_eq!(texts(&rendered.groups[2]), vec!["Soap"]);
    }

    #[test]
    fn test_no_store_is_flat_creation_order() {
        let items = vec![
            item("b", "Second", "Dairy", "2026-01-01T10:00:02.000000Z"),
            item("a", "First", "Produce", "2026-01-01T10:00:01.000000Z"),
        ];

        let rendered = render(&items, None, None);

        assert!(!rendered.grouped);
        assert_eq!(rendered.store_id, None);
        assert_eq!(rendered.groups.len(), 1);
        assert_eq!(rendered.groups[0].label, None);
        assert_eq!(texts(&rendered.groups[0]), vec!["First", "Second"]);
    }

    #[test]
    fn test_store_without_sections_is_flat() {
        let items = vec![item("a", "Milk", "Dairy", "2026-01-01T10:00:00.000000Z")];
        let rendered = render(&items, Some(&store(&[])), None);
        assert!(!rendered.grouped);
        assert_eq!(rendered.groups.len(), 1);
    }

    #[test]
    fn test_section_match_ignores_case_and_uses_store_spelling() {
        let items = vec![
            item("a", "Milk", "dairy", "2026-01-01T10:00:01.000000Z"),
            item("b", "Cheese", "DAIRY", "2026-01-01T10:00:02.000000Z"),
            item("c", "Kale", "produce", "2026-01-01T10:00:03.000000Z"),
        ];
        let rendered = render(&items, Some(&store(&["Produce", "Dairy"])), None);

        assert_eq!(
            labels(&rendered),
            vec![Some("Produce".to_string()), Some("Dairy".to_string())]
        );
        assert_eq!(texts(&rendered.groups[1]), vec!["Milk", "Cheese"]);
    }

    #[test]
    fn test_stale_and_literal_unsorted_sections_share_trailing_bucket() {
        let items = vec![
            item("a", "Bagel", "Bakery", "2026-01-01T10:00:01.000000Z"),
            item("b", "Tape", "Unsorted", "2026-01-01T10:00:02.000000Z"),
            item("c", "Milk", "Dairy", "2026-01-01T10:00:03.000000Z"),
            item("d", "Gum", "  ", "2026-01-01T10:00:04.000000Z"),
        ];
        let rendered = render(&items, Some(&store(&["Dairy"])), None);

        assert_eq!(
            labels(&rendered),
            vec![Some("Dairy".to_string()), Some("Unsorted".to_string())]
        );
        assert_eq!(texts(&rendered.groups[1]), vec!["Bagel", "Tape", "Gum"]);
    }

    #[test]
    fn test_lower_section_index_always_sorts_first() {
        let sections = ["Produce", "Bakery", "Dairy", "Frozen"];
        let layout = store(&sections);
        let mut items = Vec::new();
        // Reverse insertion so creation order disagrees with aisle order.
        for (n, name) in sections.iter().rev().enumerate() {
            items.push(item(
                &format!("id-{n}"),
                &format!("thing-{n}"),
                name,
                &format!("2026-01-01T10:00:0{n}.000000Z"),
            ));
        }
        items.push(item("x", "loose", "", "2026-01-01T09:00:00.000000Z"));

        let rendered = render(&items, Some(&layout), None);
        let order: Vec<String> = rendered
            .groups
            .iter()
            .flat_map(|g| g.items.iter())
            .map(|i| i.section.clone().unwrap_or_default())
            .collect();

        assert_eq!(order, vec!["Produce", "Bakery", "Dairy", "Frozen", ""]);
    }

    #[test]
    fn test_equal_timestamps_break_ties_by_id() {
        let items = vec![
            item("b", "Second", "Dairy", "2026-01-01T10:00:00.000000Z"),
            item("a", "First", "Dairy", "2026-01-01T10:00:00.000000Z"),
        ];
        let rendered = render(&items, Some(&store(&["Dairy"])), None);
        assert_eq!(texts(&rendered.groups[0]), vec!["First", "Second"]);
    }

    #[test]
    fn test_render_is_deterministic() {
        let items = vec![
            item("c", "Eggs", "dairy", "2026-01-01T10:00:00.000000Z"),
            item("a", "Milk", "Dairy", "2026-01-01T10:00:00.000000Z"),
            item("b", "Bread", "", "2026-01-01T10:00:00.000000Z"),
            item("d", "Pears", "Produce", "2026-01-01T09:00:00.000000Z"),
        ];
        let layout = store(&["Produce", "Dairy"]);

        let first = render(&items, Some(&layout), Some("e"));
        let mut shuffled = items.clone();
        shuffled.reverse();
        let second = render(&shuffled, Some(&layout), Some("e"));

        assert_eq!(first, second);
        assert_eq!(first, render(&items, Some(&layout), Some("e")));
    }

    #[test]
    fn test_search_filter_is_case_insensitive_substring() {
        let items = vec![
            item("a", "Whole Milk", "Dairy", "2026-01-01T10:00:01.000000Z"),
            item("b", "Apple", "Produce", "2026-01-01T10:00:02.000000Z"),
            item("c", "Milkweed seeds", "", "2026-01-01T10:00:03.000000Z"),
        ];
        let rendered = render(&items, Some(&store(&["Produce", "Dairy"])), Some("  MILK "));

        assert_eq!(rendered.item_count(), 2);
        assert_eq!(
            labels(&rendered),
            vec![Some("Dairy".to_string()), Some("Unsorted".to_string())]
        );

        let unfiltered = render(&items, Some(&store(&["Produce", "Dairy"])), Some(""));
        assert_eq!(unfiltered.item_count(), 3);
    }

    #[test]
    fn test_removed_section_falls_into_unsorted() {
        let items = vec![item("a", "Milk", "Dairy", "2026-01-01T10:00:00.000000Z")];
        let sections = store(&["Produce", "Dairy"]).sections;
        let trimmed = remove_section(&sections, 1).unwrap();
        let mut layout = store(&[]);
        layout.sections = trimmed;

        let rendered = render(&items, Some(&layout), None);
        assert_eq!(labels(&rendered), vec![Some("Unsorted".to_string())]);
        assert_eq!(texts(&rendered.groups[0]), vec!["Milk"]);
    }

    #[test]
    fn test_duplicate_section_names_rank_by_last_occurrence() {
        let items = vec![
            item("a", "Milk", "Dairy", "2026-01-01T10:00:01.000000Z"),
            item("b", "Kale", "Produce", "2026-01-01T10:00:02.000000Z"),
        ];
        let rendered = render(&items, Some(&store(&["Dairy", "Produce", "dairy"])), None);
        assert_eq!(
            labels(&rendered),
            vec![Some("Produce".to_string()), Some("dairy".to_string())]
        );
        assert_eq!(texts(&rendered.groups[1]), vec!["Milk"]);
    }
}
