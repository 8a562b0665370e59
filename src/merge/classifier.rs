use crate::dom::{ElementKind, SnapshotElement};
use crate::merge::matcher::MatchOutcome;
use std::collections::BTreeMap;

const IGNORE_TERMS: &[&str] = &["ad", "track", "analytics", "pixel"];
const NAVIGATION_TERMS: &[&str] = &["nav", "header", "menu"];
const SECONDARY_TERMS: &[&str] = &["footer", "copyright"];

/// Heuristic category for an element the matcher did not place.
///
/// Only `Primary` (auto-placed) and `Unknown` (sent to the advisor) change
/// the output today; the remaining buckets are all dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Ignore,
    Navigation,
    Secondary,
    Primary,
    Unknown,
}

impl Bucket {
    pub fn is_dropped(&self) -> bool {
        matches!(self, Bucket::Ignore | Bucket::Navigation | Bucket::Secondary)
    }
}

/// Snapshot elements the text source has no number for, in extraction order.
pub fn find_unplaced<'a>(
    elements: &'a [SnapshotElement],
    matched: &MatchOutcome,
) -> Vec<&'a SnapshotElement> {
    elements
        .iter()
        .filter(|el| el.visible)
        .filter(|el| !el.label.is_empty() || el.kind == ElementKind::Input)
        .filter(|el| match el.kind {
            ElementKind::Link => el
                .href
                .as_ref()
                .map_or(true, |href| !matched.matched_hrefs.contains(href)),
            _ => true,
        })
        .collect()
}

pub fn classify(element: &SnapshotElement) -> Bucket {
    let haystack = format!("{} {}", element.selector, element.label).to_lowercase();
    let contains_any = |terms: &[&str]| terms.iter().any(|t| haystack.contains(t));

    if contains_any(IGNORE_TERMS) {
        Bucket::Ignore
    } else if contains_any(NAVIGATION_TERMS) {
        Bucket::Navigation
    } else if contains_any(SECONDARY_TERMS) {
        Bucket::Secondary
    } else if element.kind.is_form_field() {
        Bucket::Primary
    } else {
        Bucket::Unknown
    }
}

/// Buckets keyed by extraction index.
pub fn categorize(elements: &[&SnapshotElement]) -> BTreeMap<usize, Bucket> {
    elements.iter().map(|el| (el.index, classify(el))).collect()
}
