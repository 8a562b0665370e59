use crate::core::LinkMatcher;
use crate::dom::{ElementKind, SnapshotElement};
use crate::types::{ElementAction, ElementMap, ElementMapping};
use std::collections::HashSet;
use url::Url;

/// Plain string equality on the link target, no normalization at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactUrlMatcher;

impl LinkMatcher for ExactUrlMatcher {
    fn matches(&self, link_url: &str, element: &SnapshotElement) -> bool {
        element.kind == ElementKind::Link && element.href.as_deref() == Some(link_url)
    }
}

/// Compares parsed URLs, so `HTTP://Example.com` and `http://example.com/`
/// are the same link. Unparseable values fall back to exact comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedUrlMatcher;

impl LinkMatcher for NormalizedUrlMatcher {
    fn matches(&self, link_url: &str, element: &SnapshotElement) -> bool {
        if element.kind != ElementKind::Link {
            return false;
        }
        let Some(href) = element.href.as_deref() else {
            return false;
        };

        match (Url::parse(link_url), Url::parse(href)) {
            (Ok(a), Ok(b)) => a == b,
            _ => link_url == href,
        }
    }
}

/// Result of joining the text source's numbered links to snapshot elements.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub mapping: ElementMap,
    /// Targets of the snapshot elements that got a number.
    pub matched_hrefs: HashSet<String>,
}

/// For every numbered link, takes the first snapshot element (in extraction
/// order) the matcher accepts. Numbers with no partner are dropped.
pub fn match_links(
    links: &[(u32, String)],
    elements: &[SnapshotElement],
    matcher: &dyn LinkMatcher,
) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    for (number, url) in links {
        let Some(element) = elements.iter().find(|el| matcher.matches(url, el)) else {
            continue;
        };

        let label = if element.label.is_empty() {
            url.clone()
        } else {
            element.label.clone()
        };

        outcome.mapping.insert(
            *number,
            ElementMapping {
                number: *number,
                kind: ElementKind::Link,
                label,
                selector: Some(element.selector.clone()),
                url: Some(url.clone()),
                action: ElementAction::Navigate,
            },
        );
        if let Some(href) = &element.href {
            outcome.matched_hrefs.insert(href.clone());
        }
    }

    outcome
}
