use crate::core::{LinkMatcher, MergeConfig, TextGenerator};
use crate::dom::{SnapshotElement, SnapshotResult};
use crate::errors::{Leg, TextViewError};
use crate::merge::advisor::{MarkerPosition, PlacementAdvisor, PlacementDecision, Placements};
use crate::merge::classifier::{categorize, find_unplaced, Bucket};
use crate::merge::fallback::{snapshot_only_view, FallbackOptions};
use crate::merge::injector::{default_template, inject};
use crate::merge::matcher::{match_links, ExactUrlMatcher};
use crate::types::{MergedView, TextResult};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Reconciles one text result and one snapshot result into a numbered view.
///
/// Holds configuration only. Every call to [`Merger::merge`] starts from
/// scratch, and the advisor is handed in per call.
pub struct Merger {
    config: MergeConfig,
    matcher: Box<dyn LinkMatcher>,
    temperature: f32,
    max_tokens: u32,
}

impl Default for Merger {
    fn default() -> Self {
        Self::new(MergeConfig::default())
    }
}

impl Merger {
    pub fn new(config: MergeConfig) -> Self {
        Self {
            config,
            matcher: Box::new(ExactUrlMatcher),
            temperature: 0.3,
            max_tokens: 2000,
        }
    }

    pub fn with_matcher(mut self, matcher: impl LinkMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub async fn merge(
        &self,
        text: &TextResult,
        snapshot: &SnapshotResult,
        advisor: Option<&dyn TextGenerator>,
    ) -> MergedView {
        if !text.success && !snapshot.success {
            warn!(
                text_error = ?text.error,
                snapshot_error = ?snapshot.error,
                "both sources failed"
            );
            return MergedView::failure(TextViewError::BothSourcesFailed);
        }

        let mut warnings = Vec::new();

        if !text.success {
            let cause = leg_error(&text.error, Leg::Text);
            warn!(error = %cause, "text source failed, falling back to snapshot-only view");
            warnings.push(cause);
            return snapshot_only_view(snapshot, FallbackOptions::from(&self.config))
                .with_warnings(warnings);
        }

        let elements: &[SnapshotElement] = if snapshot.success {
            &snapshot.elements
        } else {
            let cause = leg_error(&snapshot.error, Leg::Snapshot);
            warn!(error = %cause, "snapshot source failed, continuing with text only");
            warnings.push(cause);
            &[]
        };

        let matched = match_links(&text.links, elements, self.matcher.as_ref());
        let unplaced = find_unplaced(elements, &matched);
        debug!(
            links = text.links.len(),
            elements = elements.len(),
            matched = matched.mapping.len(),
            unplaced = unplaced.len(),
            "links matched"
        );

        if unplaced.is_empty() {
            return MergedView::success(text.text.clone(), matched.mapping).with_warnings(warnings);
        }

        let buckets = categorize(&unplaced);
        let primary = in_bucket(&unplaced, &buckets, Bucket::Primary);
        let unknown = in_bucket(&unplaced, &buckets, Bucket::Unknown);
        debug!(
            primary = primary.len(),
            unknown = unknown.len(),
            dropped = unplaced.len() - primary.len() - unknown.len(),
            "unplaced elements classified"
        );

        let mut placements = match advisor {
            Some(generator) => {
                PlacementAdvisor::new(generator)
                    .with_limits(self.config.advisor_context_chars, self.config.advisor_label_chars)
                    .with_sampling(self.temperature, self.max_tokens)
                    .place(&text.text, &unknown, &mut warnings)
                    .await
            }
            None => {
                if !unknown.is_empty() {
                    debug!(count = unknown.len(), "no advisor, omitting unknown elements");
                }
                Placements::new()
            }
        };

        // the advisor only gets a say over the elements it was asked about
        let asked: HashSet<usize> = unknown.iter().map(|el| el.index).collect();
        placements.retain(|index, _| asked.contains(index));

        let last_line = text.line_count().saturating_sub(1) as i64;
        for element in &primary {
            placements.insert(
                element.index,
                PlacementDecision::show_at(last_line, MarkerPosition::After, default_template(element)),
            );
        }

        let injection = inject(&text.text, &matched.mapping, &unplaced, &placements);
        info!(
            elements = injection.mapping.len(),
            injected = injection.mapping.len() - matched.mapping.len(),
            warnings = warnings.len(),
            "merge complete"
        );

        MergedView::success(injection.text, injection.mapping).with_warnings(warnings)
    }
}

fn in_bucket<'a>(
    elements: &[&'a SnapshotElement],
    buckets: &BTreeMap<usize, Bucket>,
    bucket: Bucket,
) -> Vec<&'a SnapshotElement> {
    elements
        .iter()
        .copied()
        .filter(|el| buckets.get(&el.index) == Some(&bucket))
        .collect()
}

fn leg_error(error: &Option<TextViewError>, leg: Leg) -> TextViewError {
    error.clone().unwrap_or_else(|| TextViewError::FetchUnavailable {
        leg,
        reason: "no error reported".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ElementKind;
    use crate::merge::matcher::NormalizedUrlMatcher;
    use crate::testing::{Fixtures, ScriptedGenerator};
    use crate::types::ElementAction;
    use std::time::Duration;

    const PAGE: &str = "line a\nline b\nline c";

    fn text_timeout() -> TextViewError {
        TextViewError::FetchTimeout {
            leg: Leg::Text,
            timeout: Duration::from_secs(30),
        }
    }

    fn snapshot_down() -> TextViewError {
        TextViewError::FetchUnavailable {
            leg: Leg::Snapshot,
            reason: "browser crashed".to_string(),
        }
    }

    /// Text result numbering links 1 to 7 and the snapshot links they match.
    fn seven_links() -> (TextResult, Vec<SnapshotElement>) {
        let urls: Vec<String> = (1..=7).map(|n| format!("https://a.test/{}", n)).collect();
        let links: Vec<(u32, &str)> = urls
            .iter()
            .enumerate()
            .map(|(i, u)| (i as u32 + 1, u.as_str()))
            .collect();
        let elements = urls
            .iter()
            .enumerate()
            .map(|(i, u)| Fixtures::link(i, u, &format!("link {}", i + 1)))
            .collect();
        (Fixtures::text(PAGE, &links), elements)
    }

    #[tokio::test]
    async fn test_both_failed_is_fatal_and_empty() {
        let view = Merger::default()
            .merge(
                &TextResult::failure(text_timeout()),
                &SnapshotResult::failure(snapshot_down()),
                None,
            )
            .await;

        assert!(!view.success);
        assert!(view.text.is_empty());
        assert!(view.mapping.is_empty());
        assert_eq!(view.error, Some(TextViewError::BothSourcesFailed));
    }

    #[tokio::test]
    async fn test_text_failure_uses_snapshot_only_view() {
        let elements: Vec<SnapshotElement> = (0..70)
            .map(|i| match i % 3 {
                0 => Fixtures::link(i, &format!("https://a.test/{}", i), &format!("l{}", i)),
                1 => Fixtures::input(i, &format!("i{}", i)),
                _ => Fixtures::button(i, &format!("b{}", i)).set_visible(i % 2 == 0),
            })
            .collect();
        let visible = elements.iter().filter(|e| e.visible).count();
        let snapshot = SnapshotResult::new(elements, "<p>Body</p>".to_string());
        let generator = ScriptedGenerator::replying("{}");

        let view = Merger::default()
            .merge(&TextResult::failure(text_timeout()), &snapshot, Some(&generator))
            .await;

        assert!(view.success);
        assert_eq!(view.mapping.len(), visible.min(50));
        assert_eq!(generator.call_count(), 0);
        assert!(view.text.starts_with("Body\n[1] l0\n[2] i1\n"));
        for mapping in view.mapping.values() {
            let expected = match mapping.kind {
                ElementKind::Link => ElementAction::Navigate,
                ElementKind::Input => ElementAction::Fill,
                _ => ElementAction::Click,
            };
            assert_eq!(mapping.action, expected);
        }
        assert_eq!(view.warnings, vec![text_timeout()]);
    }

    #[tokio::test]
    async fn test_snapshot_failure_passes_text_through() {
        let text = Fixtures::text(PAGE, &[(1, "https://a.test/1")]);
        let view = Merger::default()
            .merge(&text, &SnapshotResult::failure(snapshot_down()), None)
            .await;

        assert!(view.success);
        assert_eq!(view.text, PAGE);
        assert!(view.mapping.is_empty());
        assert_eq!(view.warnings, vec![snapshot_down()]);
    }

    #[tokio::test]
    async fn test_nothing_unplaced_returns_base_unchanged() {
        let (text, elements) = seven_links();
        let snapshot = Fixtures::snapshot(elements.clone());
        let generator = ScriptedGenerator::replying("{}");

        let view = Merger::default().merge(&text, &snapshot, Some(&generator)).await;

        let base = match_links(&text.links, &elements, &ExactUrlMatcher).mapping;
        assert_eq!(view.text, text.text);
        assert_eq!(view.mapping, base);
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_numbers_follow_base_in_descending_line_order() {
        let (text, mut elements) = seven_links();
        elements.push(Fixtures::button(7, "▲"));
        elements.push(Fixtures::button(8, "More"));
        let generator = ScriptedGenerator::replying(
            r#"{"el_7": {"show": true, "line": 0, "position": "before", "format": "[N:▲]"},
                "el_8": {"show": true, "line": 2, "position": "after", "format": "[N:More]"}}"#,
        );

        let view = Merger::default()
            .merge(&text, &Fixtures::snapshot(elements), Some(&generator))
            .await;

        assert!(view.success);
        assert_eq!(view.text, "[9:▲] line a\nline b\nline c [8:More]");
        assert_eq!(view.mapping.len(), 9);
        assert_eq!(view.mapping[&8].label, "More");
        assert_eq!(view.mapping[&9].label, "▲");
        assert!(view.mapping.keys().all(|n| *n > 0));
        assert!(view.mapping.iter().all(|(n, m)| *n == m.number));
        assert!(generator.prompts()[0].contains("\"id\": \"el_8\""));
    }

    #[tokio::test]
    async fn test_hidden_decision_leaves_no_trace() {
        let (text, mut elements) = seven_links();
        elements.push(Fixtures::button(7, "Share"));
        elements.push(Fixtures::button(8, "Next"));
        let generator = ScriptedGenerator::replying(
            r#"{"el_7": {"show": false, "reason": "social widget"},
                "el_8": {"show": true, "line": 1, "position": "after", "format": "[N:Next]"}}"#,
        );

        let view = Merger::default()
            .merge(&text, &Fixtures::snapshot(elements), Some(&generator))
            .await;

        assert_eq!(view.text, "line a\nline b [8:Next]\nline c");
        assert!(view.mapping.values().all(|m| m.label != "Share"));
        assert!(!view.text.contains("Share"));
    }

    #[tokio::test]
    async fn test_loosely_typed_advice_is_placed() {
        let (text, mut elements) = seven_links();
        elements.push(Fixtures::button(7, "Up"));
        elements.push(Fixtures::button(8, "Down"));
        elements.push(Fixtures::button(9, "Skip"));
        let generator = ScriptedGenerator::replying(
            r#"{"el_7": {"show": true, "line": 1, "position": "Before", "format": "[N:Up]"},
                "el_8": {"show": true, "line": 2.0, "position": "after", "format": "[N:Down]"},
                "el_9": {"show": true, "line": "top", "position": "after", "format": "[N:Skip]"}}"#,
        );

        let view = Merger::default()
            .merge(&text, &Fixtures::snapshot(elements), Some(&generator))
            .await;

        assert!(view.success);
        assert_eq!(view.text, "line a\n[9:Up] line b\nline c [8:Down]");
        assert_eq!(view.mapping.len(), 9);
        assert!(view.mapping.values().all(|m| m.label != "Skip"));
        assert!(matches!(
            view.warnings.as_slice(),
            [TextViewError::AdvisorMalformedResponse { raw_text, .. }] if raw_text.contains("top")
        ));
    }

    #[tokio::test]
    async fn test_malformed_advice_still_places_primary() {
        let (text, mut elements) = seven_links();
        elements.push(Fixtures::button(7, "Vote"));
        elements.push(Fixtures::input(8, "Email"));
        let generator = ScriptedGenerator::replying("Sure! Put the vote button near the top.");

        let view = Merger::default()
            .merge(&text, &Fixtures::snapshot(elements), Some(&generator))
            .await;

        assert!(view.success);
        assert_eq!(view.text, "line a\nline b\nline c [8:input]");
        assert_eq!(view.mapping[&8].action, ElementAction::Fill);
        assert!(view.mapping.values().all(|m| m.label != "Vote"));
        assert!(matches!(
            view.warnings.as_slice(),
            [TextViewError::AdvisorMalformedResponse { .. }]
        ));
    }

    #[tokio::test]
    async fn test_without_advisor_only_primary_is_placed() {
        let text = Fixtures::text("only line", &[]);
        let elements = vec![
            Fixtures::button(0, "Vote"),
            Fixtures::input(1, "Search"),
            Fixtures::input(2, "Name"),
        ];

        let view = Merger::default()
            .merge(&text, &Fixtures::snapshot(elements), None)
            .await;

        assert_eq!(view.text, "only line [1:input] [2:input]");
        assert_eq!(view.mapping.len(), 2);
        assert_eq!(view.mapping[&1].label, "Search");
        assert!(view.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_advisor_cannot_resurrect_dropped_elements() {
        let text = Fixtures::text("page", &[]);
        let tracker = SnapshotElement::new(0, ElementKind::Button, "div.analytics > button")
            .with_label("Accept");
        let vote = Fixtures::button(1, "▲");
        let generator = ScriptedGenerator::replying(
            r#"{"el_0": {"show": true, "line": 0, "format": "[N:Accept]"},
                "el_1": {"show": true, "line": 0, "format": "[N:▲]"}}"#,
        );

        let view = Merger::default()
            .merge(&text, &Fixtures::snapshot(vec![tracker, vote]), Some(&generator))
            .await;

        assert_eq!(view.text, "page [1:▲]");
        assert_eq!(view.mapping.len(), 1);
        assert!(!generator.prompts()[0].contains("\"id\": \"el_0\""));
    }

    #[tokio::test]
    async fn test_repeated_merges_are_identical() {
        let (text, mut elements) = seven_links();
        elements.push(Fixtures::button(7, "▲"));
        elements.push(Fixtures::input(8, "Search"));
        elements.push(Fixtures::button(9, "Submit"));
        let snapshot = Fixtures::snapshot(elements);
        let reply = r#"{"el_7": {"show": true, "line": 1, "format": "[N:▲]"},
                        "el_9": {"show": true, "line": 1, "position": "before", "format": "[N]"}}"#;
        let merger = Merger::default();

        let first = merger
            .merge(&text, &snapshot, Some(&ScriptedGenerator::replying(reply)))
            .await;
        let second = merger
            .merge(&text, &snapshot, Some(&ScriptedGenerator::replying(reply)))
            .await;

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first.text, "line a\n[10] line b [9:▲]\nline c [8:input]");
        assert_eq!(first.mapping[&10].action, ElementAction::Submit);
    }

    #[tokio::test]
    async fn test_pluggable_matcher() {
        let text = Fixtures::text("home", &[(1, "HTTPS://A.TEST")]);
        let snapshot = Fixtures::snapshot(vec![Fixtures::link(0, "https://a.test/", "Home")]);

        let exact = Merger::default().merge(&text, &snapshot, None).await;
        assert!(exact.mapping.is_empty());

        let normalized = Merger::default()
            .with_matcher(NormalizedUrlMatcher)
            .merge(&text, &snapshot, None)
            .await;
        assert_eq!(normalized.mapping[&1].label, "Home");
        assert_eq!(normalized.text, "home");
    }
}
