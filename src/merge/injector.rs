use crate::dom::SnapshotElement;
use crate::merge::advisor::{MarkerPosition, PlacementDecision, Placements};
use crate::types::{ElementAction, ElementMap, ElementMapping};
use std::collections::HashMap;
use tracing::warn;

const NUMBER_PLACEHOLDER: &str = "N";

/// The rendered document as line buffers addressed by a fixed index.
///
/// Markers are only ever attached to existing lines, never inserted as new
/// ones, so an index stays valid for the whole injection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LineArena {
    lines: Vec<String>,
}

impl LineArena {
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.lines.len().saturating_sub(1)
    }

    /// Clamps a requested line into `[0, last_index]`.
    pub fn clamp(&self, line: i64) -> usize {
        if line <= 0 {
            0
        } else {
            (line as u64).min(self.last_index() as u64) as usize
        }
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn attach(&mut self, index: usize, marker: &str, position: MarkerPosition) {
        let Some(line) = self.lines.get_mut(index) else {
            return;
        };
        *line = match position {
            MarkerPosition::Before => format!("{} {}", marker, line),
            MarkerPosition::After => format!("{} {}", line, marker),
        };
    }

    pub fn into_text(self) -> String {
        self.lines.join("\n")
    }
}

/// Builds the marker for `number` from an advisor template such as `[N:▲]`.
///
/// Only the first placeholder is substituted, so labels containing a capital
/// N survive. Templates without a placeholder fall back to the default.
pub fn render_marker(template: Option<&str>, number: u32, element: &SnapshotElement) -> String {
    let default_template = default_template(element);
    let template = template
        .filter(|t| t.contains(NUMBER_PLACEHOLDER))
        .unwrap_or(default_template.as_str());
    template.replacen(NUMBER_PLACEHOLDER, &number.to_string(), 1)
}

pub fn default_template(element: &SnapshotElement) -> String {
    format!("[N:{}]", element.kind)
}

/// Output of the injection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Injection {
    pub text: String,
    pub mapping: ElementMap,
}

/// Numbers every shown element after the highest base number and attaches
/// its marker to the requested line, working from the bottom of the page up.
pub fn inject(
    text: &str,
    base_mapping: &ElementMap,
    unplaced: &[&SnapshotElement],
    placements: &Placements,
) -> Injection {
    let mut arena = LineArena::from_text(text);
    let mut mapping = base_mapping.clone();
    let mut next_number = match base_mapping.keys().next_back() {
        Some(max) => max.checked_add(1),
        None => Some(1),
    };

    let by_index: HashMap<usize, &SnapshotElement> =
        unplaced.iter().map(|el| (el.index, *el)).collect();

    let mut ordered: Vec<(usize, &PlacementDecision)> = placements
        .iter()
        .filter(|(_, decision)| decision.show)
        .map(|(index, decision)| (*index, decision))
        .collect();
    // stable: equal lines keep ascending element index
    ordered.sort_by(|a, b| b.1.line.cmp(&a.1.line));

    for (index, decision) in ordered {
        let Some(element) = by_index.get(&index) else {
            continue;
        };

        let Some(number) = next_number else {
            warn!(index, "element numbers exhausted, remaining elements not injected");
            break;
        };

        let line = arena.clamp(decision.line);
        let marker = render_marker(decision.format.as_deref(), number, element);
        arena.attach(line, &marker, decision.position);

        mapping.insert(
            number,
            ElementMapping {
                number,
                kind: element.kind,
                label: element.label.clone(),
                selector: Some(element.selector.clone()),
                url: element.href.clone(),
                action: ElementAction::for_element(element.kind, &element.label),
            },
        );
        next_number = number.checked_add(1);
    }

    Injection {
        text: arena.into_text(),
        mapping,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ElementKind;
    use crate::testing::Fixtures;

    fn base_up_to(max: u32) -> ElementMap {
        (1..=max)
            .map(|n| {
                (
                    n,
                    ElementMapping {
                        number: n,
                        kind: ElementKind::Link,
                        label: format!("link {}", n),
                        selector: None,
                        url: Some(format!("https://a.test/{}", n)),
                        action: ElementAction::Navigate,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_clamp() {
        let arena = LineArena::from_text("a\nb\nc");
        assert_eq!(arena.clamp(-4), 0);
        assert_eq!(arena.clamp(1), 1);
        assert_eq!(arena.clamp(99), 2);
        assert_eq!(LineArena::from_text("").clamp(5), 0);
    }

    #[test]
    fn test_attach_before_and_after() {
        let mut arena = LineArena::from_text("alpha\nbeta");
        arena.attach(0, "[1]", MarkerPosition::Before);
        arena.attach(1, "[2]", MarkerPosition::After);
        arena.attach(7, "[3]", MarkerPosition::After);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.into_text(), "[1] alpha\nbeta [2]");
    }

    #[test]
    fn test_render_marker_replaces_first_placeholder_only() {
        let button = Fixtures::button(0, "Next");
        assert_eq!(render_marker(Some("[N:Next]"), 8, &button), "[8:Next]");
        assert_eq!(render_marker(Some("[N:NEW]"), 8, &button), "[8:NEW]");
        assert_eq!(render_marker(Some("(no placeholder)"), 8, &button), "[8:button]");
        assert_eq!(render_marker(None, 3, &Fixtures::input(1, "q")), "[3:input]");
    }

    #[test]
    fn test_numbers_follow_max_base_in_descending_line_order() {
        let vote = Fixtures::button(10, "▲");
        let more = Fixtures::link(11, "https://a.test/more", "More");
        let mut placements = Placements::new();
        placements.insert(10, PlacementDecision::show_at(0, MarkerPosition::Before, "[N:▲]"));
        placements.insert(11, PlacementDecision::show_at(2, MarkerPosition::After, "[N:More]"));

        let injection = inject("top\nmiddle\nbottom", &base_up_to(7), &[&vote, &more], &placements);

        // bottom line is handled first and gets the first fresh number
        assert_eq!(injection.text, "[9:▲] top\nmiddle\nbottom [8:More]");
        assert_eq!(injection.mapping.len(), 9);
        assert_eq!(injection.mapping[&8].label, "More");
        assert_eq!(injection.mapping[&8].action, ElementAction::Navigate);
        assert_eq!(injection.mapping[&8].url.as_deref(), Some("https://a.test/more"));
        assert_eq!(injection.mapping[&9].action, ElementAction::Click);
        assert_eq!(injection.mapping[&9].selector.as_deref(), Some("button:nth-of-type(11)"));
    }

    #[test]
    fn test_hidden_and_unknown_decisions_are_skipped() {
        let a = Fixtures::button(1, "Share");
        let mut placements = Placements::new();
        placements.insert(1, PlacementDecision::hide("noise"));
        placements.insert(42, PlacementDecision::show_at(0, MarkerPosition::After, "[N]"));

        let injection = inject("line", &ElementMap::new(), &[&a], &placements);
        assert_eq!(injection.text, "line");
        assert!(injection.mapping.is_empty());
    }

    #[test]
    fn test_out_of_range_line_is_clamped_and_numbering_starts_at_one() {
        let submit = Fixtures::button(0, "Submit form");
        let mut placements = Placements::new();
        placements.insert(0, PlacementDecision::show_at(500, MarkerPosition::After, "[N:Submit]"));

        let injection = inject("a\nb", &ElementMap::new(), &[&submit], &placements);
        assert_eq!(injection.text, "a\nb [1:Submit]");
        assert_eq!(injection.mapping[&1].action, ElementAction::Submit);
    }

    #[test]
    fn test_numbering_stops_at_u32_max() {
        let mut link = base_up_to(1)[&1].clone();
        link.number = u32::MAX - 1;
        let mut base = ElementMap::new();
        base.insert(link.number, link.clone());
        let first = Fixtures::button(0, "First");
        let second = Fixtures::button(1, "Second");
        let mut placements = Placements::new();
        placements.insert(0, PlacementDecision::show_at(1, MarkerPosition::After, "[N]"));
        placements.insert(1, PlacementDecision::show_at(0, MarkerPosition::After, "[N]"));

        let injection = inject("a\nb", &base, &[&first, &second], &placements);
        assert_eq!(injection.text, format!("a\nb [{}]", u32::MAX));
        assert_eq!(injection.mapping.len(), 2);
        assert_eq!(injection.mapping[&u32::MAX].label, "First");

        link.number = u32::MAX;
        let mut full = ElementMap::new();
        full.insert(link.number, link);
        let injection = inject("a\nb", &full, &[&first], &placements);
        assert_eq!(injection.text, "a\nb");
        assert_eq!(injection.mapping, full);
    }

    #[test]
    fn test_equal_lines_keep_index_order() {
        let first = Fixtures::input(3, "Name");
        let second = Fixtures::input(5, "Email");
        let mut placements = Placements::new();
        placements.insert(5, PlacementDecision::show_at(0, MarkerPosition::After, "[N:input]"));
        placements.insert(3, PlacementDecision::show_at(0, MarkerPosition::After, "[N:input]"));

        let injection = inject("form", &ElementMap::new(), &[&first, &second], &placements);
        assert_eq!(injection.text, "form [1:input] [2:input]");
        assert_eq!(injection.mapping[&1].label, "Name");
        assert_eq!(injection.mapping[&2].action, ElementAction::Fill);
    }
}
