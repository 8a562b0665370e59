use crate::core::MergeConfig;
use crate::dom::SnapshotResult;
use crate::types::{ElementAction, ElementMap, ElementMapping, MergedView};
use scraper::{Html, Node};

/// Limits for the snapshot-only view.
#[derive(Debug, Clone, Copy)]
pub struct FallbackOptions {
    pub element_limit: usize,
    pub wrap_width: usize,
    pub label_chars: usize,
}

impl Default for FallbackOptions {
    fn default() -> Self {
        Self {
            element_limit: 50,
            wrap_width: 80,
            label_chars: 50,
        }
    }
}

impl From<&MergeConfig> for FallbackOptions {
    fn from(config: &MergeConfig) -> Self {
        Self {
            element_limit: config.fallback_element_limit,
            wrap_width: config.fallback_wrap_width,
            label_chars: config.fallback_label_chars,
        }
    }
}

/// Plain text from raw page markup: scripts and styles dropped, every other
/// tag treated as a word break, entities decoded, whitespace collapsed, then
/// hard-wrapped at `width` chars.
pub fn markup_to_text(markup: &str, width: usize) -> String {
    let document = Html::parse_document(markup);

    let pieces: Vec<&str> = document
        .root_element()
        .descendants()
        .filter(|node| {
            !node
                .parent()
                .and_then(|parent| parent.value().as_element().map(|el| el.name()))
                .is_some_and(|name| name == "script" || name == "style")
        })
        .filter_map(|node| match node.value() {
            Node::Text(text) => Some(&**text),
            _ => None,
        })
        .collect();

    let collapsed = pieces.join(" ").split_whitespace().collect::<Vec<_>>().join(" ");
    hard_wrap(&collapsed, width)
}

fn hard_wrap(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(width)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Degraded view used when the text source failed but the snapshot worked:
/// the page's own text followed by one marker line per visible element.
pub fn snapshot_only_view(snapshot: &SnapshotResult, options: FallbackOptions) -> MergedView {
    let mut text = markup_to_text(&snapshot.raw_markup, options.wrap_width);
    let mut mapping = ElementMap::new();

    for (number, element) in (1u32..).zip(snapshot.visible_elements().take(options.element_limit)) {
        let label = element.truncated_label(options.label_chars);

        text.push_str(&format!("\n[{}] {}", number, label));
        mapping.insert(
            number,
            ElementMapping {
                number,
                kind: element.kind,
                label,
                selector: Some(element.selector.clone()),
                url: element.href.clone(),
                action: ElementAction::for_element(element.kind, &element.label),
            },
        );
    }

    MergedView::success(text, mapping)
}
