use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Interactive element kinds the snapshot source extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Link,
    Button,
    Input,
    Textarea,
    Select,
}

impl ElementKind {
    /// Maps an HTML tag name to a kind; anything outside the five interactive tags is `None`.
    pub fn from_tag(tag_name: &str) -> Option<Self> {
        match tag_name.to_ascii_lowercase().as_str() {
            "a" | "link" => Some(ElementKind::Link),
            "button" => Some(ElementKind::Button),
            "input" => Some(ElementKind::Input),
            "textarea" => Some(ElementKind::Textarea),
            "select" => Some(ElementKind::Select),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Link => "link",
            ElementKind::Button => "button",
            ElementKind::Input => "input",
            ElementKind::Textarea => "textarea",
            ElementKind::Select => "select",
        }
    }

    /// Form controls the classifier places without asking the advisor.
    pub fn is_form_field(&self) -> bool {
        matches!(
            self,
            ElementKind::Input | ElementKind::Textarea | ElementKind::Select
        )
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementPosition {
    pub top: f64,
    pub left: f64,
    pub document_order: f64,
}

/// One interactive element from the DOM snapshot.
///
/// `index` is the 0-based extraction order of the snapshot tool. It lives in a
/// different numbering space from the text tool's link numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotElement {
    pub index: usize,
    pub kind: ElementKind,
    pub label: String,
    pub href: Option<String>,
    pub selector: String,
    pub visible: bool,
    pub position: ElementPosition,
    pub attributes: HashMap<String, String>,
}

impl SnapshotElement {
    pub fn new(index: usize, kind: ElementKind, selector: impl Into<String>) -> Self {
        Self {
            index,
            kind,
            label: String::new(),
            href: None,
            selector: selector.into(),
            visible: true,
            position: ElementPosition::default(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_position(mut self, position: ElementPosition) -> Self {
        self.position = position;
        self
    }

    pub fn set_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Label cut to at most `max_chars` characters, never splitting a code point.
    pub fn truncated_label(&self, max_chars: usize) -> String {
        truncate_chars(&self.label, max_chars)
    }
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
