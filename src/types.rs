use crate::dom::ElementKind;
use crate::errors::TextViewError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Output of the text rendering fetch.
///
/// `links` holds the tool's own 1-based numbering; this crate never renumbers it.
#[derive(Debug, Clone, PartialEq)]
pub struct TextResult {
    pub text: String,
    pub links: Vec<(u32, String)>,
    pub success: bool,
    pub error: Option<TextViewError>,
}

impl TextResult {
    pub fn new(text: impl Into<String>, links: Vec<(u32, String)>) -> Self {
        Self {
            text: text.into(),
            links,
            success: true,
            error: None,
        }
    }

    pub fn failure(error: TextViewError) -> Self {
        Self {
            text: String::new(),
            links: Vec::new(),
            success: false,
            error: Some(error),
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }

    pub fn line_count(&self) -> usize {
        self.lines().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementAction {
    Navigate,
    Click,
    Fill,
    Submit,
}

impl ElementAction {
    /// Action a client performs when the user picks an element of this kind.
    pub fn for_element(kind: ElementKind, label: &str) -> Self {
        match kind {
            ElementKind::Link => ElementAction::Navigate,
            ElementKind::Input | ElementKind::Textarea => ElementAction::Fill,
            ElementKind::Button if label.to_lowercase().contains("submit") => ElementAction::Submit,
            ElementKind::Button | ElementKind::Select => ElementAction::Click,
        }
    }
}

impl fmt::Display for ElementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementAction::Navigate => "navigate",
            ElementAction::Click => "click",
            ElementAction::Fill => "fill",
            ElementAction::Submit => "submit",
        };
        f.write_str(name)
    }
}

/// A numbered, user-addressable element in the merged view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementMapping {
    pub number: u32,
    pub kind: ElementKind,
    pub label: String,
    pub selector: Option<String>,
    pub url: Option<String>,
    pub action: ElementAction,
}

pub type ElementMap = BTreeMap<u32, ElementMapping>;

/// Final result of one merge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedView {
    pub text: String,
    pub mapping: ElementMap,
    pub success: bool,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<TextViewError>,
    /// Non-fatal degradations hit while producing this view.
    #[serde(skip)]
    pub warnings: Vec<TextViewError>,
}

impl MergedView {
    pub fn success(text: String, mapping: ElementMap) -> Self {
        Self {
            text,
            mapping,
            success: true,
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn failure(error: TextViewError) -> Self {
        Self {
            text: String::new(),
            mapping: ElementMap::new(),
            success: false,
            error: Some(error),
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<TextViewError>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn element(&self, number: u32) -> Option<&ElementMapping> {
        self.mapping.get(&number)
    }

    /// Link entries in number order.
    pub fn links(&self) -> impl Iterator<Item = &ElementMapping> {
        self.mapping.values().filter(|m| m.kind == ElementKind::Link)
    }
}

fn serialize_error<S>(error: &Option<TextViewError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}
