use crate::dom::SnapshotElement;
use crate::errors::TextViewError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub visible: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormInput {
    #[serde(default, rename = "type")]
    pub input_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormInfo {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub inputs: Vec<FormInput>,
}

/// Everything the snapshot source captured for one page load.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotResult {
    pub elements: Vec<SnapshotElement>,
    pub raw_markup: String,
    pub images: Vec<ImageInfo>,
    pub forms: Vec<FormInfo>,
    pub success: bool,
    pub error: Option<TextViewError>,
}

impl SnapshotResult {
    pub fn new(elements: Vec<SnapshotElement>, raw_markup: String) -> Self {
        Self {
            elements,
            raw_markup,
            images: Vec::new(),
            forms: Vec::new(),
            success: true,
            error: None,
        }
    }

    pub fn failure(error: TextViewError) -> Self {
        Self {
            elements: Vec::new(),
            raw_markup: String::new(),
            images: Vec::new(),
            forms: Vec::new(),
            success: false,
            error: Some(error),
        }
    }

    pub fn with_images(mut self, images: Vec<ImageInfo>) -> Self {
        self.images = images;
        self
    }

    pub fn with_forms(mut self, forms: Vec<FormInfo>) -> Self {
        self.forms = forms;
        self
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn visible_elements(&self) -> impl Iterator<Item = &SnapshotElement> {
        self.elements.iter().filter(|e| e.visible)
    }
}
