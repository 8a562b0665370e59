use crate::dom::{ElementKind, ElementPosition, FormInfo, ImageInfo, SnapshotElement};
use crate::errors::{Leg, Result, TextViewError};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::collections::HashMap;

/// Browser-side script returning the interactive elements as a JSON string.
///
/// Evaluated in page context; the result is stringified so it survives the
/// devtools round trip as a primitive.
pub const EXTRACT_ELEMENTS_SCRIPT: &str = r#"
(function() {
    function getSelector(element) {
        if (element.id) {
            return '#' + element.id;
        }
        let path = [];
        while (element.parentElement) {
            let selector = element.tagName.toLowerCase();
            if (typeof element.className === 'string' && element.className.trim()) {
                selector += '.' + element.className.trim().split(/\s+/).join('.');
            }
            let sibling = element;
            let nth = 1;
            while (sibling.previousElementSibling) {
                sibling = sibling.previousElementSibling;
                if (sibling.tagName === element.tagName) nth++;
            }
            if (nth > 1) {
                selector += ':nth-of-type(' + nth + ')';
            }
            path.unshift(selector);
            element = element.parentElement;
            if (path.length >= 4) break;
        }
        return path.join(' > ');
    }

    const elements = [];
    document.querySelectorAll('a, button, input, textarea, select').forEach((el, idx) => {
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        elements.push({
            index: idx,
            type: el.tagName.toLowerCase(),
            text: (el.innerText || el.value || el.placeholder || '').trim().substring(0, 200),
            href: el.href || null,
            selector: getSelector(el),
            visible: rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden',
            position: {
                top: rect.top,
                left: rect.left,
                documentOrder: rect.top * 10000 + rect.left
            },
            attributes: {
                id: el.id || null,
                className: (typeof el.className === 'string' ? el.className : null) || null,
                type: el.type || null,
                name: el.name || null,
                placeholder: el.placeholder || null
            }
        });
    });
    return JSON.stringify(elements);
})()
"#;

pub const EXTRACT_IMAGES_SCRIPT: &str = r#"
JSON.stringify(Array.from(document.querySelectorAll('img')).map(img => {
    const rect = img.getBoundingClientRect();
    return {
        src: img.src,
        alt: img.alt,
        width: img.width,
        height: img.height,
        visible: rect.height > 0 && rect.width > 0
    };
}))
"#;

pub const EXTRACT_FORMS_SCRIPT: &str = r#"
JSON.stringify(Array.from(document.querySelectorAll('form')).map(form => ({
    action: form.action,
    method: form.method,
    inputs: Array.from(form.querySelectorAll('input, textarea, select')).map(input => ({
        type: input.type,
        name: input.name,
        placeholder: input.placeholder || '',
        required: input.required
    }))
})))
"#;

const MAX_LABEL_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct RawPosition {
    #[serde(default)]
    top: f64,
    #[serde(default)]
    left: f64,
    #[serde(default, rename = "documentOrder")]
    document_order: f64,
}

#[derive(Debug, Deserialize)]
struct RawElement {
    index: usize,
    #[serde(rename = "type")]
    tag_name: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    selector: String,
    #[serde(default)]
    visible: bool,
    #[serde(default)]
    position: Option<RawPosition>,
    #[serde(default)]
    attributes: HashMap<String, Option<String>>,
}

/// Turns browser-side extraction output (or plain markup) into snapshot records.
pub struct SnapshotProcessor;

impl SnapshotProcessor {
    /// Parses the JSON produced by [`EXTRACT_ELEMENTS_SCRIPT`].
    ///
    /// Records with a tag outside the five interactive kinds are skipped; their
    /// index is preserved on the others so extraction order stays intact.
    pub fn parse_elements(json: &str) -> Result<Vec<SnapshotElement>> {
        let raw: Vec<RawElement> = serde_json::from_str(json)
            .map_err(|e| TextViewError::protocol(Leg::Snapshot, format!("element list: {}", e)))?;

        Ok(raw.into_iter().filter_map(Self::convert).collect())
    }

    pub fn parse_images(json: &str) -> Result<Vec<ImageInfo>> {
        serde_json::from_str(json)
            .map_err(|e| TextViewError::protocol(Leg::Snapshot, format!("image list: {}", e)))
    }

    pub fn parse_forms(json: &str) -> Result<Vec<FormInfo>> {
        serde_json::from_str(json)
            .map_err(|e| TextViewError::protocol(Leg::Snapshot, format!("form list: {}", e)))
    }

    fn convert(raw: RawElement) -> Option<SnapshotElement> {
        let kind = ElementKind::from_tag(&raw.tag_name)?;
        let attributes = raw
            .attributes
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();
        let position = raw
            .position
            .map(|p| ElementPosition {
                top: p.top,
                left: p.left,
                document_order: p.document_order,
            })
            .unwrap_or_default();

        Some(SnapshotElement {
            index: raw.index,
            kind,
            label: raw.text.trim().to_string(),
            href: raw.href.filter(|h| !h.is_empty()),
            selector: raw.selector,
            visible: raw.visible,
            position,
            attributes,
        })
    }

    /// Static extraction from markup alone, used when page scripts cannot be
    /// evaluated. Without layout information visibility comes from attributes.
    pub fn extract_from_markup(html: &str) -> Vec<SnapshotElement> {
        let document = Html::parse_document(html);
        let selector = match Selector::parse("a, button, input, textarea, select") {
            Ok(selector) => selector,
            Err(_) => return Vec::new(),
        };

        document
            .select(&selector)
            .enumerate()
            .filter_map(|(index, element_ref)| {
                let kind = ElementKind::from_tag(element_ref.value().name())?;
                let attributes: HashMap<String, String> = element_ref
                    .value()
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();

                let text = element_ref.text().collect::<Vec<_>>().join(" ");
                let label = [
                    Some(text.trim().to_string()),
                    attributes.get("value").cloned(),
                    attributes.get("placeholder").cloned(),
                ]
                .into_iter()
                .flatten()
                .find(|s| !s.trim().is_empty())
                .unwrap_or_default();

                let mut element = SnapshotElement::new(
                    index,
                    kind,
                    Self::css_selector_for(&element_ref, &attributes),
                )
                .with_label(crate::dom::element::truncate_chars(&label, MAX_LABEL_CHARS))
                .set_visible(!Self::is_hidden_element(&attributes));

                if kind == ElementKind::Link {
                    if let Some(href) = attributes.get("href").filter(|h| !h.is_empty()) {
                        element = element.with_href(href.clone());
                    }
                }
                element.attributes = attributes;
                Some(element)
            })
            .collect()
    }

    fn css_selector_for(element_ref: &ElementRef, attributes: &HashMap<String, String>) -> String {
        let tag_name = element_ref.value().name();

        if let Some(id) = attributes.get("id") {
            format!("#{}", css_escape(id))
        } else if let Some(name) = attributes.get("name") {
            format!("{}[name='{}']", tag_name, name)
        } else if let Some(class) = attributes.get("class") {
            let classes: Vec<&str> = class.split_whitespace().collect();
            if classes.is_empty() {
                tag_name.to_string()
            } else {
                format!("{}.{}", tag_name, classes.join("."))
            }
        } else if let Some(aria_label) = attributes.get("aria-label") {
            format!("{}[aria-label='{}']", tag_name, aria_label)
        } else {
            tag_name.to_string()
        }
    }

    fn is_hidden_element(attributes: &HashMap<String, String>) -> bool {
        if attributes.get("type").map(|t| t.as_str()) == Some("hidden") {
            return true;
        }

        if let Some(style) = attributes.get("style") {
            let style_lower = style.to_lowercase().replace(' ', "");
            if style_lower.contains("display:none") || style_lower.contains("visibility:hidden") {
                return true;
            }
        }

        if attributes.contains_key("hidden") {
            return true;
        }

        if let Some(class) = attributes.get("class") {
            let class_lower = class.to_lowercase();
            if class_lower.contains("hidden")
                || class_lower.contains("invisible")
                || class_lower.contains("d-none")
            {
                return true;
            }
        }

        false
    }
}

fn css_escape(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            ' ' | '.' | '#' | ':' | '[' | ']' | '(' | ')' | '\'' | '"' => format!("\\{}", c),
            _ => c.to_string(),
        })
        .collect()
}
