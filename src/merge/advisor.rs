use crate::core::{generate_json, GenerationRequest, JsonGenerationError, TextGenerator};
use crate::dom::SnapshotElement;
use crate::dom::element::truncate_chars;
use crate::errors::{Result, TextViewError};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are helping to integrate interactive web elements into a text layout.
Your job is to decide:
1. Should the element be shown? (ignore ads, tracking, irrelevant elements)
2. Where should it go? (which line number)
3. How should it be formatted? (use [N:label] format)

Be conservative - only show elements that are clearly useful for navigation or interaction.";

/// Which side of the target line a marker goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerPosition {
    Before,
    #[default]
    After,
}

/// Where (and whether) to show one unplaced element.
///
/// `line` is whatever the advisor asked for; it is clamped at injection time.
/// `line` also accepts integral floats and numeric strings. Any `position`
/// other than "before" means after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementDecision {
    pub show: bool,
    #[serde(default, deserialize_with = "lenient_line")]
    pub line: i64,
    #[serde(default, deserialize_with = "lenient_position")]
    pub position: MarkerPosition,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl PlacementDecision {
    pub fn show_at(line: i64, position: MarkerPosition, format: impl Into<String>) -> Self {
        Self {
            show: true,
            line,
            position,
            format: Some(format.into()),
            reason: None,
        }
    }

    pub fn hide(reason: impl Into<String>) -> Self {
        Self {
            show: false,
            line: 0,
            position: MarkerPosition::After,
            format: None,
            reason: Some(reason.into()),
        }
    }
}

fn lenient_line<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let line = match &value {
        Value::Null => Some(0),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    };
    line.ok_or_else(|| D::Error::custom(format!("line is not a whole number: {}", value)))
}

fn integral(value: f64) -> Option<i64> {
    let in_range = value.is_finite() && value.abs() < i64::MAX as f64;
    (in_range && value.fract() == 0.0).then_some(value as i64)
}

fn lenient_position<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<MarkerPosition, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value.as_str() {
        Some(s) if s.trim().eq_ignore_ascii_case("before") => MarkerPosition::Before,
        _ => MarkerPosition::After,
    })
}

/// Decisions keyed by snapshot extraction index.
pub type Placements = BTreeMap<usize, PlacementDecision>;

/// Asks the text-generation capability where ambiguous elements belong.
pub struct PlacementAdvisor<'a> {
    generator: &'a dyn TextGenerator,
    context_chars: usize,
    label_chars: usize,
    temperature: f32,
    max_tokens: u32,
}

impl<'a> PlacementAdvisor<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self {
            generator,
            context_chars: 3000,
            label_chars: 100,
            temperature: 0.3,
            max_tokens: 2000,
        }
    }

    pub fn with_limits(mut self, context_chars: usize, label_chars: usize) -> Self {
        self.context_chars = context_chars;
        self.label_chars = label_chars;
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Never fails: any advisor problem yields an empty placement set, which
    /// is logged and pushed onto `warnings`.
    pub async fn place(
        &self,
        text: &str,
        elements: &[&SnapshotElement],
        warnings: &mut Vec<TextViewError>,
    ) -> Placements {
        if elements.is_empty() {
            return Placements::new();
        }

        match self.request_placements(text, elements, warnings).await {
            Ok(placements) => {
                debug!(
                    advisor = self.generator.name(),
                    requested = elements.len(),
                    decided = placements.len(),
                    "advisor placement received"
                );
                placements
            }
            Err(err) => {
                warn!(advisor = self.generator.name(), error = %err, "advisor placement failed");
                warnings.push(err);
                Placements::new()
            }
        }
    }

    pub async fn request_placements(
        &self,
        text: &str,
        elements: &[&SnapshotElement],
        warnings: &mut Vec<TextViewError>,
    ) -> Result<Placements> {
        let request = GenerationRequest::new(self.build_prompt(text, elements))
            .with_system_prompt(SYSTEM_PROMPT)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let response = generate_json(self.generator, &request)
            .await
            .map_err(|err| match err {
                JsonGenerationError::Generation(e) => TextViewError::AdvisorUnavailable(e.to_string()),
                JsonGenerationError::Malformed { message, raw_text } => {
                    TextViewError::AdvisorMalformedResponse {
                        reason: message,
                        raw_text,
                    }
                }
            })?;

        parse_placements(&response, warnings)
    }

    pub fn build_prompt(&self, text: &str, elements: &[&SnapshotElement]) -> String {
        let numbered_lines = text
            .split('\n')
            .enumerate()
            .map(|(i, line)| format!("{}: {}", i, line))
            .collect::<Vec<_>>()
            .join("\n");
        let numbered_lines = truncate_chars(&numbered_lines, self.context_chars);

        let elements_json: Vec<Value> = elements
            .iter()
            .map(|el| {
                json!({
                    "id": synthetic_id(el.index),
                    "type": el.kind.as_str(),
                    "text": el.truncated_label(self.label_chars),
                    "visible": el.visible,
                })
            })
            .collect();
        let elements_json =
            serde_json::to_string_pretty(&elements_json).unwrap_or_else(|_| "[]".to_string());

        format!(
            r#"TEXT VIEW (with line numbers):
{}

ELEMENTS TO PLACE:
{}

For each element, decide placement. Return JSON only:
{{
  "el_0": {{"show": true, "line": 5, "position": "before", "format": "[N:▲]"}},
  "el_1": {{"show": false, "reason": "tracking pixel"}},
  ...
}}

Use "N" as placeholder for the number - it will be replaced.
Position can be "before" or "after" the line.
"#,
            numbered_lines, elements_json
        )
    }
}

pub fn synthetic_id(index: usize) -> String {
    format!("el_{}", index)
}

/// Reads `{"el_<index>": decision, ...}`. Keys that are not synthetic ids are
/// skipped. An entry that cannot be read as a decision is skipped too, with a
/// malformed-response warning naming it.
pub fn parse_placements(response: &Value, warnings: &mut Vec<TextViewError>) -> Result<Placements> {
    let Some(object) = response.as_object() else {
        return Err(TextViewError::AdvisorMalformedResponse {
            reason: "expected a JSON object".to_string(),
            raw_text: response.to_string(),
        });
    };

    let mut placements = Placements::new();
    for (key, value) in object {
        let Some(index) = key
            .strip_prefix("el_")
            .and_then(|rest| rest.parse::<usize>().ok())
        else {
            continue;
        };

        match serde_json::from_value::<PlacementDecision>(value.clone()) {
            Ok(decision) => {
                placements.insert(index, decision);
            }
            Err(e) => {
                warn!(key = %key, error = %e, "skipping unreadable placement entry");
                warnings.push(TextViewError::AdvisorMalformedResponse {
                    reason: format!("{}: {}", key, e),
                    raw_text: value.to_string(),
                });
            }
        }
    }

    Ok(placements)
}
