use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open, string keyed attribute bag attached to a feature.
///
/// Upstream document sources do not agree on a schema, so attributes stay
/// loosely typed and keep their insertion order.
pub type Attributes = serde_json::Map<String, Value>;

/// Wrapper linking a geometry with optional feature class and GIS attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature<T> {
    /// Optional feature class name, e.g. source layer or category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Arbitrary attribute key/value pairs.
    #[serde(default)]
    pub attributes: Attributes,
    pub geometry: T,
}

impl<T> Feature<T> {
    /// Creates a new feature with empty attributes.
    pub fn new(geometry: T) -> Self {
        Self {
            class: None,
            attributes: Attributes::new(),
            geometry,
        }
    }

    pub fn with_attributes(geometry: T, attributes: Attributes) -> Self {
        Self {
            class: None,
            attributes,
            geometry,
        }
    }
}

/// Normalizes an attribute key for loose matching: lowercase, separators dropped.
///
/// `Survey_No`, `survey-no` and `surveyNo` all map to `surveyno`.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' ' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Renders an attribute value for display, `None` when it carries no content.
///
/// Null and blank strings count as empty; nested values are rendered as
/// compact JSON.
pub fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// Looks up the first key whose normalized form appears in `candidates`.
pub fn find_attribute<'a>(
    attributes: &'a Attributes,
    candidates: &[&str],
) -> Option<(&'a str, &'a Value)> {
    for candidate in candidates {
        let hit = attributes
            .iter()
            .find(|(k, v)| normalize_key(k) == *candidate && display_value(v).is_some());
        if let Some((k, v)) = hit {
            return Some((k.as_str(), v));
        }
    }
    None
}

/// Returns the attribute as a display string when present under any candidate key.
pub fn attribute_text(attributes: &Attributes, candidates: &[&str]) -> Option<String> {
    find_attribute(attributes, candidates).and_then(|(_, v)| display_value(v))
}
