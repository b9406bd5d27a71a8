//! Hover and click content for features with free-form attributes.
//!
//! A small allow-list of recognized keys (name, status, area, village,
//! district, survey number, date) is searched across common spelling
//! variants. When any of them is present the feature gets a structured card;
//! otherwise every attribute is listed verbatim. Every branch produces a
//! renderable block, whatever the attribute bag contains.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::gis::{attribute_text, display_value, Attributes};

/// Shown in the generic table for attributes whose value is null or blank.
pub const MISSING_VALUE: &str = "N/A";
pub const NO_ATTRIBUTES: &str = "No attributes available";
pub const OWNER_SECTION_TITLE: &str = "Owner details";
pub const POPUP_HINT: &str = "Click the parcel to zoom to it; hover over other parcels for a summary";

/// Attribute fields the structured card knows how to present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizedField {
    Name,
    Status,
    Area,
    Village,
    District,
    SurveyNumber,
    Date,
}

impl RecognizedField {
    /// Display order of the card rows. `Name` becomes the card title.
    pub const ALL: [RecognizedField; 7] = [
        RecognizedField::Name,
        RecognizedField::Status,
        RecognizedField::Area,
        RecognizedField::Village,
        RecognizedField::District,
        RecognizedField::SurveyNumber,
        RecognizedField::Date,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RecognizedField::Name => "Name",
            RecognizedField::Status => "Status",
            RecognizedField::Area => "Area",
            RecognizedField::Village => "Village",
            RecognizedField::District => "District",
            RecognizedField::SurveyNumber => "Survey No",
            RecognizedField::Date => "Date",
        }
    }

    /// Normalized key spellings, most specific first.
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            RecognizedField::Name => &[
                "name",
                "label",
                "claimantname",
                "ownername",
                "holdername",
                "applicantname",
                "title",
            ],
            RecognizedField::Status => &["status", "claimstatus", "frastatus"],
            RecognizedField::Area => &["area", "areaha", "areahectares", "areainhectares", "totalarea", "extent"],
            RecognizedField::Village => &["village", "villagename", "gram", "gaon"],
            RecognizedField::District => &["district", "districtname", "dist"],
            RecognizedField::SurveyNumber => &[
                "surveynumber",
                "surveyno",
                "survey",
                "khasra",
                "khasranumber",
                "khasrano",
                "plotnumber",
                "referencenumber",
                "refno",
            ],
            RecognizedField::Date => &[
                "date",
                "datesubmitted",
                "applicationdate",
                "granteddate",
                "created",
                "createdat",
            ],
        }
    }
}

/// One `label: value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRow {
    pub label: String,
    pub value: String,
}

impl ContentRow {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Card built from recognized fields.
    Structured,
    /// Verbatim key/value table.
    Generic,
    /// Placeholder for a feature without attributes.
    Empty,
}

/// Renderable tooltip or popup content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub kind: ContentKind,
    pub title: Option<String>,
    pub rows: Vec<ContentRow>,
    pub owner_rows: Vec<ContentRow>,
    pub hint: Option<String>,
}

impl ContentBlock {
    /// Plain text lines in display order.
    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(title) = &self.title {
            out.push(title.clone());
        }
        if self.kind == ContentKind::Empty {
            out.push(NO_ATTRIBUTES.to_string());
        }
        out.extend(self.rows.iter().map(|r| format!("{}: {}", r.label, r.value)));
        if !self.owner_rows.is_empty() {
            out.push(OWNER_SECTION_TITLE.to_string());
            out.extend(self.owner_rows.iter().map(|r| format!("{}: {}", r.label, r.value)));
        }
        if let Some(hint) = &self.hint {
            out.push(hint.clone());
        }
        out
    }

    pub fn to_text(&self) -> String {
        self.lines().join("\n")
    }

    /// HTML fragment for engines that render popups as markup.
    pub fn to_html(&self) -> String {
        let mut html = String::from("<div class=\"popup-content\">");
        if let Some(title) = &self.title {
            html.push_str(&format!("<h4>{}</h4>", escape_html(title)));
        }
        if self.kind == ContentKind::Empty {
            html.push_str(&format!("<p>{NO_ATTRIBUTES}</p>"));
        }
        push_rows(&mut html, &self.rows);
        if !self.owner_rows.is_empty() {
            html.push_str(&format!("<h5>{OWNER_SECTION_TITLE}</h5>"));
            push_rows(&mut html, &self.owner_rows);
        }
        if let Some(hint) = &self.hint {
            html.push_str(&format!("<p class=\"hint\"><em>{}</em></p>", escape_html(hint)));
        }
        html.push_str("</div>");
        html
    }

    /// Value of the first row with the given label.
    pub fn value_of(&self, label: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|r| r.label == label)
            .map(|r| r.value.as_str())
    }
}

fn push_rows(html: &mut String, rows: &[ContentRow]) {
    for row in rows {
        html.push_str(&format!(
            "<p><strong>{}:</strong> {}</p>",
            escape_html(&row.label),
            escape_html(&row.value)
        ));
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

static CAMEL_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_\-\s]+").unwrap());

/// Turns an identifier such as `applicationDate` or `survey_no` into `Application Date`/`Survey No`.
pub fn humanize_key(key: &str) -> String {
    let spaced = CAMEL_BOUNDARY.replace_all(key, "$1 $2");
    let spaced = SEPARATORS.replace_all(&spaced, " ");
    spaced
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Converts an arbitrary JSON value into an attribute bag.
///
/// Objects are used as-is, `null` becomes empty, any other value is kept
/// under a single `value` key.
pub fn attributes_from_value(value: &Value) -> Attributes {
    match value {
        Value::Object(map) => map.clone(),
        Value::Null => Attributes::new(),
        other => {
            let mut map = Attributes::new();
            map.insert("value".to_string(), other.clone());
            map
        }
    }
}

fn owner_rows(owner_info: Option<&Attributes>) -> Vec<ContentRow> {
    owner_info
        .map(|info| {
            info.iter()
                .filter_map(|(k, v)| display_value(v).map(|v| ContentRow::new(humanize_key(k), v)))
                .collect()
        })
        .unwrap_or_default()
}

/// Builds hover content for a feature.
///
/// `fallback_label` titles the card when the attributes carry no name.
/// `owner_info` adds an owner sub-section to structured cards when any of its
/// values is non-empty.
pub fn build_tooltip(
    attributes: &Attributes,
    fallback_label: &str,
    owner_info: Option<&Attributes>,
) -> ContentBlock {
    let fallback = Some(fallback_label.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let found: Vec<(RecognizedField, String)> = RecognizedField::ALL
        .iter()
        .filter_map(|field| attribute_text(attributes, field.candidates()).map(|v| (*field, v)))
        .collect();

    if !found.is_empty() {
        let mut title = fallback;
        let mut rows = Vec::new();
        for (field, value) in found {
            if field == RecognizedField::Name {
                title = Some(value);
            } else {
                rows.push(ContentRow::new(field.label(), value));
            }
        }
        return ContentBlock {
            kind: ContentKind::Structured,
            title,
            rows,
            owner_rows: owner_rows(owner_info),
            hint: None,
        };
    }

    if attributes.is_empty() {
        return ContentBlock {
            kind: ContentKind::Empty,
            title: fallback,
            rows: Vec::new(),
            owner_rows: Vec::new(),
            hint: None,
        };
    }

    let rows = attributes
        .iter()
        .map(|(k, v)| ContentRow::new(k.clone(), display_value(v).unwrap_or_else(|| MISSING_VALUE.to_string())))
        .collect();
    ContentBlock {
        kind: ContentKind::Generic,
        title: fallback,
        rows,
        owner_rows: Vec::new(),
        hint: None,
    }
}

/// Click content: the tooltip plus a line explaining how to interact.
pub fn build_popup(
    attributes: &Attributes,
    fallback_label: &str,
    owner_info: Option<&Attributes>,
) -> ContentBlock {
    let mut block = build_tooltip(attributes, fallback_label, owner_info);
    block.hint = Some(POPUP_HINT.to_string());
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(v: Value) -> Attributes {
        attributes_from_value(&v)
    }

    #[test]
    fn recognized_keys_build_structured_card() {
        let block = build_tooltip(&attrs(json!({"Village": "X", "Area": 5})), "Parcel", None);
        assert_eq!(block.kind, ContentKind::Structured);
        let lines = block.lines();
        assert!(lines.contains(&"Village: X".to_string()));
        assert!(lines.contains(&"Area: 5".to_string()));
        assert_eq!(block.title.as_deref(), Some("Parcel"));
    }

    #[test]
    fn unknown_keys_fall_back_to_generic_rows() {
        let block = build_tooltip(&attrs(json!({"foo": "bar"})), "", None);
        assert_eq!(block.kind, ContentKind::Generic);
        assert_eq!(block.lines(), vec!["foo: bar".to_string()]);
    }

    #[test]
    fn empty_bag_yields_placeholder() {
        let block = build_tooltip(&Attributes::new(), "Plot 1", None);
        assert_eq!(block.kind, ContentKind::Empty);
        assert_eq!(block.lines(), vec!["Plot 1".to_string(), NO_ATTRIBUTES.to_string()]);
    }

    #[test]
    fn null_fields_never_fail() {
        let block = build_tooltip(&attrs(json!({"village": null, "odd": null})), "x", None);
        assert_eq!(block.kind, ContentKind::Generic);
        assert_eq!(block.value_of("odd"), Some(MISSING_VALUE));
        assert_eq!(block.value_of("village"), Some(MISSING_VALUE));
    }

    #[test]
    fn non_object_values_are_total() {
        for v in [json!(null), json!(3), json!("text"), json!([1, 2])] {
            let block = build_popup(&attrs(v), "", None);
            assert!(!block.lines().is_empty());
        }
    }

    #[test]
    fn name_variants_become_title() {
        let block = build_tooltip(
            &attrs(json!({"claimant_name": "Ramesh Kumar", "Survey-No": "MH001", "dateSubmitted": "2023-01-15"})),
            "Claim",
            None,
        );
        assert_eq!(block.title.as_deref(), Some("Ramesh Kumar"));
        assert_eq!(block.value_of("Survey No"), Some("MH001"));
        assert_eq!(block.value_of("Date"), Some("2023-01-15"));
    }

    #[test]
    fn owner_section_only_when_non_empty() {
        let owner = attrs(json!({"name": "", "applicationDate": null}));
        let block = build_tooltip(&attrs(json!({"status": "granted"})), "", Some(&owner));
        assert!(block.owner_rows.is_empty());

        let owner = attrs(json!({"fatherName": "Mohan", "applicationDate": "2024-03-01"}));
        let block = build_tooltip(&attrs(json!({"status": "granted"})), "", Some(&owner));
        let lines = block.lines();
        assert!(lines.contains(&OWNER_SECTION_TITLE.to_string()));
        assert!(lines.contains(&"Father Name: Mohan".to_string()));
        assert!(lines.contains(&"Application Date: 2024-03-01".to_string()));
    }

    #[test]
    fn popup_appends_hint() {
        let block = build_popup(&attrs(json!({"Area": 2.5})), "", None);
        assert_eq!(block.lines().last().map(String::as_str), Some(POPUP_HINT));
    }

    #[test]
    fn humanize_variants() {
        assert_eq!(humanize_key("applicationDate"), "Application Date");
        assert_eq!(humanize_key("survey_no"), "Survey No");
        assert_eq!(humanize_key("fra-type"), "Fra Type");
        assert_eq!(humanize_key("name"), "Name");
    }

    #[test]
    fn html_is_escaped() {
        let block = build_tooltip(&attrs(json!({"foo": "<b>x</b>"})), "", None);
        let html = block.to_html();
        assert!(html.contains("&lt;b&gt;x&lt;/b&gt;"));
        assert!(!html.contains("<b>x"));
    }
}
