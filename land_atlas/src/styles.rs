//! Layer styles and their resolution to concrete paint parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};
use crate::geometry::{bounds, Bounds, Ring};

/// RGB color, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }
}

impl FromStr for Color {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AtlasError::InvalidValue(format!("bad color '{s}'")));
        }
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(AtlasError::InvalidValue(format!("bad color '{s}'"))),
        };
        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .map_err(|_| AtlasError::InvalidValue(format!("bad color '{s}'")))
        };
        Ok(Self([channel(0)?, channel(2)?, channel(4)?]))
    }
}

impl TryFrom<String> for Color {
    type Error = AtlasError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

/// Status of a parcel, which selects its default palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Granted,
    Potential,
    #[default]
    Uploaded,
    Draft,
    /// Parcels of the persistent focus layer.
    Highlighted,
}

impl FeatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureStatus::Granted => "granted",
            FeatureStatus::Potential => "potential",
            FeatureStatus::Uploaded => "uploaded",
            FeatureStatus::Draft => "draft",
            FeatureStatus::Highlighted => "highlighted",
        }
    }
}

impl FromStr for FeatureStatus {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "granted" | "approved" => Ok(FeatureStatus::Granted),
            "potential" | "pending" => Ok(FeatureStatus::Potential),
            "uploaded" => Ok(FeatureStatus::Uploaded),
            "draft" | "active" => Ok(FeatureStatus::Draft),
            "highlighted" => Ok(FeatureStatus::Highlighted),
            other => Err(AtlasError::InvalidValue(format!(
                "unknown feature status '{other}'"
            ))),
        }
    }
}

/// Pointer interaction applied on top of a feature's resting style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Normal,
    Hovered,
    Focused,
}

/// Declared style of a layer. Omitted fields fall back to the status palette.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_opacity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash_array: Option<String>,
}

impl LayerStyle {
    pub fn new(stroke: Color, fill: Color, fill_opacity: f32) -> Self {
        Self {
            stroke_color: Some(stroke),
            fill_color: Some(fill),
            fill_opacity: Some(fill_opacity),
            ..Self::default()
        }
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.stroke_width = Some(width);
        self
    }

    pub fn with_dash(mut self, dash: &str) -> Self {
        self.dash_array = Some(dash.to_string());
        self
    }

    /// Returns a new style with the fields set in `ov` taking precedence.
    pub fn overridden(&self, ov: &LayerStyle) -> Self {
        Self {
            stroke_color: ov.stroke_color.or(self.stroke_color),
            stroke_width: ov.stroke_width.or(self.stroke_width),
            stroke_opacity: ov.stroke_opacity.or(self.stroke_opacity),
            fill_color: ov.fill_color.or(self.fill_color),
            fill_opacity: ov.fill_opacity.or(self.fill_opacity),
            dash_array: ov.dash_array.clone().or_else(|| self.dash_array.clone()),
        }
    }
}

/// Concrete paint parameters handed to the rendering engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintParams {
    pub stroke_color: Color,
    pub stroke_width: f32,
    pub stroke_opacity: f32,
    pub fill_color: Color,
    pub fill_opacity: f32,
    pub dash_array: Option<String>,
    /// Ask the engine to raise the feature above its siblings.
    pub bring_to_front: bool,
}

pub const DEFAULT_STROKE_WIDTH: f32 = 2.0;
pub const DEFAULT_STROKE_OPACITY: f32 = 1.0;

/// Palette used when a layer style omits a field.
pub fn status_palette(status: FeatureStatus) -> PaintParams {
    let (stroke, fill, fill_opacity, width) = match status {
        FeatureStatus::Granted => (Color::rgb(0x1b, 0x5e, 0x20), Color::rgb(0x2e, 0x7d, 0x32), 0.35, DEFAULT_STROKE_WIDTH),
        FeatureStatus::Potential => (Color::rgb(0xff, 0x6f, 0x00), Color::rgb(0xff, 0x98, 0x00), 0.25, DEFAULT_STROKE_WIDTH),
        FeatureStatus::Uploaded => (Color::rgb(0x9c, 0x27, 0xb0), Color::rgb(0xba, 0x68, 0xc8), 0.4, DEFAULT_STROKE_WIDTH),
        FeatureStatus::Draft => (Color::rgb(0x21, 0x96, 0xf3), Color::rgb(0x21, 0x96, 0xf3), 0.2, 3.0),
        FeatureStatus::Highlighted => (Color::rgb(0xff, 0xeb, 0x3b), Color::rgb(0xff, 0xc1, 0x07), 0.3, 3.0),
    };
    PaintParams {
        stroke_color: stroke,
        stroke_width: width,
        stroke_opacity: DEFAULT_STROKE_OPACITY,
        fill_color: fill,
        fill_opacity,
        dash_array: None,
        bring_to_front: false,
    }
}

/// Increments applied for hover and focus emphasis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmphasisConfig {
    pub hover_weight_increment: f32,
    pub hover_opacity_increment: f32,
    /// Emphasis never pushes fill opacity past this value.
    pub opacity_ceiling: f32,
    pub focus_weight_increment: f32,
}

impl Default for EmphasisConfig {
    fn default() -> Self {
        Self {
            hover_weight_increment: 1.0,
            hover_opacity_increment: 0.2,
            opacity_ceiling: 0.8,
            focus_weight_increment: 2.0,
        }
    }
}

/// Paint for a focused feature plus the box the camera should frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FocusedPaint {
    pub paint: PaintParams,
    pub frame: Bounds,
}

/// Maps layer style, feature status and interaction to paint parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleResolver {
    emphasis: EmphasisConfig,
}

impl StyleResolver {
    pub fn new(emphasis: EmphasisConfig) -> Self {
        Self { emphasis }
    }

    pub fn emphasis(&self) -> &EmphasisConfig {
        &self.emphasis
    }

    pub fn resolve(
        &self,
        style: &LayerStyle,
        status: FeatureStatus,
        interaction: InteractionState,
    ) -> PaintParams {
        let base = status_palette(status);
        let mut paint = PaintParams {
            stroke_color: style.stroke_color.unwrap_or(base.stroke_color),
            stroke_width: style.stroke_width.unwrap_or(base.stroke_width),
            stroke_opacity: style.stroke_opacity.unwrap_or(base.stroke_opacity),
            fill_color: style.fill_color.unwrap_or(base.fill_color),
            fill_opacity: style.fill_opacity.unwrap_or(base.fill_opacity),
            dash_array: style.dash_array.clone(),
            bring_to_front: false,
        };
        let e = &self.emphasis;
        match interaction {
            InteractionState::Normal => {}
            InteractionState::Hovered => {
                paint.stroke_width += e.hover_weight_increment;
                paint.fill_opacity = emphasize(paint.fill_opacity, e.hover_opacity_increment, e.opacity_ceiling);
            }
            InteractionState::Focused => {
                paint.stroke_width += e.hover_weight_increment + e.focus_weight_increment;
                paint.fill_opacity = emphasize(paint.fill_opacity, e.hover_opacity_increment, e.opacity_ceiling);
                paint.bring_to_front = true;
            }
        }
        paint
    }

    /// Focus paint for a feature along with its camera frame.
    pub fn focus(&self, style: &LayerStyle, status: FeatureStatus, ring: &Ring) -> Result<FocusedPaint> {
        Ok(FocusedPaint {
            paint: self.resolve(style, status, InteractionState::Focused),
            frame: bounds(ring.coords())?,
        })
    }
}

/// Raises `value` by `inc` up to `ceiling`, never lowering an already higher value.
fn emphasize(value: f32, inc: f32, ceiling: f32) -> f32 {
    (value + inc).min(ceiling).max(value)
}

/// Resolves with the default emphasis increments.
pub fn resolve(style: &LayerStyle, status: FeatureStatus, interaction: InteractionState) -> PaintParams {
    StyleResolver::default().resolve(style, status, interaction)
}

/// Returns the named layer styles offered for uploaded and reference layers.
pub fn default_layer_styles() -> Vec<(String, LayerStyle)> {
    vec![
        (
            "Administrative Boundary".to_string(),
            LayerStyle::new(Color::rgb(0x19, 0x76, 0xd2), Color::rgb(0x21, 0x96, 0xf3), 0.1)
                .with_width(2.0)
                .with_dash("5,5"),
        ),
        (
            "Forest Area".to_string(),
            LayerStyle::new(Color::rgb(0x2e, 0x7d, 0x32), Color::rgb(0x4c, 0xaf, 0x50), 0.3).with_width(2.0),
        ),
        (
            "All Land Plots".to_string(),
            LayerStyle::new(Color::rgb(0x9c, 0x27, 0xb0), Color::rgb(0xba, 0x68, 0xc8), 0.4).with_width(2.0),
        ),
        (
            "CFR Boundary".to_string(),
            LayerStyle {
                stroke_opacity: Some(0.8),
                ..LayerStyle::new(Color::rgb(0x00, 0x64, 0x00), Color::rgb(0x22, 0x8b, 0x22), 0.3).with_width(2.0)
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_hex_round_trip() {
        let c: Color = "#1b5e20".parse().unwrap();
        assert_eq!(c, Color::rgb(0x1b, 0x5e, 0x20));
        assert_eq!(c.to_string(), "#1b5e20");
        assert_eq!("#fff".parse::<Color>().unwrap(), Color::rgb(255, 255, 255));
        assert!("#12".parse::<Color>().is_err());
        assert!("#aéaaa".parse::<Color>().is_err());
        assert!("#gggggg".parse::<Color>().is_err());
    }

    #[test]
    fn omitted_fields_use_status_palette() {
        let paint = resolve(&LayerStyle::default(), FeatureStatus::Granted, InteractionState::Normal);
        assert_eq!(paint.stroke_color.to_string(), "#1b5e20");
        assert_eq!(paint.fill_opacity, 0.35);
        assert_eq!(paint.stroke_width, DEFAULT_STROKE_WIDTH);
    }

    #[test]
    fn declared_fields_win_over_palette() {
        let style = LayerStyle {
            fill_opacity: Some(0.5),
            ..LayerStyle::default()
        };
        let paint = resolve(&style, FeatureStatus::Potential, InteractionState::Normal);
        assert_eq!(paint.fill_opacity, 0.5);
        assert_eq!(paint.fill_color.to_string(), "#ff9800");
    }

    #[test]
    fn hover_is_capped() {
        let style = LayerStyle {
            fill_opacity: Some(0.7),
            ..LayerStyle::default()
        };
        let paint = resolve(&style, FeatureStatus::Uploaded, InteractionState::Hovered);
        assert!((paint.fill_opacity - 0.8).abs() < 1e-6);
        assert_eq!(paint.stroke_width, DEFAULT_STROKE_WIDTH + 1.0);
        assert!(!paint.bring_to_front);
    }

    #[test]
    fn hover_never_lowers_opacity() {
        let style = LayerStyle {
            fill_opacity: Some(0.95),
            ..LayerStyle::default()
        };
        let paint = resolve(&style, FeatureStatus::Uploaded, InteractionState::Hovered);
        assert_eq!(paint.fill_opacity, 0.95);
    }

    #[test]
    fn focus_brings_to_front() {
        let paint = resolve(&LayerStyle::default(), FeatureStatus::Draft, InteractionState::Focused);
        assert!(paint.bring_to_front);
        assert_eq!(paint.stroke_width, 3.0 + 1.0 + 2.0);
    }

    #[test]
    fn style_override() {
        let base = LayerStyle::new(Color::rgb(1, 2, 3), Color::rgb(4, 5, 6), 0.2);
        let over = LayerStyle {
            fill_opacity: Some(0.6),
            ..LayerStyle::default()
        };
        let result = base.overridden(&over);
        assert_eq!(result.fill_opacity, Some(0.6));
        assert_eq!(result.stroke_color, Some(Color::rgb(1, 2, 3)));
    }

    #[test]
    fn style_serializes_camel_case() {
        let style = LayerStyle::new(Color::rgb(0, 0x64, 0), Color::rgb(0x22, 0x8b, 0x22), 0.3);
        let json = serde_json::to_value(&style).unwrap();
        assert_eq!(json["strokeColor"], "#006400");
        assert!(json.get("dashArray").is_none());
    }

    #[test]
    fn status_parses_aliases() {
        assert_eq!("Approved".parse::<FeatureStatus>().unwrap(), FeatureStatus::Granted);
        assert_eq!("pending".parse::<FeatureStatus>().unwrap(), FeatureStatus::Potential);
        assert!("unknown".parse::<FeatureStatus>().is_err());
    }
}
