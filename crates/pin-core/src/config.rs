//! Chart configuration
//!
//! `ChartConfig` is the serializable surface a host hands to a chart widget.
//! Formatter callbacks cannot be serialized, so they live separately in
//! [`Formatters`].

use std::fmt;
use std::sync::Arc;

use egui::{Color32, Vec2};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::annotations::DEFAULT_MAX_ANNOTATIONS;
use crate::colors::{parse_hex_color, DEFAULT_PALETTE};
use crate::data::{ChartData, DataPoint, FieldValue, SeriesSpec};
use crate::error::ConfigError;
use crate::scale::{format_compact, WidthBounds};

pub use crate::snap::SnapThresholds;

/// Chart variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Area,
    /// Mixed bar, line and area series
    Composed,
}

impl ChartKind {
    /// Clamp range for derived widths
    pub fn width_bounds(&self) -> WidthBounds {
        match self {
            ChartKind::Bar => WidthBounds { min: 380.0, max: 2200.0 },
            ChartKind::Line | ChartKind::Area => WidthBounds { min: 300.0, max: 1800.0 },
            ChartKind::Composed => WidthBounds { min: 360.0, max: 2000.0 },
        }
    }
}

/// Pinning and dragging options
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationSettings {
    /// Maximum simultaneously pinned annotations for one chart
    pub max_annotations: usize,
    /// Clicking a mark pins an annotation
    pub pinning_enabled: bool,
    /// Pinned annotations can be dragged
    pub dragging_enabled: bool,
    pub thresholds: SnapThresholds,
    /// Estimated annotation size `[width, height]` used for clamping and guides
    pub footprint: [f32; 2],
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self {
            max_annotations: DEFAULT_MAX_ANNOTATIONS,
            pinning_enabled: true,
            dragging_enabled: true,
            thresholds: SnapThresholds::default(),
            footprint: [320.0, 220.0],
        }
    }
}

impl AnnotationSettings {
    pub fn footprint(&self) -> Vec2 {
        Vec2::new(self.footprint[0], self.footprint[1])
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_annotations == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        self.thresholds.validate()
    }
}

/// Configuration for one chart widget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub title: String,
    pub kind: ChartKind,
    /// Field holding each row's category
    pub category_key: String,
    /// Series in draw order
    pub series: Vec<SeriesSpec>,
    /// Hex colors; empty means the default palette
    pub palette: Vec<String>,
    /// Per-series hex colors that win over the palette
    pub color_overrides: IndexMap<String, String>,
    /// Fixed width in pixels; derived from the data when absent
    pub width: Option<f64>,
    pub height: f32,
    pub annotations: AnnotationSettings,
    pub rows: Vec<DataPoint>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            kind: ChartKind::Bar,
            category_key: String::new(),
            series: Vec::new(),
            palette: Vec::new(),
            color_overrides: IndexMap::new(),
            width: None,
            height: 280.0,
            annotations: AnnotationSettings::default(),
            rows: Vec::new(),
        }
    }
}

impl ChartConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ChartConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check everything that can be checked without the rows
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.category_key.is_empty() {
            return Err(ConfigError::EmptyCategoryKey);
        }
        self.annotations.validate()?;
        self.palette_colors()?;
        self.override_colors()?;
        Ok(())
    }

    /// Parsed palette, falling back to the default palette
    pub fn palette_colors(&self) -> Result<Vec<Color32>, ConfigError> {
        if self.palette.is_empty() {
            return Ok(DEFAULT_PALETTE.to_vec());
        }
        self.palette.iter().map(|c| parse_hex_color(c)).collect()
    }

    pub fn override_colors(&self) -> Result<IndexMap<String, Color32>, ConfigError> {
        self.color_overrides
            .iter()
            .map(|(key, color)| Ok((key.clone(), parse_hex_color(color)?)))
            .collect()
    }

    /// Validate rows against the category key and series
    pub fn build_data(&self) -> Result<ChartData, ConfigError> {
        ChartData::new(self.rows.clone(), &self.category_key, self.series.clone())
    }
}

/// Formats a numeric value
pub type NumberFormatter = Arc<dyn Fn(f64) -> String + Send + Sync>;
/// Formats a category label
pub type CategoryFormatter = Arc<dyn Fn(&str) -> String + Send + Sync>;
/// Formats one field of an annotation payload
pub type FieldFormatter = Arc<dyn Fn(&str, &FieldValue) -> String + Send + Sync>;

/// Display callbacks supplied by the host
#[derive(Clone)]
pub struct Formatters {
    pub axis: NumberFormatter,
    pub category: CategoryFormatter,
    pub value: FieldFormatter,
}

impl Default for Formatters {
    fn default() -> Self {
        Self {
            axis: Arc::new(format_compact),
            category: Arc::new(|category: &str| category.to_string()),
            value: Arc::new(|_key: &str, value: &FieldValue| default_value_format(value)),
        }
    }
}

impl fmt::Debug for Formatters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatters").finish_non_exhaustive()
    }
}

fn default_value_format(value: &FieldValue) -> String {
    match value {
        FieldValue::Number(n) if n.is_finite() && n.fract() == 0.0 => format!("{:.0}", n),
        FieldValue::Number(n) if n.is_finite() => format!("{:.2}", n),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
        "title": "Revenue",
        "kind": "composed",
        "category_key": "quarter",
        "series": [
            { "kind": "bar", "field_key": "revenue" },
            { "kind": "line", "field_key": "target" }
        ],
        "color_overrides": { "target": "#ff0000" },
        "annotations": { "max_annotations": 3 },
        "rows": [
            { "quarter": "Q1", "revenue": 120.5, "target": 100 },
            { "quarter": "Q2", "revenue": 98, "target": 110 }
        ]
    }"##;

    #[test]
    fn test_config_from_json() {
        let config = ChartConfig::from_json(SAMPLE).unwrap();

        assert_eq!(config.kind, ChartKind::Composed);
        assert_eq!(config.annotations.max_annotations, 3);
        assert!(config.annotations.dragging_enabled);
        assert_eq!(config.annotations.thresholds, SnapThresholds::default());
        assert_eq!(config.palette_colors().unwrap(), DEFAULT_PALETTE.to_vec());
        assert_eq!(config.override_colors().unwrap()["target"], Color32::from_rgb(255, 0, 0));

        let data = config.build_data().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.series_keys(), vec!["revenue".to_string(), "target".to_string()]);
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let mut config = ChartConfig::from_json(SAMPLE).unwrap();
        config.palette = vec!["blue".to_string()];
        assert_eq!(config.validate(), Err(ConfigError::InvalidColor("blue".to_string())));

        let mut config = ChartConfig::from_json(SAMPLE).unwrap();
        config.annotations.max_annotations = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));

        assert!(matches!(ChartConfig::from_json("{"), Err(ConfigError::Json(_))));
        assert_eq!(ChartConfig::from_json("{}").unwrap_err(), ConfigError::EmptyCategoryKey);
    }

    #[test]
    fn test_width_bounds_per_kind() {
        assert_eq!(ChartKind::Bar.width_bounds().min, 380.0);
        assert_eq!(ChartKind::Line.width_bounds().max, 1800.0);
        assert_eq!(ChartKind::Composed.width_bounds().max, 2000.0);
    }

    #[test]
    fn test_default_formatters() {
        let formatters = Formatters::default();
        assert_eq!((formatters.axis)(12_500.0), "12.5K");
        assert_eq!((formatters.category)("Q1"), "Q1");
        assert_eq!((formatters.value)("revenue", &FieldValue::Number(98.0)), "98");
        assert_eq!((formatters.value)("revenue", &FieldValue::Number(120.456)), "120.46");
        assert_eq!((formatters.value)("note", &FieldValue::Null), "-");
    }
}
