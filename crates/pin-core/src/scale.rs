//! Axis scaling and chart sizing
//!
//! Everything in this module is a pure function of its inputs. Malformed
//! numbers (NaN, infinities, negatives where only positives make sense)
//! fall back to safe defaults instead of erroring.

use serde::{Deserialize, Serialize};

use crate::data::{Row, SeriesKind, SeriesSpec};

/// Multipliers applied to the value's power-of-ten magnitude
const NICE_LADDER: [f64; 15] = [
    1.0, 1.25, 1.5, 2.0, 2.5, 3.0, 4.0, 5.0, 7.5, 10.0, 15.0, 20.0, 25.0, 50.0, 100.0,
];

/// Base pixel budget per category
const BASE_CATEGORY_WIDTH: f64 = 56.0;
/// Added per bar series beyond the first
const EXTRA_BAR_WIDTH: f64 = 22.0;
/// Added per line or area series
const EXTRA_LINE_WIDTH: f64 = 6.0;
/// Room for the value axis and outer padding
const CHART_MARGIN: f64 = 120.0;

/// Rough glyph width used when no text measurement is available
const ESTIMATED_CHAR_WIDTH: f32 = 7.0;

/// Round a positive value up to the nearest "nice" number.
///
/// Returns 1 for non-finite or non-positive input.
pub fn nice_ceiling(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 1.0;
    }

    let exponent = value.log10().floor() as i32;
    let magnitude = 10f64.powi(exponent);
    // Subnormal inputs underflow the magnitude to zero
    if !magnitude.is_normal() {
        return value;
    }

    for step in NICE_LADDER {
        let candidate = step * magnitude;
        if !candidate.is_finite() {
            return value;
        }
        if candidate >= value {
            return candidate;
        }
        // Float noise from the magnitude division: treat as already nice
        if value - candidate <= value * 1e-12 {
            return value;
        }
    }

    // Unreachable for finite input since the ladder spans two decades
    NICE_LADDER[NICE_LADDER.len() - 1] * magnitude
}

/// Padded, nice-rounded axis maximum for a raw data maximum.
///
/// The padding keeps markers and labels at the peak from touching the plot
/// edge. Always returns a strictly positive value.
pub fn compute_nice_max(raw_max: f64) -> f64 {
    let raw = if raw_max.is_finite() && raw_max > 0.0 {
        raw_max
    } else {
        0.0
    };

    let padding = if raw == 0.0 {
        0.12
    } else if raw < 1e6 {
        0.08
    } else if raw < 1e7 {
        0.05
    } else {
        0.03
    };

    let padded = raw * (1.0 + padding);
    nice_ceiling(if padded.is_finite() { padded } else { raw })
}

/// Largest numeric value across all rows and series keys, never below 0
pub fn max_data_value(rows: &[Row], keys: &[String]) -> f64 {
    scan(rows, keys).fold(0.0, f64::max)
}

/// Smallest numeric value across all rows and series keys, never above 0
pub fn min_data_value(rows: &[Row], keys: &[String]) -> f64 {
    scan(rows, keys).fold(0.0, f64::min)
}

fn scan<'a>(rows: &'a [Row], keys: &'a [String]) -> impl Iterator<Item = f64> + 'a {
    rows.iter()
        .flat_map(move |row| keys.iter().filter_map(move |key| row.value(key)))
}

/// Number of series of each kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeriesCounts {
    pub bar: usize,
    pub line: usize,
    pub area: usize,
}

impl SeriesCounts {
    pub fn from_series(series: &[SeriesSpec]) -> Self {
        series.iter().fold(Self::default(), |mut counts, spec| {
            match spec.kind {
                SeriesKind::Bar => counts.bar += 1,
                SeriesKind::Line => counts.line += 1,
                SeriesKind::Area => counts.area += 1,
            }
            counts
        })
    }

    pub fn total(&self) -> usize {
        self.bar + self.line + self.area
    }
}

/// Lower and upper clamp for derived chart widths
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WidthBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for WidthBounds {
    fn default() -> Self {
        Self {
            min: 300.0,
            max: 1800.0,
        }
    }
}

/// Chart width in pixels.
///
/// An explicit finite `width` is returned as-is. Otherwise the width is derived
/// from data density: a per-category budget that grows with the number of
/// series, widened for large magnitudes, times the number of points, plus a
/// fixed margin, clamped to `bounds`.
pub fn compute_chart_width(
    width: Option<f64>,
    point_count: usize,
    counts: SeriesCounts,
    nice_max: f64,
    bounds: WidthBounds,
) -> f64 {
    if let Some(width) = width {
        if width.is_finite() {
            return width;
        }
        tracing::warn!("Ignoring non-finite chart width {}", width);
    }

    let per_category = BASE_CATEGORY_WIDTH
        + EXTRA_BAR_WIDTH * counts.bar.saturating_sub(1) as f64
        + EXTRA_LINE_WIDTH * (counts.line + counts.area) as f64;

    let magnitude_factor = if !nice_max.is_finite() {
        1.0
    } else if nice_max >= 1e7 {
        1.3
    } else if nice_max >= 1e6 {
        1.2
    } else if nice_max >= 1e5 {
        1.1
    } else {
        1.0
    };

    let raw = per_category * magnitude_factor * point_count as f64 + CHART_MARGIN;
    let (lo, hi) = if bounds.min <= bounds.max {
        (bounds.min, bounds.max)
    } else {
        (bounds.max, bounds.min)
    };

    raw.round().clamp(lo, hi)
}

/// Evenly spaced tick values from `min` to `max` using `intervals` steps
pub fn axis_ticks(min: f64, max: f64, intervals: usize) -> Vec<f64> {
    if !min.is_finite() || !max.is_finite() || max <= min || intervals == 0 {
        return vec![0.0];
    }

    let step = (max - min) / intervals as f64;
    (0..=intervals).map(|i| min + step * i as f64).collect()
}

/// Rotation (degrees) for category labels that would not fit their band
pub fn category_label_angle(category_width: f32, longest_label_chars: usize) -> f32 {
    let needed = longest_label_chars as f32 * ESTIMATED_CHAR_WIDTH + 8.0;
    if category_width.is_finite() && needed > category_width {
        -45.0
    } else {
        0.0
    }
}

/// Short human-readable number: 950, 1.2K, 3.4M, 1.1B
pub fn format_compact(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }

    let abs = value.abs();
    let (scaled, suffix) = if abs >= 1e9 {
        (value / 1e9, "B")
    } else if abs >= 1e6 {
        (value / 1e6, "M")
    } else if abs >= 1e3 {
        (value / 1e3, "K")
    } else {
        (value, "")
    };

    let digits = if suffix.is_empty() { 2 } else { 1 };
    let text = format!("{:.*}", digits, scaled);
    let text = if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    };
    format!("{}{}", text, suffix)
}
