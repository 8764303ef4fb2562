//! Series color assignment

use egui::Color32;
use indexmap::IndexMap;

use crate::error::ConfigError;

/// Field key to color, in series order
pub type ColorMap = IndexMap<String, Color32>;

/// Default categorical palette
pub const DEFAULT_PALETTE: [Color32; 8] = [
    Color32::from_rgb(100, 150, 250), // Blue
    Color32::from_rgb(250, 150, 100), // Orange
    Color32::from_rgb(150, 250, 100), // Green
    Color32::from_rgb(250, 100, 150), // Pink
    Color32::from_rgb(150, 100, 250), // Purple
    Color32::from_rgb(250, 250, 100), // Yellow
    Color32::from_rgb(100, 250, 250), // Cyan
    Color32::from_rgb(250, 100, 100), // Red
];

/// Used when there is no palette to derive from
pub const FALLBACK_COLOR: Color32 = Color32::from_rgb(128, 128, 128);

/// Golden-angle hue step between derivation rounds
const HUE_STEP: f32 = 137.5;

const SATURATION_RANGE: (f32, f32) = (0.30, 0.95);
const LIGHTNESS_RANGE: (f32, f32) = (0.25, 0.45);

/// Assign one color per key.
///
/// Overrides always win. The first `palette.len()` keys take palette colors
/// in order; later keys get colors derived from the palette in HSL space,
/// keyed only on their index so the same inputs always give the same map.
pub fn generate_color_map<S: AsRef<str>>(
    keys: &[S],
    palette: &[Color32],
    overrides: &IndexMap<String, Color32>,
) -> ColorMap {
    let mut map = ColorMap::with_capacity(keys.len());

    for key in keys {
        let key = key.as_ref();
        if map.contains_key(key) {
            continue;
        }
        let index = map.len();
        let color = overrides
            .get(key)
            .copied()
            .unwrap_or_else(|| palette_color(palette, index));
        map.insert(key.to_string(), color);
    }

    map
}

/// Color for the `index`-th series without overrides
pub fn palette_color(palette: &[Color32], index: usize) -> Color32 {
    if palette.is_empty() {
        return FALLBACK_COLOR;
    }
    if index < palette.len() {
        return palette[index];
    }

    let offset = index - palette.len();
    let anchor = palette[offset % palette.len()];
    let round = offset / palette.len() + 1;

    let (h, s, l) = rgb_to_hsl(anchor);
    let hue = (h + HUE_STEP * round as f32).rem_euclid(360.0);
    let saturation =
        (s + ((round % 3) as f32 - 1.0) * 0.1).clamp(SATURATION_RANGE.0, SATURATION_RANGE.1);
    let lightness = (l - 0.05 * (round % 2) as f32).clamp(LIGHTNESS_RANGE.0, LIGHTNESS_RANGE.1);

    hsl_to_rgb(hue, saturation, lightness)
}

/// Convert to hue (degrees), saturation and lightness (0..1)
pub fn rgb_to_hsl(color: Color32) -> (f32, f32, f32) {
    let r = color.r() as f32 / 255.0;
    let g = color.g() as f32 / 255.0;
    let b = color.b() as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f32::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    (h * 60.0, s, l)
}

/// Convert hue (degrees), saturation and lightness (0..1) to RGB
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Color32 {
    let h = h.rem_euclid(360.0) / 360.0;
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);

    if s == 0.0 {
        let v = (l * 255.0).round() as u8;
        return Color32::from_rgb(v, v, v);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    let channel = |t: f32| {
        let t = t.rem_euclid(1.0);
        let v = if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        };
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Color32::from_rgb(channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0))
}

/// Parse `#rrggbb` or `#rgb`
pub fn parse_hex_color(text: &str) -> Result<Color32, ConfigError> {
    let invalid = || ConfigError::InvalidColor(text.to_string());
    let hex = text.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return Err(invalid()),
    };

    let byte = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).map_err(|_| invalid());
    Ok(Color32::from_rgb(byte(0)?, byte(2)?, byte(4)?))
}

/// Lowercase `#rrggbb`
pub fn to_hex(color: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r(), color.g(), color.b())
}
