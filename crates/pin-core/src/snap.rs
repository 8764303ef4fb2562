//! Alignment guides and tiered snapping for dragged annotations

use egui::Vec2;
use serde::{Deserialize, Serialize};

use crate::annotations::{AnnotationBox, Position};
use crate::error::ConfigError;

/// Guide coordinates closer than this to a snap target share its tier
const SAME_LINE_TOLERANCE: f32 = 0.5;

/// Distance thresholds, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapThresholds {
    /// Show a guide when within this distance
    pub guide: f32,
    /// Always snap when within this distance
    pub precision: f32,
    /// Snap when within this distance and outside the precision range
    pub strong: f32,
    /// Fallback snap distance, used when it is wider than `strong`
    pub normal: f32,
}

impl Default for SnapThresholds {
    fn default() -> Self {
        Self {
            guide: 60.0,
            precision: 8.0,
            strong: 35.0,
            normal: 25.0,
        }
    }
}

impl SnapThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [self.guide, self.precision, self.strong, self.normal];
        if all.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(ConfigError::InvalidThresholds(
                "thresholds must be finite and non-negative".to_string(),
            ));
        }
        if self.precision > self.normal || self.normal > self.guide || self.strong > self.guide {
            return Err(ConfigError::InvalidThresholds(format!(
                "expected precision <= normal <= guide and strong <= guide, got {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// Which coordinate a guide aligns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuideAxis {
    /// Shared `top`: drawn as a horizontal line
    Horizontal,
    /// Shared `left`: drawn as a vertical line
    Vertical,
}

/// Which threshold produced a snap
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SnapTier {
    Precision,
    Strong,
    Normal,
}

/// Transient alignment cue between the dragged annotation and another one
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentGuide {
    pub axis: GuideAxis,
    pub coordinate: f32,
    pub source: AnnotationBox,
    pub target: AnnotationBox,
    /// Set when the dragged annotation snapped onto this guide
    pub tier: Option<SnapTier>,
}

impl AlignmentGuide {
    /// Start and end of the guide line along its axis, spanning both boxes
    pub fn span(&self) -> (f32, f32) {
        match self.axis {
            GuideAxis::Horizontal => (
                self.source.position.left.min(self.target.position.left),
                self.source.right().max(self.target.right()),
            ),
            GuideAxis::Vertical => (
                self.source.position.top.min(self.target.position.top),
                self.source.bottom().max(self.target.bottom()),
            ),
        }
    }
}

/// Result of resolving one drag frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapOutcome {
    pub position: Position,
    pub guides: Vec<AlignmentGuide>,
    pub top_tier: Option<SnapTier>,
    pub left_tier: Option<SnapTier>,
}

/// Clamps and snaps candidate positions against other annotations
#[derive(Debug, Clone, Copy)]
pub struct SnapEngine {
    thresholds: SnapThresholds,
    /// Estimated annotation size, since live measurement is not assumed
    footprint: Vec2,
}

impl SnapEngine {
    pub fn new(thresholds: SnapThresholds, footprint: Vec2) -> Self {
        Self {
            thresholds,
            footprint,
        }
    }

    pub fn thresholds(&self) -> &SnapThresholds {
        &self.thresholds
    }

    pub fn footprint(&self) -> Vec2 {
        self.footprint
    }

    /// Keep the whole footprint inside the viewport where possible
    pub fn clamp(&self, candidate: Position, viewport: Vec2) -> Position {
        let max_left = (viewport.x - self.footprint.x).max(0.0);
        let max_top = (viewport.y - self.footprint.y).max(0.0);
        let sanitize = |v: f32| if v.is_finite() { v } else { 0.0 };

        Position {
            top: sanitize(candidate.top).clamp(0.0, max_top),
            left: sanitize(candidate.left).clamp(0.0, max_left),
        }
    }

    /// Clamp `candidate`, collect guides against `others` and snap each axis
    pub fn resolve(&self, candidate: Position, others: &[Position], viewport: Vec2) -> SnapOutcome {
        let clamped = self.clamp(candidate, viewport);

        let tops: Vec<f32> = others
            .iter()
            .map(|o| o.top)
            .filter(|top| (top - clamped.top).abs() <= self.thresholds.guide)
            .collect();
        let lefts: Vec<f32> = others
            .iter()
            .map(|o| o.left)
            .filter(|left| (left - clamped.left).abs() <= self.thresholds.guide)
            .collect();

        let top_snap = self.snap_axis(clamped.top, &tops);
        let left_snap = self.snap_axis(clamped.left, &lefts);

        let position = Position {
            top: top_snap.map(|(c, _)| c).unwrap_or(clamped.top),
            left: left_snap.map(|(c, _)| c).unwrap_or(clamped.left),
        };

        let source = AnnotationBox::new(position, self.footprint.x, self.footprint.y);
        let mut guides = Vec::new();
        for other in others {
            let target = AnnotationBox::new(*other, self.footprint.x, self.footprint.y);
            if (other.top - clamped.top).abs() <= self.thresholds.guide {
                guides.push(AlignmentGuide {
                    axis: GuideAxis::Horizontal,
                    coordinate: other.top,
                    source,
                    target,
                    tier: tier_for(top_snap, other.top),
                });
            }
            if (other.left - clamped.left).abs() <= self.thresholds.guide {
                guides.push(AlignmentGuide {
                    axis: GuideAxis::Vertical,
                    coordinate: other.left,
                    source,
                    target,
                    tier: tier_for(left_snap, other.left),
                });
            }
        }

        SnapOutcome {
            position,
            guides,
            top_tier: top_snap.map(|(_, tier)| tier),
            left_tier: left_snap.map(|(_, tier)| tier),
        }
    }

    /// Pick the snap target on one axis against its closest guide: precision
    /// first, then strong, then normal.
    fn snap_axis(&self, value: f32, lines: &[f32]) -> Option<(f32, SnapTier)> {
        let nearest = closest(value, lines.iter().copied())?;
        let distance = (nearest - value).abs();

        let tier = if distance <= self.thresholds.precision {
            SnapTier::Precision
        } else if distance <= self.thresholds.strong {
            SnapTier::Strong
        } else if distance <= self.thresholds.normal {
            SnapTier::Normal
        } else {
            return None;
        };

        Some((nearest, tier))
    }
}

fn closest(value: f32, lines: impl Iterator<Item = f32>) -> Option<f32> {
    lines.min_by(|a, b| {
        (a - value)
            .abs()
            .partial_cmp(&(b - value).abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

fn tier_for(snap: Option<(f32, SnapTier)>, coordinate: f32) -> Option<SnapTier> {
    snap.filter(|(c, _)| (c - coordinate).abs() <= SAME_LINE_TOLERANCE)
        .map(|(_, tier)| tier)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Vec2 = Vec2::new(2000.0, 2000.0);

    fn engine() -> SnapEngine {
        SnapEngine::new(SnapThresholds::default(), Vec2::new(320.0, 220.0))
    }

    /// Drag `(top, left)` against a single other annotation
    fn against_one(engine: &SnapEngine, candidate: (f32, f32), other: (f32, f32)) -> SnapOutcome {
        engine.resolve(
            Position::new(candidate.0, candidate.1),
            &[Position::new(other.0, other.1)],
            VIEWPORT,
        )
    }

    #[test]
    fn test_precision_tier_snaps() {
        let outcome = against_one(&engine(), (505.0, 900.0), (500.0, 100.0));

        assert_eq!(outcome.position.top, 500.0);
        assert_eq!(outcome.top_tier, Some(SnapTier::Precision));
        assert_eq!(outcome.left_tier, None);
        assert_eq!(outcome.position.left, 900.0);
    }

    #[test]
    fn test_mid_range_delta_snaps() {
        let outcome = against_one(&engine(), (520.0, 900.0), (500.0, 100.0));

        assert_eq!(outcome.position.top, 500.0);
        assert_eq!(outcome.top_tier, Some(SnapTier::Strong));
    }

    #[test]
    fn test_single_guide_within_strong_range_snaps() {
        for delta in [30.0, 34.0, 35.0] {
            let outcome = against_one(&engine(), (500.0 + delta, 900.0), (500.0, 100.0));

            assert_eq!(outcome.position.top, 500.0, "delta {}", delta);
            assert_eq!(outcome.top_tier, Some(SnapTier::Strong), "delta {}", delta);
        }
    }

    #[test]
    fn test_normal_tier_when_wider_than_strong() {
        let thresholds = SnapThresholds {
            strong: 15.0,
            ..SnapThresholds::default()
        };
        let engine = SnapEngine::new(thresholds, Vec2::new(320.0, 220.0));
        let outcome = against_one(&engine, (520.0, 900.0), (500.0, 100.0));

        assert_eq!(outcome.position.top, 500.0);
        assert_eq!(outcome.top_tier, Some(SnapTier::Normal));
    }

    #[test]
    fn test_far_guide_does_not_snap() {
        let outcome = against_one(&engine(), (550.0, 900.0), (500.0, 100.0));

        assert_eq!(outcome.position.top, 550.0);
        assert_eq!(outcome.top_tier, None);
        // Still within the 60px guide threshold, so the cue is shown
        assert_eq!(outcome.guides.len(), 1);
        assert_eq!(outcome.guides[0].axis, GuideAxis::Horizontal);
        assert_eq!(outcome.guides[0].tier, None);
    }

    #[test]
    fn test_shared_line_marks_every_guide_on_it() {
        let others = [Position::new(500.0, 100.0), Position::new(500.0, 1400.0)];
        let outcome = engine().resolve(Position::new(530.0, 800.0), &others, VIEWPORT);

        assert_eq!(outcome.position.top, 500.0);
        assert_eq!(outcome.top_tier, Some(SnapTier::Strong));
        assert!(outcome.guides.iter().all(|g| g.tier == Some(SnapTier::Strong)));
    }

    #[test]
    fn test_axes_snap_independently() {
        let outcome = against_one(&engine(), (300.0, 403.0), (900.0, 400.0));

        assert_eq!(outcome.position, Position::new(300.0, 400.0));
        assert_eq!(outcome.top_tier, None);
        assert_eq!(outcome.left_tier, Some(SnapTier::Precision));
    }

    #[test]
    fn test_all_qualifying_guides_shown_and_closest_wins() {
        let others = [Position::new(470.0, 0.0), Position::new(515.0, 1500.0)];
        let outcome = engine().resolve(Position::new(500.0, 800.0), &others, VIEWPORT);

        let horizontal: Vec<f32> = outcome
            .guides
            .iter()
            .filter(|g| g.axis == GuideAxis::Horizontal)
            .map(|g| g.coordinate)
            .collect();
        assert_eq!(horizontal, vec![470.0, 515.0]);
        assert_eq!(outcome.position.top, 515.0);
        assert_eq!(outcome.top_tier, Some(SnapTier::Strong));
    }

    #[test]
    fn test_clamp_to_viewport() {
        let e = engine();
        let viewport = Vec2::new(1000.0, 600.0);

        assert_eq!(e.clamp(Position::new(-50.0, -10.0), viewport), Position::new(0.0, 0.0));
        assert_eq!(e.clamp(Position::new(900.0, 900.0), viewport), Position::new(380.0, 680.0));
        assert_eq!(e.clamp(Position::new(f32::NAN, 5.0), viewport), Position::new(0.0, 5.0));
        // Viewport smaller than the footprint pins to the origin
        let tiny = Vec2::new(100.0, 100.0);
        assert_eq!(e.clamp(Position::new(40.0, 40.0), tiny), Position::new(0.0, 0.0));
    }

    #[test]
    fn test_guide_span_covers_both_boxes() {
        let outcome = against_one(&engine(), (100.0, 600.0), (100.0, 100.0));
        let guide = &outcome.guides[0];
        assert_eq!(guide.span(), (100.0, 920.0));
    }

    #[test]
    fn test_threshold_validation() {
        assert!(SnapThresholds::default().validate().is_ok());
        let bad = SnapThresholds {
            precision: 30.0,
            ..SnapThresholds::default()
        };
        assert!(bad.validate().is_err());
    }
}
