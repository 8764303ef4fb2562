//! Pinned annotations
//!
//! An annotation is a floating panel that shows the full data row for one
//! clicked category. Each chart instance owns its own annotations; other
//! instances only ever see their positions through the discovery bus.

use serde::{Deserialize, Serialize};

use crate::data::DataPoint;

mod registry;

pub use registry::{AnnotationRegistry, OpenOutcome, DEFAULT_MAX_ANNOTATIONS};

/// Annotation identifier: the category of the clicked data point
pub type AnnotationId = String;

/// Viewport position of an annotation's top-left corner
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub top: f32,
    pub left: f32,
}

impl Position {
    pub const fn new(top: f32, left: f32) -> Self {
        Self { top, left }
    }

    pub fn offset(self, dy: f32, dx: f32) -> Self {
        Self {
            top: self.top + dy,
            left: self.left + dx,
        }
    }

    /// Both coordinates within `tolerance` of `other`
    pub fn near(&self, other: &Position, tolerance: f32) -> bool {
        (self.top - other.top).abs() <= tolerance && (self.left - other.left).abs() <= tolerance
    }
}

/// A positioned rectangle in viewport coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationBox {
    pub position: Position,
    pub width: f32,
    pub height: f32,
}

impl AnnotationBox {
    pub const fn new(position: Position, width: f32, height: f32) -> Self {
        Self {
            position,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.position.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.position.top + self.height
    }
}

/// A pinned tooltip owned by one chart instance
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    pub payload: DataPoint,
    pub position: Position,
}
