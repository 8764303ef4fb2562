//! Per-chart annotation registry

use super::{Annotation, AnnotationBox, AnnotationId, Position};
use crate::data::DataPoint;

/// Default cap on simultaneously pinned annotations per chart
pub const DEFAULT_MAX_ANNOTATIONS: usize = 5;

/// Horizontal gap between the clicked mark and a new annotation
const ANCHOR_GAP: f32 = 12.0;

/// Diagonal step applied when a new annotation would cover an existing one
const STACK_OFFSET: f32 = 24.0;

/// Distance under which two annotations count as stacked
const STACK_TOLERANCE: f32 = 4.0;

/// Result of [`AnnotationRegistry::open`]
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    /// A new annotation was added; `evicted` is the oldest one if capacity was hit
    Opened {
        position: Position,
        evicted: Option<Annotation>,
    },
    /// The id was already pinned, so the call closed it
    Closed(Annotation),
}

/// Ordered collection of one chart's annotations.
///
/// Order is creation order, which is also render and z order. Positions are
/// replaced in place so dragging never re-orders.
#[derive(Debug, Clone)]
pub struct AnnotationRegistry {
    annotations: Vec<Annotation>,
    max_annotations: usize,
}

impl Default for AnnotationRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ANNOTATIONS)
    }
}

impl AnnotationRegistry {
    /// Create a registry holding at most `max_annotations` (at least one)
    pub fn new(max_annotations: usize) -> Self {
        Self {
            annotations: Vec::new(),
            max_annotations: max_annotations.max(1),
        }
    }

    pub fn max_annotations(&self) -> usize {
        self.max_annotations
    }

    /// Change the cap, evicting the oldest annotations that no longer fit
    pub fn set_max_annotations(&mut self, max_annotations: usize) -> Vec<Annotation> {
        self.max_annotations = max_annotations.max(1);
        let excess = self.annotations.len().saturating_sub(self.max_annotations);
        self.annotations.drain(..excess).collect()
    }

    /// Pin `id`, or unpin it if it is already pinned.
    ///
    /// New annotations sit to the right of `anchor`, shifted diagonally past
    /// any annotation already occupying that spot.
    pub fn open(
        &mut self,
        id: impl Into<AnnotationId>,
        payload: DataPoint,
        anchor: AnnotationBox,
    ) -> OpenOutcome {
        let id = id.into();

        if let Some(index) = self.index_of(&id) {
            let closed = self.annotations.remove(index);
            tracing::debug!("Annotation '{}' toggled closed", closed.id);
            return OpenOutcome::Closed(closed);
        }

        let evicted = if self.annotations.len() >= self.max_annotations {
            let oldest = self.annotations.remove(0);
            tracing::warn!(
                "Annotation limit of {} reached, closing oldest '{}'",
                self.max_annotations,
                oldest.id
            );
            Some(oldest)
        } else {
            None
        };

        let position = self.free_position(anchor);
        self.annotations.push(Annotation {
            id,
            payload,
            position,
        });

        OpenOutcome::Opened { position, evicted }
    }

    /// Remove by id; absent ids are ignored
    pub fn close(&mut self, id: &str) -> Option<Annotation> {
        let index = self.index_of(id)?;
        Some(self.annotations.remove(index))
    }

    /// Remove everything, returning how many were removed
    pub fn close_all(&mut self) -> usize {
        let count = self.annotations.len();
        self.annotations.clear();
        count
    }

    /// Replace an annotation's position without touching order
    pub fn update_position(&mut self, id: &str, position: Position) -> bool {
        match self.annotations.iter_mut().find(|a| a.id == id) {
            Some(annotation) => {
                annotation.position = position;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Most recently opened annotation
    pub fn last(&self) -> Option<&Annotation> {
        self.annotations.last()
    }

    /// `(id, position)` pairs in creation order
    pub fn positions(&self) -> impl Iterator<Item = (&str, Position)> {
        self.annotations.iter().map(|a| (a.id.as_str(), a.position))
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.annotations.iter().position(|a| a.id == id)
    }

    fn free_position(&self, anchor: AnnotationBox) -> Position {
        let mut candidate = Position::new(anchor.position.top, anchor.right() + ANCHOR_GAP);

        // Each step can clear at most one occupant, so len + 1 steps always suffice
        for _ in 0..=self.annotations.len() {
            if !self
                .annotations
                .iter()
                .any(|a| a.position.near(&candidate, STACK_TOLERANCE))
            {
                break;
            }
            candidate = candidate.offset(STACK_OFFSET, STACK_OFFSET);
        }

        candidate
    }
}
