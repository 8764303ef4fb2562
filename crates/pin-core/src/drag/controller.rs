//! Per-chart drag state machine

use std::sync::Arc;

use egui::{Pos2, Vec2};

use super::{FrameCoalescer, GlobalStyle, StyleGuard};
use crate::annotations::{AnnotationId, Position};
use crate::events::DragActivity;
use crate::snap::{AlignmentGuide, SnapEngine};

/// Position update produced for one frame of a drag
#[derive(Debug, Clone, PartialEq)]
pub struct DragFrame {
    pub id: AnnotationId,
    pub position: Position,
    pub guides: Vec<AlignmentGuide>,
}

struct ActiveDrag {
    id: AnnotationId,
    /// Pointer position relative to the annotation's top-left corner
    grab_offset: Vec2,
    committed: Position,
    _style: StyleGuard,
    _activity: Option<DragActivity>,
}

enum DragState {
    Idle,
    Dragging(ActiveDrag),
}

/// Turns raw pointer events into clamped, snapped annotation positions
pub struct DragController {
    state: DragState,
    pending: FrameCoalescer<Pos2>,
    engine: SnapEngine,
    style: Arc<dyn GlobalStyle>,
    guides: Vec<AlignmentGuide>,
}

impl DragController {
    pub fn new(engine: SnapEngine, style: Arc<dyn GlobalStyle>) -> Self {
        Self {
            state: DragState::Idle,
            pending: FrameCoalescer::new(),
            engine,
            style,
            guides: Vec::new(),
        }
    }

    pub fn engine(&self) -> &SnapEngine {
        &self.engine
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn dragging_id(&self) -> Option<&str> {
        match &self.state {
            DragState::Dragging(drag) => Some(drag.id.as_str()),
            DragState::Idle => None,
        }
    }

    /// Whether a pointer move is waiting for the next frame
    pub fn has_pending(&self) -> bool {
        self.is_dragging() && self.pending.is_pending()
    }

    /// Guides from the most recent frame; empty when idle
    pub fn guides(&self) -> &[AlignmentGuide] {
        &self.guides
    }

    /// Arm a drag of `id`, currently at `current`, grabbed at `pointer`.
    ///
    /// Starting a new drag while one is active ends the old one at its last
    /// committed position.
    pub fn pointer_down(
        &mut self,
        id: impl Into<AnnotationId>,
        pointer: Pos2,
        current: Position,
        activity: Option<DragActivity>,
    ) {
        self.cancel();

        let id = id.into();
        let grab_offset = Vec2::new(pointer.x - current.left, pointer.y - current.top);
        tracing::debug!("Drag start for '{}' with grab offset {:?}", id, grab_offset);

        self.state = DragState::Dragging(ActiveDrag {
            id,
            grab_offset,
            committed: current,
            _style: StyleGuard::acquire(self.style.clone()),
            _activity: activity,
        });
    }

    /// Record a pointer move; it is applied on the next [`Self::on_frame`]
    pub fn pointer_move(&mut self, pointer: Pos2) -> bool {
        if !self.is_dragging() {
            return false;
        }
        self.pending.schedule(pointer);
        true
    }

    /// Apply the latest pending move, if any.
    ///
    /// `others` are the positions of every other annotation on the page.
    pub fn on_frame(&mut self, others: &[Position], viewport: Vec2) -> Option<DragFrame> {
        let pointer = self.pending.take()?;
        self.apply(pointer, others, viewport)
    }

    /// Finish the drag, applying `pointer` (or the last pending move) first
    pub fn pointer_up(
        &mut self,
        pointer: Option<Pos2>,
        others: &[Position],
        viewport: Vec2,
    ) -> Option<DragFrame> {
        let pending = self.pending.take();
        let frame = match pointer.or(pending) {
            Some(pointer) => self.apply(pointer, others, viewport),
            None => None,
        };

        let finished = self.release();
        if let Some(id) = &finished {
            tracing::debug!("Drag end for '{}'", id);
        }

        frame.map(|mut frame| {
            frame.guides.clear();
            frame
        })
    }

    /// Abort without applying pending moves; the last committed position stands
    pub fn cancel(&mut self) -> Option<AnnotationId> {
        self.pending.cancel();
        let cancelled = self.release();
        if let Some(id) = &cancelled {
            tracing::debug!("Drag of '{}' cancelled", id);
        }
        cancelled
    }

    /// Last committed position of the active drag
    pub fn committed(&self) -> Option<Position> {
        match &self.state {
            DragState::Dragging(drag) => Some(drag.committed),
            DragState::Idle => None,
        }
    }

    fn apply(&mut self, pointer: Pos2, others: &[Position], viewport: Vec2) -> Option<DragFrame> {
        let DragState::Dragging(drag) = &mut self.state else {
            return None;
        };

        let candidate = Position::new(
            pointer.y - drag.grab_offset.y,
            pointer.x - drag.grab_offset.x,
        );
        let outcome = self.engine.resolve(candidate, others, viewport);
        drag.committed = outcome.position;
        self.guides = outcome.guides.clone();

        Some(DragFrame {
            id: drag.id.clone(),
            position: outcome.position,
            guides: outcome.guides,
        })
    }

    fn release(&mut self) -> Option<AnnotationId> {
        self.guides.clear();
        // Dropping the drag releases the style and activity guards
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Dragging(drag) => Some(drag.id.clone()),
            DragState::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drag::test_support::CountingStyle;
    use crate::events::DiscoveryBus;
    use crate::snap::SnapThresholds;

    const VIEWPORT: Vec2 = Vec2::new(1600.0, 1000.0);

    fn controller(style: Arc<CountingStyle>) -> DragController {
        let engine = SnapEngine::new(SnapThresholds::default(), Vec2::new(320.0, 220.0));
        DragController::new(engine, style)
    }

    #[test]
    fn test_grab_offset_prevents_jump() {
        let style = Arc::new(CountingStyle::default());
        let mut drag = controller(style);

        drag.pointer_down("a", Pos2::new(130.0, 220.0), Position::new(200.0, 100.0), None);
        drag.pointer_move(Pos2::new(130.0, 220.0));
        let frame = drag.on_frame(&[], VIEWPORT).unwrap();
        assert_eq!(frame.position, Position::new(200.0, 100.0));

        drag.pointer_move(Pos2::new(430.0, 320.0));
        let frame = drag.on_frame(&[], VIEWPORT).unwrap();
        assert_eq!(frame.position, Position::new(300.0, 400.0));
    }

    #[test]
    fn test_one_update_per_frame() {
        let mut drag = controller(Arc::new(CountingStyle::default()));
        drag.pointer_down("a", Pos2::new(0.0, 0.0), Position::new(0.0, 0.0), None);

        drag.pointer_move(Pos2::new(10.0, 10.0));
        drag.pointer_move(Pos2::new(500.0, 20.0));
        drag.pointer_move(Pos2::new(600.0, 300.0));

        let frame = drag.on_frame(&[], VIEWPORT).unwrap();
        assert_eq!(frame.position, Position::new(300.0, 600.0));
        assert!(drag.on_frame(&[], VIEWPORT).is_none());
    }

    #[test]
    fn test_snaps_against_others() {
        let mut drag = controller(Arc::new(CountingStyle::default()));
        drag.pointer_down("a", Pos2::new(0.0, 0.0), Position::new(0.0, 0.0), None);

        drag.pointer_move(Pos2::new(700.0, 405.0));
        let frame = drag.on_frame(&[Position::new(400.0, 50.0)], VIEWPORT).unwrap();

        assert_eq!(frame.position, Position::new(400.0, 700.0));
        assert_eq!(frame.guides.len(), 1);
        assert_eq!(drag.guides().len(), 1);
    }

    #[test]
    fn test_release_clears_guides_and_style() {
        let style = Arc::new(CountingStyle::default());
        let mut drag = controller(style.clone());

        drag.pointer_down("a", Pos2::new(0.0, 0.0), Position::new(0.0, 0.0), None);
        assert_eq!(style.active(), 1);

        drag.pointer_move(Pos2::new(700.0, 405.0));
        let final_frame = drag
            .pointer_up(None, &[Position::new(400.0, 50.0)], VIEWPORT)
            .unwrap();

        assert_eq!(final_frame.position, Position::new(400.0, 700.0));
        assert!(final_frame.guides.is_empty());
        assert!(drag.guides().is_empty());
        assert!(!drag.is_dragging());
        assert_eq!(style.active(), 0);
    }

    #[test]
    fn test_cancel_keeps_committed_position_and_restores() {
        let style = Arc::new(CountingStyle::default());
        let bus = Arc::new(DiscoveryBus::new());
        let mut drag = controller(style.clone());

        let activity = Some(bus.begin_drag());
        drag.pointer_down("a", Pos2::new(0.0, 0.0), Position::new(0.0, 0.0), activity);
        assert!(bus.is_drag_active());

        drag.pointer_move(Pos2::new(50.0, 60.0));
        drag.on_frame(&[], VIEWPORT);
        drag.pointer_move(Pos2::new(900.0, 900.0));

        assert_eq!(drag.cancel().as_deref(), Some("a"));
        assert_eq!(style.active(), 0);
        assert!(!bus.is_drag_active());
        assert!(drag.committed().is_none());
    }

    #[test]
    fn test_drop_mid_drag_restores_style() {
        let style = Arc::new(CountingStyle::default());
        {
            let mut drag = controller(style.clone());
            drag.pointer_down("a", Pos2::new(0.0, 0.0), Position::new(0.0, 0.0), None);
            assert_eq!(style.active(), 1);
        }
        assert_eq!(style.active(), 0);
    }

    #[test]
    fn test_moves_ignored_when_idle() {
        let mut drag = controller(Arc::new(CountingStyle::default()));
        assert!(!drag.pointer_move(Pos2::new(1.0, 1.0)));
        assert!(drag.on_frame(&[], VIEWPORT).is_none());
        assert!(drag.pointer_up(None, &[], VIEWPORT).is_none());
    }
}
