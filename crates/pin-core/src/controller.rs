//! Chart-agnostic annotation controller
//!
//! Every chart variant composes one [`AnnotationController`]. It owns the
//! chart's registry and drag state, answers discovery requests from other
//! charts, and keeps the advisory page-wide annotation count.
//!
//! The state lock is never held while calling into the bus: the bus calls back
//! into [`BusSubscriber::on_message`], which takes the same lock.

use std::sync::{Arc, Weak};

use egui::{Pos2, Vec2};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::annotations::{
    Annotation, AnnotationBox, AnnotationId, AnnotationRegistry, OpenOutcome, Position,
};
use crate::config::AnnotationSettings;
use crate::data::{ChartData, DataPoint};
use crate::drag::{DragController, DragFrame};
use crate::events::{
    BusMessage, BusSubscriber, DiscoveryBus, InstanceId, ResponseSink, Subscription,
};
use crate::snap::{AlignmentGuide, SnapEngine};
use crate::state::ChartContext;

/// Viewport assumed until the host reports one
const DEFAULT_VIEWPORT: Vec2 = Vec2::new(1280.0, 800.0);

struct ControllerState {
    registry: AnnotationRegistry,
    drag: DragController,
    global_count: usize,
    viewport: Vec2,
    warning: Option<String>,
}

/// Read-only copy of a controller's state for rendering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerSnapshot {
    /// Annotations in creation order
    pub annotations: Vec<Annotation>,
    pub guides: Vec<AlignmentGuide>,
    pub dragging: Option<AnnotationId>,
    /// Last known page-wide count
    pub global_count: usize,
}

/// Annotation state and bus membership for one mounted chart
pub struct AnnotationController {
    instance: InstanceId,
    bus: Arc<DiscoveryBus>,
    settings: AnnotationSettings,
    state: Mutex<ControllerState>,
    _subscription: Subscription,
}

impl AnnotationController {
    /// Mount a chart instance on the context's bus
    pub fn new(context: &ChartContext, settings: AnnotationSettings) -> Arc<Self> {
        let instance = Uuid::new_v4();
        let engine = SnapEngine::new(settings.thresholds, settings.footprint());

        let controller = Arc::new_cyclic(|weak: &Weak<Self>| {
            let subscriber: Weak<dyn BusSubscriber> = weak.clone();
            Self {
                instance,
                bus: context.bus.clone(),
                settings,
                state: Mutex::new(ControllerState {
                    registry: AnnotationRegistry::new(settings.max_annotations),
                    drag: DragController::new(engine, context.style.clone()),
                    global_count: 0,
                    viewport: DEFAULT_VIEWPORT,
                    warning: None,
                }),
                _subscription: context.bus.subscribe(instance, subscriber),
            }
        });

        tracing::info!("Chart instance {} mounted", instance);
        controller
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn settings(&self) -> &AnnotationSettings {
        &self.settings
    }

    /// Area annotations are clamped to
    pub fn set_viewport(&self, viewport: Vec2) {
        self.state.lock().viewport = viewport;
    }

    /// Change the per-chart cap, closing the oldest annotations that no longer fit
    pub fn set_max_annotations(&self, max_annotations: usize) {
        let evicted = {
            let mut state = self.state.lock();
            let evicted = state.registry.set_max_annotations(max_annotations);
            if !evicted.is_empty() {
                let warning = format!(
                    "Closed {} annotation(s) to fit the new limit of {}",
                    evicted.len(),
                    state.registry.max_annotations()
                );
                state.warning = Some(warning);
            }
            evicted
        };
        if !evicted.is_empty() {
            self.refresh_global_count();
        }
    }

    /// Pin `id` next to `anchor`, or unpin it if already pinned.
    ///
    /// Returns `None` when pinning is disabled.
    pub fn open(
        &self,
        id: impl Into<AnnotationId>,
        payload: DataPoint,
        anchor: AnnotationBox,
    ) -> Option<OpenOutcome> {
        if !self.settings.pinning_enabled {
            return None;
        }

        let outcome = {
            let mut state = self.state.lock();
            let outcome = state.registry.open(id, payload, anchor);

            let removed = match &outcome {
                OpenOutcome::Opened { evicted: Some(evicted), .. } => {
                    let warning = format!(
                        "Annotation limit of {} reached; closed '{}'",
                        state.registry.max_annotations(),
                        evicted.id
                    );
                    state.warning = Some(warning);
                    Some(evicted.id.as_str())
                }
                OpenOutcome::Closed(closed) => Some(closed.id.as_str()),
                OpenOutcome::Opened { evicted: None, .. } => None,
            };
            if removed.is_some() && state.drag.dragging_id() == removed {
                state.drag.cancel();
            }
            outcome
        };

        self.refresh_global_count();
        Some(outcome)
    }

    /// Look up `category` in `data` and toggle its annotation
    pub fn open_for_category(
        &self,
        data: &ChartData,
        category: &str,
        anchor: AnnotationBox,
    ) -> Option<OpenOutcome> {
        let Some((_, row)) = data.find(category) else {
            tracing::warn!("No row for category '{}', not pinning", category);
            return None;
        };
        self.open(row.category.clone(), row.fields.clone(), anchor)
    }

    /// Unpin one annotation; unknown ids are ignored
    pub fn close(&self, id: &str) -> bool {
        let closed = {
            let mut state = self.state.lock();
            if state.drag.dragging_id() == Some(id) {
                state.drag.cancel();
            }
            state.registry.close(id).is_some()
        };
        if closed {
            self.refresh_global_count();
        }
        closed
    }

    /// Unpin the most recently opened annotation
    pub fn close_latest(&self) -> Option<AnnotationId> {
        let id = self.state.lock().registry.last().map(|a| a.id.clone())?;
        self.close(&id);
        Some(id)
    }

    /// Unpin this chart's annotations only
    pub fn close_all_local(&self) -> usize {
        let closed = {
            let mut state = self.state.lock();
            state.drag.cancel();
            state.registry.close_all()
        };
        self.refresh_global_count();
        closed
    }

    /// Ask every chart on the bus, this one included, to unpin everything
    pub fn close_all_everywhere(&self) {
        tracing::debug!("Chart {} requesting close-all", self.instance);
        self.bus.broadcast_close_all(self.instance);
    }

    /// Start dragging `id` grabbed at `pointer`.
    ///
    /// Returns false when dragging is disabled or `id` is not pinned.
    pub fn pointer_down(&self, id: &str, pointer: Pos2) -> bool {
        if !self.settings.dragging_enabled {
            return false;
        }

        let mut state = self.state.lock();
        let Some(current) = state.registry.get(id).map(|a| a.position) else {
            return false;
        };
        let activity = self.bus.begin_drag();
        state.drag.pointer_down(id, pointer, current, Some(activity));
        true
    }

    /// Record a pointer move for the next frame
    pub fn pointer_move(&self, pointer: Pos2) -> bool {
        self.state.lock().drag.pointer_move(pointer)
    }

    /// Apply at most one pending drag move.
    ///
    /// Call once per rendered frame. Discovery only runs when a move is
    /// pending.
    pub fn on_frame(&self) -> Option<DragFrame> {
        if !self.state.lock().drag.has_pending() {
            return None;
        }

        let others = self.other_positions();
        let mut state = self.state.lock();
        let viewport = state.viewport;
        let frame = state.drag.on_frame(&others, viewport)?;
        state.registry.update_position(&frame.id, frame.position);
        Some(frame)
    }

    /// Finish the active drag at `pointer` (or the last pending move)
    pub fn pointer_up(&self, pointer: Option<Pos2>) -> Option<DragFrame> {
        if !self.state.lock().drag.is_dragging() {
            return None;
        }

        let others = self.other_positions();
        let frame = {
            let mut state = self.state.lock();
            let viewport = state.viewport;
            let frame = state.drag.pointer_up(pointer, &others, viewport);
            if let Some(frame) = &frame {
                state.registry.update_position(&frame.id, frame.position);
            }
            frame
        };

        // Counting is suspended while dragging, so catch up now
        self.refresh_global_count();
        frame
    }

    /// Abort the active drag; the last committed position stands
    pub fn cancel_drag(&self) -> Option<AnnotationId> {
        self.state.lock().drag.cancel()
    }

    pub fn is_dragging(&self) -> bool {
        self.state.lock().drag.is_dragging()
    }

    /// Re-query the page-wide count; keeps the cached value while a drag is active
    pub fn refresh_global_count(&self) -> usize {
        let counted = self.bus.count_all_annotations();
        let mut state = self.state.lock();
        if let Some(count) = counted {
            state.global_count = count;
        }
        state.global_count
    }

    pub fn global_count(&self) -> usize {
        self.state.lock().global_count
    }

    /// Number of annotations pinned on this chart
    pub fn len(&self) -> usize {
        self.state.lock().registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().registry.is_empty()
    }

    /// Most recent user-facing warning, cleared on read
    pub fn take_warning(&self) -> Option<String> {
        self.state.lock().warning.take()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let state = self.state.lock();
        ControllerSnapshot {
            annotations: state.registry.iter().cloned().collect(),
            guides: state.drag.guides().to_vec(),
            dragging: state.drag.dragging_id().map(str::to_string),
            global_count: state.global_count,
        }
    }

    /// Positions the dragged annotation may align with: this chart's other
    /// annotations plus everything the bus reports from other charts
    fn other_positions(&self) -> Vec<Position> {
        let mut others: Vec<Position> = {
            let state = self.state.lock();
            let dragging = state.drag.dragging_id();
            state
                .registry
                .iter()
                .filter(|a| Some(a.id.as_str()) != dragging)
                .map(|a| a.position)
                .collect()
        };

        match self.bus.request_all_positions(self.instance) {
            Ok(response) => others.extend(response.entries().iter().map(|e| e.position)),
            Err(err) => tracing::warn!("Position discovery skipped: {}", err),
        }
        others
    }
}

impl BusSubscriber for AnnotationController {
    fn on_message(&self, message: &BusMessage, sink: &mut ResponseSink<'_>) {
        match message {
            BusMessage::RequestPositions { .. } => {
                let state = self.state.lock();
                for (id, position) in state.registry.positions() {
                    sink.push_position(id, position);
                }
            }
            BusMessage::CountRequest => {
                sink.add_count(self.state.lock().registry.len());
            }
            BusMessage::CloseAll { origin } => {
                let mut state = self.state.lock();
                state.drag.cancel();
                let closed = state.registry.close_all();
                state.global_count = 0;
                tracing::debug!(
                    "Chart {} closed {} annotation(s) on request from {}",
                    self.instance,
                    closed,
                    origin
                );
            }
        }
    }
}

impl Drop for AnnotationController {
    fn drop(&mut self) {
        tracing::info!("Chart instance {} unmounted", self.instance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FieldValue, SeriesKind, SeriesSpec};
    use crate::drag::test_support::CountingStyle;

    fn payload(category: &str) -> DataPoint {
        let mut point = DataPoint::new();
        point.insert("quarter".to_string(), FieldValue::from(category));
        point.insert("revenue".to_string(), FieldValue::from(42.0));
        point
    }

    fn anchor(top: f32, left: f32) -> AnnotationBox {
        AnnotationBox::new(Position::new(top, left), 8.0, 40.0)
    }

    fn mount(context: &ChartContext) -> Arc<AnnotationController> {
        let controller = AnnotationController::new(context, AnnotationSettings::default());
        controller.set_viewport(Vec2::new(1600.0, 1000.0));
        controller
    }

    #[test]
    fn test_three_instance_discovery() {
        let context = ChartContext::default();
        let a = mount(&context);
        let b = mount(&context);
        let c = mount(&context);

        a.open("Q1", payload("Q1"), anchor(100.0, 0.0));
        a.open("Q2", payload("Q2"), anchor(300.0, 0.0));
        b.open("Q3", payload("Q3"), anchor(500.0, 0.0));

        let seen_by_c = context.bus.request_all_positions(c.instance()).unwrap();
        assert_eq!(seen_by_c.len(), 3);

        let seen_by_a = context.bus.request_all_positions(a.instance()).unwrap();
        assert_eq!(seen_by_a.len(), 1);
        assert_eq!(seen_by_a.entries()[0].instance, b.instance());
        assert_eq!(seen_by_a.entries()[0].id, "Q3");

        assert_eq!(c.refresh_global_count(), 3);
    }

    #[test]
    fn test_open_twice_toggles() {
        let context = ChartContext::default();
        let chart = mount(&context);

        let first = chart.open("Q1", payload("Q1"), anchor(100.0, 0.0)).unwrap();
        assert!(matches!(first, OpenOutcome::Opened { evicted: None, .. }));
        assert_eq!(chart.global_count(), 1);

        let second = chart.open("Q1", payload("Q1"), anchor(100.0, 0.0)).unwrap();
        assert!(matches!(second, OpenOutcome::Closed(_)));
        assert!(chart.is_empty());
        assert_eq!(chart.global_count(), 0);
    }

    #[test]
    fn test_eviction_sets_warning() {
        let context = ChartContext::default();
        let settings = AnnotationSettings {
            max_annotations: 2,
            ..AnnotationSettings::default()
        };
        let chart = AnnotationController::new(&context, settings);

        chart.open("Q1", payload("Q1"), anchor(0.0, 0.0));
        chart.open("Q2", payload("Q2"), anchor(100.0, 0.0));
        chart.open("Q3", payload("Q3"), anchor(200.0, 0.0));

        let ids: Vec<AnnotationId> =
            chart.snapshot().annotations.into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["Q2".to_string(), "Q3".to_string()]);
        assert!(chart.take_warning().unwrap().contains("'Q1'"));
        assert!(chart.take_warning().is_none());
    }

    #[test]
    fn test_close_all_everywhere_resets_every_chart() {
        let context = ChartContext::default();
        let a = mount(&context);
        let b = mount(&context);

        a.open("Q1", payload("Q1"), anchor(0.0, 0.0));
        b.open("Q2", payload("Q2"), anchor(0.0, 0.0));
        b.open("Q3", payload("Q3"), anchor(100.0, 0.0));
        assert_eq!(a.refresh_global_count(), 3);

        b.close_all_everywhere();

        assert!(a.is_empty());
        assert!(b.is_empty());
        assert_eq!(a.global_count(), 0);
        assert_eq!(b.global_count(), 0);
    }

    #[test]
    fn test_drag_snaps_to_other_chart() {
        let context = ChartContext::default();
        let a = mount(&context);
        let b = mount(&context);

        // Lands at top 100, left 20
        a.open("Q1", payload("Q1"), anchor(100.0, 0.0));
        // Lands at top 400, left 520
        b.open("Q1", payload("Q1"), anchor(400.0, 500.0));

        assert!(b.pointer_down("Q1", Pos2::new(530.0, 410.0)));
        b.pointer_move(Pos2::new(700.0, 115.0));
        let frame = b.on_frame().unwrap();

        assert_eq!(frame.position, Position::new(100.0, 690.0));
        assert_eq!(frame.guides.len(), 1);
        assert_eq!(b.snapshot().guides.len(), 1);

        let done = b.pointer_up(Some(Pos2::new(700.0, 115.0))).unwrap();
        assert_eq!(done.position, Position::new(100.0, 690.0));
        let snapshot = b.snapshot();
        assert!(snapshot.guides.is_empty());
        assert!(snapshot.dragging.is_none());
        assert_eq!(snapshot.annotations[0].position, Position::new(100.0, 690.0));
    }

    #[test]
    fn test_own_annotations_act_as_guides() {
        let context = ChartContext::default();
        let chart = mount(&context);

        chart.open("Q1", payload("Q1"), anchor(100.0, 0.0));
        chart.open("Q2", payload("Q2"), anchor(400.0, 0.0));

        chart.pointer_down("Q2", Pos2::new(20.0, 400.0));
        chart.pointer_move(Pos2::new(600.0, 120.0));
        let frame = chart.on_frame().unwrap();

        // Snaps to Q1's top, not to its own old position
        assert_eq!(frame.position.top, 100.0);
        chart.pointer_up(None);
    }

    #[test]
    fn test_count_is_suspended_during_drag() {
        let context = ChartContext::default();
        let a = mount(&context);
        let b = mount(&context);

        a.open("Q1", payload("Q1"), anchor(0.0, 0.0));
        assert_eq!(b.refresh_global_count(), 1);

        assert!(a.pointer_down("Q1", Pos2::new(30.0, 10.0)));
        assert!(context.bus.count_all_annotations().is_none());

        b.open("Q9", payload("Q9"), anchor(0.0, 0.0));
        assert_eq!(b.global_count(), 1);

        a.pointer_up(None);
        assert_eq!(a.global_count(), 2);
        assert_eq!(b.refresh_global_count(), 2);
    }

    #[test]
    fn test_unmount_mid_drag_releases_globals() {
        let style = Arc::new(CountingStyle::default());
        let context = ChartContext::default().with_style(style.clone());
        let chart = mount(&context);

        chart.open("Q1", payload("Q1"), anchor(0.0, 0.0));
        chart.pointer_down("Q1", Pos2::new(30.0, 10.0));
        assert_eq!(style.active(), 1);
        assert!(context.bus.is_drag_active());

        drop(chart);

        assert_eq!(style.active(), 0);
        assert!(!context.bus.is_drag_active());
        assert_eq!(context.bus.subscriber_count(), 0);
    }

    #[test]
    fn test_closing_dragged_annotation_ends_drag() {
        let style = Arc::new(CountingStyle::default());
        let context = ChartContext::default().with_style(style.clone());
        let chart = mount(&context);

        chart.open("Q1", payload("Q1"), anchor(0.0, 0.0));
        chart.pointer_down("Q1", Pos2::new(30.0, 10.0));
        assert!(chart.close("Q1"));

        assert!(!chart.is_dragging());
        assert_eq!(style.active(), 0);
    }

    #[test]
    fn test_disabled_switches() {
        let context = ChartContext::default();
        let settings = AnnotationSettings {
            pinning_enabled: false,
            ..AnnotationSettings::default()
        };
        let chart = AnnotationController::new(&context, settings);
        assert!(chart.open("Q1", payload("Q1"), anchor(0.0, 0.0)).is_none());

        let settings = AnnotationSettings {
            dragging_enabled: false,
            ..AnnotationSettings::default()
        };
        let chart = AnnotationController::new(&context, settings);
        chart.open("Q1", payload("Q1"), anchor(0.0, 0.0));
        assert!(!chart.pointer_down("Q1", Pos2::new(0.0, 0.0)));
        assert!(!chart.pointer_down("missing", Pos2::new(0.0, 0.0)));
    }

    #[test]
    fn test_open_for_category_and_close_latest() {
        let context = ChartContext::default();
        let chart = mount(&context);
        let data = ChartData::new(
            vec![payload("Q1"), payload("Q2")],
            "quarter",
            vec![SeriesSpec::new(SeriesKind::Bar, "revenue")],
        )
        .unwrap();

        assert!(chart.open_for_category(&data, "Q5", anchor(0.0, 0.0)).is_none());
        chart.open_for_category(&data, "Q1", anchor(0.0, 0.0));
        chart.open_for_category(&data, "Q2", anchor(0.0, 100.0));

        let snapshot = chart.snapshot();
        assert_eq!(snapshot.annotations[1].payload["revenue"], FieldValue::Number(42.0));

        assert_eq!(chart.close_latest().as_deref(), Some("Q2"));
        assert_eq!(chart.len(), 1);
    }
}
