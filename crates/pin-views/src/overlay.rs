//! Floating annotation panels and alignment guides

use egui::{Align, Color32, Context, Id, Layout, Order, Pos2, RichText, Sense, Stroke, Ui};
use pin_core::{
    AlignmentGuide, Annotation, ColorMap, ControllerSnapshot, Formatters, GuideAxis, InstanceId,
    SnapTier,
};

const GUIDE_IDLE: Color32 = Color32::from_rgba_premultiplied(120, 120, 120, 140);
const GUIDE_SNAPPED: Color32 = Color32::from_rgb(92, 140, 97);
const GUIDE_MARKER_RADIUS: f32 = 3.0;

/// What the user did to a panel this frame
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PanelAction {
    Close(String),
    StartDrag { id: String, pointer: Pos2 },
}

/// Output of drawing one chart's panels
#[derive(Debug, Default)]
pub(crate) struct OverlayOutput {
    pub actions: Vec<PanelAction>,
    /// Pointer is over one of the panels
    pub hovered: bool,
}

/// Draw every pinned annotation of one chart in creation order
pub(crate) fn show_annotations(
    ctx: &Context,
    instance: InstanceId,
    snapshot: &ControllerSnapshot,
    formatters: &Formatters,
    colors: &ColorMap,
    max_width: f32,
) -> OverlayOutput {
    let mut output = OverlayOutput::default();
    let pointer = ctx.pointer_hover_pos();

    for annotation in &snapshot.annotations {
        let area_id = Id::new(("pin_annotation", instance, annotation.id.as_str()));
        let dragging = snapshot.dragging.as_deref() == Some(annotation.id.as_str());

        let inner = egui::Area::new(area_id)
            .order(Order::Foreground)
            .fixed_pos(Pos2::new(annotation.position.left, annotation.position.top))
            .show(ctx, |ui| {
                annotation_panel(ui, annotation, formatters, colors, max_width, dragging)
            });

        if let Some(action) = inner.inner {
            output.actions.push(action);
        }
        if pointer.map_or(false, |p| inner.response.rect.contains(p)) {
            output.hovered = true;
        }
    }

    output
}

fn annotation_panel(
    ui: &mut Ui,
    annotation: &Annotation,
    formatters: &Formatters,
    colors: &ColorMap,
    max_width: f32,
    dragging: bool,
) -> Option<PanelAction> {
    let mut action = None;

    let frame = egui::Frame::popup(ui.style());
    let frame = if dragging {
        frame.stroke(Stroke::new(1.5, GUIDE_SNAPPED))
    } else {
        frame
    };

    frame.show(ui, |ui| {
        ui.set_max_width(max_width);

        ui.horizontal(|ui| {
            let title = RichText::new((formatters.category)(&annotation.id)).strong();
            let header = ui
                .add(egui::Label::new(title).sense(Sense::drag()))
                .on_hover_cursor(egui::CursorIcon::Grab);
            if header.drag_started() {
                if let Some(pointer) = header.interact_pointer_pos() {
                    action = Some(PanelAction::StartDrag {
                        id: annotation.id.clone(),
                        pointer,
                    });
                }
            }

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                if ui.small_button("✖").on_hover_text("Close").clicked() {
                    action = Some(PanelAction::Close(annotation.id.clone()));
                }
            });
        });

        ui.separator();

        egui::Grid::new(("pin_annotation_fields", annotation.id.as_str()))
            .num_columns(2)
            .spacing([12.0, 2.0])
            .show(ui, |ui| {
                for (key, value) in &annotation.payload {
                    ui.horizontal(|ui| {
                        if let Some(color) = colors.get(key) {
                            ui.label(RichText::new("●").color(*color));
                        }
                        ui.label(RichText::new(key).weak());
                    });
                    ui.label((formatters.value)(key, value));
                    ui.end_row();
                }
            });
    });

    action
}

/// Screen-space endpoints of a guide line
pub fn guide_segment(guide: &AlignmentGuide) -> [Pos2; 2] {
    let (start, end) = guide.span();
    match guide.axis {
        GuideAxis::Horizontal => [
            Pos2::new(start, guide.coordinate),
            Pos2::new(end, guide.coordinate),
        ],
        GuideAxis::Vertical => [
            Pos2::new(guide.coordinate, start),
            Pos2::new(guide.coordinate, end),
        ],
    }
}

/// Paint guides above the panels, with a marker at each end
pub(crate) fn paint_guides(ctx: &Context, guides: &[AlignmentGuide]) {
    if guides.is_empty() {
        return;
    }

    let painter = ctx.layer_painter(egui::LayerId::new(Order::Tooltip, Id::new("pin_guides")));
    for guide in guides {
        let (color, width) = match guide.tier {
            Some(SnapTier::Precision) => (GUIDE_SNAPPED, 2.0),
            Some(_) => (GUIDE_SNAPPED, 1.5),
            None => (GUIDE_IDLE, 1.0),
        };

        let [a, b] = guide_segment(guide);
        painter.line_segment([a, b], Stroke::new(width, color));
        painter.circle_filled(a, GUIDE_MARKER_RADIUS, color);
        painter.circle_filled(b, GUIDE_MARKER_RADIUS, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pin_core::{AnnotationBox, Position};

    fn guide(axis: GuideAxis, coordinate: f32) -> AlignmentGuide {
        AlignmentGuide {
            axis,
            coordinate,
            source: AnnotationBox::new(Position::new(100.0, 600.0), 320.0, 220.0),
            target: AnnotationBox::new(Position::new(100.0, 100.0), 320.0, 220.0),
            tier: None,
        }
    }

    #[test]
    fn test_horizontal_guide_spans_both_boxes() {
        let [a, b] = guide_segment(&guide(GuideAxis::Horizontal, 100.0));
        assert_eq!(a, Pos2::new(100.0, 100.0));
        assert_eq!(b, Pos2::new(920.0, 100.0));
    }

    #[test]
    fn test_vertical_guide_runs_top_to_bottom() {
        let [a, b] = guide_segment(&guide(GuideAxis::Vertical, 600.0));
        assert_eq!(a, Pos2::new(600.0, 100.0));
        assert_eq!(b, Pos2::new(600.0, 320.0));
    }
}
