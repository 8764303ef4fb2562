//! Chart widget with pinned annotations

use std::sync::Arc;

use egui::{Color32, CursorIcon, Pos2, Rect, Ui};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoint, PlotPoints, PlotTransform, Points};
use pin_core::scale::category_label_angle;
use pin_core::{
    compute_chart_width, compute_nice_max, generate_color_map, max_data_value, min_data_value,
    AnnotationBox, AnnotationController, ChartConfig, ChartContext, ChartData, ColorMap,
    ConfigError, Formatters, Position, SeriesCounts, SeriesKind,
};

use crate::overlay::{self, PanelAction};

/// Share of a category band covered by its group of bars
const BAR_GROUP_WIDTH: f64 = 0.8;
/// How long eviction warnings stay visible, in seconds
const WARNING_SECONDS: f64 = 4.0;
const WARNING_COLOR: Color32 = Color32::from_rgb(230, 180, 60);
/// Minimum time between idle "Close all (N)" count requests, in seconds.
/// Local opens, closes and drag ends refresh the count immediately.
const COUNT_REFRESH_SECONDS: f64 = 0.5;

/// Fires at most once per interval of UI time
#[derive(Debug, Clone, Copy)]
struct Throttle {
    interval: f64,
    next_at: f64,
}

impl Throttle {
    fn new(interval: f64) -> Self {
        Self {
            interval,
            next_at: f64::NEG_INFINITY,
        }
    }

    fn ready(&mut self, now: f64) -> bool {
        if now < self.next_at {
            return false;
        }
        self.next_at = now + self.interval;
        true
    }
}

/// One mounted chart: bar, line, area or composed.
///
/// Each widget owns an [`AnnotationController`] registered on the shared bus
/// for as long as the widget lives.
pub struct ChartWidget {
    id: egui::Id,
    config: ChartConfig,
    data: ChartData,
    colors: ColorMap,
    y_min: f64,
    y_max: f64,
    width: f32,
    formatters: Formatters,
    controller: Arc<AnnotationController>,
    warning: Option<(String, f64)>,
    hovered: bool,
    count_refresh: Throttle,
}

impl ChartWidget {
    /// Validate `config` and mount a chart on the context's bus
    pub fn new(
        context: &ChartContext,
        config: ChartConfig,
        formatters: Formatters,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let data = config.build_data()?;
        let keys = data.series_keys();
        let colors =
            generate_color_map(&keys, &config.palette_colors()?, &config.override_colors()?);

        let y_max = compute_nice_max(max_data_value(data.rows(), &keys));
        let raw_min = min_data_value(data.rows(), &keys);
        let y_min = if raw_min < 0.0 { -compute_nice_max(-raw_min) } else { 0.0 };

        let width = compute_chart_width(
            config.width,
            data.len(),
            SeriesCounts::from_series(data.series()),
            y_max,
            config.kind.width_bounds(),
        ) as f32;

        let controller = AnnotationController::new(context, config.annotations);
        tracing::info!(
            "Chart '{}' mounted with {} rows, {} series, width {}",
            config.title,
            data.len(),
            keys.len(),
            width
        );

        Ok(Self {
            id: egui::Id::new(("pin_chart", controller.instance())),
            config,
            data,
            colors,
            y_min,
            y_max,
            width,
            formatters,
            controller,
            warning: None,
            hovered: false,
            count_refresh: Throttle::new(COUNT_REFRESH_SECONDS),
        })
    }

    pub fn controller(&self) -> &Arc<AnnotationController> {
        &self.controller
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn formatters(&self) -> &Formatters {
        &self.formatters
    }

    pub fn colors(&self) -> &ColorMap {
        &self.colors
    }

    /// Value axis domain `(min, max)`
    pub fn y_domain(&self) -> (f64, f64) {
        (self.y_min, self.y_max)
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn save_config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }

    /// Draw the chart, its annotations and any active guides
    pub fn ui(&mut self, ui: &mut Ui) {
        let ctx = ui.ctx().clone();
        let now = ctx.input(|i| i.time);
        self.controller.set_viewport(ctx.screen_rect().size());
        if self.count_refresh.ready(now) {
            self.controller.refresh_global_count();
            ctx.request_repaint_after(std::time::Duration::from_secs_f64(COUNT_REFRESH_SECONDS));
        }

        self.header_ui(ui);
        self.draw_plot(ui);

        if let Some(warning) = self.controller.take_warning() {
            self.warning = Some((warning, now + WARNING_SECONDS));
        }
        let expired = self.warning.as_ref().map_or(false, |(_, until)| now >= *until);
        if expired {
            self.warning = None;
        }
        if let Some((text, _)) = &self.warning {
            ui.colored_label(WARNING_COLOR, text);
            ctx.request_repaint();
        }

        self.drive_drag(&ctx);

        let snapshot = self.controller.snapshot();
        let output = overlay::show_annotations(
            &ctx,
            self.controller.instance(),
            &snapshot,
            &self.formatters,
            &self.colors,
            self.config.annotations.footprint[0],
        );
        self.hovered |= output.hovered;

        for action in output.actions {
            match action {
                PanelAction::Close(id) => {
                    self.controller.close(&id);
                }
                PanelAction::StartDrag { id, pointer } => {
                    self.controller.pointer_down(&id, pointer);
                }
            }
        }

        overlay::paint_guides(&ctx, &snapshot.guides);

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            if self.controller.cancel_drag().is_none() && self.hovered {
                self.controller.close_latest();
            }
        }
    }

    fn header_ui(&self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.heading(&self.config.title);

            let count = self.controller.global_count();
            if count > 0 {
                let button = ui
                    .button(format!("Close all ({})", count))
                    .on_hover_text("Close every pinned annotation on the page");
                if button.clicked() {
                    self.controller.close_all_everywhere();
                }
            }
        });
    }

    fn draw_plot(&mut self, ui: &mut Ui) {
        let labels: Vec<String> =
            self.data.categories().map(|c| (self.formatters.category)(c)).collect();
        let step = label_step(self.width, self.data.len(), &labels);
        let axis = self.formatters.axis.clone();

        let plot = Plot::new(self.id)
            .width(self.width)
            .height(self.config.height)
            .include_x(-0.5)
            .include_x(self.data.len() as f64 - 0.5)
            .include_y(self.y_min)
            .include_y(self.y_max)
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .allow_boxed_zoom(false)
            .legend(Legend::default())
            .x_axis_formatter(move |mark, _chars, _range| category_label(&labels, step, mark.value))
            .y_axis_formatter(move |mark, _chars, _range| axis(mark.value))
            .label_formatter(|_, _| String::new());

        let response = plot.show(ui, |plot_ui| {
            let bar_count = self.data.series().iter().filter(|s| s.kind == SeriesKind::Bar).count();
            let mut bar_slot = 0;

            for spec in self.data.series() {
                let color = self.colors.get(&spec.field_key).copied().unwrap_or(Color32::GRAY);
                let values = self
                    .data
                    .rows()
                    .iter()
                    .enumerate()
                    .filter_map(|(i, row)| row.value(&spec.field_key).map(|v| (i as f64, v)));

                match spec.kind {
                    SeriesKind::Bar => {
                        let (offset, width) = bar_slot_geometry(bar_slot, bar_count);
                        bar_slot += 1;
                        let bars = values
                            .map(|(x, y)| Bar::new(x + offset, y).width(width).fill(color))
                            .collect();
                        plot_ui.bar_chart(BarChart::new(bars).color(color).name(&spec.field_key));
                    }
                    SeriesKind::Line | SeriesKind::Area => {
                        let points: Vec<[f64; 2]> = values.map(|(x, y)| [x, y]).collect();
                        let mut line = Line::new(PlotPoints::from(points.clone()))
                            .color(color)
                            .width(2.0)
                            .name(&spec.field_key);
                        if spec.kind == SeriesKind::Area {
                            line = line.fill(self.y_min.max(0.0) as f32);
                        }
                        plot_ui.line(line);
                        plot_ui.points(Points::new(points).color(color).radius(3.0));
                    }
                }
            }
        });

        self.hovered = response.response.hovered();

        if response.response.clicked() && self.config.annotations.pinning_enabled {
            if let Some(pointer) = response.response.interact_pointer_pos() {
                self.pin_at(&response.transform, pointer);
            }
        }
    }

    /// Open the annotation for the category under `pointer`
    fn pin_at(&self, transform: &PlotTransform, pointer: Pos2) {
        let value = transform.value_from_position(pointer);
        let Some(index) = category_at(value.x, self.data.len()) else {
            return;
        };

        let row = &self.data.rows()[index];
        let top = self
            .data
            .series()
            .iter()
            .filter_map(|s| row.value(&s.field_key))
            .fold(0.0, f64::max);
        let half = BAR_GROUP_WIDTH / 2.0;
        let x = index as f64;
        let rect = Rect::from_two_pos(
            transform.position_from_point(&PlotPoint::new(x - half, top)),
            transform.position_from_point(&PlotPoint::new(x + half, self.y_min.max(0.0))),
        );

        let origin = Position::new(rect.top(), rect.left());
        let anchor = AnnotationBox::new(origin, rect.width(), rect.height());
        self.controller.open_for_category(&self.data, &row.category, anchor);
    }

    /// Feed global pointer input to an active drag, one update per frame
    fn drive_drag(&self, ctx: &egui::Context) {
        if !self.controller.is_dragging() {
            return;
        }

        ctx.set_cursor_icon(CursorIcon::Grabbing);
        let (pointer, released) =
            ctx.input(|i| (i.pointer.interact_pos(), i.pointer.primary_released()));

        if released {
            self.controller.pointer_up(pointer);
            return;
        }
        if let Some(pointer) = pointer {
            self.controller.pointer_move(pointer);
        }
        self.controller.on_frame();
        ctx.request_repaint();
    }
}

/// `(offset from category center, width)` of the `slot`-th of `count` bar series
fn bar_slot_geometry(slot: usize, count: usize) -> (f64, f64) {
    let count = count.max(1) as f64;
    let width = BAR_GROUP_WIDTH / count;
    let offset = -BAR_GROUP_WIDTH / 2.0 + width * (slot as f64 + 0.5);
    (offset, width)
}

/// Category index under plot x coordinate `x`
fn category_at(x: f64, len: usize) -> Option<usize> {
    if !x.is_finite() || len == 0 {
        return None;
    }
    let index = x.round();
    if index < 0.0 || index >= len as f64 || (x - index).abs() > 0.5 {
        return None;
    }
    Some(index as usize)
}

/// Show every `step`-th label so crowded axes stay readable
fn label_step(width: f32, count: usize, labels: &[String]) -> usize {
    if count == 0 {
        return 1;
    }
    let band = width / count as f32;
    let longest = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    if category_label_angle(band, longest) == 0.0 {
        1
    } else {
        let needed = longest as f32 * 7.0 + 8.0;
        (needed / band.max(1.0)).ceil().max(1.0) as usize
    }
}

fn category_label(labels: &[String], step: usize, value: f64) -> String {
    let index = value.round();
    if (value - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }
    let index = index as usize;
    if index % step.max(1) != 0 {
        return String::new();
    }
    labels.get(index).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pin_core::{ChartKind, DataPoint, FieldValue, SeriesSpec};

    fn row(quarter: &str, revenue: f64, target: f64) -> DataPoint {
        let mut point = DataPoint::new();
        point.insert("quarter".to_string(), FieldValue::from(quarter));
        point.insert("revenue".to_string(), FieldValue::from(revenue));
        point.insert("target".to_string(), FieldValue::from(target));
        point
    }

    fn config() -> ChartConfig {
        ChartConfig {
            title: "Revenue".to_string(),
            kind: ChartKind::Composed,
            category_key: "quarter".to_string(),
            series: vec![
                SeriesSpec::new(SeriesKind::Bar, "revenue"),
                SeriesSpec::new(SeriesKind::Line, "target"),
            ],
            rows: vec![row("Q1", 820.0, 900.0), row("Q2", -40.0, 950.0), row("Q3", 1200.0, 1000.0)],
            ..ChartConfig::default()
        }
    }

    #[test]
    fn test_widget_geometry() {
        let context = ChartContext::default();
        let widget = ChartWidget::new(&context, config(), Formatters::default()).unwrap();

        // 1200 * 1.08 = 1296 rounds up to 1500; -40 * 1.08 rounds to -50
        assert_eq!(widget.y_domain(), (-50.0, 1500.0));
        // (56 + 6) * 3 + 120 = 306, raised to the composed minimum
        assert_eq!(widget.width(), 360.0);
        assert_eq!(widget.colors().len(), 2);
        assert_eq!(context.bus.subscriber_count(), 1);
    }

    #[test]
    fn test_count_refresh_is_throttled() {
        let mut throttle = Throttle::new(COUNT_REFRESH_SECONDS);

        assert!(throttle.ready(0.0));
        // Many frames inside one interval trigger no further requests
        assert!((1..30).all(|frame| !throttle.ready(frame as f64 / 60.0)));
        assert!(throttle.ready(0.5));
        assert!(!throttle.ready(0.9));
        assert!(throttle.ready(1.0));
    }

    #[test]
    fn test_dropping_widget_unsubscribes() {
        let context = ChartContext::default();
        let widget = ChartWidget::new(&context, config(), Formatters::default()).unwrap();
        drop(widget);
        assert_eq!(context.bus.subscriber_count(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let context = ChartContext::default();
        let mut bad = config();
        bad.rows.push(DataPoint::new());

        let err = ChartWidget::new(&context, bad, Formatters::default()).err();
        assert!(matches!(err, Some(ConfigError::MissingCategory { row: 3, .. })));
    }

    #[test]
    fn test_save_config_round_trips_title() {
        let context = ChartContext::default();
        let widget = ChartWidget::new(&context, config(), Formatters::default()).unwrap();
        assert_eq!(widget.save_config()["title"], "Revenue");
    }

    #[test]
    fn test_bar_slots_fill_the_group() {
        assert_eq!(bar_slot_geometry(0, 1), (0.0, 0.8));

        let (first, width) = bar_slot_geometry(0, 2);
        let (second, _) = bar_slot_geometry(1, 2);
        assert!((width - 0.4).abs() < 1e-9);
        assert!((first + 0.2).abs() < 1e-9);
        assert!((second - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_category_hit_testing() {
        assert_eq!(category_at(0.3, 3), Some(0));
        assert_eq!(category_at(1.6, 3), Some(2));
        assert_eq!(category_at(-0.7, 3), None);
        assert_eq!(category_at(2.6, 3), None);
        assert_eq!(category_at(f64::NAN, 3), None);
    }

    #[test]
    fn test_category_labels_thin_out_when_crowded() {
        let labels: Vec<String> = (0..10).map(|i| format!("Category {}", i)).collect();
        assert_eq!(label_step(2000.0, 10, &labels), 1);

        let step = label_step(400.0, 10, &labels);
        assert!(step > 1);
        assert_eq!(category_label(&labels, step, 0.0), "Category 0");
        assert_eq!(category_label(&labels, step, 1.0), "");
        assert_eq!(category_label(&labels, 1, 0.5), "");
    }
}
