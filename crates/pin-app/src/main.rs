//! Demo: several independently mounted charts sharing one discovery bus

use std::sync::Arc;

use anyhow::Result;
use egui::Context;
use pin_core::{ChartContext, DiscoveryBus};
use pin_views::{ChartWidget, EguiStyle};
use tracing::{error, info};

mod demo;

struct PinboardApp {
    context: ChartContext,
    charts: Vec<ChartWidget>,
    /// Charts unmounted with "Remove chart", kept so they can be re-added
    parked: Vec<demo::DemoChart>,
}

impl PinboardApp {
    fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let style = Arc::new(EguiStyle::new(cc.egui_ctx.clone()));
        let context = ChartContext::new(Arc::new(DiscoveryBus::new()), style);

        let mut app = Self {
            context,
            charts: Vec::new(),
            parked: Vec::new(),
        };

        match demo::demo_charts() {
            Ok(charts) => {
                for chart in charts {
                    app.mount(chart);
                }
            }
            Err(e) => error!("Failed to load demo charts: {:#}", e),
        }

        app
    }

    fn mount(&mut self, chart: demo::DemoChart) {
        match ChartWidget::new(&self.context, chart.config, chart.formatters) {
            Ok(widget) => self.charts.push(widget),
            Err(e) => error!("Skipping chart: {}", e),
        }
    }

    fn unmount_last(&mut self) {
        if let Some(widget) = self.charts.pop() {
            info!("Removing chart '{}'", widget.config().title);
            self.parked.push(demo::DemoChart {
                config: widget.config().clone(),
                formatters: widget.formatters().clone(),
            });
        }
    }

    fn toolbar(&mut self, ctx: &Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Pinboard");
                ui.separator();
                ui.label(format!("{} charts on the bus", self.context.bus.subscriber_count()));

                if ui.button("Remove chart").clicked() {
                    self.unmount_last();
                }
                if !self.parked.is_empty() && ui.button("Restore chart").clicked() {
                    if let Some(chart) = self.parked.pop() {
                        self.mount(chart);
                    }
                }
            });
            ui.label(
                egui::RichText::new(
                    "Click a mark to pin its data. Drag a pinned panel by its title; \
                     it snaps to other panels. Esc closes the latest panel of the hovered chart.",
                )
                .weak(),
            );
        });
    }
}

impl eframe::App for PinboardApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.toolbar(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::both().show(ui, |ui| {
                for chart in &mut self.charts {
                    ui.group(|ui| chart.ui(ui));
                    ui.add_space(12.0);
                }
            });
        });
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting pinboard demo");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([800.0, 600.0]),
        default_theme: eframe::Theme::Dark,
        ..Default::default()
    };

    eframe::run_native(
        "Pinboard - pinned chart annotations",
        options,
        Box::new(|cc| Box::new(PinboardApp::new(cc))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run app: {}", e))?;

    Ok(())
}
