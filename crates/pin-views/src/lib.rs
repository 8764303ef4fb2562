//! egui widgets for charts with pinned annotations
//!
//! Marks and axes are drawn by `egui_plot`; pinned annotations float above
//! every chart as foreground `egui::Area`s positioned in screen coordinates.

mod chart;
mod overlay;
mod style;

pub use chart::ChartWidget;
pub use overlay::guide_segment;
pub use style::EguiStyle;
