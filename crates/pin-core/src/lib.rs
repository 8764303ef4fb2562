//! Core functionality for pinned chart annotations
//!
//! This crate provides the pieces that do not depend on a renderer: the
//! geometry/scaling engine, the per-chart annotation registry, the discovery
//! bus that lets independently mounted charts see each other's annotations,
//! and the drag/snap machinery that positions floating annotations.

pub mod annotations;
pub mod colors;
pub mod config;
pub mod controller;
pub mod data;
pub mod drag;
pub mod error;
pub mod events;
pub mod scale;
pub mod snap;
pub mod state;

// Re-export commonly used types
pub use annotations::{
    Annotation, AnnotationBox, AnnotationId, AnnotationRegistry, OpenOutcome, Position,
};
pub use colors::{generate_color_map, ColorMap, DEFAULT_PALETTE};
pub use config::{AnnotationSettings, ChartConfig, ChartKind, Formatters, SnapThresholds};
pub use controller::{AnnotationController, ControllerSnapshot};
pub use data::{ChartData, DataPoint, FieldValue, Row, SeriesKind, SeriesSpec};
pub use drag::{DragController, DragFrame, FrameCoalescer, GlobalStyle, NoopStyle, StyleGuard};
pub use error::{BusError, ConfigError};
pub use events::{
    BusMessage, BusSubscriber, DiscoveryBus, DiscoveryResponse, InstanceId, PositionEntry,
    ResponseSink, Subscription,
};
pub use scale::{
    compute_chart_width, compute_nice_max, max_data_value, min_data_value, nice_ceiling,
    SeriesCounts, WidthBounds,
};
pub use snap::{AlignmentGuide, GuideAxis, SnapEngine, SnapOutcome, SnapTier};
pub use state::ChartContext;
