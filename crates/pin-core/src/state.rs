//! Shared context injected into every chart instance

use std::sync::Arc;

use crate::drag::{GlobalStyle, NoopStyle};
use crate::events::DiscoveryBus;

/// Handles every chart on a page shares.
///
/// Charts that should see each other's annotations must be mounted with
/// clones of the same context. Separate contexts give isolated groups, which
/// is also how tests avoid sharing a bus.
#[derive(Clone)]
pub struct ChartContext {
    /// Discovery bus
    pub bus: Arc<DiscoveryBus>,

    /// Page-wide style hook used while dragging
    pub style: Arc<dyn GlobalStyle>,
}

impl ChartContext {
    pub fn new(bus: Arc<DiscoveryBus>, style: Arc<dyn GlobalStyle>) -> Self {
        Self { bus, style }
    }

    /// Same bus, different style hook
    pub fn with_style(&self, style: Arc<dyn GlobalStyle>) -> Self {
        Self {
            bus: self.bus.clone(),
            style,
        }
    }
}

impl Default for ChartContext {
    fn default() -> Self {
        Self::new(Arc::new(DiscoveryBus::new()), Arc::new(NoopStyle))
    }
}
