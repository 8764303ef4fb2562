//! Pointer dragging of annotations
//!
//! Pointer moves are coalesced to one update per frame, each update is clamped
//! and snapped by the [`SnapEngine`](crate::snap::SnapEngine), and global style
//! overrides (grabbing cursor, disabled text selection) are held by a guard so
//! they are released on every exit path, including the chart being dropped
//! mid-drag.

use std::sync::Arc;

mod controller;
mod scheduler;

pub use controller::{DragController, DragFrame};
pub use scheduler::FrameCoalescer;

/// Host hook for page-wide style state touched while dragging
pub trait GlobalStyle: Send + Sync {
    /// Show the grabbing cursor and suppress text selection
    fn apply_drag_style(&self);

    /// Undo [`GlobalStyle::apply_drag_style`]
    fn restore_drag_style(&self);
}

/// Style hook for hosts without global style state (and tests)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStyle;

impl GlobalStyle for NoopStyle {
    fn apply_drag_style(&self) {}

    fn restore_drag_style(&self) {}
}

/// Applies drag styling on creation and restores it on drop
pub struct StyleGuard {
    style: Arc<dyn GlobalStyle>,
}

impl StyleGuard {
    pub fn acquire(style: Arc<dyn GlobalStyle>) -> Self {
        style.apply_drag_style();
        Self { style }
    }
}

impl Drop for StyleGuard {
    fn drop(&mut self) {
        self.style.restore_drag_style();
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::GlobalStyle;
    use std::sync::atomic::{AtomicI32, Ordering};

    /// Counts outstanding style applications
    #[derive(Default)]
    pub struct CountingStyle {
        pub active: AtomicI32,
    }

    impl CountingStyle {
        pub fn active(&self) -> i32 {
            self.active.load(Ordering::SeqCst)
        }
    }

    impl GlobalStyle for CountingStyle {
        fn apply_drag_style(&self) {
            self.active.fetch_add(1, Ordering::SeqCst);
        }

        fn restore_drag_style(&self) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
