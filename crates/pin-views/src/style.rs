//! egui adapter for drag-time global style

use egui::Context;
use parking_lot::Mutex;
use pin_core::GlobalStyle;

#[derive(Default)]
struct StyleState {
    depth: usize,
    saved_selectable: bool,
}

/// Turns off label text selection while any annotation is being dragged.
///
/// Nested applications are counted; the original setting comes back when the
/// last drag ends. The grabbing cursor is set per frame by the chart widget
/// since egui resets cursor icons every frame.
pub struct EguiStyle {
    ctx: Context,
    state: Mutex<StyleState>,
}

impl EguiStyle {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            state: Mutex::new(StyleState::default()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().depth > 0
    }

    fn set_selectable(&self, selectable: bool) {
        let mut style = (*self.ctx.style()).clone();
        style.interaction.selectable_labels = selectable;
        self.ctx.set_style(style);
    }
}

impl GlobalStyle for EguiStyle {
    fn apply_drag_style(&self) {
        let mut state = self.state.lock();
        if state.depth == 0 {
            state.saved_selectable = self.ctx.style().interaction.selectable_labels;
            self.set_selectable(false);
        }
        state.depth += 1;
    }

    fn restore_drag_style(&self) {
        let mut state = self.state.lock();
        match state.depth {
            0 => tracing::warn!("Drag style restored without a matching apply"),
            1 => {
                state.depth = 0;
                self.set_selectable(state.saved_selectable);
            }
            _ => state.depth -= 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_restored_after_last_drag() {
        let ctx = Context::default();
        let style = EguiStyle::new(ctx.clone());
        let original = ctx.style().interaction.selectable_labels;

        style.apply_drag_style();
        style.apply_drag_style();
        assert!(!ctx.style().interaction.selectable_labels);

        style.restore_drag_style();
        assert!(style.is_active());
        assert!(!ctx.style().interaction.selectable_labels);

        style.restore_drag_style();
        assert!(!style.is_active());
        assert_eq!(ctx.style().interaction.selectable_labels, original);
    }

    #[test]
    fn test_unbalanced_restore_is_ignored() {
        let ctx = Context::default();
        let style = EguiStyle::new(ctx.clone());
        let original = ctx.style().interaction.selectable_labels;

        style.restore_drag_style();
        assert!(!style.is_active());
        assert_eq!(ctx.style().interaction.selectable_labels, original);
    }
}
