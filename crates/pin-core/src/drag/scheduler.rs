//! Coalesce-until-next-frame primitive

/// Holds at most one pending value until the next frame takes it.
///
/// Scheduling while a value is pending replaces it, so any number of pointer
/// moves within one frame produce a single update carrying the latest value.
#[derive(Debug, Clone)]
pub struct FrameCoalescer<T> {
    pending: Option<T>,
    replaced: u64,
}

impl<T> Default for FrameCoalescer<T> {
    fn default() -> Self {
        Self {
            pending: None,
            replaced: 0,
        }
    }
}

impl<T> FrameCoalescer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `value` for the next frame, dropping any older pending value.
    ///
    /// Returns true when an older value was replaced.
    pub fn schedule(&mut self, value: T) -> bool {
        let replaced = self.pending.replace(value).is_some();
        if replaced {
            self.replaced += 1;
        }
        replaced
    }

    /// Drop the pending value without applying it
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take()
    }

    /// Called once per frame: hand out the pending value, if any
    pub fn take(&mut self) -> Option<T> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of values superseded before they were applied
    pub fn replaced_count(&self) -> u64 {
        self.replaced
    }
}
