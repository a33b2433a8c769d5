// Event debouncing module
// Coalesces bursts of window-system events into a single idle-time pass

use log::debug;

/// Holds the latest not-yet-handled event of one kind.
///
/// Events are pushed while the Wayland queue is being dispatched and taken
/// once it has gone idle, so a burst collapses to its last event.
#[derive(Debug)]
pub struct Debouncer<T> {
    kind: &'static str,
    pending: Option<T>,
    superseded: usize,
}

impl<T> Debouncer<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            pending: None,
            superseded: 0,
        }
    }

    /// Schedule `event`, dropping any earlier pending event of this kind
    pub fn push(&mut self, event: T) {
        if self.pending.replace(event).is_some() {
            self.superseded += 1;
        }
    }

    /// Hand out the pending event for the idle pass
    pub fn take(&mut self) -> Option<T> {
        let event = self.pending.take()?;
        if self.superseded > 0 {
            debug!(
                "Coalesced {} {} events into one",
                self.superseded + 1,
                self.kind
            );
            self.superseded = 0;
        }
        Some(event)
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
