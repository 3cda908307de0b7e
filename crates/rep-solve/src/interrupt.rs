use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide interrupt request shared between a signal listener and a backend.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    /// Creates a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the running solve to stop.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Lowers the flag again.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
