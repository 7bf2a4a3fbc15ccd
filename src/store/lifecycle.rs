use crate::errors::{Result, StoreError};
use std::sync::atomic::{AtomicU8, Ordering};

const OPEN: u8 = 0;
const CLOSED: u8 = 1;

/// One-way OPEN -> CLOSED state flag.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
    name: &'static str,
}

impl Lifecycle {
    pub fn new(name: &'static str) -> Self {
        Self {
            state: AtomicU8::new(OPEN),
            name,
        }
    }

    /// Flip to closed. Returns true only for the call that made the
    /// transition; later calls are no-ops.
    pub fn close(&self) -> bool {
        self.state
            .compare_exchange(OPEN, CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == CLOSED
    }

    pub fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(StoreError::closed(self.name))
        } else {
            Ok(())
        }
    }
}
