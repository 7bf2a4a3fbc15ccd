//! Periodic work scheduled through [`AsyncCatalog::schedule`](super::AsyncCatalog::schedule)

use crate::errors::Result;
use crate::persistence::MaterialRepository;
use crate::store::MaterialStore;
use std::sync::Arc;
use tracing::debug;

/// A job run against the store at a fixed interval.
///
/// Returning an `IllegalState` error for a closed store stops the schedule;
/// any other error is logged and the next tick runs normally.
pub trait MaintenanceTask: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn run(&self, store: &MaterialStore) -> Result<()>;
}

/// Writes a consistent snapshot of the store to a repository
pub struct AutosaveTask {
    repository: Arc<dyn MaterialRepository>,
}

impl AutosaveTask {
    pub fn new(repository: Arc<dyn MaterialRepository>) -> Self {
        Self { repository }
    }
}

impl MaintenanceTask for AutosaveTask {
    fn name(&self) -> &str {
        "autosave"
    }

    fn run(&self, store: &MaterialStore) -> Result<()> {
        let saved = store.save_to(self.repository.as_ref())?;
        debug!(records = saved, "autosave complete");
        Ok(())
    }
}
