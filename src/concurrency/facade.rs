//! Task-based front end for a [`MaterialStore`]
//!
//! Each call is shipped to the worker pool and goes through exactly the same
//! acquisition path as a direct call. Only where the call runs, and how the
//! caller waits for it, changes.

use super::maintenance::{AutosaveTask, MaintenanceTask};
use super::pool::{TaskHandle, WorkerPool};
use crate::config::{PoolConfig, StoreConfig};
use crate::core::{Material, MaterialType};
use crate::errors::Result;
use crate::persistence::JsonFileRepository;
use crate::store::{CatalogStats, MaterialStore};
use futures::future::{join_all, try_join_all};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct AsyncCatalog {
    store: Arc<MaterialStore>,
    pool: WorkerPool,
    grace_period: Duration,
}

impl AsyncCatalog {
    pub fn new(store: Arc<MaterialStore>, config: &PoolConfig) -> Result<Self> {
        Ok(Self {
            store,
            pool: WorkerPool::new(config.workers)?,
            grace_period: config.grace_period(),
        })
    }

    /// Catalog sized from `[pool]`, with autosave scheduled when
    /// `[persistence]` names a path and an interval.
    pub fn from_config(store: Arc<MaterialStore>, config: &StoreConfig) -> Result<Self> {
        let catalog = Self::new(store, &config.pool)?;
        if let (Some(path), Some(interval)) =
            (&config.persistence.path, config.persistence.autosave_interval())
        {
            let repository = Arc::new(JsonFileRepository::new(path));
            catalog.schedule(interval, Arc::new(AutosaveTask::new(repository)))?;
        }
        Ok(catalog)
    }

    /// Run any store call on the pool.
    pub fn submit<T, F>(&self, call: F) -> Result<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&MaterialStore) -> Result<T> + Send + 'static,
    {
        self.store.ensure_open()?;
        let store = self.store.clone();
        self.pool.submit(move || call(&store))
    }

    pub fn add(&self, material: Material) -> Result<TaskHandle<bool>> {
        self.submit(move |store| store.add(material))
    }

    pub fn remove(&self, id: impl Into<String>) -> Result<TaskHandle<Option<Arc<Material>>>> {
        let id = id.into();
        self.submit(move |store| store.remove(&id))
    }

    pub fn get(&self, id: impl Into<String>) -> Result<TaskHandle<Option<Arc<Material>>>> {
        let id = id.into();
        self.submit(move |store| store.get(&id))
    }

    pub fn clear(&self) -> Result<TaskHandle<usize>> {
        self.submit(|store| store.clear())
    }

    pub fn search_by_title(&self, term: impl Into<String>) -> Result<TaskHandle<Vec<Arc<Material>>>> {
        let term = term.into();
        self.submit(move |store| store.search_by_title(&term))
    }

    pub fn search_by_creator(&self, term: impl Into<String>) -> Result<TaskHandle<Vec<Arc<Material>>>> {
        let term = term.into();
        self.submit(move |store| store.search_by_creator(&term))
    }

    pub fn by_type(&self, kind: MaterialType) -> Result<TaskHandle<Vec<Arc<Material>>>> {
        self.submit(move |store| store.by_type(kind))
    }

    pub fn by_price_range(&self, min: f64, max: f64) -> Result<TaskHandle<Vec<Arc<Material>>>> {
        self.submit(move |store| store.by_price_range(min, max))
    }

    pub fn aggregate_stats(&self) -> Result<TaskHandle<CatalogStats>> {
        self.submit(|store| store.aggregate_stats())
    }

    pub fn total_value(&self) -> Result<TaskHandle<f64>> {
        self.submit(|store| store.total_value())
    }

    /// One task per record; every record's outcome is reported under its id,
    /// including records that could not be submitted because the catalog
    /// closed mid-batch. If the batch repeats an id, the map keeps the
    /// outcome of the last occurrence.
    pub async fn add_many(&self, materials: Vec<Material>) -> HashMap<String, Result<bool>> {
        let submitted = materials
            .into_iter()
            .map(|material| (material.id().to_string(), self.add(material)))
            .collect();
        join_keyed(submitted).await
    }

    /// Like [`add_many`](Self::add_many), but resolves to the first failure
    /// instead of a per-record report. Returns how many records were inserted.
    pub async fn add_many_strict(&self, materials: Vec<Material>) -> Result<usize> {
        let handles = materials
            .into_iter()
            .map(|material| self.add(material))
            .collect::<Result<Vec<_>>>()?;

        let inserted = try_join_all(handles).await?;
        Ok(inserted.into_iter().filter(|added| *added).count())
    }

    /// One lookup task per id, joined into a map keyed by id.
    pub async fn find_many<I, S>(&self, ids: I) -> HashMap<String, Result<Option<Arc<Material>>>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let submitted = ids
            .into_iter()
            .map(|id| {
                let id: String = id.into();
                let handle = self.get(id.clone());
                (id, handle)
            })
            .collect();
        join_keyed(submitted).await
    }

    /// Run `task` every `interval` on the pool until the catalog closes.
    pub fn schedule(&self, interval: Duration, task: Arc<dyn MaintenanceTask>) -> Result<()> {
        self.store.ensure_open()?;
        let store = self.store.clone();
        let name = task.name().to_string();
        let label = name.clone();

        self.pool.spawn_background(move |token| async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick fires immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let store = store.clone();
                let task = task.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    let result = task.run(&store);
                    if result.is_ok() {
                        store.metrics().increment(format!("maintenance.{}", task.name()));
                    }
                    result
                })
                .await;

                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) if err.is_closed() => break,
                    Ok(Err(err)) => warn!(task = %name, error = %err, "maintenance task failed"),
                    Err(err) => warn!(task = %name, error = %err, "maintenance task panicked"),
                }
            }
        })?;

        info!(task = %label, interval_ms = interval.as_millis() as u64, "maintenance scheduled");
        Ok(())
    }

    /// Close the store, stop accepting tasks, wait up to the configured grace
    /// period for in-flight work and cancel the rest. Idempotent.
    pub fn close(&self) {
        self.close_with_grace(self.grace_period);
    }

    pub fn close_with_grace(&self, grace: Duration) {
        if self.store.close() {
            info!("async catalog closing");
        }
        let remaining = self.pool.shutdown(grace);
        if remaining > 0 {
            warn!(remaining, "tasks were still running when the pool shut down");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.store.is_closed()
    }

    pub fn store(&self) -> &Arc<MaterialStore> {
        &self.store
    }

    pub fn in_flight(&self) -> usize {
        self.pool.in_flight()
    }

    pub fn workers(&self) -> usize {
        self.pool.workers()
    }
}

/// Await every submitted task; a submission that failed outright keeps its
/// error as that key's outcome.
async fn join_keyed<T>(submitted: Vec<(String, Result<TaskHandle<T>>)>) -> HashMap<String, Result<T>> {
    let (keys, pending): (Vec<_>, Vec<_>) = submitted.into_iter().unzip();
    let outcomes = join_all(pending.into_iter().map(|submission| async move {
        match submission {
            Ok(handle) => handle.await,
            Err(err) => Err(err),
        }
    }))
    .await;
    keys.into_iter().zip(outcomes).collect()
}
