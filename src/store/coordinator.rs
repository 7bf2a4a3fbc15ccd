//! Table-wide read/write coordination with an optimistic fast path
//!
//! A `parking_lot::RwLock<()>` serializes writers against each other and
//! against pessimistic readers. Next to it sits a version counter used the
//! way a seqlock uses its sequence:
//!
//! - a writer bumps the version to an ODD value right after taking the lock
//!   and back to EVEN right before releasing it
//! - an optimistic reader samples the version, reads, then checks that the
//!   version is unchanged and even
//!
//! Readers that fail validation retry exactly once under the shared lock.
//! Every acquisition is an RAII guard, so early returns, `?` and panics all
//! release it.

use crate::infrastructure::metrics::StoreMetrics;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{fence, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Opaque token identifying one acquisition or optimistic attempt.
///
/// Only meaningful to the coordinator that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp(u64);

impl Stamp {
    fn is_write_in_progress(&self) -> bool {
        self.0 & 1 == 1
    }
}

pub struct AccessCoordinator {
    lock: RwLock<()>,
    version: AtomicU64,
    metrics: Arc<StoreMetrics>,
}

impl AccessCoordinator {
    pub fn new(metrics: Arc<StoreMetrics>) -> Self {
        Self {
            lock: RwLock::new(()),
            version: AtomicU64::new(0),
            metrics,
        }
    }

    /// Sample the version without blocking.
    ///
    /// If a writer is mid-commit the stamp is odd and will never validate.
    pub fn optimistic_read(&self) -> Stamp {
        Stamp(self.version.load(Ordering::Acquire))
    }

    /// True if no write started or finished since `stamp` was issued.
    pub fn validate(&self, stamp: Stamp) -> bool {
        // Keep the reads done under the stamp from sinking below this load.
        fence(Ordering::Acquire);
        !stamp.is_write_in_progress() && self.version.load(Ordering::Relaxed) == stamp.0
    }

    /// Shared acquisition. Blocks only while a writer holds the lock.
    pub fn read(&self) -> ReadStamp<'_> {
        let guard = self.lock.read();
        ReadStamp {
            stamp: Stamp(self.version.load(Ordering::Acquire)),
            _guard: guard,
        }
    }

    /// Exclusive acquisition. Blocks until every reader and writer is gone.
    pub fn write(&self) -> WriteStamp<'_> {
        let guard = self.lock.write();
        let odd = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        self.metrics.record_write();
        WriteStamp {
            coordinator: self,
            stamp: Stamp(odd),
            _guard: guard,
        }
    }

    /// Run `read` optimistically; if a write overlapped, run it again under
    /// the shared lock. `read` must not have side effects beyond producing
    /// its value, since the optimistic result may be discarded.
    pub fn read_consistent<T>(&self, read: impl Fn() -> T) -> T {
        let stamp = self.optimistic_read();
        if !stamp.is_write_in_progress() {
            let value = read();
            if self.validate(stamp) {
                self.metrics.record_optimistic_read();
                return value;
            }
        }

        trace!(stamp = stamp.0, "optimistic read invalidated, retrying under shared lock");
        self.metrics.record_fallback_read();
        let _shared = self.read();
        read()
    }

    /// Current version. Even when no writer is active.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> &Arc<StoreMetrics> {
        &self.metrics
    }
}

impl Default for AccessCoordinator {
    fn default() -> Self {
        Self::new(Arc::new(StoreMetrics::new()))
    }
}

/// Held shared acquisition; released on drop
pub struct ReadStamp<'a> {
    stamp: Stamp,
    _guard: RwLockReadGuard<'a, ()>,
}

impl ReadStamp<'_> {
    pub fn stamp(&self) -> Stamp {
        self.stamp
    }
}

/// Held exclusive acquisition; publishes the write and releases on drop
pub struct WriteStamp<'a> {
    coordinator: &'a AccessCoordinator,
    stamp: Stamp,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl WriteStamp<'_> {
    pub fn stamp(&self) -> Stamp {
        self.stamp
    }
}

impl Drop for WriteStamp<'_> {
    fn drop(&mut self) {
        // Runs before `_guard` is dropped: the version is even again by the
        // time the lock is released.
        self.coordinator.version.fetch_add(1, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_optimistic_validates_without_writes() {
        let coordinator = AccessCoordinator::default();
        let stamp = coordinator.optimistic_read();
        assert!(coordinator.validate(stamp));
    }

    #[test]
    fn test_write_invalidates_stamp() {
        let coordinator = AccessCoordinator::default();
        let stamp = coordinator.optimistic_read();
        {
            let write = coordinator.write();
            assert_eq!(write.stamp().0 & 1, 1);
            assert!(!coordinator.validate(stamp));
            assert!(!coordinator.validate(coordinator.optimistic_read()));
        }
        assert!(!coordinator.validate(stamp));
        assert_eq!(coordinator.version() % 2, 0);
        assert!(coordinator.validate(coordinator.optimistic_read()));
    }

    #[test]
    fn test_write_released_on_panic() {
        let coordinator = Arc::new(AccessCoordinator::default());
        let inner = coordinator.clone();
        let result = thread::spawn(move || {
            let _write = inner.write();
            panic!("writer failed mid-operation");
        })
        .join();
        assert!(result.is_err());

        // Lock is free again and the version is back to even.
        let _read = coordinator.read();
        assert_eq!(coordinator.version() % 2, 0);
    }

    #[test]
    fn test_read_consistent_falls_back_during_write() {
        let coordinator = Arc::new(AccessCoordinator::default());
        let write = coordinator.write();

        let reader = {
            let coordinator = coordinator.clone();
            thread::spawn(move || coordinator.read_consistent(|| 7))
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!reader.is_finished());
        drop(write);

        assert_eq!(reader.join().unwrap(), 7);
        assert_eq!(coordinator.metrics().fallback_reads(), 1);
        assert_eq!(coordinator.metrics().optimistic_reads(), 0);
    }

    #[test]
    fn test_read_consistent_counts_optimistic_hits() {
        let coordinator = AccessCoordinator::default();
        let calls = AtomicUsize::new(0);
        let value = coordinator.read_consistent(|| calls.fetch_add(1, Ordering::SeqCst));
        assert_eq!(value, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.metrics().optimistic_reads(), 1);
    }

    #[test]
    fn test_writers_are_exclusive() {
        let coordinator = Arc::new(AccessCoordinator::default());
        let active = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let coordinator = coordinator.clone();
                let active = active.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        let _write = coordinator.write();
                        assert_eq!(active.fetch_add(1, Ordering::SeqCst), 0);
                        active.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(coordinator.version(), 800);
    }
}
