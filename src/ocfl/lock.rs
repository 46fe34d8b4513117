use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::ReentrantMutex;

use crate::ocfl::error::{Result, RocflError};

/// Runs `work` while holding an exclusive, reentrant lock keyed on `object_id`. The same
/// thread may call `with_lock` again for the same id while already holding it.
pub trait ObjectLockManager: Send + Sync {
    fn with_lock<F, T>(&self, object_id: &str, work: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>;
}

fn contention(object_id: &str, wait_time: Duration) -> RocflError {
    RocflError::LockContention {
        object_id: object_id.to_string(),
        message: format!("Timed out after {:?} waiting to acquire lock", wait_time),
    }
}

/// An in-process object lock manager backed by a map of weak references to reentrant
/// mutexes. A mutex is kept alive only while at least one caller holds a strong reference
/// to it; once the last holder releases it, the entry is free to be dropped and a fresh
/// mutex is created the next time the id is locked.
pub struct InMemoryLockManager {
    locks: DashMap<String, Weak<ReentrantMutex<()>>>,
    wait_time: Duration,
}

impl InMemoryLockManager {
    /// Creates a new lock manager. `wait_time` bounds how long `with_lock` will wait to
    /// acquire a contended lock before failing with `LockContention`.
    pub fn new(wait_time: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            wait_time,
        }
    }

    fn mutex_for(&self, object_id: &str) -> Arc<ReentrantMutex<()>> {
        if let Some(existing) = self.locks.get(object_id).and_then(|entry| entry.upgrade()) {
            return existing;
        }

        let fresh = Arc::new(ReentrantMutex::new(()));

        match self.locks.entry(object_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if let Some(existing) = entry.get().upgrade() {
                    existing
                } else {
                    entry.insert(Arc::downgrade(&fresh));
                    fresh
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::downgrade(&fresh));
                fresh
            }
        }
    }
}

impl ObjectLockManager for InMemoryLockManager {
    fn with_lock<F, T>(&self, object_id: &str, work: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let mutex = self.mutex_for(object_id);

        let guard = mutex
            .try_lock_for(self.wait_time)
            .ok_or_else(|| contention(object_id, self.wait_time))?;

        let result = work();
        drop(guard);
        result
    }
}

/// A row in the backing table used by `DbLockManager`. Implementations own whatever
/// connection pooling or transaction handling their storage requires; this trait only
/// defines the locking protocol itself.
pub trait LockTable: Send + Sync {
    /// Attempts to insert a lock row for `object_id`. Returns `true` if the row was
    /// created, `false` if one already exists.
    fn try_insert(&self, object_id: &str) -> Result<bool>;

    /// Returns how long ago the existing lock row for `object_id` was acquired, or `None`
    /// if there is currently no row.
    fn age(&self, object_id: &str) -> Result<Option<Duration>>;

    /// Replaces the lock row for `object_id` as though it were acquired now, regardless of
    /// whether a row already exists.
    fn steal(&self, object_id: &str) -> Result<()>;

    /// Removes the lock row for `object_id`.
    fn release(&self, object_id: &str) -> Result<()>;
}

/// An object lock manager backed by row-level locks in an external table, suitable for
/// coordinating across multiple processes or hosts. A lock row older than
/// `max_lock_duration` is assumed to belong to a process that crashed without releasing it
/// and is stolen by the next acquirer rather than waited out.
pub struct DbLockManager<T: LockTable> {
    table: T,
    wait_time: Duration,
    max_lock_duration: Duration,
    poll_interval: Duration,
}

impl<T: LockTable> DbLockManager<T> {
    pub fn new(table: T, wait_time: Duration, max_lock_duration: Duration) -> Self {
        Self {
            table,
            wait_time,
            max_lock_duration,
            poll_interval: Duration::from_millis(50),
        }
    }

    fn acquire(&self, object_id: &str) -> Result<()> {
        let deadline = Instant::now() + self.wait_time;

        loop {
            if self.table.try_insert(object_id)? {
                return Ok(());
            }

            match self.table.age(object_id)? {
                Some(age) if age > self.max_lock_duration => {
                    self.table.steal(object_id)?;
                    continue;
                }
                // Row disappeared between the failed insert and this check; retry now.
                None => continue,
                _ => {}
            }

            if Instant::now() >= deadline {
                return Err(contention(object_id, self.wait_time));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            thread::sleep(self.poll_interval.min(remaining));
        }
    }
}

impl<T: LockTable> ObjectLockManager for DbLockManager<T> {
    fn with_lock<F, R>(&self, object_id: &str, work: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        self.acquire(object_id)?;
        let result = work();
        self.table.release(object_id)?;
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn with_lock_runs_work_and_releases() {
        let manager = InMemoryLockManager::new(Duration::from_millis(100));

        let result = manager.with_lock("obj-1", || Ok(42)).unwrap();
        assert_eq!(42, result);

        // The lock must be released by the time `with_lock` returns.
        manager.with_lock("obj-1", || Ok(())).unwrap();
    }

    #[test]
    fn with_lock_is_reentrant() {
        let manager = InMemoryLockManager::new(Duration::from_millis(100));

        manager
            .with_lock("obj-1", || manager.with_lock("obj-1", || Ok(())))
            .unwrap();
    }

    #[test]
    fn with_lock_times_out_when_contended() {
        let manager = Arc::new(InMemoryLockManager::new(Duration::from_millis(50)));
        let manager2 = manager.clone();

        let (tx, rx) = std::sync::mpsc::channel();

        let handle = thread::spawn(move || {
            manager2
                .with_lock("obj-1", || {
                    tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(300));
                    Ok(())
                })
                .unwrap();
        });

        rx.recv().unwrap();

        match manager.with_lock("obj-1", || Ok(())) {
            Err(RocflError::LockContention { object_id, .. }) => assert_eq!("obj-1", object_id),
            other => panic!("expected lock contention, got {:?}", other),
        }

        handle.join().unwrap();
    }

    #[test]
    fn with_lock_allows_separate_objects_concurrently() {
        let manager = Arc::new(InMemoryLockManager::new(Duration::from_millis(100)));
        let manager2 = manager.clone();

        let (tx, rx) = std::sync::mpsc::channel();

        let handle = thread::spawn(move || {
            manager2
                .with_lock("obj-1", || {
                    tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(150));
                    Ok(())
                })
                .unwrap();
        });

        rx.recv().unwrap();
        manager.with_lock("obj-2", || Ok(())).unwrap();

        handle.join().unwrap();
    }

    #[derive(Default)]
    struct FakeTable {
        rows: Mutex<HashMap<String, Instant>>,
        inserts: AtomicUsize,
    }

    impl LockTable for FakeTable {
        fn try_insert(&self, object_id: &str) -> Result<bool> {
            let mut rows = self.rows.lock().unwrap();
            if rows.contains_key(object_id) {
                return Ok(false);
            }
            rows.insert(object_id.to_string(), Instant::now());
            self.inserts.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        fn age(&self, object_id: &str) -> Result<Option<Duration>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .get(object_id)
                .map(|acquired_at| acquired_at.elapsed()))
        }

        fn steal(&self, object_id: &str) -> Result<()> {
            self.rows
                .lock()
                .unwrap()
                .insert(object_id.to_string(), Instant::now());
            Ok(())
        }

        fn release(&self, object_id: &str) -> Result<()> {
            self.rows.lock().unwrap().remove(object_id);
            Ok(())
        }
    }

    #[test]
    fn db_lock_manager_acquires_and_releases() {
        let manager = DbLockManager::new(
            FakeTable::default(),
            Duration::from_millis(100),
            Duration::from_secs(60),
        );

        manager.with_lock("obj-1", || Ok(())).unwrap();
        // Released, so a second acquisition succeeds immediately.
        manager.with_lock("obj-1", || Ok(())).unwrap();
    }

    #[test]
    fn db_lock_manager_steals_expired_row() {
        let manager = DbLockManager::new(
            FakeTable::default(),
            Duration::from_millis(200),
            Duration::from_millis(10),
        );

        manager.table.steal("obj-1").unwrap();
        thread::sleep(Duration::from_millis(30));

        // The existing row is older than `max_lock_duration`, so it gets stolen rather
        // than waited out.
        manager.with_lock("obj-1", || Ok(())).unwrap();
    }

    #[test]
    fn db_lock_manager_times_out_when_row_is_fresh() {
        let manager = DbLockManager::new(
            FakeTable::default(),
            Duration::from_millis(50),
            Duration::from_secs(60),
        );

        manager.table.try_insert("obj-1").unwrap();

        match manager.with_lock("obj-1", || Ok(())) {
            Err(RocflError::LockContention { object_id, .. }) => assert_eq!("obj-1", object_id),
            other => panic!("expected lock contention, got {:?}", other),
        }
    }
}
