use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::ocfl::error::Result;
use crate::ocfl::RocflError;

/// An object lock manager that hands out per-object mutual exclusion guards. Unlike the
/// file-based locking this replaces, contention blocks the caller up to a configured timeout
/// rather than failing immediately; only once the timeout elapses is `RocflError::Lock` surfaced.
pub struct LockManager {
    locks: Mutex<HashMap<String, Arc<ObjectMutex>>>,
    timeout: Duration,
}

struct ObjectMutex {
    state: Mutex<bool>,
    condvar: Condvar,
}

impl ObjectMutex {
    fn new() -> Self {
        Self {
            state: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }
}

pub struct ObjectLock {
    object_id: String,
    mutex: Arc<ObjectMutex>,
}

impl LockManager {
    /// Creates a new lock manager that blocks lock acquisitions for up to `timeout` before
    /// failing with `RocflError::Lock`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Acquires the per-object write lock, blocking the calling thread until it is available
    /// or `timeout` has elapsed, in which case `RocflError::Lock` is returned. The lock is
    /// released when the returned `ObjectLock` is dropped.
    pub fn acquire(&self, object_id: &str) -> Result<ObjectLock> {
        let object_mutex = {
            let mut locks = self.locks.lock().unwrap();
            locks
                .entry(object_id.to_string())
                .or_insert_with(|| Arc::new(ObjectMutex::new()))
                .clone()
        };

        let deadline = Instant::now() + self.timeout;
        let mut locked = object_mutex.state.lock().unwrap();

        while *locked {
            let now = Instant::now();
            if now >= deadline {
                return Err(RocflError::Lock(object_id.to_string()));
            }

            let (guard, timeout_result) = object_mutex
                .condvar
                .wait_timeout(locked, deadline - now)
                .unwrap();
            locked = guard;

            if timeout_result.timed_out() && *locked {
                return Err(RocflError::Lock(object_id.to_string()));
            }
        }

        *locked = true;

        Ok(ObjectLock {
            object_id: object_id.to_string(),
            mutex: object_mutex,
        })
    }
}

impl Drop for ObjectLock {
    fn drop(&mut self) {
        let mut locked = self.mutex.state.lock().unwrap();
        *locked = false;
        drop(locked);
        self.mutex.condvar.notify_one();
    }
}

impl ObjectLock {
    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use crate::ocfl::lock::LockManager;
    use crate::ocfl::RocflError;

    #[test]
    fn acquire_lock_when_available() {
        let manager = LockManager::new(Duration::from_millis(50));
        let _lock = manager.acquire("testing").unwrap();
    }

    #[test]
    fn acquire_multiple_locks() {
        let manager = LockManager::new(Duration::from_millis(50));

        let _lock1 = manager.acquire("one").unwrap();
        let _lock2 = manager.acquire("two").unwrap();
    }

    #[test]
    fn second_acquire_blocks_until_timeout() {
        let manager = LockManager::new(Duration::from_millis(50));

        let _lock1 = manager.acquire("one").unwrap();

        match manager.acquire("one") {
            Err(RocflError::Lock(id)) => assert_eq!("one", id),
            _ => panic!("Expected the lock to be unavailable"),
        }
    }

    #[test]
    fn release_lock_when_out_of_scope() {
        let manager = Arc::new(LockManager::new(Duration::from_secs(2)));

        let lock1 = manager.acquire("one").unwrap();

        let manager2 = manager.clone();
        let handle = thread::spawn(move || {
            let _lock1_again = manager2.acquire("one").unwrap();
        });

        thread::sleep(Duration::from_millis(20));
        drop(lock1);

        handle.join().unwrap();
    }
}
