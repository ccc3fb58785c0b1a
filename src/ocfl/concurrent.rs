use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Mutex;

use crate::ocfl::error::Result;

/// Runs `task` over every item in `items`, using up to `limit` threads at once. If any
/// invocation of `task` fails, the remaining, not-yet-started items are abandoned, the executor
/// waits for whatever is already in flight to finish, and the first error encountered is
/// returned. Completion order is not preserved.
pub fn for_each<T, F>(items: impl IntoIterator<Item = T>, limit: usize, task: F) -> Result<()>
where
    T: Send,
    F: Fn(T) -> Result<()> + Sync,
{
    let limit = limit.max(1);
    let cancelled = AtomicBool::new(false);
    let first_error: Mutex<Option<crate::ocfl::RocflError>> = Mutex::new(None);
    let (work_tx, work_rx) = mpsc::sync_channel::<T>(limit);
    let work_rx = Mutex::new(work_rx);

    std::thread::scope(|scope| {
        for _ in 0..limit {
            scope.spawn(|| loop {
                if cancelled.load(Ordering::Acquire) {
                    break;
                }

                let item = match work_rx.lock().unwrap().recv() {
                    Ok(item) => item,
                    Err(_) => break,
                };

                if let Err(e) = task(item) {
                    let mut first_error = first_error.lock().unwrap();
                    if first_error.is_none() {
                        *first_error = Some(e);
                    }
                    cancelled.store(true, Ordering::Release);
                }
            });
        }

        for item in items {
            if cancelled.load(Ordering::Acquire) {
                break;
            }
            if work_tx.send(item).is_err() {
                break;
            }
        }

        drop(work_tx);
    });

    match first_error.into_inner().unwrap() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Runs `task` over every item in `items`, using up to `limit` threads at once, and returns the
/// results in the order they completed, not the order of `items`. Behaves like `for_each` on
/// failure: the first error wins and every other result is discarded.
pub fn map<T, R, F>(items: impl IntoIterator<Item = T>, limit: usize, task: F) -> Result<Vec<R>>
where
    T: Send,
    R: Send,
    F: Fn(T) -> Result<R> + Sync,
{
    let limit = limit.max(1);
    let cancelled = AtomicBool::new(false);
    let first_error: Mutex<Option<crate::ocfl::RocflError>> = Mutex::new(None);
    let (work_tx, work_rx) = mpsc::sync_channel::<T>(limit);
    let work_rx = Mutex::new(work_rx);
    let (result_tx, result_rx) = mpsc::channel::<R>();

    std::thread::scope(|scope| {
        for _ in 0..limit {
            let result_tx = result_tx.clone();
            let cancelled = &cancelled;
            let first_error = &first_error;
            let work_rx = &work_rx;
            let task = &task;

            scope.spawn(move || loop {
                if cancelled.load(Ordering::Acquire) {
                    break;
                }

                let item = match work_rx.lock().unwrap().recv() {
                    Ok(item) => item,
                    Err(_) => break,
                };

                match task(item) {
                    Ok(result) => {
                        let _ = result_tx.send(result);
                    }
                    Err(e) => {
                        let mut first_error = first_error.lock().unwrap();
                        if first_error.is_none() {
                            *first_error = Some(e);
                        }
                        cancelled.store(true, Ordering::Release);
                    }
                }
            });
        }
        drop(result_tx);

        for item in items {
            if cancelled.load(Ordering::Acquire) {
                break;
            }
            if work_tx.send(item).is_err() {
                break;
            }
        }

        drop(work_tx);
    });

    match first_error.into_inner().unwrap() {
        Some(e) => Err(e),
        None => Ok(result_rx.into_iter().collect()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::ocfl::RocflError;

    #[test]
    fn for_each_runs_every_item() {
        let counter = AtomicUsize::new(0);
        for_each(0..100, 4, |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        assert_eq!(100, counter.load(Ordering::SeqCst));
    }

    #[test]
    fn for_each_propagates_first_error() {
        let result = for_each(0..10, 4, |i| {
            if i == 5 {
                Err(RocflError::General("boom".to_string()))
            } else {
                Ok(())
            }
        });

        assert!(result.is_err());
    }

    #[test]
    fn map_collects_every_result() {
        let mut results = map(0..50, 8, |i| Ok(i * 2)).unwrap();
        results.sort_unstable();
        let expected: Vec<i32> = (0..50).map(|i| i * 2).collect();
        assert_eq!(expected, results);
    }

    #[test]
    fn map_propagates_first_error() {
        let result: Result<Vec<i32>> = map(0..10, 4, |i| {
            if i == 3 {
                Err(RocflError::General("boom".to_string()))
            } else {
                Ok(i)
            }
        });

        assert!(result.is_err());
    }
}
