use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use orion_error::StructError;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use orc_plan::Task;

use crate::error::{CoreReason, CoreResult};

// ---------------------------------------------------------------------------
// Package Guard — runtime mutual exclusion over Go-style package paths.
// ---------------------------------------------------------------------------

/// Extract the package path set for a task: the directory portion of every
/// declared file ending in `.go`, deduplicated.
pub fn package_set_for(task: &Task) -> Vec<PathBuf> {
    task.package_set()
}

struct GuardState {
    /// Package path currently held, mapped to the holding task id.
    held_by: HashMap<PathBuf, String>,
    /// FIFO queue of task ids waiting on each package.
    waiters: HashMap<PathBuf, VecDeque<String>>,
}

struct PackageGuardInner {
    state: Mutex<GuardState>,
    notify: Notify,
}

impl PackageGuardInner {
    fn release(&self, task_id: &str, packages: &[PathBuf]) {
        let mut state = self.state.lock().expect("package guard state poisoned");
        for package in packages {
            if state.held_by.get(package).map(String::as_str) == Some(task_id) {
                state.held_by.remove(package);
            }
        }
        drop(state);
        self.notify.notify_waiters();
    }

    /// Drop `task_id` from `package`'s FIFO wait queue without touching
    /// `held_by`. Used when a waiter is cancelled so it doesn't stay stuck
    /// at the front of the queue forever.
    fn remove_waiter(&self, task_id: &str, package: &Path) {
        let mut state = self.state.lock().expect("package guard state poisoned");
        if let Some(queue) = state.waiters.get_mut(package) {
            queue.retain(|id| id != task_id);
            if queue.is_empty() {
                state.waiters.remove(package);
            }
        }
        drop(state);
        self.notify.notify_waiters();
    }
}

/// A handle to acquired packages; dropping it releases them.
pub struct PackageLease {
    guard: Arc<PackageGuardInner>,
    task_id: String,
    packages: Vec<PathBuf>,
}

impl Drop for PackageLease {
    fn drop(&mut self) {
        self.guard.release(&self.task_id, &self.packages);
    }
}

impl PackageLease {
    /// Explicitly release early instead of waiting for `Drop`.
    pub fn release(self) {
        drop(self);
    }
}

/// Process-wide lock manager keyed by Go package directory path.
///
/// Fairness is FIFO per package: a waiting task is queued behind whoever
/// already holds or is waiting on that package. A task declaring no
/// packages acquires trivially.
#[derive(Clone)]
pub struct PackageGuard {
    inner: Arc<PackageGuardInner>,
}

impl Default for PackageGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageGuard {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PackageGuardInner {
                state: Mutex::new(GuardState {
                    held_by: HashMap::new(),
                    waiters: HashMap::new(),
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Acquire every package in `packages` for `task_id`, ordered to avoid
    /// deadlock between tasks that contend on overlapping package sets.
    /// Blocks until all are free, respecting `cancel`.
    pub async fn acquire(
        &self,
        task_id: &str,
        packages: &[PathBuf],
        cancel: &CancellationToken,
    ) -> CoreResult<PackageLease> {
        let mut ordered = packages.to_vec();
        ordered.sort();
        ordered.dedup();

        for package in &ordered {
            loop {
                // Constructed while `state` is still locked: `Notify::notified()`
                // captures any `notify_waiters()` call racing with the lock
                // release below, so a concurrent `release()` can never be
                // missed between unlocking here and awaiting it.
                let notified;
                {
                    let mut state = self.inner.state.lock().expect("package guard state poisoned");
                    let free = !state.held_by.contains_key(package);
                    let front_is_us = state
                        .waiters
                        .get(package)
                        .and_then(|q| q.front())
                        .map(|id| id == task_id)
                        .unwrap_or(true);
                    if free && front_is_us {
                        state.held_by.insert(package.clone(), task_id.to_string());
                        if let Some(q) = state.waiters.get_mut(package) {
                            q.pop_front();
                            if q.is_empty() {
                                state.waiters.remove(package);
                            }
                        }
                        break;
                    }
                    let queue = state.waiters.entry(package.clone()).or_default();
                    if !queue.contains(&task_id.to_string()) {
                        queue.push_back(task_id.to_string());
                    }
                    notified = self.inner.notify.notified();
                }

                tokio::select! {
                    _ = notified => {}
                    _ = cancel.cancelled() => {
                        self.inner.remove_waiter(task_id, package);
                        self.inner.release(task_id, &ordered);
                        return StructError::from(CoreReason::PackageContention)
                            .with_detail(format!(
                                "task {task_id}: cancelled while waiting for package {package:?}"
                            ))
                            .err();
                    }
                }
            }
        }

        Ok(PackageLease {
            guard: Arc::clone(&self.inner),
            task_id: task_id.to_string(),
            packages: ordered,
        })
    }

    /// Non-blocking variant: acquires all requested packages or none.
    pub fn try_acquire(&self, task_id: &str, packages: &[PathBuf]) -> Option<PackageLease> {
        let mut ordered = packages.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut state = self.inner.state.lock().expect("package guard state poisoned");
        let all_free = ordered.iter().all(|p| !state.held_by.contains_key(p));
        if !all_free {
            return None;
        }
        for package in &ordered {
            state.held_by.insert(package.clone(), task_id.to_string());
        }
        drop(state);

        Some(PackageLease {
            guard: Arc::clone(&self.inner),
            task_id: task_id.to_string(),
            packages: ordered,
        })
    }

    pub fn is_held(&self, package: &Path) -> bool {
        self.inner
            .state
            .lock()
            .expect("package guard state poisoned")
            .held_by
            .contains_key(package)
    }

    pub fn holder(&self, package: &Path) -> Option<String> {
        self.inner
            .state
            .lock()
            .expect("package guard state poisoned")
            .held_by
            .get(package)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_conflicting_tasks_both_acquire() {
        let guard = PackageGuard::new();
        let cancel = CancellationToken::new();
        let a = guard
            .acquire("t1", &[PathBuf::from("pkg/a")], &cancel)
            .await
            .unwrap();
        let b = guard
            .acquire("t2", &[PathBuf::from("pkg/b")], &cancel)
            .await
            .unwrap();
        assert!(guard.is_held(&PathBuf::from("pkg/a")));
        assert!(guard.is_held(&PathBuf::from("pkg/b")));
        drop(a);
        drop(b);
    }

    #[test]
    fn try_acquire_fails_when_held() {
        let guard = PackageGuard::new();
        let lease = guard.try_acquire("t1", &[PathBuf::from("pkg/a")]).unwrap();
        assert!(guard.try_acquire("t2", &[PathBuf::from("pkg/a")]).is_none());
        drop(lease);
    }

    #[tokio::test]
    async fn no_packages_acquires_trivially() {
        let guard = PackageGuard::new();
        let cancel = CancellationToken::new();
        let lease = guard.acquire("t1", &[], &cancel).await.unwrap();
        drop(lease);
    }

    #[tokio::test]
    async fn release_wakes_waiter() {
        let guard = PackageGuard::new();
        let cancel = CancellationToken::new();
        let lease = guard
            .acquire("t1", &[PathBuf::from("pkg/a")], &cancel)
            .await
            .unwrap();

        let guard2 = guard.clone();
        let cancel2 = cancel.clone();
        let waiter = tokio::spawn(async move {
            guard2
                .acquire("t2", &[PathBuf::from("pkg/a")], &cancel2)
                .await
                .unwrap()
        });

        tokio::task::yield_now().await;
        drop(lease);
        let lease2 = waiter.await.unwrap();
        assert_eq!(guard.holder(&PathBuf::from("pkg/a")), Some("t2".to_string()));
        drop(lease2);
    }

    #[tokio::test]
    async fn cancelled_waiter_does_not_block_later_arrivals() {
        let guard = PackageGuard::new();
        let cancel = CancellationToken::new();
        let lease = guard
            .acquire("t1", &[PathBuf::from("pkg/a")], &cancel)
            .await
            .unwrap();

        let guard2 = guard.clone();
        let cancel2 = CancellationToken::new();
        let cancel2_trigger = cancel2.clone();
        let cancelled_waiter = tokio::spawn(async move {
            guard2
                .acquire("t2", &[PathBuf::from("pkg/a")], &cancel2)
                .await
        });
        tokio::task::yield_now().await;
        cancel2_trigger.cancel();
        assert!(cancelled_waiter.await.unwrap().is_err());

        drop(lease);

        let guard3 = guard.clone();
        let cancel3 = CancellationToken::new();
        let lease3 = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            guard3.acquire("t3", &[PathBuf::from("pkg/a")], &cancel3),
        )
        .await
        .expect("t3 should not be stuck behind the cancelled waiter")
        .unwrap();
        assert_eq!(guard.holder(&PathBuf::from("pkg/a")), Some("t3".to_string()));
        drop(lease3);
    }
}
