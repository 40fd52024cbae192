//! Process-global named mutexes.
//!
//! AppSync rejects concurrent schema mutations on one GraphQL API with
//! `ConcurrentModificationException`. Resolver, function, type and schema
//! operations therefore take the lock named by
//! [`schema_mutex_key`](crate::appsync::schema_mutex_key) before calling AWS.
//! The locks only cover this process.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard, TryLockError};
use tracing::debug;

/// Registry of lazily created, per-key async mutexes.
#[derive(Debug, Clone, Default)]
pub struct NamedMutex(Arc<std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>>);

impl NamedMutex {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock named `key`. Released when the guard drops.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        debug!(key, "acquiring lock");
        let guard = self.key_mutex(key).lock_owned().await;
        debug!(key, "lock acquired");
        guard
    }

    /// Take the lock named `key` if nobody holds it.
    pub fn try_lock(&self, key: &str) -> Result<OwnedMutexGuard<()>, TryLockError> {
        self.key_mutex(key).try_lock_owned()
    }

    /// Number of keys ever locked.
    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no key was ever locked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key_mutex(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }
}

/// The registry shared by every client in this process.
pub fn global() -> &'static NamedMutex {
    static GLOBAL: OnceLock<NamedMutex> = OnceLock::new();
    GLOBAL.get_or_init(NamedMutex::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = NamedMutex::new();
        let guard = locks.lock("appsync-schema-abc").await;

        assert!(locks.try_lock("appsync-schema-abc").is_err());
        assert!(locks.try_lock("appsync-schema-def").is_ok());

        drop(guard);
        assert!(locks.try_lock("appsync-schema-abc").is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_serializes_concurrent_holders() {
        let locks = NamedMutex::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                tokio::spawn(async move {
                    let _guard = locks.lock("appsync-schema-abc").await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(global(), global()));
    }
}
