//! Locking and atomic file operations for glaura
//!
//! - Per-key async locks that serialize roll-ups for one header or service
//! - Atomic write pattern (write temp + rename) for the session file

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::Result;

/// A set of async mutexes addressed by string key.
///
/// Holders of the same key run one at a time; different keys do not
/// contend. Entries are pruned once no guard or waiter references them.
#[derive(Debug, Default)]
pub struct KeyLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Guard for a key; the lock is released when dropped.
pub struct KeyGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: &str) -> KeyGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(
                slots
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        KeyGuard {
            key: key.to_string(),
            _guard: slot.lock_owned().await,
        }
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .values()
            .filter(|slot| Arc::strong_count(slot) > 1)
            .count()
    }
}

/// Replace `path` with `data` in one step.
///
/// The temp file sits next to the target so the rename stays on one
/// filesystem. On unix the file is created owner-only since it may hold a
/// bearer token. A failed write leaves the previous contents in place.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));

    let written = create_private(&temp_path).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });
    if let Err(err) = written.and_then(|()| fs::rename(&temp_path, path)) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<File> {
    File::create(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("session.json");

        write_atomic(&file_path, b"{\"token\":\"a\"}").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{\"token\":\"a\"}");

        write_atomic(&file_path, b"{\"token\":\"b\"}").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{\"token\":\"b\"}");
    }

    #[cfg(unix)]
    #[test]
    fn atomic_write_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("nested").join("session.json");
        write_atomic(&file_path, b"{}").unwrap();

        let mode = fs::metadata(&file_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(fs::read_dir(file_path.parent().unwrap()).unwrap().count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(KeyLocks::new());
        let in_lock = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let in_lock = Arc::clone(&in_lock);
            let max_concurrent = Arc::clone(&max_concurrent);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("header:h1").await;
                let current = in_lock.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_lock.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let locks = KeyLocks::new();
        let first = locks.acquire("header:h1").await;
        let second = tokio::time::timeout(Duration::from_millis(200), locks.acquire("header:h2"))
            .await
            .expect("second key acquired while first held");
        assert_eq!(first.key(), "header:h1");
        assert_eq!(second.key(), "header:h2");
        assert_eq!(locks.tracked(), 2);
    }
}
