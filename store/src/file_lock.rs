//! Exclusive lock on the queue file via a sidecar marker, per spec §4.1.
//!
//! The marker is a small JSON file written next to the queue
//! (`tasks.json.lock`) naming the holder's pid and hostname. Acquisition
//! polls for the marker to disappear; a marker is considered stale — and
//! force-removed — once its holder process is no longer alive or it is
//! older than [`STALE_AFTER`], whichever is detected first.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, System};
use tokio::time::sleep;
use workflow_core::error::{Result, WorkflowError};

/// Default time `FileLock::acquire` spends polling before giving up.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// A marker older than this is treated as stale regardless of whether its
/// holder process is still alive.
pub const STALE_AFTER: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Serialize, Deserialize)]
struct LockMarker {
    pid: u32,
    hostname: String,
    acquired_at: DateTime<Utc>,
}

/// A held lock on `path`'s sidecar marker. Dropping it does **not** release
/// the marker — call [`FileLock::release`] or go through
/// [`FileLock::with_lock`], which always releases even if the closure
/// fails.
pub struct FileLock {
    marker_path: PathBuf,
}

impl FileLock {
    /// The marker path this lock guards, derived as `<path>.lock`.
    pub fn marker_path_for(queue_path: &Path) -> PathBuf {
        let mut os = queue_path.as_os_str().to_owned();
        os.push(".lock");
        PathBuf::from(os)
    }

    /// Acquire the lock on `queue_path`'s marker, polling up to `timeout`.
    /// Fails with [`WorkflowError::LockTimeout`] if the marker is still
    /// held (by a live, non-stale holder) when the timeout elapses.
    pub async fn acquire(queue_path: &Path, timeout: Duration) -> Result<Self> {
        let marker_path = Self::marker_path_for(queue_path);
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match Self::try_create_marker(&marker_path).await {
                Ok(()) => return Ok(FileLock { marker_path }),
                Err(_) => {
                    if Self::reap_if_stale(&marker_path).await {
                        continue;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        return Err(WorkflowError::LockTimeout {
                            path: marker_path.display().to_string(),
                        });
                    }
                    sleep(POLL_INTERVAL).await;
                }
            }
        }
    }

    /// Acquire with the spec-default 5 second timeout.
    pub async fn acquire_default(queue_path: &Path) -> Result<Self> {
        Self::acquire(queue_path, DEFAULT_TIMEOUT).await
    }

    /// Run `f` under the lock, releasing the marker whether or not `f`
    /// succeeds.
    pub async fn with_lock<F, Fut, T>(queue_path: &Path, timeout: Duration, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let lock = Self::acquire(queue_path, timeout).await?;
        let result = f().await;
        lock.release().await;
        result
    }

    /// Remove the marker, releasing the lock.
    pub async fn release(self) {
        let _ = tokio::fs::remove_file(&self.marker_path).await;
    }

    async fn try_create_marker(marker_path: &Path) -> std::io::Result<()> {
        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(marker_path)
            .await?;
        let marker = LockMarker {
            pid: std::process::id(),
            hostname: hostname(),
            acquired_at: Utc::now(),
        };
        let body = serde_json::to_vec(&marker).unwrap_or_default();
        file.write_all(&body).await?;
        Ok(())
    }

    /// Force-remove `marker_path` if it names a dead process or is older
    /// than [`STALE_AFTER`]. Returns `true` if it removed anything.
    async fn reap_if_stale(marker_path: &Path) -> bool {
        let Ok(bytes) = tokio::fs::read(marker_path).await else {
            return false;
        };
        let Ok(meta) = tokio::fs::metadata(marker_path).await else {
            return false;
        };
        let age_stale = meta
            .modified()
            .ok()
            .and_then(|m| m.elapsed().ok())
            .map(|age| age > STALE_AFTER)
            .unwrap_or(false);

        let holder_dead = match serde_json::from_slice::<LockMarker>(&bytes) {
            Ok(marker) => !process_alive(marker.pid),
            Err(_) => true, // unreadable marker: treat as stale garbage
        };

        if age_stale || holder_dead {
            let _ = tokio::fs::remove_file(marker_path).await;
            true
        } else {
            false
        }
    }
}

fn process_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes();
    system.process(Pid::from_u32(pid)).is_some()
}

fn hostname() -> String {
    System::host_name().unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn acquire_then_release_allows_reacquire() {
        let dir = tempdir().unwrap();
        let queue_path = dir.path().join("tasks.json");
        let lock = FileLock::acquire_default(&queue_path).await.unwrap();
        lock.release().await;
        let lock2 = FileLock::acquire(&queue_path, Duration::from_millis(200))
            .await
            .unwrap();
        lock2.release().await;
    }

    #[tokio::test]
    async fn concurrent_acquire_times_out() {
        let dir = tempdir().unwrap();
        let queue_path = dir.path().join("tasks.json");
        let _held = FileLock::acquire_default(&queue_path).await.unwrap();
        let err = FileLock::acquire(&queue_path, Duration::from_millis(150))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::LockTimeout { .. }));
    }

    #[tokio::test]
    async fn stale_marker_with_dead_pid_is_reaped() {
        let dir = tempdir().unwrap();
        let queue_path = dir.path().join("tasks.json");
        let marker_path = FileLock::marker_path_for(&queue_path);
        let fake = LockMarker {
            pid: 999_999, // exceedingly unlikely to be a live pid
            hostname: "nowhere".into(),
            acquired_at: Utc::now(),
        };
        tokio::fs::write(&marker_path, serde_json::to_vec(&fake).unwrap())
            .await
            .unwrap();
        let lock = FileLock::acquire(&queue_path, Duration::from_millis(500))
            .await
            .unwrap();
        lock.release().await;
    }

    #[tokio::test]
    async fn with_lock_releases_on_error() {
        let dir = tempdir().unwrap();
        let queue_path = dir.path().join("tasks.json");
        let result: Result<()> = FileLock::with_lock(&queue_path, DEFAULT_TIMEOUT, || async {
            Err(WorkflowError::Validation("boom".into()))
        })
        .await;
        assert!(result.is_err());
        // Lock must have been released despite the failure.
        let lock = FileLock::acquire(&queue_path, Duration::from_millis(200))
            .await
            .unwrap();
        lock.release().await;
    }
}
