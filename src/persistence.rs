//! ABOUTME: Cross-process file lock and atomic JSON load/save
//! ABOUTME: A missing or empty data file is an empty store; parse errors fail construction

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{FacetError, FacetResult};

/// Bounded retry policy for acquiring the cross-process file lock.
/// Defaults match `spec.md` §4.5: 3 attempts, 100ms apart, 3s total.
#[derive(Debug, Clone, Copy)]
pub struct LockRetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
    pub total_timeout: Duration,
}

impl Default for LockRetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            interval: Duration::from_millis(100),
            total_timeout: Duration::from_secs(3),
        }
    }
}

/// The on-disk envelope: documents plus store-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnDiskStore {
    #[serde(default)]
    pub documents: Vec<Document>,
    pub metadata: Metadata,
    /// Preserves anything this version of the crate doesn't know about,
    /// so round-tripping an unfamiliar file doesn't silently drop data.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub version: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

const SCHEMA_VERSION: &str = "1.0";

impl OnDiskStore {
    pub fn empty(now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            documents: Vec::new(),
            metadata: Metadata {
                version: SCHEMA_VERSION.to_string(),
                created_at: now,
                updated_at: now,
            },
            extra: serde_json::Map::new(),
        }
    }
}

/// Loads the data file at `path`. A missing or empty file is equivalent
/// to an empty store (`spec.md` §4.5); a present-but-unparsable file is a
/// hard `FacetError::Persistence`.
pub fn load(path: &Path, now: chrono::DateTime<chrono::Utc>) -> FacetResult<OnDiskStore> {
    match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Ok(OnDiskStore::empty(now)),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(OnDiskStore::empty(now)),
        Err(e) => Err(e.into()),
    }
}

/// Serializes `store` and atomically replaces `path`: write to a sibling
/// `.tmp` file, fsync, then rename over the target (atomic on POSIX-like
/// filesystems).
pub fn save(path: &Path, store: &OnDiskStore) -> FacetResult<()> {
    let tmp_path = tmp_path_for(path);
    {
        let mut file = File::create(&tmp_path)?;
        let bytes = serde_json::to_vec_pretty(store)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut lock = path.as_os_str().to_owned();
    lock.push(".lock");
    PathBuf::from(lock)
}

/// An acquired cross-process advisory lock on `<path>.lock`. Releases the
/// lock on drop; never held across a `List` call longer than the
/// snapshot read (`spec.md` §6).
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Acquires an exclusive lock, retrying per `policy` before giving up
    /// with `FacetError::LockTimeout`.
    pub fn acquire_exclusive(path: &Path, policy: &LockRetryPolicy) -> FacetResult<Self> {
        Self::acquire(path, policy, true)
    }

    /// Acquires a shared (reader) lock, same retry discipline.
    pub fn acquire_shared(path: &Path, policy: &LockRetryPolicy) -> FacetResult<Self> {
        Self::acquire(path, policy, false)
    }

    fn acquire(path: &Path, policy: &LockRetryPolicy, exclusive: bool) -> FacetResult<Self> {
        let lock_path = lock_path_for(path);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        let deadline = Instant::now() + policy.total_timeout;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = if exclusive {
                file.try_lock_exclusive()
            } else {
                file.try_lock_shared()
            };
            match result {
                Ok(()) => return Ok(Self { file }),
                Err(_) if attempt >= policy.attempts || Instant::now() >= deadline => {
                    tracing::warn!(attempts = attempt, "giving up on file lock acquisition");
                    return Err(FacetError::LockTimeout { attempts: attempt });
                }
                Err(_) => {
                    tracing::debug!(attempt, "file lock busy, retrying");
                    std::thread::sleep(policy.interval);
                }
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Best-effort removal of the lock file, called from `Store::close`. Not
/// required for correctness (advisory locks release on process exit/drop
/// regardless), purely tidiness.
pub fn remove_lock_file(path: &Path) {
    let lock_path = lock_path_for(path);
    let _ = fs::remove_file(lock_path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = load(&path, Utc::now()).unwrap();
        assert!(store.documents.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let now = Utc::now();
        let mut store = OnDiskStore::empty(now);
        store.documents.push(Document {
            uuid: uuid::Uuid::new_v4(),
            title: "hello".into(),
            body: "world".into(),
            created_at: now,
            updated_at: now,
            dimensions: serde_json::Map::new(),
        });
        save(&path, &store).unwrap();
        assert!(!dir.path().join("store.json.tmp").exists());
        let loaded = load(&path, now).unwrap();
        assert_eq!(loaded.documents.len(), 1);
        assert_eq!(loaded.documents[0].title, "hello");
    }

    #[test]
    fn exclusive_lock_blocks_a_second_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let policy = LockRetryPolicy {
            attempts: 2,
            interval: Duration::from_millis(10),
            total_timeout: Duration::from_millis(50),
        };
        let _held = FileLock::acquire_exclusive(&path, &policy).unwrap();
        let second = FileLock::acquire_exclusive(&path, &policy);
        assert!(matches!(second, Err(FacetError::LockTimeout { .. })));
    }
}
