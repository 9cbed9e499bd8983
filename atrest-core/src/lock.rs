/*!
Advisory object locks serializing transforms on the same object path.

Every trigger runs as its own process, so exclusion lives in the filesystem:
a lock is a file under the lock directory, created with `create_new` so that
exactly one job can hold it, carrying a JSON record of who holds it and
since when. The record's timestamp is what makes a crashed holder
recoverable: a lock older than the configured staleness ceiling is
considered abandoned and may be stolen by the next acquirer.
*/

use crate::{AtRestError, Result};
use backoff::ExponentialBackoffBuilder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// On-disk record of a held lock.
#[derive(Debug, Serialize, Deserialize)]
struct LockRecord {
    token: Uuid,
    pid: u32,
    acquired_at: DateTime<Utc>,
    object: String,
}

/// Factory for per-object advisory locks.
#[derive(Debug, Clone)]
pub struct ObjectLock {
    lock_dir: PathBuf,
    timeout: Duration,
    stale_after: Duration,
}

impl ObjectLock {
    pub fn new<P: AsRef<Path>>(lock_dir: P, timeout: Duration, stale_after: Duration) -> Self {
        Self {
            lock_dir: lock_dir.as_ref().to_path_buf(),
            timeout,
            stale_after,
        }
    }

    /// Acquire the lock for `object_path`, waiting up to the configured
    /// timeout.
    ///
    /// Contention is polled with an exponential backoff (25ms doubling to a
    /// 250ms ceiling), which keeps rapid repeated triggers from starving each
    /// other while bounding the total wait. A lock that cannot be obtained in
    /// time fails the job with [`AtRestError::LockTimeout`] rather than
    /// proceeding unsafely.
    pub fn acquire<P: AsRef<Path>>(&self, object_path: P) -> Result<LockGuard> {
        let object_path = object_path.as_ref();
        fs::create_dir_all(&self.lock_dir)?;
        let lock_path = self.lock_file_for(object_path);
        let started = Instant::now();

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(25))
            .with_max_interval(Duration::from_millis(250))
            .with_max_elapsed_time(Some(self.timeout))
            .build();

        backoff::retry(policy, || {
            match self.try_acquire_once(object_path, &lock_path) {
                Ok(Some(guard)) => Ok(guard),
                Ok(None) => Err(backoff::Error::transient(AtRestError::LockTimeout {
                    path: object_path.display().to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                })),
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .map_err(|err| match err {
            backoff::Error::Permanent(e) => e,
            backoff::Error::Transient { err, .. } => err,
        })
    }

    /// One non-blocking attempt; `Ok(None)` means currently held elsewhere.
    fn try_acquire_once(&self, object_path: &Path, lock_path: &Path) -> Result<Option<LockGuard>> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)
        {
            Ok(mut file) => {
                let record = LockRecord {
                    token: Uuid::new_v4(),
                    pid: std::process::id(),
                    acquired_at: Utc::now(),
                    object: object_path.display().to_string(),
                };
                file.write_all(serde_json::to_string(&record)?.as_bytes())?;
                file.sync_all()?;
                debug!(
                    object = %object_path.display(),
                    lock = %lock_path.display(),
                    token = %record.token,
                    "acquired object lock"
                );
                Ok(Some(LockGuard {
                    lock_path: lock_path.to_path_buf(),
                    object: object_path.to_path_buf(),
                    token: record.token,
                    released: false,
                }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                self.break_if_stale(lock_path)?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the lock file if its holder has exceeded the staleness
    /// ceiling (crashed without releasing, or was killed by an external
    /// wall-clock timeout).
    fn break_if_stale(&self, lock_path: &Path) -> Result<()> {
        let age = match fs::read_to_string(lock_path) {
            Ok(contents) => match serde_json::from_str::<LockRecord>(&contents) {
                Ok(record) => Utc::now()
                    .signed_duration_since(record.acquired_at)
                    .to_std()
                    .unwrap_or_default(),
                // unreadable record: fall back to the file's mtime
                Err(_) => fs::metadata(lock_path)
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|mtime| mtime.elapsed().ok())
                    .unwrap_or_default(),
            },
            // released between our create attempt and this read
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if age >= self.stale_after {
            warn!(
                lock = %lock_path.display(),
                age_secs = age.as_secs(),
                ceiling_secs = self.stale_after.as_secs(),
                "breaking abandoned object lock"
            );
            match fs::remove_file(lock_path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Lock file name for an object: readable leaf name plus a digest of the
    /// canonical path, so differently-spelled paths to the same object
    /// collide and same-named objects in different collections do not.
    fn lock_file_for(&self, object_path: &Path) -> PathBuf {
        let key = fs::canonicalize(object_path)
            .unwrap_or_else(|_| object_path.to_path_buf())
            .display()
            .to_string();
        let digest = format!("{:x}", Sha256::digest(key.as_bytes()));
        let name = object_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "object".to_string());
        self.lock_dir.join(format!("{name}.{}.lock", &digest[..16]))
    }
}

/// A held object lock; released on drop, on every exit path.
#[derive(Debug)]
pub struct LockGuard {
    lock_path: PathBuf,
    object: PathBuf,
    token: Uuid,
    released: bool,
}

impl LockGuard {
    /// The object path this guard serializes.
    pub fn object(&self) -> &Path {
        &self.object
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match fs::read_to_string(&self.lock_path) {
            Ok(contents) => match serde_json::from_str::<LockRecord>(&contents) {
                Ok(record) if record.token == self.token => {
                    match fs::remove_file(&self.lock_path) {
                        Ok(()) => debug!(
                            object = %self.object.display(),
                            "released object lock"
                        ),
                        Err(e) => warn!(
                            lock = %self.lock_path.display(),
                            error = %e,
                            "failed to remove lock file on release"
                        ),
                    }
                }
                // our lock was stolen as stale; the file now belongs to the
                // current holder and must stay
                Ok(record) => warn!(
                    object = %self.object.display(),
                    current_holder_pid = record.pid,
                    "object lock was stolen before release; leaving it in place"
                ),
                Err(e) => warn!(
                    lock = %self.lock_path.display(),
                    error = %e,
                    "unreadable lock record on release; leaving it in place"
                ),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => warn!(
                object = %self.object.display(),
                "lock file already gone on release"
            ),
            Err(e) => warn!(
                lock = %self.lock_path.display(),
                error = %e,
                "failed to read lock record on release"
            ),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}
