//! Per-repository run lock
//!
//! Write stages hold `repos/<repo>/meta/.lock` for their whole run so two
//! pipeline invocations cannot interleave writes into the same doc tree.
//! The file stores the Unix timestamp of acquisition; a lock older than the
//! configured window is treated as left behind by a killed run.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("repository is locked by another run (lock file: {0})")]
    Held(PathBuf),
    #[error("failed to create lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Exclusive lock on one repository's document tree, released on drop
#[derive(Debug)]
pub struct RepoLock {
    lock_path: PathBuf,
}

impl RepoLock {
    /// Acquire the lock in `meta_dir`, replacing a stale one
    pub fn acquire(meta_dir: &Path, stale_after_secs: u64) -> Result<Self, LockError> {
        let lock_path = meta_dir.join(".lock");
        let io_err = |source| LockError::Io {
            path: lock_path.clone(),
            source,
        };

        fs::create_dir_all(meta_dir).map_err(io_err)?;

        if lock_path.exists() {
            if Self::is_stale(&lock_path, stale_after_secs) {
                warn!("removing stale lock {:?}", lock_path);
                match fs::remove_file(&lock_path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(io_err(e)),
                }
            } else {
                return Err(LockError::Held(lock_path));
            }
        }

        // The timestamp is written before the lock becomes visible, so no
        // other acquirer ever reads a half-written lock.
        let tmp_path = meta_dir.join(format!(".lock.{}.tmp", std::process::id()));
        let mut tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(io_err)?;
        tmp.write_all(now_secs().to_string().as_bytes())
            .and_then(|_| tmp.sync_all())
            .map_err(io_err)?;
        drop(tmp);

        let linked = fs::hard_link(&tmp_path, &lock_path);
        let _ = fs::remove_file(&tmp_path);
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(LockError::Held(lock_path));
            }
            Err(e) => return Err(io_err(e)),
        }

        debug!("acquired {:?}", lock_path);
        Ok(Self { lock_path })
    }

    /// A lock is stale when its timestamp is older than the window.
    ///
    /// Without a readable timestamp the file's modification time is used
    /// instead, so a lock is never taken over while it is still fresh.
    pub fn is_stale(lock_path: &Path, stale_after_secs: u64) -> bool {
        let stamped = fs::read_to_string(lock_path)
            .ok()
            .and_then(|content| content.trim().parse::<u64>().ok());

        let acquired_at = match stamped {
            Some(ts) => ts,
            None => match modified_secs(lock_path) {
                Some(ts) => ts,
                None => return !lock_path.exists(),
            },
        };

        now_secs().saturating_sub(acquired_at) > stale_after_secs
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

fn modified_secs(path: &Path) -> Option<u64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(modified.duration_since(UNIX_EPOCH).ok()?.as_secs())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}
