// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cross-process advisory lock on a fixed lock-file path.
//!
//! Each acquisition opens its own handle to the lock file and takes an
//! exclusive `flock` (or `LockFileEx` on Windows) through [`fs2`]. Because the
//! lock belongs to the open handle, two threads of the same process contend
//! exactly like two processes do.
//!
//! The lock file may be unlinked by `Queue::delete` while other callers are
//! waiting on it. A waiter that then wins the lock would hold it on an
//! orphaned inode, so every successful attempt is re-validated against the
//! file currently at the lock path and retried when they differ.

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use fs2::FileExt;
use snafu::ResultExt;
use tracing::{trace, warn};

use crate::{
    Result, Timeout,
    error::{IoSnafu, LockTimeoutSnafu},
};

/// Default period between two acquisition attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Handle on a lock-file path. Cheap to clone, holds no OS resources.
#[derive(Debug, Clone)]
pub struct FileLock {
    path:          PathBuf,
    poll_interval: Duration,
}

impl FileLock {
    pub fn new<P: Into<PathBuf>>(path: P, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
        }
    }

    pub fn path(&self) -> &Path { &self.path }

    pub const fn poll_interval(&self) -> Duration { self.poll_interval }

    /// Acquire the lock, waiting according to `timeout`.
    ///
    /// The returned guard releases the lock when dropped.
    pub fn acquire(&self, timeout: Timeout) -> Result<LockGuard> {
        let started = Instant::now();
        let deadline = timeout.deadline(started);
        let mut attempts = 0_u32;

        loop {
            attempts += 1;
            if let Some(guard) = self.attempt()? {
                trace!(path = ?self.path, attempts, "Lock acquired");
                return Ok(guard);
            }

            let wait = match deadline {
                None => self.poll_interval,
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        warn!(path = ?self.path, %timeout, attempts, "Lock acquisition timed out");
                        return LockTimeoutSnafu {
                            path: &self.path,
                            timeout,
                        }
                        .fail();
                    }
                    remaining.min(self.poll_interval)
                }
            };

            trace!(path = ?self.path, ?wait, "Lock busy, retrying");
            thread::sleep(wait);
        }
    }

    /// Single attempt, equivalent to `acquire(Timeout::Immediate)`.
    pub fn try_acquire(&self) -> Result<LockGuard> { self.acquire(Timeout::Immediate) }

    /// Remove the lock file, tolerating its absence.
    ///
    /// Returns whether a file was actually removed.
    pub fn remove(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context(IoSnafu { path: &self.path }),
        }
    }

    /// One non-blocking attempt. `None` means another holder owns the lock.
    fn attempt(&self) -> Result<Option<LockGuard>> {
        loop {
            let file = self.open()?;

            match file.try_lock_exclusive() {
                Ok(()) => {}
                Err(e) if is_contended(&e) => return Ok(None),
                Err(e) => return Err(e).context(IoSnafu { path: &self.path }),
            }

            if is_current(&file, &self.path).context(IoSnafu { path: &self.path })? {
                return Ok(Some(LockGuard {
                    file,
                    path: self.path.clone(),
                    acquired_at: Instant::now(),
                }));
            }

            // The file was unlinked or replaced while we waited on it.
            trace!(path = ?self.path, "Locked a stale lock file, reopening");
        }
    }

    fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context(IoSnafu { path: parent })?;
        }

        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .context(IoSnafu { path: &self.path })
    }
}

/// Scoped ownership of the lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    file:        File,
    path:        PathBuf,
    acquired_at: Instant,
}

impl LockGuard {
    pub fn path(&self) -> &Path { &self.path }

    /// Time elapsed since the lock was obtained.
    pub fn held_for(&self) -> Duration { self.acquired_at.elapsed() }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Closing the handle releases the lock too.
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = ?self.path, error = %e, "Failed to unlock lock file");
        }
        trace!(path = ?self.path, held_for = ?self.held_for(), "Lock released");
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(unix)]
fn is_current(held: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = held.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

// Windows refuses to unlink a file with open handles, so the path cannot go
// stale underneath a holder.
#[cfg(not(unix))]
fn is_current(_held: &File, path: &Path) -> io::Result<bool> { path.try_exists() }
