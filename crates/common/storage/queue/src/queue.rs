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

//! The file-backed queue store.
//!
//! The [`Queue`] binds a queue file path and its derived lock path. It keeps
//! no state between calls: every operation
//! - acquires the file lock with the caller's [`Timeout`]
//! - loads the whole sequence (a missing file reads as empty)
//! - applies the operation in memory
//! - writes the whole sequence back if it changed anything
//! - releases the lock when the guard drops
//!
//! Any number of processes, or threads of one process, may bind the same
//! path. Operations serialize on the lock.
//!
//! ## Usage
//!
//! ```ignore
//! let queue: Queue<String> = Queue::open("/tmp/jobs.fq");
//!
//! queue.put("first".to_string(), Timeout::Infinite)?;
//! queue.put_batch(vec!["second".into(), "third".into()], Timeout::from_secs(5))?;
//!
//! assert_eq!(queue.get(-1, Timeout::Infinite)?, "third");
//! assert_eq!(queue.get_batch(10, Timeout::Immediate)?, vec!["first", "second"]);
//! ```

use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use snafu::OptionExt;
use tracing::{debug, info, warn};

use crate::{
    Codec, CodecKind, QueueConfig, Result, Timeout,
    error::{EmptyQueueSnafu, IndexOutOfRangeSnafu},
    file::QueueFile,
    format::{decode_envelope, encode_envelope},
    lock::FileLock,
};

/// A persistent FIFO of `T` stored in a single file.
///
/// `Queue` holds only paths and a codec, so it is `Send + Sync` and may be
/// shared freely. Each call still goes through the cross-process lock.
pub struct Queue<T, C = CodecKind> {
    /// Configuration the queue was built from.
    config:  QueueConfig,
    /// The queue file itself.
    file:    QueueFile,
    /// Lock guarding `file` across processes.
    lock:    FileLock,
    /// Payload encoding.
    codec:   C,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Queue<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Bind to `path` with default settings. Performs no I/O.
    pub fn open<P: Into<PathBuf>>(path: P) -> Self {
        let config = QueueConfig {
            path: path.into(),
            ..Default::default()
        };
        let codec = config.codec;
        Self::bind(config, codec)
    }

    /// Build from a configuration, using the codec it selects.
    pub fn with_config(config: QueueConfig) -> Result<Self> {
        let codec = config.codec;
        Self::with_codec(config, codec)
    }
}

impl<T, C> Queue<T, C>
where
    T: Serialize + DeserializeOwned,
    C: Codec,
{
    /// Build from a configuration with a custom codec.
    ///
    /// The `codec` field of `config` is ignored.
    pub fn with_codec(config: QueueConfig, codec: C) -> Result<Self> {
        config.validate()?;
        let queue = Self::bind(config, codec);
        if queue.config.create_on_open {
            queue.init(queue.config.default_timeout())?;
        }
        Ok(queue)
    }

    fn bind(config: QueueConfig, codec: C) -> Self {
        let file = QueueFile::new(config.path.clone(), config.sync_on_write);
        let lock = FileLock::new(config.lock_path(), config.poll_interval());
        Self {
            config,
            file,
            lock,
            codec,
            _marker: PhantomData,
        }
    }

    /// Create an empty queue file if none exists. Existing contents are kept.
    pub fn init(&self, timeout: Timeout) -> Result<()> {
        let _guard = self.lock.acquire(timeout)?;
        if !self.file.exists()? {
            self.save(&[])?;
            info!(path = ?self.file.path(), "Queue file created");
        }
        Ok(())
    }

    /// Append `item` to the tail.
    pub fn put(&self, item: T, timeout: Timeout) -> Result<()> {
        let _guard = self.lock.acquire(timeout)?;
        let mut items = self.load()?;
        items.push(item);
        self.save(&items)?;
        debug!(path = ?self.file.path(), op = "put", len = items.len(), "Queue updated");
        Ok(())
    }

    /// Append all `batch` items, in order, in one load/persist cycle.
    pub fn put_batch<I>(&self, batch: I, timeout: Timeout) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        let _guard = self.lock.acquire(timeout)?;
        let mut items = self.load()?;
        let before = items.len();
        items.extend(batch);
        self.save(&items)?;
        debug!(
            path = ?self.file.path(),
            op = "put_batch",
            added = items.len() - before,
            len = items.len(),
            "Queue updated"
        );
        Ok(())
    }

    /// Remove and return the item at `position`.
    ///
    /// `0` is the head, `-1` the tail; negative positions count from the end.
    pub fn get(&self, position: isize, timeout: Timeout) -> Result<T> {
        let _guard = self.lock.acquire(timeout)?;
        let mut items = self.load()?;
        snafu::ensure!(!items.is_empty(), EmptyQueueSnafu);

        let len = items.len();
        let index =
            resolve_position(position, len).context(IndexOutOfRangeSnafu { position, len })?;
        let item = items.remove(index);
        self.save(&items)?;
        debug!(path = ?self.file.path(), op = "get", position, len = items.len(), "Queue updated");
        Ok(item)
    }

    /// Remove and return the head using the configured default timeout.
    pub fn pop(&self) -> Result<T> { self.get(0, self.default_timeout()) }

    /// Remove up to `batch_size` items from the head, in FIFO order.
    ///
    /// Returns fewer items when the queue is shorter. Fails with
    /// `EmptyQueue` when there was nothing to take.
    pub fn get_batch(&self, batch_size: usize, timeout: Timeout) -> Result<Vec<T>> {
        let _guard = self.lock.acquire(timeout)?;
        let mut items = self.load()?;
        snafu::ensure!(!items.is_empty(), EmptyQueueSnafu);

        let take = batch_size.min(items.len());
        let batch: Vec<T> = items.drain(..take).collect();
        self.save(&items)?;
        debug!(
            path = ?self.file.path(),
            op = "get_batch",
            taken = batch.len(),
            len = items.len(),
            "Queue updated"
        );
        Ok(batch)
    }

    /// Snapshot of every item, head first. The queue is left untouched.
    pub fn get_all(&self, timeout: Timeout) -> Result<Vec<T>> {
        let _guard = self.lock.acquire(timeout)?;
        self.load()
    }

    /// Remove and return every item in one critical section.
    pub fn drain(&self, timeout: Timeout) -> Result<Vec<T>> {
        let _guard = self.lock.acquire(timeout)?;
        let items = self.load()?;
        self.save(&[])?;
        debug!(path = ?self.file.path(), op = "drain", taken = items.len(), "Queue updated");
        Ok(items)
    }

    pub fn size(&self, timeout: Timeout) -> Result<usize> {
        let _guard = self.lock.acquire(timeout)?;
        Ok(self.load()?.len())
    }

    pub fn is_empty(&self, timeout: Timeout) -> Result<bool> { Ok(self.size(timeout)? == 0) }

    /// Replace the contents with an empty sequence.
    pub fn clear(&self, timeout: Timeout) -> Result<()> {
        let _guard = self.lock.acquire(timeout)?;
        self.save(&[])?;
        debug!(path = ?self.file.path(), op = "clear", "Queue updated");
        Ok(())
    }

    /// Remove the queue file and, best effort, the lock file.
    ///
    /// Later operations on the same path see a fresh empty queue.
    pub fn delete(&self, timeout: Timeout) -> Result<()> {
        let guard = self.lock.acquire(timeout)?;
        let existed = self.file.remove()?;

        // Unlink while still holding the lock; waiters re-validate the path.
        if let Err(e) = self.lock.remove() {
            warn!(path = ?self.lock.path(), error = %e, "Failed to remove lock file");
        }
        drop(guard);

        info!(path = ?self.file.path(), existed, "Queue deleted");
        Ok(())
    }

    pub fn path(&self) -> &Path { self.file.path() }

    pub fn lock_path(&self) -> &Path { self.lock.path() }

    pub const fn config(&self) -> &QueueConfig { &self.config }

    pub const fn default_timeout(&self) -> Timeout { self.config.default_timeout() }

    /// Must be called with the lock held.
    fn load(&self) -> Result<Vec<T>> {
        match self.file.read()? {
            None => Ok(Vec::new()),
            Some(data) if data.is_empty() => Ok(Vec::new()),
            Some(data) => {
                let payload = decode_envelope(self.file.path(), self.codec.id(), &data)?;
                self.codec.decode(payload)
            }
        }
    }

    /// Must be called with the lock held.
    fn save(&self, items: &[T]) -> Result<()> {
        let payload = self.codec.encode(items)?;
        self.file
            .replace(&encode_envelope(self.codec.id(), &payload))
    }
}

impl<T, C> std::fmt::Debug for Queue<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("path", &self.file.path())
            .field("lock_path", &self.lock.path())
            .finish_non_exhaustive()
    }
}

/// Map a possibly negative `position` onto `0..len`.
pub(crate) fn resolve_position(position: isize, len: usize) -> Option<usize> {
    let offset = position.unsigned_abs();
    if position >= 0 {
        (offset < len).then_some(offset)
    } else {
        len.checked_sub(offset)
    }
}
