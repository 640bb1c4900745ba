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

use std::{io, path::PathBuf};

use snafu::Snafu;

use crate::Timeout;

/// Boxed source error produced by a codec implementation.
pub type BoxedCodecError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Queue operation errors.
///
/// `LockTimeout`, `EmptyQueue` and `IndexOutOfRange` are the kinds callers
/// are expected to branch on. The remaining variants report storage or codec
/// failures.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueueError {
    /// The lock file could not be acquired within the caller's budget.
    #[snafu(display("Timed out after {timeout} waiting for lock {}", path.display()))]
    LockTimeout {
        path:    PathBuf,
        timeout: Timeout,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },

    /// `get` or `get_batch` on a queue holding no elements.
    #[snafu(display("Cannot get item from empty queue"))]
    EmptyQueue {
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    /// `get` with a position that does not resolve inside a non-empty queue.
    #[snafu(display("Position {position} is out of range for queue of size {len}"))]
    IndexOutOfRange {
        position: isize,
        len:      usize,
        #[snafu(implicit)]
        loc:      snafu::Location,
    },

    /// Filesystem I/O failure on the queue file or the lock file.
    #[snafu(display("IO error on {}", path.display()))]
    Io {
        path:   PathBuf,
        source: io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to encode queue with {codec} codec"))]
    Encode {
        codec:  &'static str,
        source: BoxedCodecError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to decode queue with {codec} codec"))]
    Decode {
        codec:  &'static str,
        source: BoxedCodecError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// The queue file exists but its envelope is damaged.
    #[snafu(display("Queue file {} is corrupted: {reason}", path.display()))]
    Corrupted {
        path:   PathBuf,
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Unsupported queue file version: {version}"))]
    UnsupportedVersion {
        version: u16,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },

    /// The file was written by a different codec than the one configured.
    #[snafu(display("Codec mismatch: store uses codec id {expected}, file has {found}"))]
    CodecMismatch {
        expected: u8,
        found:    u8,
        #[snafu(implicit)]
        loc:      snafu::Location,
    },

    #[snafu(display("Invalid queue configuration: {reason}"))]
    InvalidConfig {
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

impl QueueError {
    pub const fn is_lock_timeout(&self) -> bool { matches!(self, Self::LockTimeout { .. }) }

    pub const fn is_empty_queue(&self) -> bool { matches!(self, Self::EmptyQueue { .. }) }

    pub const fn is_index_out_of_range(&self) -> bool {
        matches!(self, Self::IndexOutOfRange { .. })
    }
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
