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

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::ensure;

use crate::{CodecKind, Result, Timeout, error::InvalidConfigSnafu, file::with_suffix};

/// Queue file used when no path is configured, relative to the working
/// directory.
pub const DEFAULT_QUEUE_FILE: &str = "queue.fq";

/// Suffix appended to the queue path to form the lock-file path.
pub const DEFAULT_LOCK_SUFFIX: &str = ".lock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault)]
#[serde(default)]
pub struct QueueConfig {
    /// Path of the queue file.
    #[default(_code = "PathBuf::from(DEFAULT_QUEUE_FILE)")]
    pub path:                 PathBuf,
    /// Appended to `path` to derive the lock file.
    #[default(_code = "DEFAULT_LOCK_SUFFIX.to_string()")]
    pub lock_suffix:          String,
    /// Milliseconds between two lock acquisition attempts.
    #[default = 50]
    pub poll_interval_ms:     u64,
    /// Timeout used by `Queue::pop`, in the `-1 / 0 / N` seconds convention.
    #[default(-1)]
    pub default_timeout_secs: i64,
    pub codec:                CodecKind,
    /// `fsync` the queue file before it replaces the previous version.
    #[default = true]
    pub sync_on_write:        bool,
    /// Create an empty queue file when the queue is built.
    #[default = false]
    pub create_on_open:       bool,
}

impl QueueConfig {
    pub fn lock_path(&self) -> PathBuf { with_suffix(&self.path, &self.lock_suffix) }

    pub const fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }

    pub const fn default_timeout(&self) -> Timeout { Timeout::from_secs(self.default_timeout_secs) }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.path.as_os_str().is_empty(),
            InvalidConfigSnafu {
                reason: "queue path is empty",
            }
        );
        ensure!(
            !self.lock_suffix.is_empty(),
            InvalidConfigSnafu {
                reason: "lock suffix is empty, the lock file would be the queue file",
            }
        );
        ensure!(
            self.poll_interval_ms > 0,
            InvalidConfigSnafu {
                reason: "poll interval must be at least 1ms",
            }
        );
        Ok(())
    }
}
