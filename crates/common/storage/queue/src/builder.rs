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

use serde::{Serialize, de::DeserializeOwned};

use crate::{Codec, CodecKind, Queue, QueueConfig, Result, Timeout};

pub struct QueueBuilder {
    config: QueueConfig,
}

impl QueueBuilder {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config: QueueConfig {
                path: path.into(),
                ..Default::default()
            },
        }
    }

    pub fn lock_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.config.lock_suffix = suffix.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Timeout used by [`Queue::pop`].
    pub fn default_timeout(mut self, timeout: Timeout) -> Self {
        self.config.default_timeout_secs = match timeout {
            Timeout::Infinite => -1,
            Timeout::Immediate => 0,
            // Sub-second budgets round up so they never become `Immediate`.
            Timeout::Bounded(d) => {
                i64::try_from(d.as_secs() + u64::from(d.subsec_nanos() > 0)).unwrap_or(i64::MAX)
            }
        };
        self
    }

    pub fn codec(mut self, codec: CodecKind) -> Self {
        self.config.codec = codec;
        self
    }

    pub fn sync_on_write(mut self, sync: bool) -> Self {
        self.config.sync_on_write = sync;
        self
    }

    pub fn create_on_open(mut self, create: bool) -> Self {
        self.config.create_on_open = create;
        self
    }

    pub fn build<T>(self) -> Result<Queue<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        Queue::with_config(self.config)
    }

    pub fn build_with_codec<T, C>(self, codec: C) -> Result<Queue<T, C>>
    where
        T: Serialize + DeserializeOwned,
        C: Codec,
    {
        Queue::with_codec(self.config, codec)
    }
}
