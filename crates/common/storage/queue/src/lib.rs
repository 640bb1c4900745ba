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

//! Single-file persistent queue shared between processes.
//!
//! The whole sequence lives in one file and is rewritten by every mutating
//! operation. An advisory lock on a sibling `.lock` file makes each operation
//! atomic with respect to every other process using the same path.

pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod file;
pub mod format;
pub mod lock;
pub mod queue;
pub mod timeout;

pub use builder::QueueBuilder;
pub use codec::{BincodeCodec, Codec, CodecKind, JsonCodec};
pub use config::{DEFAULT_LOCK_SUFFIX, DEFAULT_QUEUE_FILE, QueueConfig};
pub use error::{QueueError, Result};
pub use lock::{FileLock, LockGuard};
pub use queue::Queue;
pub use timeout::Timeout;
