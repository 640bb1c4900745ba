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

//! Lock acquisition timeout policy.
//!
//! Every queue operation accepts a [`Timeout`]. The numeric convention used by
//! configuration files maps onto it as follows:
//!
//! | seconds | policy                                  |
//! |---------|-----------------------------------------|
//! | `< 0`   | [`Timeout::Infinite`], block until free |
//! | `0`     | [`Timeout::Immediate`], one attempt     |
//! | `N > 0` | [`Timeout::Bounded`], poll up to `N` s  |

use std::{
    fmt,
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Wait until the lock becomes available.
    #[default]
    Infinite,
    /// Try once and fail if the lock is held.
    Immediate,
    /// Keep polling until the duration elapses.
    Bounded(Duration),
}

impl Timeout {
    /// Builds a timeout from whole seconds using the `-1 / 0 / N` convention.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        if secs < 0 {
            Self::Infinite
        } else if secs == 0 {
            Self::Immediate
        } else {
            Self::Bounded(Duration::from_secs(secs.unsigned_abs()))
        }
    }

    /// Builds a timeout from fractional seconds.
    ///
    /// Negative values and NaN mean infinite; values too large for a
    /// [`Duration`] are treated as infinite too.
    #[must_use]
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_nan() || secs < 0.0 {
            Self::Infinite
        } else if secs == 0.0 {
            Self::Immediate
        } else {
            Duration::try_from_secs_f64(secs).map_or(Self::Infinite, Self::Bounded)
        }
    }

    /// Returns the seconds representation, `-1.0` for infinite.
    #[must_use]
    pub fn as_secs_f64(self) -> f64 {
        match self {
            Self::Infinite => -1.0,
            Self::Immediate => 0.0,
            Self::Bounded(d) => d.as_secs_f64(),
        }
    }

    /// Instant after which acquisition gives up, `None` when waiting forever.
    pub(crate) fn deadline(self, start: Instant) -> Option<Instant> {
        match self {
            Self::Infinite => None,
            Self::Immediate => Some(start),
            // Overflow means the deadline is unreachable in practice.
            Self::Bounded(d) => start.checked_add(d),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Self::Immediate
        } else {
            Self::Bounded(duration)
        }
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(duration: Option<Duration>) -> Self { duration.map_or(Self::Infinite, Self::from) }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinite => write!(f, "infinite wait"),
            Self::Immediate => write!(f, "0s"),
            Self::Bounded(d) => write!(f, "{d:?}"),
        }
    }
}
