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

//! Envelope framing the codec payload inside the queue file.
//!
//! ## Binary Format
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │ Header (24 bytes)                                       │
//! ├──────────────────┬─────────────────────────────────────┤
//! │ magic: [u8; 4]   │ "FQUE" (0x46515545)                 │
//! │ version: u16     │ Format version, currently 1         │
//! │ codec: u8        │ Codec id of the payload             │
//! │ reserved: u8     │                                     │
//! │ len: u64         │ Payload length in bytes             │
//! │ checksum: u32    │ CRC32 of the payload                │
//! │ reserved: [u8;4] │ Reserved for future use             │
//! ├──────────────────┴─────────────────────────────────────┤
//! │ Payload (len bytes): codec-encoded sequence             │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian.

use std::path::Path;

use crc32fast::Hasher;
use snafu::ensure;

use crate::{
    Result,
    error::{CodecMismatchSnafu, CorruptedSnafu, UnsupportedVersionSnafu},
};

/// Magic bytes identifying a queue file: "FQUE"
pub const QUEUE_MAGIC: [u8; 4] = *b"FQUE";

/// Current queue file format version.
pub const FORMAT_VERSION: u16 = 1;

/// Size of the queue file header in bytes.
pub const HEADER_SIZE: usize = 24;

#[inline]
fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Wrap a codec payload in the queue file envelope.
pub(crate) fn encode_envelope(codec_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(&QUEUE_MAGIC);
    header[4..6].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    header[6] = codec_id;
    header[8..16].copy_from_slice(&(payload.len() as u64).to_le_bytes());
    header[16..20].copy_from_slice(&checksum(payload).to_le_bytes());

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&header);
    result.extend_from_slice(payload);
    result
}

/// Validate the envelope and return the payload slice.
///
/// `path` is only used for error reporting.
pub(crate) fn decode_envelope<'a>(path: &Path, codec_id: u8, data: &'a [u8]) -> Result<&'a [u8]> {
    ensure!(
        data.len() >= HEADER_SIZE,
        CorruptedSnafu {
            path,
            reason: format!(
                "data too short: {} bytes, expected at least {HEADER_SIZE}",
                data.len()
            ),
        }
    );

    let (header, payload) = data.split_at(HEADER_SIZE);
    ensure!(
        header[0..4] == QUEUE_MAGIC,
        CorruptedSnafu {
            path,
            reason: format!("invalid magic: {:?}", &header[0..4]),
        }
    );

    let version = u16::from_le_bytes([header[4], header[5]]);
    ensure!(version == FORMAT_VERSION, UnsupportedVersionSnafu { version });

    let found = header[6];
    ensure!(
        found == codec_id,
        CodecMismatchSnafu {
            expected: codec_id,
            found,
        }
    );

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&header[8..16]);
    let len = u64::from_le_bytes(len_bytes);
    ensure!(
        len == payload.len() as u64,
        CorruptedSnafu {
            path,
            reason: format!(
                "payload length mismatch: header says {len}, file holds {}",
                payload.len()
            ),
        }
    );

    let stored = u32::from_le_bytes([header[16], header[17], header[18], header[19]]);
    let computed = checksum(payload);
    ensure!(
        stored == computed,
        CorruptedSnafu {
            path,
            reason: format!("checksum mismatch: stored={stored:#x}, computed={computed:#x}"),
        }
    );

    Ok(payload)
}
