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

//! Serialization of the whole queue sequence.
//!
//! A [`Codec`] turns the in-memory `Vec<T>` into the payload bytes stored
//! inside the queue file envelope and back. Its [`Codec::id`] is written into
//! the envelope header so a store never decodes bytes produced by another
//! codec.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use snafu::ResultExt;

use crate::{
    Result,
    error::{BoxedCodecError, DecodeSnafu, EncodeSnafu},
};

pub trait Codec: Send + Sync {
    /// Identifier stored in the file header. Must be unique per format.
    fn id(&self) -> u8;

    fn name(&self) -> &'static str;

    fn encode<T: Serialize>(&self, items: &[T]) -> Result<Vec<u8>>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<Vec<T>>;
}

/// Compact binary encoding via `bincode`'s serde integration.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    pub const ID: u8 = 1;
}

impl Codec for BincodeCodec {
    fn id(&self) -> u8 { Self::ID }

    fn name(&self) -> &'static str { "bincode" }

    fn encode<T: Serialize>(&self, items: &[T]) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(items, bincode::config::standard())
            .map_err(|e| Box::new(e) as BoxedCodecError)
            .context(EncodeSnafu { codec: self.name() })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<Vec<T>> {
        let (items, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| Box::new(e) as BoxedCodecError)
            .context(DecodeSnafu { codec: self.name() })?;
        Ok(items)
    }
}

/// Human-readable JSON payload, handy when the file is inspected by hand.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub const ID: u8 = 2;
}

impl Codec for JsonCodec {
    fn id(&self) -> u8 { Self::ID }

    fn name(&self) -> &'static str { "json" }

    fn encode<T: Serialize>(&self, items: &[T]) -> Result<Vec<u8>> {
        serde_json::to_vec(items)
            .map_err(|e| Box::new(e) as BoxedCodecError)
            .context(EncodeSnafu { codec: self.name() })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<Vec<T>> {
        serde_json::from_slice(bytes)
            .map_err(|e| Box::new(e) as BoxedCodecError)
            .context(DecodeSnafu { codec: self.name() })
    }
}

/// Codec selected by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    #[default]
    Bincode,
    Json,
}

impl Codec for CodecKind {
    fn id(&self) -> u8 {
        match self {
            Self::Bincode => BincodeCodec.id(),
            Self::Json => JsonCodec.id(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Bincode => BincodeCodec.name(),
            Self::Json => JsonCodec.name(),
        }
    }

    fn encode<T: Serialize>(&self, items: &[T]) -> Result<Vec<u8>> {
        match self {
            Self::Bincode => BincodeCodec.encode(items),
            Self::Json => JsonCodec.encode(items),
        }
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<Vec<T>> {
        match self {
            Self::Bincode => BincodeCodec.decode(bytes),
            Self::Json => JsonCodec.decode(bytes),
        }
    }
}
