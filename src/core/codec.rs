//! Serialization of attribute maps into the primary table's `data` column.
//!
//! Any [`Codec`] must round-trip null, booleans, integers, floats, strings,
//! lists and nested maps. JSON is the default; MessagePack is more compact.

use crate::core::document::Attributes;
use crate::core::error::{GoatfishError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub trait Codec: fmt::Debug {
    fn name(&self) -> &'static str;
    fn encode(&self, attrs: &Attributes) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<Attributes>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, attrs: &Attributes) -> Result<Vec<u8>> {
        // JSON has no spelling for inf or NaN; serde_json would write `null`.
        if let Some((key, _)) = attrs.iter().find(|(_, v)| !v.is_finite()) {
            return Err(GoatfishError::Codec(format!(
                "attribute '{}' holds a non-finite float, which JSON cannot represent",
                key
            )));
        }
        serde_json::to_vec(attrs).map_err(|e| GoatfishError::Codec(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Attributes> {
        serde_json::from_slice(bytes).map_err(|e| GoatfishError::Codec(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MsgpackCodec;

impl Codec for MsgpackCodec {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn encode(&self, attrs: &Attributes) -> Result<Vec<u8>> {
        rmp_serde::to_vec(attrs).map_err(|e| GoatfishError::Codec(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Attributes> {
        rmp_serde::from_slice(bytes).map_err(|e| GoatfishError::Codec(e.to_string()))
    }
}

/// Codec selector used by configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Json,
    Msgpack,
}

impl CodecKind {
    pub fn build(self) -> Box<dyn Codec> {
        match self {
            CodecKind::Json => Box::new(JsonCodec),
            CodecKind::Msgpack => Box::new(MsgpackCodec),
        }
    }
}
