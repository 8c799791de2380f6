use serde::{Deserialize, Serialize};

use crate::engine::transform::error::WireError;
use crate::engine::transform::spec::TransformSpec;

pub const SPEC_MAGIC: [u8; 4] = *b"CTFX";
pub const WIRE_VERSION: u16 = 1;

const HEADER_LEN: usize = SPEC_MAGIC.len() + 2;

/// Result frame returned by the engine for a submitted transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformReply {
    pub handle: u64,
    pub row_count: u64,
}

pub fn encode_spec(spec: &TransformSpec) -> Result<Vec<u8>, WireError> {
    Ok(frame(bincode::serialize(spec)?))
}

pub fn decode_spec(bytes: &[u8]) -> Result<TransformSpec, WireError> {
    Ok(bincode::deserialize(unframe(bytes)?)?)
}

pub fn encode_reply(reply: &TransformReply) -> Result<Vec<u8>, WireError> {
    Ok(frame(bincode::serialize(reply)?))
}

pub fn decode_reply(bytes: &[u8]) -> Result<TransformReply, WireError> {
    Ok(bincode::deserialize(unframe(bytes)?)?)
}

fn frame(payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&SPEC_MAGIC);
    out.extend_from_slice(&WIRE_VERSION.to_le_bytes());
    out.extend_from_slice(&payload);
    out
}

fn unframe(bytes: &[u8]) -> Result<&[u8], WireError> {
    if bytes.len() < HEADER_LEN {
        return Err(WireError::Truncated(bytes.len()));
    }
    if bytes[..SPEC_MAGIC.len()] != SPEC_MAGIC {
        return Err(WireError::BadMagic);
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != WIRE_VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    Ok(&bytes[HEADER_LEN..])
}
