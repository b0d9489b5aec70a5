//! Payload codec used before fragmentation

use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a payload into bytes
pub fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(payload)?)
}

/// Decode bytes produced by [`encode`]
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}
