//! Little-endian integer decoding.
//!
//! Every integer in the container is little-endian. These helpers decode
//! explicitly from bytes so the result does not depend on host byte order.

use crate::error::{PsafeError, PsafeResult};

pub fn i32_le(bytes: [u8; 4]) -> i32 {
    i32::from_le_bytes(bytes)
}

pub fn u32_le(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}

/// Decodes a 4-byte slice; any other length is corruption described by `what`.
pub fn i32_le_exact(data: &[u8], what: &str) -> PsafeResult<i32> {
    let bytes: [u8; 4] = data.try_into().map_err(|_| {
        PsafeError::corrupt(format!(
            "{what} must be a 32-bit integer, got {} bytes",
            data.len()
        ))
    })?;
    Ok(i32_le(bytes))
}
