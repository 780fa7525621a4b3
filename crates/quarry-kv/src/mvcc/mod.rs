//! MVCC key encoding.
//!
//! Every user key is wrapped before it reaches the engine:
//!
//! ```text
//! DATA_PREFIX ‖ encode_bytes(user_key) ‖ encode_uint_desc(version)
//! ```
//!
//! The version is encoded in descending order, so a forward engine scan from
//! `mvcc(key, Version::MAX)` yields the versions of `key` newest-first,
//! followed by the next user key:
//!
//! ```text
//! Key_MaxVer
//! ...
//! Key_ver
//! Key_ver-1
//! ...
//! Key_0
//! NextKey...
//! ```
//!
//! A delete stores a [`TOMBSTONE`] value at the deleting version.

pub mod snapshot;

use quarry_codec as codec;
use quarry_common::error::{QuarryError, QuarryResult};
use quarry_common::types::{EncodedKey, Key, Version};

/// Tag byte distinguishing user data from engine metadata (reserved).
pub const DATA_PREFIX: u8 = 0xDA;

/// Sentinel value meaning "deleted as of this version".
pub const TOMBSTONE: [u8; 2] = [0xDE, 0xAD];

/// Returns true if `value` is the tombstone sentinel.
#[inline]
#[must_use]
pub fn is_tombstone(value: &[u8]) -> bool {
    value == TOMBSTONE
}

/// Returns true if `key` is an MVCC data key.
#[inline]
#[must_use]
pub fn is_data_key(key: &[u8]) -> bool {
    key.first() == Some(&DATA_PREFIX)
}

/// Encodes a user key at a version into an engine key.
#[must_use]
pub fn mvcc_encode(key: &Key, version: Version) -> EncodedKey {
    let mut buf = Vec::with_capacity(key.len() + 16);
    buf.push(DATA_PREFIX);
    codec::encode_bytes(&mut buf, key.as_bytes());
    codec::encode_uint_desc(&mut buf, version.value());
    EncodedKey::from_vec(buf)
}

/// Decodes an engine key back into its user key and version.
pub fn mvcc_decode(encoded: &[u8]) -> QuarryResult<(Key, Version)> {
    if !is_data_key(encoded) {
        return Err(QuarryError::InvalidKey {
            message: "missing data prefix".to_string(),
        });
    }
    let (key, rest) = codec::decode_bytes(&encoded[1..])?;
    let (version, rest) = codec::decode_uint_desc(rest)?;
    if !rest.is_empty() {
        return Err(QuarryError::InvalidKey {
            message: "trailing bytes after version".to_string(),
        });
    }
    Ok((Key::from_vec(key), Version::new(version)))
}
