//! Key and value types for QuarryDB.
//!
//! These types provide variable-length byte wrappers for database keys and
//! values. A [`Key`] is a user-level key (a row key or index entry key); an
//! [`EncodedKey`] is an engine-level key after MVCC version encoding. The
//! lexicographic order of the bytes is the engine's sort order.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;

/// A user-level database key.
///
/// Keys are variable-length byte sequences produced by the order-preserving
/// codec. They support efficient comparison and cheap cloning.
///
/// # Example
///
/// ```rust
/// use quarry_common::types::Key;
///
/// let key = Key::from_bytes(b"user:1234");
/// assert_eq!(key.len(), 9);
/// assert!(key < key.next());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Key(Bytes);

impl Key {
    /// Creates an empty key.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(Bytes::new())
    }

    /// Creates a key from a byte slice.
    #[inline]
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }

    /// Creates a key from owned bytes.
    #[inline]
    #[must_use]
    pub fn from_vec(vec: Vec<u8>) -> Self {
        Self(Bytes::from(vec))
    }

    /// Returns the length of the key in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the key is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the key as a byte slice.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Checks if this key starts with the given prefix.
    #[inline]
    #[must_use]
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }

    /// Returns the smallest key strictly greater than this key.
    ///
    /// Appends a zero byte. The MVCC range scanner uses this to advance its
    /// cursor past all versions of the current user key.
    #[must_use]
    pub fn next(&self) -> Self {
        let mut bytes = Vec::with_capacity(self.0.len() + 1);
        bytes.extend_from_slice(&self.0);
        bytes.push(0x00);
        Self::from_vec(bytes)
    }

    /// Returns the smallest key that is greater than every key carrying this
    /// key as a prefix (for range-scan end bounds).
    #[must_use]
    pub fn prefix_successor(&self) -> Self {
        let mut bytes = self.0.to_vec();

        // Find the rightmost byte that is not 0xFF
        for i in (0..bytes.len()).rev() {
            if bytes[i] < 0xFF {
                bytes[i] += 1;
                bytes.truncate(i + 1);
                return Self::from_vec(bytes);
            }
        }

        // All bytes are 0xFF, append 0x00
        bytes.push(0x00);
        Self::from_vec(bytes)
    }
}

impl Deref for Key {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for Key {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Ord for Key {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for Key {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key(")?;
        write_bytes(f, &self.0)?;
        write!(f, ")")
    }
}

/// An engine-level key: a user key after MVCC version encoding.
///
/// Produced only by the MVCC layer; the engine compares these byte-wise.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct EncodedKey(Bytes);

impl EncodedKey {
    /// Creates an encoded key from owned bytes.
    #[inline]
    #[must_use]
    pub fn from_vec(vec: Vec<u8>) -> Self {
        Self(Bytes::from(vec))
    }

    /// Returns the key as a byte slice.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the key in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the key is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for EncodedKey {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Ord for EncodedKey {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for EncodedKey {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedKey(")?;
        write_bytes(f, &self.0)?;
        write!(f, ")")
    }
}

/// A database value.
///
/// Values are opaque byte sequences; the row codec interprets them.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Value(Bytes);

impl Value {
    /// Creates an empty value.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(Bytes::new())
    }

    /// Creates a value from a byte slice.
    #[inline]
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }

    /// Creates a value from owned bytes.
    #[inline]
    #[must_use]
    pub fn from_vec(vec: Vec<u8>) -> Self {
        Self(Bytes::from(vec))
    }

    /// Returns the value as a byte slice.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the value in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the value is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Value {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value(")?;
        write_bytes(f, &self.0)?;
        write!(f, ")")
    }
}

/// Writes bytes as a UTF-8 string when printable, hex otherwise.
fn write_bytes(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    match std::str::from_utf8(bytes) {
        Ok(s) if s.chars().all(|c| !c.is_control()) => write!(f, "{:?}", s),
        _ => {
            write!(f, "0x")?;
            for byte in &bytes[..bytes.len().min(32)] {
                write!(f, "{byte:02x}")?;
            }
            if bytes.len() > 32 {
                write!(f, "...")?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ordering() {
        let a = Key::from_bytes(b"a");
        let b = Key::from_bytes(b"b");
        assert!(a < b);
        assert_eq!(a.cmp(&a), Ordering::Equal);
    }

    #[test]
    fn test_key_next_is_immediate_successor() {
        let k = Key::from_bytes(b"abc");
        let n = k.next();
        assert!(k < n);
        // No key fits strictly between k and k.next().
        assert_eq!(n.as_bytes(), b"abc\x00");
    }

    #[test]
    fn test_prefix_successor() {
        let k = Key::from_bytes(b"ab");
        let succ = k.prefix_successor();
        assert!(succ > k);
        assert!(succ > Key::from_bytes(b"ab\xff\xff"));

        let all_ff = Key::from_bytes(&[0xFF, 0xFF]);
        assert!(all_ff.prefix_successor() > all_ff);
    }

    #[test]
    fn test_starts_with() {
        let k = Key::from_bytes(b"t_1_r");
        assert!(k.starts_with(b"t_1"));
        assert!(!k.starts_with(b"t_2"));
    }

    #[test]
    fn test_debug_formats() {
        let k = Key::from_bytes(b"abc");
        assert_eq!(format!("{:?}", k), "Key(\"abc\")");
        let k = Key::from_bytes(&[0xde, 0xad]);
        assert_eq!(format!("{:?}", k), "Key(0xdead)");
    }
}
