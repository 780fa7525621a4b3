//! Order-preserving numeric encodings.
//!
//! Signed integers flip the sign bit of the big-endian representation so
//! negative values sort before positive ones. `encode_uint_desc` complements
//! every bit, so ascending byte order equals descending integer order; the
//! MVCC layer uses it to place newer versions of a key before older ones.

use quarry_common::error::{QuarryError, QuarryResult};

const SIGN_MASK: u64 = 0x8000_0000_0000_0000;

/// Appends the order-preserving encoding of a signed integer.
pub fn encode_int(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&((v as u64) ^ SIGN_MASK).to_be_bytes());
}

/// Decodes a signed integer, returning the value and the unconsumed suffix.
pub fn decode_int(buf: &[u8]) -> QuarryResult<(i64, &[u8])> {
    let (raw, rest) = take8(buf)?;
    Ok(((u64::from_be_bytes(raw) ^ SIGN_MASK) as i64, rest))
}

/// Appends the order-preserving encoding of an unsigned integer.
pub fn encode_uint(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Decodes an unsigned integer, returning the value and the unconsumed
/// suffix.
pub fn decode_uint(buf: &[u8]) -> QuarryResult<(u64, &[u8])> {
    let (raw, rest) = take8(buf)?;
    Ok((u64::from_be_bytes(raw), rest))
}

/// Appends an unsigned integer encoded so that ascending byte order equals
/// descending integer order.
pub fn encode_uint_desc(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&(!v).to_be_bytes());
}

/// Decodes an integer written by [`encode_uint_desc`].
pub fn decode_uint_desc(buf: &[u8]) -> QuarryResult<(u64, &[u8])> {
    let (raw, rest) = take8(buf)?;
    Ok((!u64::from_be_bytes(raw), rest))
}

/// Appends the order-preserving encoding of a float.
///
/// Non-negative floats get the sign bit set; negative floats have every bit
/// flipped. The resulting big-endian bytes sort in numeric order.
pub fn encode_float(buf: &mut Vec<u8>, v: f64) {
    let bits = v.to_bits();
    let ordered = if bits & SIGN_MASK != 0 { !bits } else { bits | SIGN_MASK };
    buf.extend_from_slice(&ordered.to_be_bytes());
}

/// Decodes a float written by [`encode_float`].
pub fn decode_float(buf: &[u8]) -> QuarryResult<(f64, &[u8])> {
    let (raw, rest) = take8(buf)?;
    let ordered = u64::from_be_bytes(raw);
    let bits = if ordered & SIGN_MASK != 0 {
        ordered & !SIGN_MASK
    } else {
        !ordered
    };
    Ok((f64::from_bits(bits), rest))
}

fn take8(buf: &[u8]) -> QuarryResult<([u8; 8], &[u8])> {
    if buf.len() < 8 {
        return Err(QuarryError::corrupted("truncated numeric encoding"));
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[..8]);
    Ok((raw, &buf[8..]))
}
