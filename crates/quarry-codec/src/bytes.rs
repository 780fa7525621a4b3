//! Order-preserving, prefix-free byte-string encoding.
//!
//! The input is split into groups of 8 bytes. Each group is padded with
//! zeros to 8 bytes and followed by a marker byte recording how many real
//! bytes the group carries (`0xFF - pad_count`). Input whose length is a
//! multiple of 8 gets a final all-pad group, so every encoding ends with a
//! marker below `0xFF` and no encoding is a prefix of another.
//!
//! Without this terminator, two index prefixes such as `p_c` and `p_c1`
//! would alias under a raw prefix scan whenever a value under `c` begins
//! with the byte `'1'`.

use quarry_common::error::{QuarryError, QuarryResult};

const GROUP_SIZE: usize = 8;
const PAD: u8 = 0x00;
const MARKER: u8 = 0xFF;

/// Appends the order-preserving encoding of `data` to `buf`.
pub fn encode_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    buf.reserve((data.len() / GROUP_SIZE + 1) * (GROUP_SIZE + 1));

    let mut idx = 0;
    while idx <= data.len() {
        let remain = data.len() - idx;
        if remain >= GROUP_SIZE {
            buf.extend_from_slice(&data[idx..idx + GROUP_SIZE]);
            buf.push(MARKER);
        } else {
            let pad = GROUP_SIZE - remain;
            buf.extend_from_slice(&data[idx..]);
            buf.extend(std::iter::repeat(PAD).take(pad));
            buf.push(MARKER - pad as u8);
        }
        idx += GROUP_SIZE;
    }
}

/// Returns the order-preserving encoding of `data` as a fresh buffer.
#[must_use]
pub fn encoded_bytes(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_bytes(&mut buf, data);
    buf
}

/// Decodes a byte string encoded by [`encode_bytes`].
///
/// Returns the decoded bytes and the unconsumed suffix of `buf`. A
/// truncated or malformed encoding is a codec invariant violation and is
/// surfaced as [`QuarryError::Corrupted`].
pub fn decode_bytes(buf: &[u8]) -> QuarryResult<(Vec<u8>, &[u8])> {
    let mut data = Vec::with_capacity(buf.len() / (GROUP_SIZE + 1) * GROUP_SIZE);
    let mut rest = buf;

    loop {
        if rest.len() < GROUP_SIZE + 1 {
            return Err(QuarryError::corrupted("truncated byte-string group"));
        }
        let group = &rest[..GROUP_SIZE];
        let marker = rest[GROUP_SIZE];
        rest = &rest[GROUP_SIZE + 1..];

        if marker == MARKER {
            data.extend_from_slice(group);
            continue;
        }

        let pad = (MARKER - marker) as usize;
        if pad > GROUP_SIZE {
            return Err(QuarryError::corrupted(format!(
                "invalid byte-string group marker 0x{marker:02x}"
            )));
        }
        let real = GROUP_SIZE - pad;
        if group[real..].iter().any(|&b| b != PAD) {
            return Err(QuarryError::corrupted("non-zero padding in byte-string group"));
        }
        data.extend_from_slice(&group[..real]);
        return Ok((data, rest));
    }
}
