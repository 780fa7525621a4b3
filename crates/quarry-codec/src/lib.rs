//! # quarry-codec
//!
//! Order-preserving key codec for QuarryDB.
//!
//! Every engine key is produced through this crate. The encodings guarantee
//! that the lexicographic order of the output bytes equals the logical order
//! of the input values, so the engine's plain byte comparator sorts rows and
//! index entries correctly. This crate implements:
//!
//! - Prefix-free, order-preserving byte-string encoding
//! - Order-preserving integer encodings (ascending and descending)
//! - The self-describing [`Datum`] tuple codec used for rows and
//!   multi-column index keys
//!
//! Decoders return the decoded value together with the unconsumed suffix so
//! composite keys can be parsed left-to-right.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bytes;
mod datum;
mod number;

pub use bytes::{decode_bytes, encode_bytes, encoded_bytes};
pub use datum::{decode_datum, decode_value, encode_datum, encode_value, Datum};
pub use number::{
    decode_float, decode_int, decode_uint, decode_uint_desc, encode_float, encode_int,
    encode_uint, encode_uint_desc,
};
