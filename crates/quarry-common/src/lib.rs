//! # quarry-common
//!
//! Common types and errors for QuarryDB.
//!
//! This crate provides the foundational types and abstractions used across
//! all QuarryDB components. It includes:
//!
//! - **Types**: byte-string keys and values (`Key`, `EncodedKey`, `Value`)
//!   and core identifiers (`TableId`, `RowId`, `Version`)
//! - **Errors**: unified error handling with `QuarryError`
//!
//! ## Example
//!
//! ```rust
//! use quarry_common::error::QuarryResult;
//! use quarry_common::types::{Key, Version};
//!
//! fn example() -> QuarryResult<()> {
//!     let key = Key::from_bytes(b"user:1");
//!     let version = Version::new(7);
//!     assert!(version < Version::MAX);
//!     assert_eq!(key.len(), 6);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use error::{ErrorCode, QuarryError, QuarryResult};
pub use types::{EncodedKey, Key, RowId, TableId, Value, Version};
