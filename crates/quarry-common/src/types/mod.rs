//! Type definitions for QuarryDB.
//!
//! This module contains all core type definitions used across the database.

mod ids;
mod keys;

pub use ids::{RowId, TableId, Version};
pub use keys::{EncodedKey, Key, Value};
