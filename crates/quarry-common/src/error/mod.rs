//! Error handling for QuarryDB.
//!
//! This module provides a unified error type and result alias used
//! across all QuarryDB components.

mod database;

pub use database::{ErrorCode, QuarryError};

/// Result type alias for QuarryDB operations.
pub type QuarryResult<T> = std::result::Result<T, QuarryError>;
