//! Unified error type for query composition and result materialization
//!
//! Invariant violations inside this layer surface as the dedicated variants
//! below; storage driver failures pass through [`QueryError::Engine`] with no
//! retry and no local recovery.

use thiserror::Error;

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;

/// Unified error type for query operations
#[derive(Debug, Error)]
pub enum QueryError {
	/// A single-row fetch matched no records
	#[error("no result found for single-row fetch")]
	NotFound,

	/// A value did not have the expected type
	#[error("type mismatch: {0}")]
	TypeMismatch(String),

	/// A referenced result column is absent from a fetched row
	#[error("column not found: {0}")]
	ColumnNotFound(String),

	/// A page-scoped count fell outside the active window
	#[error("page count {count} outside expected range 0..={limit}")]
	RangeViolation { count: u64, limit: u64 },

	/// Capability not provided by the active backend
	#[error("not supported by this backend: {0}")]
	Unsupported(String),

	/// Storage driver failure, passed through unmodified
	#[error("engine error: {0}")]
	Engine(String),
}
