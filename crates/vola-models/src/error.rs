//! Construction-time validation errors.

use thiserror::Error;

/// An invalid index, constraint or field specification.
///
/// Raised synchronously at construction time, before any SQL is touched;
/// nothing is ever partially applied.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpecificationError {
	#[error("{constraint}: at least one expression is required")]
	EmptyExpressions { constraint: String },

	#[error("{constraint}: condition must be a boolean expression")]
	ConditionNotBoolean { constraint: String },

	#[error("{constraint}: index type must be GIST or SPGIST, got {index_type}")]
	InvalidExclusionIndexType {
		constraint: String,
		index_type: String,
	},

	#[error("{index}: column value {value} out of range, valid range is 1-4095")]
	BloomColumnValueOutOfRange { index: String, value: u32 },

	#[error("{index}: length {length} out of range, valid range is 1-4096")]
	BloomLengthOutOfRange { index: String, length: u32 },

	#[error("{index}: bloom indexes support at most 32 fields, got {count}")]
	BloomTooManyFields { index: String, count: usize },

	#[error("{index}: fillfactor {fillfactor} out of range, valid range is {min}-{max}")]
	FillfactorOutOfRange {
		index: String,
		fillfactor: u32,
		min: u32,
		max: u32,
	},

	#[error("{index}: pages_per_range must be greater than zero")]
	InvalidPagesPerRange { index: String },

	#[error("{index}: opclasses and columns must have the same length ({opclasses} vs {columns})")]
	OpclassMismatch {
		index: String,
		opclasses: usize,
		columns: usize,
	},

	#[error("{index}: an index must have either columns or expressions, not neither")]
	EmptyIndex { index: String },

	#[error("field {field} on {table} is NOT NULL but declares no usable default")]
	NotNullWithoutDefault { table: String, field: String },
}
