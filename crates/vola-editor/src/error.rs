//! Engine error type.

use thiserror::Error;
use vola_backends::ConnectionError;
use vola_models::SpecificationError;

/// Errors surfaced by the schema editor and the alteration planner.
#[derive(Debug, Error)]
pub enum SchemaError {
	/// The caller handed the editor an invalid description. Raised before
	/// any SQL is touched, never partially applied.
	#[error("invalid specification: {0}")]
	InvalidSpecification(#[from] SpecificationError),

	/// The backend's capability table says this operation cannot be
	/// expressed; distinct from a database-side syntax error so callers can
	/// choose to skip instead of fail.
	#[error("{what} is not supported on {backend}")]
	NotSupported { backend: String, what: String },

	/// Propagated from the connection, never swallowed and never retried;
	/// DDL is not idempotent-safe to retry blindly.
	#[error(transparent)]
	Database(#[from] ConnectionError),

	/// The planner refused an ambiguous or lossy conversion under
	/// `strict = true`.
	#[error("unsafe alteration refused: {0}")]
	UnsafeAlteration(String),

	/// Scope misuse: nested scope entry, or flushing outside a scope.
	#[error("invalid editor state: {0}")]
	InvalidState(String),
}

impl SchemaError {
	pub fn not_supported(backend: &str, what: impl Into<String>) -> Self {
		SchemaError::NotSupported {
			backend: backend.to_string(),
			what: what.into(),
		}
	}
}

pub type Result<T> = std::result::Result<T, SchemaError>;
