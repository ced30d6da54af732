//! The connection interface consumed by the schema editor, and a recording
//! implementation for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use vola_ddl::SqlValue;

/// Errors surfaced by a schema connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("{operation} is not supported by this connection")]
	Unsupported { operation: String },
}

impl ConnectionError {
	pub fn unsupported(operation: impl Into<String>) -> Self {
		ConnectionError::Unsupported {
			operation: operation.into(),
		}
	}
}

/// One introspected constraint on a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintInfo {
	pub name: String,
	pub columns: Vec<String>,
	pub kind: ConstraintKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
	PrimaryKey,
	Unique,
	ForeignKey,
	Check,
	Index,
}

/// The single held database connection a schema-edit scope runs on.
///
/// Statements execute sequentially in program order; there is no intra-scope
/// concurrency. Introspection methods default to a "not supported" error;
/// the editor falls back to deterministic generated names when a connection
/// cannot answer.
#[async_trait]
pub trait SchemaConnection: Send {
	/// Execute one statement; returns the number of affected rows.
	async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, ConnectionError>;

	async fn begin(&mut self) -> Result<(), ConnectionError>;
	async fn commit(&mut self) -> Result<(), ConnectionError>;
	async fn rollback(&mut self) -> Result<(), ConnectionError>;

	async fn table_names(&mut self) -> Result<Vec<String>, ConnectionError> {
		Err(ConnectionError::unsupported("table_names"))
	}

	async fn get_constraints(
		&mut self,
		_table: &str,
	) -> Result<Vec<ConstraintInfo>, ConnectionError> {
		Err(ConnectionError::unsupported("get_constraints"))
	}

	async fn get_primary_key_column(
		&mut self,
		_table: &str,
	) -> Result<Option<String>, ConnectionError> {
		Err(ConnectionError::unsupported("get_primary_key_column"))
	}
}

/// A connection that records every statement instead of executing it.
///
/// The log is shared: clone [`RecordingConnection::log_handle`] before
/// handing the connection to an editor, then assert on the captured SQL.
///
/// # Example
///
/// ```rust
/// use vola_backends::RecordingConnection;
///
/// let connection = RecordingConnection::new();
/// let log = connection.log_handle();
/// // ... hand `connection` to a schema editor, run operations ...
/// assert!(log.lock().is_empty());
/// ```
pub struct RecordingConnection {
	log: Arc<Mutex<Vec<String>>>,
	fail_on: Option<String>,
}

impl RecordingConnection {
	pub fn new() -> Self {
		Self {
			log: Arc::new(Mutex::new(Vec::new())),
			fail_on: None,
		}
	}

	/// Fail any statement whose SQL contains `needle`, for testing error
	/// paths.
	pub fn failing_on(needle: impl Into<String>) -> Self {
		Self {
			log: Arc::new(Mutex::new(Vec::new())),
			fail_on: Some(needle.into()),
		}
	}

	/// A shared handle on the statement log.
	pub fn log_handle(&self) -> Arc<Mutex<Vec<String>>> {
		Arc::clone(&self.log)
	}

	/// A snapshot of every statement executed so far.
	pub fn executed(&self) -> Vec<String> {
		self.log.lock().clone()
	}
}

impl Default for RecordingConnection {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl SchemaConnection for RecordingConnection {
	async fn execute(&mut self, sql: &str, _params: &[SqlValue]) -> Result<u64, ConnectionError> {
		if let Some(needle) = &self.fail_on
			&& sql.contains(needle.as_str())
		{
			return Err(ConnectionError::Database(sqlx::Error::Protocol(format!(
				"simulated failure on: {sql}"
			))));
		}
		self.log.lock().push(sql.to_string());
		Ok(0)
	}

	async fn begin(&mut self) -> Result<(), ConnectionError> {
		self.log.lock().push("BEGIN".to_string());
		Ok(())
	}

	async fn commit(&mut self) -> Result<(), ConnectionError> {
		self.log.lock().push("COMMIT".to_string());
		Ok(())
	}

	async fn rollback(&mut self) -> Result<(), ConnectionError> {
		self.log.lock().push("ROLLBACK".to_string());
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_recording_connection_captures_in_order() {
		let mut connection = RecordingConnection::new();
		connection.execute("CREATE TABLE t (id integer)", &[]).await.unwrap();
		connection.execute("DROP TABLE t", &[]).await.unwrap();
		assert_eq!(
			connection.executed(),
			vec!["CREATE TABLE t (id integer)", "DROP TABLE t"]
		);
	}

	#[tokio::test]
	async fn test_failing_connection() {
		let mut connection = RecordingConnection::failing_on("DROP");
		assert!(connection.execute("CREATE TABLE t (x int)", &[]).await.is_ok());
		assert!(connection.execute("DROP TABLE t", &[]).await.is_err());
		// The failed statement is not recorded.
		assert_eq!(connection.executed().len(), 1);
	}

	#[tokio::test]
	async fn test_introspection_defaults_to_unsupported() {
		let mut connection = RecordingConnection::new();
		let err = connection.table_names().await.unwrap_err();
		assert!(matches!(err, ConnectionError::Unsupported { .. }));
	}
}
