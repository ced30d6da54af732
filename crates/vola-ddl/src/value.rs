//! SQL literal values and database-level defaults.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A SQL literal value.
///
/// Used for column defaults, backfill values and compiled expression
/// parameters. DDL cannot carry bind parameters on every backend, so these
/// values are rendered into the statement text by the backend's value
/// quoting rules.
///
/// # Example
///
/// ```rust
/// use vola_ddl::SqlValue;
///
/// let v: SqlValue = "hello".into();
/// assert_eq!(v, SqlValue::String("hello".to_string()));
/// assert!(SqlValue::Null.is_null());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	Bytes(Vec<u8>),
	Timestamp(chrono::DateTime<chrono::Utc>),
	Uuid(Uuid),
}

impl SqlValue {
	pub fn is_null(&self) -> bool {
		matches!(self, SqlValue::Null)
	}
}

impl From<&str> for SqlValue {
	fn from(s: &str) -> Self {
		SqlValue::String(s.to_string())
	}
}

impl From<String> for SqlValue {
	fn from(s: String) -> Self {
		SqlValue::String(s)
	}
}

impl From<i64> for SqlValue {
	fn from(i: i64) -> Self {
		SqlValue::Int(i)
	}
}

impl From<i32> for SqlValue {
	fn from(i: i32) -> Self {
		SqlValue::Int(i as i64)
	}
}

impl From<f64> for SqlValue {
	fn from(f: f64) -> Self {
		SqlValue::Float(f)
	}
}

impl From<bool> for SqlValue {
	fn from(b: bool) -> Self {
		SqlValue::Bool(b)
	}
}

impl From<chrono::DateTime<chrono::Utc>> for SqlValue {
	fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
		SqlValue::Timestamp(dt)
	}
}

impl From<Uuid> for SqlValue {
	fn from(u: Uuid) -> Self {
		SqlValue::Uuid(u)
	}
}

/// A persistent database-level default.
///
/// Distinct from a backfill default: a backfill default exists only to fill
/// existing rows during an alteration and is dropped afterwards, while a
/// `DbDefault` stays declared on the column.
///
/// # Example
///
/// ```rust
/// use vola_ddl::{DbDefault, SqlValue};
///
/// let literal = DbDefault::Value(SqlValue::Int(0));
/// let expr = DbDefault::Expression("CURRENT_TIMESTAMP".to_string());
/// assert_ne!(literal, expr);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DbDefault {
	/// A literal value, rendered with the backend's value quoting.
	Value(SqlValue),
	/// A raw SQL expression such as `CURRENT_TIMESTAMP`, rendered as-is.
	Expression(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_from_conversions() {
		assert_eq!(SqlValue::from(42i64), SqlValue::Int(42));
		assert_eq!(SqlValue::from(42i32), SqlValue::Int(42));
		assert_eq!(SqlValue::from(true), SqlValue::Bool(true));
		assert_eq!(SqlValue::from(1.5f64), SqlValue::Float(1.5));
		assert_eq!(
			SqlValue::from("x".to_string()),
			SqlValue::String("x".to_string())
		);
	}

	#[test]
	fn test_is_null() {
		assert!(SqlValue::Null.is_null());
		assert!(!SqlValue::Int(0).is_null());
	}
}
