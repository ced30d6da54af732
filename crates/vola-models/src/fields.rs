//! Resolved, static field descriptions.
//!
//! The schema engine never sees model declarations or runtime field objects;
//! it consumes read-only value descriptions of the state a column should be
//! in. Mapping a [`ColumnType`] to a vendor SQL type string is the backend
//! descriptor's job, not this crate's.

use serde::{Deserialize, Serialize};
use vola_ddl::{DbDefault, SqlValue};

/// Abstract column type, mapped per vendor by the backend descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
	BigInt,
	Integer,
	SmallInt,
	Boolean,
	Char(u32),
	VarChar(u32),
	Text,
	Date,
	Time,
	DateTime,
	Decimal { precision: u32, scale: u32 },
	Double,
	Real,
	Blob,
	Json,
	Uuid,
	/// A raw vendor type string, emitted as-is.
	Custom(String),
}

/// Referential action on the target row of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForeignKeyAction {
	Cascade,
	SetNull,
	SetDefault,
	Restrict,
	NoAction,
}

impl ForeignKeyAction {
	pub fn as_sql(&self) -> &'static str {
		match self {
			ForeignKeyAction::Cascade => "CASCADE",
			ForeignKeyAction::SetNull => "SET NULL",
			ForeignKeyAction::SetDefault => "SET DEFAULT",
			ForeignKeyAction::Restrict => "RESTRICT",
			ForeignKeyAction::NoAction => "NO ACTION",
		}
	}
}

/// The target side of a relation field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDescription {
	pub table: String,
	pub column: String,
	pub on_delete: ForeignKeyAction,
}

impl RelationDescription {
	pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
		Self {
			table: table.into(),
			column: column.into(),
			on_delete: ForeignKeyAction::NoAction,
		}
	}

	pub fn with_on_delete(mut self, action: ForeignKeyAction) -> Self {
		self.on_delete = action;
		self
	}
}

/// A resolved, static description of one column.
///
/// # Example
///
/// ```rust
/// use vola_models::{ColumnType, FieldDescription};
///
/// let field = FieldDescription::new("email", ColumnType::VarChar(255))
///     .with_unique(true);
/// assert_eq!(field.column, "email");
/// assert!(field.unique);
/// assert!(!field.nullable);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescription {
	/// Logical field name.
	pub name: String,
	/// Physical column name.
	pub column: String,
	pub column_type: ColumnType,
	pub nullable: bool,
	/// Backfill default: used to fill existing rows during an alteration,
	/// then dropped from the column.
	pub default: Option<SqlValue>,
	/// Persistent database-level default, kept declared on the column.
	pub db_default: Option<DbDefault>,
	pub unique: bool,
	pub primary_key: bool,
	pub collation: Option<String>,
	pub comment: Option<String>,
	pub relation: Option<RelationDescription>,
	/// Whether a plain single-column index is declared on this field.
	pub db_index: bool,
}

impl FieldDescription {
	/// Create a NOT NULL field whose column name equals its field name.
	pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
		let name = name.into();
		Self {
			column: name.clone(),
			name,
			column_type,
			nullable: false,
			default: None,
			db_default: None,
			unique: false,
			primary_key: false,
			collation: None,
			comment: None,
			relation: None,
			db_index: false,
		}
	}

	pub fn with_column(mut self, column: impl Into<String>) -> Self {
		self.column = column.into();
		self
	}

	pub fn with_nullable(mut self, nullable: bool) -> Self {
		self.nullable = nullable;
		self
	}

	pub fn with_default(mut self, default: impl Into<SqlValue>) -> Self {
		self.default = Some(default.into());
		self
	}

	pub fn with_db_default(mut self, db_default: DbDefault) -> Self {
		self.db_default = Some(db_default);
		self
	}

	pub fn with_unique(mut self, unique: bool) -> Self {
		self.unique = unique;
		self
	}

	pub fn with_primary_key(mut self, primary_key: bool) -> Self {
		self.primary_key = primary_key;
		self
	}

	pub fn with_collation(mut self, collation: impl Into<String>) -> Self {
		self.collation = Some(collation.into());
		self
	}

	pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
		self.comment = Some(comment.into());
		self
	}

	pub fn with_relation(mut self, relation: RelationDescription) -> Self {
		self.relation = Some(relation);
		self
	}

	pub fn with_db_index(mut self, db_index: bool) -> Self {
		self.db_index = db_index;
		self
	}

	/// Whether a value exists to fill existing rows when this field is added
	/// or made NOT NULL.
	pub fn has_usable_default(&self) -> bool {
		self.default.is_some() || self.db_default.is_some()
	}

	/// The value used to backfill existing rows, if any.
	pub fn effective_default(&self) -> Option<DbDefault> {
		if let Some(value) = &self.default {
			return Some(DbDefault::Value(value.clone()));
		}
		self.db_default.clone()
	}
}
