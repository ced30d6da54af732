//! Backend capability descriptors.
//!
//! A descriptor is a plain value injected into the schema editor: a table of
//! feature flags, the named-slot SQL templates for every operation, the
//! identifier/value quoting rules and the deterministic name generation for
//! indexes, constraints and foreign keys. The editor never branches on a
//! vendor name; it consults the descriptor it was constructed with.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use vola_ddl::{IndexNamer, QuoteName, QuoteValue, SqlValue};
use vola_models::ColumnType;

/// Supported database vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vendor {
	Postgres,
	Mysql,
	Sqlite,
}

impl Vendor {
	pub fn as_str(&self) -> &'static str {
		match self {
			Vendor::Postgres => "postgresql",
			Vendor::Mysql => "mysql",
			Vendor::Sqlite => "sqlite",
		}
	}
}

/// Boolean feature flags consumed by the schema editor and the alteration
/// planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendFeatures {
	/// DDL participates in transactions and can be rolled back.
	pub can_rollback_ddl: bool,
	pub supports_foreign_keys: bool,
	/// Foreign keys are declared inline in the column definition rather
	/// than as separate `ADD CONSTRAINT` statements.
	pub can_create_inline_fk: bool,
	/// Multiple ALTER clauses may be combined into one `ALTER TABLE`.
	pub supports_combined_alters: bool,
	/// The backend can alter columns in place; when false, any change to a
	/// column definition requires a full table rebuild.
	pub can_alter_table: bool,
	pub can_alter_table_drop_column: bool,
	pub supports_column_collations: bool,
	pub supports_comments: bool,
	/// Comments are part of the column/table definition rather than a
	/// separate `COMMENT ON` statement.
	pub supports_comments_inline: bool,
	pub supports_expression_indexes: bool,
	pub supports_partial_indexes: bool,
	pub supports_covering_indexes: bool,
	pub supports_deferrable_unique_constraints: bool,
	pub supports_exclusion_constraints: bool,
	pub supports_table_check_constraints: bool,
	pub ignores_table_name_case: bool,
	/// The backend auto-indexes foreign-key columns; adding an explicit
	/// index for them is redundant.
	pub indexes_foreign_keys: bool,
	/// Column defaults must be rendered as literals in the DDL instead of
	/// being attached afterwards.
	pub requires_literal_defaults: bool,
	pub supports_rename_index: bool,
}

/// Named-slot SQL templates, `%(slot)s` style.
///
/// A `None` template means the backend has no statement for the operation;
/// the editor checks the corresponding feature flag first and never renders
/// a missing template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlTemplates {
	pub create_table: &'static str,
	pub rename_table: &'static str,
	pub delete_table: &'static str,
	pub create_column: &'static str,
	pub alter_column: &'static str,
	pub alter_column_type: &'static str,
	pub alter_column_null: &'static str,
	pub alter_column_not_null: &'static str,
	pub alter_column_default: &'static str,
	pub alter_column_no_default: &'static str,
	pub delete_column: &'static str,
	pub rename_column: &'static str,
	pub update_with_default: &'static str,
	pub create_check: &'static str,
	pub create_unique: &'static str,
	pub create_fk: &'static str,
	pub create_inline_fk: Option<&'static str>,
	pub delete_constraint: &'static str,
	pub delete_fk: &'static str,
	pub create_index: &'static str,
	pub create_unique_index: &'static str,
	pub rename_index: Option<&'static str>,
	pub delete_index: &'static str,
	pub create_exclusion: Option<&'static str>,
	pub alter_table_comment: Option<&'static str>,
	pub alter_column_comment: Option<&'static str>,
}

const POSTGRES_TEMPLATES: SqlTemplates = SqlTemplates {
	create_table: "CREATE TABLE %(table)s (%(definition)s)",
	rename_table: "ALTER TABLE %(old_table)s RENAME TO %(new_table)s",
	delete_table: "DROP TABLE %(table)s CASCADE",
	create_column: "ALTER TABLE %(table)s ADD COLUMN %(column)s %(definition)s",
	alter_column: "ALTER TABLE %(table)s %(changes)s",
	alter_column_type: "ALTER COLUMN %(column)s TYPE %(type)s%(collation)s",
	alter_column_null: "ALTER COLUMN %(column)s DROP NOT NULL",
	alter_column_not_null: "ALTER COLUMN %(column)s SET NOT NULL",
	alter_column_default: "ALTER COLUMN %(column)s SET DEFAULT %(default)s",
	alter_column_no_default: "ALTER COLUMN %(column)s DROP DEFAULT",
	delete_column: "ALTER TABLE %(table)s DROP COLUMN %(column)s CASCADE",
	rename_column: "ALTER TABLE %(table)s RENAME COLUMN %(old_column)s TO %(new_column)s",
	update_with_default: "UPDATE %(table)s SET %(column)s = %(default)s WHERE %(column)s IS NULL",
	create_check: "ALTER TABLE %(table)s ADD CONSTRAINT %(name)s CHECK (%(check)s)",
	create_unique: "ALTER TABLE %(table)s ADD CONSTRAINT %(name)s UNIQUE (%(columns)s)%(deferrable)s",
	create_fk: "ALTER TABLE %(table)s ADD CONSTRAINT %(name)s FOREIGN KEY (%(column)s) REFERENCES %(to_table)s (%(to_column)s)%(on_delete)s",
	create_inline_fk: None,
	delete_constraint: "ALTER TABLE %(table)s DROP CONSTRAINT %(name)s",
	delete_fk: "ALTER TABLE %(table)s DROP CONSTRAINT %(name)s",
	create_index: "CREATE INDEX %(name)s ON %(table)s%(using)s (%(columns)s)%(with)s%(include)s%(condition)s",
	create_unique_index: "CREATE UNIQUE INDEX %(name)s ON %(table)s%(using)s (%(columns)s)%(with)s%(include)s%(condition)s",
	rename_index: Some("ALTER INDEX %(old_name)s RENAME TO %(new_name)s"),
	delete_index: "DROP INDEX %(name)s",
	create_exclusion: Some(
		"ALTER TABLE %(table)s ADD CONSTRAINT %(name)s EXCLUDE USING %(index_type)s (%(expressions)s)%(include)s%(condition)s%(deferrable)s",
	),
	alter_table_comment: Some("COMMENT ON TABLE %(table)s IS %(comment)s"),
	alter_column_comment: Some("COMMENT ON COLUMN %(table)s.%(column)s IS %(comment)s"),
};

const MYSQL_TEMPLATES: SqlTemplates = SqlTemplates {
	create_table: "CREATE TABLE %(table)s (%(definition)s)",
	rename_table: "RENAME TABLE %(old_table)s TO %(new_table)s",
	delete_table: "DROP TABLE %(table)s",
	create_column: "ALTER TABLE %(table)s ADD COLUMN %(column)s %(definition)s",
	alter_column: "ALTER TABLE %(table)s %(changes)s",
	alter_column_type: "MODIFY %(column)s %(type)s%(collation)s",
	alter_column_null: "MODIFY %(column)s %(type)s NULL",
	alter_column_not_null: "MODIFY %(column)s %(type)s NOT NULL",
	alter_column_default: "ALTER COLUMN %(column)s SET DEFAULT %(default)s",
	alter_column_no_default: "ALTER COLUMN %(column)s DROP DEFAULT",
	delete_column: "ALTER TABLE %(table)s DROP COLUMN %(column)s",
	rename_column: "ALTER TABLE %(table)s RENAME COLUMN %(old_column)s TO %(new_column)s",
	update_with_default: "UPDATE %(table)s SET %(column)s = %(default)s WHERE %(column)s IS NULL",
	create_check: "ALTER TABLE %(table)s ADD CONSTRAINT %(name)s CHECK (%(check)s)",
	create_unique: "ALTER TABLE %(table)s ADD CONSTRAINT %(name)s UNIQUE (%(columns)s)%(deferrable)s",
	create_fk: "ALTER TABLE %(table)s ADD CONSTRAINT %(name)s FOREIGN KEY (%(column)s) REFERENCES %(to_table)s (%(to_column)s)%(on_delete)s",
	create_inline_fk: None,
	delete_constraint: "ALTER TABLE %(table)s DROP CONSTRAINT %(name)s",
	delete_fk: "ALTER TABLE %(table)s DROP FOREIGN KEY %(name)s",
	create_index: "CREATE INDEX %(name)s ON %(table)s%(using)s (%(columns)s)%(with)s%(include)s%(condition)s",
	create_unique_index: "CREATE UNIQUE INDEX %(name)s ON %(table)s%(using)s (%(columns)s)%(with)s%(include)s%(condition)s",
	rename_index: Some("ALTER TABLE %(table)s RENAME INDEX %(old_name)s TO %(new_name)s"),
	delete_index: "DROP INDEX %(name)s ON %(table)s",
	create_exclusion: None,
	alter_table_comment: Some("ALTER TABLE %(table)s COMMENT = %(comment)s"),
	alter_column_comment: None,
};

const SQLITE_TEMPLATES: SqlTemplates = SqlTemplates {
	create_table: "CREATE TABLE %(table)s (%(definition)s)",
	rename_table: "ALTER TABLE %(old_table)s RENAME TO %(new_table)s",
	delete_table: "DROP TABLE %(table)s",
	create_column: "ALTER TABLE %(table)s ADD COLUMN %(column)s %(definition)s",
	alter_column: "ALTER TABLE %(table)s %(changes)s",
	alter_column_type: "ALTER COLUMN %(column)s TYPE %(type)s%(collation)s",
	alter_column_null: "ALTER COLUMN %(column)s DROP NOT NULL",
	alter_column_not_null: "ALTER COLUMN %(column)s SET NOT NULL",
	alter_column_default: "ALTER COLUMN %(column)s SET DEFAULT %(default)s",
	alter_column_no_default: "ALTER COLUMN %(column)s DROP DEFAULT",
	delete_column: "ALTER TABLE %(table)s DROP COLUMN %(column)s",
	rename_column: "ALTER TABLE %(table)s RENAME COLUMN %(old_column)s TO %(new_column)s",
	update_with_default: "UPDATE %(table)s SET %(column)s = %(default)s WHERE %(column)s IS NULL",
	create_check: "ALTER TABLE %(table)s ADD CONSTRAINT %(name)s CHECK (%(check)s)",
	create_unique: "ALTER TABLE %(table)s ADD CONSTRAINT %(name)s UNIQUE (%(columns)s)%(deferrable)s",
	create_fk: "ALTER TABLE %(table)s ADD CONSTRAINT %(name)s FOREIGN KEY (%(column)s) REFERENCES %(to_table)s (%(to_column)s)%(on_delete)s",
	create_inline_fk: Some("REFERENCES %(to_table)s (%(to_column)s) DEFERRABLE INITIALLY DEFERRED"),
	delete_constraint: "ALTER TABLE %(table)s DROP CONSTRAINT %(name)s",
	delete_fk: "ALTER TABLE %(table)s DROP CONSTRAINT %(name)s",
	create_index: "CREATE INDEX %(name)s ON %(table)s%(using)s (%(columns)s)%(with)s%(include)s%(condition)s",
	create_unique_index: "CREATE UNIQUE INDEX %(name)s ON %(table)s%(using)s (%(columns)s)%(with)s%(include)s%(condition)s",
	rename_index: None,
	delete_index: "DROP INDEX %(name)s",
	create_exclusion: None,
	alter_table_comment: None,
	alter_column_comment: None,
};

/// Everything the schema editor needs to know about one backend.
///
/// # Example
///
/// ```rust
/// use vola_backends::BackendDescriptor;
///
/// let pg = BackendDescriptor::postgres();
/// assert!(pg.features.can_rollback_ddl);
/// assert_eq!(pg.quote_name("users"), "\"users\"");
///
/// let mysql = BackendDescriptor::mysql();
/// assert_eq!(mysql.quote_name("users"), "`users`");
/// ```
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
	pub vendor: Vendor,
	pub features: BackendFeatures,
	pub templates: SqlTemplates,
	pub max_name_length: usize,
}

impl BackendDescriptor {
	pub fn postgres() -> Self {
		Self {
			vendor: Vendor::Postgres,
			features: BackendFeatures {
				can_rollback_ddl: true,
				supports_foreign_keys: true,
				can_create_inline_fk: false,
				supports_combined_alters: true,
				can_alter_table: true,
				can_alter_table_drop_column: true,
				supports_column_collations: true,
				supports_comments: true,
				supports_comments_inline: false,
				supports_expression_indexes: true,
				supports_partial_indexes: true,
				supports_covering_indexes: true,
				supports_deferrable_unique_constraints: true,
				supports_exclusion_constraints: true,
				supports_table_check_constraints: true,
				ignores_table_name_case: false,
				indexes_foreign_keys: false,
				requires_literal_defaults: false,
				supports_rename_index: true,
			},
			templates: POSTGRES_TEMPLATES,
			max_name_length: 63,
		}
	}

	pub fn mysql() -> Self {
		Self {
			vendor: Vendor::Mysql,
			features: BackendFeatures {
				can_rollback_ddl: false,
				supports_foreign_keys: true,
				can_create_inline_fk: false,
				supports_combined_alters: true,
				can_alter_table: true,
				can_alter_table_drop_column: true,
				supports_column_collations: true,
				supports_comments: true,
				supports_comments_inline: true,
				supports_expression_indexes: true,
				supports_partial_indexes: false,
				supports_covering_indexes: false,
				supports_deferrable_unique_constraints: false,
				supports_exclusion_constraints: false,
				supports_table_check_constraints: true,
				ignores_table_name_case: true,
				indexes_foreign_keys: true,
				requires_literal_defaults: true,
				supports_rename_index: true,
			},
			templates: MYSQL_TEMPLATES,
			max_name_length: 64,
		}
	}

	pub fn sqlite() -> Self {
		Self {
			vendor: Vendor::Sqlite,
			features: BackendFeatures {
				can_rollback_ddl: true,
				supports_foreign_keys: true,
				can_create_inline_fk: true,
				supports_combined_alters: false,
				can_alter_table: false,
				can_alter_table_drop_column: false,
				supports_column_collations: true,
				supports_comments: false,
				supports_comments_inline: false,
				supports_expression_indexes: true,
				supports_partial_indexes: true,
				supports_covering_indexes: false,
				supports_deferrable_unique_constraints: false,
				supports_exclusion_constraints: false,
				supports_table_check_constraints: true,
				ignores_table_name_case: false,
				indexes_foreign_keys: false,
				requires_literal_defaults: true,
				supports_rename_index: false,
			},
			templates: SQLITE_TEMPLATES,
			max_name_length: 128,
		}
	}

	/// Quote an identifier. Embedded quote characters are doubled.
	pub fn quote_name(&self, name: &str) -> String {
		match self.vendor {
			Vendor::Postgres | Vendor::Sqlite => {
				format!("\"{}\"", name.replace('"', "\"\""))
			}
			Vendor::Mysql => format!("`{}`", name.replace('`', "``")),
		}
	}

	/// Render a literal value for inclusion in DDL text.
	pub fn quote_value(&self, value: &SqlValue) -> String {
		match value {
			SqlValue::Null => "NULL".to_string(),
			SqlValue::Bool(b) => match self.vendor {
				Vendor::Sqlite => if *b { "1" } else { "0" }.to_string(),
				_ => if *b { "TRUE" } else { "FALSE" }.to_string(),
			},
			SqlValue::Int(i) => i.to_string(),
			SqlValue::Float(f) => f.to_string(),
			SqlValue::String(s) => format!("'{}'", s.replace('\'', "''")),
			SqlValue::Bytes(bytes) => {
				let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
				match self.vendor {
					Vendor::Postgres => format!("'\\x{hex}'"),
					Vendor::Mysql | Vendor::Sqlite => format!("X'{hex}'"),
				}
			}
			SqlValue::Timestamp(ts) => {
				format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S%.6f%:z"))
			}
			SqlValue::Uuid(u) => format!("'{u}'"),
		}
	}

	/// Generate a deterministic index/constraint name.
	///
	/// Shape: `<table>_<columns joined by _>_<digest><suffix>` where the
	/// digest is the first 8 hex chars of the sha256 of the inputs. When the
	/// result exceeds the backend's identifier limit, the front is truncated
	/// so the digest and suffix always survive; same inputs give the same
	/// name in every process.
	pub fn index_name(&self, table: &str, columns: &[String], suffix: &str) -> String {
		let mut hasher = Sha256::new();
		hasher.update(table.as_bytes());
		for column in columns {
			hasher.update(b".");
			hasher.update(column.as_bytes());
		}
		hasher.update(b".");
		hasher.update(suffix.as_bytes());
		let digest = hasher.finalize();
		let digest_hex: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();

		let base = format!("{}_{}", table, columns.join("_"));
		let tail = format!("_{digest_hex}{suffix}");
		let budget = self.max_name_length.saturating_sub(tail.len());
		let head: String = base.chars().take(budget).collect();
		format!("{head}{tail}")
	}

	/// The SQL type string for an abstract column type.
	pub fn column_sql_type(&self, column_type: &ColumnType) -> String {
		match column_type {
			ColumnType::BigInt => match self.vendor {
				Vendor::Sqlite => "integer".to_string(),
				_ => "bigint".to_string(),
			},
			ColumnType::Integer => "integer".to_string(),
			ColumnType::SmallInt => match self.vendor {
				Vendor::Sqlite => "integer".to_string(),
				_ => "smallint".to_string(),
			},
			ColumnType::Boolean => match self.vendor {
				Vendor::Postgres => "boolean".to_string(),
				Vendor::Mysql => "bool".to_string(),
				Vendor::Sqlite => "bool".to_string(),
			},
			ColumnType::Char(n) => format!("char({n})"),
			ColumnType::VarChar(n) => format!("varchar({n})"),
			ColumnType::Text => match self.vendor {
				Vendor::Mysql => "longtext".to_string(),
				_ => "text".to_string(),
			},
			ColumnType::Date => "date".to_string(),
			ColumnType::Time => match self.vendor {
				Vendor::Mysql => "time(6)".to_string(),
				_ => "time".to_string(),
			},
			ColumnType::DateTime => match self.vendor {
				Vendor::Postgres => "timestamp with time zone".to_string(),
				Vendor::Mysql => "datetime(6)".to_string(),
				Vendor::Sqlite => "datetime".to_string(),
			},
			ColumnType::Decimal { precision, scale } => {
				format!("numeric({precision}, {scale})")
			}
			ColumnType::Double => match self.vendor {
				Vendor::Postgres => "double precision".to_string(),
				Vendor::Mysql => "double precision".to_string(),
				Vendor::Sqlite => "real".to_string(),
			},
			ColumnType::Real => "real".to_string(),
			ColumnType::Blob => match self.vendor {
				Vendor::Postgres => "bytea".to_string(),
				Vendor::Mysql => "longblob".to_string(),
				Vendor::Sqlite => "BLOB".to_string(),
			},
			ColumnType::Json => match self.vendor {
				Vendor::Postgres => "jsonb".to_string(),
				_ => "json".to_string(),
			},
			ColumnType::Uuid => match self.vendor {
				Vendor::Postgres => "uuid".to_string(),
				Vendor::Mysql => "char(32)".to_string(),
				Vendor::Sqlite => "char(32)".to_string(),
			},
			ColumnType::Custom(sql) => sql.clone(),
		}
	}

	/// An identifier-quoting closure usable by the reference model.
	pub fn quote_fn(&self) -> QuoteName {
		let vendor = self.vendor;
		Arc::new(move |name: &str| match vendor {
			Vendor::Postgres | Vendor::Sqlite => {
				format!("\"{}\"", name.replace('"', "\"\""))
			}
			Vendor::Mysql => format!("`{}`", name.replace('`', "``")),
		})
	}

	/// A value-quoting closure usable by the reference model.
	pub fn quote_value_fn(&self) -> QuoteValue {
		let descriptor = self.clone();
		Arc::new(move |value: &SqlValue| descriptor.quote_value(value))
	}

	/// A name-generation closure usable by the reference model.
	pub fn namer_fn(&self) -> IndexNamer {
		let descriptor = self.clone();
		Arc::new(move |table: &str, columns: &[String], suffix: &str| {
			descriptor.index_name(table, columns, suffix)
		})
	}
}
