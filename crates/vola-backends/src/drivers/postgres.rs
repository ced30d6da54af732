//! PostgreSQL driver.

use crate::connection::{ConnectionError, ConstraintInfo, ConstraintKind, SchemaConnection};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Connection, Executor, PgConnection, Row};
use vola_ddl::SqlValue;

/// A single dedicated PostgreSQL connection.
///
/// # Example
///
/// ```rust,no_run
/// use vola_backends::drivers::postgres::PostgresSchemaConnection;
///
/// # async fn example() -> Result<(), vola_backends::ConnectionError> {
/// let connection =
///     PostgresSchemaConnection::connect("postgresql://localhost/mydb").await?;
/// # Ok(())
/// # }
/// ```
pub struct PostgresSchemaConnection {
	connection: PgConnection,
}

impl PostgresSchemaConnection {
	pub async fn connect(url: &str) -> Result<Self, ConnectionError> {
		let connection = PgConnection::connect(url).await?;
		Ok(Self { connection })
	}

	pub fn from_connection(connection: PgConnection) -> Self {
		Self { connection }
	}
}

fn bind_value<'q>(
	query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
	value: &'q SqlValue,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
	match value {
		SqlValue::Null => query.bind(None::<String>),
		SqlValue::Bool(b) => query.bind(*b),
		SqlValue::Int(i) => query.bind(*i),
		SqlValue::Float(f) => query.bind(*f),
		SqlValue::String(s) => query.bind(s.as_str()),
		SqlValue::Bytes(bytes) => query.bind(bytes.as_slice()),
		SqlValue::Timestamp(ts) => query.bind(*ts),
		SqlValue::Uuid(u) => query.bind(*u),
	}
}

#[async_trait]
impl SchemaConnection for PostgresSchemaConnection {
	async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, ConnectionError> {
		let mut query = sqlx::query(sql);
		for param in params {
			query = bind_value(query, param);
		}
		let result = query.execute(&mut self.connection).await?;
		Ok(result.rows_affected())
	}

	async fn begin(&mut self) -> Result<(), ConnectionError> {
		self.connection.execute("BEGIN").await?;
		Ok(())
	}

	async fn commit(&mut self) -> Result<(), ConnectionError> {
		self.connection.execute("COMMIT").await?;
		Ok(())
	}

	async fn rollback(&mut self) -> Result<(), ConnectionError> {
		self.connection.execute("ROLLBACK").await?;
		Ok(())
	}

	async fn table_names(&mut self) -> Result<Vec<String>, ConnectionError> {
		let rows: Vec<PgRow> = sqlx::query(
			"SELECT tablename FROM pg_catalog.pg_tables WHERE schemaname = 'public'",
		)
		.fetch_all(&mut self.connection)
		.await?;
		Ok(rows
			.iter()
			.map(|row| row.get::<String, _>("tablename"))
			.collect())
	}

	async fn get_constraints(
		&mut self,
		table: &str,
	) -> Result<Vec<ConstraintInfo>, ConnectionError> {
		let rows: Vec<PgRow> = sqlx::query(
			"SELECT c.conname AS name, c.contype AS kind, \
			 ARRAY(SELECT a.attname FROM pg_attribute a \
			       WHERE a.attrelid = c.conrelid AND a.attnum = ANY(c.conkey)) AS columns \
			 FROM pg_constraint c \
			 JOIN pg_class t ON t.oid = c.conrelid \
			 WHERE t.relname = $1",
		)
		.bind(table)
		.fetch_all(&mut self.connection)
		.await?;
		Ok(rows
			.iter()
			.map(|row| {
				let kind = match row.get::<i8, _>("kind") as u8 as char {
					'p' => ConstraintKind::PrimaryKey,
					'u' => ConstraintKind::Unique,
					'f' => ConstraintKind::ForeignKey,
					'c' => ConstraintKind::Check,
					_ => ConstraintKind::Index,
				};
				ConstraintInfo {
					name: row.get("name"),
					columns: row.get("columns"),
					kind,
				}
			})
			.collect())
	}

	async fn get_primary_key_column(
		&mut self,
		table: &str,
	) -> Result<Option<String>, ConnectionError> {
		let row: Option<PgRow> = sqlx::query(
			"SELECT a.attname FROM pg_index i \
			 JOIN pg_class t ON t.oid = i.indrelid \
			 JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(i.indkey) \
			 WHERE t.relname = $1 AND i.indisprimary LIMIT 1",
		)
		.bind(table)
		.fetch_optional(&mut self.connection)
		.await?;
		Ok(row.map(|r| r.get("attname")))
	}
}
