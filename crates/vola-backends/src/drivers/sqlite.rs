//! SQLite driver.

use crate::connection::{ConnectionError, SchemaConnection};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Connection, Executor, Row, SqliteConnection};
use vola_ddl::SqlValue;

/// A single dedicated SQLite connection.
pub struct SqliteSchemaConnection {
	connection: SqliteConnection,
}

impl SqliteSchemaConnection {
	pub async fn connect(url: &str) -> Result<Self, ConnectionError> {
		let connection = SqliteConnection::connect(url).await?;
		Ok(Self { connection })
	}

	pub fn from_connection(connection: SqliteConnection) -> Self {
		Self { connection }
	}
}

fn bind_value<'q>(
	query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
	value: &'q SqlValue,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
	match value {
		SqlValue::Null => query.bind(None::<String>),
		SqlValue::Bool(b) => query.bind(*b),
		SqlValue::Int(i) => query.bind(*i),
		SqlValue::Float(f) => query.bind(*f),
		SqlValue::String(s) => query.bind(s.as_str()),
		SqlValue::Bytes(bytes) => query.bind(bytes.as_slice()),
		SqlValue::Timestamp(ts) => query.bind(*ts),
		SqlValue::Uuid(u) => query.bind(u.to_string()),
	}
}

#[async_trait]
impl SchemaConnection for SqliteSchemaConnection {
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
		let rows: Vec<SqliteRow> =
			sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
				.fetch_all(&mut self.connection)
				.await?;
		Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
	}
}
