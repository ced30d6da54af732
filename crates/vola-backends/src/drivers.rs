//! sqlx-backed drivers, one per vendor, behind cargo features.
//!
//! Each driver holds a single dedicated connection: the engine's resource
//! model is one schema-edit scope per connection, so pools stay out of this
//! layer.

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "mysql")]
pub use mysql::MysqlSchemaConnection;
#[cfg(feature = "postgres")]
pub use postgres::PostgresSchemaConnection;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSchemaConnection;
