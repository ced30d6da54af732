//! Backend capability descriptors and connections for the Vola schema
//! engine.
//!
//! The schema editor is vendor-agnostic: every dialect difference lives in a
//! [`BackendDescriptor`] value (feature flags, SQL templates, quoting, name
//! generation) injected at construction time. This crate ships descriptors
//! for PostgreSQL, MySQL/MariaDB and SQLite, the async [`SchemaConnection`]
//! interface the editor executes on, a [`RecordingConnection`] that captures
//! rendered SQL for tests, and sqlx-backed drivers behind the `postgres`,
//! `mysql` and `sqlite` features.

pub mod compiler;
pub mod connection;
pub mod descriptor;
pub mod drivers;

pub use compiler::GenericExpressionCompiler;
pub use connection::{
	ConnectionError, ConstraintInfo, ConstraintKind, RecordingConnection, SchemaConnection,
};
pub use descriptor::{BackendDescriptor, BackendFeatures, SqlTemplates, Vendor};
