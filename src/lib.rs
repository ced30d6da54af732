//! Vola: a standalone schema-alteration (DDL) engine.
//!
//! Vola executes schema changes (create and drop tables; add, alter and
//! remove columns, indexes and constraints) against PostgreSQL,
//! MySQL/MariaDB and SQLite from one vendor-agnostic editor. Dialect
//! differences live entirely in an injected backend capability descriptor;
//! statements that depend on objects created later in the same scope are
//! deferred and flushed in order at commit, with renames propagated over the
//! queue in the meantime.
//!
//! The facade re-exports the four engine crates:
//!
//! - [`ddl`]: reference-tracked statements and the expression tree
//! - [`models`]: static field/model/index/constraint descriptions
//! - [`backends`]: capability descriptors, connections and drivers
//! - [`editor`]: the schema editor and the alteration planner
//!
//! # Example
//!
//! ```rust
//! use vola::backends::{BackendDescriptor, RecordingConnection};
//! use vola::editor::SchemaEditor;
//! use vola::models::{ColumnType, FieldDescription, ModelDescription};
//!
//! # async fn example() -> Result<(), vola::editor::SchemaError> {
//! let connection = RecordingConnection::new();
//! let mut editor = SchemaEditor::new(BackendDescriptor::postgres(), connection);
//!
//! let users = ModelDescription::new("users")
//!     .with_field(FieldDescription::new("id", ColumnType::BigInt).with_primary_key(true))
//!     .with_field(FieldDescription::new("email", ColumnType::VarChar(255)).with_unique(true));
//! editor.create_model(&users).await?;
//! editor.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Enable the `postgres`, `mysql` or `sqlite` feature for the corresponding
//! sqlx-backed connection type.

pub use vola_backends as backends;
pub use vola_ddl as ddl;
pub use vola_editor as editor;
pub use vola_models as models;

pub use vola_backends::{BackendDescriptor, SchemaConnection};
pub use vola_editor::{SchemaEditor, SchemaError};
pub use vola_models::ModelDescription;
