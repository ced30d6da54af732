//! Reference tracking for schema-alteration DDL.
//!
//! Every SQL statement the schema editor produces mentions named database
//! objects: tables, columns, indexes, foreign keys. While a schema-edit
//! scope is open, some of those statements sit on a deferred queue and the
//! objects they mention may be renamed before the queue is flushed. This
//! crate provides the value objects that make that safe:
//!
//! - [`DdlReference`]: the six-operation protocol every tracked object
//!   implements (`references_table`, `references_column`, `references_index`,
//!   `rename_table`, `rename_column`, `render`), with no-op defaults so a
//!   [`Statement`] can fan out over its parts without type inspection.
//! - The reference variants: [`Table`], [`Columns`], [`IndexColumns`],
//!   [`IndexName`], [`ForeignKeyName`], [`Expressions`].
//! - [`Statement`]: a not-yet-rendered SQL statement: a template plus named
//!   parts, where each part is either a reference or plain text.
//! - [`SqlValue`] / [`DbDefault`]: SQL literal values and database-level
//!   defaults.
//! - [`SqlExpression`]: the minimal expression tree consumed by functional
//!   indexes and expression-bearing constraints, with the
//!   [`ExpressionCompiler`] seam to the SQL-rendering side.

pub mod expression;
pub mod reference;
pub mod statement;
pub mod value;

pub use expression::{ExpressionCompiler, SqlExpression};
pub use reference::{
	Columns, DdlReference, Expressions, ForeignKeyName, IndexColumns, IndexName, IndexNamer,
	QuoteName, QuoteValue, Table,
};
pub use statement::{Statement, StatementPart};
pub use value::{DbDefault, SqlValue};
