//! Minimal expression tree for functional indexes and expression-bearing
//! constraints.
//!
//! The schema engine does not build or execute queries; it only needs enough
//! expression structure to render index/constraint definitions, enumerate
//! the physical columns an expression touches, and rewrite column and table
//! references when objects are renamed while statements are still pending.

use crate::value::SqlValue;
use serde::{Deserialize, Serialize};

/// An expression attached to an index or constraint definition.
///
/// # Example
///
/// ```rust
/// use vola_ddl::SqlExpression;
///
/// // LOWER("email")
/// let expr = SqlExpression::func("LOWER", vec![SqlExpression::column("users", "email")]);
/// assert_eq!(expr.columns(), vec!["email".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlExpression {
	/// A reference to a physical column, qualified by its table alias.
	Column { table: String, column: String },
	/// A literal value, compiled to a `%s` placeholder plus parameter.
	Value(SqlValue),
	/// A function call, e.g. `LOWER(...)`.
	Func {
		name: String,
		args: Vec<SqlExpression>,
	},
	/// A binary operation, e.g. `price * quantity`.
	BinaryOp {
		left: Box<SqlExpression>,
		op: String,
		right: Box<SqlExpression>,
	},
	/// An ordering wrapper used in index definitions (`DESC`, `NULLS LAST`).
	Ordered {
		expr: Box<SqlExpression>,
		descending: bool,
		nulls_first: Option<bool>,
	},
}

impl SqlExpression {
	pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
		SqlExpression::Column {
			table: table.into(),
			column: column.into(),
		}
	}

	pub fn value(value: impl Into<SqlValue>) -> Self {
		SqlExpression::Value(value.into())
	}

	pub fn func(name: impl Into<String>, args: Vec<SqlExpression>) -> Self {
		SqlExpression::Func {
			name: name.into(),
			args,
		}
	}

	pub fn binary(left: SqlExpression, op: impl Into<String>, right: SqlExpression) -> Self {
		SqlExpression::BinaryOp {
			left: Box::new(left),
			op: op.into(),
			right: Box::new(right),
		}
	}

	pub fn desc(expr: SqlExpression) -> Self {
		SqlExpression::Ordered {
			expr: Box::new(expr),
			descending: true,
			nulls_first: None,
		}
	}

	/// Returns a copy of the tree with every column reference to `old_alias`
	/// relabeled to `new_alias`.
	///
	/// Compiled SQL embeds the table alias, so a table rename must relabel
	/// the tree before re-rendering.
	pub fn relabeled(&self, old_alias: &str, new_alias: &str) -> Self {
		match self {
			SqlExpression::Column { table, column } if table == old_alias => {
				SqlExpression::Column {
					table: new_alias.to_string(),
					column: column.clone(),
				}
			}
			SqlExpression::Column { .. } | SqlExpression::Value(_) => self.clone(),
			SqlExpression::Func { name, args } => SqlExpression::Func {
				name: name.clone(),
				args: args
					.iter()
					.map(|a| a.relabeled(old_alias, new_alias))
					.collect(),
			},
			SqlExpression::BinaryOp { left, op, right } => SqlExpression::BinaryOp {
				left: Box::new(left.relabeled(old_alias, new_alias)),
				op: op.clone(),
				right: Box::new(right.relabeled(old_alias, new_alias)),
			},
			SqlExpression::Ordered {
				expr,
				descending,
				nulls_first,
			} => SqlExpression::Ordered {
				expr: Box::new(expr.relabeled(old_alias, new_alias)),
				descending: *descending,
				nulls_first: *nulls_first,
			},
		}
	}

	/// Rewrites every reference to `old_column` to point at `new_column`.
	pub fn rename_column_refs(&mut self, old_column: &str, new_column: &str) {
		match self {
			SqlExpression::Column { column, .. } => {
				if column == old_column {
					*column = new_column.to_string();
				}
			}
			SqlExpression::Value(_) => {}
			SqlExpression::Func { args, .. } => {
				for arg in args {
					arg.rename_column_refs(old_column, new_column);
				}
			}
			SqlExpression::BinaryOp { left, right, .. } => {
				left.rename_column_refs(old_column, new_column);
				right.rename_column_refs(old_column, new_column);
			}
			SqlExpression::Ordered { expr, .. } => {
				expr.rename_column_refs(old_column, new_column);
			}
		}
	}

	/// Enumerates the physical columns this expression touches, in traversal
	/// order, without duplicates.
	pub fn columns(&self) -> Vec<String> {
		let mut out = Vec::new();
		self.collect_columns(&mut out);
		out
	}

	fn collect_columns(&self, out: &mut Vec<String>) {
		match self {
			SqlExpression::Column { column, .. } => {
				if !out.iter().any(|c| c == column) {
					out.push(column.clone());
				}
			}
			SqlExpression::Value(_) => {}
			SqlExpression::Func { args, .. } => {
				for arg in args {
					arg.collect_columns(out);
				}
			}
			SqlExpression::BinaryOp { left, right, .. } => {
				left.collect_columns(out);
				right.collect_columns(out);
			}
			SqlExpression::Ordered { expr, .. } => expr.collect_columns(out),
		}
	}
}

/// Compiles an expression tree to SQL text plus parameters.
///
/// The SQL string uses `%s` placeholders, one per parameter, in order. The
/// schema engine inlines the parameters as quoted literals at statement
/// render time.
pub trait ExpressionCompiler: Send + Sync {
	fn compile(&self, expression: &SqlExpression) -> (String, Vec<SqlValue>);
}
