//! Reference variants for named SQL objects.
//!
//! A reference knows which tables/columns/indexes it mentions, can rewrite
//! itself when one of them is renamed, and renders to the text that will
//! appear in the final SQL. Statements queued for deferred execution hold
//! references instead of rendered text, so renames applied before the flush
//! are reflected in the SQL that eventually runs.

use crate::expression::{ExpressionCompiler, SqlExpression};
use crate::value::SqlValue;
use std::sync::Arc;

/// Quotes an identifier according to the backend's rules.
pub type QuoteName = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Renders a literal value according to the backend's rules.
pub type QuoteValue = Arc<dyn Fn(&SqlValue) -> String + Send + Sync>;

/// Generates a deterministic index/constraint name from
/// `(table, columns, suffix)`.
pub type IndexNamer = Arc<dyn Fn(&str, &[String], &str) -> String + Send + Sync>;

/// The tracking protocol shared by every reference variant.
///
/// Every variant implements all six operations; the defaults return `false`
/// or do nothing. This uniformity lets [`crate::Statement`] fan out over its
/// parts with plain dynamic dispatch, no type inspection.
pub trait DdlReference: Send + Sync {
	/// Whether the rendered SQL of this reference mentions `name` as a table.
	fn references_table(&self, _name: &str) -> bool {
		false
	}

	/// Whether the rendered SQL mentions `column` on `table`.
	fn references_column(&self, _table: &str, _column: &str) -> bool {
		false
	}

	/// Whether the rendered SQL mentions the index `index_name` on `table`.
	fn references_index(&self, _table: &str, _index_name: &str) -> bool {
		false
	}

	/// Rewrites a table rename into this reference.
	fn rename_table(&mut self, _old: &str, _new: &str) {}

	/// Rewrites a column rename on `table` into this reference.
	fn rename_column(&mut self, _table: &str, _old: &str, _new: &str) {}

	/// Renders the current state of this reference to SQL text.
	fn render(&self) -> String;
}

/// A quoted table name.
///
/// `render()` always reflects the current name, even after an in-place
/// rename.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use vola_ddl::{DdlReference, QuoteName, Table};
///
/// let quote: QuoteName = Arc::new(|name: &str| format!("\"{name}\""));
/// let mut table = Table::new("users", quote);
/// assert_eq!(table.render(), "\"users\"");
///
/// table.rename_table("users", "accounts");
/// assert_eq!(table.render(), "\"accounts\"");
/// ```
pub struct Table {
	table: String,
	quote_name: QuoteName,
}

impl Table {
	pub fn new(table: impl Into<String>, quote_name: QuoteName) -> Self {
		Self {
			table: table.into(),
			quote_name,
		}
	}

	pub fn name(&self) -> &str {
		&self.table
	}
}

impl DdlReference for Table {
	fn references_table(&self, name: &str) -> bool {
		self.table == name
	}

	fn rename_table(&mut self, old: &str, new: &str) {
		if self.table == old {
			self.table = new.to_string();
		}
	}

	fn render(&self) -> String {
		(self.quote_name)(&self.table)
	}
}

/// An ordered list of quoted column names on one table.
///
/// Column order is DDL column order and is preserved exactly. Optional
/// per-column suffixes (e.g. `" DESC"`) are aligned by index with the
/// columns.
pub struct Columns {
	table: String,
	columns: Vec<String>,
	quote_name: QuoteName,
	col_suffixes: Vec<String>,
}

impl Columns {
	pub fn new(table: impl Into<String>, columns: Vec<String>, quote_name: QuoteName) -> Self {
		Self {
			table: table.into(),
			columns,
			quote_name,
			col_suffixes: Vec::new(),
		}
	}

	/// Attach per-column suffixes; `suffixes` must align with the columns.
	pub fn with_suffixes(mut self, suffixes: Vec<String>) -> Self {
		self.col_suffixes = suffixes;
		self
	}

	pub fn table(&self) -> &str {
		&self.table
	}

	pub fn columns(&self) -> &[String] {
		&self.columns
	}
}

impl DdlReference for Columns {
	fn references_table(&self, name: &str) -> bool {
		self.table == name
	}

	fn references_column(&self, table: &str, column: &str) -> bool {
		self.table == table && self.columns.iter().any(|c| c == column)
	}

	fn rename_table(&mut self, old: &str, new: &str) {
		if self.table == old {
			self.table = new.to_string();
		}
	}

	fn rename_column(&mut self, table: &str, old: &str, new: &str) {
		if self.table == table {
			for slot in &mut self.columns {
				if slot == old {
					*slot = new.to_string();
				}
			}
		}
	}

	fn render(&self) -> String {
		self.columns
			.iter()
			.enumerate()
			.map(|(idx, column)| {
				let quoted = (self.quote_name)(column);
				match self.col_suffixes.get(idx) {
					Some(suffix) if !suffix.is_empty() => format!("{quoted}{suffix}"),
					_ => quoted,
				}
			})
			.collect::<Vec<_>>()
			.join(", ")
	}
}

/// Columns of an index definition, each optionally followed by an operator
/// class and a suffix.
///
/// The operator-class list is parallel to the column list; the two stay the
/// same length through every rename.
pub struct IndexColumns {
	table: String,
	columns: Vec<String>,
	quote_name: QuoteName,
	opclasses: Vec<String>,
	col_suffixes: Vec<String>,
}

impl IndexColumns {
	pub fn new(
		table: impl Into<String>,
		columns: Vec<String>,
		quote_name: QuoteName,
		opclasses: Vec<String>,
	) -> Self {
		debug_assert_eq!(columns.len(), opclasses.len());
		Self {
			table: table.into(),
			columns,
			quote_name,
			opclasses,
			col_suffixes: Vec::new(),
		}
	}

	pub fn with_suffixes(mut self, suffixes: Vec<String>) -> Self {
		self.col_suffixes = suffixes;
		self
	}

	pub fn columns(&self) -> &[String] {
		&self.columns
	}

	pub fn opclasses(&self) -> &[String] {
		&self.opclasses
	}
}

impl DdlReference for IndexColumns {
	fn references_table(&self, name: &str) -> bool {
		self.table == name
	}

	fn references_column(&self, table: &str, column: &str) -> bool {
		self.table == table && self.columns.iter().any(|c| c == column)
	}

	fn rename_table(&mut self, old: &str, new: &str) {
		if self.table == old {
			self.table = new.to_string();
		}
	}

	fn rename_column(&mut self, table: &str, old: &str, new: &str) {
		if self.table == table {
			for slot in &mut self.columns {
				if slot == old {
					*slot = new.to_string();
				}
			}
		}
	}

	fn render(&self) -> String {
		self.columns
			.iter()
			.enumerate()
			.map(|(idx, column)| {
				let mut part = (self.quote_name)(column);
				if let Some(opclass) = self.opclasses.get(idx)
					&& !opclass.is_empty()
				{
					part = format!("{part} {opclass}");
				}
				if let Some(suffix) = self.col_suffixes.get(idx)
					&& !suffix.is_empty()
				{
					part = format!("{part}{suffix}");
				}
				part
			})
			.collect::<Vec<_>>()
			.join(", ")
	}
}

/// A computed index name.
///
/// The rendered value is recomputed from `(table, columns, suffix)` on every
/// call via the injected naming function, never cached: the naming function
/// hashes its inputs, so renames are reflected transparently.
pub struct IndexName {
	table: String,
	columns: Vec<String>,
	suffix: String,
	namer: IndexNamer,
	quote_name: QuoteName,
}

impl IndexName {
	pub fn new(
		table: impl Into<String>,
		columns: Vec<String>,
		suffix: impl Into<String>,
		namer: IndexNamer,
		quote_name: QuoteName,
	) -> Self {
		Self {
			table: table.into(),
			columns,
			suffix: suffix.into(),
			namer,
			quote_name,
		}
	}

	/// The current computed name, unquoted.
	pub fn name(&self) -> String {
		(self.namer)(&self.table, &self.columns, &self.suffix)
	}
}

impl DdlReference for IndexName {
	fn references_table(&self, name: &str) -> bool {
		self.table == name
	}

	fn references_column(&self, table: &str, column: &str) -> bool {
		self.table == table && self.columns.iter().any(|c| c == column)
	}

	fn references_index(&self, table: &str, index_name: &str) -> bool {
		self.table == table && self.name() == index_name
	}

	fn rename_table(&mut self, old: &str, new: &str) {
		if self.table == old {
			self.table = new.to_string();
		}
	}

	fn rename_column(&mut self, table: &str, old: &str, new: &str) {
		if self.table == table {
			for slot in &mut self.columns {
				if slot == old {
					*slot = new.to_string();
				}
			}
		}
	}

	fn render(&self) -> String {
		(self.quote_name)(&self.name())
	}
}

/// A computed foreign-key constraint name.
///
/// The "from" side (table + columns) drives the base name; the "to" side
/// only contributes to the suffix that disambiguates the constraint. Both
/// sides are tracked: queries and renames check and apply to each.
pub struct ForeignKeyName {
	table: String,
	columns: Vec<String>,
	to_reference: Columns,
	suffix_template: String,
	namer: IndexNamer,
	quote_name: QuoteName,
}

impl ForeignKeyName {
	/// `suffix_template` may mention `%(to_table)s` and `%(to_column)s`.
	pub fn new(
		table: impl Into<String>,
		columns: Vec<String>,
		to_table: impl Into<String>,
		to_columns: Vec<String>,
		suffix_template: impl Into<String>,
		namer: IndexNamer,
		quote_name: QuoteName,
	) -> Self {
		let quote = quote_name.clone();
		Self {
			table: table.into(),
			columns,
			to_reference: Columns::new(to_table, to_columns, quote),
			suffix_template: suffix_template.into(),
			namer,
			quote_name,
		}
	}

	fn suffix(&self) -> String {
		let to_column = self
			.to_reference
			.columns()
			.first()
			.map(String::as_str)
			.unwrap_or_default();
		self.suffix_template
			.replace("%(to_table)s", self.to_reference.table())
			.replace("%(to_column)s", to_column)
	}

	/// The current computed constraint name, unquoted.
	pub fn name(&self) -> String {
		(self.namer)(&self.table, &self.columns, &self.suffix())
	}
}

impl DdlReference for ForeignKeyName {
	fn references_table(&self, name: &str) -> bool {
		self.table == name || self.to_reference.references_table(name)
	}

	fn references_column(&self, table: &str, column: &str) -> bool {
		(self.table == table && self.columns.iter().any(|c| c == column))
			|| self.to_reference.references_column(table, column)
	}

	fn rename_table(&mut self, old: &str, new: &str) {
		if self.table == old {
			self.table = new.to_string();
		}
		self.to_reference.rename_table(old, new);
	}

	fn rename_column(&mut self, table: &str, old: &str, new: &str) {
		if self.table == table {
			for slot in &mut self.columns {
				if slot == old {
					*slot = new.to_string();
				}
			}
		}
		self.to_reference.rename_column(table, old, new);
	}

	fn render(&self) -> String {
		(self.quote_name)(&self.name())
	}
}

/// Compiled expressions used by a functional index or an
/// expression-bearing constraint.
///
/// Tracks the set of physical columns the expressions resolve to. A table
/// rename relabels the trees (the compiled SQL embeds the table alias); a
/// column rename patches a clone of the trees and recomputes the tracked
/// columns from it before swapping it in.
pub struct Expressions {
	table: String,
	expressions: Vec<SqlExpression>,
	compiler: Arc<dyn ExpressionCompiler>,
	quote_value: QuoteValue,
	columns: Vec<String>,
}

impl Expressions {
	pub fn new(
		table: impl Into<String>,
		expressions: Vec<SqlExpression>,
		compiler: Arc<dyn ExpressionCompiler>,
		quote_value: QuoteValue,
	) -> Self {
		let columns = collect_columns(&expressions);
		Self {
			table: table.into(),
			expressions,
			compiler,
			quote_value,
			columns,
		}
	}

	pub fn tracked_columns(&self) -> &[String] {
		&self.columns
	}
}

fn collect_columns(expressions: &[SqlExpression]) -> Vec<String> {
	let mut out = Vec::new();
	for expression in expressions {
		for column in expression.columns() {
			if !out.contains(&column) {
				out.push(column);
			}
		}
	}
	out
}

impl DdlReference for Expressions {
	fn references_table(&self, name: &str) -> bool {
		self.table == name
	}

	fn references_column(&self, table: &str, column: &str) -> bool {
		self.table == table && self.columns.iter().any(|c| c == column)
	}

	fn rename_table(&mut self, old: &str, new: &str) {
		if self.table == old {
			self.expressions = self
				.expressions
				.iter()
				.map(|e| e.relabeled(old, new))
				.collect();
			self.table = new.to_string();
		}
	}

	fn rename_column(&mut self, table: &str, old: &str, new: &str) {
		if self.table != table {
			return;
		}
		// Patch a clone and swap it in, so the tracked column list and the
		// trees update together.
		let mut updated = self.expressions.clone();
		for expression in &mut updated {
			expression.rename_column_refs(old, new);
		}
		self.columns = collect_columns(&updated);
		self.expressions = updated;
	}

	fn render(&self) -> String {
		self.expressions
			.iter()
			.map(|expression| {
				let (sql, params) = self.compiler.compile(expression);
				let mut rendered = String::with_capacity(sql.len());
				let mut params = params.iter();
				let mut rest = sql.as_str();
				while let Some(pos) = rest.find("%s") {
					rendered.push_str(&rest[..pos]);
					match params.next() {
						Some(value) => rendered.push_str(&(self.quote_value)(value)),
						None => rendered.push_str("%s"),
					}
					rest = &rest[pos + 2..];
				}
				rendered.push_str(rest);
				rendered
			})
			.collect::<Vec<_>>()
			.join(", ")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn quote() -> QuoteName {
		Arc::new(|name: &str| format!("\"{name}\""))
	}

	fn quote_value() -> QuoteValue {
		Arc::new(|value: &SqlValue| match value {
			SqlValue::Int(i) => i.to_string(),
			SqlValue::String(s) => format!("'{s}'"),
			other => format!("{other:?}"),
		})
	}

	fn namer() -> IndexNamer {
		Arc::new(|table: &str, columns: &[String], suffix: &str| {
			format!("{}_{}_{}", table, columns.join("_"), suffix)
		})
	}

	struct PlainCompiler;

	impl ExpressionCompiler for PlainCompiler {
		fn compile(&self, expression: &SqlExpression) -> (String, Vec<SqlValue>) {
			match expression {
				SqlExpression::Column { column, .. } => (format!("\"{column}\""), vec![]),
				SqlExpression::Value(v) => ("%s".to_string(), vec![v.clone()]),
				SqlExpression::Func { name, args } => {
					let mut parts = Vec::new();
					let mut params = Vec::new();
					for arg in args {
						let (sql, mut p) = self.compile(arg);
						parts.push(sql);
						params.append(&mut p);
					}
					(format!("{}({})", name, parts.join(", ")), params)
				}
				SqlExpression::BinaryOp { left, op, right } => {
					let (l, mut lp) = self.compile(left);
					let (r, mut rp) = self.compile(right);
					lp.append(&mut rp);
					(format!("({l} {op} {r})"), lp)
				}
				SqlExpression::Ordered {
					expr, descending, ..
				} => {
					let (sql, params) = self.compile(expr);
					let dir = if *descending { " DESC" } else { "" };
					(format!("{sql}{dir}"), params)
				}
			}
		}
	}

	#[test]
	fn test_table_rename_idempotent() {
		let mut table = Table::new("users", quote());
		let before = table.render();
		table.rename_table("users", "users");
		assert_eq!(table.render(), before);
	}

	#[test]
	fn test_table_rename_round_trip() {
		let mut table = Table::new("users", quote());
		let before = table.render();
		table.rename_table("users", "accounts");
		table.rename_table("accounts", "users");
		assert_eq!(table.render(), before);
	}

	#[test]
	fn test_columns_render_with_suffixes() {
		let columns = Columns::new(
			"users",
			vec!["a".to_string(), "b".to_string()],
			quote(),
		)
		.with_suffixes(vec![String::new(), " DESC".to_string()]);
		assert_eq!(columns.render(), "\"a\", \"b\" DESC");
	}

	#[test]
	fn test_columns_rename_column_in_place() {
		let mut columns = Columns::new(
			"users",
			vec!["a".to_string(), "b".to_string()],
			quote(),
		);
		columns.rename_column("users", "a", "c");
		assert_eq!(columns.render(), "\"c\", \"b\"");
		assert!(columns.references_column("users", "c"));
		assert!(!columns.references_column("users", "a"));
	}

	#[test]
	fn test_columns_rename_other_table_is_inert() {
		let mut columns = Columns::new("users", vec!["a".to_string()], quote());
		columns.rename_column("orders", "a", "c");
		assert_eq!(columns.render(), "\"a\"");
	}

	#[test]
	fn test_index_columns_alignment_after_rename() {
		let mut index_columns = IndexColumns::new(
			"users",
			vec!["a".to_string(), "b".to_string()],
			quote(),
			vec!["text_pattern_ops".to_string(), String::new()],
		);
		index_columns.rename_column("users", "a", "c");
		index_columns.rename_table("users", "accounts");
		assert_eq!(index_columns.columns().len(), index_columns.opclasses().len());
		assert_eq!(index_columns.render(), "\"c\" text_pattern_ops, \"b\"");
	}

	#[test]
	fn test_index_name_computed_not_cached() {
		let mut index_name = IndexName::new(
			"t",
			vec!["a".to_string(), "b".to_string()],
			"idx",
			namer(),
			quote(),
		);
		let n1 = index_name.render();
		index_name.rename_table("t", "t2");
		let n2 = index_name.render();
		assert_ne!(n1, n2);
		assert_eq!(n2, "\"t2_a_b_idx\"");
	}

	#[test]
	fn test_index_name_round_trip() {
		let mut index_name =
			IndexName::new("t", vec!["a".to_string()], "idx", namer(), quote());
		let before = index_name.render();
		index_name.rename_table("t", "t2");
		index_name.rename_table("t2", "t");
		assert_eq!(index_name.render(), before);
	}

	#[test]
	fn test_index_name_references_index() {
		let index_name = IndexName::new("t", vec!["a".to_string()], "idx", namer(), quote());
		assert!(index_name.references_index("t", "t_a_idx"));
		assert!(!index_name.references_index("t", "t_b_idx"));
		assert!(!index_name.references_index("other", "t_a_idx"));
	}

	#[test]
	fn test_foreign_key_name_tracks_both_sides() {
		let fk = ForeignKeyName::new(
			"orders",
			vec!["user_id".to_string()],
			"users",
			vec!["id".to_string()],
			"_fk_%(to_table)s_%(to_column)s",
			namer(),
			quote(),
		);
		assert!(fk.references_table("orders"));
		assert!(fk.references_table("users"));
		assert!(fk.references_column("orders", "user_id"));
		assert!(fk.references_column("users", "id"));
		assert!(!fk.references_column("orders", "id"));
	}

	#[test]
	fn test_foreign_key_name_rename_to_side_changes_suffix_only() {
		let mut fk = ForeignKeyName::new(
			"orders",
			vec!["user_id".to_string()],
			"users",
			vec!["id".to_string()],
			"_fk_%(to_table)s_%(to_column)s",
			namer(),
			quote(),
		);
		assert_eq!(fk.render(), "\"orders_user_id__fk_users_id\"");
		fk.rename_table("users", "accounts");
		assert_eq!(fk.render(), "\"orders_user_id__fk_accounts_id\"");
		// The from side is untouched.
		assert!(fk.references_table("orders"));
	}

	#[test]
	fn test_foreign_key_name_round_trip() {
		let mut fk = ForeignKeyName::new(
			"orders",
			vec!["user_id".to_string()],
			"users",
			vec!["id".to_string()],
			"_fk_%(to_table)s_%(to_column)s",
			namer(),
			quote(),
		);
		let before = fk.render();
		fk.rename_table("users", "accounts");
		fk.rename_table("accounts", "users");
		assert_eq!(fk.render(), before);
	}

	#[test]
	fn test_expressions_render_inlines_params() {
		let expr = SqlExpression::binary(
			SqlExpression::column("users", "age"),
			">",
			SqlExpression::value(18i64),
		);
		let expressions = Expressions::new(
			"users",
			vec![expr],
			Arc::new(PlainCompiler),
			quote_value(),
		);
		assert_eq!(expressions.render(), "(\"age\" > 18)");
	}

	#[test]
	fn test_expressions_rename_column_recomputes_tracking() {
		let expr = SqlExpression::func(
			"LOWER",
			vec![SqlExpression::column("users", "email")],
		);
		let mut expressions = Expressions::new(
			"users",
			vec![expr],
			Arc::new(PlainCompiler),
			quote_value(),
		);
		assert!(expressions.references_column("users", "email"));
		expressions.rename_column("users", "email", "email_address");
		assert!(expressions.references_column("users", "email_address"));
		assert!(!expressions.references_column("users", "email"));
		assert_eq!(expressions.render(), "LOWER(\"email_address\")");
	}

	#[test]
	fn test_expressions_rename_table_relabels() {
		let expr = SqlExpression::column("users", "email");
		let mut expressions = Expressions::new(
			"users",
			vec![expr],
			Arc::new(PlainCompiler),
			quote_value(),
		);
		expressions.rename_table("users", "accounts");
		assert!(expressions.references_table("accounts"));
		assert!(!expressions.references_table("users"));
		assert!(expressions.references_column("accounts", "email"));
	}
}
