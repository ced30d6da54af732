//! The schema editor.
//!
//! One editor wraps one schema-edit scope on one connection. Operations
//! execute their immediate SQL synchronously in program order; statements
//! that reference objects not yet created go on the owned deferred queue and
//! are flushed FIFO when the scope commits. Renames performed inside the
//! scope are propagated over the queue in place, so the SQL that eventually
//! runs always mentions objects under their current names.

use crate::error::{Result, SchemaError};
use crate::planner::{AlterOutcome, FieldDelta, plan_alter};
use crate::rebuild::{self, RebuildChange};
use std::sync::Arc;
use tracing::{debug, warn};
use vola_backends::{
	BackendDescriptor, GenericExpressionCompiler, SchemaConnection,
};
use vola_ddl::{
	Columns, DbDefault, ExpressionCompiler, Expressions, ForeignKeyName, IndexColumns, IndexName,
	SqlExpression, SqlValue, Statement, Table,
};
use vola_models::{
	Constraint, FieldDescription, IndexDescription, ModelDescription, RelationDescription,
	SpecificationError,
};

const FK_SUFFIX_TEMPLATE: &str = "_fk_%(to_table)s_%(to_column)s";
const INDEX_SUFFIX: &str = "_idx";
const UNIQUE_SUFFIX: &str = "_uniq";

/// Scope state. Entering while `InTransaction` is an error; nesting is not
/// permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditorState {
	Idle,
	InTransaction,
	Flushing,
}

/// Substitute `%(name)s` slots in a template.
fn fill(template: &str, slots: &[(&str, &str)]) -> String {
	let mut out = template.to_string();
	for (name, value) in slots {
		out = out.replace(&format!("%({name})s"), value);
	}
	out
}

/// The schema-edit state machine.
///
/// # Example
///
/// ```rust
/// use vola_backends::{BackendDescriptor, RecordingConnection};
/// use vola_editor::SchemaEditor;
/// use vola_models::{ColumnType, FieldDescription, ModelDescription};
///
/// # async fn example() -> Result<(), vola_editor::SchemaError> {
/// let connection = RecordingConnection::new();
/// let log = connection.log_handle();
/// let mut editor = SchemaEditor::new(BackendDescriptor::postgres(), connection);
///
/// let model = ModelDescription::new("users")
///     .with_field(FieldDescription::new("id", ColumnType::BigInt).with_primary_key(true));
/// editor.create_model(&model).await?;
/// editor.commit().await?;
///
/// let executed = log.lock().clone();
/// assert!(executed.iter().any(|sql| sql.starts_with("CREATE TABLE \"users\"")));
/// # Ok(())
/// # }
/// ```
pub struct SchemaEditor<C: SchemaConnection> {
	descriptor: BackendDescriptor,
	connection: C,
	state: EditorState,
	deferred: Vec<Statement>,
	collect_only: bool,
	collected: Vec<String>,
}

impl<C: SchemaConnection> SchemaEditor<C> {
	pub fn new(descriptor: BackendDescriptor, connection: C) -> Self {
		Self {
			descriptor,
			connection,
			state: EditorState::Idle,
			deferred: Vec::new(),
			collect_only: false,
			collected: Vec::new(),
		}
	}

	/// A dry-run editor: renders and collects SQL without executing any of
	/// it. The collected output includes flushed deferred statements in
	/// order.
	pub fn collecting(descriptor: BackendDescriptor, connection: C) -> Self {
		let mut editor = Self::new(descriptor, connection);
		editor.collect_only = true;
		editor
	}

	pub fn descriptor(&self) -> &BackendDescriptor {
		&self.descriptor
	}

	pub fn connection(&self) -> &C {
		&self.connection
	}

	/// SQL collected in dry-run mode.
	pub fn collected_sql(&self) -> &[String] {
		&self.collected
	}

	pub fn deferred_count(&self) -> usize {
		self.deferred.len()
	}

	// ---- scope management ----------------------------------------------

	/// Explicitly enter the scope. Operations enter it implicitly on first
	/// use; entering twice is an error.
	pub async fn begin(&mut self) -> Result<()> {
		if self.state != EditorState::Idle {
			return Err(SchemaError::InvalidState(
				"schema-edit scope is already open; nesting is not permitted".to_string(),
			));
		}
		if !self.collect_only {
			self.connection.begin().await?;
		}
		self.state = EditorState::InTransaction;
		Ok(())
	}

	async fn ensure_scope(&mut self) -> Result<()> {
		match self.state {
			EditorState::Idle => self.begin().await,
			EditorState::InTransaction => Ok(()),
			EditorState::Flushing => Err(SchemaError::InvalidState(
				"cannot run schema operations while flushing deferred SQL".to_string(),
			)),
		}
	}

	/// Flush the deferred queue in insertion order, then commit the scope.
	///
	/// If a deferred statement fails, the remaining queued statements are
	/// not executed and the failure propagates.
	pub async fn commit(&mut self) -> Result<()> {
		if self.state != EditorState::InTransaction {
			return Err(SchemaError::InvalidState(
				"commit called outside an open schema-edit scope".to_string(),
			));
		}
		self.state = EditorState::Flushing;
		let queue = std::mem::take(&mut self.deferred);
		for statement in queue {
			let sql = statement.render();
			if let Err(error) = self.run(sql).await {
				self.state = EditorState::InTransaction;
				return Err(error);
			}
		}
		if !self.collect_only {
			self.connection.commit().await?;
		}
		self.state = EditorState::Idle;
		Ok(())
	}

	/// Discard the deferred queue and roll back where the backend allows
	/// it. On backends without transactional DDL the earlier statements of
	/// the scope are already committed; that is surfaced, not hidden.
	pub async fn rollback(&mut self) -> Result<()> {
		let dropped = self.deferred.len();
		self.deferred.clear();
		if dropped > 0 {
			debug!(dropped, "discarded deferred statements on rollback");
		}
		if !self.collect_only && self.state != EditorState::Idle {
			if self.descriptor.features.can_rollback_ddl {
				self.connection.rollback().await?;
			} else {
				warn!(
					backend = self.descriptor.vendor.as_str(),
					"DDL is not transactional on this backend; statements executed \
					 before the rollback are already committed"
				);
				self.connection.rollback().await?;
			}
		}
		self.state = EditorState::Idle;
		Ok(())
	}

	async fn run(&mut self, sql: String) -> Result<()> {
		debug!(sql = %sql, "schema statement");
		if self.collect_only {
			self.collected.push(sql);
			return Ok(());
		}
		if let Err(error) = self.connection.execute(&sql, &[]).await {
			if !self.descriptor.features.can_rollback_ddl {
				warn!(
					backend = self.descriptor.vendor.as_str(),
					"statement failed on a backend without transactional DDL; \
					 earlier statements in this scope are already committed"
				);
			}
			return Err(error.into());
		}
		Ok(())
	}

	async fn execute(&mut self, sql: String) -> Result<()> {
		self.ensure_scope().await?;
		self.run(sql).await
	}

	fn defer(&mut self, statement: Statement) {
		debug!(template = statement.template(), "deferring schema statement");
		self.deferred.push(statement);
	}

	fn prune_table(&mut self, table: &str) {
		let before = self.deferred.len();
		self.deferred.retain(|s| !s.references_table(table));
		let pruned = before - self.deferred.len();
		if pruned > 0 {
			debug!(table, pruned, "pruned deferred statements for dropped table");
		}
	}

	fn prune_column(&mut self, table: &str, column: &str) {
		let before = self.deferred.len();
		self.deferred
			.retain(|s| !s.references_column(table, column));
		let pruned = before - self.deferred.len();
		if pruned > 0 {
			debug!(
				table,
				column, pruned, "pruned deferred statements for dropped column"
			);
		}
	}

	// ---- rendering helpers ---------------------------------------------

	fn quote(&self, name: &str) -> String {
		self.descriptor.quote_name(name)
	}

	fn quote_columns(&self, columns: &[String]) -> String {
		columns
			.iter()
			.map(|c| self.quote(c))
			.collect::<Vec<_>>()
			.join(", ")
	}

	fn render_default(&self, default: &DbDefault) -> String {
		match default {
			DbDefault::Value(value) => self.descriptor.quote_value(value),
			DbDefault::Expression(sql) => sql.clone(),
		}
	}

	fn compile_expression(&self, expression: &SqlExpression) -> String {
		let compiler = GenericExpressionCompiler::new(&self.descriptor);
		let (sql, params) = compiler.compile(expression);
		let mut rendered = String::with_capacity(sql.len());
		let mut params = params.iter();
		let mut rest = sql.as_str();
		while let Some(pos) = rest.find("%s") {
			rendered.push_str(&rest[..pos]);
			match params.next() {
				Some(value) => rendered.push_str(&self.descriptor.quote_value(value)),
				None => rendered.push_str("%s"),
			}
			rest = &rest[pos + 2..];
		}
		rendered.push_str(rest);
		rendered
	}

	fn constraint_name(&self, table: &str, columns: &[String], suffix: &str) -> String {
		self.descriptor.index_name(table, columns, suffix)
	}

	fn fk_name(&self, table: &str, column: &str, relation: &RelationDescription) -> String {
		ForeignKeyName::new(
			table,
			vec![column.to_string()],
			relation.table.clone(),
			vec![relation.column.clone()],
			FK_SUFFIX_TEMPLATE,
			self.descriptor.namer_fn(),
			self.descriptor.quote_fn(),
		)
		.name()
	}

	fn fk_statement(
		&self,
		table: &str,
		field: &FieldDescription,
		relation: &RelationDescription,
	) -> Statement {
		let quote = self.descriptor.quote_fn();
		let on_delete = match relation.on_delete {
			vola_models::ForeignKeyAction::NoAction => String::new(),
			action => format!(" ON DELETE {}", action.as_sql()),
		};
		Statement::new(self.descriptor.templates.create_fk)
			.with_part("table", Table::new(table, quote.clone()))
			.with_part(
				"name",
				ForeignKeyName::new(
					table,
					vec![field.column.clone()],
					relation.table.clone(),
					vec![relation.column.clone()],
					FK_SUFFIX_TEMPLATE,
					self.descriptor.namer_fn(),
					quote.clone(),
				),
			)
			.with_part(
				"column",
				Columns::new(table, vec![field.column.clone()], quote.clone()),
			)
			.with_part("to_table", Table::new(relation.table.clone(), quote.clone()))
			.with_part(
				"to_column",
				Columns::new(relation.table.clone(), vec![relation.column.clone()], quote),
			)
			.with_part("on_delete", on_delete)
	}

	/// Whether the column default must appear in the column definition at
	/// CREATE TABLE time.
	fn inline_default_on_create(&self, field: &FieldDescription) -> bool {
		field.db_default.is_some()
			|| (self.descriptor.features.requires_literal_defaults && field.default.is_some())
	}

	/// Render the column definition that follows the column name.
	fn column_definition(&self, field: &FieldDescription, include_default: bool) -> String {
		let features = self.descriptor.features;
		let templates = self.descriptor.templates;
		let mut definition = self.descriptor.column_sql_type(&field.column_type);
		if let Some(collation) = &field.collation
			&& features.supports_column_collations
		{
			definition.push_str(&format!(" COLLATE {}", self.quote(collation)));
		}
		if let Some(comment) = &field.comment
			&& features.supports_comments_inline
		{
			definition.push_str(&format!(
				" COMMENT {}",
				self.descriptor.quote_value(&SqlValue::String(comment.clone()))
			));
		}
		if include_default
			&& let Some(default) = field.effective_default()
		{
			definition.push_str(&format!(" DEFAULT {}", self.render_default(&default)));
		}
		definition.push_str(if field.nullable { " NULL" } else { " NOT NULL" });
		if field.primary_key {
			definition.push_str(" PRIMARY KEY");
		} else if field.unique {
			definition.push_str(" UNIQUE");
		}
		if let Some(relation) = &field.relation
			&& features.can_create_inline_fk
			&& let Some(template) = templates.create_inline_fk
		{
			definition.push(' ');
			definition.push_str(&fill(
				template,
				&[
					("to_table", self.quote(&relation.table).as_str()),
					("to_column", self.quote(&relation.column).as_str()),
				],
			));
		}
		definition
	}

	/// Build the CREATE INDEX statement for one index, as a tracked
	/// deferred-capable [`Statement`].
	fn index_statement(&self, table: &str, index: &IndexDescription) -> Result<Statement> {
		index.validate()?;
		let features = self.descriptor.features;
		let backend = self.descriptor.vendor.as_str();
		if !index.expressions.is_empty() && !features.supports_expression_indexes {
			return Err(SchemaError::not_supported(backend, "expression indexes"));
		}
		if index.condition.is_some() && !features.supports_partial_indexes {
			return Err(SchemaError::not_supported(backend, "partial indexes"));
		}
		if !index.include.is_empty() && !features.supports_covering_indexes {
			return Err(SchemaError::not_supported(backend, "covering indexes"));
		}

		let quote = self.descriptor.quote_fn();
		let template = if index.unique {
			self.descriptor.templates.create_unique_index
		} else {
			self.descriptor.templates.create_index
		};
		let mut statement =
			Statement::new(template).with_part("table", Table::new(table, quote.clone()));

		statement = match &index.name {
			Some(name) => statement.with_part("name", self.quote(name)),
			None => statement.with_part(
				"name",
				IndexName::new(
					table,
					index.dependent_columns(),
					INDEX_SUFFIX,
					self.descriptor.namer_fn(),
					quote.clone(),
				),
			),
		};

		statement = if !index.expressions.is_empty() {
			let compiler: Arc<dyn ExpressionCompiler> =
				Arc::new(GenericExpressionCompiler::new(&self.descriptor));
			statement.with_part(
				"columns",
				Expressions::new(
					table,
					index.expressions.clone(),
					compiler,
					self.descriptor.quote_value_fn(),
				),
			)
		} else if !index.opclasses.is_empty() {
			statement.with_part(
				"columns",
				IndexColumns::new(
					table,
					index.columns.clone(),
					quote.clone(),
					index.opclasses.clone(),
				)
				.with_suffixes(index.col_suffixes.clone()),
			)
		} else {
			statement.with_part(
				"columns",
				Columns::new(table, index.columns.clone(), quote.clone())
					.with_suffixes(index.col_suffixes.clone()),
			)
		};

		let using = index
			.index_type
			.as_ref()
			.map(|t| format!(" USING {t}"))
			.unwrap_or_default();
		let with = if index.with_params.is_empty() {
			String::new()
		} else {
			format!(" WITH ({})", index.with_params.join(", "))
		};
		let include = if index.include.is_empty() {
			String::new()
		} else {
			format!(" INCLUDE ({})", self.quote_columns(&index.include))
		};
		let condition = index
			.condition
			.as_ref()
			.map(|c| format!(" WHERE {}", self.compile_expression(c)))
			.unwrap_or_default();

		Ok(statement
			.with_part("using", using)
			.with_part("with", with)
			.with_part("include", include)
			.with_part("condition", condition))
	}

	// ---- model operations ----------------------------------------------

	/// Create the model's table plus its auto-created many-to-many through
	/// tables. Indexes and (non-inline) foreign keys are deferred so that
	/// forward and self references resolve once every table of the scope
	/// exists.
	pub async fn create_model(&mut self, model: &ModelDescription) -> Result<()> {
		self.create_table(model).await?;
		for through in &model.auto_through {
			self.create_table(through).await?;
		}
		Ok(())
	}

	async fn create_table(&mut self, model: &ModelDescription) -> Result<()> {
		self.ensure_scope().await?;
		let features = self.descriptor.features;
		let templates = self.descriptor.templates;

		let mut definitions = Vec::new();
		for field in &model.fields {
			let include_default = self.inline_default_on_create(field);
			definitions.push(format!(
				"{} {}",
				self.quote(&field.column),
				self.column_definition(field, include_default)
			));
		}
		for columns in &model.unique_together {
			definitions.push(format!("UNIQUE ({})", self.quote_columns(columns)));
		}
		let mut post_create = Vec::new();
		for constraint in &model.constraints {
			match constraint {
				Constraint::Check(check) if features.supports_table_check_constraints => {
					definitions.push(format!(
						"CONSTRAINT {} CHECK ({})",
						self.quote(&check.name),
						self.compile_expression(&check.check)
					));
				}
				Constraint::Unique(unique)
					if unique.condition.is_none()
						&& unique.include.is_empty()
						&& unique.deferrable.is_none() =>
				{
					definitions.push(format!(
						"CONSTRAINT {} UNIQUE ({})",
						self.quote(&unique.name),
						self.quote_columns(&unique.columns)
					));
				}
				other => post_create.push(other.clone()),
			}
		}

		let mut deferred_fks = Vec::new();
		if features.supports_foreign_keys && !features.can_create_inline_fk {
			for field in &model.fields {
				if let Some(relation) = &field.relation {
					deferred_fks.push(self.fk_statement(&model.table, field, relation));
				}
			}
		}

		let sql = fill(
			templates.create_table,
			&[
				("table", self.quote(&model.table).as_str()),
				("definition", definitions.join(", ").as_str()),
			],
		);
		self.execute(sql).await?;

		for statement in deferred_fks {
			self.defer(statement);
		}
		for field in &model.fields {
			if field.db_index
				&& !field.unique
				&& !(field.relation.is_some() && features.indexes_foreign_keys)
			{
				let index = IndexDescription::on_columns(vec![field.column.clone()]);
				let statement = self.index_statement(&model.table, &index)?;
				self.defer(statement);
			}
		}
		for index in &model.indexes {
			let statement = self.index_statement(&model.table, index)?;
			self.defer(statement);
		}
		for constraint in &post_create {
			self.apply_constraint(&model.table, constraint).await?;
		}
		if let Some(comment) = &model.comment
			&& features.supports_comments
			&& !features.supports_comments_inline
			&& let Some(template) = templates.alter_table_comment
		{
			let sql = fill(
				template,
				&[
					("table", self.quote(&model.table).as_str()),
					(
						"comment",
						self.descriptor
							.quote_value(&SqlValue::String(comment.clone()))
							.as_str(),
					),
				],
			);
			self.execute(sql).await?;
		}
		Ok(())
	}

	/// Drop the model's table, its auto-created through tables first, and
	/// prune every queued statement that still references them.
	pub async fn delete_model(&mut self, model: &ModelDescription) -> Result<()> {
		self.ensure_scope().await?;
		let templates = self.descriptor.templates;
		for through in model.auto_through.iter().rev() {
			let sql = fill(
				templates.delete_table,
				&[("table", self.quote(&through.table).as_str())],
			);
			self.execute(sql).await?;
			self.prune_table(&through.table);
		}
		let sql = fill(
			templates.delete_table,
			&[("table", self.quote(&model.table).as_str())],
		);
		self.execute(sql).await?;
		self.prune_table(&model.table);
		Ok(())
	}

	// ---- field operations ----------------------------------------------

	/// Add a column. NOT NULL without a usable default is an error: it would
	/// either fail on existing rows or silently corrupt data.
	pub async fn add_field(
		&mut self,
		model: &ModelDescription,
		field: &FieldDescription,
	) -> Result<()> {
		self.ensure_scope().await?;
		let features = self.descriptor.features;
		let templates = self.descriptor.templates;
		let backend = self.descriptor.vendor.as_str();
		if field.primary_key {
			return Err(SchemaError::not_supported(
				backend,
				"adding a primary-key column to an existing table",
			));
		}
		if !field.nullable && !field.has_usable_default() {
			return Err(SchemaError::InvalidSpecification(
				SpecificationError::NotNullWithoutDefault {
					table: model.table.clone(),
					field: field.name.clone(),
				},
			));
		}

		let include_default = field.effective_default().is_some();
		// The backfill default has to come off the column again after the
		// add; a backend that cannot alter the column afterwards rebuilds
		// the table instead, filling existing rows during the copy.
		if include_default && field.db_default.is_none() && !features.can_alter_table {
			return rebuild::remake_table(self, model, RebuildChange::AddField { field }).await;
		}
		let definition = self.column_definition(field, include_default);
		let sql = fill(
			templates.create_column,
			&[
				("table", self.quote(&model.table).as_str()),
				("column", self.quote(&field.column).as_str()),
				("definition", definition.as_str()),
			],
		);
		self.execute(sql).await?;

		// The default only existed to fill current rows; drop it unless the
		// field declares a persistent database default.
		if include_default && field.db_default.is_none() && features.can_alter_table {
			let change = fill(
				templates.alter_column_no_default,
				&[("column", self.quote(&field.column).as_str())],
			);
			let sql = fill(
				templates.alter_column,
				&[
					("table", self.quote(&model.table).as_str()),
					("changes", change.as_str()),
				],
			);
			self.execute(sql).await?;
		}

		if let Some(relation) = &field.relation
			&& features.supports_foreign_keys
			&& !features.can_create_inline_fk
		{
			let statement = self.fk_statement(&model.table, field, relation);
			self.defer(statement);
		}
		if field.db_index
			&& !field.unique
			&& !(field.relation.is_some() && features.indexes_foreign_keys)
		{
			let index = IndexDescription::on_columns(vec![field.column.clone()]);
			let statement = self.index_statement(&model.table, &index)?;
			self.defer(statement);
		}
		if let Some(comment) = &field.comment
			&& features.supports_comments
			&& !features.supports_comments_inline
			&& let Some(template) = templates.alter_column_comment
		{
			let sql = fill(
				template,
				&[
					("table", self.quote(&model.table).as_str()),
					("column", self.quote(&field.column).as_str()),
					(
						"comment",
						self.descriptor
							.quote_value(&SqlValue::String(comment.clone()))
							.as_str(),
					),
				],
			);
			self.execute(sql).await?;
		}
		Ok(())
	}

	/// Drop a column, after dropping everything that depends on it, and
	/// prune queued statements that still reference it. Delegates to a full
	/// table rebuild when the backend cannot drop columns.
	pub async fn remove_field(
		&mut self,
		model: &ModelDescription,
		field: &FieldDescription,
	) -> Result<()> {
		self.ensure_scope().await?;
		let features = self.descriptor.features;
		let templates = self.descriptor.templates;
		if !features.can_alter_table_drop_column {
			return rebuild::remake_table(self, model, RebuildChange::RemoveField { field }).await;
		}

		if let Some(relation) = &field.relation
			&& features.supports_foreign_keys
		{
			let name = self.fk_name(&model.table, &field.column, relation);
			let sql = fill(
				templates.delete_fk,
				&[
					("table", self.quote(&model.table).as_str()),
					("name", self.quote(&name).as_str()),
				],
			);
			self.execute(sql).await?;
		}
		for index in &model.indexes {
			if index.dependent_columns().contains(&field.column) {
				let name = match &index.name {
					Some(name) => name.clone(),
					None => self.constraint_name(
						&model.table,
						&index.dependent_columns(),
						INDEX_SUFFIX,
					),
				};
				let sql = fill(
					templates.delete_index,
					&[
						("name", self.quote(&name).as_str()),
						("table", self.quote(&model.table).as_str()),
					],
				);
				self.execute(sql).await?;
			}
		}
		for constraint in &model.constraints {
			if constraint.columns().contains(&field.column) {
				let sql = fill(
					templates.delete_constraint,
					&[
						("table", self.quote(&model.table).as_str()),
						("name", self.quote(constraint.name()).as_str()),
					],
				);
				self.execute(sql).await?;
			}
		}
		if field.db_index && !field.unique {
			let name = self.constraint_name(
				&model.table,
				std::slice::from_ref(&field.column),
				INDEX_SUFFIX,
			);
			let sql = fill(
				templates.delete_index,
				&[
					("name", self.quote(&name).as_str()),
					("table", self.quote(&model.table).as_str()),
				],
			);
			self.execute(sql).await?;
		}

		let sql = fill(
			templates.delete_column,
			&[
				("table", self.quote(&model.table).as_str()),
				("column", self.quote(&field.column).as_str()),
			],
		);
		self.execute(sql).await?;
		self.prune_column(&model.table, &field.column);
		Ok(())
	}

	/// Alter a column from `old` to `new`. `strict` refuses ambiguous or
	/// lossy conversions instead of best-effort coercion.
	pub async fn alter_field(
		&mut self,
		model: &ModelDescription,
		old: &FieldDescription,
		new: &FieldDescription,
		strict: bool,
	) -> Result<()> {
		self.ensure_scope().await?;
		match plan_alter(&self.descriptor, old, new, strict)? {
			AlterOutcome::Noop { comment_changed } => {
				if comment_changed {
					self.alter_column_comment(model, new).await?;
				}
				Ok(())
			}
			AlterOutcome::Rebuild => {
				rebuild::remake_table(self, model, RebuildChange::AlterField { old, new }).await
			}
			AlterOutcome::InPlace(delta) => self.apply_field_delta(model, old, new, delta).await,
		}
	}

	async fn apply_field_delta(
		&mut self,
		model: &ModelDescription,
		old: &FieldDescription,
		new: &FieldDescription,
		delta: FieldDelta,
	) -> Result<()> {
		let features = self.descriptor.features;
		let templates = self.descriptor.templates;
		let table = model.table.as_str();

		// 1. Constraints incompatible with the new definition go first.
		if delta.fk_dropped
			&& features.supports_foreign_keys
			&& let Some(relation) = &old.relation
		{
			let name = self.fk_name(table, &old.column, relation);
			let sql = fill(
				templates.delete_fk,
				&[
					("table", self.quote(table).as_str()),
					("name", self.quote(&name).as_str()),
				],
			);
			self.execute(sql).await?;
		}
		if delta.unique_dropped {
			let name = self.constraint_name(
				table,
				std::slice::from_ref(&old.column),
				UNIQUE_SUFFIX,
			);
			let sql = fill(
				templates.delete_constraint,
				&[
					("table", self.quote(table).as_str()),
					("name", self.quote(&name).as_str()),
				],
			);
			self.execute(sql).await?;
		}
		if delta.index_dropped {
			let name = self.constraint_name(
				table,
				std::slice::from_ref(&old.column),
				INDEX_SUFFIX,
			);
			let sql = fill(
				templates.delete_index,
				&[
					("name", self.quote(&name).as_str()),
					("table", self.quote(table).as_str()),
				],
			);
			self.execute(sql).await?;
		}

		// 2. Rename, then propagate over the deferred queue so pending
		// statements keep pointing at the current column name.
		if delta.rename {
			let sql = fill(
				templates.rename_column,
				&[
					("table", self.quote(table).as_str()),
					("old_column", self.quote(&old.column).as_str()),
					("new_column", self.quote(&new.column).as_str()),
				],
			);
			self.execute(sql).await?;
			for statement in &mut self.deferred {
				statement.rename_column(table, &old.column, &new.column);
			}
		}

		// 3. Core ALTER fragments.
		let column = self.quote(&new.column);
		let type_sql = {
			let mut t = self.descriptor.column_sql_type(&new.column_type);
			if let Some(collation) = &new.collation
				&& features.supports_column_collations
				&& delta.collation_changed
			{
				t.push_str(&format!(" COLLATE {}", self.quote(collation)));
			}
			t
		};
		let mut fragments: Vec<String> = Vec::new();
		// On MySQL-style backends the null templates re-state the full type
		// (`MODIFY`), so type and nullability travel in one fragment.
		let modify_style = templates.alter_column_not_null.contains("%(type)s");
		if modify_style {
			if delta.type_changed || delta.collation_changed || delta.null_changed {
				let target_nullable = new.nullable || delta.needs_backfill;
				let template = if target_nullable {
					templates.alter_column_null
				} else {
					templates.alter_column_not_null
				};
				fragments.push(fill(
					template,
					&[
						("column", column.as_str()),
						("type", type_sql.as_str()),
						("collation", ""),
					],
				));
			}
		} else {
			if delta.type_changed || delta.collation_changed {
				fragments.push(fill(
					templates.alter_column_type,
					&[
						("column", column.as_str()),
						("type", type_sql.as_str()),
						("collation", ""),
					],
				));
			}
			if delta.null_changed {
				if new.nullable {
					fragments.push(fill(
						templates.alter_column_null,
						&[("column", column.as_str()), ("type", type_sql.as_str())],
					));
				} else if !delta.needs_backfill {
					fragments.push(fill(
						templates.alter_column_not_null,
						&[("column", column.as_str()), ("type", type_sql.as_str())],
					));
				}
			}
		}
		if delta.default_changed && !delta.needs_backfill {
			match &new.db_default {
				Some(default) => fragments.push(fill(
					templates.alter_column_default,
					&[
						("column", column.as_str()),
						("default", self.render_default(default).as_str()),
					],
				)),
				None => fragments.push(fill(
					templates.alter_column_no_default,
					&[("column", column.as_str())],
				)),
			}
		}
		if !fragments.is_empty() {
			if features.supports_combined_alters {
				let sql = fill(
					templates.alter_column,
					&[
						("table", self.quote(table).as_str()),
						("changes", fragments.join(", ").as_str()),
					],
				);
				self.execute(sql).await?;
			} else {
				for fragment in fragments {
					let sql = fill(
						templates.alter_column,
						&[
							("table", self.quote(table).as_str()),
							("changes", fragment.as_str()),
						],
					);
					self.execute(sql).await?;
				}
			}
		}

		// 4. Backfill before NOT NULL; the ordering is a correctness
		// requirement, existing NULLs must be gone before the constraint.
		if delta.needs_backfill
			&& let Some(default) = new.effective_default()
		{
			let rendered = self.render_default(&default);
			let change = fill(
				templates.alter_column_default,
				&[("column", column.as_str()), ("default", rendered.as_str())],
			);
			let sql = fill(
				templates.alter_column,
				&[
					("table", self.quote(table).as_str()),
					("changes", change.as_str()),
				],
			);
			self.execute(sql).await?;

			let sql = fill(
				templates.update_with_default,
				&[
					("table", self.quote(table).as_str()),
					("column", column.as_str()),
					("default", rendered.as_str()),
				],
			);
			self.execute(sql).await?;

			let change = fill(
				templates.alter_column_not_null,
				&[("column", column.as_str()), ("type", type_sql.as_str())],
			);
			let sql = fill(
				templates.alter_column,
				&[
					("table", self.quote(table).as_str()),
					("changes", change.as_str()),
				],
			);
			self.execute(sql).await?;

			if new.db_default.is_none() {
				let change = fill(
					templates.alter_column_no_default,
					&[("column", column.as_str())],
				);
				let sql = fill(
					templates.alter_column,
					&[
						("table", self.quote(table).as_str()),
						("changes", change.as_str()),
					],
				);
				self.execute(sql).await?;
			}
		}

		// 5. Constraints appropriate to the new definition come back last.
		if delta.unique_added {
			let name = self.constraint_name(
				table,
				std::slice::from_ref(&new.column),
				UNIQUE_SUFFIX,
			);
			let sql = fill(
				templates.create_unique,
				&[
					("table", self.quote(table).as_str()),
					("name", self.quote(&name).as_str()),
					("columns", column.as_str()),
					("deferrable", ""),
				],
			);
			self.execute(sql).await?;
		}
		if delta.index_added {
			let index = IndexDescription::on_columns(vec![new.column.clone()]);
			let statement = self.index_statement(table, &index)?;
			let sql = statement.render();
			self.execute(sql).await?;
		}
		if delta.fk_added
			&& let Some(relation) = &new.relation
		{
			let sql = self.fk_statement(table, new, relation).render();
			self.execute(sql).await?;
		}
		if delta.comment_changed {
			self.alter_column_comment(model, new).await?;
		}
		Ok(())
	}

	async fn alter_column_comment(
		&mut self,
		model: &ModelDescription,
		field: &FieldDescription,
	) -> Result<()> {
		let features = self.descriptor.features;
		// Capability-checked, never attempted-and-caught.
		if !features.supports_comments || features.supports_comments_inline {
			return Ok(());
		}
		let Some(template) = self.descriptor.templates.alter_column_comment else {
			return Ok(());
		};
		let comment = match &field.comment {
			Some(comment) => self.descriptor.quote_value(&SqlValue::String(comment.clone())),
			None => "NULL".to_string(),
		};
		let sql = fill(
			template,
			&[
				("table", self.quote(&model.table).as_str()),
				("column", self.quote(&field.column).as_str()),
				("comment", comment.as_str()),
			],
		);
		self.execute(sql).await
	}

	// ---- table-level operations ----------------------------------------

	/// Rename the physical table and rewrite every queued statement that
	/// still mentions the old name. Any pending statement left pointing at
	/// the old name would render broken SQL at flush time.
	pub async fn alter_db_table(&mut self, old_name: &str, new_name: &str) -> Result<()> {
		if old_name == new_name
			|| (self.descriptor.features.ignores_table_name_case
				&& old_name.eq_ignore_ascii_case(new_name))
		{
			return Ok(());
		}
		self.ensure_scope().await?;
		let sql = fill(
			self.descriptor.templates.rename_table,
			&[
				("old_table", self.quote(old_name).as_str()),
				("new_table", self.quote(new_name).as_str()),
			],
		);
		self.execute(sql).await?;
		for statement in &mut self.deferred {
			statement.rename_table(old_name, new_name);
		}
		Ok(())
	}

	/// Change the table comment; a no-op on backends without comment
	/// support, detected via the capability flag.
	pub async fn alter_db_table_comment(
		&mut self,
		model: &ModelDescription,
		comment: Option<&str>,
	) -> Result<()> {
		if !self.descriptor.features.supports_comments {
			debug!(
				table = model.table.as_str(),
				"backend does not support comments; skipping"
			);
			return Ok(());
		}
		let Some(template) = self.descriptor.templates.alter_table_comment else {
			return Ok(());
		};
		self.ensure_scope().await?;
		let rendered = match comment {
			Some(comment) => self
				.descriptor
				.quote_value(&SqlValue::String(comment.to_string())),
			None => "NULL".to_string(),
		};
		let sql = fill(
			template,
			&[
				("table", self.quote(&model.table).as_str()),
				("comment", rendered.as_str()),
			],
		);
		self.execute(sql).await
	}

	/// Reconcile composite unique constraints from `old` to `new`.
	pub async fn alter_unique_together(
		&mut self,
		model: &ModelDescription,
		old: &[Vec<String>],
		new: &[Vec<String>],
	) -> Result<()> {
		self.ensure_scope().await?;
		let templates = self.descriptor.templates;
		for removed in old.iter().filter(|columns| !new.contains(columns)) {
			let name = self.constraint_name(&model.table, removed, UNIQUE_SUFFIX);
			let sql = fill(
				templates.delete_constraint,
				&[
					("table", self.quote(&model.table).as_str()),
					("name", self.quote(&name).as_str()),
				],
			);
			self.execute(sql).await?;
		}
		for added in new.iter().filter(|columns| !old.contains(columns)) {
			let name = self.constraint_name(&model.table, added, UNIQUE_SUFFIX);
			let sql = fill(
				templates.create_unique,
				&[
					("table", self.quote(&model.table).as_str()),
					("name", self.quote(&name).as_str()),
					("columns", self.quote_columns(added).as_str()),
					("deferrable", ""),
				],
			);
			self.execute(sql).await?;
		}
		Ok(())
	}

	// ---- index operations ----------------------------------------------

	pub async fn add_index(
		&mut self,
		model: &ModelDescription,
		index: &IndexDescription,
	) -> Result<()> {
		self.ensure_scope().await?;
		let statement = self.index_statement(&model.table, index)?;
		let sql = statement.render();
		self.execute(sql).await
	}

	pub async fn remove_index(
		&mut self,
		model: &ModelDescription,
		index: &IndexDescription,
	) -> Result<()> {
		self.ensure_scope().await?;
		let name = match &index.name {
			Some(name) => name.clone(),
			None => self.constraint_name(&model.table, &index.dependent_columns(), INDEX_SUFFIX),
		};
		let sql = fill(
			self.descriptor.templates.delete_index,
			&[
				("name", self.quote(&name).as_str()),
				("table", self.quote(&model.table).as_str()),
			],
		);
		self.execute(sql).await
	}

	/// Rename an index, via the backend's rename template where one exists,
	/// otherwise by dropping and recreating it.
	pub async fn rename_index(
		&mut self,
		model: &ModelDescription,
		index: &IndexDescription,
		old_name: &str,
		new_name: &str,
	) -> Result<()> {
		self.ensure_scope().await?;
		if self.descriptor.features.supports_rename_index
			&& let Some(template) = self.descriptor.templates.rename_index
		{
			let sql = fill(
				template,
				&[
					("table", self.quote(&model.table).as_str()),
					("old_name", self.quote(old_name).as_str()),
					("new_name", self.quote(new_name).as_str()),
				],
			);
			return self.execute(sql).await;
		}
		let sql = fill(
			self.descriptor.templates.delete_index,
			&[
				("name", self.quote(old_name).as_str()),
				("table", self.quote(&model.table).as_str()),
			],
		);
		self.execute(sql).await?;
		let recreated = index.clone().with_name(new_name);
		let statement = self.index_statement(&model.table, &recreated)?;
		let sql = statement.render();
		self.execute(sql).await
	}

	// ---- constraint operations -----------------------------------------

	pub async fn add_constraint(
		&mut self,
		model: &ModelDescription,
		constraint: &Constraint,
	) -> Result<()> {
		self.ensure_scope().await?;
		self.apply_constraint(&model.table, constraint).await
	}

	async fn apply_constraint(&mut self, table: &str, constraint: &Constraint) -> Result<()> {
		let features = self.descriptor.features;
		let templates = self.descriptor.templates;
		let backend = self.descriptor.vendor.as_str();
		match constraint {
			Constraint::Unique(unique) => {
				if unique.deferrable.is_some()
					&& !features.supports_deferrable_unique_constraints
				{
					return Err(SchemaError::not_supported(
						backend,
						"deferrable unique constraints",
					));
				}
				// Partial and covering unique constraints are backed by
				// unique indexes.
				if unique.condition.is_some() || !unique.include.is_empty() {
					let mut index = IndexDescription::on_columns(unique.columns.clone())
						.with_name(unique.name.clone())
						.with_unique(true)
						.with_include(unique.include.clone());
					if let Some(condition) = &unique.condition {
						index = index.with_condition(condition.clone());
					}
					let statement = self.index_statement(table, &index)?;
					let sql = statement.render();
					return self.execute(sql).await;
				}
				let deferrable = unique
					.deferrable
					.map(|d| format!(" {}", d.as_sql()))
					.unwrap_or_default();
				let sql = fill(
					templates.create_unique,
					&[
						("table", self.quote(table).as_str()),
						("name", self.quote(&unique.name).as_str()),
						("columns", self.quote_columns(&unique.columns).as_str()),
						("deferrable", deferrable.as_str()),
					],
				);
				self.execute(sql).await
			}
			Constraint::Check(check) => {
				if !features.supports_table_check_constraints {
					return Err(SchemaError::not_supported(backend, "check constraints"));
				}
				let sql = fill(
					templates.create_check,
					&[
						("table", self.quote(table).as_str()),
						("name", self.quote(&check.name).as_str()),
						("check", self.compile_expression(&check.check).as_str()),
					],
				);
				self.execute(sql).await
			}
			Constraint::Exclusion(exclusion) => {
				if !features.supports_exclusion_constraints {
					return Err(SchemaError::not_supported(backend, "exclusion constraints"));
				}
				let Some(template) = templates.create_exclusion else {
					return Err(SchemaError::not_supported(backend, "exclusion constraints"));
				};
				let expressions = exclusion
					.expressions
					.iter()
					.map(|(expression, operator)| {
						format!("{} WITH {}", self.compile_expression(expression), operator)
					})
					.collect::<Vec<_>>()
					.join(", ");
				let include = if exclusion.include.is_empty() {
					String::new()
				} else {
					format!(" INCLUDE ({})", self.quote_columns(&exclusion.include))
				};
				let condition = exclusion
					.condition
					.as_ref()
					.map(|c| format!(" WHERE ({})", self.compile_expression(c)))
					.unwrap_or_default();
				let deferrable = exclusion
					.deferrable
					.map(|d| format!(" {}", d.as_sql()))
					.unwrap_or_default();
				let sql = fill(
					template,
					&[
						("table", self.quote(table).as_str()),
						("name", self.quote(&exclusion.name).as_str()),
						("index_type", exclusion.index_type.as_str()),
						("expressions", expressions.as_str()),
						("include", include.as_str()),
						("condition", condition.as_str()),
						("deferrable", deferrable.as_str()),
					],
				);
				self.execute(sql).await
			}
		}
	}

	pub async fn remove_constraint(
		&mut self,
		model: &ModelDescription,
		constraint: &Constraint,
	) -> Result<()> {
		self.ensure_scope().await?;
		// Partial/covering unique constraints were created as indexes.
		let as_index = matches!(
			constraint,
			Constraint::Unique(unique) if unique.condition.is_some() || !unique.include.is_empty()
		);
		let template = if as_index {
			self.descriptor.templates.delete_index
		} else {
			self.descriptor.templates.delete_constraint
		};
		let sql = fill(
			template,
			&[
				("name", self.quote(constraint.name()).as_str()),
				("table", self.quote(&model.table).as_str()),
			],
		);
		self.execute(sql).await
	}

	// ---- internals shared with the rebuild path ------------------------

	pub(crate) async fn execute_raw(&mut self, sql: String) -> Result<()> {
		self.execute(sql).await
	}

	pub(crate) async fn create_table_internal(&mut self, model: &ModelDescription) -> Result<()> {
		self.create_table(model).await
	}

	pub(crate) fn prune_column_internal(&mut self, table: &str, column: &str) {
		self.prune_column(table, column);
	}
}

impl<C: SchemaConnection> Drop for SchemaEditor<C> {
	fn drop(&mut self) {
		if !self.deferred.is_empty() {
			warn!(
				pending = self.deferred.len(),
				"schema editor dropped with unflushed deferred statements; \
				 commit() or rollback() the scope explicitly"
			);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use vola_backends::RecordingConnection;
	use vola_models::ColumnType;

	fn users() -> ModelDescription {
		ModelDescription::new("users")
			.with_field(FieldDescription::new("id", ColumnType::BigInt).with_primary_key(true))
	}

	#[tokio::test]
	async fn test_begin_twice_is_an_error() {
		let mut editor =
			SchemaEditor::new(BackendDescriptor::postgres(), RecordingConnection::new());
		editor.begin().await.unwrap();
		assert!(matches!(
			editor.begin().await,
			Err(SchemaError::InvalidState(_))
		));
		editor.rollback().await.unwrap();
	}

	#[tokio::test]
	async fn test_commit_outside_scope_is_an_error() {
		let mut editor =
			SchemaEditor::new(BackendDescriptor::postgres(), RecordingConnection::new());
		assert!(matches!(
			editor.commit().await,
			Err(SchemaError::InvalidState(_))
		));
	}

	#[tokio::test]
	async fn test_operations_enter_scope_implicitly() {
		let connection = RecordingConnection::new();
		let log = connection.log_handle();
		let mut editor = SchemaEditor::new(BackendDescriptor::postgres(), connection);
		editor.create_model(&users()).await.unwrap();
		editor.commit().await.unwrap();
		let executed = log.lock().clone();
		assert_eq!(executed.first().map(String::as_str), Some("BEGIN"));
		assert_eq!(executed.last().map(String::as_str), Some("COMMIT"));
	}

	#[tokio::test]
	async fn test_fill_substitutes_named_slots() {
		assert_eq!(
			fill("A %(x)s B %(y)s", &[("x", "1"), ("y", "2")]),
			"A 1 B 2"
		);
	}
}
