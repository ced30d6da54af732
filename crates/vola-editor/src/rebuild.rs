//! Full table rebuild for backends that cannot alter columns in place.
//!
//! The four-step dance: create a shadow table under `new__<table>` with the
//! target definition, copy the rows across with a column mapping, drop the
//! old table, rename the shadow into place. The final rename goes through
//! the editor's rename propagation, so statements already deferred against
//! the shadow name are rewritten before they flush.

use crate::editor::SchemaEditor;
use crate::error::Result;
use vola_backends::{BackendDescriptor, SchemaConnection};
use vola_models::{FieldDescription, ModelDescription};

/// The alteration a rebuild is standing in for.
pub(crate) enum RebuildChange<'a> {
	AlterField {
		old: &'a FieldDescription,
		new: &'a FieldDescription,
	},
	RemoveField { field: &'a FieldDescription },
	AddField { field: &'a FieldDescription },
}

fn shadow_name(table: &str) -> String {
	format!("new__{table}")
}

/// The target model after the change, under the shadow table name.
fn target_model(model: &ModelDescription, change: &RebuildChange<'_>) -> ModelDescription {
	let mut target = model.clone();
	target.table = shadow_name(&model.table);
	target.auto_through.clear();
	match change {
		RebuildChange::AlterField { old, new } => {
			for field in &mut target.fields {
				if field.column == old.column {
					*field = (*new).clone();
				}
			}
			for index in &mut target.indexes {
				for column in &mut index.columns {
					if *column == old.column {
						*column = new.column.clone();
					}
				}
			}
			for columns in &mut target.unique_together {
				for column in columns.iter_mut() {
					if *column == old.column {
						*column = new.column.clone();
					}
				}
			}
		}
		RebuildChange::RemoveField { field } => {
			target.fields.retain(|f| f.column != field.column);
			target
				.indexes
				.retain(|index| !index.dependent_columns().contains(&field.column));
			target
				.constraints
				.retain(|constraint| !constraint.columns().contains(&field.column));
			target
				.unique_together
				.retain(|columns| !columns.contains(&field.column));
		}
		RebuildChange::AddField { field } => {
			let mut added = (*field).clone();
			// The backfill default is applied during the copy; the new
			// column itself is declared without it.
			added.default = None;
			target.fields.push(added);
		}
	}
	target
}

/// The SELECT list copying one target column out of the old table.
fn source_expression(
	descriptor: &BackendDescriptor,
	field: &FieldDescription,
	change: &RebuildChange<'_>,
) -> String {
	if let RebuildChange::AlterField { old, new } = change
		&& field.column == new.column
	{
		let source = descriptor.quote_name(&old.column);
		// NULL -> NOT NULL with a default: fill the holes during the copy.
		if old.nullable
			&& !new.nullable
			&& let Some(default) = new.effective_default()
		{
			let rendered = match default {
				vola_ddl::DbDefault::Value(value) => descriptor.quote_value(&value),
				vola_ddl::DbDefault::Expression(sql) => sql,
			};
			return format!("COALESCE({source}, {rendered})");
		}
		return source;
	}
	if let RebuildChange::AddField { field: added } = change
		&& field.column == added.column
	{
		// A freshly added column has no source; every row gets the default.
		return match added.effective_default() {
			Some(vola_ddl::DbDefault::Value(value)) => descriptor.quote_value(&value),
			Some(vola_ddl::DbDefault::Expression(sql)) => sql,
			None => "NULL".to_string(),
		};
	}
	descriptor.quote_name(&field.column)
}

pub(crate) async fn remake_table<C: SchemaConnection>(
	editor: &mut SchemaEditor<C>,
	model: &ModelDescription,
	change: RebuildChange<'_>,
) -> Result<()> {
	if let RebuildChange::RemoveField { field } = &change {
		editor.prune_column_internal(&model.table, &field.column);
	}

	let target = target_model(model, &change);
	editor.create_table_internal(&target).await?;

	let descriptor = editor.descriptor().clone();
	let target_columns = target
		.fields
		.iter()
		.map(|f| descriptor.quote_name(&f.column))
		.collect::<Vec<_>>()
		.join(", ");
	let source_columns = target
		.fields
		.iter()
		.map(|f| source_expression(&descriptor, f, &change))
		.collect::<Vec<_>>()
		.join(", ");
	let copy = format!(
		"INSERT INTO {} ({}) SELECT {} FROM {}",
		descriptor.quote_name(&target.table),
		target_columns,
		source_columns,
		descriptor.quote_name(&model.table),
	);
	editor.execute_raw(copy).await?;

	let drop = descriptor
		.templates
		.delete_table
		.replace("%(table)s", &descriptor.quote_name(&model.table));
	editor.execute_raw(drop).await?;

	// Rename the shadow into place; deferred statements created against the
	// shadow name are rewritten by the rename propagation.
	editor.alter_db_table(&target.table, &model.table).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use vola_models::ColumnType;

	#[test]
	fn test_target_model_swaps_altered_field() {
		let model = ModelDescription::new("users")
			.with_field(FieldDescription::new("id", ColumnType::BigInt).with_primary_key(true))
			.with_field(FieldDescription::new("age", ColumnType::Integer));
		let old = model.field("age").unwrap().clone();
		let new = FieldDescription::new("age", ColumnType::BigInt);
		let target = target_model(&model, &RebuildChange::AlterField { old: &old, new: &new });
		assert_eq!(target.table, "new__users");
		assert_eq!(
			target.field("age").unwrap().column_type,
			ColumnType::BigInt
		);
	}

	#[test]
	fn test_target_model_drops_removed_field_and_dependents() {
		let model = ModelDescription::new("users")
			.with_field(FieldDescription::new("id", ColumnType::BigInt).with_primary_key(true))
			.with_field(FieldDescription::new("email", ColumnType::VarChar(255)))
			.with_index(vola_models::IndexDescription::on_columns(vec![
				"email".to_string(),
			]))
			.with_unique_together(vec!["id".to_string(), "email".to_string()]);
		let field = model.field("email").unwrap().clone();
		let target = target_model(&model, &RebuildChange::RemoveField { field: &field });
		assert!(target.field("email").is_none());
		assert!(target.indexes.is_empty());
		assert!(target.unique_together.is_empty());
	}

	#[test]
	fn test_target_model_appends_added_field_without_its_default() {
		let model = ModelDescription::new("users")
			.with_field(FieldDescription::new("id", ColumnType::BigInt).with_primary_key(true));
		let field = FieldDescription::new("age", ColumnType::Integer).with_default(0i64);
		let target = target_model(&model, &RebuildChange::AddField { field: &field });
		let added = target.field("age").unwrap();
		assert!(added.default.is_none());
		assert!(!added.nullable);
	}
}
