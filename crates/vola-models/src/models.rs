//! Resolved, static model descriptions.

use crate::constraints::Constraint;
use crate::fields::FieldDescription;
use crate::indexes::IndexDescription;
use serde::{Deserialize, Serialize};

/// A resolved, static description of one table-backed model.
///
/// # Example
///
/// ```rust
/// use vola_models::{ColumnType, FieldDescription, ModelDescription};
///
/// let model = ModelDescription::new("users")
///     .with_field(
///         FieldDescription::new("id", ColumnType::BigInt).with_primary_key(true),
///     )
///     .with_field(FieldDescription::new("email", ColumnType::VarChar(255)));
/// assert_eq!(model.table, "users");
/// assert!(model.field("email").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
	/// Physical table name.
	pub table: String,
	pub comment: Option<String>,
	pub fields: Vec<FieldDescription>,
	pub constraints: Vec<Constraint>,
	pub indexes: Vec<IndexDescription>,
	/// Composite unique constraints, each a list of column names.
	pub unique_together: Vec<Vec<String>>,
	/// Auto-created many-to-many through tables owned by this model. They
	/// are created right after the main table and dropped right before it.
	pub auto_through: Vec<ModelDescription>,
}

impl ModelDescription {
	pub fn new(table: impl Into<String>) -> Self {
		Self {
			table: table.into(),
			comment: None,
			fields: Vec::new(),
			constraints: Vec::new(),
			indexes: Vec::new(),
			unique_together: Vec::new(),
			auto_through: Vec::new(),
		}
	}

	pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
		self.comment = Some(comment.into());
		self
	}

	pub fn with_field(mut self, field: FieldDescription) -> Self {
		self.fields.push(field);
		self
	}

	pub fn with_constraint(mut self, constraint: impl Into<Constraint>) -> Self {
		self.constraints.push(constraint.into());
		self
	}

	pub fn with_index(mut self, index: IndexDescription) -> Self {
		self.indexes.push(index);
		self
	}

	pub fn with_unique_together(mut self, columns: Vec<String>) -> Self {
		self.unique_together.push(columns);
		self
	}

	pub fn with_auto_through(mut self, through: ModelDescription) -> Self {
		self.auto_through.push(through);
		self
	}

	/// Look up a field by logical name.
	pub fn field(&self, name: &str) -> Option<&FieldDescription> {
		self.fields.iter().find(|f| f.name == name)
	}

	/// Look up a field by physical column name.
	pub fn field_by_column(&self, column: &str) -> Option<&FieldDescription> {
		self.fields.iter().find(|f| f.column == column)
	}

	/// The primary-key field, if one is declared.
	pub fn primary_key(&self) -> Option<&FieldDescription> {
		self.fields.iter().find(|f| f.primary_key)
	}

	/// Physical column names in declaration order.
	pub fn column_names(&self) -> Vec<String> {
		self.fields.iter().map(|f| f.column.clone()).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fields::ColumnType;

	fn users() -> ModelDescription {
		ModelDescription::new("users")
			.with_field(FieldDescription::new("id", ColumnType::BigInt).with_primary_key(true))
			.with_field(FieldDescription::new("email", ColumnType::VarChar(255)))
	}

	#[test]
	fn test_field_lookup() {
		let model = users();
		assert!(model.field("email").is_some());
		assert!(model.field("missing").is_none());
	}

	#[test]
	fn test_primary_key() {
		let model = users();
		assert_eq!(model.primary_key().map(|f| f.name.as_str()), Some("id"));
	}

	#[test]
	fn test_column_names_preserve_order() {
		let model = users();
		assert_eq!(
			model.column_names(),
			vec!["id".to_string(), "email".to_string()]
		);
	}
}
