//! Table constraint descriptions.
//!
//! Constraints validate themselves at construction time; an invalid
//! specification never reaches the SQL-rendering layer.

use crate::error::SpecificationError;
use serde::{Deserialize, Serialize};
use vola_ddl::SqlExpression;

/// Deferrability of a unique constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deferrable {
	Deferred,
	Immediate,
}

impl Deferrable {
	pub fn as_sql(&self) -> &'static str {
		match self {
			Deferrable::Deferred => "DEFERRABLE INITIALLY DEFERRED",
			Deferrable::Immediate => "DEFERRABLE INITIALLY IMMEDIATE",
		}
	}
}

fn validate_condition(
	constraint: &str,
	condition: &SqlExpression,
) -> Result<(), SpecificationError> {
	match condition {
		SqlExpression::BinaryOp { .. } | SqlExpression::Func { .. } => Ok(()),
		_ => Err(SpecificationError::ConditionNotBoolean {
			constraint: constraint.to_string(),
		}),
	}
}

/// A named unique constraint, optionally partial (`WHERE`), covering
/// (`INCLUDE`) or deferrable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueConstraint {
	pub name: String,
	pub columns: Vec<String>,
	pub condition: Option<SqlExpression>,
	pub include: Vec<String>,
	pub deferrable: Option<Deferrable>,
}

impl UniqueConstraint {
	pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
		Self {
			name: name.into(),
			columns,
			condition: None,
			include: Vec::new(),
			deferrable: None,
		}
	}

	pub fn with_condition(
		mut self,
		condition: SqlExpression,
	) -> Result<Self, SpecificationError> {
		validate_condition(&self.name, &condition)?;
		self.condition = Some(condition);
		Ok(self)
	}

	pub fn with_include(mut self, include: Vec<String>) -> Self {
		self.include = include;
		self
	}

	pub fn with_deferrable(mut self, deferrable: Deferrable) -> Self {
		self.deferrable = Some(deferrable);
		self
	}
}

/// A named CHECK constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConstraint {
	pub name: String,
	pub check: SqlExpression,
}

impl CheckConstraint {
	pub fn new(
		name: impl Into<String>,
		check: SqlExpression,
	) -> Result<Self, SpecificationError> {
		let name = name.into();
		validate_condition(&name, &check)?;
		Ok(Self { name, check })
	}
}

/// A PostgreSQL exclusion constraint.
///
/// Each entry pairs an expression with the exclusion operator applied to it
/// (e.g. `=`, `&&`). Requires a GiST or SP-GiST index.
///
/// # Example
///
/// ```rust
/// use vola_ddl::SqlExpression;
/// use vola_models::ExclusionConstraint;
///
/// let constraint = ExclusionConstraint::new(
///     "excl",
///     vec![(SqlExpression::column("room_booking", "room"), "=".to_string())],
/// )
/// .unwrap();
/// assert_eq!(constraint.name, "excl");
///
/// let err = ExclusionConstraint::new("excl", vec![]).unwrap_err();
/// assert!(err.to_string().contains("at least one expression is required"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionConstraint {
	pub name: String,
	pub expressions: Vec<(SqlExpression, String)>,
	pub index_type: String,
	pub condition: Option<SqlExpression>,
	pub include: Vec<String>,
	pub deferrable: Option<Deferrable>,
}

impl ExclusionConstraint {
	pub fn new(
		name: impl Into<String>,
		expressions: Vec<(SqlExpression, String)>,
	) -> Result<Self, SpecificationError> {
		let name = name.into();
		if expressions.is_empty() {
			return Err(SpecificationError::EmptyExpressions { constraint: name });
		}
		Ok(Self {
			name,
			expressions,
			index_type: "GIST".to_string(),
			condition: None,
			include: Vec::new(),
			deferrable: None,
		})
	}

	/// Set the index access method; only GiST and SP-GiST support exclusion.
	pub fn with_index_type(
		mut self,
		index_type: impl Into<String>,
	) -> Result<Self, SpecificationError> {
		let index_type = index_type.into();
		if !matches!(index_type.as_str(), "GIST" | "SPGIST") {
			return Err(SpecificationError::InvalidExclusionIndexType {
				constraint: self.name,
				index_type,
			});
		}
		self.index_type = index_type;
		Ok(self)
	}

	pub fn with_condition(
		mut self,
		condition: SqlExpression,
	) -> Result<Self, SpecificationError> {
		validate_condition(&self.name, &condition)?;
		self.condition = Some(condition);
		Ok(self)
	}

	pub fn with_include(mut self, include: Vec<String>) -> Self {
		self.include = include;
		self
	}

	pub fn with_deferrable(mut self, deferrable: Deferrable) -> Self {
		self.deferrable = Some(deferrable);
		self
	}
}

/// Any table constraint the engine can add or remove.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
	Unique(UniqueConstraint),
	Check(CheckConstraint),
	Exclusion(ExclusionConstraint),
}

impl Constraint {
	pub fn name(&self) -> &str {
		match self {
			Constraint::Unique(c) => &c.name,
			Constraint::Check(c) => &c.name,
			Constraint::Exclusion(c) => &c.name,
		}
	}

	/// Columns this constraint directly covers, used to find constraints
	/// dependent on a column being removed.
	pub fn columns(&self) -> Vec<String> {
		match self {
			Constraint::Unique(c) => c.columns.clone(),
			Constraint::Check(c) => c.check.columns(),
			Constraint::Exclusion(c) => {
				let mut out = Vec::new();
				for (expr, _) in &c.expressions {
					for column in expr.columns() {
						if !out.contains(&column) {
							out.push(column);
						}
					}
				}
				out
			}
		}
	}
}

impl From<UniqueConstraint> for Constraint {
	fn from(c: UniqueConstraint) -> Self {
		Constraint::Unique(c)
	}
}

impl From<CheckConstraint> for Constraint {
	fn from(c: CheckConstraint) -> Self {
		Constraint::Check(c)
	}
}

impl From<ExclusionConstraint> for Constraint {
	fn from(c: ExclusionConstraint) -> Self {
		Constraint::Exclusion(c)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_exclusion_requires_expressions() {
		let err = ExclusionConstraint::new("excl", vec![]).unwrap_err();
		assert_eq!(
			err.to_string(),
			"excl: at least one expression is required"
		);
	}

	#[test]
	fn test_exclusion_single_expression_ok() {
		let constraint = ExclusionConstraint::new(
			"excl",
			vec![(SqlExpression::column("booking", "room"), "=".to_string())],
		)
		.unwrap();
		assert_eq!(constraint.index_type, "GIST");
		assert_eq!(constraint.expressions.len(), 1);
	}

	#[test]
	fn test_exclusion_rejects_btree() {
		let err = ExclusionConstraint::new(
			"excl",
			vec![(SqlExpression::column("booking", "room"), "=".to_string())],
		)
		.unwrap()
		.with_index_type("BTREE")
		.unwrap_err();
		assert!(matches!(
			err,
			SpecificationError::InvalidExclusionIndexType { .. }
		));
		// The message spells the accepted tokens exactly.
		assert_eq!(
			err.to_string(),
			"excl: index type must be GIST or SPGIST, got BTREE"
		);
	}

	#[test]
	fn test_exclusion_accepts_spgist() {
		let constraint = ExclusionConstraint::new(
			"excl",
			vec![(SqlExpression::column("booking", "room"), "=".to_string())],
		)
		.unwrap()
		.with_index_type("SPGIST")
		.unwrap();
		assert_eq!(constraint.index_type, "SPGIST");
	}

	#[test]
	fn test_condition_must_be_boolean() {
		let err = UniqueConstraint::new("uniq", vec!["a".to_string()])
			.with_condition(SqlExpression::column("t", "a"))
			.unwrap_err();
		assert!(matches!(
			err,
			SpecificationError::ConditionNotBoolean { .. }
		));
	}

	#[test]
	fn test_check_constraint_columns() {
		let check = CheckConstraint::new(
			"age_positive",
			SqlExpression::binary(
				SqlExpression::column("users", "age"),
				">",
				SqlExpression::value(0i64),
			),
		)
		.unwrap();
		assert_eq!(Constraint::from(check).columns(), vec!["age".to_string()]);
	}
}
