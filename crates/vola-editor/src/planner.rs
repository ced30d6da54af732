//! The alteration planner.
//!
//! Given an old and a new description of the same field, decide whether the
//! change is a no-op, an in-place ALTER, or a full table rebuild, and which
//! sub-steps the in-place path needs. The planner only computes the plan;
//! rendering and execution stay with the editor.

use crate::error::{Result, SchemaError};
use vola_backends::BackendDescriptor;
use vola_models::{ColumnType, FieldDescription};

/// The sub-steps of an in-place ALTER, in the order the editor applies
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldDelta {
	pub fk_dropped: bool,
	pub unique_dropped: bool,
	pub index_dropped: bool,
	pub rename: bool,
	pub type_changed: bool,
	pub collation_changed: bool,
	/// NULL → NOT NULL or the reverse.
	pub null_changed: bool,
	/// The declared database-level default changed.
	pub default_changed: bool,
	/// Existing NULLs must be set to the effective default before the
	/// NOT NULL constraint is applied. Ordering is a correctness
	/// requirement, not style.
	pub needs_backfill: bool,
	pub unique_added: bool,
	pub index_added: bool,
	pub fk_added: bool,
	pub comment_changed: bool,
}

/// What `alter_field` should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlterOutcome {
	/// Nothing at the database level changed; zero statements. A
	/// comment-only change is a no-op plus comment SQL where supported.
	Noop { comment_changed: bool },
	InPlace(FieldDelta),
	/// The backend cannot alter columns in place; create a new table, copy
	/// data, drop the old one, rename into place.
	Rebuild,
}

fn type_rank(column_type: &ColumnType) -> Option<u8> {
	match column_type {
		ColumnType::SmallInt => Some(0),
		ColumnType::Integer => Some(1),
		ColumnType::BigInt => Some(2),
		_ => None,
	}
}

/// Refuse conversions that can silently lose data.
fn check_strict(old: &FieldDescription, new: &FieldDescription) -> Result<()> {
	match (&old.column_type, &new.column_type) {
		(ColumnType::VarChar(old_len), ColumnType::VarChar(new_len))
			if new_len < old_len =>
		{
			return Err(SchemaError::UnsafeAlteration(format!(
				"shrinking varchar({old_len}) to varchar({new_len}) on {} may truncate data",
				old.column
			)));
		}
		(ColumnType::Text, ColumnType::VarChar(_) | ColumnType::Char(_)) => {
			return Err(SchemaError::UnsafeAlteration(format!(
				"converting text to a bounded string type on {} may truncate data",
				old.column
			)));
		}
		(
			ColumnType::Decimal {
				precision: old_precision,
				..
			},
			ColumnType::Decimal {
				precision: new_precision,
				..
			},
		) if new_precision < old_precision => {
			return Err(SchemaError::UnsafeAlteration(format!(
				"shrinking decimal precision on {} may truncate data",
				old.column
			)));
		}
		(old_type, new_type) => {
			if let (Some(old_rank), Some(new_rank)) = (type_rank(old_type), type_rank(new_type))
				&& new_rank < old_rank
			{
				return Err(SchemaError::UnsafeAlteration(format!(
					"narrowing integer type on {} may overflow existing values",
					old.column
				)));
			}
		}
	}
	if old.nullable && !new.nullable && !new.has_usable_default() {
		return Err(SchemaError::UnsafeAlteration(format!(
			"making {} NOT NULL without a usable default would fail on existing NULLs",
			old.column
		)));
	}
	Ok(())
}

/// Decide the plan for altering `old` into `new`.
pub fn plan_alter(
	descriptor: &BackendDescriptor,
	old: &FieldDescription,
	new: &FieldDescription,
	strict: bool,
) -> Result<AlterOutcome> {
	if old.primary_key != new.primary_key {
		return Err(SchemaError::not_supported(
			descriptor.vendor.as_str(),
			format!("changing the primary-key flag of {}", old.column),
		));
	}

	if strict {
		check_strict(old, new)?;
	}

	let rename = old.column != new.column;
	let type_changed = descriptor.column_sql_type(&old.column_type)
		!= descriptor.column_sql_type(&new.column_type);
	let collation_changed = old.collation != new.collation;
	let null_changed = old.nullable != new.nullable;
	let default_changed = old.db_default != new.db_default;
	let unique_changed = old.unique != new.unique;
	let relation_changed = old.relation != new.relation;
	let index_changed = old.db_index != new.db_index;
	let comment_changed = old.comment != new.comment;

	if !rename
		&& !type_changed
		&& !collation_changed
		&& !null_changed
		&& !default_changed
		&& !unique_changed
		&& !relation_changed
		&& !index_changed
	{
		return Ok(AlterOutcome::Noop { comment_changed });
	}

	let needs_definition_change = type_changed
		|| collation_changed
		|| null_changed
		|| default_changed
		|| unique_changed
		|| relation_changed;
	if needs_definition_change && !descriptor.features.can_alter_table {
		return Ok(AlterOutcome::Rebuild);
	}

	// An incompatible old unique/index/FK must go before the core ALTER;
	// the matching new one comes back afterwards.
	let fk_dropped = old.relation.is_some() && (relation_changed || rename || type_changed);
	let fk_added =
		new.relation.is_some() && fk_dropped && descriptor.features.supports_foreign_keys;
	let unique_dropped = old.unique && (unique_changed || rename || type_changed);
	let unique_added = new.unique && (unique_changed || unique_dropped);
	let index_dropped = old.db_index && !old.unique && (index_changed || rename || type_changed);
	let index_added = new.db_index && !new.unique && (index_changed || index_dropped);

	let needs_backfill = old.nullable && !new.nullable && new.has_usable_default();

	Ok(AlterOutcome::InPlace(FieldDelta {
		fk_dropped,
		unique_dropped,
		index_dropped,
		rename,
		type_changed,
		collation_changed,
		null_changed,
		default_changed,
		needs_backfill,
		unique_added,
		index_added,
		fk_added,
		comment_changed,
	}))
}
