//! Index descriptions, including the PostgreSQL extension index types.
//!
//! The extension types (bloom, BRIN, B-Tree with storage parameters, GIN,
//! GiST, hash, SP-GiST) validate their storage parameters at construction
//! time and lower themselves to a plain [`IndexDescription`] carrying a
//! `USING` clause and `WITH` parameters.

use crate::error::SpecificationError;
use serde::{Deserialize, Serialize};
use vola_ddl::SqlExpression;

/// A generic index over columns or expressions.
///
/// # Example
///
/// ```rust
/// use vola_models::IndexDescription;
///
/// let index = IndexDescription::on_columns(vec!["email".to_string()])
///     .with_name("users_email_idx")
///     .with_unique(true);
/// assert!(index.unique);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescription {
	/// Explicit name; when absent the backend generates a deterministic one.
	pub name: Option<String>,
	pub columns: Vec<String>,
	pub expressions: Vec<SqlExpression>,
	pub unique: bool,
	/// Partial-index predicate.
	pub condition: Option<SqlExpression>,
	/// Covering (`INCLUDE`) columns.
	pub include: Vec<String>,
	/// Operator classes, parallel to `columns`.
	pub opclasses: Vec<String>,
	/// Access method for the `USING` clause.
	pub index_type: Option<String>,
	/// Storage parameters for the `WITH (...)` clause.
	pub with_params: Vec<String>,
	/// Per-column ordering suffixes (e.g. `" DESC"`), parallel to `columns`.
	pub col_suffixes: Vec<String>,
}

impl IndexDescription {
	pub fn on_columns(columns: Vec<String>) -> Self {
		Self {
			name: None,
			columns,
			expressions: Vec::new(),
			unique: false,
			condition: None,
			include: Vec::new(),
			opclasses: Vec::new(),
			index_type: None,
			with_params: Vec::new(),
			col_suffixes: Vec::new(),
		}
	}

	pub fn on_expressions(expressions: Vec<SqlExpression>) -> Self {
		Self {
			expressions,
			..Self::on_columns(Vec::new())
		}
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn with_unique(mut self, unique: bool) -> Self {
		self.unique = unique;
		self
	}

	pub fn with_condition(mut self, condition: SqlExpression) -> Self {
		self.condition = Some(condition);
		self
	}

	pub fn with_include(mut self, include: Vec<String>) -> Self {
		self.include = include;
		self
	}

	pub fn with_opclasses(mut self, opclasses: Vec<String>) -> Result<Self, SpecificationError> {
		if opclasses.len() != self.columns.len() {
			return Err(SpecificationError::OpclassMismatch {
				index: self.name.clone().unwrap_or_default(),
				opclasses: opclasses.len(),
				columns: self.columns.len(),
			});
		}
		self.opclasses = opclasses;
		Ok(self)
	}

	pub fn with_index_type(mut self, index_type: impl Into<String>) -> Self {
		self.index_type = Some(index_type.into());
		self
	}

	pub fn with_col_suffixes(mut self, suffixes: Vec<String>) -> Self {
		self.col_suffixes = suffixes;
		self
	}

	/// Checks the description is renderable at all.
	pub fn validate(&self) -> Result<(), SpecificationError> {
		if self.columns.is_empty() && self.expressions.is_empty() {
			return Err(SpecificationError::EmptyIndex {
				index: self.name.clone().unwrap_or_default(),
			});
		}
		Ok(())
	}

	/// Columns this index depends on, including those behind expressions.
	pub fn dependent_columns(&self) -> Vec<String> {
		let mut out = self.columns.clone();
		for expression in &self.expressions {
			for column in expression.columns() {
				if !out.contains(&column) {
					out.push(column);
				}
			}
		}
		out
	}
}

fn check_fillfactor(
	index: &str,
	fillfactor: u32,
	min: u32,
	max: u32,
) -> Result<(), SpecificationError> {
	if fillfactor < min || fillfactor > max {
		return Err(SpecificationError::FillfactorOutOfRange {
			index: index.to_string(),
			fillfactor,
			min,
			max,
		});
	}
	Ok(())
}

/// A bloom-filter index (`USING bloom`).
///
/// Supports at most 32 indexed fields; `length` is the signature length in
/// bits (1–4096); each per-column entry is the number of bits generated for
/// that column (1–4095).
///
/// # Example
///
/// ```rust
/// use vola_models::BloomIndex;
///
/// let index = BloomIndex::new("b", vec!["a".to_string()])
///     .unwrap()
///     .with_length(80)
///     .unwrap();
/// assert!(BloomIndex::new("b", vec!["a".to_string()])
///     .unwrap()
///     .with_columns(vec![4096])
///     .is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloomIndex {
	pub name: String,
	pub fields: Vec<String>,
	pub length: Option<u32>,
	pub columns: Vec<u32>,
}

impl BloomIndex {
	pub fn new(
		name: impl Into<String>,
		fields: Vec<String>,
	) -> Result<Self, SpecificationError> {
		let name = name.into();
		if fields.len() > 32 {
			return Err(SpecificationError::BloomTooManyFields {
				index: name,
				count: fields.len(),
			});
		}
		Ok(Self {
			name,
			fields,
			length: None,
			columns: Vec::new(),
		})
	}

	pub fn with_length(mut self, length: u32) -> Result<Self, SpecificationError> {
		if length == 0 || length > 4096 {
			return Err(SpecificationError::BloomLengthOutOfRange {
				index: self.name,
				length,
			});
		}
		self.length = Some(length);
		Ok(self)
	}

	pub fn with_columns(mut self, columns: Vec<u32>) -> Result<Self, SpecificationError> {
		for &value in &columns {
			if value == 0 || value > 4095 {
				return Err(SpecificationError::BloomColumnValueOutOfRange {
					index: self.name,
					value,
				});
			}
		}
		self.columns = columns;
		Ok(self)
	}

	pub fn into_index(self) -> IndexDescription {
		let mut with_params = Vec::new();
		if let Some(length) = self.length {
			with_params.push(format!("length = {length}"));
		}
		for (idx, bits) in self.columns.iter().enumerate() {
			with_params.push(format!("col{} = {}", idx + 1, bits));
		}
		IndexDescription {
			name: Some(self.name),
			with_params,
			..IndexDescription::on_columns(self.fields).with_index_type("bloom")
		}
	}
}

/// A BRIN index (`USING brin`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrinIndex {
	pub name: String,
	pub fields: Vec<String>,
	pub autosummarize: Option<bool>,
	pub pages_per_range: Option<u32>,
}

impl BrinIndex {
	pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
		Self {
			name: name.into(),
			fields,
			autosummarize: None,
			pages_per_range: None,
		}
	}

	pub fn with_autosummarize(mut self, autosummarize: bool) -> Self {
		self.autosummarize = Some(autosummarize);
		self
	}

	pub fn with_pages_per_range(
		mut self,
		pages_per_range: u32,
	) -> Result<Self, SpecificationError> {
		if pages_per_range == 0 {
			return Err(SpecificationError::InvalidPagesPerRange { index: self.name });
		}
		self.pages_per_range = Some(pages_per_range);
		Ok(self)
	}

	pub fn into_index(self) -> IndexDescription {
		let mut with_params = Vec::new();
		if let Some(autosummarize) = self.autosummarize {
			with_params.push(format!("autosummarize = {autosummarize}"));
		}
		if let Some(pages) = self.pages_per_range {
			with_params.push(format!("pages_per_range = {pages}"));
		}
		IndexDescription {
			name: Some(self.name),
			with_params,
			..IndexDescription::on_columns(self.fields).with_index_type("brin")
		}
	}
}

/// A B-Tree index with an explicit fillfactor (`USING btree`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BTreeIndex {
	pub name: String,
	pub fields: Vec<String>,
	pub fillfactor: Option<u32>,
}

impl BTreeIndex {
	pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
		Self {
			name: name.into(),
			fields,
			fillfactor: None,
		}
	}

	pub fn with_fillfactor(mut self, fillfactor: u32) -> Result<Self, SpecificationError> {
		check_fillfactor(&self.name, fillfactor, 10, 100)?;
		self.fillfactor = Some(fillfactor);
		Ok(self)
	}

	pub fn into_index(self) -> IndexDescription {
		let with_params = self
			.fillfactor
			.map(|ff| vec![format!("fillfactor = {ff}")])
			.unwrap_or_default();
		IndexDescription {
			name: Some(self.name),
			with_params,
			..IndexDescription::on_columns(self.fields).with_index_type("btree")
		}
	}
}

/// A GIN index (`USING gin`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GinIndex {
	pub name: String,
	pub fields: Vec<String>,
	pub fastupdate: Option<bool>,
	pub gin_pending_list_limit: Option<u32>,
}

impl GinIndex {
	pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
		Self {
			name: name.into(),
			fields,
			fastupdate: None,
			gin_pending_list_limit: None,
		}
	}

	pub fn with_fastupdate(mut self, fastupdate: bool) -> Self {
		self.fastupdate = Some(fastupdate);
		self
	}

	pub fn with_gin_pending_list_limit(mut self, limit: u32) -> Self {
		self.gin_pending_list_limit = Some(limit);
		self
	}

	pub fn into_index(self) -> IndexDescription {
		let mut with_params = Vec::new();
		if let Some(fastupdate) = self.fastupdate {
			with_params.push(format!("fastupdate = {fastupdate}"));
		}
		if let Some(limit) = self.gin_pending_list_limit {
			with_params.push(format!("gin_pending_list_limit = {limit}"));
		}
		IndexDescription {
			name: Some(self.name),
			with_params,
			..IndexDescription::on_columns(self.fields).with_index_type("gin")
		}
	}
}

/// A GiST index (`USING gist`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GistIndex {
	pub name: String,
	pub fields: Vec<String>,
	pub buffering: Option<bool>,
	pub fillfactor: Option<u32>,
}

impl GistIndex {
	pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
		Self {
			name: name.into(),
			fields,
			buffering: None,
			fillfactor: None,
		}
	}

	pub fn with_buffering(mut self, buffering: bool) -> Self {
		self.buffering = Some(buffering);
		self
	}

	pub fn with_fillfactor(mut self, fillfactor: u32) -> Result<Self, SpecificationError> {
		check_fillfactor(&self.name, fillfactor, 10, 100)?;
		self.fillfactor = Some(fillfactor);
		Ok(self)
	}

	pub fn into_index(self) -> IndexDescription {
		let mut with_params = Vec::new();
		if let Some(buffering) = self.buffering {
			with_params.push(format!(
				"buffering = {}",
				if buffering { "on" } else { "off" }
			));
		}
		if let Some(ff) = self.fillfactor {
			with_params.push(format!("fillfactor = {ff}"));
		}
		IndexDescription {
			name: Some(self.name),
			with_params,
			..IndexDescription::on_columns(self.fields).with_index_type("gist")
		}
	}
}

/// A hash index (`USING hash`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashIndex {
	pub name: String,
	pub fields: Vec<String>,
	pub fillfactor: Option<u32>,
}

impl HashIndex {
	pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
		Self {
			name: name.into(),
			fields,
			fillfactor: None,
		}
	}

	pub fn with_fillfactor(mut self, fillfactor: u32) -> Result<Self, SpecificationError> {
		check_fillfactor(&self.name, fillfactor, 10, 100)?;
		self.fillfactor = Some(fillfactor);
		Ok(self)
	}

	pub fn into_index(self) -> IndexDescription {
		let with_params = self
			.fillfactor
			.map(|ff| vec![format!("fillfactor = {ff}")])
			.unwrap_or_default();
		IndexDescription {
			name: Some(self.name),
			with_params,
			..IndexDescription::on_columns(self.fields).with_index_type("hash")
		}
	}
}

/// An SP-GiST index (`USING spgist`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpGistIndex {
	pub name: String,
	pub fields: Vec<String>,
	pub fillfactor: Option<u32>,
}

impl SpGistIndex {
	pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
		Self {
			name: name.into(),
			fields,
			fillfactor: None,
		}
	}

	pub fn with_fillfactor(mut self, fillfactor: u32) -> Result<Self, SpecificationError> {
		check_fillfactor(&self.name, fillfactor, 10, 100)?;
		self.fillfactor = Some(fillfactor);
		Ok(self)
	}

	pub fn into_index(self) -> IndexDescription {
		let with_params = self
			.fillfactor
			.map(|ff| vec![format!("fillfactor = {ff}")])
			.unwrap_or_default();
		IndexDescription {
			name: Some(self.name),
			with_params,
			..IndexDescription::on_columns(self.fields).with_index_type("spgist")
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[test]
	fn test_bloom_rejects_33_fields() {
		let fields: Vec<String> = (0..33).map(|i| format!("f{i}")).collect();
		let err = BloomIndex::new("bloom", fields).unwrap_err();
		assert!(matches!(
			err,
			SpecificationError::BloomTooManyFields { count: 33, .. }
		));
	}

	#[test]
	fn test_bloom_accepts_32_fields() {
		let fields: Vec<String> = (0..32).map(|i| format!("f{i}")).collect();
		assert!(BloomIndex::new("bloom", fields).is_ok());
	}

	#[rstest]
	#[case(0)]
	#[case(4096)]
	fn test_bloom_column_value_out_of_range(#[case] value: u32) {
		let err = BloomIndex::new("bloom", vec!["a".to_string()])
			.unwrap()
			.with_columns(vec![value])
			.unwrap_err();
		assert!(matches!(
			err,
			SpecificationError::BloomColumnValueOutOfRange { .. }
		));
	}

	#[rstest]
	#[case(0)]
	#[case(4097)]
	fn test_bloom_length_out_of_range(#[case] length: u32) {
		let err = BloomIndex::new("bloom", vec!["a".to_string()])
			.unwrap()
			.with_length(length)
			.unwrap_err();
		assert!(matches!(
			err,
			SpecificationError::BloomLengthOutOfRange { .. }
		));
	}

	#[test]
	fn test_bloom_lowers_to_index_description() {
		let index = BloomIndex::new("bloom", vec!["a".to_string(), "b".to_string()])
			.unwrap()
			.with_length(80)
			.unwrap()
			.with_columns(vec![4, 8])
			.unwrap()
			.into_index();
		assert_eq!(index.index_type.as_deref(), Some("bloom"));
		assert_eq!(
			index.with_params,
			vec!["length = 80", "col1 = 4", "col2 = 8"]
		);
	}

	#[rstest]
	#[case(9)]
	#[case(101)]
	fn test_btree_fillfactor_out_of_range(#[case] fillfactor: u32) {
		let err = BTreeIndex::new("bt", vec!["a".to_string()])
			.with_fillfactor(fillfactor)
			.unwrap_err();
		assert!(matches!(
			err,
			SpecificationError::FillfactorOutOfRange { .. }
		));
	}

	#[test]
	fn test_brin_pages_per_range_must_be_positive() {
		let err = BrinIndex::new("br", vec!["a".to_string()])
			.with_pages_per_range(0)
			.unwrap_err();
		assert!(matches!(
			err,
			SpecificationError::InvalidPagesPerRange { .. }
		));
	}

	#[test]
	fn test_gist_buffering_renders_on_off() {
		let index = GistIndex::new("g", vec!["a".to_string()])
			.with_buffering(true)
			.into_index();
		assert_eq!(index.with_params, vec!["buffering = on"]);
	}

	#[test]
	fn test_opclass_mismatch() {
		let err = IndexDescription::on_columns(vec!["a".to_string(), "b".to_string()])
			.with_opclasses(vec!["text_pattern_ops".to_string()])
			.unwrap_err();
		assert!(matches!(err, SpecificationError::OpclassMismatch { .. }));
	}

	#[test]
	fn test_empty_index_invalid() {
		let err = IndexDescription::on_columns(vec![]).validate().unwrap_err();
		assert!(matches!(err, SpecificationError::EmptyIndex { .. }));
	}

	#[test]
	fn test_dependent_columns_includes_expression_columns() {
		let index = IndexDescription::on_expressions(vec![SqlExpression::func(
			"LOWER",
			vec![SqlExpression::column("users", "email")],
		)]);
		assert_eq!(index.dependent_columns(), vec!["email".to_string()]);
	}
}
