//! Static descriptions consumed by the schema editor.
//!
//! The engine never inspects live model objects; callers hand it resolved
//! value descriptions of fields, models, constraints and indexes. All
//! validation that can be done without touching the database happens at
//! construction time in this crate, so an invalid specification is rejected
//! before any SQL exists.

pub mod constraints;
pub mod error;
pub mod fields;
pub mod indexes;
pub mod models;

pub use constraints::{CheckConstraint, Constraint, Deferrable, ExclusionConstraint, UniqueConstraint};
pub use error::SpecificationError;
pub use fields::{ColumnType, FieldDescription, ForeignKeyAction, RelationDescription};
pub use indexes::{
	BTreeIndex, BloomIndex, BrinIndex, GinIndex, GistIndex, HashIndex, IndexDescription,
	SpGistIndex,
};
pub use models::ModelDescription;
