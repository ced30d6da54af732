//! The Vola schema editor: a vendor-agnostic DDL engine.
//!
//! The editor executes schema changes on a single connection inside one
//! schema-edit scope, deferring statements that depend on objects created
//! later in the same scope and flushing them in order at commit. Which SQL
//! comes out is decided entirely by the injected [`BackendDescriptor`]
//! capability table; the editor itself never branches on a vendor name.
//!
//! [`BackendDescriptor`]: vola_backends::BackendDescriptor

pub mod editor;
pub mod error;
pub mod planner;
mod rebuild;

pub use editor::SchemaEditor;
pub use error::{Result, SchemaError};
pub use planner::{AlterOutcome, FieldDelta, plan_alter};
