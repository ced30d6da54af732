//! Deferred SQL statements.

use crate::reference::DdlReference;
use indexmap::IndexMap;

/// One named slot of a [`Statement`]: either a tracked reference or inert
/// text.
pub enum StatementPart {
	Reference(Box<dyn DdlReference>),
	Text(String),
}

impl StatementPart {
	fn render(&self) -> String {
		match self {
			StatementPart::Reference(reference) => reference.render(),
			StatementPart::Text(text) => text.clone(),
		}
	}
}

impl From<String> for StatementPart {
	fn from(text: String) -> Self {
		StatementPart::Text(text)
	}
}

impl From<&str> for StatementPart {
	fn from(text: &str) -> Self {
		StatementPart::Text(text.to_string())
	}
}

impl<R: DdlReference + 'static> From<R> for StatementPart {
	fn from(reference: R) -> Self {
		StatementPart::Reference(Box::new(reference))
	}
}

/// A not-yet-rendered SQL statement: a template with `%(name)s` slots plus
/// the named parts that fill them.
///
/// Tracking queries fan out to every part that is a reference; renames apply
/// to every reference part; plain-text parts are inert. `render()`
/// substitutes every slot with the part's current text.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use vola_ddl::{QuoteName, Statement, Table};
///
/// let quote: QuoteName = Arc::new(|name: &str| format!("\"{name}\""));
/// let mut statement = Statement::new("DROP TABLE %(table)s CASCADE")
///     .with_part("table", Table::new("users", quote));
///
/// assert!(statement.references_table("users"));
/// statement.rename_table("users", "accounts");
/// assert_eq!(statement.render(), "DROP TABLE \"accounts\" CASCADE");
/// ```
pub struct Statement {
	template: String,
	parts: IndexMap<String, StatementPart>,
}

impl Statement {
	pub fn new(template: impl Into<String>) -> Self {
		Self {
			template: template.into(),
			parts: IndexMap::new(),
		}
	}

	pub fn with_part(mut self, name: impl Into<String>, part: impl Into<StatementPart>) -> Self {
		self.parts.insert(name.into(), part.into());
		self
	}

	pub fn template(&self) -> &str {
		&self.template
	}

	pub fn references_table(&self, name: &str) -> bool {
		self.parts.values().any(|part| match part {
			StatementPart::Reference(reference) => reference.references_table(name),
			StatementPart::Text(_) => false,
		})
	}

	pub fn references_column(&self, table: &str, column: &str) -> bool {
		self.parts.values().any(|part| match part {
			StatementPart::Reference(reference) => reference.references_column(table, column),
			StatementPart::Text(_) => false,
		})
	}

	pub fn references_index(&self, table: &str, index_name: &str) -> bool {
		self.parts.values().any(|part| match part {
			StatementPart::Reference(reference) => reference.references_index(table, index_name),
			StatementPart::Text(_) => false,
		})
	}

	pub fn rename_table(&mut self, old: &str, new: &str) {
		for part in self.parts.values_mut() {
			if let StatementPart::Reference(reference) = part {
				reference.rename_table(old, new);
			}
		}
	}

	pub fn rename_column(&mut self, table: &str, old: &str, new: &str) {
		for part in self.parts.values_mut() {
			if let StatementPart::Reference(reference) = part {
				reference.rename_column(table, old, new);
			}
		}
	}

	/// Substitutes every `%(name)s` slot with the part's current text.
	///
	/// Every part is rendered unconditionally, so parts must not carry
	/// side-effecting renders; callers are responsible for not queuing
	/// statements that might become invalid before the flush.
	pub fn render(&self) -> String {
		let mut rendered = self.template.clone();
		for (name, part) in &self.parts {
			rendered = rendered.replace(&format!("%({name})s"), &part.render());
		}
		rendered
	}
}

impl std::fmt::Debug for Statement {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Statement")
			.field("template", &self.template)
			.field("parts", &self.parts.keys().collect::<Vec<_>>())
			.finish()
	}
}
