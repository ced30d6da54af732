//! A generic expression compiler backed by a descriptor's quoting rules.

use crate::descriptor::BackendDescriptor;
use vola_ddl::{ExpressionCompiler, SqlExpression, SqlValue};

/// Compiles [`SqlExpression`] trees to SQL with `%s` placeholders.
///
/// Column references render unqualified (index and constraint DDL cannot
/// carry table qualifiers) but the expression tree still tracks the table
/// alias so rename propagation stays correct.
///
/// # Example
///
/// ```rust
/// use vola_backends::{BackendDescriptor, GenericExpressionCompiler};
/// use vola_ddl::{ExpressionCompiler, SqlExpression};
///
/// let compiler = GenericExpressionCompiler::new(&BackendDescriptor::postgres());
/// let expr = SqlExpression::func("LOWER", vec![SqlExpression::column("users", "email")]);
/// let (sql, params) = compiler.compile(&expr);
/// assert_eq!(sql, "LOWER(\"email\")");
/// assert!(params.is_empty());
/// ```
pub struct GenericExpressionCompiler {
	descriptor: BackendDescriptor,
}

impl GenericExpressionCompiler {
	pub fn new(descriptor: &BackendDescriptor) -> Self {
		Self {
			descriptor: descriptor.clone(),
		}
	}
}

impl ExpressionCompiler for GenericExpressionCompiler {
	fn compile(&self, expression: &SqlExpression) -> (String, Vec<SqlValue>) {
		match expression {
			SqlExpression::Column { column, .. } => (self.descriptor.quote_name(column), vec![]),
			SqlExpression::Value(value) => ("%s".to_string(), vec![value.clone()]),
			SqlExpression::Func { name, args } => {
				let mut parts = Vec::with_capacity(args.len());
				let mut params = Vec::new();
				for arg in args {
					let (sql, mut p) = self.compile(arg);
					parts.push(sql);
					params.append(&mut p);
				}
				(format!("{}({})", name, parts.join(", ")), params)
			}
			SqlExpression::BinaryOp { left, op, right } => {
				let (left_sql, mut params) = self.compile(left);
				let (right_sql, mut right_params) = self.compile(right);
				params.append(&mut right_params);
				(format!("({left_sql} {op} {right_sql})"), params)
			}
			SqlExpression::Ordered {
				expr,
				descending,
				nulls_first,
			} => {
				let (sql, params) = self.compile(expr);
				let mut rendered = sql;
				if *descending {
					rendered.push_str(" DESC");
				}
				match nulls_first {
					Some(true) => rendered.push_str(" NULLS FIRST"),
					Some(false) => rendered.push_str(" NULLS LAST"),
					None => {}
				}
				(rendered, params)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn compiler() -> GenericExpressionCompiler {
		GenericExpressionCompiler::new(&BackendDescriptor::postgres())
	}

	#[test]
	fn test_binary_with_literal() {
		let expr = SqlExpression::binary(
			SqlExpression::column("users", "age"),
			">=",
			SqlExpression::value(18i64),
		);
		let (sql, params) = compiler().compile(&expr);
		assert_eq!(sql, "(\"age\" >= %s)");
		assert_eq!(params, vec![SqlValue::Int(18)]);
	}

	#[test]
	fn test_ordered_desc_nulls_last() {
		let expr = SqlExpression::Ordered {
			expr: Box::new(SqlExpression::column("t", "a")),
			descending: true,
			nulls_first: Some(false),
		};
		let (sql, _) = compiler().compile(&expr);
		assert_eq!(sql, "\"a\" DESC NULLS LAST");
	}

	#[test]
	fn test_mysql_quoting() {
		let compiler = GenericExpressionCompiler::new(&BackendDescriptor::mysql());
		let (sql, _) = compiler.compile(&SqlExpression::column("t", "a"));
		assert_eq!(sql, "`a`");
	}
}
