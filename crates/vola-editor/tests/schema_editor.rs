//! End-to-end scenarios over a recording connection: statement ordering,
//! deferred flushing, rename propagation, pruning and the rebuild path.

use vola_backends::{BackendDescriptor, RecordingConnection};
use vola_editor::{SchemaEditor, SchemaError};
use vola_models::{
	ColumnType, Constraint, ExclusionConstraint, FieldDescription, ForeignKeyAction,
	IndexDescription, ModelDescription, RelationDescription, UniqueConstraint,
};

fn users() -> ModelDescription {
	ModelDescription::new("users")
		.with_field(FieldDescription::new("id", ColumnType::BigInt).with_primary_key(true))
}

fn posts() -> ModelDescription {
	ModelDescription::new("posts")
		.with_field(FieldDescription::new("id", ColumnType::BigInt).with_primary_key(true))
		.with_field(
			FieldDescription::new("author_id", ColumnType::BigInt)
				.with_relation(
					RelationDescription::new("users", "id")
						.with_on_delete(ForeignKeyAction::Cascade),
				)
				.with_db_index(true),
		)
}

fn new_editor(
	descriptor: BackendDescriptor,
) -> (
	SchemaEditor<RecordingConnection>,
	std::sync::Arc<parking_lot::Mutex<Vec<String>>>,
) {
	let connection = RecordingConnection::new();
	let log = connection.log_handle();
	(SchemaEditor::new(descriptor, connection), log)
}

#[tokio::test]
async fn test_create_model_defers_fk_and_index_until_commit() {
	let (mut editor, log) = new_editor(BackendDescriptor::postgres());
	editor.create_model(&users()).await.unwrap();
	editor.create_model(&posts()).await.unwrap();
	assert_eq!(editor.deferred_count(), 2);
	editor.commit().await.unwrap();

	let executed = log.lock().clone();
	assert_eq!(executed[0], "BEGIN");
	assert_eq!(
		executed[1],
		"CREATE TABLE \"users\" (\"id\" bigint NOT NULL PRIMARY KEY)"
	);
	assert_eq!(
		executed[2],
		"CREATE TABLE \"posts\" (\"id\" bigint NOT NULL PRIMARY KEY, \"author_id\" bigint NOT NULL)"
	);
	// Deferred statements flush in FIFO order: the FK first, then the index.
	assert!(executed[3].starts_with("ALTER TABLE \"posts\" ADD CONSTRAINT"));
	assert!(executed[3].contains(
		"FOREIGN KEY (\"author_id\") REFERENCES \"users\" (\"id\") ON DELETE CASCADE"
	));
	assert!(executed[4].starts_with("CREATE INDEX"));
	assert!(executed[4].ends_with("ON \"posts\" (\"author_id\")"));
	assert_eq!(executed[5], "COMMIT");
}

#[tokio::test]
async fn test_table_rename_rewrites_already_deferred_statements() {
	let (mut editor, log) = new_editor(BackendDescriptor::postgres());
	editor.create_model(&users()).await.unwrap();
	editor.create_model(&posts()).await.unwrap();
	// The FK referencing "users" is still queued when the rename happens.
	editor.alter_db_table("users", "accounts").await.unwrap();
	editor.commit().await.unwrap();

	let executed = log.lock().clone();
	let fk = executed
		.iter()
		.find(|sql| sql.contains("FOREIGN KEY"))
		.unwrap();
	assert!(fk.contains("REFERENCES \"accounts\" (\"id\")"));
	assert!(!fk.contains("\"users\""));
	// The generated name follows the rename too.
	assert!(fk.contains("_fk_accounts_id"));
}

#[tokio::test]
async fn test_column_rename_rewrites_already_deferred_statements() {
	let (mut editor, log) = new_editor(BackendDescriptor::mysql());
	editor.create_model(&users()).await.unwrap();
	editor.create_model(&posts()).await.unwrap();

	let old = FieldDescription::new("id", ColumnType::BigInt).with_primary_key(true);
	let new = FieldDescription::new("pk", ColumnType::BigInt).with_primary_key(true);
	editor.alter_field(&users(), &old, &new, false).await.unwrap();
	editor.commit().await.unwrap();

	let executed = log.lock().clone();
	assert!(executed
		.iter()
		.any(|sql| sql == "ALTER TABLE `users` RENAME COLUMN `id` TO `pk`"));
	let fk = executed
		.iter()
		.find(|sql| sql.contains("FOREIGN KEY"))
		.unwrap();
	assert!(fk.contains("REFERENCES `users` (`pk`)"));
}

#[tokio::test]
async fn test_noop_alter_emits_no_statements() {
	let (mut editor, log) = new_editor(BackendDescriptor::postgres());
	let field = FieldDescription::new("age", ColumnType::Integer);
	editor
		.alter_field(&users(), &field, &field.clone(), false)
		.await
		.unwrap();
	editor.commit().await.unwrap();
	assert_eq!(log.lock().clone(), vec!["BEGIN", "COMMIT"]);
}

#[tokio::test]
async fn test_backfill_runs_before_not_null() {
	let (mut editor, log) = new_editor(BackendDescriptor::postgres());
	let old = FieldDescription::new("age", ColumnType::Integer).with_nullable(true);
	let new = FieldDescription::new("age", ColumnType::Integer).with_default(0i64);
	editor.alter_field(&users(), &old, &new, false).await.unwrap();
	editor.commit().await.unwrap();

	let executed = log.lock().clone();
	assert_eq!(
		&executed[1..5],
		&[
			"ALTER TABLE \"users\" ALTER COLUMN \"age\" SET DEFAULT 0".to_string(),
			"UPDATE \"users\" SET \"age\" = 0 WHERE \"age\" IS NULL".to_string(),
			"ALTER TABLE \"users\" ALTER COLUMN \"age\" SET NOT NULL".to_string(),
			"ALTER TABLE \"users\" ALTER COLUMN \"age\" DROP DEFAULT".to_string(),
		]
	);
}

#[tokio::test]
async fn test_sqlite_type_change_rebuilds_the_table() {
	let (mut editor, log) = new_editor(BackendDescriptor::sqlite());
	let model = users().with_field(FieldDescription::new("age", ColumnType::Integer));
	let old = FieldDescription::new("age", ColumnType::Integer);
	let new = FieldDescription::new("age", ColumnType::Text);
	editor.alter_field(&model, &old, &new, false).await.unwrap();
	editor.commit().await.unwrap();

	let executed = log.lock().clone();
	assert_eq!(
		executed[1],
		"CREATE TABLE \"new__users\" (\"id\" integer NOT NULL PRIMARY KEY, \"age\" text NOT NULL)"
	);
	assert_eq!(
		executed[2],
		"INSERT INTO \"new__users\" (\"id\", \"age\") SELECT \"id\", \"age\" FROM \"users\""
	);
	assert_eq!(executed[3], "DROP TABLE \"users\"");
	assert_eq!(executed[4], "ALTER TABLE \"new__users\" RENAME TO \"users\"");
}

#[tokio::test]
async fn test_rebuild_backfills_during_the_copy() {
	let (mut editor, log) = new_editor(BackendDescriptor::sqlite());
	let model = users().with_field(
		FieldDescription::new("age", ColumnType::Integer).with_nullable(true),
	);
	let old = FieldDescription::new("age", ColumnType::Integer).with_nullable(true);
	let new = FieldDescription::new("age", ColumnType::Integer).with_default(0i64);
	editor.alter_field(&model, &old, &new, false).await.unwrap();
	editor.commit().await.unwrap();

	let executed = log.lock().clone();
	let copy = executed
		.iter()
		.find(|sql| sql.starts_with("INSERT INTO"))
		.unwrap();
	assert!(copy.contains("COALESCE(\"age\", 0)"));
}

#[tokio::test]
async fn test_delete_model_prunes_deferred_statements() {
	let (mut editor, log) = new_editor(BackendDescriptor::postgres());
	editor.create_model(&users()).await.unwrap();
	editor.create_model(&posts()).await.unwrap();
	assert_eq!(editor.deferred_count(), 2);
	editor.delete_model(&posts()).await.unwrap();
	assert_eq!(editor.deferred_count(), 0);
	editor.commit().await.unwrap();

	let executed = log.lock().clone();
	assert!(executed.iter().any(|sql| sql == "DROP TABLE \"posts\" CASCADE"));
	assert!(!executed.iter().any(|sql| sql.contains("CREATE INDEX")));
	assert!(!executed.iter().any(|sql| sql.contains("FOREIGN KEY")));
}

#[tokio::test]
async fn test_remove_field_prunes_its_deferred_statements() {
	let (mut editor, log) = new_editor(BackendDescriptor::postgres());
	editor.create_model(&users()).await.unwrap();
	editor.create_model(&posts()).await.unwrap();
	let field = posts().field("author_id").unwrap().clone();
	editor.remove_field(&posts(), &field).await.unwrap();
	assert_eq!(editor.deferred_count(), 0);
	editor.commit().await.unwrap();

	let executed = log.lock().clone();
	assert!(executed
		.iter()
		.any(|sql| sql == "ALTER TABLE \"posts\" DROP COLUMN \"author_id\" CASCADE"));
}

#[tokio::test]
async fn test_collect_sql_executes_nothing() {
	let connection = RecordingConnection::new();
	let log = connection.log_handle();
	let mut editor = SchemaEditor::collecting(BackendDescriptor::postgres(), connection);
	editor.create_model(&posts()).await.unwrap();
	editor.commit().await.unwrap();

	assert!(log.lock().is_empty());
	let collected = editor.collected_sql();
	assert!(collected[0].starts_with("CREATE TABLE \"posts\""));
	// Deferred statements land at the end, in order.
	assert!(collected.last().unwrap().starts_with("CREATE INDEX"));
}

#[tokio::test]
async fn test_flush_stops_at_first_failure() {
	let connection = RecordingConnection::failing_on("CREATE INDEX");
	let log = connection.log_handle();
	let mut editor = SchemaEditor::new(BackendDescriptor::postgres(), connection);
	editor.create_model(&posts()).await.unwrap();
	assert!(matches!(
		editor.commit().await,
		Err(SchemaError::Database(_))
	));

	let executed = log.lock().clone();
	assert!(!executed.iter().any(|sql| sql == "COMMIT"));
	editor.rollback().await.unwrap();
	assert_eq!(log.lock().last().map(String::as_str), Some("ROLLBACK"));
}

#[tokio::test]
async fn test_add_field_not_null_without_default_is_refused() {
	let (mut editor, _log) = new_editor(BackendDescriptor::postgres());
	let field = FieldDescription::new("age", ColumnType::Integer);
	assert!(matches!(
		editor.add_field(&users(), &field).await,
		Err(SchemaError::InvalidSpecification(_))
	));
}

#[tokio::test]
async fn test_add_field_drops_the_temporary_default() {
	let (mut editor, log) = new_editor(BackendDescriptor::postgres());
	let field = FieldDescription::new("age", ColumnType::Integer).with_default(0i64);
	editor.add_field(&users(), &field).await.unwrap();
	editor.commit().await.unwrap();

	let executed = log.lock().clone();
	assert_eq!(
		executed[1],
		"ALTER TABLE \"users\" ADD COLUMN \"age\" integer DEFAULT 0 NOT NULL"
	);
	assert_eq!(
		executed[2],
		"ALTER TABLE \"users\" ALTER COLUMN \"age\" DROP DEFAULT"
	);
}

#[tokio::test]
async fn test_sqlite_add_field_with_default_rebuilds_the_table() {
	let (mut editor, log) = new_editor(BackendDescriptor::sqlite());
	let field = FieldDescription::new("age", ColumnType::Integer).with_default(0i64);
	editor.add_field(&users(), &field).await.unwrap();
	editor.commit().await.unwrap();

	let executed = log.lock().clone();
	assert_eq!(
		executed[1],
		"CREATE TABLE \"new__users\" (\"id\" integer NOT NULL PRIMARY KEY, \"age\" integer NOT NULL)"
	);
	assert_eq!(
		executed[2],
		"INSERT INTO \"new__users\" (\"id\", \"age\") SELECT \"id\", 0 FROM \"users\""
	);
	assert_eq!(executed[3], "DROP TABLE \"users\"");
	assert_eq!(executed[4], "ALTER TABLE \"new__users\" RENAME TO \"users\"");
	// The backfill default never sticks to the rebuilt column.
	assert!(!executed.iter().any(|sql| sql.contains("ADD COLUMN")));
	assert!(!executed.iter().any(|sql| sql.contains("DEFAULT")));
}

#[tokio::test]
async fn test_alter_unique_together_reconciles_constraints() {
	let (mut editor, log) = new_editor(BackendDescriptor::postgres());
	let old = vec![vec!["a".to_string(), "b".to_string()]];
	let new = vec![vec!["a".to_string(), "c".to_string()]];
	editor
		.alter_unique_together(&users(), &old, &new)
		.await
		.unwrap();
	editor.commit().await.unwrap();

	let executed = log.lock().clone();
	assert!(executed[1].starts_with("ALTER TABLE \"users\" DROP CONSTRAINT"));
	assert!(executed[2].contains("ADD CONSTRAINT"));
	assert!(executed[2].ends_with("UNIQUE (\"a\", \"c\")"));
}

#[tokio::test]
async fn test_rename_index_uses_the_rename_template_where_available() {
	let (mut editor, log) = new_editor(BackendDescriptor::postgres());
	let index = IndexDescription::on_columns(vec!["email".to_string()]).with_name("old_idx");
	editor
		.rename_index(&users(), &index, "old_idx", "new_idx")
		.await
		.unwrap();
	editor.commit().await.unwrap();
	assert!(log
		.lock()
		.iter()
		.any(|sql| sql == "ALTER INDEX \"old_idx\" RENAME TO \"new_idx\""));
}

#[tokio::test]
async fn test_rename_index_falls_back_to_drop_and_recreate() {
	let (mut editor, log) = new_editor(BackendDescriptor::sqlite());
	let index = IndexDescription::on_columns(vec!["email".to_string()]).with_name("old_idx");
	editor
		.rename_index(&users(), &index, "old_idx", "new_idx")
		.await
		.unwrap();
	editor.commit().await.unwrap();

	let executed = log.lock().clone();
	assert!(executed.iter().any(|sql| sql == "DROP INDEX \"old_idx\""));
	assert!(executed
		.iter()
		.any(|sql| sql == "CREATE INDEX \"new_idx\" ON \"users\" (\"email\")"));
}

#[tokio::test]
async fn test_exclusion_constraint_renders_on_postgres_only() {
	use vola_ddl::SqlExpression;
	let exclusion = Constraint::Exclusion(
		ExclusionConstraint::new(
			"bookings_excl",
			vec![(SqlExpression::column("bookings", "room"), "=".to_string())],
		)
		.unwrap(),
	);

	let (mut editor, log) = new_editor(BackendDescriptor::postgres());
	editor
		.add_constraint(&ModelDescription::new("bookings"), &exclusion)
		.await
		.unwrap();
	editor.commit().await.unwrap();
	assert!(log.lock().iter().any(|sql| sql
		== "ALTER TABLE \"bookings\" ADD CONSTRAINT \"bookings_excl\" EXCLUDE USING GIST (\"room\" WITH =)"));

	let (mut editor, _log) = new_editor(BackendDescriptor::mysql());
	assert!(matches!(
		editor
			.add_constraint(&ModelDescription::new("bookings"), &exclusion)
			.await,
		Err(SchemaError::NotSupported { .. })
	));
}


#[tokio::test]
async fn test_partial_unique_constraint_becomes_a_unique_index() {
	use vola_ddl::SqlExpression;
	let constraint = Constraint::Unique(
		UniqueConstraint::new("active_email_uniq", vec!["email".to_string()])
			.with_condition(SqlExpression::binary(
				SqlExpression::column("users", "active"),
				"=",
				SqlExpression::value(true),
			))
			.unwrap(),
	);
	let (mut editor, log) = new_editor(BackendDescriptor::postgres());
	editor.add_constraint(&users(), &constraint).await.unwrap();
	editor.remove_constraint(&users(), &constraint).await.unwrap();
	editor.commit().await.unwrap();

	let executed = log.lock().clone();
	assert_eq!(
		executed[1],
		"CREATE UNIQUE INDEX \"active_email_uniq\" ON \"users\" (\"email\") WHERE (\"active\" = TRUE)"
	);
	assert_eq!(executed[2], "DROP INDEX \"active_email_uniq\"");
}

#[tokio::test]
async fn test_table_comment_is_a_noop_without_support() {
	let (mut editor, log) = new_editor(BackendDescriptor::sqlite());
	editor
		.alter_db_table_comment(&users(), Some("people"))
		.await
		.unwrap();
	assert!(log.lock().is_empty());

	let (mut editor, log) = new_editor(BackendDescriptor::postgres());
	editor
		.alter_db_table_comment(&users(), Some("people"))
		.await
		.unwrap();
	editor.commit().await.unwrap();
	assert!(log
		.lock()
		.iter()
		.any(|sql| sql == "COMMENT ON TABLE \"users\" IS 'people'"));
}

#[tokio::test]
async fn test_mysql_case_only_table_rename_is_skipped() {
	let (mut editor, log) = new_editor(BackendDescriptor::mysql());
	editor.alter_db_table("Users", "users").await.unwrap();
	assert!(log.lock().is_empty());

	let (mut editor, log) = new_editor(BackendDescriptor::postgres());
	editor.alter_db_table("Users", "users").await.unwrap();
	editor.commit().await.unwrap();
	assert!(log
		.lock()
		.iter()
		.any(|sql| sql == "ALTER TABLE \"Users\" RENAME TO \"users\""));
}

#[tokio::test]
async fn test_create_model_with_through_tables() {
	let through = ModelDescription::new("users_groups")
		.with_field(FieldDescription::new("id", ColumnType::BigInt).with_primary_key(true))
		.with_field(
			FieldDescription::new("user_id", ColumnType::BigInt)
				.with_relation(RelationDescription::new("users", "id")),
		)
		.with_field(
			FieldDescription::new("group_id", ColumnType::BigInt)
				.with_relation(RelationDescription::new("groups", "id")),
		);
	let model = users().with_auto_through(through);

	let (mut editor, log) = new_editor(BackendDescriptor::postgres());
	editor.create_model(&model).await.unwrap();
	// Two FKs from the through table wait on the deferred queue.
	assert_eq!(editor.deferred_count(), 2);
	editor.delete_model(&model).await.unwrap();
	assert_eq!(editor.deferred_count(), 0);
	editor.commit().await.unwrap();

	let executed = log.lock().clone();
	// The through table drops before its owner.
	let through_drop = executed
		.iter()
		.position(|sql| sql == "DROP TABLE \"users_groups\" CASCADE")
		.unwrap();
	let owner_drop = executed
		.iter()
		.position(|sql| sql == "DROP TABLE \"users\" CASCADE")
		.unwrap();
	assert!(through_drop < owner_drop);
}
