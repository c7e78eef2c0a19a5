//! Tests for the query module.

use crate::connection::ExecOutcome;
use crate::error::{EngineError, ExecErrorKind, OrmError};
use crate::grammar::{Direction, Join, Operand, Predicate};
use crate::query::{Delete, Insert, Select, StatementKind, Update};
use crate::record;
use crate::test_support::{MockConnection, shop_catalog};
use crate::value::{Record, Value};

#[test]
fn select_defaults_to_base_star() {
    let q = Select::new("users");
    assert_eq!(q.statement().unwrap().sql, "SELECT `users`.* FROM `users`");

    let q = Select::aliased("users", "u");
    assert_eq!(q.statement().unwrap().sql, "SELECT `u`.* FROM `users` AS `u`");
}

#[test]
fn select_renders_clauses_in_fixed_order() {
    let q = Select::new("orders")
        .limit(5)
        .order_by("orders.user_id", Direction::Desc)
        .having(Predicate::gt(Operand::raw("COUNT(*)"), 1))
        .group_by("orders.user_id")
        .where_eq("status", "new")
        .where_gte("total", 10)
        .select(["user_id"])
        .select_expr("n", "COUNT(*)");

    let stmt = q.statement().unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT `orders`.`user_id`, COUNT(*) AS `n` FROM `orders` \
         WHERE `orders`.`status` = :where_orders_status AND `orders`.`total` >= :where_orders_total \
         GROUP BY `orders`.`user_id` HAVING COUNT(*) > :having_count \
         ORDER BY `orders`.`user_id` DESC LIMIT 5"
    );
    assert_eq!(stmt.kind, StatementKind::Select);
    assert_eq!(stmt.bindings.len(), 3);
    assert_eq!(stmt.bindings.get("where_orders_status"), Some(&Value::from("new")));
    assert_eq!(stmt.bindings.get("where_orders_total"), Some(&Value::Int(10)));
    assert_eq!(stmt.bindings.get("having_count"), Some(&Value::Int(1)));
}

#[test]
fn rendering_is_idempotent() {
    let q = Select::new("orders")
        .where_in("status", ["new", "shipped"])
        .where_between("total", 1, 100);
    let first = q.statement().unwrap();
    let second = q.statement().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.bindings.len(), 4);
}

#[test]
fn same_column_twice_gets_distinct_labels() {
    let q = Select::new("orders").where_gte("total", 10).where_lte("total", 20);
    let stmt = q.statement().unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT `orders`.* FROM `orders` WHERE `orders`.`total` >= :where_orders_total AND `orders`.`total` <= :where_orders_total_2"
    );
    assert_eq!(stmt.bindings.get("where_orders_total_2"), Some(&Value::Int(20)));
}

#[test]
fn join_labels_stay_distinct_across_joins() {
    // `u_user`.`id` and `u`.`user_id` reduce to the same label stem.
    let q = Select::new("orders")
        .join(
            Join::inner("users")
                .alias("u_user")
                .on_columns(("orders", "user_id"), ("u_user", "id"))
                .on(Predicate::eq("u_user.id", 5)),
        )
        .unwrap()
        .join(
            Join::left("profiles")
                .alias("u")
                .on_columns(("orders", "user_id"), ("u", "user_id"))
                .on(Predicate::eq("u.user_id", 6)),
        )
        .unwrap();
    let stmt = q.statement().unwrap();
    assert!(stmt.sql.contains("`u_user`.`id` = :join_u_user_id"));
    assert!(stmt.sql.contains("`u`.`user_id` = :join_u_user_id_2"));
    assert_eq!(stmt.bindings.get("join_u_user_id"), Some(&Value::Int(5)));
    assert_eq!(stmt.bindings.get("join_u_user_id_2"), Some(&Value::Int(6)));
}

#[test]
fn select_also_keeps_existing_projections() {
    let q = Select::aliased("users", "u")
        .select_also([("u", "email")])
        .select_also(["email"]);
    assert_eq!(
        q.statement().unwrap().sql,
        "SELECT `u`.*, `u`.`email` FROM `users` AS `u`"
    );
}

#[test]
fn search_binds_escaped_term() {
    let q = Select::new("users").search(["email", "name"], "50%_off");
    let stmt = q.statement().unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT `users`.* FROM `users` WHERE (`users`.`email` LIKE :where_users_email OR `users`.`name` LIKE :where_users_name)"
    );
    assert_eq!(
        stmt.bindings.get("where_users_email"),
        Some(&Value::from(r"%50\%\_off%"))
    );

    let untouched = Select::new("users").search(["email"], "   ");
    assert!(untouched.statement().unwrap().bindings.is_empty());
}

#[test]
fn explicit_join_alias_rules() {
    let err = Select::aliased("orders", "o")
        .join(Join::inner("users").alias("o").on_columns("o.user_id", "o.id"))
        .unwrap_err();
    assert!(matches!(
        err,
        OrmError::AliasConflict { ref alias, ref existing, ref requested }
            if alias == "o" && existing == "orders" && requested == "users"
    ));

    let err = Select::new("orders").join(Join::left("users")).unwrap_err();
    assert!(matches!(err, OrmError::InvalidJoinSpec(_)));

    let q = Select::new("orders")
        .join(Join::inner("users").alias("buyer").on_columns("orders.user_id", "buyer.id"))
        .unwrap();
    assert_eq!(q.join_count(), 1);
    assert_eq!(q.table_for("buyer"), Some("users"));
    assert!(q.is_joined("users"));
    assert_eq!(
        q.statement().unwrap().sql,
        "SELECT `orders`.* FROM `orders` INNER JOIN `users` AS `buyer` ON `orders`.`user_id` = `buyer`.`id`"
    );
}

#[test]
fn count_statement_drops_order_and_limit() {
    let q = Select::new("orders")
        .where_eq("status", "new")
        .order_by("orders.id", Direction::Asc)
        .limit(10);
    let stmt = q.count_statement().unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT COUNT(*) AS `total` FROM `orders` WHERE `orders`.`status` = :where_orders_status"
    );
    assert_eq!(stmt.kind, StatementKind::Count);

    let grouped = Select::new("orders").group_by("orders.user_id");
    assert_eq!(
        grouped.count_statement().unwrap().sql,
        "SELECT COUNT(*) AS `total` FROM (SELECT 1 AS `one` FROM `orders` GROUP BY `orders`.`user_id`) AS `counted`"
    );
}

#[test]
fn paginate_is_one_based() {
    let q = Select::new("users").paginate(3, 20);
    assert_eq!(
        q.statement().unwrap().sql,
        "SELECT `users`.* FROM `users` LIMIT 20 OFFSET 40"
    );
    let q = Select::new("users").paginate(0, 0);
    assert!(q.statement().unwrap().sql.ends_with("LIMIT 1 OFFSET 0"));
}

#[test]
fn update_without_conditions_is_rejected_before_rendering() {
    let catalog = shop_catalog();
    let conn = MockConnection::new();
    let err = Update::new(
        &catalog,
        "orders",
        &record! { "status" => "shipped" },
        &Record::new(),
    )
    .unwrap_err();
    assert!(matches!(err, OrmError::UpdateRequiresConditions(ref t) if t == "orders"));
    assert!(err.is_build_error());
    assert!(conn.calls().is_empty());

    // Conditions are checked before alterations.
    let err = Update::new(&catalog, "orders", &Record::new(), &Record::new()).unwrap_err();
    assert!(matches!(err, OrmError::UpdateRequiresConditions(_)));
}

#[test]
fn update_build_errors() {
    let catalog = shop_catalog();
    let err = Update::new(
        &catalog,
        "orders",
        &record! { "bogus" => 1 },
        &record! { "id" => 5 },
    )
    .unwrap_err();
    assert!(matches!(err, OrmError::UpdateRequiresAlterations(_)));

    let err = Update::new(
        &catalog,
        "orders",
        &record! { "status" => "new" },
        &record! { "nope" => 5 },
    )
    .unwrap_err();
    assert!(matches!(err, OrmError::ColumnNotFound { ref column, .. } if column == "nope"));
}

#[test]
fn update_renders_set_and_where() {
    let catalog = shop_catalog();
    let update = Update::new(
        &catalog,
        "orders",
        &record! { "status" => "shipped", "bogus" => 1 },
        &record! { "id" => 5 },
    )
    .unwrap();
    let stmt = update.statement().unwrap();
    assert_eq!(
        stmt.sql,
        "UPDATE `orders` SET `status` = :set_orders_status WHERE `orders`.`id` = :where_orders_id"
    );
    assert_eq!(stmt.bindings.get("set_orders_status"), Some(&Value::from("shipped")));
    assert_eq!(stmt.bindings.get("where_orders_id"), Some(&Value::Int(5)));
}

#[test]
fn insert_drops_auto_increment_and_unknown_columns() {
    let catalog = shop_catalog();
    let insert = Insert::new(
        &catalog,
        "orders",
        &record! { "id" => 9, "user_id" => 1, "status" => "new", "extra" => "x" },
    )
    .unwrap();
    assert_eq!(insert.columns().collect::<Vec<_>>(), vec!["user_id", "status"]);
    assert_eq!(
        insert.statement().unwrap().sql,
        "INSERT INTO `orders` (`user_id`, `status`) VALUES (:insert_orders_user_id, :insert_orders_status)"
    );

    let err = Insert::new(&catalog, "users", &record! { "id" => 1 }).unwrap_err();
    assert!(matches!(err, OrmError::EmptyInsertData(ref t) if t == "users"));
}

#[test]
fn delete_requires_conditions() {
    let catalog = shop_catalog();
    let err = Delete::new(&catalog, "users", &Record::new()).unwrap_err();
    assert!(matches!(err, OrmError::DeleteUsedAsTruncate(_)));

    let delete = Delete::new(&catalog, "users", &record! { "id" => 3 }).unwrap();
    assert_eq!(
        delete.statement().unwrap().sql,
        "DELETE FROM `users` WHERE `users`.`id` = :where_users_id"
    );

    let err = Delete::new(&catalog, "ghosts", &record! { "id" => 3 }).unwrap_err();
    assert!(matches!(err, OrmError::TableNotFound(_)));
}

#[tokio::test]
async fn insert_run_records_outcome() {
    let catalog = shop_catalog();
    let conn = MockConnection::new();
    conn.push_exec(ExecOutcome::inserted(42));

    let mut insert = Insert::new(&catalog, "users", &record! { "email" => "a@b.c" }).unwrap();
    assert!(!insert.is_success());
    assert_eq!(insert.run(&conn).await.unwrap(), 1);
    assert!(insert.is_success());
    assert_eq!(insert.row_count(), 1);
    assert_eq!(insert.last_insert_id(), Some(42));

    let (sql, bindings) = conn.last_call().unwrap();
    assert_eq!(sql, "INSERT INTO `users` (`email`) VALUES (:insert_users_email)");
    assert_eq!(bindings.get("insert_users_email"), Some(&Value::from("a@b.c")));
}

#[tokio::test]
async fn engine_failure_is_transcribed_and_recorded() {
    let catalog = shop_catalog();
    let conn = MockConnection::new();
    conn.push_error(EngineError::new(
        "23000",
        1062,
        "Duplicate entry 'a@b.c' for key 'users.email_unique'",
    ));

    let mut insert = Insert::new(&catalog, "users", &record! { "email" => "a@b.c" }).unwrap();
    let err = insert.run(&conn).await.unwrap_err();
    assert!(err.is_duplicate_key());
    assert!(!insert.is_success());
    let recorded = insert.last_error().unwrap();
    assert_eq!(recorded.kind, ExecErrorKind::DuplicateKey);
    assert_eq!(recorded.constraint.as_deref(), Some("email_unique"));
}

#[tokio::test]
async fn select_fetch_variants() {
    let conn = MockConnection::new();
    conn.push_rows(vec![record! { "id" => 1 }, record! { "id" => 2 }]);

    let mut q = Select::new("users").where_eq("active", true);
    let rows = q.fetch_all(&conn).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(q.row_count(), 2);
    assert!(q.is_success());

    let err = q.fetch_one(&conn).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(q.fetch_opt(&conn).await.unwrap(), None);
}

#[tokio::test]
async fn select_count_reads_total() {
    let conn = MockConnection::new();
    conn.push_rows(vec![record! { "total" => 7 }]);
    let mut q = Select::new("orders").where_eq("status", "new");
    assert_eq!(q.count(&conn).await.unwrap(), 7);
    assert!(conn.last_call().unwrap().0.starts_with("SELECT COUNT(*) AS `total`"));
}

#[tokio::test]
async fn builder_changes_invalidate_prepared_statement() {
    let conn = MockConnection::new();
    let mut q = Select::new("users");
    q.run(&conn).await.unwrap();

    let mut q = q.where_eq("id", 1);
    q.run(&conn).await.unwrap();

    assert_eq!(
        conn.statements(),
        vec![
            "SELECT `users`.* FROM `users`",
            "SELECT `users`.* FROM `users` WHERE `users`.`id` = :where_users_id",
        ]
    );
}
