mod common;

use std::sync::Arc;

use common::{FakeDb, Reply, blog_metadata};
use sqlrow::{
    AutoJoin, Entity, ExecOutcome, LoadOutcome, OrmError, Relation, Row, SchemaCatalog, Select,
    Value, record,
};

#[derive(Debug, PartialEq, Entity)]
#[orm(table = "users")]
struct User {
    id: Option<i64>,
    #[orm(column = "email")]
    address: String,
    name: Option<String>,
    #[orm(skip)]
    visits: u32,
}

async fn catalog(db: &FakeDb) -> Arc<SchemaCatalog> {
    Arc::new(SchemaCatalog::load(db, "blog").await.unwrap())
}

#[tokio::test]
async fn catalog_is_built_from_engine_metadata() {
    let db = FakeDb::with_schema(blog_metadata());
    let catalog = catalog(&db).await;

    assert_eq!(
        catalog.tables().collect::<Vec<_>>(),
        vec!["orders", "roles", "user_roles", "users"]
    );
    assert_eq!(catalog.primary_keys("user_roles").unwrap(), ["user_id", "role_id"]);
    assert_eq!(catalog.auto_incremented_primary_key("users").unwrap(), Some("id"));
    assert_eq!(catalog.unique_keys("users").unwrap()[0].columns, ["email"]);
    assert_eq!(catalog.foreign_keys("orders").unwrap()[0].referenced_table, "users");
    assert!(db.statements().is_empty());
}

#[tokio::test]
async fn entity_persists_and_reloads() {
    let db = FakeDb::with_schema(blog_metadata());
    let catalog = catalog(&db).await;
    assert_eq!(User::columns(), ["id", "email", "name"]);

    let ann = User {
        id: None,
        address: "ann@example.com".into(),
        name: Some("Ann".into()),
        visits: 3,
    };
    db.reply(Reply::Exec(ExecOutcome::inserted(11)));
    let mut row = Row::from_entity(catalog.clone(), &ann).unwrap();
    assert!(row.persist(&db).await.unwrap().is_empty());
    assert_eq!(
        db.last().0,
        "INSERT INTO `users` (`email`, `name`) VALUES (:insert_users_email, :insert_users_name)"
    );

    let stored: User = row.to_entity().unwrap();
    assert_eq!(stored.id, Some(11));
    assert_eq!(stored.visits, 0);

    db.reply(Reply::Rows(vec![record! {
        "id" => 11,
        "email" => "ann@example.com",
        "name" => "Ann",
    }]));
    let mut again = Row::new(catalog.clone(), "users", record! { "email" => "ann@example.com" })
        .unwrap();
    assert_eq!(again.load(&db).await.unwrap(), LoadOutcome::Loaded);
    assert_eq!(again.to_entity::<User>().unwrap().id, Some(11));

    again.alter(record! { "name" => "Anna" }).unwrap();
    again.persist(&db).await.unwrap();
    let (sql, bindings) = db.last();
    assert_eq!(
        sql,
        "UPDATE `users` SET `name` = :set_users_name WHERE `users`.`id` = :where_users_id"
    );
    assert_eq!(bindings.get("where_users_id"), Some(&Value::Int(11)));
}

#[tokio::test]
async fn select_decodes_entities_through_auto_join() {
    let db = FakeDb::with_schema(blog_metadata());
    let catalog = catalog(&db).await;

    let mut select = Select::new("orders");
    let joiner = AutoJoin::new(&catalog);
    assert!(joiner.join(&mut select, "users", None).unwrap());
    assert!(!joiner.join(&mut select, "users", None).unwrap());
    let mut select = select.select(["users.id", "users.email", "users.name"]);
    assert_eq!(
        select.statement().unwrap().sql,
        "SELECT `users`.`id`, `users`.`email`, `users`.`name` FROM `orders` \
         LEFT OUTER JOIN `users` ON `orders`.`user_id` = `users`.`id`"
    );

    db.reply(Reply::Rows(vec![
        record! { "id" => 1, "email" => "a@example.com", "name" => Value::Null },
        record! { "id" => 2, "email" => "b@example.com", "name" => "Bea" },
    ]));
    let users: Vec<User> = select.fetch_all_as(&db).await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[1].name.as_deref(), Some("Bea"));
    assert!(select.is_success());
    assert_eq!(select.row_count(), 2);
}

#[tokio::test]
async fn relation_links_are_replaced_atomically() {
    let db = FakeDb::with_schema(blog_metadata());
    let catalog = catalog(&db).await;
    let user = Row::from_loaded(catalog.clone(), "users", record! { "id" => 5, "email" => "e@x.y" })
        .unwrap();
    let roles = Relation::resolve(&catalog, "user_roles", "users", Some("roles")).unwrap();

    roles
        .replace(&db, &user, &[Value::Int(1), Value::Int(2)], None)
        .await
        .unwrap();
    assert_eq!(
        db.statements(),
        vec![
            "START TRANSACTION",
            "DELETE FROM `user_roles` WHERE `user_roles`.`user_id` = :where_user_roles_user_id",
            "INSERT INTO `user_roles` (`user_id`, `role_id`) VALUES (:insert_user_roles_user_id, :insert_user_roles_role_id)",
            "INSERT INTO `user_roles` (`user_id`, `role_id`) VALUES (:insert_user_roles_user_id, :insert_user_roles_role_id)",
            "COMMIT",
        ]
    );

    db.reply(Reply::Rows(vec![record! { "id" => 2, "name" => "editor" }]));
    let linked = roles.fetch(&db, &user, None).await.unwrap();
    assert_eq!(linked[0].get("name"), Some(&Value::from("editor")));

    let err = Relation::resolve(&catalog, "users", "roles", None).unwrap_err();
    assert!(matches!(err, OrmError::InvalidRelation(_)));
}
