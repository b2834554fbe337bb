mod common;

use common::*;
use noqli::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

async fn reply(shell: &mut Shell<MockStore>, line: &str) -> (Reply, OutputMode) {
    match shell.run(line, &mut yes).await.unwrap() {
        Outcome::Reply { reply, mode } => (reply, mode),
        Outcome::Exit => panic!("unexpected exit for {:?}", line),
    }
}

#[tokio::test]
async fn test_use_database_then_table() {
    let mut shell = Shell::new(MockStore::users(), Session::new(None));

    let (r, _) = reply(&mut shell, "USE shop").await;
    assert_eq!(r, Reply::Switched("Switched to database 'shop'".to_string()));

    let (r, _) = reply(&mut shell, "use users").await;
    assert_eq!(r, Reply::Switched("Using table 'users'".to_string()));
    assert_eq!(shell.session().prompt(), "noqli:shop:users> ");

    reply(&mut shell, "USE crm").await;
    assert_eq!(shell.session().table(), None);
}

#[tokio::test]
async fn test_use_unknown_target() {
    let mut shell = Shell::new(MockStore::users(), Session::new(None));
    assert!(matches!(
        shell.run("USE users", &mut yes).await,
        Err(NoqliError::NoDatabaseSelected)
    ));

    let mut shell = Shell::new(MockStore::users(), Session::new(Some("shop".into())));
    assert!(matches!(
        shell.run("USE ghosts", &mut yes).await,
        Err(NoqliError::UnknownTarget { .. })
    ));
}

#[tokio::test]
async fn test_crud_requires_table() {
    let mut shell = Shell::new(MockStore::users(), Session::new(Some("shop".into())));
    assert!(matches!(
        shell.run("get 1", &mut yes).await,
        Err(NoqliError::NoTableSelected)
    ));
}

#[tokio::test]
async fn test_listing() {
    let mut shell = Shell::new(MockStore::users(), Session::new(Some("shop".into())));

    let (r, mode) = reply(&mut shell, "GET tables").await;
    assert_eq!(mode, OutputMode::Table);
    assert_eq!(
        r,
        Reply::Names {
            title: "Tables in shop".to_string(),
            heading: "Tables_in_shop".to_string(),
            names: vec!["users".to_string(), "orders".to_string()],
        }
    );

    let (r, mode) = reply(&mut shell, "get dbs").await;
    assert_eq!(mode, OutputMode::Json);
    assert!(matches!(r, Reply::Names { names, .. } if names.len() == 2));
}

#[tokio::test]
async fn test_exit() {
    let mut shell = users_shell(MockStore::users());
    assert_eq!(shell.run("exit", &mut yes).await.unwrap(), Outcome::Exit);
}

#[tokio::test]
async fn test_get_by_id_is_single_record() {
    let store = MockStore::users().then_fetch(rows(&["id", "name"], vec![vec![json!(1), json!("Ann")]]));
    let mut shell = users_shell(store);

    let (r, mode) = reply(&mut shell, "get 1").await;
    assert_eq!(mode, OutputMode::Json);
    assert!(matches!(r, Reply::Records { single: true, .. }));

    let store = shell.store();
    assert_eq!(store.sql(), vec!["SELECT * FROM `shop`.`users` WHERE `id` = ?"]);
    assert_eq!(store.params(0), vec![Scalar::Int(1)]);
    assert_eq!(store.column_lookups.get(), 0);
}

#[tokio::test]
async fn test_get_list_is_many_records() {
    let store = MockStore::users().then_fetch(rows(&["id"], vec![vec![json!(1)]]));
    let mut shell = users_shell(store);

    let (r, _) = reply(&mut shell, "get {id: [1, 2]}").await;
    assert!(matches!(r, Reply::Records { single: false, .. }));
}

#[tokio::test]
async fn test_get_nothing() {
    let mut shell = users_shell(MockStore::users());
    let (r, _) = reply(&mut shell, "GET {status: 'gone'}").await;
    assert_eq!(r, Reply::NoRecords);
}

#[tokio::test]
async fn test_get_search_reads_schema() {
    let mut shell = users_shell(MockStore::users());
    reply(&mut shell, "get {like: 'son', down: 'age', lim: 2, off: 4}").await;

    let store = shell.store();
    assert_eq!(store.column_lookups.get(), 1);
    assert_eq!(
        store.sql(),
        vec![
            "SELECT * FROM `shop`.`users` WHERE (`name` LIKE ? OR `email` LIKE ? OR `status` LIKE ?) \
             ORDER BY `age` DESC LIMIT ? OFFSET ?"
        ]
    );
}

#[tokio::test]
async fn test_negative_limit_never_touches_store() {
    let mut shell = users_shell(MockStore::users());
    assert!(matches!(
        shell.run("get {like: 'x', lim: -1}", &mut yes).await,
        Err(NoqliError::InvalidPagination(_))
    ));
    assert_eq!(shell.store().column_lookups.get(), 0);
    assert!(shell.store().sql().is_empty());
}

#[tokio::test]
async fn test_count() {
    let store = MockStore::users().then_fetch(rows(&["count"], vec![vec![json!(3)]]));
    let mut shell = users_shell(store);

    let (r, _) = reply(&mut shell, "get {COUNT: '*', status: 'active'}").await;
    assert!(matches!(r, Reply::Aggregate { func: AggregateFunc::Count, .. }));
    assert_eq!(
        shell.store().sql(),
        vec!["SELECT COUNT(*) AS count FROM `shop`.`users` WHERE `status` = ?"]
    );
}

#[tokio::test]
async fn test_create_adds_missing_columns() {
    let store = MockStore::users().then_execute(1, 7);
    let mut shell = users_shell(store);

    let (r, _) = reply(&mut shell, "create {name: 'Ann', nickname: 'A'}").await;
    assert_eq!(
        r,
        Reply::Created {
            id: 7,
            record: json!({"id": 7, "name": "Ann", "nickname": "A"}),
        }
    );

    let store = shell.store();
    assert_eq!(*store.added.borrow(), vec!["nickname".to_string()]);
    assert_eq!(
        store.sql(),
        vec!["INSERT INTO `shop`.`users` (`name`, `nickname`) VALUES (?, ?)"]
    );
}

#[tokio::test]
async fn test_create_rejects_options() {
    let mut shell = users_shell(MockStore::users());
    assert!(matches!(
        shell.run("create {name: 'x', up: 'name'}", &mut yes).await,
        Err(NoqliError::UnsupportedOption { .. })
    ));
    assert!(matches!(
        shell.run("create {}", &mut yes).await,
        Err(NoqliError::InvalidValue(_))
    ));
}

#[tokio::test]
async fn test_update_by_id() {
    let store = MockStore::users()
        .then_execute(1, 0)
        .then_fetch(rows(&["id", "status"], vec![vec![json!(5), json!("x")]]));
    let mut shell = users_shell(store);

    let (r, _) = reply(&mut shell, "update {id: 5, status: 'x'}").await;
    assert!(matches!(r, Reply::Updated { affected: 1, rows: Some(_), unfiltered: false }));

    let store = shell.store();
    assert_eq!(
        store.sql(),
        vec![
            "UPDATE `shop`.`users` SET `status` = ? WHERE `id` = ?",
            "SELECT * FROM `shop`.`users` WHERE `id` = ?",
        ]
    );
    assert_eq!(store.params(0), vec![Scalar::from("x"), Scalar::Int(5)]);
}

#[tokio::test]
async fn test_update_table_mode_skips_reselect() {
    let mut shell = users_shell(MockStore::users().then_execute(2, 0));

    let (r, _) = reply(&mut shell, "UPDATE {status: ['a', 'b'], name: 'bulk'}").await;
    assert_eq!(
        r,
        Reply::Updated {
            affected: 2,
            rows: None,
            unfiltered: false
        }
    );
    assert_eq!(shell.store().sql().len(), 1);
}

#[tokio::test]
async fn test_unfiltered_update_needs_confirmation() {
    let mut shell = users_shell(MockStore::users());
    assert!(matches!(
        shell.run("update {flag: 'on'}", &mut no).await,
        Err(NoqliError::Cancelled)
    ));
    assert!(shell.store().sql().is_empty());
    assert!(shell.store().added.borrow().is_empty());

    let (r, _) = reply(&mut shell, "update {flag: 'on'}").await;
    assert!(matches!(r, Reply::Updated { unfiltered: true, .. }));
    assert_eq!(
        shell.store().sql(),
        vec![
            "UPDATE `shop`.`users` SET `flag` = ?",
            "SELECT * FROM `shop`.`users` LIMIT ?",
        ]
    );
    assert_eq!(*shell.store().added.borrow(), vec!["flag".to_string()]);
}

#[tokio::test]
async fn test_update_errors() {
    let mut shell = users_shell(MockStore::users().then_execute(0, 0));

    assert!(matches!(
        shell.run("update {status: ['a']}", &mut yes).await,
        Err(NoqliError::NoUpdateFields(_))
    ));
    assert!(matches!(
        shell.run("update {id: 1, lim: 2, name: 'x'}", &mut yes).await,
        Err(NoqliError::UnsupportedOption { .. })
    ));
    assert!(matches!(
        shell.run("update {id: 99, name: 'x'}", &mut yes).await,
        Err(NoqliError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete() {
    let mut shell = users_shell(MockStore::users().then_execute(2, 0).then_execute(0, 0));

    assert!(matches!(
        shell.run("delete {name: 'x'}", &mut yes).await,
        Err(NoqliError::MissingFilter("DELETE"))
    ));

    let (r, mode) = reply(&mut shell, "DELETE {id: (1, 2)}").await;
    assert_eq!(mode, OutputMode::Table);
    assert_eq!(r, Reply::Deleted { affected: 2 });

    assert!(matches!(
        shell.run("delete 42", &mut yes).await,
        Err(NoqliError::NotFound(_))
    ));
    assert_eq!(
        shell.store().sql(),
        vec![
            "DELETE FROM `shop`.`users` WHERE `id` BETWEEN ? AND ?",
            "DELETE FROM `shop`.`users` WHERE `id` = ?",
        ]
    );
}

#[tokio::test]
async fn test_malformed_expression() {
    let mut shell = users_shell(MockStore::users());
    assert!(matches!(
        shell.run("get {name: 'x'", &mut yes).await,
        Err(NoqliError::MalformedExpression { .. })
    ));
    assert!(matches!(
        shell.run("select * from users", &mut yes).await,
        Err(NoqliError::InvalidCommand(_))
    ));
}
