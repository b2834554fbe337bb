//! parse → resolve → transpile, without a store.

use noqli::prelude::*;
use noqli::shell::explain;
use pretty_assertions::assert_eq;

fn columns() -> Vec<ColumnInfo> {
    vec![
        ColumnInfo::new("id", false),
        ColumnInfo::new("name", true),
        ColumnInfo::new("email", true),
        ColumnInfo::new("status", true),
    ]
}

fn sql(line: &str) -> Statement {
    explain(line, &TableRef::new("users"), &columns()).unwrap().1
}

#[test]
fn test_integers_are_ids() {
    for n in [0u64, 1, 42, 9_007_199_254_740_993, i64::MAX as u64] {
        let attrs = parse(&n.to_string()).unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs["id"], AttrValue::from(n as i64));
    }
}

#[test]
fn test_assignment_shares_value() {
    let attrs = parse("{[a, b, c] = ['x', 2], d: 1}").unwrap();
    assert_eq!(attrs["a"], attrs["b"]);
    assert_eq!(attrs["b"], attrs["c"]);
    assert_eq!(attrs["a"], AttrValue::List(vec!["x".into(), 2.into()]));
}

#[test]
fn test_projection_with_options() {
    let stmt = sql("get {name, email, lim: 2}");
    assert_eq!(stmt.sql, "SELECT `name`, `email` FROM `users` LIMIT ?");
    assert_eq!(stmt.params, vec![Scalar::Int(2)]);
}

#[test]
fn test_membership_not_equality() {
    let stmt = sql("get {id: [1,2,3]}");
    assert_eq!(stmt.sql, "SELECT * FROM `users` WHERE `id` IN (?, ?, ?)");
}

#[test]
fn test_inverted_range_passes_through() {
    let stmt = sql("GET {id: (5, 2)}");
    assert_eq!(stmt.sql, "SELECT * FROM `users` WHERE `id` BETWEEN ? AND ?");
    assert_eq!(stmt.params, vec![Scalar::Int(5), Scalar::Int(2)]);
}

#[test]
fn test_like_over_projection() {
    let stmt = sql("get {name, like: 'son'}");
    assert_eq!(stmt.sql, "SELECT `name` FROM `users` WHERE (`name` LIKE ?)");
    assert_eq!(stmt.params, vec![Scalar::from("%son%")]);
}

#[test]
fn test_count_star_drops_distinct() {
    let stmt = sql("get {count: '*', distinct: true, status: 'active'}");
    assert_eq!(
        stmt.sql,
        "SELECT COUNT(*) AS count FROM `users` WHERE `status` = ?"
    );

    let stmt = sql("get {count: 'email', distinct: true}");
    assert_eq!(stmt.sql, "SELECT COUNT(DISTINCT `email`) AS count FROM `users`");
}

#[test]
fn test_null_filter() {
    let stmt = sql("get {email: null, status: 'active'}");
    assert_eq!(
        stmt.sql,
        "SELECT * FROM `users` WHERE `email` IS NULL AND `status` = ?"
    );
}

#[test]
fn test_empty_list_matches_nothing() {
    let stmt = sql("delete {id: []}");
    assert_eq!(stmt.sql, "DELETE FROM `users` WHERE 0=1");
}

#[test]
fn test_update_split() {
    let stmt = sql("update {id: (1, 9), status: ['a', 'b'], name: 'n'}");
    assert_eq!(
        stmt.sql,
        "UPDATE `users` SET `name` = ? WHERE `id` BETWEEN ? AND ? AND `status` IN (?, ?)"
    );
    assert_eq!(
        stmt.params,
        vec![
            Scalar::from("n"),
            Scalar::Int(1),
            Scalar::Int(9),
            Scalar::from("a"),
            Scalar::from("b"),
        ]
    );
}

#[test]
fn test_multi_assign_update() {
    let stmt = sql("update {id: 3, [name, status] = 'same'}");
    assert_eq!(
        stmt.sql,
        "UPDATE `users` SET `name` = ?, `status` = ? WHERE `id` = ?"
    );
}

#[test]
fn test_resolution_errors() {
    let table = TableRef::new("users");
    let cols = columns();

    let cases: [(&str, fn(&NoqliError) -> bool); 8] = [
        ("update {}", |e| matches!(e, NoqliError::NoUpdateFields(_))),
        ("update {status: ['a', 'b']}", |e| matches!(e, NoqliError::NoUpdateFields(_))),
        ("get {lim: -3}", |e| matches!(e, NoqliError::InvalidPagination(_))),
        ("get {off: -1}", |e| matches!(e, NoqliError::InvalidPagination(_))),
        ("get {COUNT: '*', MAX: 'id'}", |e| matches!(e, NoqliError::AmbiguousAggregate(_))),
        ("get {max: 'salary'}", |e| matches!(e, NoqliError::UnknownColumnForAggregate { .. })),
        ("delete {status: 'x'}", |e| matches!(e, NoqliError::MissingFilter(_))),
        ("get {name: (1, 2)}", |e| matches!(e, NoqliError::MalformedExpression { .. })),
    ];

    for (line, check) in cases {
        match explain(line, &table, &cols) {
            Err(e) => assert!(check(&e), "{}: unexpected error {}", line, e),
            Ok((_, stmt)) => panic!("{}: expected an error, got {}", line, stmt),
        }
    }
}
