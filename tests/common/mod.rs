//! In-memory store double shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use noqli::prelude::*;

/// Records every statement and answers from scripted queues.
#[derive(Default)]
pub struct MockStore {
    pub columns: RefCell<Vec<ColumnInfo>>,
    pub databases: Vec<String>,
    /// (database, table)
    pub tables: Vec<(String, String)>,
    pub fetches: RefCell<VecDeque<ResultSet>>,
    pub executes: RefCell<VecDeque<ExecResult>>,
    pub log: RefCell<Vec<Statement>>,
    pub added: RefCell<Vec<String>>,
    pub column_lookups: Cell<usize>,
}

impl MockStore {
    pub fn users() -> Self {
        Self {
            columns: RefCell::new(vec![
                ColumnInfo::new("id", false),
                ColumnInfo::new("name", true),
                ColumnInfo::new("email", true),
                ColumnInfo::new("status", true),
                ColumnInfo::new("age", false),
            ]),
            databases: vec!["shop".to_string(), "crm".to_string()],
            tables: vec![
                ("shop".to_string(), "users".to_string()),
                ("shop".to_string(), "orders".to_string()),
            ],
            ..Default::default()
        }
    }

    pub fn then_fetch(self, rows: ResultSet) -> Self {
        self.fetches.borrow_mut().push_back(rows);
        self
    }

    pub fn then_execute(self, rows_affected: u64, last_insert_id: u64) -> Self {
        self.executes.borrow_mut().push_back(ExecResult {
            rows_affected,
            last_insert_id,
        });
        self
    }

    pub fn sql(&self) -> Vec<String> {
        self.log.borrow().iter().map(|s| s.sql.clone()).collect()
    }

    pub fn params(&self, index: usize) -> Vec<Scalar> {
        self.log.borrow()[index].params.clone()
    }
}

impl TabularStore for MockStore {
    async fn list_columns(&self, _table: &TableRef) -> NoqliResult<Vec<ColumnInfo>> {
        self.column_lookups.set(self.column_lookups.get() + 1);
        Ok(self.columns.borrow().clone())
    }

    async fn ensure_column(&self, _table: &TableRef, column: &str) -> NoqliResult<bool> {
        if self.columns.borrow().iter().any(|c| c.name == column) {
            return Ok(false);
        }
        self.added.borrow_mut().push(column.to_string());
        self.columns.borrow_mut().push(ColumnInfo::new(column, true));
        Ok(true)
    }

    async fn fetch(&self, stmt: &Statement) -> NoqliResult<ResultSet> {
        self.log.borrow_mut().push(stmt.clone());
        Ok(self.fetches.borrow_mut().pop_front().unwrap_or_default())
    }

    async fn execute(&self, stmt: &Statement) -> NoqliResult<ExecResult> {
        self.log.borrow_mut().push(stmt.clone());
        Ok(self.executes.borrow_mut().pop_front().unwrap_or(ExecResult {
            rows_affected: 1,
            last_insert_id: 0,
        }))
    }

    async fn list_databases(&self) -> NoqliResult<Vec<String>> {
        Ok(self.databases.clone())
    }

    async fn list_tables(&self, database: &str) -> NoqliResult<Vec<String>> {
        Ok(self
            .tables
            .iter()
            .filter(|(db, _)| db == database)
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn database_exists(&self, database: &str) -> NoqliResult<bool> {
        Ok(self.databases.iter().any(|d| d == database))
    }

    async fn table_exists(&self, database: &str, table: &str) -> NoqliResult<bool> {
        Ok(self.tables.iter().any(|(d, t)| d == database && t == table))
    }
}

/// A shell already pointed at `shop`.`users`.
pub fn users_shell(store: MockStore) -> Shell<MockStore> {
    let mut session = Session::new(Some("shop".to_string()));
    session.use_table("users");
    Shell::new(store, session)
}

pub fn rows(columns: &[&str], rows: Vec<Vec<serde_json::Value>>) -> ResultSet {
    ResultSet::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}

pub fn yes(_: &str) -> bool {
    true
}

pub fn no(_: &str) -> bool {
    false
}
